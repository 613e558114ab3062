use anyhow::{bail, Context, Result};
use caisoscraper::{
    config::{Config, Settings},
    feeds::{self, FeedDescriptor},
    fetch::SnapshotFetcher,
    history::Bookmarks,
    run::{local_clock, Extraction},
    sink::JsonLinesSink,
};
use clap::Parser;
use std::{io, path::PathBuf};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Pull CAISO daily demand snapshots as a Singer-style record stream"
)]
struct Args {
    /// JSON or YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Bookmark file, read to resume and rewritten after the run
    #[arg(short, long)]
    state: Option<PathBuf>,
    /// Only this feed (default: all)
    #[arg(short, long)]
    feed: Option<String>,
    /// Print the catalog and exit
    #[arg(long)]
    discover: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging (stdout carries records) ────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    if args.discover {
        println!("{}", serde_json::to_string_pretty(&feeds::catalog())?);
        return Ok(());
    }

    // ─── 2) config + feeds, all checked before any request ───────────
    let settings = match &args.config {
        Some(path) => Config::load(path).with_context(|| format!("config {}", path.display()))?,
        None => Settings::default(),
    };
    let selected: Vec<FeedDescriptor> = match &args.feed {
        Some(name) => match feeds::find(name) {
            Some(f) => vec![*f],
            None => bail!("unknown feed {name:?}"),
        },
        None => feeds::all().to_vec(),
    };

    let bookmarks = match &args.state {
        Some(path) => Bookmarks::load(path)?,
        None => Bookmarks::default(),
    };
    info!(feeds = selected.len(), template = settings.template.as_str(), "startup");

    let client = SnapshotFetcher::client_for(&settings)?;
    let mut sink = JsonLinesSink::new(io::stdout().lock(), bookmarks.clone());

    // ─── 3) walk each feed's window ──────────────────────────────────
    let mut failure = None;
    for feed in selected {
        let resume = bookmarks.get(feed.name);
        let mut extraction = Extraction::new(feed, client.clone(), &settings, resume, local_clock());
        match extraction.run(&mut sink).await {
            Ok(summary) => info!(feed = feed.name, ?summary, "feed done"),
            Err(e) => {
                error!(feed = feed.name, error = %e, "feed failed");
                failure = Some(e);
                break;
            }
        }
    }

    // ─── 4) persist bookmarks for whatever was emitted ───────────────
    let (_, state) = sink.into_inner();
    if let Some(path) = &args.state {
        state
            .save(path)
            .with_context(|| format!("writing state {}", path.display()))?;
    }

    match failure {
        Some(e) => Err(e.into()),
        None => {
            info!("all done");
            Ok(())
        }
    }
}
