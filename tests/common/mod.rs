// Minimal HTTP/1.1 stub: canned responses per path, every request recorded.

use std::{
    collections::{HashMap, VecDeque},
    net::SocketAddr,
    sync::{Arc, Mutex},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};

#[derive(Clone, Debug)]
pub struct Canned {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Keep the connection open and never answer.
    pub hang: bool,
}

impl Canned {
    pub fn csv(body: &str) -> Self {
        Self {
            status: 200,
            headers: vec![("Content-Type".into(), "application/octet-stream".into())],
            body: body.as_bytes().to_vec(),
            hang: false,
        }
    }

    pub fn html(title: &str) -> Self {
        Self {
            status: 200,
            headers: vec![("Content-Type".into(), "text/html; charset=UTF-8".into())],
            body: format!("<html><head><title>{title}</title></head><body>oops</body></html>")
                .into_bytes(),
            hang: false,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".into(), "text/plain".into())],
            body: b"error".to_vec(),
            hang: false,
        }
    }

    pub fn redirect(location: &str) -> Self {
        Self {
            status: 302,
            headers: vec![("Location".into(), location.into())],
            body: Vec::new(),
            hang: false,
        }
    }

    pub fn hang() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: Vec::new(),
            hang: true,
        }
    }
}

#[derive(Default)]
struct Routes {
    /// Each hit pops the front; the last response repeats.
    canned: HashMap<String, VecDeque<Canned>>,
    hits: Vec<String>,
}

#[derive(Clone)]
pub struct Stub {
    pub addr: SocketAddr,
    routes: Arc<Mutex<Routes>>,
}

impl Stub {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes = Arc::new(Mutex::new(Routes::default()));

        let shared = Arc::clone(&routes);
        tokio::spawn(async move {
            loop {
                let Ok((mut sock, _)) = listener.accept().await else {
                    return;
                };
                let routes = Arc::clone(&shared);
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match sock.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let head = String::from_utf8_lossy(&buf);
                    let path = head
                        .lines()
                        .next()
                        .and_then(|l| l.split_whitespace().nth(1))
                        .unwrap_or("/")
                        .to_string();

                    let resp = {
                        let mut r = routes.lock().unwrap();
                        r.hits.push(path.clone());
                        match r.canned.get_mut(&path) {
                            Some(q) if q.len() > 1 => q.pop_front().unwrap(),
                            Some(q) => q.front().cloned().unwrap_or_else(|| Canned::status(404)),
                            None => Canned::status(404),
                        }
                    };

                    if resp.hang {
                        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                        return;
                    }

                    let mut out = format!("HTTP/1.1 {} Stub\r\n", resp.status);
                    for (k, v) in &resp.headers {
                        out.push_str(&format!("{k}: {v}\r\n"));
                    }
                    out.push_str(&format!(
                        "Content-Length: {}\r\nConnection: close\r\n\r\n",
                        resp.body.len()
                    ));
                    let _ = sock.write_all(out.as_bytes()).await;
                    let _ = sock.write_all(&resp.body).await;
                    let _ = sock.shutdown().await;
                });
            }
        });

        Self { addr, routes }
    }

    /// A template whose port has nothing listening on it.
    pub async fn closed_template() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}/outlook/SP/History/{{date}}")
    }

    pub fn template(&self) -> String {
        format!("http://{}/outlook/SP/History/{{date}}", self.addr)
    }

    pub fn path_for(token: &str) -> String {
        format!("/outlook/SP/History/{token}/demand.csv")
    }

    pub fn route(&self, token: &str, responses: Vec<Canned>) {
        self.routes
            .lock()
            .unwrap()
            .canned
            .insert(Self::path_for(token), responses.into());
    }

    pub fn hits(&self) -> Vec<String> {
        self.routes.lock().unwrap().hits.clone()
    }
}
