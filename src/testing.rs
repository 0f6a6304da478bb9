//! Test-only mock chain: a local HTTP server answering canned JSON per
//! path, counting requests so cache behavior can be asserted.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tokio::{
    io::{AsyncReadExt as _, AsyncWriteExt as _},
    net::TcpListener,
};

pub(crate) struct MockChain {
    url: String,
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

impl MockChain {
    /// Spawn a server answering the given `(path_prefix, status, body)`
    /// routes. The longest matching prefix wins; unmatched paths get a 404.
    pub(crate) async fn spawn(routes: Vec<(&str, u16, &str)>) -> Self {
        let routes: Vec<(String, u16, String)> = routes
            .into_iter()
            .map(|(path, status, body)| (path.to_string(), status, body.to_string()))
            .collect();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(Mutex::new(HashMap::new()));

        let task_hits = hits.clone();
        tokio::spawn(async move {
            loop {
                let (mut stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => return,
                };

                let path = match read_request_path(&mut stream).await {
                    Some(path) => path,
                    None => continue,
                };

                let matched = routes
                    .iter()
                    .filter(|(prefix, _, _)| path.starts_with(prefix.as_str()))
                    .max_by_key(|(prefix, _, _)| prefix.len());
                let (key, status, body) = match matched {
                    Some((prefix, status, body)) => (prefix.clone(), *status, body.clone()),
                    None => (path, 404, r#"{"error":"not found"}"#.to_string()),
                };
                *task_hits.lock().unwrap().entry(key).or_insert(0) += 1;

                let reason = if status < 400 { "OK" } else { "Error" };
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len(),
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        Self { url, hits }
    }

    pub(crate) fn url(&self) -> &str {
        &self.url
    }

    /// Number of requests whose path matched the given route prefix.
    pub(crate) fn hits(&self, prefix: &str) -> usize {
        *self.hits.lock().unwrap().get(prefix).unwrap_or(&0)
    }
}

/// Read one request, including any body announced via Content-Length, and
/// return its path.
async fn read_request_path(stream: &mut tokio::net::TcpStream) -> Option<String> {
    let mut buf = vec![0u8; 64 * 1024];
    let mut read = 0;

    loop {
        if read == buf.len() {
            buf.resize(buf.len() * 2, 0);
        }
        let n = match stream.read(&mut buf[read..]).await {
            Ok(0) | Err(_) => return None,
            Ok(n) => n,
        };
        read += n;

        let header_end = match find_subslice(&buf[..read], b"\r\n\r\n") {
            Some(pos) => pos,
            None => continue,
        };
        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let content_length = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                if name.eq_ignore_ascii_case("content-length") {
                    value.trim().parse::<usize>().ok()
                } else {
                    None
                }
            })
            .unwrap_or(0);

        if read >= header_end + 4 + content_length {
            return head
                .lines()
                .next()
                .and_then(|line| line.split_whitespace().nth(1))
                .map(str::to_string);
        }
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
