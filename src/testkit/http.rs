//! Minimal canned-response HTTP servers for probe and fetch tests.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// What the responder sends back for every request.
#[derive(Debug, Clone)]
pub enum CannedResponse {
    /// 200 with the given body.
    Ok(Vec<u8>),
    /// A bare status code with an empty body.
    Status(u16),
    /// 200 with the body only when the request carries this bearer
    /// token; 401 otherwise.
    RequireBearer { token: String, body: Vec<u8> },
}

/// Serve `response` on an ephemeral local port until the handle is
/// aborted or dropped.
pub async fn spawn_responder(response: CannedResponse) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");

    let handle = tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let response = response.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                let reply = render(&response, &request);
                let _ = socket.write_all(&reply).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, handle)
}

fn render(response: &CannedResponse, request: &str) -> Vec<u8> {
    match response {
        CannedResponse::Ok(body) => http_bytes(200, body),
        CannedResponse::Status(code) => http_bytes(*code, b""),
        CannedResponse::RequireBearer { token, body } => {
            let header = format!("authorization: bearer {token}").to_ascii_lowercase();
            if request.to_ascii_lowercase().contains(&header) {
                http_bytes(200, body)
            } else {
                http_bytes(401, b"")
            }
        }
    }
}

fn http_bytes(status: u16, body: &[u8]) -> Vec<u8> {
    let reason = match status {
        200 => "OK",
        401 => "Unauthorized",
        404 => "Not Found",
        503 => "Service Unavailable",
        _ => "Response",
    };
    let mut bytes = format!(
        "HTTP/1.1 {status} {reason}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
        body.len()
    )
    .into_bytes();
    bytes.extend_from_slice(body);
    bytes
}
