//! Local WebSocket fixtures for unit tests.

use std::net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

/// Server-side socket handed to tests.
pub(crate) type ServerSocket = WebSocketStream<TcpStream>;

/// How long a fixture waits before failing the test.
pub(crate) const FIXTURE_TIMEOUT: Duration = Duration::from_secs(5);

/// WebSocket server on `127.0.0.1:0` that hands every accepted socket to
/// the test.
pub(crate) struct TestServer {
    addr: SocketAddr,
    accepted: mpsc::UnboundedReceiver<ServerSocket>,
    task: JoinHandle<()>,
}

impl TestServer {
    pub(crate) async fn start() -> Self {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind test server");
        let addr = listener.local_addr().expect("local addr");
        let (tx, accepted) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                if let Ok(ws) = tokio_tungstenite::accept_async(stream).await
                    && tx.send(ws).is_err()
                {
                    break;
                }
            }
        });

        Self {
            addr,
            accepted,
            task,
        }
    }

    pub(crate) fn url(&self) -> String {
        format!("ws://{}/", self.addr)
    }

    /// Waits for the next client connection.
    pub(crate) async fn next_connection(&mut self) -> ServerSocket {
        timeout(FIXTURE_TIMEOUT, self.accepted.recv())
            .await
            .expect("client did not connect in time")
            .expect("accept loop ended")
    }

    /// Returns `true` if a connection arrives within `wait`.
    pub(crate) async fn connects_within(&mut self, wait: Duration) -> bool {
        matches!(timeout(wait, self.accepted.recv()).await, Ok(Some(_)))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Reads the next text frame, skipping control frames.
pub(crate) async fn next_text(ws: &mut ServerSocket) -> String {
    timeout(FIXTURE_TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => break text.as_str().to_owned(),
                Some(Ok(Message::Close(_))) | None => panic!("socket closed while waiting for text"),
                Some(Ok(_)) => continue,
                Some(Err(e)) => panic!("socket error while waiting for text: {e}"),
            }
        }
    })
    .await
    .expect("no text frame in time")
}

/// Reads until the client closes; returns the close code if one was sent.
pub(crate) async fn wait_closed(ws: &mut ServerSocket) -> Option<u16> {
    timeout(FIXTURE_TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(frame))) => break frame.map(|f| u16::from(f.code)),
                Some(Ok(_)) => continue,
                Some(Err(_)) | None => break None,
            }
        }
    })
    .await
    .expect("socket not closed in time")
}

/// A `ws://` URL nothing listens on.
pub(crate) fn closed_port_url() -> String {
    let listener = StdTcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind throwaway listener");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("ws://{addr}/")
}

/// Polls `done` until it holds or the fixture timeout elapses.
pub(crate) async fn eventually(mut done: impl FnMut() -> bool) {
    timeout(FIXTURE_TIMEOUT, async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// TCP listener that accepts connections but never answers the WebSocket
/// handshake. Keeps a client parked in `Connecting`.
pub(crate) async fn silent_listener() -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind silent listener");
    let addr = listener.local_addr().expect("local addr");

    let task = tokio::spawn(async move {
        let mut parked = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            parked.push(stream);
        }
    });

    (format!("ws://{addr}/"), task)
}

/// Request seen by [`http_fixture`].
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    /// Request line target, e.g. `/api/repositories?x=1`.
    pub(crate) target: String,
    pub(crate) method: String,
    pub(crate) body: String,
}

/// One-shot HTTP/1.1 server that answers each connection with the next
/// canned `(status, body)` and records what was asked.
pub(crate) async fn http_fixture(
    responses: Vec<(u16, String)>,
) -> (String, mpsc::UnboundedReceiver<RecordedRequest>) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind http fixture");
    let addr = listener.local_addr().expect("local addr");
    let (tx, requests) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        for (status, body) in responses {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };

            let mut raw = Vec::new();
            let mut chunk = [0_u8; 1024];
            let head_end = loop {
                if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
                match stream.read(&mut chunk).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => raw.extend_from_slice(&chunk[..n]),
                }
            };

            let head = String::from_utf8_lossy(&raw[..head_end]).into_owned();
            let content_length = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            while raw.len() < head_end + content_length {
                match stream.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => raw.extend_from_slice(&chunk[..n]),
                }
            }

            let mut request_line = head.lines().next().unwrap_or_default().split(' ');
            let method = request_line.next().unwrap_or_default().to_owned();
            let target = request_line.next().unwrap_or_default().to_owned();
            let _ = tx.send(RecordedRequest {
                target,
                method,
                body: String::from_utf8_lossy(&raw[head_end..]).into_owned(),
            });

            let response = format!(
                "HTTP/1.1 {status} Fixture\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });

    (format!("http://{addr}/"), requests)
}
