//! In-process WebSocket peer for client tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use mealmate_core::events::Frame;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;

/// Accepts any number of clients, records what they send, and pushes
/// text frames (or a close) to all of them.
pub(crate) struct TestHub {
    pub url: String,
    received: tokio::sync::Mutex<mpsc::UnboundedReceiver<Frame>>,
    push: broadcast::Sender<Option<String>>,
    auth: Arc<Mutex<Vec<Option<String>>>>,
    accepted: Arc<AtomicUsize>,
}

impl TestHub {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (push, _) = broadcast::channel::<Option<String>>(64);
        let auth: Arc<Mutex<Vec<Option<String>>>> = Arc::default();
        let accepted = Arc::new(AtomicUsize::new(0));

        let push_tx = push.clone();
        let auth_log = Arc::clone(&auth);
        let accepted_count = Arc::clone(&accepted);
        drop(tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let auth_log = Arc::clone(&auth_log);
                let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                    let header = req
                        .headers()
                        .get(AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_owned);
                    auth_log.lock().push(header);
                    Ok(resp)
                };
                let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
                    continue;
                };
                let frames_tx = frames_tx.clone();
                let mut push_rx = push_tx.subscribe();
                let _ = accepted_count.fetch_add(1, Ordering::SeqCst);
                drop(tokio::spawn(async move {
                    let (mut tx, mut rx) = ws.split();
                    loop {
                        tokio::select! {
                            msg = rx.next() => match msg {
                                Some(Ok(Message::Text(text))) => {
                                    if let Ok(frame) = Frame::decode(text.as_str()) {
                                        let _ = frames_tx.send(frame);
                                    }
                                }
                                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                                Some(Ok(_)) => {}
                            },
                            out = push_rx.recv() => match out {
                                Ok(Some(text)) => {
                                    if tx.send(Message::Text(text.into())).await.is_err() {
                                        break;
                                    }
                                }
                                Ok(None) | Err(_) => {
                                    let _ = tx.send(Message::Close(None)).await;
                                    break;
                                }
                            },
                        }
                    }
                }));
            }
        }));

        Self {
            url: format!("ws://{addr}/ws"),
            received: tokio::sync::Mutex::new(frames_rx),
            push,
            auth,
            accepted,
        }
    }

    /// Send a raw text message to every client.
    pub fn push(&self, text: &str) {
        let _ = self.push.send(Some(text.to_owned()));
    }

    /// Close every client connection from the server side.
    pub fn close_all(&self) {
        let _ = self.push.send(None);
    }

    pub fn connection_count(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` handshakes completed; returns the count.
    pub async fn wait_for_connections(&self, n: usize) -> usize {
        for _ in 0..200 {
            let count = self.connection_count();
            if count >= n {
                return count;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.connection_count()
    }

    pub fn auth_headers(&self) -> Vec<Option<String>> {
        self.auth.lock().clone()
    }

    /// Next frame sent by any client.
    pub async fn next_frame(&self) -> Frame {
        let mut rx = self.received.lock().await;
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    /// Assert no client frame arrives within a short window.
    pub async fn assert_silent(&self) {
        let mut rx = self.received.lock().await;
        let res = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(res.is_err(), "unexpected frame: {res:?}");
    }
}
