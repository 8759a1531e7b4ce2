//! Scripted guest agent peer listening on a temporary Unix socket.

use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::task::JoinHandle;

/// What the mock peer does with one accepted connection.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Read the request line, then write these bytes and close.
    Send(Vec<u8>),
    /// Read the request line, then stay silent for the duration and close.
    Silent(Duration),
    /// Read the request line, then close without writing.
    Close,
    /// Accept, never read the request, and hold the connection open.
    Unread(Duration),
}

impl Reply {
    /// Send a text line followed by `\n`.
    pub fn line(text: &str) -> Self {
        Self::Send(format!("{text}\n").into_bytes())
    }
}

/// A listening mock peer; owns the temp directory holding its socket.
pub struct MockPeer {
    pub path: PathBuf,
    handle: JoinHandle<Vec<String>>,
    _dir: tempfile::TempDir,
}

impl MockPeer {
    /// Bind a socket and serve one connection per scripted reply, in order.
    pub fn spawn(replies: Vec<Reply>) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("qga.sock");
        let listener = UnixListener::bind(&path).expect("bind mock peer");

        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for reply in replies {
                let (stream, _) = listener.accept().await.expect("accept");
                if let Reply::Unread(duration) = reply {
                    tokio::time::sleep(duration).await;
                    requests.push(String::new());
                    continue;
                }
                let (reader, mut writer) = stream.into_split();
                let mut reader = BufReader::new(reader);
                let mut line = String::new();
                reader.read_line(&mut line).await.expect("read request");
                requests.push(line);

                match reply {
                    Reply::Send(bytes) => {
                        writer.write_all(&bytes).await.expect("write reply");
                        writer.flush().await.expect("flush reply");
                    }
                    Reply::Silent(duration) => tokio::time::sleep(duration).await,
                    Reply::Close | Reply::Unread(_) => {}
                }
            }
            requests
        });

        Self {
            path,
            handle,
            _dir: dir,
        }
    }

    /// Wait for every scripted connection and return the request lines seen.
    pub async fn requests(self) -> Vec<String> {
        self.handle.await.expect("mock peer task")
    }

    /// Stop the peer without waiting for remaining connections.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

/// Parse a request line captured by the mock peer.
pub fn request_json(line: &str) -> serde_json::Value {
    serde_json::from_str(line.trim()).expect("request is json")
}
