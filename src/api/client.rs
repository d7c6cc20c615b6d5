use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time;
use tracing::{debug, info};

use super::codec::{read_frame, write_frame};
use super::types::{Decision, Request, Response, Signal};
use crate::core::PipelineError;

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Connection {
    async fn exchange(&mut self, request: &Request) -> Result<Response, PipelineError> {
        write_frame(&mut self.writer, request).await?;
        read_frame(&mut self.reader)
            .await?
            .ok_or(PipelineError::TransportClosed)
    }
}

enum LinkState {
    Disconnected,
    Connected(Connection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Disconnected,
    Connected,
}

/// Client side of one remote peer.
///
/// `Disconnected -> Connected` only through [`Link::connect`]. Any failed
/// exchange (end of stream, I/O error, timeout, garbled frame) drops the
/// connection, and so does a call future dropped mid-flight, because the
/// connection is taken out of the link for the duration of the call.
pub struct Link {
    addr: String,
    timeout: Duration,
    state: LinkState,
}

impl Link {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
            state: LinkState::Disconnected,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn status(&self) -> LinkStatus {
        match self.state {
            LinkState::Disconnected => LinkStatus::Disconnected,
            LinkState::Connected(_) => LinkStatus::Connected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status() == LinkStatus::Connected
    }

    pub async fn connect(&mut self) -> Result<(), PipelineError> {
        self.state = LinkState::Disconnected;

        let stream = match time::timeout(self.timeout, TcpStream::connect(&self.addr)).await {
            Err(_) => return Err(PipelineError::Timeout),
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => {
                return Err(PipelineError::ConnectionRefused {
                    addr: self.addr.clone(),
                })
            }
            Ok(Err(e)) => return Err(PipelineError::Io(e)),
            Ok(Ok(stream)) => stream,
        };
        stream.set_nodelay(true)?;

        let (read_half, writer) = stream.into_split();
        self.state = LinkState::Connected(Connection {
            reader: BufReader::new(read_half),
            writer,
        });
        debug!("🔗 Connected to {}", self.addr);
        Ok(())
    }

    /// One request/response exchange bounded by the call timeout.
    pub async fn call(&mut self, request: &Request) -> Result<Response, PipelineError> {
        let mut connection = match std::mem::replace(&mut self.state, LinkState::Disconnected) {
            LinkState::Connected(connection) => connection,
            LinkState::Disconnected => return Err(PipelineError::NotConnected),
        };

        match time::timeout(self.timeout, connection.exchange(request)).await {
            Ok(Ok(response)) => {
                self.state = LinkState::Connected(connection);
                Ok(response)
            }
            Ok(Err(e)) => {
                debug!("🔌 Link to {} dropped: {}", self.addr, e);
                Err(e)
            }
            Err(_) => {
                debug!("🔌 Link to {} timed out", self.addr);
                Err(PipelineError::Timeout)
            }
        }
    }

    /// Reconnects a disconnected link first, then calls.
    pub async fn call_or_reconnect(&mut self, request: &Request) -> Result<Response, PipelineError> {
        if !self.is_connected() {
            self.connect().await?;
            info!("🔗 Reconnected to {}", self.addr);
        }
        self.call(request).await
    }

    pub async fn pull_signal(&mut self) -> Result<Option<Signal>, PipelineError> {
        match self.call(&Request::PullSignal).await? {
            Response::Signal { signal } => Ok(signal),
            other => Err(unexpected(other)),
        }
    }

    pub async fn register(&mut self, id: &str) -> Result<bool, PipelineError> {
        let request = Request::Register { id: id.to_string() };
        match self.call(&request).await? {
            Response::Registered { accepted } => Ok(accepted),
            other => Err(unexpected(other)),
        }
    }

    pub async fn submit_decision(&mut self, decision: Decision, id: &str) -> Result<(), PipelineError> {
        let request = Request::SubmitDecision {
            decision,
            id: id.to_string(),
        };
        expect_ack(self.call(&request).await?)
    }

    pub async fn deregister(&mut self, id: &str) -> Result<(), PipelineError> {
        let request = Request::Deregister { id: id.to_string() };
        expect_ack(self.call(&request).await?)
    }
}

fn expect_ack(response: Response) -> Result<(), PipelineError> {
    match response {
        Response::Ack => Ok(()),
        other => Err(unexpected(other)),
    }
}

fn unexpected(response: Response) -> PipelineError {
    match response {
        Response::Error { message } => PipelineError::Remote(message),
        other => PipelineError::Protocol(format!("unexpected response: {:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::server::{self, RpcService};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Echo;

    #[async_trait]
    impl RpcService for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn handle(&self, request: Request) -> Response {
            match request {
                Request::Register { id } => Response::Registered {
                    accepted: id != "taken",
                },
                Request::Deregister { .. } => Response::Ack,
                other => Response::unsupported(&other),
            }
        }
    }

    /// Returns an address nothing listens on.
    async fn closed_addr() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        addr
    }

    #[tokio::test]
    async fn test_refused_connect_stays_disconnected() {
        let mut link = Link::new(closed_addr().await, Duration::from_secs(1));
        let err = link.connect().await.unwrap_err();

        assert!(matches!(err, PipelineError::ConnectionRefused { .. }));
        assert_eq!(link.status(), LinkStatus::Disconnected);
        assert!(matches!(
            link.call(&Request::PullSignal).await,
            Err(PipelineError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_typed_calls() {
        let (addr, _server) = server::spawn("127.0.0.1:0", Arc::new(Echo)).await.unwrap();
        let mut link = Link::new(addr.to_string(), Duration::from_secs(1));
        link.connect().await.unwrap();

        assert!(link.register("alpha").await.unwrap());
        assert!(!link.register("taken").await.unwrap());
        link.deregister("alpha").await.unwrap();

        // A remote error keeps the link usable.
        let err = link.pull_signal().await.unwrap_err();
        assert!(matches!(err, PipelineError::Remote(_)));
        assert!(link.is_connected());
    }

    #[tokio::test]
    async fn test_oversized_request_gets_exactly_one_reply() {
        let (addr, _server) = server::spawn("127.0.0.1:0", Arc::new(Echo)).await.unwrap();
        let mut link = Link::new(addr.to_string(), Duration::from_secs(1));
        link.connect().await.unwrap();

        let huge = "x".repeat(crate::api::codec::MAX_FRAME_BYTES + 1024);
        assert!(matches!(
            link.register(&huge).await,
            Err(PipelineError::Remote(_))
        ));
        assert!(link.is_connected());

        // Replies stay paired with their requests afterwards.
        assert!(link.register("alpha").await.unwrap());
        assert!(!link.register("taken").await.unwrap());
        assert!(link.register("beta").await.unwrap());
    }

    #[tokio::test]
    async fn test_peer_close_marks_link_down() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let mut link = Link::new(addr, Duration::from_secs(1));
        link.connect().await.unwrap();
        let err = link.register("alpha").await.unwrap_err();

        assert!(err.is_transport());
        assert_eq!(link.status(), LinkStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_silent_peer_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let mut link = Link::new(addr, Duration::from_millis(100));
        link.connect().await.unwrap();

        assert!(matches!(
            link.register("alpha").await,
            Err(PipelineError::Timeout)
        ));
        assert!(!link.is_connected());
    }

    #[tokio::test]
    async fn test_call_or_reconnect_recovers() {
        let (addr, _server) = server::spawn("127.0.0.1:0", Arc::new(Echo)).await.unwrap();
        let mut link = Link::new(addr.to_string(), Duration::from_secs(1));

        let response = link
            .call_or_reconnect(&Request::Deregister { id: "a".into() })
            .await
            .unwrap();
        assert_eq!(response, Response::Ack);
        assert!(link.is_connected());
    }
}
