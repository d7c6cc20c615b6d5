use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::codec::{read_frame, write_frame};
use super::types::{Request, Response};
use crate::core::PipelineError;

/// Request handler exposed by one role over the wire.
#[async_trait]
pub trait RpcService: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn handle(&self, request: Request) -> Response;
}

pub async fn bind(addr: &str) -> Result<TcpListener, PipelineError> {
    let listener = TcpListener::bind(addr).await?;
    info!("📡 Listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Accept loop. Every connection gets its own task; requests on one
/// connection are answered in order, one at a time.
pub async fn serve<S: RpcService>(listener: TcpListener, service: Arc<S>) {
    info!("📡 Serving {} requests", service.name());

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!("🔗 Accepted connection from {}", peer);
                let service = service.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, peer, service).await {
                        warn!("⚠️  Connection from {} ended with error: {}", peer, e);
                    }
                });
            }
            Err(e) => {
                // Usually descriptor exhaustion; back off instead of spinning.
                error!("❌ Accept failed: {}", e);
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

/// Binds `addr` and serves `service` on a background task.
pub async fn spawn<S: RpcService>(
    addr: &str,
    service: Arc<S>,
) -> Result<(SocketAddr, JoinHandle<()>), PipelineError> {
    let listener = bind(addr).await?;
    let local_addr = listener.local_addr()?;
    let handle = tokio::spawn(serve(listener, service));
    Ok((local_addr, handle))
}

async fn handle_connection<S: RpcService>(
    stream: TcpStream,
    peer: SocketAddr,
    service: Arc<S>,
) -> Result<(), PipelineError> {
    stream.set_nodelay(true)?;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        let request = match read_frame::<_, Request>(&mut reader).await {
            Ok(Some(request)) => request,
            Ok(None) => {
                debug!("🔌 {} closed the connection", peer);
                return Ok(());
            }
            Err(PipelineError::Protocol(message)) => {
                // read_frame consumed the whole offending line.
                warn!("⚠️  Malformed request from {}: {}", peer, message);
                write_frame(&mut write_half, &Response::Error { message }).await?;
                continue;
            }
            Err(e) => return Err(e),
        };

        debug!("📥 {} -> {}", peer, request.method());
        let response = service.handle(request).await;
        write_frame(&mut write_half, &response).await?;
    }
}
