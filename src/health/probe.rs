//! Liveness probes.

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use futures_util::future::BoxFuture;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpStream;
use tokio::time;

/// A single liveness check against one backend.
pub trait Probe: Send + Sync + 'static {
    fn check(&self, addr: SocketAddr, timeout: Duration) -> BoxFuture<'_, bool>;
}

/// Passes when a TCP connection can be opened.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpProbe;

impl Probe for TcpProbe {
    fn check(&self, addr: SocketAddr, timeout: Duration) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            match time::timeout(timeout, TcpStream::connect(addr)).await {
                Ok(Ok(_)) => true,
                Ok(Err(e)) => {
                    tracing::warn!(addr = %addr, error = %e, "Health check failed: connection error");
                    false
                }
                Err(_) => {
                    tracing::warn!(addr = %addr, "Health check failed: timeout");
                    false
                }
            }
        })
    }
}

/// Passes when `GET <path>` answers with a success status.
pub struct HttpProbe {
    path: String,
    client: Client<HttpConnector, Body>,
}

impl HttpProbe {
    pub fn new(path: impl Into<String>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            path: path.into(),
            client,
        }
    }
}

impl Probe for HttpProbe {
    fn check(&self, addr: SocketAddr, timeout: Duration) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            let uri = format!("http://{}{}", addr, self.path);
            let request = match Request::builder()
                .method("GET")
                .uri(uri)
                .header("user-agent", "lb-control-health-check")
                .body(Body::empty())
            {
                Ok(req) => req,
                Err(e) => {
                    tracing::error!("Failed to build health check request: {}", e);
                    return false;
                }
            };

            match time::timeout(timeout, self.client.request(request)).await {
                Ok(Ok(response)) => {
                    let success = response.status().is_success();
                    if !success {
                        tracing::warn!(addr = %addr, status = %response.status(), "Health check failed: non-success status");
                    }
                    success
                }
                Ok(Err(e)) => {
                    tracing::warn!(addr = %addr, error = %e, "Health check failed: connection error");
                    false
                }
                Err(_) => {
                    tracing::warn!(addr = %addr, "Health check failed: timeout");
                    false
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn tcp_probe_follows_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(TcpProbe.check(addr, Duration::from_secs(1)).await);

        drop(listener);
        assert!(!TcpProbe.check(addr, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn http_probe_checks_status() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let _ = socket
                    .write_all(b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                    .await;
                let _ = socket.shutdown().await;
            }
        });

        let probe = HttpProbe::new("/health");
        assert!(!probe.check(addr, Duration::from_secs(1)).await);
    }
}
