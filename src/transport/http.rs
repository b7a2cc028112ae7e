//! HTTP transport: an axum router served over each tracked connection.
//!
//! # Responsibilities
//! - Bind HTTP ports (`add_port` / `remove_port`)
//! - Serve HTTP/1.1 on every accepted connection
//! - Forward each request to a server selected from the frontend's pools
//!
//! A port whose upstreams have no pools answers every request with
//! `200 OK`, which makes it usable as a bare liveness endpoint.

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{
        uri::{Authority, PathAndQuery, Scheme},
        Request, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
    Router,
};
use futures_util::future::BoxFuture;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioIo},
};
use tokio::net::TcpStream;
use tower::ServiceExt;
use tower_http::trace::TraceLayer;

use crate::config::FrontendKind;
use crate::model::Upstreams;
use crate::net::{ConnectionHandler, Listener, ListenerError, StopReport};
use crate::transport::registry::PortRegistry;

/// State injected into the HTTP handler.
#[derive(Clone)]
struct HttpState {
    upstreams: Arc<Upstreams>,
    client: Client<HttpConnector, Body>,
}

pub struct HttpTransport {
    ports: PortRegistry,
    client: Client<HttpConnector, Body>,
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            ports: PortRegistry::new(),
            client,
        }
    }

    /// Start serving HTTP on `addr` for `upstreams`.
    pub async fn add_port(
        &self,
        addr: SocketAddr,
        upstreams: Arc<Upstreams>,
    ) -> Result<Arc<Listener>, ListenerError> {
        let frontend = upstreams.frontend();
        let router = build_router(HttpState {
            upstreams,
            client: self.client.clone(),
        });
        self.ports
            .bind(addr, frontend, FrontendKind::Http, connection_handler(router))
            .await
    }

    /// Stop serving HTTP on `port`.
    pub async fn remove_port(&self, port: u16) -> Result<StopReport, ListenerError> {
        self.ports.remove_port(port).await
    }

    pub fn registry(&self) -> &PortRegistry {
        &self.ports
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn build_router(state: HttpState) -> Router {
    Router::new()
        .fallback(proxy_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

fn connection_handler(router: Router) -> ConnectionHandler {
    Arc::new(move |stream: TcpStream, peer: SocketAddr| -> BoxFuture<'static, ()> {
        let router = router.clone();
        Box::pin(async move {
            let service = service_fn(move |req: Request<Incoming>| router.clone().oneshot(req));
            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                tracing::debug!(peer_addr = %peer, error = %e, "HTTP connection ended with error");
            }
        })
    })
}

async fn proxy_handler(State(state): State<HttpState>, request: Request<Body>) -> Response {
    if !state.upstreams.has_pools() {
        return (StatusCode::OK, "OK").into_response();
    }

    let lb_request = match state.upstreams.route(request) {
        Ok(r) => r,
        Err(_) => {
            tracing::warn!(frontend = %state.upstreams.frontend(), "No healthy backends");
            return (StatusCode::SERVICE_UNAVAILABLE, "No healthy backends").into_response();
        }
    };

    let backend = lb_request.backend;
    tracing::debug!(
        frontend = %lb_request.frontend,
        pool = lb_request.pool,
        backend = %backend,
        sequence = lb_request.sequence,
        "Forwarding request"
    );

    let (mut parts, body) = lb_request.into_payload().into_parts();
    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Authority::from_str(&backend.to_string()).ok();
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(backend = %backend, error = %e, "Failed to build upstream URI");
            return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
        }
    };

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(backend = %backend, error = %e, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
