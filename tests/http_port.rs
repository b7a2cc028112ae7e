//! Direct use of the HTTP transport's port operations.

mod common;

use std::sync::Arc;

use common::*;
use lb_control::config::FrontendKind;
use lb_control::model::Upstreams;
use lb_control::net::ListenerError;
use lb_control::transport::Transports;

#[tokio::test]
async fn bare_http_port_answers_ok_until_removed() {
    let transports = Transports::new();
    let port = free_port();

    transports
        .http()
        .add_port(local(port), Arc::new(Upstreams::detached(FrontendKind::Http)))
        .await
        .unwrap();
    assert_eq!(transports.http().registry().ports(), vec![port]);

    let response = http_client()
        .get(format!("http://{}/", local(port)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");

    transports.http().remove_port(port).await.unwrap();
    assert!(http_client()
        .get(format!("http://{}/", local(port)))
        .send()
        .await
        .is_err());

    assert!(matches!(
        transports.http().remove_port(port).await,
        Err(ListenerError::NotBound(p)) if p == port
    ));
}

#[tokio::test]
async fn binding_a_taken_port_fails() {
    let transports = Transports::new();
    let port = free_port();
    let upstreams = Arc::new(Upstreams::detached(FrontendKind::Http));

    transports.http().add_port(local(port), upstreams.clone()).await.unwrap();
    let err = transports.http().add_port(local(port), upstreams).await.unwrap_err();
    assert!(matches!(err, ListenerError::Bind { .. }));

    transports.http().remove_port(port).await.unwrap();
}

#[tokio::test]
async fn udp_ports_are_accepted_without_sockets() {
    let transports = Transports::new();
    let bound = transports
        .add_port(FrontendKind::Udp, local(free_port()), Arc::new(Upstreams::detached(FrontendKind::Udp)))
        .await
        .unwrap();
    assert!(bound.is_none());
}
