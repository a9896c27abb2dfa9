//! Status API over real HTTP.

use autoheal::heal::RestartStore;
use autoheal::status;
use chrono::Utc;
use serde_json::{Value, json};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;

async fn start_server(store: RestartStore) -> (SocketAddr, watch::Sender<bool>, tokio::task::JoinHandle<std::io::Result<()>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(status::serve(listener, store, shutdown_rx));
    (addr, shutdown_tx, handle)
}

#[tokio::test]
async fn test_ping() {
    let (addr, shutdown_tx, handle) = start_server(RestartStore::new()).await;

    let resp = reqwest::get(format!("http://{addr}/ping")).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "pong");

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_container_endpoints() {
    let store = RestartStore::new();
    let (addr, shutdown_tx, handle) = start_server(store.clone()).await;
    let client = reqwest::Client::new();

    let body: Value = client
        .get(format!("http://{addr}/containers"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({ "status": "no value" }));

    store
        .observe("4f1c2a9e7b3d", "web", Utc::now(), |r, _| r.restart_count = 3)
        .await;

    let body: Value = client
        .get(format!("http://{addr}/containers"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let body: Value = client
        .get(format!("http://{addr}/container/web"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["id"], "4f1c2a9e7b3d");
    assert_eq!(body["restart_count"], 3);
    assert_eq!(body["restarting"], false);

    let resp = client
        .get(format!("http://{addr}/container/db"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "container": "db", "status": "no value" }));

    drop(shutdown_tx);
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (addr, shutdown_tx, handle) = start_server(RestartStore::new()).await;

    let resp = reqwest::get(format!("http://{addr}/metrics")).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}
