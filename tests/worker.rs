//! Tests for the offloaded measurement worker.

use rust_wfs::config::MeasurementSettings;
use rust_wfs::driver::Wfs;
use rust_wfs::messages::WfsCommand;
use rust_wfs::sdk::MockWfsSdk;
use rust_wfs::worker::{WfsWorker, DEFAULT_QUEUE};
use rust_wfs::WfsError;
use tokio::sync::mpsc;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_full_measurement_cycle() {
    let sdk = MockWfsSdk::new();
    sdk.state().roc_mm = 1500.0;
    let (client, worker) = WfsWorker::new(Wfs::new(sdk.clone())).spawn(DEFAULT_QUEUE);

    let connected = client.connect(None).await.unwrap();
    assert_eq!(connected.value.name, "WFS150-7AR");
    assert_eq!(connected.steps.len(), 8);
    assert!(connected.is_ok());

    let configured = client.configure(MeasurementSettings::default()).await.unwrap();
    assert_eq!(configured.steps.len(), 19);
    assert!(configured.is_ok());

    for _ in 0..3 {
        let measurement = client.update().await.unwrap();
        assert_eq!(measurement.value, 1500.0);
        assert_eq!(measurement.steps.len(), 13);
        assert_eq!(measurement.steps[12].op, "zernike_lsf");
        assert!(measurement.is_ok());
    }

    let closed = assert_ok!(client.disconnect().await);
    assert!(closed.value.is_ok());

    assert_ok!(client.shutdown().await);
    let wfs = worker.await.unwrap();
    assert!(!wfs.is_open());
    let updates = sdk
        .call_names()
        .into_iter()
        .filter(|op| *op == "zernike_lsf")
        .count();
    assert_eq!(updates, 3);
}

#[tokio::test]
async fn test_connection_error_is_returned() {
    let sdk = MockWfsSdk::new();
    sdk.state().in_use = true;
    let (client, worker) = WfsWorker::new(Wfs::new(sdk)).spawn(DEFAULT_QUEUE);

    let err = assert_err!(client.connect(None).await);
    assert!(matches!(err, WfsError::Connection(_)));

    client.shutdown().await.unwrap();
    worker.await.unwrap();
}

#[tokio::test]
async fn test_withdrawn_request_is_skipped() {
    let sdk = MockWfsSdk::new();
    let (tx, rx) = mpsc::channel(DEFAULT_QUEUE);

    let (connect, connected) = WfsCommand::connect(None);
    let (withdrawn, dropped) = WfsCommand::update();
    let (update, measured) = WfsCommand::update();
    let (shutdown, stopped) = WfsCommand::shutdown();
    drop(dropped);
    for command in [connect, withdrawn, update, shutdown] {
        tx.send(command).await.unwrap();
    }

    let worker = WfsWorker::new(Wfs::new(sdk.clone()));
    let wfs = tokio::task::spawn_blocking(move || worker.run(rx))
        .await
        .unwrap();

    assert!(connected.await.unwrap().is_ok());
    assert!(measured.await.unwrap().is_ok());
    stopped.await.unwrap();
    let takes = sdk
        .call_names()
        .into_iter()
        .filter(|op| op.starts_with("take_spotfield_image"))
        .count();
    assert_eq!(takes, 1);
    assert!(!wfs.is_open());
}

#[tokio::test]
async fn test_dropping_clients_stops_worker() {
    let sdk = MockWfsSdk::new();
    let (client, worker) = WfsWorker::new(Wfs::new(sdk.clone())).spawn(1);

    client.connect(None).await.unwrap();
    drop(client);

    let wfs = worker.await.unwrap();
    assert!(!wfs.is_open());
    assert_eq!(sdk.call_names().last(), Some(&"close"));
}

#[tokio::test]
async fn test_requests_after_shutdown_fail() {
    let (client, worker) = WfsWorker::new(Wfs::new(MockWfsSdk::new())).spawn(DEFAULT_QUEUE);

    client.shutdown().await.unwrap();
    worker.await.unwrap();

    assert!(matches!(client.update().await, Err(WfsError::WorkerUnavailable)));
}
