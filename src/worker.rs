//! Offloaded measurement worker.
//!
//! One worker owns the sensor handle for its whole life and serves
//! [`WfsCommand`]s one at a time. Vendor calls block, so the loop runs on
//! Tokio's blocking pool and async callers talk to it through a
//! [`WfsClient`].
//!
//! A request whose requester has gone away before the worker reaches it is
//! skipped. Once a request is dispatched it runs to completion: the vendor
//! library cannot be interrupted mid-call.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::MeasurementSettings;
use crate::driver::{InstrumentInfo, Wfs};
use crate::error::{WfsError, WfsResult};
use crate::messages::{Measurement, Outcome, WfsCommand};
use crate::sdk::WfsSdk;
use crate::status::Status;

/// Default request queue depth.
pub const DEFAULT_QUEUE: usize = 8;

/// Owns a [`Wfs`] handle and serves requests against it.
pub struct WfsWorker<S: WfsSdk> {
    wfs: Wfs<S>,
}

impl<S: WfsSdk + 'static> WfsWorker<S> {
    pub fn new(wfs: Wfs<S>) -> Self {
        Self { wfs }
    }

    /// Starts the worker on the blocking pool.
    ///
    /// The join handle yields the handle back once the worker stops, either
    /// on `Shutdown` or when every client is gone.
    pub fn spawn(self, queue: usize) -> (WfsClient, JoinHandle<Wfs<S>>) {
        let (tx, rx) = mpsc::channel(queue.max(1));
        let task = tokio::task::spawn_blocking(move || self.run(rx));
        (WfsClient { tx }, task)
    }

    /// Runs the request loop on the current thread until shutdown.
    pub fn run(mut self, mut command_rx: mpsc::Receiver<WfsCommand>) -> Wfs<S> {
        info!(target: "WFS", "worker started");

        while let Some(command) = command_rx.blocking_recv() {
            if command.is_withdrawn() {
                warn!(
                    target: "WFS",
                    request = command.name(),
                    error = %WfsError::Cancelled,
                    "skipping request"
                );
                continue;
            }

            match command {
                WfsCommand::Connect {
                    resource_name,
                    response,
                } => {
                    let result = self.connect(resource_name.as_deref());
                    let _ = response.send(result);
                }

                WfsCommand::Configure { settings, response } => {
                    let outcome = self.configure(&settings);
                    let _ = response.send(outcome);
                }

                WfsCommand::Update { response } => {
                    let measurement = self.update();
                    let _ = response.send(measurement);
                }

                WfsCommand::Disconnect { response } => {
                    let outcome = self.disconnect();
                    let _ = response.send(outcome);
                }

                WfsCommand::Shutdown { response } => {
                    self.close_if_open();
                    let _ = response.send(());
                    info!(target: "WFS", "worker stopped");
                    return self.wfs;
                }
            }
        }

        self.close_if_open();
        info!(target: "WFS", "worker stopped, all clients gone");
        self.wfs
    }

    fn connect(&mut self, resource_name: Option<&str>) -> WfsResult<Outcome<InstrumentInfo>> {
        let device_status = self.wfs.connect_resource(resource_name)?;
        let info = self.wfs.instrument().clone();
        Ok(Outcome::new(info, device_status, self.wfs.take_steps()))
    }

    fn configure(&mut self, settings: &MeasurementSettings) -> Outcome<()> {
        let device_status = self.wfs.config(settings);
        Outcome::new((), device_status, self.wfs.take_steps())
    }

    fn update(&mut self) -> Measurement {
        let roc_mm = self.wfs.update();
        let device_status = self.wfs.results().device_status;
        Outcome::new(roc_mm, device_status, self.wfs.take_steps())
    }

    fn disconnect(&mut self) -> Outcome<Status> {
        let status = self.wfs.disconnect();
        let device_status = self.wfs.results().device_status;
        Outcome::new(status, device_status, self.wfs.take_steps())
    }

    fn close_if_open(&mut self) {
        if self.wfs.is_open() {
            self.wfs.disconnect();
        }
    }
}

/// Async front of a running [`WfsWorker`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct WfsClient {
    tx: mpsc::Sender<WfsCommand>,
}

impl WfsClient {
    pub async fn connect(
        &self,
        resource_name: Option<String>,
    ) -> WfsResult<Outcome<InstrumentInfo>> {
        self.request(WfsCommand::connect(resource_name)).await?
    }

    pub async fn configure(&self, settings: MeasurementSettings) -> WfsResult<Outcome<()>> {
        self.request(WfsCommand::configure(settings)).await
    }

    pub async fn update(&self) -> WfsResult<Measurement> {
        self.request(WfsCommand::update()).await
    }

    pub async fn disconnect(&self) -> WfsResult<Outcome<Status>> {
        self.request(WfsCommand::disconnect()).await
    }

    /// Stops the worker after closing any open session.
    pub async fn shutdown(&self) -> WfsResult<()> {
        self.request(WfsCommand::shutdown()).await
    }

    /// Queues a prepared command. The reply arrives on `rx`; dropping `rx`
    /// before the worker gets to the command withdraws it.
    pub async fn send(&self, command: WfsCommand) -> WfsResult<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| WfsError::WorkerUnavailable)
    }

    async fn request<T>(&self, (command, rx): (WfsCommand, oneshot::Receiver<T>)) -> WfsResult<T> {
        self.send(command).await?;
        rx.await.map_err(|_| WfsError::WorkerUnavailable)
    }
}
