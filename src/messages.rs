//! Message types for the measurement worker
//!
//! This module defines the requests a [`WfsClient`](crate::worker::WfsClient)
//! sends to the worker that owns the sensor handle, and the outcomes the
//! worker sends back. Every request carries its own oneshot reply channel.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::oneshot;

use crate::config::MeasurementSettings;
use crate::constants::DeviceStatus;
use crate::driver::{InstrumentInfo, StepStatus};
use crate::error::WfsResult;
use crate::status::Status;

/// Result of one pipeline phase run by the worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome<T> {
    pub value: T,
    /// Mask from the last `get_status` of the phase
    pub device_status: DeviceStatus,
    /// Every call of the phase, in order
    pub steps: Vec<StepStatus>,
    pub completed_at: DateTime<Utc>,
}

impl<T> Outcome<T> {
    pub fn new(value: T, device_status: DeviceStatus, steps: Vec<StepStatus>) -> Self {
        Self {
            value,
            device_status,
            steps,
            completed_at: Utc::now(),
        }
    }

    pub fn first_failure(&self) -> Option<&StepStatus> {
        self.steps.iter().find(|s| !s.status.is_ok())
    }

    pub fn is_ok(&self) -> bool {
        self.first_failure().is_none()
    }
}

/// One `update`: the radius of curvature in mm.
pub type Measurement = Outcome<f64>;

/// Requests handled by the measurement worker
#[derive(Debug)]
pub enum WfsCommand {
    /// Open a sensor (the first listed one unless a resource is named)
    Connect {
        resource_name: Option<String>,
        response: oneshot::Sender<WfsResult<Outcome<InstrumentInfo>>>,
    },

    /// Put the sensor into a known measurement state
    Configure {
        settings: MeasurementSettings,
        response: oneshot::Sender<Outcome<()>>,
    },

    /// Take and analyse one image
    Update {
        response: oneshot::Sender<Measurement>,
    },

    /// Close the session; the worker keeps running
    Disconnect {
        response: oneshot::Sender<Outcome<Status>>,
    },

    /// Close any open session and stop the worker
    Shutdown {
        response: oneshot::Sender<()>,
    },
}

impl WfsCommand {
    /// Helper to create a Connect command
    pub fn connect(
        resource_name: Option<String>,
    ) -> (Self, oneshot::Receiver<WfsResult<Outcome<InstrumentInfo>>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self::Connect {
                resource_name,
                response: tx,
            },
            rx,
        )
    }

    /// Helper to create a Configure command
    pub fn configure(settings: MeasurementSettings) -> (Self, oneshot::Receiver<Outcome<()>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self::Configure {
                settings,
                response: tx,
            },
            rx,
        )
    }

    /// Helper to create an Update command
    pub fn update() -> (Self, oneshot::Receiver<Measurement>) {
        let (tx, rx) = oneshot::channel();
        (Self::Update { response: tx }, rx)
    }

    /// Helper to create a Disconnect command
    pub fn disconnect() -> (Self, oneshot::Receiver<Outcome<Status>>) {
        let (tx, rx) = oneshot::channel();
        (Self::Disconnect { response: tx }, rx)
    }

    /// Helper to create a Shutdown command
    pub fn shutdown() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self::Shutdown { response: tx }, rx)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Configure { .. } => "configure",
            Self::Update { .. } => "update",
            Self::Disconnect { .. } => "disconnect",
            Self::Shutdown { .. } => "shutdown",
        }
    }

    /// `true` once the requester has stopped waiting for the reply.
    pub fn is_withdrawn(&self) -> bool {
        match self {
            Self::Connect { response, .. } => response.is_closed(),
            Self::Configure { response, .. } => response.is_closed(),
            Self::Update { response } => response.is_closed(),
            Self::Disconnect { response } => response.is_closed(),
            Self::Shutdown { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropped_receiver_withdraws_request() {
        let (command, rx) = WfsCommand::update();
        assert!(!command.is_withdrawn());
        drop(rx);
        assert!(command.is_withdrawn());
        assert_eq!(command.name(), "update");

        let (command, rx) = WfsCommand::shutdown();
        drop(rx);
        assert!(!command.is_withdrawn());
    }

    #[test]
    fn outcome_reports_first_failure() {
        let failed = StepStatus {
            op: "zernike_lsf",
            status: Status::parameter(2),
        };
        let ok = StepStatus {
            op: "get_status",
            status: Status::ok(),
        };
        let outcome = Outcome::new(0.0, DeviceStatus::default(), vec![ok.clone(), failed.clone()]);
        assert_eq!(outcome.first_failure(), Some(&failed));
        assert!(!outcome.is_ok());
        assert!(Outcome::new((), DeviceStatus::default(), vec![ok]).is_ok());
    }
}
