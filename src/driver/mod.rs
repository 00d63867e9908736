//! Driver handle.
//!
//! [`Wfs`] owns one vendor session together with every buffer the driver
//! writes into, the current operating parameters, and the fields derived from
//! them. One method per vendor entry point, grouped by function:
//!
//! - [`lifecycle`]: session open/close and support calls
//! - [`discovery`]: instrument enumeration
//! - [`configuration`]: camera, MLA, AOI, pupil, exposure, gain, trigger
//! - [`acquisition`]: images and image statistics
//! - [`analysis`]: spots, Zernike fit, wavefront
//! - [`calibration`]: user reference handling
//!
//! Every operation takes its inputs as `Option`s: `Some` overrides the stored
//! parameter (through the [`Vi`] marshaller), `None` reuses it. Each call
//! decodes the vendor status, logs exactly one event on the `WFS` target and
//! returns the decoded [`Status`] alongside its outputs. Vendor statuses are
//! never turned into `Err`; only host-side failures are.
//!
//! A handle is not meant to be shared: buffers are reused on every call.

use std::collections::VecDeque;
use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::{error, info, warn};
use wfs_sys::{ViInt32, ViSession, ViStatus};

use crate::error::WfsResult;
use crate::reference::detected;
use crate::sdk::{LibrarySdk, WfsSdk};
use crate::status::{Status, StatusKind};
use crate::vi::{Vi, ViCell};

pub mod acquisition;
pub mod analysis;
pub mod calibration;
pub mod configuration;
pub mod discovery;
pub mod lifecycle;
pub mod state;

pub use state::*;

/// Number of per-call statuses kept on the handle.
pub const STEP_HISTORY: usize = 256;

/// Decoded status of one call, in call order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepStatus {
    pub op: &'static str,
    pub status: Status,
}

/// Handle to one wavefront sensor.
pub struct Wfs<S: WfsSdk> {
    sdk: S,
    session: ViCell<ViSession>,
    params: Parameters,
    derived: Derived,
    instrument: InstrumentInfo,
    results: Results,
    buffers: Buffers,
    steps: VecDeque<StepStatus>,
}

impl Wfs<LibrarySdk> {
    /// Handle over the vendor library, looked up at `path` first.
    pub fn load(path: Option<&Path>) -> WfsResult<Self> {
        Ok(Self::new(LibrarySdk::load(path)?))
    }
}

impl<S: WfsSdk> Wfs<S> {
    pub fn new(sdk: S) -> Self {
        Self::with_parameters(sdk, Parameters::default())
    }

    pub fn with_parameters(sdk: S, params: Parameters) -> Self {
        Self {
            sdk,
            session: Vi::session(0),
            params,
            derived: Derived::default(),
            instrument: InstrumentInfo::default(),
            results: Results::default(),
            buffers: Buffers::new(),
            steps: VecDeque::with_capacity(STEP_HISTORY),
        }
    }

    pub fn sdk(&self) -> &S {
        &self.sdk
    }

    /// Session handle; 0 while closed.
    pub fn session(&self) -> ViSession {
        self.session.value()
    }

    pub fn is_open(&self) -> bool {
        self.session.value() != 0
    }

    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    pub fn parameters_mut(&mut self) -> &mut Parameters {
        &mut self.params
    }

    pub fn derived(&self) -> &Derived {
        &self.derived
    }

    pub fn instrument(&self) -> &InstrumentInfo {
        &self.instrument
    }

    pub fn results(&self) -> &Results {
        &self.results
    }

    pub fn buffers(&self) -> &Buffers {
        &self.buffers
    }

    /// Statuses of the most recent calls, oldest first.
    pub fn steps(&self) -> impl Iterator<Item = &StepStatus> {
        self.steps.iter()
    }

    pub fn take_steps(&mut self) -> Vec<StepStatus> {
        self.steps.drain(..).collect()
    }

    /// First recorded step that did not succeed.
    pub fn first_failure(&self) -> Option<&StepStatus> {
        self.steps.iter().find(|s| !s.status.is_ok())
    }

    /// Centroid of the spot at `(row, column)` in pixels, `None` when the
    /// spot was not detected or lies outside the active grid.
    pub fn centroid(&self, row: usize, column: usize) -> Option<(f32, f32)> {
        let (columns, rows) = self.derived.active_spots();
        if row >= rows || column >= columns {
            return None;
        }
        let x = detected(self.buffers.centroid_x.get(row, column)?)?;
        let y = detected(self.buffers.centroid_y.get(row, column)?)?;
        Some((x, y))
    }

    // ---- shared call plumbing ---------------------------------------------

    fn vi(&self) -> ViSession {
        self.session.value()
    }

    /// Success and warnings decode locally; everything else asks the driver.
    fn describe(&mut self, raw: ViStatus) -> Status {
        if let Some(status) = Status::local(raw) {
            return status;
        }
        let vi = self.vi();
        let buffer = &mut self.buffers.error_message;
        buffer.clear();
        let looked_up = self.sdk.error_message(vi, raw, buffer.as_mut_bytes());
        let message = if looked_up == 0 {
            buffer.to_string_lossy()
        } else {
            format!("Unknown status code {raw}")
        };
        Status::error(raw, message)
    }

    /// Decodes `raw` and records it as the outcome of `op`.
    fn decode(&mut self, op: &'static str, raw: ViStatus) -> Status {
        let status = self.describe(raw);
        self.record(op, &status);
        status
    }

    /// Host-side range rejection of parameter `n`; the vendor is not called.
    fn reject(&mut self, op: &'static str, n: u8, detail: fmt::Arguments<'_>) -> Status {
        let status = Status::parameter(n);
        self.record(op, &status);
        self.log(op, &status, detail);
        status
    }

    fn record(&mut self, op: &'static str, status: &Status) {
        if self.steps.len() == STEP_HISTORY {
            self.steps.pop_front();
        }
        self.steps.push_back(StepStatus {
            op,
            status: status.clone(),
        });
    }

    /// The one log event of a call.
    fn log(&self, op: &'static str, status: &Status, detail: fmt::Arguments<'_>) {
        let session = self.vi();
        match status.kind {
            StatusKind::Success => info!(target: "WFS", op, session, "{detail}"),
            StatusKind::Warning => warn!(
                target: "WFS",
                op,
                session,
                code = status.raw,
                message = %status.message,
                "{detail}"
            ),
            _ => error!(
                target: "WFS",
                op,
                session,
                code = status.code,
                message = %status.message,
                "{detail}"
            ),
        }
    }
}

impl<S: WfsSdk> fmt::Debug for Wfs<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wfs")
            .field("session", &self.session.value())
            .field("family", &self.instrument.family)
            .field("derived", &self.derived)
            .finish_non_exhaustive()
    }
}

// ---- argument marshalling ---------------------------------------------------

fn real(value: Option<f64>, current: f64) -> f64 {
    value.map_or(current, |v| Vi::real64(v).value())
}

fn int(value: Option<ViInt32>, current: ViInt32) -> ViInt32 {
    value.map_or(current, |v| Vi::int32(v).value())
}

fn flag(value: Option<bool>, current: bool) -> bool {
    value.map_or(current, |v| Vi::boolean(v).value() != 0)
}

/// `ViInt32` form of a flag, as the driver's integer switches expect.
fn switch(value: bool) -> ViInt32 {
    ViInt32::from(value)
}
