//! Driver for Thorlabs Shack-Hartmann wavefront sensors.
//!
//! This library wraps the vendor `WFS_32`/`WFS_64` driver library for the
//! WFS150, WFS300, WFS10, WFS20, WFS30 and WFS40 sensors. The driver does
//! the USB protocol and all image processing; this crate owns the session,
//! every buffer the driver writes into, and the order calls have to be made
//! in to get a wavefront, a Zernike fit and a radius of curvature.
//!
//! - [`driver::Wfs`]: one handle per sensor, one method per driver entry point
//! - [`pipeline`]: `connect`, `config`, `update` and `disconnect` on the handle
//! - [`worker`]: the handle on a blocking worker, driven from async code
//! - [`sdk`]: the seam to the vendor library, with a recording test double
//!
//! # Example
//!
//! ```no_run
//! use rust_wfs::config::MeasurementSettings;
//! use rust_wfs::driver::Wfs;
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut wfs = Wfs::load(None)?;
//!     wfs.connect()?;
//!     wfs.config(&MeasurementSettings::default());
//!     let roc_mm = wfs.update();
//!     println!("RoC: {roc_mm} mm");
//!     wfs.disconnect();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod constants;
pub mod driver;
pub mod error;
pub mod logging;
pub mod messages;
pub mod pipeline;
pub mod reference;
pub mod sdk;
pub mod status;
pub mod vi;
pub mod worker;

pub use driver::Wfs;
pub use error::{WfsError, WfsResult};
pub use status::Status;
