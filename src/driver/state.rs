//! State owned by a driver handle: marshalled buffers, operating parameters,
//! derived fields and the outputs of the most recent calls.

use serde::Serialize;
use wfs_sys::{ViInt32, ViReal32, ViReal64, ViUInt8};

use crate::constants::{
    DeviceStatus, InstrumentFamily, CAM_MAX_PIX_X, CAM_MAX_PIX_Y, MAX_SPOTS_X, MAX_SPOTS_Y,
    MAX_ZERNIKE_MODES, MAX_ZERNIKE_ORDERS, PIXEL_FORMAT_MONO8, WFS_BUFFER_SIZE,
    WFS_ERR_DESCR_BUFFER_SIZE, WFS_REF_INTERNAL, WFS_HW_TRIGGER_OFF, ZERNIKE_ORDERS_AUTO,
};
use crate::sdk::MlaCalibration;
use crate::vi::{CharBuf, ViArray};

// =============================================================================
// Buffers
// =============================================================================

/// Every buffer the driver writes into, allocated once at the static maxima.
#[derive(Debug, Clone)]
pub struct Buffers {
    /// Spotfield image, `CAM_MAX_PIX_Y` rows of `CAM_MAX_PIX_X`.
    pub image: ViArray<ViUInt8>,
    /// Address of the driver-owned image last reported by `get_spotfield_image`.
    pub image_address: usize,

    pub centroid_x: ViArray<ViReal32>,
    pub centroid_y: ViArray<ViReal32>,
    pub diameter_x: ViArray<ViReal32>,
    pub diameter_y: ViArray<ViReal32>,
    pub intensity: ViArray<ViReal32>,
    pub deviation_x: ViArray<ViReal32>,
    pub deviation_y: ViArray<ViReal32>,
    pub reference_x: ViArray<ViReal32>,
    pub reference_y: ViArray<ViReal32>,
    /// User reference staged for `set_calc_spots_to_user_reference`.
    pub user_reference_x: ViArray<ViReal32>,
    pub user_reference_y: ViArray<ViReal32>,
    pub wavefront: ViArray<ViReal32>,
    /// Staged input of `convert_wavefront_waves` and `flip_2d_array`.
    pub wavefront_in: ViArray<ViReal32>,
    /// Wavefront in waves.
    pub wavefront_waves: ViArray<ViReal32>,
    pub flipped: ViArray<ViReal32>,

    pub line_min: ViArray<ViReal32>,
    pub line_max: ViArray<ViReal32>,
    pub line_selected: ViArray<ViReal32>,
    pub scale_x: ViArray<ViReal32>,
    pub scale_y: ViArray<ViReal32>,

    /// Zernike coefficients in µm, index 1..=modes.
    pub zernike_um: ViArray<ViReal32>,
    /// RMS per Zernike order in µm, index 1..=orders.
    pub zernike_orders_rms_um: ViArray<ViReal32>,
    /// Modes included in the reconstruction, index 1..=modes.
    pub zernike_reconstruct: ViArray<ViUInt8>,

    pub window_start_x: Vec<ViInt32>,
    pub window_start_y: Vec<ViInt32>,

    pub resource_name: CharBuf,
    pub manufacturer: CharBuf,
    pub instrument_name: CharBuf,
    pub serial_wfs: CharBuf,
    pub serial_cam: CharBuf,
    pub driver_revision: CharBuf,
    pub firmware_revision: CharBuf,
    pub mla_name: CharBuf,
    pub self_test_message: CharBuf,
    pub error_message: CharBuf,
}

fn spot_grid() -> ViArray<ViReal32> {
    ViArray::zeroed_2d(MAX_SPOTS_X, MAX_SPOTS_Y)
}

fn text() -> CharBuf {
    CharBuf::with_capacity(WFS_BUFFER_SIZE)
}

impl Buffers {
    pub fn new() -> Self {
        Self {
            image: ViArray::zeroed_2d(CAM_MAX_PIX_X, CAM_MAX_PIX_Y),
            image_address: 0,
            centroid_x: spot_grid(),
            centroid_y: spot_grid(),
            diameter_x: spot_grid(),
            diameter_y: spot_grid(),
            intensity: spot_grid(),
            deviation_x: spot_grid(),
            deviation_y: spot_grid(),
            reference_x: spot_grid(),
            reference_y: spot_grid(),
            user_reference_x: spot_grid(),
            user_reference_y: spot_grid(),
            wavefront: spot_grid(),
            wavefront_in: spot_grid(),
            wavefront_waves: spot_grid(),
            flipped: spot_grid(),
            line_min: ViArray::zeroed_1d(CAM_MAX_PIX_X),
            line_max: ViArray::zeroed_1d(CAM_MAX_PIX_X),
            line_selected: ViArray::zeroed_1d(CAM_MAX_PIX_X),
            scale_x: ViArray::zeroed_1d(MAX_SPOTS_X),
            scale_y: ViArray::zeroed_1d(MAX_SPOTS_Y),
            zernike_um: ViArray::zeroed_1d(MAX_ZERNIKE_MODES + 1),
            zernike_orders_rms_um: ViArray::zeroed_1d(MAX_ZERNIKE_ORDERS + 1),
            zernike_reconstruct: ViArray::zeroed_1d(MAX_ZERNIKE_MODES + 1),
            window_start_x: vec![0; MAX_SPOTS_X],
            window_start_y: vec![0; MAX_SPOTS_Y],
            resource_name: text(),
            manufacturer: text(),
            instrument_name: text(),
            serial_wfs: text(),
            serial_cam: text(),
            driver_revision: text(),
            firmware_revision: text(),
            mla_name: text(),
            self_test_message: text(),
            error_message: CharBuf::with_capacity(WFS_ERR_DESCR_BUFFER_SIZE),
        }
    }
}

impl Default for Buffers {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Parameters
// =============================================================================

/// Centre and extent of a rectangle or ellipse on the sensor, in mm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Rect {
    pub center_x_mm: f64,
    pub center_y_mm: f64,
    pub size_x_mm: f64,
    pub size_y_mm: f64,
}

/// Minimum, maximum and step of a settable quantity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Span<T> {
    pub min: T,
    pub max: T,
    pub increment: T,
}

/// Highspeed mode switches, as last sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HighspeedMode {
    pub enabled: bool,
    pub adapt_centroids: bool,
    pub subtract_offset: bool,
    pub allow_auto_exposure: bool,
}

/// Current operating parameters: the values the next call without explicit
/// arguments will send.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameters {
    pub id_query: bool,
    pub reset_device: bool,
    pub list_index: ViInt32,

    pub pixel_format: ViInt32,
    pub resolution_index: ViInt32,
    pub mla_index: ViInt32,
    pub aoi: Rect,
    pub pupil: Rect,
    pub reference_plane: ViInt32,

    pub exposure_time_ms: f64,
    pub master_gain: f64,
    pub black_level_offset: ViInt32,
    pub trigger_mode: ViInt32,
    pub trigger_delay_us: ViInt32,
    pub highspeed: HighspeedMode,

    pub average_count: ViInt32,
    pub rolling_reset: bool,
    pub intensity_limit: ViInt32,
    pub allow_auto_exposure: bool,
    pub line: ViInt32,

    pub dynamic_noise_cut: bool,
    pub calculate_diameters: bool,
    pub cancel_wavefront_tilt: bool,
    pub zernike_orders: ViInt32,
    pub fourier_order: ViInt32,
    pub do_spherical_reference: bool,
    pub wavefront_type: ViInt32,
    pub limit_to_pupil: bool,
    pub wavelength_nm: f64,
    pub spot_ref_type: ViInt32,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            id_query: true,
            reset_device: true,
            list_index: 0,
            pixel_format: PIXEL_FORMAT_MONO8,
            resolution_index: 0,
            mla_index: 0,
            aoi: Rect::default(),
            pupil: Rect {
                size_x_mm: 4.76,
                size_y_mm: 4.76,
                ..Rect::default()
            },
            reference_plane: WFS_REF_INTERNAL,
            exposure_time_ms: 1.0,
            master_gain: 1.0,
            black_level_offset: 0,
            trigger_mode: WFS_HW_TRIGGER_OFF,
            trigger_delay_us: 0,
            highspeed: HighspeedMode::default(),
            average_count: 1,
            rolling_reset: false,
            intensity_limit: 10,
            allow_auto_exposure: true,
            line: 0,
            dynamic_noise_cut: true,
            calculate_diameters: false,
            cancel_wavefront_tilt: true,
            zernike_orders: ZERNIKE_ORDERS_AUTO,
            fourier_order: 2,
            do_spherical_reference: false,
            wavefront_type: 0,
            limit_to_pupil: false,
            wavelength_nm: 633.0,
            spot_ref_type: 0,
        }
    }
}

// =============================================================================
// Derived and reported state
// =============================================================================

/// Fields computed from other state rather than reported directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Derived {
    pub cam_resolution_x: ViInt32,
    pub cam_resolution_y: ViInt32,
    pub cam_resolution_factor: ViInt32,
    pub spots_x: ViInt32,
    pub spots_y: ViInt32,
    pub zernike_modes: usize,
}

impl Derived {
    /// Active spot grid extent `(columns, rows)`, clamped to the buffers.
    pub fn active_spots(&self) -> (usize, usize) {
        (
            usize::try_from(self.spots_x).unwrap_or(0).min(MAX_SPOTS_X),
            usize::try_from(self.spots_y).unwrap_or(0).min(MAX_SPOTS_Y),
        )
    }
}

/// What the handle knows about the attached instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InstrumentInfo {
    pub count: ViInt32,
    pub device_id: ViInt32,
    pub in_use: bool,
    pub resource_name: String,
    pub manufacturer: String,
    pub name: String,
    pub serial_wfs: String,
    pub serial_cam: String,
    pub driver_revision: String,
    pub firmware_revision: String,
    pub family: Option<InstrumentFamily>,
    pub mla_count: ViInt32,
    pub mla: Option<Mla>,
}

/// Microlens array name and calibration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Mla {
    pub index: ViInt32,
    pub name: String,
    pub calibration: MlaCalibration,
}

/// One row of the instrument list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListedInstrument {
    pub device_id: ViInt32,
    pub in_use: bool,
    pub name: String,
    pub serial_wfs: String,
    pub resource_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Revision {
    pub driver: String,
    pub firmware: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelfTest {
    pub result: i16,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorQuery {
    pub code: ViInt32,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HighspeedWindows {
    pub count_x: ViInt32,
    pub count_y: ViInt32,
    pub size_x: ViInt32,
    pub size_y: ViInt32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AutoExposure {
    pub exposure_time_ms: f64,
    pub master_gain: f64,
}

/// Extent of the last image read back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImageExtent {
    pub rows: ViInt32,
    pub columns: ViInt32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ImageMinMax {
    pub min: ViInt32,
    pub max: ViInt32,
    pub saturated_pixels_percent: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Noise {
    pub mean: f64,
    pub rms: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BeamGeometry {
    pub centroid_x_mm: f64,
    pub centroid_y_mm: f64,
    pub diameter_x_mm: f64,
    pub diameter_y_mm: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SpotDiameterStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Outcome of a Zernike fit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ZernikeFit {
    /// Order actually fitted (the driver picks one when asked for auto).
    pub orders: ViInt32,
    pub modes: usize,
    pub roc_mm: f64,
}

/// Sphero-cylindrical description of the low-order aberrations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FourierOptometric {
    pub m: f64,
    pub j0: f64,
    pub j45: f64,
    pub sphere: f64,
    pub cylinder: f64,
    pub axis_deg: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FitError {
    pub mean: f64,
    pub stdev: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WavefrontStatistics {
    pub min: f64,
    pub max: f64,
    pub diff: f64,
    pub mean: f64,
    pub rms: f64,
    pub weighted_rms: f64,
}

/// Outputs of interest from the most recent calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Results {
    pub device_status: DeviceStatus,
    pub exposure_range: Span<ViReal64>,
    pub master_gain_range: Span<ViReal64>,
    pub trigger_delay_range: Span<ViInt32>,
    pub highspeed_windows: HighspeedWindows,
    pub image: ImageExtent,
    pub average_data_ready: bool,
    pub image_min_max: ImageMinMax,
    pub noise: Noise,
    pub beam: BeamGeometry,
    pub spot_diameters: SpotDiameterStatistics,
    pub zernike: ZernikeFit,
    pub fourier: FourierOptometric,
    pub fit_error: FitError,
    pub wavefront: WavefrontStatistics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_are_allocated_at_maxima() {
        let buffers = Buffers::new();
        assert_eq!(buffers.image.len(), CAM_MAX_PIX_X * CAM_MAX_PIX_Y);
        assert_eq!(buffers.centroid_x.rows(), MAX_SPOTS_Y);
        assert_eq!(buffers.centroid_x.columns(), MAX_SPOTS_X);
        assert_eq!(buffers.zernike_um.len(), MAX_ZERNIKE_MODES + 1);
        assert_eq!(buffers.zernike_orders_rms_um.len(), MAX_ZERNIKE_ORDERS + 1);
        assert_eq!(buffers.error_message.capacity(), WFS_ERR_DESCR_BUFFER_SIZE);
        assert!(buffers.wavefront.as_slice().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn active_spots_are_clamped() {
        let derived = Derived {
            spots_x: 120,
            spots_y: -1,
            ..Derived::default()
        };
        assert_eq!(derived.active_spots(), (MAX_SPOTS_X, 0));
    }
}
