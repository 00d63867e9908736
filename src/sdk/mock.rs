//! Recording WFS driver double.
//!
//! Simulates a single WFS150 on USB without touching hardware. Every entry
//! point appends a [`MockCall`] to a shared log before doing anything else,
//! so tests can assert on exact call sequences. Outputs come from a shared
//! [`MockState`] that tests script before (or between) calls.
//!
//! The range checks the real driver performs on its side (MLA index, AOI and
//! pupil geometry, gain, black level, trigger delay) are reproduced so that
//! parameter errors reach the handle the same way.
//!
//! # Example
//!
//! ```rust,ignore
//! let sdk = MockWfsSdk::new();
//! sdk.state().roc_mm = 1234.5;
//! let mut wfs = Wfs::new(sdk.clone());
//! wfs.connect(&MeasurementSettings::default())?;
//! assert_eq!(sdk.call_names()[0], "get_instrument_list_len");
//! ```

use std::collections::HashMap;
use std::ffi::CStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use wfs_sys::{
    ViBoolean, ViInt16, ViInt32, ViReal32, ViReal64, ViSession, ViStatus, ViUInt8,
};

use super::{MlaCalibration, WfsSdk};
use crate::constants::*;

// =============================================================================
// Call log
// =============================================================================

/// One recorded driver call: operation name and its scalar inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub op: &'static str,
    pub args: Vec<f64>,
}

// =============================================================================
// Scripted state
// =============================================================================

/// Everything the simulated instrument reports.
#[derive(Debug, Clone)]
pub struct MockState {
    pub instrument_count: ViInt32,
    pub device_id: ViInt32,
    pub in_use: bool,
    pub manufacturer: String,
    pub instrument_name: String,
    pub serial_wfs: String,
    pub serial_cam: String,
    pub driver_revision: String,
    pub firmware_revision: String,
    /// Handle `init` returns.
    pub session: ViSession,
    pub open: bool,
    pub device_status: ViInt32,

    pub mla_count: ViInt32,
    pub mla_name: String,
    pub mla: MlaCalibration,
    pub mla_index: ViInt32,

    pub spots: (ViInt32, ViInt32),
    /// `(rows, columns)` of the spotfield image.
    pub image_size: (ViInt32, ViInt32),
    /// Active sensor area `(x, y)` in mm.
    pub sensor_mm: (f64, f64),

    pub exposure_range: (f64, f64, f64),
    pub exposure: f64,
    pub master_gain_range: (f64, f64),
    pub master_gain: f64,
    pub black_level: ViInt32,
    pub trigger_mode: ViInt32,
    pub trigger_delay_range: (ViInt32, ViInt32, ViInt32),
    pub trigger_delay: ViInt32,
    pub aoi: [f64; 4],
    pub pupil: [f64; 4],
    pub reference_plane: ViInt32,
    pub highspeed: bool,
    pub user_reference: bool,
    pub average_progress: ViInt32,

    pub roc_mm: f64,
    /// Order `zernike_lsf` settles on when asked for auto.
    pub zernike_auto_order: ViInt32,
    /// Grid positions `(row, column)` reported as undetected (0.0).
    pub missing_spots: Vec<(usize, usize)>,

    /// Status forced onto an operation, by name. Sticky until removed.
    pub forced: HashMap<&'static str, ViStatus>,
    /// Text `error_message` hands out per code.
    pub messages: HashMap<ViStatus, String>,
}

impl Default for MockState {
    fn default() -> Self {
        let messages = [
            (WFS_ERROR_NO_SENSOR_CONNECTED, "No Wavefront Sensor connected!"),
            (WFS_ERROR_OUT_OF_MEMORY, "Out of memory!"),
            (WFS_ERROR_INVALID_HANDLE, "Wrong Instrument handle!"),
            (WFS_ERROR_PIXEL_FORMAT, "Pixel format not supported!"),
            (WFS_ERROR_NO_REF_FILE, "No reference file found!"),
            (WFS_ERROR_CORRUPT_REF_FILE, "Corrupt refernce file!"),
            (WFS_ERROR_WRITE_FILE, "Reference file write error!"),
            (WFS_ERROR_INSUFF_SPOTS_FOR_ZERNFIT, "Insufficient spots for Zernike fit!"),
            (WFS_ERROR_FOURIER_ORDER, "Fourier order must not exceed Zernike order!"),
            (WFS_ERROR_NO_PUPIL_DEFINED, "Pupil not yet defined!"),
            (WFS_ERROR_ROC_RANGE, "RoC out of range!"),
            (WFS_ERROR_NO_USER_REFERENCE, "No User Reference available!"),
            (WFS_ERROR_AWAITING_TRIGGER, "Function is awaiting a hardware trigger!"),
            (WFS_ERROR_HIGHSPEED_NOT_ACTIVE, "Highspeed Mode is not active!"),
            (WFS_ERROR_NO_SPOT_DETECTED, "Spot not detectable!"),
        ]
        .into_iter()
        .map(|(code, text)| (code, text.to_string()))
        .chain((1..=9).map(|n| (parameter_error(n), format!("Parameter {n} out of range!"))))
        .collect();

        Self {
            instrument_count: 1,
            device_id: 1,
            in_use: false,
            manufacturer: "Thorlabs GmbH".to_string(),
            instrument_name: "WFS150-7AR".to_string(),
            serial_wfs: "M00412345".to_string(),
            serial_cam: "4002876543".to_string(),
            driver_revision: "5.2".to_string(),
            firmware_revision: "1.0".to_string(),
            session: 0x0100_0001,
            open: false,
            device_status: 0,
            mla_count: 1,
            mla_name: "MLA150-7AR".to_string(),
            mla: MlaCalibration {
                cam_pitch_um: 4.65,
                lenslet_pitch_um: 150.0,
                lenslet_f_um: 3716.0,
                ..MlaCalibration::default()
            },
            mla_index: 0,
            spots: (0, 0),
            image_size: (1024, 1280),
            sensor_mm: (7.2, 5.4),
            exposure_range: (0.079, 65.0, 0.001),
            exposure: 1.0,
            master_gain_range: (1.0, 5.0),
            master_gain: 1.0,
            black_level: 0,
            trigger_mode: 0,
            trigger_delay_range: (15, 4_000_000, 1),
            trigger_delay: 15,
            aoi: [0.0; 4],
            pupil: [0.0, 0.0, 4.76, 4.76],
            reference_plane: 0,
            highspeed: false,
            user_reference: false,
            average_progress: 0,
            roc_mm: 2500.0,
            zernike_auto_order: 4,
            missing_spots: Vec::new(),
            forced: HashMap::new(),
            messages,
        }
    }
}

impl MockState {
    fn family(&self) -> InstrumentFamily {
        InstrumentFamily::from_name(&self.instrument_name)
            .unwrap_or_else(|| InstrumentFamily::from_device_id(self.device_id))
    }

    fn raise(&mut self, mask: u32) {
        self.device_status |= mask as ViInt32;
    }

    /// Writes `value(row, column)` over the active spot grid.
    fn fill_grid(&self, out: &mut [ViReal32], value: impl Fn(usize, usize) -> f32) {
        let (columns, rows) = self.active_spots();
        for row in 0..rows {
            for column in 0..columns {
                if let Some(slot) = out.get_mut(row * MAX_SPOTS_X + column) {
                    *slot = value(row, column);
                }
            }
        }
    }

    fn active_spots(&self) -> (usize, usize) {
        let x = usize::try_from(self.spots.0).unwrap_or(0).min(MAX_SPOTS_X);
        let y = usize::try_from(self.spots.1).unwrap_or(0).min(MAX_SPOTS_Y);
        (x, y)
    }

    fn is_missing(&self, row: usize, column: usize) -> bool {
        self.missing_spots.contains(&(row, column))
    }
}

// =============================================================================
// MockWfsSdk
// =============================================================================

/// Recording [`WfsSdk`]. Clones share the same log and state.
#[derive(Debug, Clone, Default)]
pub struct MockWfsSdk {
    calls: Arc<Mutex<Vec<MockCall>>>,
    state: Arc<Mutex<MockState>>,
}

impl MockWfsSdk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: MockState) -> Self {
        Self {
            calls: Arc::default(),
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Scripting access to the simulated instrument.
    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.log().clone()
    }

    pub fn call_names(&self) -> Vec<&'static str> {
        self.log().iter().map(|c| c.op).collect()
    }

    /// Inputs of the most recent call to `op`.
    pub fn last_args(&self, op: &str) -> Option<Vec<f64>> {
        self.log()
            .iter()
            .rev()
            .find(|c| c.op == op)
            .map(|c| c.args.clone())
    }

    pub fn clear_calls(&self) {
        self.log().clear();
    }

    /// Makes every later call to `op` return `status`.
    pub fn force(&self, op: &'static str, status: ViStatus) {
        self.state().forced.insert(op, status);
    }

    pub fn unforce(&self, op: &str) {
        self.state().forced.remove(op);
    }

    fn log(&self) -> MutexGuard<'_, Vec<MockCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the call; returns the forced status, if any.
    fn enter(&self, op: &'static str, args: Vec<f64>) -> Option<ViStatus> {
        self.log().push(MockCall { op, args });
        self.state().forced.get(op).copied()
    }
}

/// Records the call and returns early when a status is forced.
macro_rules! enter {
    ($self:ident, $op:literal $(, $arg:expr)* $(,)?) => {
        if let Some(status) = $self.enter($op, vec![$(f64::from($arg)),*]) {
            return status;
        }
    };
}

/// NUL-terminated copy of `text` into a driver string buffer.
fn write_text(buf: &mut [u8], text: &str) {
    let Some(room) = buf.len().checked_sub(1) else {
        return;
    };
    let n = text.len().min(room);
    buf[..n].copy_from_slice(&text.as_bytes()[..n]);
    buf[n] = 0;
}

fn out_of(value: f64, min: f64, max: f64) -> bool {
    value < min || value > max
}

impl WfsSdk for MockWfsSdk {
    fn init(
        &self,
        _resource_name: &CStr,
        id_query: ViBoolean,
        reset_device: ViBoolean,
        instrument_handle: &mut ViSession,
    ) -> ViStatus {
        enter!(self, "init", id_query, reset_device);
        let mut state = self.state();
        if state.instrument_count < 1 {
            return WFS_ERROR_NO_SENSOR_CONNECTED;
        }
        *instrument_handle = state.session;
        state.open = true;
        state.in_use = true;
        0
    }

    fn close(&self, _vi: ViSession) -> ViStatus {
        enter!(self, "close");
        let mut state = self.state();
        if !state.open {
            return WFS_ERROR_INVALID_HANDLE;
        }
        state.open = false;
        state.in_use = false;
        0
    }

    fn self_test(&self, _vi: ViSession, result: &mut ViInt16, message: &mut [u8]) -> ViStatus {
        enter!(self, "self_test");
        *result = 0;
        write_text(message, "Self-test not supported!");
        WFS_WARN_NSUP_SELF_TEST
    }

    fn reset(&self, _vi: ViSession) -> ViStatus {
        enter!(self, "reset");
        WFS_WARN_NSUP_RESET
    }

    fn revision_query(
        &self,
        _vi: ViSession,
        driver_revision: &mut [u8],
        firmware_revision: &mut [u8],
    ) -> ViStatus {
        enter!(self, "revision_query");
        let state = self.state();
        write_text(driver_revision, &state.driver_revision);
        write_text(firmware_revision, &state.firmware_revision);
        0
    }

    fn error_query(
        &self,
        _vi: ViSession,
        error_code: &mut ViInt32,
        message: &mut [u8],
    ) -> ViStatus {
        enter!(self, "error_query");
        *error_code = 0;
        write_text(message, "No error");
        0
    }

    fn error_message(&self, _vi: ViSession, error_code: ViStatus, message: &mut [u8]) -> ViStatus {
        enter!(self, "error_message", error_code);
        let state = self.state();
        let text = state
            .messages
            .get(&error_code)
            .cloned()
            .unwrap_or_else(|| format!("Unknown status code {error_code}"));
        write_text(message, &text);
        0
    }

    fn get_status(&self, _vi: ViSession, device_status: &mut ViInt32) -> ViStatus {
        enter!(self, "get_status");
        *device_status = self.state().device_status;
        0
    }

    fn get_instrument_info(
        &self,
        _vi: ViSession,
        manufacturer_name: &mut [u8],
        instrument_name: &mut [u8],
        serial_number_wfs: &mut [u8],
        serial_number_cam: &mut [u8],
    ) -> ViStatus {
        enter!(self, "get_instrument_info");
        let state = self.state();
        write_text(manufacturer_name, &state.manufacturer);
        write_text(instrument_name, &state.instrument_name);
        write_text(serial_number_wfs, &state.serial_wfs);
        write_text(serial_number_cam, &state.serial_cam);
        0
    }

    fn get_instrument_list_len(&self, _vi: ViSession, instrument_count: &mut ViInt32) -> ViStatus {
        enter!(self, "get_instrument_list_len");
        *instrument_count = self.state().instrument_count;
        0
    }

    fn get_instrument_list_info(
        &self,
        _vi: ViSession,
        index: ViInt32,
        device_id: &mut ViInt32,
        in_use: &mut ViInt32,
        instrument_name: &mut [u8],
        serial_number_wfs: &mut [u8],
        resource_name: &mut [u8],
    ) -> ViStatus {
        enter!(self, "get_instrument_list_info", index);
        let state = self.state();
        if index < 0 || index >= state.instrument_count {
            return parameter_error(2);
        }
        *device_id = state.device_id;
        *in_use = ViInt32::from(state.in_use);
        write_text(instrument_name, &state.instrument_name);
        write_text(serial_number_wfs, &state.serial_wfs);
        write_text(resource_name, &resource_name_for(state.device_id));
        0
    }

    fn configure_cam(
        &self,
        _vi: ViSession,
        pixel_format: ViInt32,
        cam_resol_index: ViInt32,
        spots_x: &mut ViInt32,
        spots_y: &mut ViInt32,
    ) -> ViStatus {
        enter!(self, "configure_cam", pixel_format, cam_resol_index);
        let mut state = self.state();
        if !(0..=1).contains(&pixel_format) {
            return parameter_error(2);
        }
        let Some(resolution) = state.family().resolution(cam_resol_index) else {
            return parameter_error(3);
        };
        let pitch_px = (state.mla.lenslet_pitch_um / state.mla.cam_pitch_um).max(1.0);
        let factor = f64::from(resolution.factor);
        state.spots = (
            (f64::from(resolution.x) * factor / pitch_px) as ViInt32,
            (f64::from(resolution.y) * factor / pitch_px) as ViInt32,
        );
        state.image_size = (resolution.y, resolution.x);
        state.raise(DeviceStatus::CFG | DeviceStatus::SPC);
        *spots_x = state.spots.0;
        *spots_y = state.spots.1;
        0
    }

    fn set_highspeed_mode(
        &self,
        _vi: ViSession,
        highspeed_mode: ViInt32,
        adapt_centroids: ViInt32,
        subtract_offset: ViInt32,
        allow_auto_exposure: ViInt32,
    ) -> ViStatus {
        enter!(
            self,
            "set_highspeed_mode",
            highspeed_mode,
            adapt_centroids,
            subtract_offset,
            allow_auto_exposure
        );
        let mut state = self.state();
        state.highspeed = highspeed_mode != 0;
        if state.highspeed {
            state.raise(DeviceStatus::HSP);
        } else {
            state.device_status &= !(DeviceStatus::HSP as ViInt32);
        }
        0
    }

    fn get_highspeed_windows(
        &self,
        _vi: ViSession,
        window_count_x: &mut ViInt32,
        window_count_y: &mut ViInt32,
        window_size_x: &mut ViInt32,
        window_size_y: &mut ViInt32,
        window_start_x: &mut [ViInt32],
        window_start_y: &mut [ViInt32],
    ) -> ViStatus {
        enter!(self, "get_highspeed_windows");
        let state = self.state();
        if !state.highspeed {
            return WFS_ERROR_HIGHSPEED_NOT_ACTIVE;
        }
        let pitch = (state.mla.lenslet_pitch_um / state.mla.cam_pitch_um) as ViInt32;
        *window_count_x = state.spots.0;
        *window_count_y = state.spots.1;
        *window_size_x = pitch;
        *window_size_y = pitch;
        for (i, start) in window_start_x.iter_mut().take(MAX_SPOTS_X).enumerate() {
            *start = i as ViInt32 * pitch;
        }
        for (i, start) in window_start_y.iter_mut().take(MAX_SPOTS_Y).enumerate() {
            *start = i as ViInt32 * pitch;
        }
        0
    }

    fn check_highspeed_centroids(&self, _vi: ViSession) -> ViStatus {
        enter!(self, "check_highspeed_centroids");
        if self.state().highspeed {
            0
        } else {
            WFS_ERROR_HIGHSPEED_NOT_ACTIVE
        }
    }

    fn get_exposure_time_range(
        &self,
        _vi: ViSession,
        min: &mut ViReal64,
        max: &mut ViReal64,
        increment: &mut ViReal64,
    ) -> ViStatus {
        enter!(self, "get_exposure_time_range");
        (*min, *max, *increment) = self.state().exposure_range;
        0
    }

    fn set_exposure_time(&self, _vi: ViSession, set: ViReal64, act: &mut ViReal64) -> ViStatus {
        enter!(self, "set_exposure_time", set);
        let mut state = self.state();
        let (min, max, _) = state.exposure_range;
        if out_of(set, min, max) {
            return parameter_error(2);
        }
        state.exposure = set;
        *act = set;
        0
    }

    fn get_exposure_time(&self, _vi: ViSession, act: &mut ViReal64) -> ViStatus {
        enter!(self, "get_exposure_time");
        *act = self.state().exposure;
        0
    }

    fn get_master_gain_range(
        &self,
        _vi: ViSession,
        min: &mut ViReal64,
        max: &mut ViReal64,
    ) -> ViStatus {
        enter!(self, "get_master_gain_range");
        (*min, *max) = self.state().master_gain_range;
        0
    }

    fn set_master_gain(&self, _vi: ViSession, set: ViReal64, act: &mut ViReal64) -> ViStatus {
        enter!(self, "set_master_gain", set);
        let mut state = self.state();
        let (min, max) = state.master_gain_range;
        if out_of(set, min, max) {
            return parameter_error(2);
        }
        state.master_gain = set;
        *act = set;
        0
    }

    fn get_master_gain(&self, _vi: ViSession, act: &mut ViReal64) -> ViStatus {
        enter!(self, "get_master_gain");
        *act = self.state().master_gain;
        0
    }

    fn set_black_level_offset(&self, _vi: ViSession, offset: ViInt32) -> ViStatus {
        enter!(self, "set_black_level_offset", offset);
        if !(BLACK_LEVEL_MIN..=BLACK_LEVEL_MAX).contains(&offset) {
            return parameter_error(2);
        }
        self.state().black_level = offset;
        0
    }

    fn get_black_level_offset(&self, _vi: ViSession, offset: &mut ViInt32) -> ViStatus {
        enter!(self, "get_black_level_offset");
        *offset = self.state().black_level;
        0
    }

    fn set_trigger_mode(&self, _vi: ViSession, mode: ViInt32) -> ViStatus {
        enter!(self, "set_trigger_mode", mode);
        if !(0..=3).contains(&mode) {
            return parameter_error(2);
        }
        self.state().trigger_mode = mode;
        0
    }

    fn get_trigger_mode(&self, _vi: ViSession, mode: &mut ViInt32) -> ViStatus {
        enter!(self, "get_trigger_mode");
        *mode = self.state().trigger_mode;
        0
    }

    fn set_trigger_delay(&self, _vi: ViSession, set: ViInt32, act: &mut ViInt32) -> ViStatus {
        enter!(self, "set_trigger_delay", set);
        let mut state = self.state();
        let (min, max, _) = state.trigger_delay_range;
        if !(min..=max).contains(&set) {
            return parameter_error(2);
        }
        state.trigger_delay = set;
        *act = set;
        0
    }

    fn get_trigger_delay_range(
        &self,
        _vi: ViSession,
        min: &mut ViInt32,
        max: &mut ViInt32,
        increment: &mut ViInt32,
    ) -> ViStatus {
        enter!(self, "get_trigger_delay_range");
        (*min, *max, *increment) = self.state().trigger_delay_range;
        0
    }

    fn get_mla_count(&self, _vi: ViSession, count: &mut ViInt32) -> ViStatus {
        enter!(self, "get_mla_count");
        *count = self.state().mla_count;
        0
    }

    fn get_mla_data(
        &self,
        _vi: ViSession,
        index: ViInt32,
        name: &mut [u8],
        data: &mut MlaCalibration,
    ) -> ViStatus {
        enter!(self, "get_mla_data", index);
        let state = self.state();
        if index < 0 || index >= state.mla_count {
            return parameter_error(2);
        }
        write_text(name, &state.mla_name);
        *data = MlaCalibration {
            grd_corr_rot: data.grd_corr_rot,
            grd_corr_pitch: data.grd_corr_pitch,
            ..state.mla
        };
        0
    }

    fn get_mla_data2(
        &self,
        _vi: ViSession,
        index: ViInt32,
        name: &mut [u8],
        data: &mut MlaCalibration,
    ) -> ViStatus {
        enter!(self, "get_mla_data2", index);
        let state = self.state();
        if index < 0 || index >= state.mla_count {
            return parameter_error(2);
        }
        write_text(name, &state.mla_name);
        *data = state.mla;
        0
    }

    fn select_mla(&self, _vi: ViSession, index: ViInt32) -> ViStatus {
        enter!(self, "select_mla", index);
        let mut state = self.state();
        if index < 0 || index >= state.mla_count {
            return parameter_error(2);
        }
        state.mla_index = index;
        0
    }

    fn set_aoi(
        &self,
        _vi: ViSession,
        center_x_mm: ViReal64,
        center_y_mm: ViReal64,
        size_x_mm: ViReal64,
        size_y_mm: ViReal64,
    ) -> ViStatus {
        enter!(self, "set_aoi", center_x_mm, center_y_mm, size_x_mm, size_y_mm);
        let mut state = self.state();
        let (width, height) = state.sensor_mm;
        if center_x_mm.abs() > width / 2.0 {
            return parameter_error(2);
        }
        if center_y_mm.abs() > height / 2.0 {
            return parameter_error(3);
        }
        if out_of(size_x_mm, 0.0, width) {
            return parameter_error(4);
        }
        if out_of(size_y_mm, 0.0, height) {
            return parameter_error(5);
        }
        state.aoi = [center_x_mm, center_y_mm, size_x_mm, size_y_mm];
        state.raise(DeviceStatus::SPC);
        0
    }

    fn get_aoi(
        &self,
        _vi: ViSession,
        center_x_mm: &mut ViReal64,
        center_y_mm: &mut ViReal64,
        size_x_mm: &mut ViReal64,
        size_y_mm: &mut ViReal64,
    ) -> ViStatus {
        enter!(self, "get_aoi");
        [*center_x_mm, *center_y_mm, *size_x_mm, *size_y_mm] = self.state().aoi;
        0
    }

    fn set_pupil(
        &self,
        _vi: ViSession,
        center_x_mm: ViReal64,
        center_y_mm: ViReal64,
        diameter_x_mm: ViReal64,
        diameter_y_mm: ViReal64,
    ) -> ViStatus {
        enter!(self, "set_pupil", center_x_mm, center_y_mm, diameter_x_mm, diameter_y_mm);
        if out_of(center_x_mm, -5.0, 5.0) {
            return parameter_error(2);
        }
        if out_of(center_y_mm, -5.0, 5.0) {
            return parameter_error(3);
        }
        if out_of(diameter_x_mm, 0.1, 10.0) {
            return parameter_error(4);
        }
        if out_of(diameter_y_mm, 0.1, 10.0) {
            return parameter_error(5);
        }
        let mut state = self.state();
        state.pupil = [center_x_mm, center_y_mm, diameter_x_mm, diameter_y_mm];
        state.raise(DeviceStatus::PUD | DeviceStatus::SPC);
        0
    }

    fn get_pupil(
        &self,
        _vi: ViSession,
        center_x_mm: &mut ViReal64,
        center_y_mm: &mut ViReal64,
        diameter_x_mm: &mut ViReal64,
        diameter_y_mm: &mut ViReal64,
    ) -> ViStatus {
        enter!(self, "get_pupil");
        [*center_x_mm, *center_y_mm, *diameter_x_mm, *diameter_y_mm] = self.state().pupil;
        0
    }

    fn set_reference_plane(&self, _vi: ViSession, reference: ViInt32) -> ViStatus {
        enter!(self, "set_reference_plane", reference);
        let mut state = self.state();
        match reference {
            0 => {}
            1 if state.user_reference => {}
            1 => return WFS_ERROR_NO_USER_REFERENCE,
            _ => return parameter_error(2),
        }
        state.reference_plane = reference;
        0
    }

    fn get_reference_plane(&self, _vi: ViSession, reference: &mut ViInt32) -> ViStatus {
        enter!(self, "get_reference_plane");
        *reference = self.state().reference_plane;
        0
    }

    fn take_spotfield_image(&self, _vi: ViSession) -> ViStatus {
        enter!(self, "take_spotfield_image");
        0
    }

    fn take_spotfield_image_auto_exposure(
        &self,
        _vi: ViSession,
        exposure_time_act: &mut ViReal64,
        master_gain_act: &mut ViReal64,
    ) -> ViStatus {
        enter!(self, "take_spotfield_image_auto_exposure");
        let state = self.state();
        *exposure_time_act = state.exposure;
        *master_gain_act = state.master_gain;
        0
    }

    fn get_spotfield_image(
        &self,
        vi: ViSession,
        image: &mut [ViUInt8],
        address: &mut usize,
        rows: &mut ViInt32,
        columns: &mut ViInt32,
    ) -> ViStatus {
        enter!(self, "get_spotfield_image");
        *address = 0x7F00_0000 + vi as usize;
        self.paint_image(image, rows, columns);
        0
    }

    fn get_spotfield_image_copy(
        &self,
        _vi: ViSession,
        image: &mut [ViUInt8],
        rows: &mut ViInt32,
        columns: &mut ViInt32,
    ) -> ViStatus {
        enter!(self, "get_spotfield_image_copy");
        self.paint_image(image, rows, columns);
        0
    }

    fn average_image(&self, _vi: ViSession, count: ViInt32, data_ready: &mut ViInt32) -> ViStatus {
        enter!(self, "average_image", count);
        let mut state = self.state();
        state.average_progress += 1;
        *data_ready = ViInt32::from(state.average_progress >= count);
        if *data_ready != 0 {
            state.average_progress = 0;
        }
        0
    }

    fn average_image_rolling(&self, _vi: ViSession, count: ViInt32, reset: ViInt32) -> ViStatus {
        enter!(self, "average_image_rolling", count, reset);
        if reset != 0 {
            self.state().average_progress = 0;
        }
        0
    }

    fn cut_image_noise_floor(&self, _vi: ViSession, limit: ViInt32) -> ViStatus {
        enter!(self, "cut_image_noise_floor", limit);
        0
    }

    fn calc_image_min_max(
        &self,
        _vi: ViSession,
        min: &mut ViInt32,
        max: &mut ViInt32,
        saturated_pixels_percent: &mut ViReal64,
    ) -> ViStatus {
        enter!(self, "calc_image_min_max");
        *min = 0;
        *max = 250;
        *saturated_pixels_percent = 0.0;
        0
    }

    fn calc_mean_rms_noise(
        &self,
        _vi: ViSession,
        mean: &mut ViReal64,
        rms: &mut ViReal64,
    ) -> ViStatus {
        enter!(self, "calc_mean_rms_noise");
        *mean = 2.5;
        *rms = 0.8;
        0
    }

    fn get_line(&self, _vi: ViSession, line: ViInt32, line_selected: &mut [ViReal32]) -> ViStatus {
        enter!(self, "get_line", line);
        let columns = usize::try_from(self.state().image_size.1).unwrap_or(0);
        for (x, value) in line_selected.iter_mut().take(columns).enumerate() {
            *value = ((x + line.unsigned_abs() as usize) % 256) as f32;
        }
        0
    }

    fn get_line_view(
        &self,
        _vi: ViSession,
        line_min: &mut [ViReal32],
        line_max: &mut [ViReal32],
    ) -> ViStatus {
        enter!(self, "get_line_view");
        let columns = usize::try_from(self.state().image_size.1).unwrap_or(0);
        line_min.iter_mut().take(columns).for_each(|v| *v = 0.0);
        line_max.iter_mut().take(columns).for_each(|v| *v = 250.0);
        0
    }

    fn calc_beam_centroid_diameter(
        &self,
        _vi: ViSession,
        centroid_x_mm: &mut ViReal64,
        centroid_y_mm: &mut ViReal64,
        diameter_x_mm: &mut ViReal64,
        diameter_y_mm: &mut ViReal64,
    ) -> ViStatus {
        enter!(self, "calc_beam_centroid_diameter");
        let state = self.state();
        *centroid_x_mm = state.pupil[0];
        *centroid_y_mm = state.pupil[1];
        *diameter_x_mm = state.pupil[2];
        *diameter_y_mm = state.pupil[3];
        0
    }

    fn calc_spots_centroid_diameter_intensity(
        &self,
        _vi: ViSession,
        dynamic_noise_cut: ViInt32,
        calculate_diameters: ViInt32,
    ) -> ViStatus {
        enter!(
            self,
            "calc_spots_centroid_diameter_intensity",
            dynamic_noise_cut,
            calculate_diameters
        );
        0
    }

    fn get_spot_centroids(
        &self,
        _vi: ViSession,
        x: &mut [ViReal32],
        y: &mut [ViReal32],
    ) -> ViStatus {
        enter!(self, "get_spot_centroids");
        let state = self.state();
        let pitch = (state.mla.lenslet_pitch_um / state.mla.cam_pitch_um) as f32;
        state.fill_grid(x, |r, c| {
            if state.is_missing(r, c) { 0.0 } else { (c as f32 + 0.5) * pitch }
        });
        state.fill_grid(y, |r, c| {
            if state.is_missing(r, c) { 0.0 } else { (r as f32 + 0.5) * pitch }
        });
        0
    }

    fn get_spot_diameters(
        &self,
        _vi: ViSession,
        x: &mut [ViReal32],
        y: &mut [ViReal32],
    ) -> ViStatus {
        enter!(self, "get_spot_diameters");
        let state = self.state();
        state.fill_grid(x, |_, _| 6.0);
        state.fill_grid(y, |_, _| 6.0);
        0
    }

    fn get_spot_diameters_statistics(
        &self,
        _vi: ViSession,
        min: &mut ViReal64,
        max: &mut ViReal64,
        mean: &mut ViReal64,
    ) -> ViStatus {
        enter!(self, "get_spot_diameters_statistics");
        (*min, *max, *mean) = (5.5, 6.5, 6.0);
        0
    }

    fn get_spot_intensities(&self, _vi: ViSession, intensities: &mut [ViReal32]) -> ViStatus {
        enter!(self, "get_spot_intensities");
        let state = self.state();
        state.fill_grid(intensities, |r, c| if state.is_missing(r, c) { 0.0 } else { 1.0 });
        0
    }

    fn calc_spot_to_reference_deviations(&self, _vi: ViSession, cancel_tilt: ViInt32) -> ViStatus {
        enter!(self, "calc_spot_to_reference_deviations", cancel_tilt);
        0
    }

    fn get_spot_reference_positions(
        &self,
        _vi: ViSession,
        x: &mut [ViReal32],
        y: &mut [ViReal32],
    ) -> ViStatus {
        enter!(self, "get_spot_reference_positions");
        let state = self.state();
        let pitch = (state.mla.lenslet_pitch_um / state.mla.cam_pitch_um) as f32;
        state.fill_grid(x, |_, c| (c as f32 + 0.5) * pitch);
        state.fill_grid(y, |r, _| (r as f32 + 0.5) * pitch);
        0
    }

    fn get_spot_deviations(
        &self,
        _vi: ViSession,
        x: &mut [ViReal32],
        y: &mut [ViReal32],
    ) -> ViStatus {
        enter!(self, "get_spot_deviations");
        let state = self.state();
        state.fill_grid(x, |_, c| c as f32 * 0.01);
        state.fill_grid(y, |r, _| r as f32 * 0.01);
        0
    }

    fn zernike_lsf(
        &self,
        _vi: ViSession,
        zernike_orders: &mut ViInt32,
        zernike_um: &mut [ViReal32],
        zernike_orders_rms_um: &mut [ViReal32],
        roc_mm: &mut ViReal64,
    ) -> ViStatus {
        enter!(self, "zernike_lsf", *zernike_orders);
        let state = self.state();
        if *zernike_orders == 0 {
            *zernike_orders = state.zernike_auto_order;
        }
        let modes = zernike_modes(*zernike_orders).unwrap_or(0);
        for (i, z) in zernike_um.iter_mut().enumerate().skip(1).take(modes) {
            *z = i as f32 * 0.01;
        }
        let orders = usize::try_from(*zernike_orders).unwrap_or(0);
        for (i, rms) in zernike_orders_rms_um.iter_mut().enumerate().skip(1).take(orders) {
            *rms = i as f32 * 0.02;
        }
        *roc_mm = state.roc_mm;
        0
    }

    fn calc_fourier_optometric(
        &self,
        _vi: ViSession,
        zernike_orders: ViInt32,
        fourier_order: ViInt32,
        fourier_m: &mut ViReal64,
        fourier_j0: &mut ViReal64,
        fourier_j45: &mut ViReal64,
        opto_sphere: &mut ViReal64,
        opto_cylinder: &mut ViReal64,
        opto_axis_deg: &mut ViReal64,
    ) -> ViStatus {
        enter!(self, "calc_fourier_optometric", zernike_orders, fourier_order);
        let sphere = 1000.0 / self.state().roc_mm;
        (*fourier_m, *fourier_j0, *fourier_j45) = (sphere, 0.0, 0.0);
        (*opto_sphere, *opto_cylinder, *opto_axis_deg) = (sphere, 0.0, 0.0);
        0
    }

    fn calc_reconstructed_deviations(
        &self,
        _vi: ViSession,
        zernike_orders: ViInt32,
        _reconstruct: &mut [ViUInt8],
        do_spherical_reference: ViInt32,
        fit_error_mean: &mut ViReal64,
        fit_error_stdev: &mut ViReal64,
    ) -> ViStatus {
        enter!(
            self,
            "calc_reconstructed_deviations",
            zernike_orders,
            do_spherical_reference
        );
        *fit_error_mean = 0.01;
        *fit_error_stdev = 0.002;
        self.state().raise(DeviceStatus::RDA);
        0
    }

    fn calc_wavefront(
        &self,
        _vi: ViSession,
        wavefront_type: ViInt32,
        limit_to_pupil: ViInt32,
        wavefront: &mut [ViReal32],
    ) -> ViStatus {
        enter!(self, "calc_wavefront", wavefront_type, limit_to_pupil);
        if !(0..=2).contains(&wavefront_type) {
            return parameter_error(2);
        }
        let state = self.state();
        state.fill_grid(wavefront, |r, c| (r + c) as f32 * 0.001);
        0
    }

    fn calc_wavefront_statistics(
        &self,
        _vi: ViSession,
        min: &mut ViReal64,
        max: &mut ViReal64,
        diff: &mut ViReal64,
        mean: &mut ViReal64,
        rms: &mut ViReal64,
        weighted_rms: &mut ViReal64,
    ) -> ViStatus {
        enter!(self, "calc_wavefront_statistics");
        (*min, *max) = (-0.12, 0.18);
        *diff = *max - *min;
        (*mean, *rms, *weighted_rms) = (0.0, 0.05, 0.048);
        0
    }

    fn get_xy_scale(
        &self,
        _vi: ViSession,
        scale_x: &mut [ViReal32],
        scale_y: &mut [ViReal32],
    ) -> ViStatus {
        enter!(self, "get_xy_scale");
        let state = self.state();
        let pitch_mm = (state.mla.lenslet_pitch_um / 1000.0) as f32;
        let (columns, rows) = state.active_spots();
        for (c, s) in scale_x.iter_mut().take(columns).enumerate() {
            *s = (c as f32 - columns as f32 / 2.0) * pitch_mm;
        }
        for (r, s) in scale_y.iter_mut().take(rows).enumerate() {
            *s = (r as f32 - rows as f32 / 2.0) * pitch_mm;
        }
        0
    }

    fn convert_wavefront_waves(
        &self,
        _vi: ViSession,
        wavelength_nm: ViReal64,
        wavefront_in: &mut [ViReal32],
        wavefront_out: &mut [ViReal32],
    ) -> ViStatus {
        enter!(self, "convert_wavefront_waves", wavelength_nm);
        if wavelength_nm <= 0.0 {
            return parameter_error(2);
        }
        let scale = (1000.0 / wavelength_nm) as f32;
        for (out, value) in wavefront_out.iter_mut().zip(wavefront_in.iter()) {
            *out = *value * scale;
        }
        0
    }

    fn flip_2d_array(
        &self,
        _vi: ViSession,
        array_in: &mut [ViReal32],
        array_out: &mut [ViReal32],
    ) -> ViStatus {
        enter!(self, "flip_2d_array");
        for row in 0..MAX_SPOTS_Y {
            for column in 0..MAX_SPOTS_X {
                let from = row * MAX_SPOTS_X + column;
                let to = column * MAX_SPOTS_Y + row;
                if let (Some(value), Some(slot)) = (array_in.get(from), array_out.get_mut(to)) {
                    *slot = *value;
                }
            }
        }
        0
    }

    fn set_spots_to_user_reference(&self, _vi: ViSession) -> ViStatus {
        enter!(self, "set_spots_to_user_reference");
        let mut state = self.state();
        state.user_reference = true;
        state.raise(DeviceStatus::URF);
        0
    }

    fn set_calc_spots_to_user_reference(
        &self,
        _vi: ViSession,
        spot_ref_type: ViInt32,
        _reference_x: &mut [ViReal32],
        _reference_y: &mut [ViReal32],
    ) -> ViStatus {
        enter!(self, "set_calc_spots_to_user_reference", spot_ref_type);
        if !(0..=1).contains(&spot_ref_type) {
            return parameter_error(2);
        }
        let mut state = self.state();
        state.user_reference = true;
        state.raise(DeviceStatus::URF);
        0
    }

    fn create_default_user_reference(&self, _vi: ViSession) -> ViStatus {
        enter!(self, "create_default_user_reference");
        let mut state = self.state();
        state.user_reference = true;
        state.raise(DeviceStatus::URF);
        0
    }

    fn save_user_reference_file(&self, _vi: ViSession) -> ViStatus {
        enter!(self, "save_user_reference_file");
        if self.state().user_reference {
            0
        } else {
            WFS_ERROR_NO_USER_REFERENCE
        }
    }

    fn load_user_reference_file(&self, _vi: ViSession) -> ViStatus {
        enter!(self, "load_user_reference_file");
        let mut state = self.state();
        state.user_reference = true;
        state.raise(DeviceStatus::URF);
        0
    }

    fn do_spherical_reference(&self, _vi: ViSession) -> ViStatus {
        enter!(self, "do_spherical_reference");
        0
    }
}

impl MockWfsSdk {
    /// Fills `image` with a spot lattice over the configured image size.
    fn paint_image(&self, image: &mut [ViUInt8], rows: &mut ViInt32, columns: &mut ViInt32) {
        let state = self.state();
        (*rows, *columns) = state.image_size;
        let width = usize::try_from(state.image_size.1).unwrap_or(0);
        let height = usize::try_from(state.image_size.0).unwrap_or(0);
        let pitch = ((state.mla.lenslet_pitch_um / state.mla.cam_pitch_um) as usize).max(1);
        for (i, pixel) in image.iter_mut().take(width * height).enumerate() {
            let (y, x) = (i / width.max(1), i % width.max(1));
            let on_spot = x % pitch == pitch / 2 && y % pitch == pitch / 2;
            *pixel = if on_spot { 200 } else { 3 };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calls_are_recorded_in_order() {
        let sdk = MockWfsSdk::new();
        let mut count = 0;
        let mut act = 0;
        sdk.get_instrument_list_len(0, &mut count);
        sdk.set_trigger_delay(0, 15, &mut act);
        assert_eq!(sdk.call_names(), vec!["get_instrument_list_len", "set_trigger_delay"]);
        assert_eq!(sdk.last_args("set_trigger_delay"), Some(vec![15.0]));
        sdk.clear_calls();
        assert!(sdk.calls().is_empty());
    }

    #[test]
    fn forced_status_short_circuits() {
        let sdk = MockWfsSdk::new();
        sdk.force("get_status", WFS_ERROR_NO_SENSOR_CONNECTED);
        let mut status = 0;
        assert_eq!(sdk.get_status(0, &mut status), WFS_ERROR_NO_SENSOR_CONNECTED);
        sdk.unforce("get_status");
        assert_eq!(sdk.get_status(0, &mut status), 0);
        assert_eq!(sdk.call_names().len(), 2);
    }

    #[test]
    fn vendor_side_range_checks() {
        let sdk = MockWfsSdk::new();
        assert_eq!(sdk.select_mla(0, 1), WFS_ERROR_PARAMETER2);
        assert_eq!(sdk.select_mla(0, 0), 0);
        assert_eq!(sdk.set_black_level_offset(0, 256), WFS_ERROR_PARAMETER2);
        assert_eq!(sdk.set_pupil(0, 0.0, 5.001, 5.4, 5.4), WFS_ERROR_PARAMETER3);
        assert_eq!(sdk.set_aoi(0, 0.0, 0.0, 7.201, 0.0), WFS_ERROR_PARAMETER4);
        assert_eq!(sdk.set_reference_plane(0, 1), WFS_ERROR_NO_USER_REFERENCE);
        assert_eq!(sdk.check_highspeed_centroids(0), WFS_ERROR_HIGHSPEED_NOT_ACTIVE);
    }

    #[test]
    fn error_message_keeps_driver_typo() {
        let sdk = MockWfsSdk::new();
        let mut buf = [0u8; WFS_ERR_DESCR_BUFFER_SIZE];
        sdk.error_message(0, WFS_ERROR_CORRUPT_REF_FILE, &mut buf);
        let end = buf.iter().position(|&b| b == 0).unwrap();
        assert_eq!(&buf[..end], b"Corrupt refernce file!");
    }

    #[test]
    fn text_is_truncated_to_buffer() {
        let mut buf = [0xFFu8; 4];
        write_text(&mut buf, "WFS150");
        assert_eq!(&buf, b"WFS\0");
        write_text(&mut [], "ignored");
    }
}
