//! Camera, microlens array and measurement-geometry configuration.
//!
//! Getters refresh the matching field of [`Parameters`](super::Parameters) or
//! [`Results`](super::Results) on success; setters store the requested value
//! before calling so that later calls without arguments resend it.

use wfs_sys::{ViInt32, ViReal64};

use super::{flag, int, real, switch, HighspeedMode, HighspeedWindows, Mla, Rect, Span, Wfs};
use crate::constants::{AOI_SIZE_MIN_MM, WFS_HW_TRIGGER_OFF, WFS_SW_TRIGGER};
use crate::sdk::{MlaCalibration, WfsSdk};
use crate::status::Status;
use crate::vi::Vi;

/// Sizes in (0, AOI_SIZE_MIN_MM) are rejected; 0 selects the full sensor.
fn aoi_size_invalid(size_mm: f64) -> bool {
    size_mm > 0.0 && size_mm < AOI_SIZE_MIN_MM
}

/// Getter variants for MLA calibration data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MlaRead {
    Basic,
    WithGridCorrections,
}

impl MlaRead {
    fn op(self) -> &'static str {
        match self {
            MlaRead::Basic => "get_mla_data",
            MlaRead::WithGridCorrections => "get_mla_data2",
        }
    }
}

/// Rectangles the driver reports as centre plus size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RectRead {
    Aoi,
    Pupil,
}

impl RectRead {
    fn op(self) -> &'static str {
        match self {
            RectRead::Aoi => "get_aoi",
            RectRead::Pupil => "get_pupil",
        }
    }
}

impl<S: WfsSdk> Wfs<S> {
    // ---- camera -------------------------------------------------------------

    /// Configures pixel format and camera resolution; returns the spot grid
    /// `(spots_x, spots_y)` the driver derives from it.
    ///
    /// When the instrument family is known, an index outside its resolution
    /// table is rejected locally. On success the derived camera resolution is
    /// taken from the table.
    pub fn configure_cam(
        &mut self,
        pixel_format: Option<i32>,
        resolution_index: Option<i32>,
    ) -> (Status, (i32, i32)) {
        let format = int(pixel_format, self.params.pixel_format);
        let index = int(resolution_index, self.params.resolution_index);
        let family = self.instrument.family;
        if let Some(family) = family {
            if family.resolution(index).is_none() {
                let status = self.reject(
                    "configure_cam",
                    3,
                    format_args!("family={family} resolution_index={index}"),
                );
                return (status, (self.derived.spots_x, self.derived.spots_y));
            }
        }
        self.params.pixel_format = format;
        self.params.resolution_index = index;

        let mut spots_x = Vi::int32(0);
        let mut spots_y = Vi::int32(0);
        let raw = self
            .sdk
            .configure_cam(self.vi(), format, index, spots_x.slot(), spots_y.slot());
        let status = self.decode("configure_cam", raw);
        if status.is_ok() {
            if let Some(resolution) = family.and_then(|f| f.resolution(index)) {
                self.derived.cam_resolution_x = resolution.x;
                self.derived.cam_resolution_y = resolution.y;
                self.derived.cam_resolution_factor = resolution.factor;
            }
            self.derived.spots_x = spots_x.value();
            self.derived.spots_y = spots_y.value();
        }
        self.log(
            "configure_cam",
            &status,
            format_args!(
                "pixel_format={format} resolution_index={index} resolution={}x{}/{} spots={}x{}",
                self.derived.cam_resolution_x,
                self.derived.cam_resolution_y,
                self.derived.cam_resolution_factor,
                spots_x.value(),
                spots_y.value()
            ),
        );
        (status, (spots_x.value(), spots_y.value()))
    }

    pub fn set_highspeed_mode(
        &mut self,
        enabled: Option<bool>,
        adapt_centroids: Option<bool>,
        subtract_offset: Option<bool>,
        allow_auto_exposure: Option<bool>,
    ) -> Status {
        let current = self.params.highspeed;
        let mode = HighspeedMode {
            enabled: flag(enabled, current.enabled),
            adapt_centroids: flag(adapt_centroids, current.adapt_centroids),
            subtract_offset: flag(subtract_offset, current.subtract_offset),
            allow_auto_exposure: flag(allow_auto_exposure, current.allow_auto_exposure),
        };
        self.params.highspeed = mode;
        let raw = self.sdk.set_highspeed_mode(
            self.vi(),
            switch(mode.enabled),
            switch(mode.adapt_centroids),
            switch(mode.subtract_offset),
            switch(mode.allow_auto_exposure),
        );
        let status = self.decode("set_highspeed_mode", raw);
        self.log("set_highspeed_mode", &status, format_args!("{mode:?}"));
        status
    }

    /// Centroid windows of highspeed mode. Window origins land in
    /// `buffers().window_start_x/_y`.
    pub fn get_highspeed_windows(&mut self) -> (Status, HighspeedWindows) {
        let mut count_x = Vi::int32(0);
        let mut count_y = Vi::int32(0);
        let mut size_x = Vi::int32(0);
        let mut size_y = Vi::int32(0);
        let vi = self.vi();
        let buffers = &mut self.buffers;
        let raw = self.sdk.get_highspeed_windows(
            vi,
            count_x.slot(),
            count_y.slot(),
            size_x.slot(),
            size_y.slot(),
            &mut buffers.window_start_x,
            &mut buffers.window_start_y,
        );
        let status = self.decode("get_highspeed_windows", raw);
        let windows = HighspeedWindows {
            count_x: count_x.value(),
            count_y: count_y.value(),
            size_x: size_x.value(),
            size_y: size_y.value(),
        };
        if status.is_ok() {
            self.results.highspeed_windows = windows;
        }
        self.log(
            "get_highspeed_windows",
            &status,
            format_args!(
                "windows={}x{} size={}x{}",
                windows.count_x, windows.count_y, windows.size_x, windows.size_y
            ),
        );
        (status, windows)
    }

    pub fn check_highspeed_centroids(&mut self) -> Status {
        let raw = self.sdk.check_highspeed_centroids(self.vi());
        let status = self.decode("check_highspeed_centroids", raw);
        self.log("check_highspeed_centroids", &status, format_args!(""));
        status
    }

    // ---- exposure and gain --------------------------------------------------

    pub fn get_exposure_time_range(&mut self) -> (Status, Span<f64>) {
        let mut min = Vi::real64(0.0);
        let mut max = Vi::real64(0.0);
        let mut increment = Vi::real64(0.0);
        let raw = self
            .sdk
            .get_exposure_time_range(self.vi(), min.slot(), max.slot(), increment.slot());
        let status = self.decode("get_exposure_time_range", raw);
        let span = Span {
            min: min.value(),
            max: max.value(),
            increment: increment.value(),
        };
        if status.is_ok() {
            self.results.exposure_range = span;
        }
        self.log(
            "get_exposure_time_range",
            &status,
            format_args!("min={} max={} increment={} ms", span.min, span.max, span.increment),
        );
        (status, span)
    }

    /// Sets the exposure time in ms; returns the value the camera applied.
    pub fn set_exposure_time(&mut self, exposure_time_ms: Option<f64>) -> (Status, f64) {
        self.params.exposure_time_ms = real(exposure_time_ms, self.params.exposure_time_ms);
        let mut act = Vi::real64(0.0);
        let raw = self
            .sdk
            .set_exposure_time(self.vi(), self.params.exposure_time_ms, act.slot());
        let status = self.decode("set_exposure_time", raw);
        self.log(
            "set_exposure_time",
            &status,
            format_args!("set={} act={} ms", self.params.exposure_time_ms, act.value()),
        );
        (status, act.value())
    }

    pub fn get_exposure_time(&mut self) -> (Status, f64) {
        let mut act = Vi::real64(0.0);
        let raw = self.sdk.get_exposure_time(self.vi(), act.slot());
        let status = self.decode("get_exposure_time", raw);
        if status.is_ok() {
            self.params.exposure_time_ms = act.value();
        }
        self.log("get_exposure_time", &status, format_args!("act={} ms", act.value()));
        (status, act.value())
    }

    pub fn get_master_gain_range(&mut self) -> (Status, Span<f64>) {
        let mut min = Vi::real64(0.0);
        let mut max = Vi::real64(0.0);
        let raw = self.sdk.get_master_gain_range(self.vi(), min.slot(), max.slot());
        let status = self.decode("get_master_gain_range", raw);
        let span = Span {
            min: min.value(),
            max: max.value(),
            increment: 0.0,
        };
        if status.is_ok() {
            self.results.master_gain_range = span;
        }
        self.log(
            "get_master_gain_range",
            &status,
            format_args!("min={} max={}", span.min, span.max),
        );
        (status, span)
    }

    pub fn set_master_gain(&mut self, gain: Option<f64>) -> (Status, f64) {
        self.params.master_gain = real(gain, self.params.master_gain);
        let mut act = Vi::real64(0.0);
        let raw = self
            .sdk
            .set_master_gain(self.vi(), self.params.master_gain, act.slot());
        let status = self.decode("set_master_gain", raw);
        self.log(
            "set_master_gain",
            &status,
            format_args!("set={} act={}", self.params.master_gain, act.value()),
        );
        (status, act.value())
    }

    pub fn get_master_gain(&mut self) -> (Status, f64) {
        let mut act = Vi::real64(0.0);
        let raw = self.sdk.get_master_gain(self.vi(), act.slot());
        let status = self.decode("get_master_gain", raw);
        if status.is_ok() {
            self.params.master_gain = act.value();
        }
        self.log("get_master_gain", &status, format_args!("act={}", act.value()));
        (status, act.value())
    }

    // ---- black level and trigger ---------------------------------------------

    pub fn set_black_level_offset(&mut self, offset: Option<i32>) -> Status {
        self.params.black_level_offset = int(offset, self.params.black_level_offset);
        let raw = self
            .sdk
            .set_black_level_offset(self.vi(), self.params.black_level_offset);
        let status = self.decode("set_black_level_offset", raw);
        self.log(
            "set_black_level_offset",
            &status,
            format_args!("offset={}", self.params.black_level_offset),
        );
        status
    }

    pub fn get_black_level_offset(&mut self) -> (Status, i32) {
        let mut offset = Vi::int32(0);
        let raw = self.sdk.get_black_level_offset(self.vi(), offset.slot());
        let status = self.decode("get_black_level_offset", raw);
        if status.is_ok() {
            self.params.black_level_offset = offset.value();
        }
        self.log(
            "get_black_level_offset",
            &status,
            format_args!("offset={}", offset.value()),
        );
        (status, offset.value())
    }

    /// Modes outside `WFS_HW_TRIGGER_OFF..=WFS_SW_TRIGGER` are rejected locally.
    pub fn set_trigger_mode(&mut self, mode: Option<i32>) -> Status {
        let candidate = int(mode, self.params.trigger_mode);
        if !(WFS_HW_TRIGGER_OFF..=WFS_SW_TRIGGER).contains(&candidate) {
            return self.reject("set_trigger_mode", 2, format_args!("mode={candidate}"));
        }
        self.params.trigger_mode = candidate;
        let raw = self.sdk.set_trigger_mode(self.vi(), candidate);
        let status = self.decode("set_trigger_mode", raw);
        self.log("set_trigger_mode", &status, format_args!("mode={candidate}"));
        status
    }

    pub fn get_trigger_mode(&mut self) -> (Status, i32) {
        let mut mode = Vi::int32(0);
        let raw = self.sdk.get_trigger_mode(self.vi(), mode.slot());
        let status = self.decode("get_trigger_mode", raw);
        if status.is_ok() {
            self.params.trigger_mode = mode.value();
        }
        self.log("get_trigger_mode", &status, format_args!("mode={}", mode.value()));
        (status, mode.value())
    }

    /// Sets the trigger delay in µs; returns the applied delay.
    pub fn set_trigger_delay(&mut self, delay_us: Option<i32>) -> (Status, i32) {
        self.params.trigger_delay_us = int(delay_us, self.params.trigger_delay_us);
        let mut act = Vi::int32(0);
        let raw = self
            .sdk
            .set_trigger_delay(self.vi(), self.params.trigger_delay_us, act.slot());
        let status = self.decode("set_trigger_delay", raw);
        self.log(
            "set_trigger_delay",
            &status,
            format_args!("set={} act={} us", self.params.trigger_delay_us, act.value()),
        );
        (status, act.value())
    }

    pub fn get_trigger_delay_range(&mut self) -> (Status, Span<i32>) {
        let mut min = Vi::int32(0);
        let mut max = Vi::int32(0);
        let mut increment = Vi::int32(0);
        let raw = self
            .sdk
            .get_trigger_delay_range(self.vi(), min.slot(), max.slot(), increment.slot());
        let status = self.decode("get_trigger_delay_range", raw);
        let span = Span {
            min: min.value(),
            max: max.value(),
            increment: increment.value(),
        };
        if status.is_ok() {
            self.results.trigger_delay_range = span;
        }
        self.log(
            "get_trigger_delay_range",
            &status,
            format_args!("min={} max={} increment={} us", span.min, span.max, span.increment),
        );
        (status, span)
    }

    // ---- microlens array ----------------------------------------------------

    pub fn get_mla_count(&mut self) -> (Status, i32) {
        let mut count = Vi::int32(0);
        let raw = self.sdk.get_mla_count(self.vi(), count.slot());
        let status = self.decode("get_mla_count", raw);
        if status.is_ok() {
            self.instrument.mla_count = count.value();
        }
        self.log("get_mla_count", &status, format_args!("count={}", count.value()));
        (status, count.value())
    }

    /// Name and calibration of MLA `index` (default: the selected one).
    pub fn get_mla_data(&mut self, index: Option<i32>) -> (Status, Mla) {
        self.read_mla(MlaRead::Basic, index)
    }

    /// As [`get_mla_data`](Self::get_mla_data), including the rotation and
    /// pitch grid corrections.
    pub fn get_mla_data2(&mut self, index: Option<i32>) -> (Status, Mla) {
        self.read_mla(MlaRead::WithGridCorrections, index)
    }

    fn read_mla(&mut self, read: MlaRead, index: Option<i32>) -> (Status, Mla) {
        let op = read.op();
        let index = int(index, self.params.mla_index);
        let mut calibration = MlaCalibration::default();
        let vi = self.vi();
        let name = &mut self.buffers.mla_name;
        name.clear();
        let raw = match read {
            MlaRead::Basic => self
                .sdk
                .get_mla_data(vi, index, name.as_mut_bytes(), &mut calibration),
            MlaRead::WithGridCorrections => self
                .sdk
                .get_mla_data2(vi, index, name.as_mut_bytes(), &mut calibration),
        };
        let status = self.decode(op, raw);
        let mla = Mla {
            index,
            name: self.buffers.mla_name.to_string_lossy(),
            calibration,
        };
        if status.is_ok() {
            self.instrument.mla = Some(mla.clone());
        }
        self.log(
            op,
            &status,
            format_args!(
                "index={index} name={} cam_pitch={} lenslet_pitch={} lenslet_f={} um",
                mla.name,
                calibration.cam_pitch_um,
                calibration.lenslet_pitch_um,
                calibration.lenslet_f_um
            ),
        );
        (status, mla)
    }

    pub fn select_mla(&mut self, index: Option<i32>) -> Status {
        self.params.mla_index = int(index, self.params.mla_index);
        let raw = self.sdk.select_mla(self.vi(), self.params.mla_index);
        let status = self.decode("select_mla", raw);
        self.log("select_mla", &status, format_args!("index={}", self.params.mla_index));
        status
    }

    // ---- geometry -----------------------------------------------------------

    /// Sets the area of interest in mm; all-zero sizes select the full sensor.
    ///
    /// A size between zero and `AOI_SIZE_MIN_MM` is rejected without calling
    /// the driver: X as parameter 4, Y as parameter 5.
    pub fn set_aoi(
        &mut self,
        center_x_mm: Option<f64>,
        center_y_mm: Option<f64>,
        size_x_mm: Option<f64>,
        size_y_mm: Option<f64>,
    ) -> Status {
        let current = self.params.aoi;
        let aoi = Rect {
            center_x_mm: real(center_x_mm, current.center_x_mm),
            center_y_mm: real(center_y_mm, current.center_y_mm),
            size_x_mm: real(size_x_mm, current.size_x_mm),
            size_y_mm: real(size_y_mm, current.size_y_mm),
        };
        if aoi_size_invalid(aoi.size_x_mm) {
            return self.reject("set_aoi", 4, format_args!("size_x={} mm", aoi.size_x_mm));
        }
        if aoi_size_invalid(aoi.size_y_mm) {
            return self.reject("set_aoi", 5, format_args!("size_y={} mm", aoi.size_y_mm));
        }
        self.params.aoi = aoi;
        let raw = self.sdk.set_aoi(
            self.vi(),
            aoi.center_x_mm,
            aoi.center_y_mm,
            aoi.size_x_mm,
            aoi.size_y_mm,
        );
        let status = self.decode("set_aoi", raw);
        self.log("set_aoi", &status, format_args!("{aoi:?}"));
        status
    }

    pub fn get_aoi(&mut self) -> (Status, Rect) {
        let (status, aoi) = self.read_rect(RectRead::Aoi);
        if status.is_ok() {
            self.params.aoi = aoi;
        }
        self.log("get_aoi", &status, format_args!("{aoi:?}"));
        (status, aoi)
    }

    /// Sets the pupil centre and diameters in mm.
    pub fn set_pupil(
        &mut self,
        center_x_mm: Option<f64>,
        center_y_mm: Option<f64>,
        diameter_x_mm: Option<f64>,
        diameter_y_mm: Option<f64>,
    ) -> Status {
        let current = self.params.pupil;
        let pupil = Rect {
            center_x_mm: real(center_x_mm, current.center_x_mm),
            center_y_mm: real(center_y_mm, current.center_y_mm),
            size_x_mm: real(diameter_x_mm, current.size_x_mm),
            size_y_mm: real(diameter_y_mm, current.size_y_mm),
        };
        self.params.pupil = pupil;
        let raw = self.sdk.set_pupil(
            self.vi(),
            pupil.center_x_mm,
            pupil.center_y_mm,
            pupil.size_x_mm,
            pupil.size_y_mm,
        );
        let status = self.decode("set_pupil", raw);
        self.log("set_pupil", &status, format_args!("{pupil:?}"));
        status
    }

    pub fn get_pupil(&mut self) -> (Status, Rect) {
        let (status, pupil) = self.read_rect(RectRead::Pupil);
        if status.is_ok() {
            self.params.pupil = pupil;
        }
        self.log("get_pupil", &status, format_args!("{pupil:?}"));
        (status, pupil)
    }

    fn read_rect(&mut self, read: RectRead) -> (Status, Rect) {
        let mut cells: [ViReal64; 4] = [0.0; 4];
        let [cx, cy, sx, sy] = &mut cells;
        let raw = match read {
            RectRead::Aoi => self.sdk.get_aoi(self.vi(), cx, cy, sx, sy),
            RectRead::Pupil => self.sdk.get_pupil(self.vi(), cx, cy, sx, sy),
        };
        let status = self.decode(read.op(), raw);
        let [center_x_mm, center_y_mm, size_x_mm, size_y_mm] = cells;
        (
            status,
            Rect {
                center_x_mm,
                center_y_mm,
                size_x_mm,
                size_y_mm,
            },
        )
    }

    /// Selects the internal (0) or user (1) reference.
    pub fn set_reference_plane(&mut self, reference: Option<i32>) -> Status {
        self.params.reference_plane = int(reference, self.params.reference_plane);
        let raw = self
            .sdk
            .set_reference_plane(self.vi(), self.params.reference_plane);
        let status = self.decode("set_reference_plane", raw);
        self.log(
            "set_reference_plane",
            &status,
            format_args!("reference={}", self.params.reference_plane),
        );
        status
    }

    pub fn get_reference_plane(&mut self) -> (Status, ViInt32) {
        let mut reference = Vi::int32(0);
        let raw = self.sdk.get_reference_plane(self.vi(), reference.slot());
        let status = self.decode("get_reference_plane", raw);
        if status.is_ok() {
            self.params.reference_plane = reference.value();
        }
        self.log(
            "get_reference_plane",
            &status,
            format_args!("reference={}", reference.value()),
        );
        (status, reference.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;
    use crate::sdk::MockWfsSdk;

    fn open(name: &str) -> (MockWfsSdk, Wfs<MockWfsSdk>) {
        let sdk = MockWfsSdk::new();
        sdk.state().instrument_name = name.to_string();
        let mut wfs = Wfs::new(sdk.clone());
        assert!(wfs.init(None, None, None).unwrap().is_ok());
        assert!(wfs.get_instrument_info().0.is_ok());
        sdk.clear_calls();
        (sdk, wfs)
    }

    #[test]
    fn getters_reach_their_own_entry_points() {
        let (sdk, mut wfs) = open("WFS150-7AR");
        wfs.take_steps();
        let (status, pupil) = wfs.get_pupil();
        assert!(status.is_ok());
        assert_eq!(pupil.size_x_mm, 4.76);
        assert_eq!(wfs.parameters().pupil, pupil);
        assert!(wfs.get_aoi().0.is_ok());
        assert!(wfs.get_mla_data(None).0.is_ok());
        assert!(wfs.get_mla_data2(None).0.is_ok());
        assert_eq!(
            sdk.call_names(),
            vec!["get_pupil", "get_aoi", "get_mla_data", "get_mla_data2"]
        );
        let ops: Vec<_> = wfs.steps().map(|s| s.op).collect();
        assert_eq!(ops, vec!["get_pupil", "get_aoi", "get_mla_data", "get_mla_data2"]);
    }

    #[test]
    fn aoi_below_minimum_is_rejected_locally() {
        let (sdk, mut wfs) = open("WFS150-7AR");
        let status = wfs.set_aoi(Some(0.0), Some(0.0), Some(0.3), Some(1.0));
        assert_eq!(status, WFS_ERROR_PARAMETER4);
        assert_eq!(status.message, "Parameter 4 out of range!");
        let status = wfs.set_aoi(Some(0.0), Some(0.0), Some(1.0), Some(0.3));
        assert_eq!(status, WFS_ERROR_PARAMETER5);
        assert!(sdk.calls().is_empty());
        assert_eq!(wfs.parameters().aoi, Rect::default());
        assert_eq!(wfs.first_failure().map(|s| s.op), Some("set_aoi"));
    }

    #[test]
    fn full_sensor_aoi_reaches_the_driver() {
        let (sdk, mut wfs) = open("WFS150-7AR");
        assert!(wfs.set_aoi(Some(0.0), Some(0.0), Some(0.0), Some(0.0)).is_ok());
        assert_eq!(sdk.last_args("set_aoi"), Some(vec![0.0; 4]));
        assert!(wfs.set_aoi(None, None, Some(2.0), Some(2.0)).is_ok());
        let (_, aoi) = wfs.get_aoi();
        assert_eq!(aoi.size_x_mm, 2.0);
    }

    #[test]
    fn configure_cam_derives_resolution_from_family() {
        let (sdk, mut wfs) = open("WFS20-5C");
        let (status, (spots_x, spots_y)) = wfs.configure_cam(Some(PIXEL_FORMAT_MONO8), Some(5));
        assert!(status.is_ok());
        let derived = wfs.derived();
        assert_eq!(
            (derived.cam_resolution_x, derived.cam_resolution_y, derived.cam_resolution_factor),
            (720, 540, 2)
        );
        assert_eq!((derived.spots_x, derived.spots_y), (spots_x, spots_y));
        assert!(spots_x > 0);
        assert_eq!(sdk.last_args("configure_cam"), Some(vec![0.0, 5.0]));
    }

    #[test]
    fn configure_cam_rejects_unknown_resolution_index() {
        let (sdk, mut wfs) = open("WFS150-7AR");
        let (status, _) = wfs.configure_cam(None, Some(5));
        assert_eq!(status, WFS_ERROR_PARAMETER3);
        assert!(sdk.calls().is_empty());
        assert_eq!(wfs.parameters().resolution_index, 0);
        assert_eq!(wfs.derived().cam_resolution_x, 0);
    }

    #[test]
    fn trigger_mode_is_range_checked() {
        let (sdk, mut wfs) = open("WFS150-7AR");
        assert_eq!(wfs.set_trigger_mode(Some(4)), WFS_ERROR_PARAMETER2);
        assert!(sdk.calls().is_empty());
        assert!(wfs.set_trigger_mode(Some(WFS_SW_TRIGGER)).is_ok());
        assert_eq!(wfs.get_trigger_mode().1, WFS_SW_TRIGGER);
    }

    #[test]
    fn ranges_are_kept_in_results() {
        let (_, mut wfs) = open("WFS150-7AR");
        let (_, exposure) = wfs.get_exposure_time_range();
        let (_, gain) = wfs.get_master_gain_range();
        let (_, delay) = wfs.get_trigger_delay_range();
        assert_eq!(exposure.max, 65.0);
        assert_eq!(wfs.results().master_gain_range, gain);
        assert_eq!(wfs.results().trigger_delay_range.min, delay.min);
        let (status, act) = wfs.set_trigger_delay(Some(delay.min));
        assert!(status.is_ok());
        assert_eq!(act, 15);
    }

    #[test]
    fn driver_side_range_errors_are_decoded() {
        let (sdk, mut wfs) = open("WFS150-7AR");
        let (status, _) = wfs.set_master_gain(Some(9.0));
        assert_eq!(status, WFS_ERROR_PARAMETER2);
        assert_eq!(sdk.call_names(), vec!["set_master_gain", "error_message"]);
        assert_eq!(wfs.set_pupil(Some(0.0), Some(5.001), Some(5.4), Some(5.4)), WFS_ERROR_PARAMETER3);
        assert_eq!(wfs.set_black_level_offset(Some(256)), WFS_ERROR_PARAMETER2);
    }

    #[test]
    fn mla_data_is_stored_on_the_instrument() {
        let (_, mut wfs) = open("WFS150-7AR");
        assert_eq!(wfs.get_mla_count().1, 1);
        let (status, mla) = wfs.get_mla_data(None);
        assert!(status.is_ok());
        assert_eq!(mla.name, "MLA150-7AR");
        assert_eq!(mla.calibration.lenslet_pitch_um, 150.0);
        assert_eq!(wfs.instrument().mla.as_ref(), Some(&mla));
        assert_eq!(wfs.select_mla(Some(1)), WFS_ERROR_PARAMETER2);
    }

    #[test]
    fn user_reference_plane_needs_a_reference() {
        let (sdk, mut wfs) = open("WFS150-7AR");
        assert_eq!(wfs.set_reference_plane(Some(WFS_REF_USER)), WFS_ERROR_NO_USER_REFERENCE);
        sdk.state().user_reference = true;
        assert!(wfs.set_reference_plane(None).is_ok());
        assert_eq!(wfs.get_reference_plane().1, WFS_REF_USER);
    }

    #[test]
    fn highspeed_windows_follow_the_mode() {
        let (_, mut wfs) = open("WFS20-5C");
        let (status, _) = wfs.get_highspeed_windows();
        assert_eq!(status, WFS_ERROR_HIGHSPEED_NOT_ACTIVE);
        assert!(wfs.set_highspeed_mode(Some(true), Some(true), None, None).is_ok());
        assert!(wfs.check_highspeed_centroids().is_ok());
        wfs.configure_cam(None, None);
        let (status, windows) = wfs.get_highspeed_windows();
        assert!(status.is_ok());
        assert_eq!(windows.size_x, 32);
        assert_eq!(wfs.buffers().window_start_x[1], 32);
    }
}
