//! Image acquisition and image statistics.
//!
//! Images are stored packed: the first `rows × columns` bytes of
//! `buffers().image` hold the last frame read back, row by row.

use tracing::debug;
use wfs_sys::ViStatus;

use super::{flag, int, switch, AutoExposure, ImageExtent, ImageMinMax, Noise, Wfs};
use crate::constants::{NOISE_LEVEL_MAX, NOISE_LEVEL_MIN};
use crate::sdk::WfsSdk;
use crate::status::Status;
use crate::vi::Vi;

impl<S: WfsSdk> Wfs<S> {
    pub fn take_spotfield_image(&mut self) -> Status {
        let raw = self.sdk.take_spotfield_image(self.vi());
        let status = self.decode("take_spotfield_image", raw);
        self.log("take_spotfield_image", &status, format_args!(""));
        status
    }

    /// Takes an image, letting the camera pick exposure and gain.
    pub fn take_spotfield_image_auto_exposure(&mut self) -> (Status, AutoExposure) {
        let mut exposure = Vi::real64(0.0);
        let mut gain = Vi::real64(0.0);
        let raw = self
            .sdk
            .take_spotfield_image_auto_exposure(self.vi(), exposure.slot(), gain.slot());
        let status = self.decode("take_spotfield_image_auto_exposure", raw);
        let auto = AutoExposure {
            exposure_time_ms: exposure.value(),
            master_gain: gain.value(),
        };
        if status.is_ok() {
            self.params.exposure_time_ms = auto.exposure_time_ms;
            self.params.master_gain = auto.master_gain;
        }
        self.log(
            "take_spotfield_image_auto_exposure",
            &status,
            format_args!("exposure={} ms gain={}", auto.exposure_time_ms, auto.master_gain),
        );
        (status, auto)
    }

    /// Reads back the last image from driver memory into the owned buffer.
    pub fn get_spotfield_image(&mut self) -> (Status, ImageExtent) {
        let mut rows = Vi::int32(0);
        let mut columns = Vi::int32(0);
        let mut address = 0usize;
        let vi = self.vi();
        let raw = self.sdk.get_spotfield_image(
            vi,
            self.buffers.image.as_mut_slice(),
            &mut address,
            rows.slot(),
            columns.slot(),
        );
        self.finish_image("get_spotfield_image", raw, rows.value(), columns.value(), address)
    }

    /// Has the driver copy the last image straight into the owned buffer.
    pub fn get_spotfield_image_copy(&mut self) -> (Status, ImageExtent) {
        let mut rows = Vi::int32(0);
        let mut columns = Vi::int32(0);
        let vi = self.vi();
        let raw = self.sdk.get_spotfield_image_copy(
            vi,
            self.buffers.image.as_mut_slice(),
            rows.slot(),
            columns.slot(),
        );
        let address = self.buffers.image.as_slice().as_ptr() as usize;
        self.finish_image("get_spotfield_image_copy", raw, rows.value(), columns.value(), address)
    }

    fn finish_image(
        &mut self,
        op: &'static str,
        raw: ViStatus,
        rows: i32,
        columns: i32,
        address: usize,
    ) -> (Status, ImageExtent) {
        let status = self.decode(op, raw);
        let extent = ImageExtent { rows, columns };
        if status.is_ok() {
            self.results.image = extent;
            self.buffers.image_address = address;
            debug!(target: "WFS", op, rows, columns, address, "image extent");
        }
        self.log(op, &status, format_args!("rows={rows} columns={columns} address={address:#x}"));
        (status, extent)
    }

    /// Accumulates one frame into an average of `count`; `true` once the
    /// average is complete.
    pub fn average_image(&mut self, count: Option<i32>) -> (Status, bool) {
        self.params.average_count = int(count, self.params.average_count);
        let mut ready = Vi::int32(0);
        let raw = self
            .sdk
            .average_image(self.vi(), self.params.average_count, ready.slot());
        let status = self.decode("average_image", raw);
        let ready = ready.value() != 0;
        if status.is_ok() {
            self.results.average_data_ready = ready;
        }
        self.log(
            "average_image",
            &status,
            format_args!("count={} data_ready={ready}", self.params.average_count),
        );
        (status, ready)
    }

    pub fn average_image_rolling(&mut self, count: Option<i32>, reset: Option<bool>) -> Status {
        self.params.average_count = int(count, self.params.average_count);
        self.params.rolling_reset = flag(reset, self.params.rolling_reset);
        let raw = self.sdk.average_image_rolling(
            self.vi(),
            self.params.average_count,
            switch(self.params.rolling_reset),
        );
        let status = self.decode("average_image_rolling", raw);
        self.log(
            "average_image_rolling",
            &status,
            format_args!(
                "count={} reset={}",
                self.params.average_count, self.params.rolling_reset
            ),
        );
        status
    }

    /// Zeroes every pixel at or below `limit` (default: the configured floor).
    pub fn cut_image_noise_floor(&mut self, limit: Option<i32>) -> Status {
        self.params.intensity_limit = int(limit, self.params.intensity_limit);
        let limit = self.params.intensity_limit;
        if !(NOISE_LEVEL_MIN..=NOISE_LEVEL_MAX).contains(&limit) {
            debug!(target: "WFS", limit, "noise floor outside documented range");
        }
        let raw = self.sdk.cut_image_noise_floor(self.vi(), limit);
        let status = self.decode("cut_image_noise_floor", raw);
        self.log("cut_image_noise_floor", &status, format_args!("limit={limit}"));
        status
    }

    pub fn calc_image_min_max(&mut self) -> (Status, ImageMinMax) {
        let mut min = Vi::int32(0);
        let mut max = Vi::int32(0);
        let mut saturated = Vi::real64(0.0);
        let raw = self
            .sdk
            .calc_image_min_max(self.vi(), min.slot(), max.slot(), saturated.slot());
        let status = self.decode("calc_image_min_max", raw);
        let stats = ImageMinMax {
            min: min.value(),
            max: max.value(),
            saturated_pixels_percent: saturated.value(),
        };
        if status.is_ok() {
            self.results.image_min_max = stats;
        }
        self.log(
            "calc_image_min_max",
            &status,
            format_args!(
                "min={} max={} saturated={}%",
                stats.min, stats.max, stats.saturated_pixels_percent
            ),
        );
        (status, stats)
    }

    pub fn calc_mean_rms_noise(&mut self) -> (Status, Noise) {
        let mut mean = Vi::real64(0.0);
        let mut rms = Vi::real64(0.0);
        let raw = self.sdk.calc_mean_rms_noise(self.vi(), mean.slot(), rms.slot());
        let status = self.decode("calc_mean_rms_noise", raw);
        let noise = Noise {
            mean: mean.value(),
            rms: rms.value(),
        };
        if status.is_ok() {
            self.results.noise = noise;
        }
        self.log(
            "calc_mean_rms_noise",
            &status,
            format_args!("mean={} rms={}", noise.mean, noise.rms),
        );
        (status, noise)
    }

    /// Intensities of image row `line` into `buffers().line_selected`.
    pub fn get_line(&mut self, line: Option<i32>) -> Status {
        self.params.line = int(line, self.params.line);
        let vi = self.vi();
        let raw = self
            .sdk
            .get_line(vi, self.params.line, self.buffers.line_selected.as_mut_slice());
        let status = self.decode("get_line", raw);
        self.log("get_line", &status, format_args!("line={}", self.params.line));
        status
    }

    /// Column-wise minimum and maximum into `buffers().line_min/_max`.
    pub fn get_line_view(&mut self) -> Status {
        let vi = self.vi();
        let buffers = &mut self.buffers;
        let raw = self.sdk.get_line_view(
            vi,
            buffers.line_min.as_mut_slice(),
            buffers.line_max.as_mut_slice(),
        );
        let status = self.decode("get_line_view", raw);
        self.log(
            "get_line_view",
            &status,
            format_args!("columns={}", self.results.image.columns),
        );
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::WFS_ERROR_AWAITING_TRIGGER;
    use crate::sdk::MockWfsSdk;

    fn open() -> (MockWfsSdk, Wfs<MockWfsSdk>) {
        let sdk = MockWfsSdk::new();
        let mut wfs = Wfs::new(sdk.clone());
        assert!(wfs.init(None, None, None).unwrap().is_ok());
        sdk.clear_calls();
        (sdk, wfs)
    }

    #[test]
    fn image_is_copied_into_owned_buffer() {
        let (sdk, mut wfs) = open();
        sdk.state().image_size = (4, 64);
        let (status, extent) = wfs.get_spotfield_image();
        assert!(status.is_ok());
        assert_eq!(extent, ImageExtent { rows: 4, columns: 64 });
        assert_eq!(wfs.results().image, extent);
        assert_ne!(wfs.buffers().image_address, 0);
        let frame = &wfs.buffers().image.as_slice()[..4 * 64];
        assert!(frame.contains(&200));
        assert!(frame.contains(&3));
    }

    #[test]
    fn auto_exposure_updates_parameters() {
        let (sdk, mut wfs) = open();
        sdk.state().exposure = 12.5;
        sdk.state().master_gain = 1.25;
        let (status, auto) = wfs.take_spotfield_image_auto_exposure();
        assert!(status.is_ok());
        assert_eq!(auto.exposure_time_ms, 12.5);
        assert_eq!(wfs.parameters().master_gain, 1.25);
    }

    #[test]
    fn averaging_reports_completion() {
        let (_, mut wfs) = open();
        assert!(!wfs.average_image(Some(2)).1);
        assert!(wfs.average_image(None).1);
        assert!(wfs.results().average_data_ready);
        assert!(wfs.average_image_rolling(Some(4), Some(true)).is_ok());
    }

    #[test]
    fn noise_floor_defaults_to_configured_limit() {
        let (sdk, mut wfs) = open();
        assert!(wfs.cut_image_noise_floor(None).is_ok());
        assert_eq!(sdk.last_args("cut_image_noise_floor"), Some(vec![10.0]));
    }

    #[test]
    fn pending_trigger_is_an_error() {
        let (sdk, mut wfs) = open();
        sdk.force("take_spotfield_image", WFS_ERROR_AWAITING_TRIGGER);
        let status = wfs.take_spotfield_image();
        assert_eq!(status, WFS_ERROR_AWAITING_TRIGGER);
        assert_eq!(status.message, "Function is awaiting a hardware trigger!");
        assert!(wfs.first_failure().is_some());
    }

    #[test]
    fn line_statistics_fill_buffers() {
        let (_, mut wfs) = open();
        assert!(wfs.get_line(Some(3)).is_ok());
        assert_eq!(wfs.buffers().line_selected.as_slice()[0], 3.0);
        assert!(wfs.get_line_view().is_ok());
        assert_eq!(wfs.buffers().line_max.as_slice()[0], 250.0);
        let (_, stats) = wfs.calc_image_min_max();
        assert_eq!(stats.max, 250);
        let (_, noise) = wfs.calc_mean_rms_noise();
        assert_eq!(wfs.results().noise, noise);
    }
}
