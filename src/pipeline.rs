//! Measurement pipeline.
//!
//! `connect`, `config`, `update` and `disconnect` run low-level operations in
//! the order the sensor needs to produce a wavefront, a Zernike fit and a
//! radius of curvature. Apart from `connect`, the pipeline never stops on a
//! failing step: every status is recorded on the handle and the first failure
//! is available from [`Wfs::first_failure`].

use tracing::{info, warn};

use crate::config::MeasurementSettings;
use crate::constants::{DeviceStatus, WFS_REF_INTERNAL};
use crate::driver::Wfs;
use crate::error::{WfsError, WfsResult};
use crate::sdk::WfsSdk;
use crate::status::Status;

impl<S: WfsSdk> Wfs<S> {
    /// Opens the first listed instrument and reads its identity.
    pub fn connect(&mut self) -> WfsResult<DeviceStatus> {
        self.connect_resource(None)
    }

    /// Like [`Wfs::connect`], opening `resource_name` instead of the listed
    /// resource when given.
    ///
    /// # Errors
    ///
    /// `Connection` when no instrument is listed, the listed one is in use,
    /// or `init` leaves the session at 0.
    pub fn connect_resource(&mut self, resource_name: Option<&str>) -> WfsResult<DeviceStatus> {
        self.take_steps();

        let (status, count) = self.get_instrument_list_len();
        if count < 1 {
            return Err(connection_error("no wavefront sensor found", &status));
        }

        let (status, listed) = self.get_instrument_list_info(Some(0));
        if !status.is_ok() {
            return Err(connection_error("instrument list unavailable", &status));
        }
        if listed.in_use {
            warn!(target: "WFS", resource = %listed.resource_name, "instrument in use");
            return Err(WfsError::Connection(format!(
                "{} ({}) is already in use",
                listed.name, listed.resource_name
            )));
        }

        let status = self.init(resource_name, Some(true), Some(true))?;
        if !self.is_open() {
            return Err(connection_error("init returned no session", &status));
        }

        self.revision_query();
        self.get_instrument_info();
        self.get_mla_count();
        self.get_mla_data(None);
        let (_, device_status) = self.get_status();

        info!(
            target: "WFS",
            session = self.session(),
            instrument = %self.instrument().name,
            serial = %self.instrument().serial_wfs,
            %device_status,
            "connected"
        );
        Ok(device_status)
    }

    /// Puts the sensor into a known measurement state.
    ///
    /// Selects the MLA and camera resolution, snapshots the current camera
    /// settings and their ranges, then sets the trigger delay to its minimum,
    /// the pupil, a full-sensor AOI, unit gain, zero black level and the
    /// internal reference plane.
    pub fn config(&mut self, settings: &MeasurementSettings) -> DeviceStatus {
        self.take_steps();
        apply(self, settings);

        self.select_mla(Some(settings.mla_index));
        self.configure_cam(Some(settings.pixel_format), Some(settings.resolution_index));
        self.get_aoi();
        self.get_black_level_offset();
        self.get_exposure_time_range();
        self.get_exposure_time();
        self.get_master_gain_range();
        self.get_master_gain();
        let (_, delay_range) = self.get_trigger_delay_range();
        self.set_trigger_delay(Some(delay_range.min));
        self.get_trigger_mode();
        self.set_pupil(
            Some(settings.pupil_center_x_mm),
            Some(settings.pupil_center_y_mm),
            Some(settings.pupil_diameter_x_mm),
            Some(settings.pupil_diameter_y_mm),
        );
        self.get_pupil();
        self.set_aoi(Some(0.0), Some(0.0), Some(0.0), Some(0.0));
        self.get_aoi();
        self.set_master_gain(Some(1.0));
        self.set_black_level_offset(Some(0));
        self.set_reference_plane(Some(WFS_REF_INTERNAL));
        let (_, device_status) = self.get_status();

        self.summarize("config", format_args!("device_status={device_status}"));
        device_status
    }

    /// Takes one image and runs the analysis chain; returns the radius of
    /// curvature in mm from the Zernike fit.
    pub fn update(&mut self) -> f64 {
        self.take_steps();

        if self.parameters().allow_auto_exposure {
            self.take_spotfield_image_auto_exposure();
        } else {
            self.take_spotfield_image();
        }
        self.get_status();
        self.cut_image_noise_floor(None);
        self.get_spotfield_image();
        self.calc_spots_centroid_diameter_intensity(None, None);
        self.get_spot_centroids();
        self.calc_beam_centroid_diameter();
        self.calc_spot_to_reference_deviations(None);
        self.get_spot_deviations();
        self.calc_wavefront(None, None);
        self.calc_wavefront_statistics();
        self.get_line_view();
        let (_, fit) = self.zernike_lsf(None);

        self.summarize(
            "update",
            format_args!(
                "roc={} mm orders={} spots={}",
                fit.roc_mm,
                fit.orders,
                self.detected_spots()
            ),
        );
        fit.roc_mm
    }

    pub fn disconnect(&mut self) -> Status {
        self.take_steps();
        self.close()
    }

    fn summarize(&self, phase: &'static str, detail: std::fmt::Arguments<'_>) {
        match self.first_failure() {
            None => info!(target: "WFS", phase, "{detail}"),
            Some(step) => warn!(
                target: "WFS",
                phase,
                failed_op = step.op,
                code = step.status.code,
                message = %step.status.message,
                "{detail}"
            ),
        }
    }
}

/// Copies the pipeline defaults into the handle's parameters.
fn apply<S: WfsSdk>(wfs: &mut Wfs<S>, settings: &MeasurementSettings) {
    let params = wfs.parameters_mut();
    params.intensity_limit = settings.intensity_limit;
    params.allow_auto_exposure = settings.allow_auto_exposure;
    params.dynamic_noise_cut = settings.dynamic_noise_cut;
    params.calculate_diameters = settings.calculate_diameters;
    params.cancel_wavefront_tilt = settings.cancel_wavefront_tilt;
    params.wavefront_type = settings.wavefront_type;
    params.limit_to_pupil = settings.limit_to_pupil;
    params.zernike_orders = settings.zernike_orders;
}

fn connection_error(what: &str, status: &Status) -> WfsError {
    WfsError::Connection(format!("{what}: {} ({})", status.message, status.code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::MockWfsSdk;
    use tracing_test::traced_test;

    #[test]
    fn zero_session_is_a_connection_error() {
        let sdk = MockWfsSdk::new();
        sdk.state().session = 0;
        let mut wfs = Wfs::new(sdk.clone());
        let err = wfs.connect().unwrap_err();
        assert!(matches!(err, WfsError::Connection(_)));
        assert_eq!(
            sdk.call_names(),
            vec!["get_instrument_list_len", "get_instrument_list_info", "init"]
        );
    }

    #[test]
    fn no_instrument_is_a_connection_error() {
        let sdk = MockWfsSdk::new();
        sdk.state().instrument_count = 0;
        let mut wfs = Wfs::new(sdk.clone());
        assert!(matches!(wfs.connect(), Err(WfsError::Connection(_))));
        assert_eq!(sdk.call_names(), vec!["get_instrument_list_len"]);
    }

    #[test]
    fn update_without_auto_exposure_takes_plain_image() {
        let sdk = MockWfsSdk::new();
        let mut wfs = Wfs::new(sdk.clone());
        wfs.connect().unwrap();
        let settings = MeasurementSettings {
            allow_auto_exposure: false,
            ..MeasurementSettings::default()
        };
        wfs.config(&settings);
        sdk.clear_calls();
        wfs.update();
        assert_eq!(sdk.call_names()[0], "take_spotfield_image");
        assert!(wfs.first_failure().is_none());
    }

    #[test]
    fn steps_cover_one_phase() {
        let sdk = MockWfsSdk::new();
        let mut wfs = Wfs::new(sdk);
        wfs.connect().unwrap();
        assert_eq!(wfs.steps().count(), 8);
        assert!(wfs.disconnect().is_ok());
        let ops: Vec<_> = wfs.steps().map(|s| s.op).collect();
        assert_eq!(ops, vec!["close"]);
        assert!(!wfs.is_open());
    }

    #[test]
    #[traced_test]
    fn update_logs_each_call_and_the_phase() {
        let sdk = MockWfsSdk::new();
        let mut wfs = Wfs::new(sdk);
        wfs.connect().unwrap();
        wfs.config(&MeasurementSettings::default());
        wfs.update();
        assert!(logs_contain("connected"));
        assert!(logs_contain("calc_wavefront_statistics"));
        assert!(logs_contain("zernike_lsf"));
        assert!(logs_contain("roc=2500 mm"));
    }
}
