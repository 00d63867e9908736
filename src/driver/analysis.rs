//! Spot analysis, Zernike fit and wavefront reconstruction.
//!
//! Grid outputs land in the handle's `MAX_SPOTS_Y × MAX_SPOTS_X` buffers; only
//! the `spots_y × spots_x` prefix set by `configure_cam` is meaningful.

use tracing::debug;
use wfs_sys::ViStatus;

use super::{
    flag, int, real, switch, BeamGeometry, FitError, FourierOptometric, SpotDiameterStatistics,
    WavefrontStatistics, Wfs, ZernikeFit,
};
use crate::constants::{is_valid_zernike_order, zernike_modes, FOURIER_ORDERS};
use crate::reference::detected;
use crate::sdk::WfsSdk;
use crate::status::Status;
use crate::vi::{Vi, ViArray};

/// Spot grids the driver reports as an X/Y pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpotPair {
    Centroids,
    Diameters,
    ReferencePositions,
    Deviations,
}

impl SpotPair {
    fn op(self) -> &'static str {
        match self {
            SpotPair::Centroids => "get_spot_centroids",
            SpotPair::Diameters => "get_spot_diameters",
            SpotPair::ReferencePositions => "get_spot_reference_positions",
            SpotPair::Deviations => "get_spot_deviations",
        }
    }
}

/// Replaces the contents of `staging` with `input`, or with `fallback` when
/// no input is given.
fn stage(staging: &mut ViArray<f32>, input: Option<&[f32]>, fallback: &ViArray<f32>) -> usize {
    staging.reset();
    staging.copy_from(input.unwrap_or(fallback.as_slice()))
}

impl<S: WfsSdk> Wfs<S> {
    pub fn calc_beam_centroid_diameter(&mut self) -> (Status, BeamGeometry) {
        let mut cx = Vi::real64(0.0);
        let mut cy = Vi::real64(0.0);
        let mut dx = Vi::real64(0.0);
        let mut dy = Vi::real64(0.0);
        let raw = self.sdk.calc_beam_centroid_diameter(
            self.vi(),
            cx.slot(),
            cy.slot(),
            dx.slot(),
            dy.slot(),
        );
        let status = self.decode("calc_beam_centroid_diameter", raw);
        let beam = BeamGeometry {
            centroid_x_mm: cx.value(),
            centroid_y_mm: cy.value(),
            diameter_x_mm: dx.value(),
            diameter_y_mm: dy.value(),
        };
        if status.is_ok() {
            self.results.beam = beam;
        }
        self.log(
            "calc_beam_centroid_diameter",
            &status,
            format_args!(
                "centroid=({}, {}) mm diameter=({}, {}) mm",
                beam.centroid_x_mm, beam.centroid_y_mm, beam.diameter_x_mm, beam.diameter_y_mm
            ),
        );
        (status, beam)
    }

    /// Detects spots in the last image and computes their centroids (and
    /// diameters when asked).
    pub fn calc_spots_centroid_diameter_intensity(
        &mut self,
        dynamic_noise_cut: Option<bool>,
        calculate_diameters: Option<bool>,
    ) -> Status {
        self.params.dynamic_noise_cut = flag(dynamic_noise_cut, self.params.dynamic_noise_cut);
        self.params.calculate_diameters =
            flag(calculate_diameters, self.params.calculate_diameters);
        let raw = self.sdk.calc_spots_centroid_diameter_intensity(
            self.vi(),
            switch(self.params.dynamic_noise_cut),
            switch(self.params.calculate_diameters),
        );
        let status = self.decode("calc_spots_centroid_diameter_intensity", raw);
        self.log(
            "calc_spots_centroid_diameter_intensity",
            &status,
            format_args!(
                "dynamic_noise_cut={} calculate_diameters={}",
                self.params.dynamic_noise_cut, self.params.calculate_diameters
            ),
        );
        status
    }

    /// Spot centroids in pixels into `buffers().centroid_x/_y`. Undetected
    /// spots read 0.0; see [`centroid`](Self::centroid).
    pub fn get_spot_centroids(&mut self) -> Status {
        self.read_spot_pair(SpotPair::Centroids)
    }

    /// Spot diameters in pixels into `buffers().diameter_x/_y`.
    pub fn get_spot_diameters(&mut self) -> Status {
        self.read_spot_pair(SpotPair::Diameters)
    }

    pub fn get_spot_reference_positions(&mut self) -> Status {
        self.read_spot_pair(SpotPair::ReferencePositions)
    }

    /// Centroid-to-reference deviations in pixels into
    /// `buffers().deviation_x/_y`.
    pub fn get_spot_deviations(&mut self) -> Status {
        self.read_spot_pair(SpotPair::Deviations)
    }

    fn read_spot_pair(&mut self, pair: SpotPair) -> Status {
        let vi = self.vi();
        let b = &mut self.buffers;
        let (x, y) = match pair {
            SpotPair::Centroids => (&mut b.centroid_x, &mut b.centroid_y),
            SpotPair::Diameters => (&mut b.diameter_x, &mut b.diameter_y),
            SpotPair::ReferencePositions => (&mut b.reference_x, &mut b.reference_y),
            SpotPair::Deviations => (&mut b.deviation_x, &mut b.deviation_y),
        };
        let (x, y) = (x.as_mut_slice(), y.as_mut_slice());
        let raw: ViStatus = match pair {
            SpotPair::Centroids => self.sdk.get_spot_centroids(vi, x, y),
            SpotPair::Diameters => self.sdk.get_spot_diameters(vi, x, y),
            SpotPair::ReferencePositions => self.sdk.get_spot_reference_positions(vi, x, y),
            SpotPair::Deviations => self.sdk.get_spot_deviations(vi, x, y),
        };
        let op = pair.op();
        let status = self.decode(op, raw);
        let (columns, rows) = self.derived.active_spots();
        if pair == SpotPair::Centroids {
            debug!(
                target: "WFS",
                op,
                detected = self.detected_spots(),
                total = columns * rows,
                "spot detection"
            );
        }
        self.log(op, &status, format_args!("spots={columns}x{rows}"));
        status
    }

    /// Number of detected spots in the active grid of the last centroids.
    pub fn detected_spots(&self) -> usize {
        let (columns, rows) = self.derived.active_spots();
        self.buffers
            .centroid_x
            .active(rows, columns)
            .flat_map(|row| row.iter())
            .filter(|x| detected(**x).is_some())
            .count()
    }

    pub fn get_spot_diameters_statistics(&mut self) -> (Status, SpotDiameterStatistics) {
        let mut min = Vi::real64(0.0);
        let mut max = Vi::real64(0.0);
        let mut mean = Vi::real64(0.0);
        let raw = self
            .sdk
            .get_spot_diameters_statistics(self.vi(), min.slot(), max.slot(), mean.slot());
        let status = self.decode("get_spot_diameters_statistics", raw);
        let stats = SpotDiameterStatistics {
            min: min.value(),
            max: max.value(),
            mean: mean.value(),
        };
        if status.is_ok() {
            self.results.spot_diameters = stats;
        }
        self.log(
            "get_spot_diameters_statistics",
            &status,
            format_args!("min={} max={} mean={}", stats.min, stats.max, stats.mean),
        );
        (status, stats)
    }

    pub fn get_spot_intensities(&mut self) -> Status {
        let vi = self.vi();
        let raw = self
            .sdk
            .get_spot_intensities(vi, self.buffers.intensity.as_mut_slice());
        let status = self.decode("get_spot_intensities", raw);
        let (columns, rows) = self.derived.active_spots();
        self.log("get_spot_intensities", &status, format_args!("spots={columns}x{rows}"));
        status
    }

    pub fn calc_spot_to_reference_deviations(&mut self, cancel_tilt: Option<bool>) -> Status {
        self.params.cancel_wavefront_tilt = flag(cancel_tilt, self.params.cancel_wavefront_tilt);
        let raw = self
            .sdk
            .calc_spot_to_reference_deviations(self.vi(), switch(self.params.cancel_wavefront_tilt));
        let status = self.decode("calc_spot_to_reference_deviations", raw);
        self.log(
            "calc_spot_to_reference_deviations",
            &status,
            format_args!("cancel_tilt={}", self.params.cancel_wavefront_tilt),
        );
        status
    }

    // ---- Zernike ------------------------------------------------------------

    /// Least-squares Zernike fit up to `orders` (0: the driver picks).
    ///
    /// Orders other than 0 and 2..=10 are rejected locally. On success the
    /// fitted order is mapped to its mode count and the coefficients are in
    /// `buffers().zernike_um[1..=modes]`.
    pub fn zernike_lsf(&mut self, orders: Option<i32>) -> (Status, ZernikeFit) {
        let requested = int(orders, self.params.zernike_orders);
        if !is_valid_zernike_order(requested) {
            let status = self.reject("zernike_lsf", 2, format_args!("orders={requested}"));
            return (status, self.results.zernike);
        }
        self.params.zernike_orders = requested;

        let mut fitted = Vi::int32(requested);
        let mut roc_mm = Vi::real64(0.0);
        let vi = self.vi();
        let b = &mut self.buffers;
        let raw = self.sdk.zernike_lsf(
            vi,
            fitted.slot(),
            b.zernike_um.as_mut_slice(),
            b.zernike_orders_rms_um.as_mut_slice(),
            roc_mm.slot(),
        );
        let status = self.decode("zernike_lsf", raw);
        let fit = ZernikeFit {
            orders: fitted.value(),
            modes: zernike_modes(fitted.value()).unwrap_or(0),
            roc_mm: roc_mm.value(),
        };
        if status.is_ok() {
            self.derived.zernike_modes = fit.modes;
            self.results.zernike = fit;
        }
        self.log(
            "zernike_lsf",
            &status,
            format_args!(
                "requested={requested} orders={} modes={} roc={} mm",
                fit.orders, fit.modes, fit.roc_mm
            ),
        );
        (status, fit)
    }

    /// Order of the last successful fit, else the configured one.
    fn fitted_orders(&self) -> i32 {
        match self.results.zernike.orders {
            0 => self.params.zernike_orders,
            orders => orders,
        }
    }

    /// Sphero-cylindrical description from the Zernike fit. Fourier orders
    /// other than 2, 4 and 6 are rejected locally.
    pub fn calc_fourier_optometric(
        &mut self,
        zernike_orders: Option<i32>,
        fourier_order: Option<i32>,
    ) -> (Status, FourierOptometric) {
        let orders = int(zernike_orders, self.fitted_orders());
        let candidate = int(fourier_order, self.params.fourier_order);
        if !FOURIER_ORDERS.contains(&candidate) {
            let status = self.reject(
                "calc_fourier_optometric",
                3,
                format_args!("fourier_order={candidate}"),
            );
            return (status, self.results.fourier);
        }
        self.params.fourier_order = candidate;

        let mut cells = [0.0f64; 6];
        let [m, j0, j45, sphere, cylinder, axis] = &mut cells;
        let raw = self.sdk.calc_fourier_optometric(
            self.vi(),
            orders,
            candidate,
            m,
            j0,
            j45,
            sphere,
            cylinder,
            axis,
        );
        let status = self.decode("calc_fourier_optometric", raw);
        let [m, j0, j45, sphere, cylinder, axis_deg] = cells;
        let fourier = FourierOptometric {
            m,
            j0,
            j45,
            sphere,
            cylinder,
            axis_deg,
        };
        if status.is_ok() {
            self.results.fourier = fourier;
        }
        self.log(
            "calc_fourier_optometric",
            &status,
            format_args!(
                "orders={orders} fourier_order={candidate} M={m} J0={j0} J45={j45} \
                 sphere={sphere} cylinder={cylinder} axis={axis_deg}"
            ),
        );
        (status, fourier)
    }

    /// Spot deviations reconstructed from the Zernike modes selected by
    /// `reconstruct` (one flag per mode, index 1..=modes). Without a mask the
    /// previously staged one is reused.
    pub fn calc_reconstructed_deviations(
        &mut self,
        zernike_orders: Option<i32>,
        reconstruct: Option<&[u8]>,
        do_spherical_reference: Option<bool>,
    ) -> (Status, FitError) {
        let orders = int(zernike_orders, self.fitted_orders());
        self.params.do_spherical_reference =
            flag(do_spherical_reference, self.params.do_spherical_reference);
        if let Some(mask) = reconstruct {
            self.buffers.zernike_reconstruct.reset();
            self.buffers.zernike_reconstruct.copy_from(mask);
        }
        let mut mean = Vi::real64(0.0);
        let mut stdev = Vi::real64(0.0);
        let vi = self.vi();
        let raw = self.sdk.calc_reconstructed_deviations(
            vi,
            orders,
            self.buffers.zernike_reconstruct.as_mut_slice(),
            switch(self.params.do_spherical_reference),
            mean.slot(),
            stdev.slot(),
        );
        let status = self.decode("calc_reconstructed_deviations", raw);
        let fit_error = FitError {
            mean: mean.value(),
            stdev: stdev.value(),
        };
        if status.is_ok() {
            self.results.fit_error = fit_error;
        }
        let selected = self
            .buffers
            .zernike_reconstruct
            .as_slice()
            .iter()
            .filter(|m| **m != 0)
            .count();
        self.log(
            "calc_reconstructed_deviations",
            &status,
            format_args!(
                "orders={orders} modes_selected={selected} spherical={} fit_error={}±{}",
                self.params.do_spherical_reference, fit_error.mean, fit_error.stdev
            ),
        );
        (status, fit_error)
    }

    // ---- wavefront ----------------------------------------------------------

    /// Wavefront in µm into `buffers().wavefront`: measured (0),
    /// reconstructed (1) or their difference (2).
    pub fn calc_wavefront(
        &mut self,
        wavefront_type: Option<i32>,
        limit_to_pupil: Option<bool>,
    ) -> Status {
        self.params.wavefront_type = int(wavefront_type, self.params.wavefront_type);
        self.params.limit_to_pupil = flag(limit_to_pupil, self.params.limit_to_pupil);
        let vi = self.vi();
        let raw = self.sdk.calc_wavefront(
            vi,
            self.params.wavefront_type,
            switch(self.params.limit_to_pupil),
            self.buffers.wavefront.as_mut_slice(),
        );
        let status = self.decode("calc_wavefront", raw);
        let (columns, rows) = self.derived.active_spots();
        self.log(
            "calc_wavefront",
            &status,
            format_args!(
                "type={} limit_to_pupil={} spots={columns}x{rows}",
                self.params.wavefront_type, self.params.limit_to_pupil
            ),
        );
        status
    }

    pub fn calc_wavefront_statistics(&mut self) -> (Status, WavefrontStatistics) {
        let mut cells = [0.0f64; 6];
        let [min, max, diff, mean, rms, weighted_rms] = &mut cells;
        let raw = self
            .sdk
            .calc_wavefront_statistics(self.vi(), min, max, diff, mean, rms, weighted_rms);
        let status = self.decode("calc_wavefront_statistics", raw);
        let [min, max, diff, mean, rms, weighted_rms] = cells;
        let stats = WavefrontStatistics {
            min,
            max,
            diff,
            mean,
            rms,
            weighted_rms,
        };
        if status.is_ok() {
            self.results.wavefront = stats;
        }
        self.log(
            "calc_wavefront_statistics",
            &status,
            format_args!(
                "min={min} max={max} pv={diff} mean={mean} rms={rms} weighted_rms={weighted_rms} um"
            ),
        );
        (status, stats)
    }

    /// Spot positions in mm along X and Y into `buffers().scale_x/_y`.
    pub fn get_xy_scale(&mut self) -> Status {
        let vi = self.vi();
        let b = &mut self.buffers;
        let raw = self
            .sdk
            .get_xy_scale(vi, b.scale_x.as_mut_slice(), b.scale_y.as_mut_slice());
        let status = self.decode("get_xy_scale", raw);
        let (columns, rows) = self.derived.active_spots();
        self.log("get_xy_scale", &status, format_args!("spots={columns}x{rows}"));
        status
    }

    /// Converts a wavefront in µm to waves of `wavelength_nm` into
    /// `buffers().wavefront_waves`. Without an input array the last
    /// calculated wavefront is converted.
    pub fn convert_wavefront_waves(
        &mut self,
        wavelength_nm: Option<f64>,
        wavefront: Option<&[f32]>,
    ) -> Status {
        self.params.wavelength_nm = real(wavelength_nm, self.params.wavelength_nm);
        let b = &mut self.buffers;
        let staged = stage(&mut b.wavefront_in, wavefront, &b.wavefront);
        let vi = self.vi();
        let b = &mut self.buffers;
        let raw = self.sdk.convert_wavefront_waves(
            vi,
            self.params.wavelength_nm,
            b.wavefront_in.as_mut_slice(),
            b.wavefront_waves.as_mut_slice(),
        );
        let status = self.decode("convert_wavefront_waves", raw);
        self.log(
            "convert_wavefront_waves",
            &status,
            format_args!("wavelength={} nm values={staged}", self.params.wavelength_nm),
        );
        status
    }

    /// Transposes a spot grid into `buffers().flipped`. Without an input
    /// array the last calculated wavefront is flipped.
    pub fn flip_2d_array(&mut self, array: Option<&[f32]>) -> Status {
        let b = &mut self.buffers;
        let staged = stage(&mut b.wavefront_in, array, &b.wavefront);
        let vi = self.vi();
        let b = &mut self.buffers;
        let raw = self.sdk.flip_2d_array(
            vi,
            b.wavefront_in.as_mut_slice(),
            b.flipped.as_mut_slice(),
        );
        let status = self.decode("flip_2d_array", raw);
        self.log("flip_2d_array", &status, format_args!("values={staged}"));
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;
    use crate::sdk::MockWfsSdk;

    /// Open WFS150 configured at full resolution.
    fn configured() -> (MockWfsSdk, Wfs<MockWfsSdk>) {
        let sdk = MockWfsSdk::new();
        let mut wfs = Wfs::new(sdk.clone());
        assert!(wfs.init(None, None, None).unwrap().is_ok());
        assert!(wfs.get_instrument_info().0.is_ok());
        assert!(wfs.configure_cam(None, None).0.is_ok());
        sdk.clear_calls();
        (sdk, wfs)
    }

    #[test]
    fn zernike_order_maps_to_mode_count() {
        let (sdk, mut wfs) = configured();
        sdk.state().roc_mm = 1234.5;
        let (status, fit) = wfs.zernike_lsf(Some(4));
        assert!(status.is_ok());
        assert_eq!(fit.modes, 15);
        assert_eq!(fit.roc_mm, 1234.5);
        assert_eq!(wfs.derived().zernike_modes, 15);
        assert_eq!(sdk.last_args("zernike_lsf"), Some(vec![4.0]));
    }

    #[test]
    fn auto_order_is_assigned_by_the_driver() {
        let (sdk, mut wfs) = configured();
        sdk.state().zernike_auto_order = 6;
        let (status, fit) = wfs.zernike_lsf(Some(ZERNIKE_ORDERS_AUTO));
        assert!(status.is_ok());
        assert_eq!(fit.orders, 6);
        assert_eq!(fit.modes, 28);
        assert_eq!(wfs.parameters().zernike_orders, ZERNIKE_ORDERS_AUTO);
        assert_eq!(wfs.buffers().zernike_um.as_slice()[0], 0.0);
    }

    #[test]
    fn invalid_orders_are_rejected_locally() {
        let (sdk, mut wfs) = configured();
        assert_eq!(wfs.zernike_lsf(Some(1)).0, WFS_ERROR_PARAMETER2);
        assert_eq!(wfs.zernike_lsf(Some(11)).0, WFS_ERROR_PARAMETER2);
        assert_eq!(wfs.calc_fourier_optometric(None, Some(3)).0, WFS_ERROR_PARAMETER3);
        assert!(sdk.calls().is_empty());
    }

    #[test]
    fn fourier_uses_the_fitted_order() {
        let (sdk, mut wfs) = configured();
        wfs.zernike_lsf(None);
        let (status, fourier) = wfs.calc_fourier_optometric(None, Some(4));
        assert!(status.is_ok());
        assert_eq!(sdk.last_args("calc_fourier_optometric"), Some(vec![4.0, 4.0]));
        assert_eq!(fourier.sphere, 1000.0 / 2500.0);
    }

    #[test]
    fn undetected_spots_read_as_none() {
        let (sdk, mut wfs) = configured();
        sdk.state().missing_spots = vec![(0, 1)];
        assert!(wfs.calc_spots_centroid_diameter_intensity(None, None).is_ok());
        assert!(wfs.get_spot_centroids().is_ok());
        assert!(wfs.centroid(0, 0).is_some());
        assert_eq!(wfs.centroid(0, 1), None);
        let (columns, rows) = wfs.derived().active_spots();
        assert_eq!(wfs.detected_spots(), columns * rows - 1);
        assert_eq!(wfs.centroid(rows, 0), None);
    }

    #[test]
    fn reconstruction_mask_is_staged() {
        let (sdk, mut wfs) = configured();
        let mut mask = vec![0u8; MAX_ZERNIKE_MODES + 1];
        mask[1..=15].fill(1);
        let (status, error) = wfs.calc_reconstructed_deviations(Some(4), Some(&mask), Some(true));
        assert!(status.is_ok());
        assert_eq!(error.stdev, 0.002);
        assert_eq!(sdk.last_args("calc_reconstructed_deviations"), Some(vec![4.0, 1.0]));
        assert_eq!(wfs.buffers().zernike_reconstruct.as_slice()[15], 1);
        assert_eq!(wfs.buffers().zernike_reconstruct.as_slice()[16], 0);
    }

    #[test]
    fn wavefront_conversion_defaults_to_last_wavefront() {
        let (_, mut wfs) = configured();
        assert!(wfs.calc_wavefront(Some(0), Some(false)).is_ok());
        let last = wfs.buffers().wavefront.get(1, 1).unwrap();
        assert!(wfs.convert_wavefront_waves(Some(500.0), None).is_ok());
        assert_eq!(wfs.buffers().wavefront_waves.get(1, 1), Some(last * 2.0));

        let mut custom = vec![0.0f32; MAX_SPOTS_X * MAX_SPOTS_Y];
        custom[1] = 7.0;
        assert!(wfs.flip_2d_array(Some(&custom)).is_ok());
        assert_eq!(wfs.buffers().flipped.get(1, 0), Some(7.0));
    }

    #[test]
    fn statistics_are_kept_in_results() {
        let (_, mut wfs) = configured();
        let (_, stats) = wfs.calc_wavefront_statistics();
        assert!((stats.diff - 0.30).abs() < 1e-12);
        assert_eq!(wfs.results().wavefront, stats);
        let (_, beam) = wfs.calc_beam_centroid_diameter();
        assert_eq!(beam.diameter_x_mm, 4.76);
        let (_, spots) = wfs.get_spot_diameters_statistics();
        assert_eq!(spots.mean, 6.0);
        assert!(wfs.get_xy_scale().is_ok());
    }

    #[test]
    fn wavefront_type_error_comes_from_driver() {
        let (sdk, mut wfs) = configured();
        assert_eq!(wfs.calc_wavefront(Some(3), None), WFS_ERROR_PARAMETER2);
        assert_eq!(sdk.call_names(), vec!["calc_wavefront", "error_message"]);
    }
}
