//! Vendor SDK seam.
//!
//! [`WfsSdk`] mirrors the driver's C entry points one-to-one with safe
//! argument types: outputs become `&mut` references, caller-owned buffers
//! become mutable slices. The driver handle talks only to this trait, so the
//! same code runs against the real library ([`LibrarySdk`]) or the recording
//! test double ([`MockWfsSdk`]).

use std::ffi::CStr;

use serde::Serialize;
use wfs_sys::{
    ViBoolean, ViInt16, ViInt32, ViReal32, ViReal64, ViSession, ViStatus, ViUInt8,
};

pub mod library;
pub mod mock;

pub use library::LibrarySdk;
pub use mock::{MockState, MockWfsSdk};

/// Calibration data of one microlens array.
///
/// `grd_corr_rot` and `grd_corr_pitch` are only filled by `get_mla_data2`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MlaCalibration {
    pub cam_pitch_um: ViReal64,
    pub lenslet_pitch_um: ViReal64,
    pub spot_offset_x: ViReal64,
    pub spot_offset_y: ViReal64,
    pub lenslet_f_um: ViReal64,
    pub grd_corr_0: ViReal64,
    pub grd_corr_45: ViReal64,
    pub grd_corr_rot: ViReal64,
    pub grd_corr_pitch: ViReal64,
}

/// WFS driver entry points.
pub trait WfsSdk: Send + Sync {
    // ---- lifecycle ---------------------------------------------------------

    fn init(
        &self,
        resource_name: &CStr,
        id_query: ViBoolean,
        reset_device: ViBoolean,
        instrument_handle: &mut ViSession,
    ) -> ViStatus;

    fn close(&self, vi: ViSession) -> ViStatus;

    fn self_test(&self, vi: ViSession, result: &mut ViInt16, message: &mut [u8]) -> ViStatus;

    fn reset(&self, vi: ViSession) -> ViStatus;

    fn revision_query(
        &self,
        vi: ViSession,
        driver_revision: &mut [u8],
        firmware_revision: &mut [u8],
    ) -> ViStatus;

    fn error_query(&self, vi: ViSession, error_code: &mut ViInt32, message: &mut [u8])
        -> ViStatus;

    fn error_message(&self, vi: ViSession, error_code: ViStatus, message: &mut [u8]) -> ViStatus;

    fn get_status(&self, vi: ViSession, device_status: &mut ViInt32) -> ViStatus;

    fn get_instrument_info(
        &self,
        vi: ViSession,
        manufacturer_name: &mut [u8],
        instrument_name: &mut [u8],
        serial_number_wfs: &mut [u8],
        serial_number_cam: &mut [u8],
    ) -> ViStatus;

    // ---- discovery ---------------------------------------------------------

    fn get_instrument_list_len(&self, vi: ViSession, instrument_count: &mut ViInt32) -> ViStatus;

    #[allow(clippy::too_many_arguments)]
    fn get_instrument_list_info(
        &self,
        vi: ViSession,
        index: ViInt32,
        device_id: &mut ViInt32,
        in_use: &mut ViInt32,
        instrument_name: &mut [u8],
        serial_number_wfs: &mut [u8],
        resource_name: &mut [u8],
    ) -> ViStatus;

    // ---- configuration -----------------------------------------------------

    fn configure_cam(
        &self,
        vi: ViSession,
        pixel_format: ViInt32,
        cam_resol_index: ViInt32,
        spots_x: &mut ViInt32,
        spots_y: &mut ViInt32,
    ) -> ViStatus;

    fn set_highspeed_mode(
        &self,
        vi: ViSession,
        highspeed_mode: ViInt32,
        adapt_centroids: ViInt32,
        subtract_offset: ViInt32,
        allow_auto_exposure: ViInt32,
    ) -> ViStatus;

    #[allow(clippy::too_many_arguments)]
    fn get_highspeed_windows(
        &self,
        vi: ViSession,
        window_count_x: &mut ViInt32,
        window_count_y: &mut ViInt32,
        window_size_x: &mut ViInt32,
        window_size_y: &mut ViInt32,
        window_start_x: &mut [ViInt32],
        window_start_y: &mut [ViInt32],
    ) -> ViStatus;

    fn check_highspeed_centroids(&self, vi: ViSession) -> ViStatus;

    fn get_exposure_time_range(
        &self,
        vi: ViSession,
        min: &mut ViReal64,
        max: &mut ViReal64,
        increment: &mut ViReal64,
    ) -> ViStatus;

    fn set_exposure_time(&self, vi: ViSession, set: ViReal64, act: &mut ViReal64) -> ViStatus;

    fn get_exposure_time(&self, vi: ViSession, act: &mut ViReal64) -> ViStatus;

    fn get_master_gain_range(&self, vi: ViSession, min: &mut ViReal64, max: &mut ViReal64)
        -> ViStatus;

    fn set_master_gain(&self, vi: ViSession, set: ViReal64, act: &mut ViReal64) -> ViStatus;

    fn get_master_gain(&self, vi: ViSession, act: &mut ViReal64) -> ViStatus;

    fn set_black_level_offset(&self, vi: ViSession, offset: ViInt32) -> ViStatus;

    fn get_black_level_offset(&self, vi: ViSession, offset: &mut ViInt32) -> ViStatus;

    fn set_trigger_mode(&self, vi: ViSession, mode: ViInt32) -> ViStatus;

    fn get_trigger_mode(&self, vi: ViSession, mode: &mut ViInt32) -> ViStatus;

    fn set_trigger_delay(&self, vi: ViSession, set: ViInt32, act: &mut ViInt32) -> ViStatus;

    fn get_trigger_delay_range(
        &self,
        vi: ViSession,
        min: &mut ViInt32,
        max: &mut ViInt32,
        increment: &mut ViInt32,
    ) -> ViStatus;

    fn get_mla_count(&self, vi: ViSession, count: &mut ViInt32) -> ViStatus;

    fn get_mla_data(
        &self,
        vi: ViSession,
        index: ViInt32,
        name: &mut [u8],
        data: &mut MlaCalibration,
    ) -> ViStatus;

    fn get_mla_data2(
        &self,
        vi: ViSession,
        index: ViInt32,
        name: &mut [u8],
        data: &mut MlaCalibration,
    ) -> ViStatus;

    fn select_mla(&self, vi: ViSession, index: ViInt32) -> ViStatus;

    fn set_aoi(
        &self,
        vi: ViSession,
        center_x_mm: ViReal64,
        center_y_mm: ViReal64,
        size_x_mm: ViReal64,
        size_y_mm: ViReal64,
    ) -> ViStatus;

    fn get_aoi(
        &self,
        vi: ViSession,
        center_x_mm: &mut ViReal64,
        center_y_mm: &mut ViReal64,
        size_x_mm: &mut ViReal64,
        size_y_mm: &mut ViReal64,
    ) -> ViStatus;

    fn set_pupil(
        &self,
        vi: ViSession,
        center_x_mm: ViReal64,
        center_y_mm: ViReal64,
        diameter_x_mm: ViReal64,
        diameter_y_mm: ViReal64,
    ) -> ViStatus;

    fn get_pupil(
        &self,
        vi: ViSession,
        center_x_mm: &mut ViReal64,
        center_y_mm: &mut ViReal64,
        diameter_x_mm: &mut ViReal64,
        diameter_y_mm: &mut ViReal64,
    ) -> ViStatus;

    fn set_reference_plane(&self, vi: ViSession, reference: ViInt32) -> ViStatus;

    fn get_reference_plane(&self, vi: ViSession, reference: &mut ViInt32) -> ViStatus;

    // ---- acquisition -------------------------------------------------------

    fn take_spotfield_image(&self, vi: ViSession) -> ViStatus;

    fn take_spotfield_image_auto_exposure(
        &self,
        vi: ViSession,
        exposure_time_act: &mut ViReal64,
        master_gain_act: &mut ViReal64,
    ) -> ViStatus;

    /// Copies the driver-owned image into `image`; `address` receives the
    /// driver's buffer address.
    fn get_spotfield_image(
        &self,
        vi: ViSession,
        image: &mut [ViUInt8],
        address: &mut usize,
        rows: &mut ViInt32,
        columns: &mut ViInt32,
    ) -> ViStatus;

    fn get_spotfield_image_copy(
        &self,
        vi: ViSession,
        image: &mut [ViUInt8],
        rows: &mut ViInt32,
        columns: &mut ViInt32,
    ) -> ViStatus;

    fn average_image(&self, vi: ViSession, count: ViInt32, data_ready: &mut ViInt32) -> ViStatus;

    fn average_image_rolling(&self, vi: ViSession, count: ViInt32, reset: ViInt32) -> ViStatus;

    fn cut_image_noise_floor(&self, vi: ViSession, limit: ViInt32) -> ViStatus;

    fn calc_image_min_max(
        &self,
        vi: ViSession,
        min: &mut ViInt32,
        max: &mut ViInt32,
        saturated_pixels_percent: &mut ViReal64,
    ) -> ViStatus;

    fn calc_mean_rms_noise(&self, vi: ViSession, mean: &mut ViReal64, rms: &mut ViReal64)
        -> ViStatus;

    fn get_line(&self, vi: ViSession, line: ViInt32, line_selected: &mut [ViReal32]) -> ViStatus;

    fn get_line_view(
        &self,
        vi: ViSession,
        line_min: &mut [ViReal32],
        line_max: &mut [ViReal32],
    ) -> ViStatus;

    // ---- analysis ----------------------------------------------------------

    fn calc_beam_centroid_diameter(
        &self,
        vi: ViSession,
        centroid_x_mm: &mut ViReal64,
        centroid_y_mm: &mut ViReal64,
        diameter_x_mm: &mut ViReal64,
        diameter_y_mm: &mut ViReal64,
    ) -> ViStatus;

    fn calc_spots_centroid_diameter_intensity(
        &self,
        vi: ViSession,
        dynamic_noise_cut: ViInt32,
        calculate_diameters: ViInt32,
    ) -> ViStatus;

    fn get_spot_centroids(&self, vi: ViSession, x: &mut [ViReal32], y: &mut [ViReal32])
        -> ViStatus;

    fn get_spot_diameters(&self, vi: ViSession, x: &mut [ViReal32], y: &mut [ViReal32])
        -> ViStatus;

    fn get_spot_diameters_statistics(
        &self,
        vi: ViSession,
        min: &mut ViReal64,
        max: &mut ViReal64,
        mean: &mut ViReal64,
    ) -> ViStatus;

    fn get_spot_intensities(&self, vi: ViSession, intensities: &mut [ViReal32]) -> ViStatus;

    fn calc_spot_to_reference_deviations(&self, vi: ViSession, cancel_tilt: ViInt32) -> ViStatus;

    fn get_spot_reference_positions(
        &self,
        vi: ViSession,
        x: &mut [ViReal32],
        y: &mut [ViReal32],
    ) -> ViStatus;

    fn get_spot_deviations(&self, vi: ViSession, x: &mut [ViReal32], y: &mut [ViReal32])
        -> ViStatus;

    fn zernike_lsf(
        &self,
        vi: ViSession,
        zernike_orders: &mut ViInt32,
        zernike_um: &mut [ViReal32],
        zernike_orders_rms_um: &mut [ViReal32],
        roc_mm: &mut ViReal64,
    ) -> ViStatus;

    #[allow(clippy::too_many_arguments)]
    fn calc_fourier_optometric(
        &self,
        vi: ViSession,
        zernike_orders: ViInt32,
        fourier_order: ViInt32,
        fourier_m: &mut ViReal64,
        fourier_j0: &mut ViReal64,
        fourier_j45: &mut ViReal64,
        opto_sphere: &mut ViReal64,
        opto_cylinder: &mut ViReal64,
        opto_axis_deg: &mut ViReal64,
    ) -> ViStatus;

    fn calc_reconstructed_deviations(
        &self,
        vi: ViSession,
        zernike_orders: ViInt32,
        reconstruct: &mut [ViUInt8],
        do_spherical_reference: ViInt32,
        fit_error_mean: &mut ViReal64,
        fit_error_stdev: &mut ViReal64,
    ) -> ViStatus;

    fn calc_wavefront(
        &self,
        vi: ViSession,
        wavefront_type: ViInt32,
        limit_to_pupil: ViInt32,
        wavefront: &mut [ViReal32],
    ) -> ViStatus;

    #[allow(clippy::too_many_arguments)]
    fn calc_wavefront_statistics(
        &self,
        vi: ViSession,
        min: &mut ViReal64,
        max: &mut ViReal64,
        diff: &mut ViReal64,
        mean: &mut ViReal64,
        rms: &mut ViReal64,
        weighted_rms: &mut ViReal64,
    ) -> ViStatus;

    fn get_xy_scale(&self, vi: ViSession, scale_x: &mut [ViReal32], scale_y: &mut [ViReal32])
        -> ViStatus;

    fn convert_wavefront_waves(
        &self,
        vi: ViSession,
        wavelength_nm: ViReal64,
        wavefront_in: &mut [ViReal32],
        wavefront_out: &mut [ViReal32],
    ) -> ViStatus;

    fn flip_2d_array(
        &self,
        vi: ViSession,
        array_in: &mut [ViReal32],
        array_out: &mut [ViReal32],
    ) -> ViStatus;

    // ---- user reference ----------------------------------------------------

    fn set_spots_to_user_reference(&self, vi: ViSession) -> ViStatus;

    fn set_calc_spots_to_user_reference(
        &self,
        vi: ViSession,
        spot_ref_type: ViInt32,
        reference_x: &mut [ViReal32],
        reference_y: &mut [ViReal32],
    ) -> ViStatus;

    fn create_default_user_reference(&self, vi: ViSession) -> ViStatus;

    fn save_user_reference_file(&self, vi: ViSession) -> ViStatus;

    fn load_user_reference_file(&self, vi: ViSession) -> ViStatus;

    fn do_spherical_reference(&self, vi: ViSession) -> ViStatus;
}
