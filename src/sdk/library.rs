//! [`WfsSdk`] over the vendor library.
#![allow(unsafe_code)]

use std::ffi::CStr;
use std::path::Path;

use tracing::info;
use wfs_sys::{
    ViBoolean, ViChar, ViInt16, ViInt32, ViReal32, ViReal64, ViSession, ViStatus, ViUInt8, WfsApi,
    VI_SUCCESS,
};

use super::{MlaCalibration, WfsSdk};
use crate::constants::{
    parameter_error, CAM_MAX_PIX_X, CAM_MAX_PIX_Y, MAX_SPOTS_X, MAX_SPOTS_Y, MAX_ZERNIKE_MODES,
    MAX_ZERNIKE_ORDERS, WFS_BUFFER_SIZE, WFS_ERR_DESCR_BUFFER_SIZE,
};
use crate::error::WfsResult;

const TEXT: usize = WFS_BUFFER_SIZE;
const DESCRIPTION: usize = WFS_ERR_DESCR_BUFFER_SIZE;
const GRID: usize = MAX_SPOTS_X * MAX_SPOTS_Y;
const IMAGE: usize = CAM_MAX_PIX_X * CAM_MAX_PIX_Y;
const LINE: usize = CAM_MAX_PIX_X;
const MODES: usize = MAX_ZERNIKE_MODES + 1;
const ORDERS: usize = MAX_ZERNIKE_ORDERS + 1;

/// Calls straight into the loaded driver.
///
/// The driver writes up to its documented maximum into every array and
/// string argument. A slice shorter than that is refused with
/// `WFS_ERROR_PARAMETER{n}` for its position, and the driver is not called.
#[derive(Debug)]
pub struct LibrarySdk {
    api: WfsApi,
}

impl LibrarySdk {
    /// Opens the driver, trying `path` before the default locations.
    pub fn load(path: Option<&Path>) -> WfsResult<Self> {
        let api = wfs_sys::load(path)?;
        info!(target: "WFS", library = %wfs_sys::library_file_name().to_string_lossy(), "WFS library loaded");
        Ok(Self { api })
    }

    pub fn api(&self) -> &WfsApi {
        &self.api
    }
}

fn chars(buf: &mut [u8]) -> *mut ViChar {
    buf.as_mut_ptr().cast()
}

/// Runs `call` only when every `(position, len, capacity)` slice is long
/// enough; otherwise returns the parameter error of the first short one.
/// Positions count the session handle as 1.
fn guarded(slices: &[(u8, usize, usize)], call: impl FnOnce() -> ViStatus) -> ViStatus {
    match slices.iter().find(|(_, len, capacity)| len < capacity) {
        Some(&(position, ..)) => parameter_error(position),
        None => call(),
    }
}

/// Bytes to copy out of a `rows x columns` driver image into `capacity`.
/// Negative extents count as 0.
fn image_len(rows: ViInt32, columns: ViInt32, capacity: usize) -> usize {
    usize::try_from(rows)
        .unwrap_or(0)
        .saturating_mul(usize::try_from(columns).unwrap_or(0))
        .min(capacity)
}

// SAFETY (whole impl): every pointer handed to the driver comes from a live
// `&mut` borrow, the driver only writes through it for the duration of the
// call, and `guarded` has checked each slice against the driver's maximum.
impl WfsSdk for LibrarySdk {
    fn init(
        &self,
        resource_name: &CStr,
        id_query: ViBoolean,
        reset_device: ViBoolean,
        instrument_handle: &mut ViSession,
    ) -> ViStatus {
        unsafe { (self.api.init)(resource_name.as_ptr(), id_query, reset_device, instrument_handle) }
    }

    fn close(&self, vi: ViSession) -> ViStatus {
        unsafe { (self.api.close)(vi) }
    }

    fn self_test(&self, vi: ViSession, result: &mut ViInt16, message: &mut [u8]) -> ViStatus {
        guarded(&[(3, message.len(), TEXT)], || {
            unsafe { (self.api.self_test)(vi, result, chars(message)) }
        })
    }

    fn reset(&self, vi: ViSession) -> ViStatus {
        unsafe { (self.api.reset)(vi) }
    }

    fn revision_query(
        &self,
        vi: ViSession,
        driver_revision: &mut [u8],
        firmware_revision: &mut [u8],
    ) -> ViStatus {
        guarded(&[(2, driver_revision.len(), TEXT), (3, firmware_revision.len(), TEXT)], || {
            unsafe { (self.api.revision_query)(vi, chars(driver_revision), chars(firmware_revision)) }
        })
    }

    fn error_query(
        &self,
        vi: ViSession,
        error_code: &mut ViInt32,
        message: &mut [u8],
    ) -> ViStatus {
        guarded(&[(3, message.len(), DESCRIPTION)], || {
            unsafe { (self.api.error_query)(vi, error_code, chars(message)) }
        })
    }

    fn error_message(&self, vi: ViSession, error_code: ViStatus, message: &mut [u8]) -> ViStatus {
        guarded(&[(3, message.len(), DESCRIPTION)], || {
            unsafe { (self.api.error_message)(vi, error_code, chars(message)) }
        })
    }

    fn get_status(&self, vi: ViSession, device_status: &mut ViInt32) -> ViStatus {
        unsafe { (self.api.get_status)(vi, device_status) }
    }

    fn get_instrument_info(
        &self,
        vi: ViSession,
        manufacturer_name: &mut [u8],
        instrument_name: &mut [u8],
        serial_number_wfs: &mut [u8],
        serial_number_cam: &mut [u8],
    ) -> ViStatus {
        guarded(
            &[
                (2, manufacturer_name.len(), TEXT),
                (3, instrument_name.len(), TEXT),
                (4, serial_number_wfs.len(), TEXT),
                (5, serial_number_cam.len(), TEXT),
            ],
            || {
                unsafe {
                    (self.api.get_instrument_info)(
                        vi,
                        chars(manufacturer_name),
                        chars(instrument_name),
                        chars(serial_number_wfs),
                        chars(serial_number_cam),
                    )
                }
            },
        )
    }

    fn get_instrument_list_len(&self, vi: ViSession, instrument_count: &mut ViInt32) -> ViStatus {
        unsafe { (self.api.get_instrument_list_len)(vi, instrument_count) }
    }

    fn get_instrument_list_info(
        &self,
        vi: ViSession,
        index: ViInt32,
        device_id: &mut ViInt32,
        in_use: &mut ViInt32,
        instrument_name: &mut [u8],
        serial_number_wfs: &mut [u8],
        resource_name: &mut [u8],
    ) -> ViStatus {
        guarded(
            &[
                (5, instrument_name.len(), TEXT),
                (6, serial_number_wfs.len(), TEXT),
                (7, resource_name.len(), TEXT),
            ],
            || {
                unsafe {
                    (self.api.get_instrument_list_info)(
                        vi,
                        index,
                        device_id,
                        in_use,
                        chars(instrument_name),
                        chars(serial_number_wfs),
                        chars(resource_name),
                    )
                }
            },
        )
    }

    fn configure_cam(
        &self,
        vi: ViSession,
        pixel_format: ViInt32,
        cam_resol_index: ViInt32,
        spots_x: &mut ViInt32,
        spots_y: &mut ViInt32,
    ) -> ViStatus {
        unsafe { (self.api.configure_cam)(vi, pixel_format, cam_resol_index, spots_x, spots_y) }
    }

    fn set_highspeed_mode(
        &self,
        vi: ViSession,
        highspeed_mode: ViInt32,
        adapt_centroids: ViInt32,
        subtract_offset: ViInt32,
        allow_auto_exposure: ViInt32,
    ) -> ViStatus {
        unsafe {
            (self.api.set_highspeed_mode)(
                vi,
                highspeed_mode,
                adapt_centroids,
                subtract_offset,
                allow_auto_exposure,
            )
        }
    }

    fn get_highspeed_windows(
        &self,
        vi: ViSession,
        window_count_x: &mut ViInt32,
        window_count_y: &mut ViInt32,
        window_size_x: &mut ViInt32,
        window_size_y: &mut ViInt32,
        window_start_x: &mut [ViInt32],
        window_start_y: &mut [ViInt32],
    ) -> ViStatus {
        guarded(&[(6, window_start_x.len(), MAX_SPOTS_X), (7, window_start_y.len(), MAX_SPOTS_Y)], || {
            unsafe {
                (self.api.get_highspeed_windows)(
                    vi,
                    window_count_x,
                    window_count_y,
                    window_size_x,
                    window_size_y,
                    window_start_x.as_mut_ptr(),
                    window_start_y.as_mut_ptr(),
                )
            }
        })
    }

    fn check_highspeed_centroids(&self, vi: ViSession) -> ViStatus {
        unsafe { (self.api.check_highspeed_centroids)(vi) }
    }

    fn get_exposure_time_range(
        &self,
        vi: ViSession,
        min: &mut ViReal64,
        max: &mut ViReal64,
        increment: &mut ViReal64,
    ) -> ViStatus {
        unsafe { (self.api.get_exposure_time_range)(vi, min, max, increment) }
    }

    fn set_exposure_time(&self, vi: ViSession, set: ViReal64, act: &mut ViReal64) -> ViStatus {
        unsafe { (self.api.set_exposure_time)(vi, set, act) }
    }

    fn get_exposure_time(&self, vi: ViSession, act: &mut ViReal64) -> ViStatus {
        unsafe { (self.api.get_exposure_time)(vi, act) }
    }

    fn get_master_gain_range(
        &self,
        vi: ViSession,
        min: &mut ViReal64,
        max: &mut ViReal64,
    ) -> ViStatus {
        unsafe { (self.api.get_master_gain_range)(vi, min, max) }
    }

    fn set_master_gain(&self, vi: ViSession, set: ViReal64, act: &mut ViReal64) -> ViStatus {
        unsafe { (self.api.set_master_gain)(vi, set, act) }
    }

    fn get_master_gain(&self, vi: ViSession, act: &mut ViReal64) -> ViStatus {
        unsafe { (self.api.get_master_gain)(vi, act) }
    }

    fn set_black_level_offset(&self, vi: ViSession, offset: ViInt32) -> ViStatus {
        unsafe { (self.api.set_black_level_offset)(vi, offset) }
    }

    fn get_black_level_offset(&self, vi: ViSession, offset: &mut ViInt32) -> ViStatus {
        unsafe { (self.api.get_black_level_offset)(vi, offset) }
    }

    fn set_trigger_mode(&self, vi: ViSession, mode: ViInt32) -> ViStatus {
        unsafe { (self.api.set_trigger_mode)(vi, mode) }
    }

    fn get_trigger_mode(&self, vi: ViSession, mode: &mut ViInt32) -> ViStatus {
        unsafe { (self.api.get_trigger_mode)(vi, mode) }
    }

    fn set_trigger_delay(&self, vi: ViSession, set: ViInt32, act: &mut ViInt32) -> ViStatus {
        unsafe { (self.api.set_trigger_delay)(vi, set, act) }
    }

    fn get_trigger_delay_range(
        &self,
        vi: ViSession,
        min: &mut ViInt32,
        max: &mut ViInt32,
        increment: &mut ViInt32,
    ) -> ViStatus {
        unsafe { (self.api.get_trigger_delay_range)(vi, min, max, increment) }
    }

    fn get_mla_count(&self, vi: ViSession, count: &mut ViInt32) -> ViStatus {
        unsafe { (self.api.get_mla_count)(vi, count) }
    }

    fn get_mla_data(
        &self,
        vi: ViSession,
        index: ViInt32,
        name: &mut [u8],
        data: &mut MlaCalibration,
    ) -> ViStatus {
        guarded(&[(3, name.len(), TEXT)], || {
            unsafe {
                (self.api.get_mla_data)(
                    vi,
                    index,
                    chars(name),
                    &mut data.cam_pitch_um,
                    &mut data.lenslet_pitch_um,
                    &mut data.spot_offset_x,
                    &mut data.spot_offset_y,
                    &mut data.lenslet_f_um,
                    &mut data.grd_corr_0,
                    &mut data.grd_corr_45,
                )
            }
        })
    }

    fn get_mla_data2(
        &self,
        vi: ViSession,
        index: ViInt32,
        name: &mut [u8],
        data: &mut MlaCalibration,
    ) -> ViStatus {
        guarded(&[(3, name.len(), TEXT)], || {
            unsafe {
                (self.api.get_mla_data2)(
                    vi,
                    index,
                    chars(name),
                    &mut data.cam_pitch_um,
                    &mut data.lenslet_pitch_um,
                    &mut data.spot_offset_x,
                    &mut data.spot_offset_y,
                    &mut data.lenslet_f_um,
                    &mut data.grd_corr_0,
                    &mut data.grd_corr_45,
                    &mut data.grd_corr_rot,
                    &mut data.grd_corr_pitch,
                )
            }
        })
    }

    fn select_mla(&self, vi: ViSession, index: ViInt32) -> ViStatus {
        unsafe { (self.api.select_mla)(vi, index) }
    }

    fn set_aoi(
        &self,
        vi: ViSession,
        center_x_mm: ViReal64,
        center_y_mm: ViReal64,
        size_x_mm: ViReal64,
        size_y_mm: ViReal64,
    ) -> ViStatus {
        unsafe { (self.api.set_aoi)(vi, center_x_mm, center_y_mm, size_x_mm, size_y_mm) }
    }

    fn get_aoi(
        &self,
        vi: ViSession,
        center_x_mm: &mut ViReal64,
        center_y_mm: &mut ViReal64,
        size_x_mm: &mut ViReal64,
        size_y_mm: &mut ViReal64,
    ) -> ViStatus {
        unsafe { (self.api.get_aoi)(vi, center_x_mm, center_y_mm, size_x_mm, size_y_mm) }
    }

    fn set_pupil(
        &self,
        vi: ViSession,
        center_x_mm: ViReal64,
        center_y_mm: ViReal64,
        diameter_x_mm: ViReal64,
        diameter_y_mm: ViReal64,
    ) -> ViStatus {
        unsafe { (self.api.set_pupil)(vi, center_x_mm, center_y_mm, diameter_x_mm, diameter_y_mm) }
    }

    fn get_pupil(
        &self,
        vi: ViSession,
        center_x_mm: &mut ViReal64,
        center_y_mm: &mut ViReal64,
        diameter_x_mm: &mut ViReal64,
        diameter_y_mm: &mut ViReal64,
    ) -> ViStatus {
        unsafe { (self.api.get_pupil)(vi, center_x_mm, center_y_mm, diameter_x_mm, diameter_y_mm) }
    }

    fn set_reference_plane(&self, vi: ViSession, reference: ViInt32) -> ViStatus {
        unsafe { (self.api.set_reference_plane)(vi, reference) }
    }

    fn get_reference_plane(&self, vi: ViSession, reference: &mut ViInt32) -> ViStatus {
        unsafe { (self.api.get_reference_plane)(vi, reference) }
    }

    fn take_spotfield_image(&self, vi: ViSession) -> ViStatus {
        unsafe { (self.api.take_spotfield_image)(vi) }
    }

    fn take_spotfield_image_auto_exposure(
        &self,
        vi: ViSession,
        exposure_time_act: &mut ViReal64,
        master_gain_act: &mut ViReal64,
    ) -> ViStatus {
        unsafe { (self.api.take_spotfield_image_auto_expos)(vi, exposure_time_act, master_gain_act) }
    }

    fn get_spotfield_image(
        &self,
        vi: ViSession,
        image: &mut [ViUInt8],
        address: &mut usize,
        rows: &mut ViInt32,
        columns: &mut ViInt32,
    ) -> ViStatus {
        let mut buffer: *mut ViUInt8 = std::ptr::null_mut();
        let status = unsafe { (self.api.get_spotfield_image)(vi, &mut buffer, rows, columns) };
        *address = buffer as usize;
        if status >= VI_SUCCESS && !buffer.is_null() {
            let len = image_len(*rows, *columns, image.len());
            // SAFETY: the driver's image buffer holds rows x columns bytes and
            // stays valid until the next acquisition on this session.
            let source = unsafe { std::slice::from_raw_parts(buffer, len) };
            image[..len].copy_from_slice(source);
        }
        status
    }

    fn get_spotfield_image_copy(
        &self,
        vi: ViSession,
        image: &mut [ViUInt8],
        rows: &mut ViInt32,
        columns: &mut ViInt32,
    ) -> ViStatus {
        guarded(&[(2, image.len(), IMAGE)], || {
            unsafe { (self.api.get_spotfield_image_copy)(vi, image.as_mut_ptr(), rows, columns) }
        })
    }

    fn average_image(&self, vi: ViSession, count: ViInt32, data_ready: &mut ViInt32) -> ViStatus {
        unsafe { (self.api.average_image)(vi, count, data_ready) }
    }

    fn average_image_rolling(&self, vi: ViSession, count: ViInt32, reset: ViInt32) -> ViStatus {
        unsafe { (self.api.average_image_rolling)(vi, count, reset) }
    }

    fn cut_image_noise_floor(&self, vi: ViSession, limit: ViInt32) -> ViStatus {
        unsafe { (self.api.cut_image_noise_floor)(vi, limit) }
    }

    fn calc_image_min_max(
        &self,
        vi: ViSession,
        min: &mut ViInt32,
        max: &mut ViInt32,
        saturated_pixels_percent: &mut ViReal64,
    ) -> ViStatus {
        unsafe { (self.api.calc_image_min_max)(vi, min, max, saturated_pixels_percent) }
    }

    fn calc_mean_rms_noise(
        &self,
        vi: ViSession,
        mean: &mut ViReal64,
        rms: &mut ViReal64,
    ) -> ViStatus {
        unsafe { (self.api.calc_mean_rms_noise)(vi, mean, rms) }
    }

    fn get_line(&self, vi: ViSession, line: ViInt32, line_selected: &mut [ViReal32]) -> ViStatus {
        guarded(&[(3, line_selected.len(), LINE)], || {
            unsafe { (self.api.get_line)(vi, line, line_selected.as_mut_ptr()) }
        })
    }

    fn get_line_view(
        &self,
        vi: ViSession,
        line_min: &mut [ViReal32],
        line_max: &mut [ViReal32],
    ) -> ViStatus {
        guarded(&[(2, line_min.len(), LINE), (3, line_max.len(), LINE)], || {
            unsafe { (self.api.get_line_view)(vi, line_min.as_mut_ptr(), line_max.as_mut_ptr()) }
        })
    }

    fn calc_beam_centroid_diameter(
        &self,
        vi: ViSession,
        centroid_x_mm: &mut ViReal64,
        centroid_y_mm: &mut ViReal64,
        diameter_x_mm: &mut ViReal64,
        diameter_y_mm: &mut ViReal64,
    ) -> ViStatus {
        unsafe {
            (self.api.calc_beam_centroid_dia)(
                vi,
                centroid_x_mm,
                centroid_y_mm,
                diameter_x_mm,
                diameter_y_mm,
            )
        }
    }

    fn calc_spots_centroid_diameter_intensity(
        &self,
        vi: ViSession,
        dynamic_noise_cut: ViInt32,
        calculate_diameters: ViInt32,
    ) -> ViStatus {
        unsafe { (self.api.calc_spots_centr_dia_intens)(vi, dynamic_noise_cut, calculate_diameters) }
    }

    fn get_spot_centroids(
        &self,
        vi: ViSession,
        x: &mut [ViReal32],
        y: &mut [ViReal32],
    ) -> ViStatus {
        guarded(&[(2, x.len(), GRID), (3, y.len(), GRID)], || {
            unsafe { (self.api.get_spot_centroids)(vi, x.as_mut_ptr(), y.as_mut_ptr()) }
        })
    }

    fn get_spot_diameters(
        &self,
        vi: ViSession,
        x: &mut [ViReal32],
        y: &mut [ViReal32],
    ) -> ViStatus {
        guarded(&[(2, x.len(), GRID), (3, y.len(), GRID)], || {
            unsafe { (self.api.get_spot_diameters)(vi, x.as_mut_ptr(), y.as_mut_ptr()) }
        })
    }

    fn get_spot_diameters_statistics(
        &self,
        vi: ViSession,
        min: &mut ViReal64,
        max: &mut ViReal64,
        mean: &mut ViReal64,
    ) -> ViStatus {
        unsafe { (self.api.get_spot_dia_statistics)(vi, min, max, mean) }
    }

    fn get_spot_intensities(&self, vi: ViSession, intensities: &mut [ViReal32]) -> ViStatus {
        guarded(&[(2, intensities.len(), GRID)], || {
            unsafe { (self.api.get_spot_intensities)(vi, intensities.as_mut_ptr()) }
        })
    }

    fn calc_spot_to_reference_deviations(&self, vi: ViSession, cancel_tilt: ViInt32) -> ViStatus {
        unsafe { (self.api.calc_spot_to_reference_deviations)(vi, cancel_tilt) }
    }

    fn get_spot_reference_positions(
        &self,
        vi: ViSession,
        x: &mut [ViReal32],
        y: &mut [ViReal32],
    ) -> ViStatus {
        guarded(&[(2, x.len(), GRID), (3, y.len(), GRID)], || {
            unsafe { (self.api.get_spot_reference_positions)(vi, x.as_mut_ptr(), y.as_mut_ptr()) }
        })
    }

    fn get_spot_deviations(
        &self,
        vi: ViSession,
        x: &mut [ViReal32],
        y: &mut [ViReal32],
    ) -> ViStatus {
        guarded(&[(2, x.len(), GRID), (3, y.len(), GRID)], || {
            unsafe { (self.api.get_spot_deviations)(vi, x.as_mut_ptr(), y.as_mut_ptr()) }
        })
    }

    fn zernike_lsf(
        &self,
        vi: ViSession,
        zernike_orders: &mut ViInt32,
        zernike_um: &mut [ViReal32],
        zernike_orders_rms_um: &mut [ViReal32],
        roc_mm: &mut ViReal64,
    ) -> ViStatus {
        guarded(&[(3, zernike_um.len(), MODES), (4, zernike_orders_rms_um.len(), ORDERS)], || {
            unsafe {
                (self.api.zernike_lsf)(
                    vi,
                    zernike_orders,
                    zernike_um.as_mut_ptr(),
                    zernike_orders_rms_um.as_mut_ptr(),
                    roc_mm,
                )
            }
        })
    }

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
    ) -> ViStatus {
        unsafe {
            (self.api.calc_fourier_optometric)(
                vi,
                zernike_orders,
                fourier_order,
                fourier_m,
                fourier_j0,
                fourier_j45,
                opto_sphere,
                opto_cylinder,
                opto_axis_deg,
            )
        }
    }

    fn calc_reconstructed_deviations(
        &self,
        vi: ViSession,
        zernike_orders: ViInt32,
        reconstruct: &mut [ViUInt8],
        do_spherical_reference: ViInt32,
        fit_error_mean: &mut ViReal64,
        fit_error_stdev: &mut ViReal64,
    ) -> ViStatus {
        guarded(&[(3, reconstruct.len(), MODES)], || {
            unsafe {
                (self.api.calc_reconstr_deviations)(
                    vi,
                    zernike_orders,
                    reconstruct.as_mut_ptr(),
                    do_spherical_reference,
                    fit_error_mean,
                    fit_error_stdev,
                )
            }
        })
    }

    fn calc_wavefront(
        &self,
        vi: ViSession,
        wavefront_type: ViInt32,
        limit_to_pupil: ViInt32,
        wavefront: &mut [ViReal32],
    ) -> ViStatus {
        guarded(&[(4, wavefront.len(), GRID)], || {
            unsafe {
                (self.api.calc_wavefront)(vi, wavefront_type, limit_to_pupil, wavefront.as_mut_ptr())
            }
        })
    }

    fn calc_wavefront_statistics(
        &self,
        vi: ViSession,
        min: &mut ViReal64,
        max: &mut ViReal64,
        diff: &mut ViReal64,
        mean: &mut ViReal64,
        rms: &mut ViReal64,
        weighted_rms: &mut ViReal64,
    ) -> ViStatus {
        unsafe { (self.api.calc_wavefront_statistics)(vi, min, max, diff, mean, rms, weighted_rms) }
    }

    fn get_xy_scale(
        &self,
        vi: ViSession,
        scale_x: &mut [ViReal32],
        scale_y: &mut [ViReal32],
    ) -> ViStatus {
        guarded(&[(2, scale_x.len(), MAX_SPOTS_X), (3, scale_y.len(), MAX_SPOTS_Y)], || {
            unsafe { (self.api.get_xy_scale)(vi, scale_x.as_mut_ptr(), scale_y.as_mut_ptr()) }
        })
    }

    fn convert_wavefront_waves(
        &self,
        vi: ViSession,
        wavelength_nm: ViReal64,
        wavefront_in: &mut [ViReal32],
        wavefront_out: &mut [ViReal32],
    ) -> ViStatus {
        guarded(&[(3, wavefront_in.len(), GRID), (4, wavefront_out.len(), GRID)], || {
            unsafe {
                (self.api.convert_wavefront_waves)(
                    vi,
                    wavelength_nm,
                    wavefront_in.as_mut_ptr(),
                    wavefront_out.as_mut_ptr(),
                )
            }
        })
    }

    fn flip_2d_array(
        &self,
        vi: ViSession,
        array_in: &mut [ViReal32],
        array_out: &mut [ViReal32],
    ) -> ViStatus {
        guarded(&[(2, array_in.len(), GRID), (3, array_out.len(), GRID)], || {
            unsafe { (self.api.flip_2d_array)(vi, array_in.as_mut_ptr(), array_out.as_mut_ptr()) }
        })
    }

    fn set_spots_to_user_reference(&self, vi: ViSession) -> ViStatus {
        unsafe { (self.api.set_spots_to_user_reference)(vi) }
    }

    fn set_calc_spots_to_user_reference(
        &self,
        vi: ViSession,
        spot_ref_type: ViInt32,
        reference_x: &mut [ViReal32],
        reference_y: &mut [ViReal32],
    ) -> ViStatus {
        guarded(&[(3, reference_x.len(), GRID), (4, reference_y.len(), GRID)], || {
            unsafe {
                (self.api.set_calc_spots_to_user_reference)(
                    vi,
                    spot_ref_type,
                    reference_x.as_mut_ptr(),
                    reference_y.as_mut_ptr(),
                )
            }
        })
    }

    fn create_default_user_reference(&self, vi: ViSession) -> ViStatus {
        unsafe { (self.api.create_default_user_reference)(vi) }
    }

    fn save_user_reference_file(&self, vi: ViSession) -> ViStatus {
        unsafe { (self.api.save_user_ref_file)(vi) }
    }

    fn load_user_reference_file(&self, vi: ViSession) -> ViStatus {
        unsafe { (self.api.load_user_ref_file)(vi) }
    }

    fn do_spherical_reference(&self, vi: ViSession) -> ViStatus {
        unsafe { (self.api.do_spherical_ref)(vi) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{WFS_ERROR_PARAMETER2, WFS_ERROR_PARAMETER3};

    #[test]
    fn short_message_buffer_never_reaches_driver() {
        let mut called = false;
        let message = [0u8; 4];
        let status = guarded(&[(3, message.len(), DESCRIPTION)], || {
            called = true;
            VI_SUCCESS
        });
        assert_eq!(status, WFS_ERROR_PARAMETER3);
        assert!(!called);
    }

    #[test]
    fn first_short_slice_names_the_parameter() {
        let x = vec![0f32; GRID - 1];
        let y = vec![0f32; 1];
        let status = guarded(&[(2, x.len(), GRID), (3, y.len(), GRID)], || VI_SUCCESS);
        assert_eq!(status, WFS_ERROR_PARAMETER2);
    }

    #[test]
    fn image_copy_is_bounded_by_the_buffer() {
        assert_eq!(image_len(1024, 1280, IMAGE), 1024 * 1280);
        assert_eq!(image_len(i32::MAX, i32::MAX, IMAGE), IMAGE);
        assert_eq!(image_len(-1, 1280, IMAGE), 0);
        assert_eq!(image_len(2048, 2048, 16), 16);
    }

    #[test]
    fn full_size_buffers_are_forwarded() {
        let name = vec![0u8; TEXT];
        let zernike = vec![0f32; MODES + 3];
        let status = guarded(&[(3, name.len(), TEXT), (4, zernike.len(), MODES)], || 7);
        assert_eq!(status, 7);
    }
}
