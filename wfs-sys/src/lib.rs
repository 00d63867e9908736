//! Raw ABI of the Thorlabs WFS instrument driver.
//!
//! The driver ships as a prebuilt VXIplug&play library (`WFS_32` on 32-bit
//! hosts, `WFS_64` on 64-bit hosts). Nothing is linked at build time: the
//! library is opened with [`libloading`] and every entry point is resolved by
//! its exported name into a [`WfsApi`] table of function pointers.
//!
//! All entry points use the platform system calling convention
//! (`__stdcall` on 32-bit Windows) and return a [`ViStatus`].

use std::ffi::OsString;
use std::fmt;
use std::os::raw::c_char;
use std::path::{Path, PathBuf};

use libloading::Library;
use thiserror::Error;

// =============================================================================
// VISA type aliases
// =============================================================================

pub type ViStatus = i32;
pub type ViSession = u32;
pub type ViObject = u32;
pub type ViBoolean = u16;
pub type ViUInt8 = u8;
pub type ViInt16 = i16;
pub type ViUInt16 = u16;
pub type ViInt32 = i32;
pub type ViUInt32 = u32;
pub type ViReal32 = f32;
pub type ViReal64 = f64;
pub type ViChar = c_char;
pub type ViRsrc = *const ViChar;

pub const VI_TRUE: ViBoolean = 1;
pub const VI_FALSE: ViBoolean = 0;
pub const VI_NULL: ViSession = 0;
pub const VI_SUCCESS: ViStatus = 0;

/// Base name of the vendor library for this host's pointer width.
#[cfg(target_pointer_width = "64")]
pub const LIBRARY_NAME: &str = "WFS_64";
/// Base name of the vendor library for this host's pointer width.
#[cfg(not(target_pointer_width = "64"))]
pub const LIBRARY_NAME: &str = "WFS_32";

/// Errors raised while opening the vendor library.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{name} not found (tried {tried:?}): {source}")]
    LibraryNotFound {
        name: String,
        tried: Vec<PathBuf>,
        #[source]
        source: libloading::Error,
    },

    #[error("{symbol} missing from the WFS library: {source}")]
    MissingSymbol {
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },
}

// =============================================================================
// Entry point table
// =============================================================================

macro_rules! wfs_api {
    ($( $field:ident => $symbol:literal ( $($arg:ident : $ty:ty),* $(,)? ); )*) => {
        /// Function pointers for every exported driver entry point.
        ///
        /// The table keeps the [`Library`] alive; pointers are valid for as long
        /// as the table exists.
        pub struct WfsApi {
            $( pub $field: unsafe extern "system" fn($($arg: $ty),*) -> ViStatus, )*
            _library: Library,
        }

        impl WfsApi {
            /// Resolves every entry point from an opened library.
            ///
            /// # Safety
            ///
            /// `library` must be the Thorlabs WFS driver; the signatures below
            /// are trusted, not checked.
            pub unsafe fn from_library(library: Library) -> Result<Self, LoadError> {
                $(
                    let $field = *library
                        .get::<unsafe extern "system" fn($($ty),*) -> ViStatus>(
                            concat!($symbol, "\0").as_bytes(),
                        )
                        .map_err(|source| LoadError::MissingSymbol { symbol: $symbol, source })?;
                )*
                Ok(Self { $($field,)* _library: library })
            }
        }

        /// Exported names, in table order.
        pub const SYMBOLS: &[&str] = &[$($symbol),*];
    };
}

wfs_api! {
    // Lifecycle and utility
    init => "WFS_init"(resource_name: ViRsrc, id_query: ViBoolean, reset_device: ViBoolean, instrument_handle: *mut ViSession);
    close => "WFS_close"(instrument_handle: ViSession);
    self_test => "WFS_self_test"(instrument_handle: ViSession, self_test_result: *mut ViInt16, self_test_message: *mut ViChar);
    reset => "WFS_reset"(instrument_handle: ViSession);
    revision_query => "WFS_revision_query"(instrument_handle: ViSession, instrument_driver_revision: *mut ViChar, firmware_revision: *mut ViChar);
    error_query => "WFS_error_query"(instrument_handle: ViSession, error_code: *mut ViInt32, error_message: *mut ViChar);
    error_message => "WFS_error_message"(instrument_handle: ViSession, error_code: ViStatus, error_message: *mut ViChar);
    get_status => "WFS_GetStatus"(instrument_handle: ViSession, device_status: *mut ViInt32);
    get_instrument_info => "WFS_GetInstrumentInfo"(instrument_handle: ViSession, manufacturer_name: *mut ViChar, instrument_name: *mut ViChar, serial_number_wfs: *mut ViChar, serial_number_cam: *mut ViChar);

    // Discovery
    get_instrument_list_len => "WFS_GetInstrumentListLen"(instrument_handle: ViSession, instrument_count: *mut ViInt32);
    get_instrument_list_info => "WFS_GetInstrumentListInfo"(instrument_handle: ViSession, instrument_list_index: ViInt32, device_id: *mut ViInt32, in_use: *mut ViInt32, instrument_name: *mut ViChar, serial_number_wfs: *mut ViChar, resource_name: *mut ViChar);

    // Configuration
    configure_cam => "WFS_ConfigureCam"(instrument_handle: ViSession, pixel_format: ViInt32, cam_resol_index: ViInt32, spots_x: *mut ViInt32, spots_y: *mut ViInt32);
    set_highspeed_mode => "WFS_SetHighspeedMode"(instrument_handle: ViSession, highspeed_mode: ViInt32, adapt_centroids: ViInt32, subtract_offset: ViInt32, allow_auto_exposure: ViInt32);
    get_highspeed_windows => "WFS_GetHighspeedWindows"(instrument_handle: ViSession, window_count_x: *mut ViInt32, window_count_y: *mut ViInt32, window_size_x: *mut ViInt32, window_size_y: *mut ViInt32, window_start_position_x: *mut ViInt32, window_start_position_y: *mut ViInt32);
    check_highspeed_centroids => "WFS_CheckHighspeedCentroids"(instrument_handle: ViSession);
    get_exposure_time_range => "WFS_GetExposureTimeRange"(instrument_handle: ViSession, exposure_time_min: *mut ViReal64, exposure_time_max: *mut ViReal64, exposure_time_incr: *mut ViReal64);
    set_exposure_time => "WFS_SetExposureTime"(instrument_handle: ViSession, exposure_time_set: ViReal64, exposure_time_act: *mut ViReal64);
    get_exposure_time => "WFS_GetExposureTime"(instrument_handle: ViSession, exposure_time_act: *mut ViReal64);
    get_master_gain_range => "WFS_GetMasterGainRange"(instrument_handle: ViSession, master_gain_min: *mut ViReal64, master_gain_max: *mut ViReal64);
    set_master_gain => "WFS_SetMasterGain"(instrument_handle: ViSession, master_gain_set: ViReal64, master_gain_act: *mut ViReal64);
    get_master_gain => "WFS_GetMasterGain"(instrument_handle: ViSession, master_gain_act: *mut ViReal64);
    set_black_level_offset => "WFS_SetBlackLevelOffset"(instrument_handle: ViSession, black_level_offset_set: ViInt32);
    get_black_level_offset => "WFS_GetBlackLevelOffset"(instrument_handle: ViSession, black_level_offset_act: *mut ViInt32);
    set_trigger_mode => "WFS_SetTriggerMode"(instrument_handle: ViSession, trigger_mode: ViInt32);
    get_trigger_mode => "WFS_GetTriggerMode"(instrument_handle: ViSession, trigger_mode: *mut ViInt32);
    set_trigger_delay => "WFS_SetTriggerDelay"(instrument_handle: ViSession, trigger_delay_set: ViInt32, trigger_delay_act: *mut ViInt32);
    get_trigger_delay_range => "WFS_GetTriggerDelayRange"(instrument_handle: ViSession, trigger_delay_min: *mut ViInt32, trigger_delay_max: *mut ViInt32, trigger_delay_incr: *mut ViInt32);
    get_mla_count => "WFS_GetMlaCount"(instrument_handle: ViSession, mla_count: *mut ViInt32);
    get_mla_data => "WFS_GetMlaData"(instrument_handle: ViSession, mla_index: ViInt32, mla_name: *mut ViChar, cam_pitch_um: *mut ViReal64, lenslet_pitch_um: *mut ViReal64, spot_offset_x: *mut ViReal64, spot_offset_y: *mut ViReal64, lenslet_f_um: *mut ViReal64, grd_corr_0: *mut ViReal64, grd_corr_45: *mut ViReal64);
    get_mla_data2 => "WFS_GetMlaData2"(instrument_handle: ViSession, mla_index: ViInt32, mla_name: *mut ViChar, cam_pitch_um: *mut ViReal64, lenslet_pitch_um: *mut ViReal64, spot_offset_x: *mut ViReal64, spot_offset_y: *mut ViReal64, lenslet_f_um: *mut ViReal64, grd_corr_0: *mut ViReal64, grd_corr_45: *mut ViReal64, grd_corr_rot: *mut ViReal64, grd_corr_pitch: *mut ViReal64);
    select_mla => "WFS_SelectMla"(instrument_handle: ViSession, mla_index: ViInt32);
    set_aoi => "WFS_SetAoi"(instrument_handle: ViSession, aoi_center_x_mm: ViReal64, aoi_center_y_mm: ViReal64, aoi_size_x_mm: ViReal64, aoi_size_y_mm: ViReal64);
    get_aoi => "WFS_GetAoi"(instrument_handle: ViSession, aoi_center_x_mm: *mut ViReal64, aoi_center_y_mm: *mut ViReal64, aoi_size_x_mm: *mut ViReal64, aoi_size_y_mm: *mut ViReal64);
    set_pupil => "WFS_SetPupil"(instrument_handle: ViSession, pupil_center_x_mm: ViReal64, pupil_center_y_mm: ViReal64, pupil_diameter_x_mm: ViReal64, pupil_diameter_y_mm: ViReal64);
    get_pupil => "WFS_GetPupil"(instrument_handle: ViSession, pupil_center_x_mm: *mut ViReal64, pupil_center_y_mm: *mut ViReal64, pupil_diameter_x_mm: *mut ViReal64, pupil_diameter_y_mm: *mut ViReal64);
    set_reference_plane => "WFS_SetReferencePlane"(instrument_handle: ViSession, reference_index: ViInt32);
    get_reference_plane => "WFS_GetReferencePlane"(instrument_handle: ViSession, reference_index: *mut ViInt32);

    // Acquisition
    take_spotfield_image => "WFS_TakeSpotfieldImage"(instrument_handle: ViSession);
    take_spotfield_image_auto_expos => "WFS_TakeSpotfieldImageAutoExpos"(instrument_handle: ViSession, exposure_time_act: *mut ViReal64, master_gain_act: *mut ViReal64);
    get_spotfield_image => "WFS_GetSpotfieldImage"(instrument_handle: ViSession, image_buffer: *mut *mut ViUInt8, rows: *mut ViInt32, columns: *mut ViInt32);
    get_spotfield_image_copy => "WFS_GetSpotfieldImageCopy"(instrument_handle: ViSession, image_buffer: *mut ViUInt8, rows: *mut ViInt32, columns: *mut ViInt32);
    average_image => "WFS_AverageImage"(instrument_handle: ViSession, average_count: ViInt32, average_data_ready: *mut ViInt32);
    average_image_rolling => "WFS_AverageImageRolling"(instrument_handle: ViSession, average_count: ViInt32, rolling_reset: ViInt32);
    cut_image_noise_floor => "WFS_CutImageNoiseFloor"(instrument_handle: ViSession, limit: ViInt32);
    calc_image_min_max => "WFS_CalcImageMinMax"(instrument_handle: ViSession, min: *mut ViInt32, max: *mut ViInt32, saturated_pixels_percent: *mut ViReal64);
    calc_mean_rms_noise => "WFS_CalcMeanRmsNoise"(instrument_handle: ViSession, mean: *mut ViReal64, rms: *mut ViReal64);
    get_line => "WFS_GetLine"(instrument_handle: ViSession, line: ViInt32, array_line_selected: *mut ViReal32);
    get_line_view => "WFS_GetLineView"(instrument_handle: ViSession, array_line_min: *mut ViReal32, array_line_max: *mut ViReal32);

    // Analysis
    calc_beam_centroid_dia => "WFS_CalcBeamCentroidDia"(instrument_handle: ViSession, beam_centroid_x_mm: *mut ViReal64, beam_centroid_y_mm: *mut ViReal64, beam_diameter_x_mm: *mut ViReal64, beam_diameter_y_mm: *mut ViReal64);
    calc_spots_centr_dia_intens => "WFS_CalcSpotsCentrDiaIntens"(instrument_handle: ViSession, dynamic_noise_cut: ViInt32, calculate_diameters: ViInt32);
    get_spot_centroids => "WFS_GetSpotCentroids"(instrument_handle: ViSession, array_centroid_x: *mut ViReal32, array_centroid_y: *mut ViReal32);
    get_spot_diameters => "WFS_GetSpotDiameters"(instrument_handle: ViSession, array_diameter_x: *mut ViReal32, array_diameter_y: *mut ViReal32);
    get_spot_dia_statistics => "WFS_GetSpotDiaStatistics"(instrument_handle: ViSession, dia_min: *mut ViReal64, dia_max: *mut ViReal64, dia_mean: *mut ViReal64);
    get_spot_intensities => "WFS_GetSpotIntensities"(instrument_handle: ViSession, array_intensity: *mut ViReal32);
    calc_spot_to_reference_deviations => "WFS_CalcSpotToReferenceDeviations"(instrument_handle: ViSession, cancel_wavefront_tilt: ViInt32);
    get_spot_reference_positions => "WFS_GetSpotReferencePositions"(instrument_handle: ViSession, array_ref_pos_x: *mut ViReal32, array_ref_pos_y: *mut ViReal32);
    get_spot_deviations => "WFS_GetSpotDeviations"(instrument_handle: ViSession, array_deviation_x: *mut ViReal32, array_deviation_y: *mut ViReal32);
    zernike_lsf => "WFS_ZernikeLsf"(instrument_handle: ViSession, zernike_orders: *mut ViInt32, array_zernike_um: *mut ViReal32, array_zernike_orders_um: *mut ViReal32, roc_mm: *mut ViReal64);
    calc_fourier_optometric => "WFS_CalcFourierOptometric"(instrument_handle: ViSession, zernike_orders: ViInt32, fourier_order: ViInt32, fourier_m: *mut ViReal64, fourier_j0: *mut ViReal64, fourier_j45: *mut ViReal64, opto_sphere: *mut ViReal64, opto_cylinder: *mut ViReal64, opto_axis_deg: *mut ViReal64);
    calc_reconstr_deviations => "WFS_CalcReconstrDeviations"(instrument_handle: ViSession, zernike_orders: ViInt32, array_zernike_reconstruct: *mut ViUInt8, do_spherical_reference: ViInt32, fit_err_mean: *mut ViReal64, fit_err_stdev: *mut ViReal64);
    calc_wavefront => "WFS_CalcWavefront"(instrument_handle: ViSession, wavefront_type: ViInt32, limit_to_pupil: ViInt32, array_wavefront: *mut ViReal32);
    calc_wavefront_statistics => "WFS_CalcWavefrontStatistics"(instrument_handle: ViSession, min: *mut ViReal64, max: *mut ViReal64, diff: *mut ViReal64, mean: *mut ViReal64, rms: *mut ViReal64, weighted_rms: *mut ViReal64);
    get_xy_scale => "WFS_GetXYScale"(instrument_handle: ViSession, array_scale_x: *mut ViReal32, array_scale_y: *mut ViReal32);
    convert_wavefront_waves => "WFS_ConvertWavefrontWaves"(instrument_handle: ViSession, wavelength: ViReal64, array_wavefront_in: *mut ViReal32, array_wavefront_out: *mut ViReal32);
    flip_2d_array => "WFS_Flip2DArray"(instrument_handle: ViSession, array_in: *mut ViReal32, array_out: *mut ViReal32);

    // User reference calibration
    set_spots_to_user_reference => "WFS_SetSpotsToUserReference"(instrument_handle: ViSession);
    set_calc_spots_to_user_reference => "WFS_SetCalcSpotsToUserReference"(instrument_handle: ViSession, spot_ref_type: ViInt32, array_reference_x: *mut ViReal32, array_reference_y: *mut ViReal32);
    create_default_user_reference => "WFS_CreateDefaultUserReference"(instrument_handle: ViSession);
    save_user_ref_file => "WFS_SaveUserRefFile"(instrument_handle: ViSession);
    load_user_ref_file => "WFS_LoadUserRefFile"(instrument_handle: ViSession);
    do_spherical_ref => "WFS_DoSphericalRef"(instrument_handle: ViSession);
}

impl fmt::Debug for WfsApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WfsApi")
            .field("entry_points", &SYMBOLS.len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Library resolution
// =============================================================================

/// Platform file name of the vendor library, e.g. `WFS_64.dll` or `libWFS_64.so`.
pub fn library_file_name() -> OsString {
    libloading::library_filename(LIBRARY_NAME)
}

/// Places the library is looked for, most specific first.
///
/// An explicit path wins. Then the bare file name (system search path), then
/// the VXIplug&play binary directory named by `VXIPNPPATH`.
pub fn candidate_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(path) = explicit {
        paths.push(path.to_path_buf());
    }
    paths.push(PathBuf::from(library_file_name()));
    if let Some(root) = std::env::var_os("VXIPNPPATH") {
        let framework = if cfg!(target_pointer_width = "64") {
            "Win64"
        } else {
            "WinNT"
        };
        paths.push(
            PathBuf::from(root)
                .join(framework)
                .join("Bin")
                .join(library_file_name()),
        );
    }
    paths
}

/// Opens the first library found in [`candidate_paths`] and resolves the table.
pub fn load(explicit: Option<&Path>) -> Result<WfsApi, LoadError> {
    let tried = candidate_paths(explicit);
    let mut last_error = None;
    for path in &tried {
        // SAFETY: loading runs the library's initialisers; the WFS driver has
        // no unusual requirements there.
        match unsafe { Library::new(path) } {
            // SAFETY: the library was found under the WFS driver's name.
            Ok(library) => return unsafe { WfsApi::from_library(library) },
            Err(err) => last_error = Some(err),
        }
    }
    Err(LoadError::LibraryNotFound {
        name: library_file_name().to_string_lossy().into_owned(),
        tried,
        source: last_error.unwrap_or(libloading::Error::DlOpenUnknown),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_name_follows_pointer_width() {
        if cfg!(target_pointer_width = "64") {
            assert_eq!(LIBRARY_NAME, "WFS_64");
        } else {
            assert_eq!(LIBRARY_NAME, "WFS_32");
        }
        assert!(library_file_name()
            .to_string_lossy()
            .contains(LIBRARY_NAME));
    }

    #[test]
    fn table_covers_every_entry_point() {
        assert_eq!(SYMBOLS.len(), 71);
        assert!(SYMBOLS.iter().all(|s| s.starts_with("WFS_")));
        let mut sorted = SYMBOLS.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), SYMBOLS.len());
    }

    #[test]
    fn explicit_path_is_tried_first() {
        let explicit = Path::new("/opt/thorlabs/libWFS.so");
        let paths = candidate_paths(Some(explicit));
        assert_eq!(paths[0], explicit);
        assert_eq!(paths[1], PathBuf::from(library_file_name()));
    }

    #[test]
    fn missing_library_is_reported() {
        let err = load(Some(Path::new("/nonexistent/WFS_missing.so"))).unwrap_err();
        assert!(matches!(err, LoadError::LibraryNotFound { .. }));
    }
}
