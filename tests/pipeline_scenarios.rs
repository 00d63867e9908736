//! End-to-end pipeline runs against the recording driver double.

use rust_wfs::config::MeasurementSettings;
use rust_wfs::constants::{
    DeviceStatus, WFS_ERROR_NO_SENSOR_CONNECTED, WFS_ERROR_PARAMETER4, WFS_ERROR_PARAMETER5,
};
use rust_wfs::driver::Wfs;
use rust_wfs::sdk::MockWfsSdk;
use rust_wfs::WfsError;

const CONNECT_CALLS: [&str; 8] = [
    "get_instrument_list_len",
    "get_instrument_list_info",
    "init",
    "revision_query",
    "get_instrument_info",
    "get_mla_count",
    "get_mla_data",
    "get_status",
];

const CONFIG_CALLS: [&str; 19] = [
    "select_mla",
    "configure_cam",
    "get_aoi",
    "get_black_level_offset",
    "get_exposure_time_range",
    "get_exposure_time",
    "get_master_gain_range",
    "get_master_gain",
    "get_trigger_delay_range",
    "set_trigger_delay",
    "get_trigger_mode",
    "set_pupil",
    "get_pupil",
    "set_aoi",
    "get_aoi",
    "set_master_gain",
    "set_black_level_offset",
    "set_reference_plane",
    "get_status",
];

const ANALYSIS_CALLS: [&str; 12] = [
    "get_status",
    "cut_image_noise_floor",
    "get_spotfield_image",
    "calc_spots_centroid_diameter_intensity",
    "get_spot_centroids",
    "calc_beam_centroid_diameter",
    "calc_spot_to_reference_deviations",
    "get_spot_deviations",
    "calc_wavefront",
    "calc_wavefront_statistics",
    "get_line_view",
    "zernike_lsf",
];

fn connected() -> (MockWfsSdk, Wfs<MockWfsSdk>) {
    let sdk = MockWfsSdk::new();
    let mut wfs = Wfs::new(sdk.clone());
    wfs.connect().expect("connect");
    sdk.clear_calls();
    (sdk, wfs)
}

#[test]
fn test_connect_call_sequence() {
    let sdk = MockWfsSdk::new();
    sdk.state().device_status = (DeviceStatus::PTL | DeviceStatus::HAL) as i32;
    let mut wfs = Wfs::new(sdk.clone());

    let device_status = wfs.connect().expect("connect");

    assert_eq!(sdk.call_names(), CONNECT_CALLS);
    assert_eq!(device_status, DeviceStatus(sdk.state().device_status));
    assert!(device_status.contains(DeviceStatus::PTL));
    assert!(wfs.is_open());
    assert_eq!(sdk.last_args("init"), Some(vec![1.0, 1.0]));
    assert_eq!(wfs.instrument().name, "WFS150-7AR");
    assert!(wfs.instrument().mla.is_some());
}

#[test]
fn test_connect_instrument_in_use() {
    let sdk = MockWfsSdk::new();
    sdk.state().in_use = true;
    let mut wfs = Wfs::new(sdk.clone());

    let err = wfs.connect().unwrap_err();

    assert!(matches!(err, WfsError::Connection(ref msg) if msg.contains("in use")));
    assert_eq!(
        sdk.call_names(),
        vec!["get_instrument_list_len", "get_instrument_list_info"]
    );
    assert!(!wfs.is_open());
}

#[test]
fn test_connect_init_failure() {
    let sdk = MockWfsSdk::new();
    sdk.force("init", WFS_ERROR_NO_SENSOR_CONNECTED);
    let mut wfs = Wfs::new(sdk.clone());

    let err = wfs.connect().unwrap_err();

    assert!(err.to_string().contains("No Wavefront Sensor connected!"));
    assert_eq!(wfs.first_failure().map(|s| s.op), Some("init"));
}

#[test]
fn test_config_call_sequence() {
    let (sdk, mut wfs) = connected();

    wfs.config(&MeasurementSettings::default());

    assert_eq!(sdk.call_names(), CONFIG_CALLS);
    assert!(wfs.first_failure().is_none());
    assert_eq!(sdk.last_args("select_mla"), Some(vec![0.0]));
    assert_eq!(sdk.last_args("configure_cam"), Some(vec![0.0, 0.0]));
    let min_delay = f64::from(sdk.state().trigger_delay_range.0);
    assert_eq!(sdk.last_args("set_trigger_delay"), Some(vec![min_delay]));
    assert_eq!(sdk.last_args("set_pupil"), Some(vec![0.0, 0.0, 5.4, 5.4]));
    assert_eq!(sdk.last_args("set_aoi"), Some(vec![0.0, 0.0, 0.0, 0.0]));
    assert_eq!(sdk.last_args("set_master_gain"), Some(vec![1.0]));
    assert_eq!(sdk.last_args("set_black_level_offset"), Some(vec![0.0]));
    assert_eq!(sdk.last_args("set_reference_plane"), Some(vec![0.0]));

    let params = wfs.parameters();
    assert_eq!(params.intensity_limit, 10);
    assert!(params.allow_auto_exposure);
    assert_eq!(wfs.derived().cam_resolution_x, 1280);
    assert_eq!(wfs.derived().cam_resolution_y, 1024);
    assert_eq!(wfs.derived().cam_resolution_factor, 1);
}

#[test]
fn test_config_returns_device_status() {
    let (_, mut wfs) = connected();

    let device_status = wfs.config(&MeasurementSettings::default());

    assert!(device_status.contains(DeviceStatus::CFG));
    assert!(device_status.contains(DeviceStatus::PUD));
    assert_eq!(wfs.results().device_status, device_status);
}

#[test]
fn test_update_with_auto_exposure() {
    let (sdk, mut wfs) = connected();
    wfs.config(&MeasurementSettings::default());
    sdk.state().roc_mm = 842.25;
    sdk.clear_calls();

    let roc_mm = wfs.update();

    let calls = sdk.call_names();
    assert_eq!(calls[0], "take_spotfield_image_auto_exposure");
    assert_eq!(calls[1..], ANALYSIS_CALLS);
    assert_eq!(roc_mm, 842.25);
    assert_eq!(sdk.last_args("cut_image_noise_floor"), Some(vec![10.0]));
    assert_eq!(sdk.last_args("zernike_lsf"), Some(vec![4.0]));
    assert_eq!(wfs.derived().zernike_modes, 15);
    assert!(wfs.first_failure().is_none());
    assert!(wfs.detected_spots() > 0);
}

#[test]
fn test_update_keeps_going_after_failure() {
    let (sdk, mut wfs) = connected();
    wfs.config(&MeasurementSettings::default());
    sdk.force("calc_wavefront", rust_wfs::constants::WFS_ERROR_NO_PUPIL_DEFINED);
    sdk.clear_calls();

    wfs.update();

    assert_eq!(sdk.call_names().last(), Some(&"zernike_lsf"));
    let failure = wfs.first_failure().expect("failure recorded");
    assert_eq!(failure.op, "calc_wavefront");
    assert_eq!(failure.status.message, "Pupil not yet defined!");
}

#[test]
fn test_aoi_below_minimum_is_rejected_locally() {
    let (sdk, mut wfs) = connected();

    let status = wfs.set_aoi(Some(0.0), Some(0.0), Some(0.3), Some(1.0));
    assert_eq!(status, WFS_ERROR_PARAMETER4);
    let status = wfs.set_aoi(Some(0.0), Some(0.0), Some(1.0), Some(0.3));
    assert_eq!(status, WFS_ERROR_PARAMETER5);

    assert!(sdk.call_names().is_empty());
}

#[test]
fn test_zernike_fit_reports_roc() {
    let (sdk, mut wfs) = connected();
    sdk.state().roc_mm = 1234.5;

    let (status, fit) = wfs.zernike_lsf(Some(4));

    assert!(status.is_ok());
    assert_eq!(wfs.derived().zernike_modes, 15);
    assert_eq!(fit.roc_mm, 1234.5);
}

#[test]
fn test_disconnect_closes_session() {
    let (sdk, mut wfs) = connected();

    assert!(wfs.disconnect().is_ok());

    assert_eq!(sdk.call_names(), vec!["close"]);
    assert_eq!(wfs.session(), 0);
    assert!(wfs.connect().is_ok());
}
