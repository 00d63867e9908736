//! User reference calibration.

use std::path::{Path, PathBuf};

use wfs_sys::ViStatus;

use super::{int, Wfs};
use crate::constants::InstrumentFamily;
use crate::reference::{user_reference_path, user_reference_path_in};
use crate::sdk::WfsSdk;
use crate::status::Status;

impl<S: WfsSdk> Wfs<S> {
    /// Where the driver keeps the user reference for the current sensor,
    /// MLA and resolution. `None` until the instrument has been identified.
    pub fn user_reference_file(&self) -> Option<PathBuf> {
        let family = self.identified_family()?;
        user_reference_path(
            family,
            &self.instrument.serial_wfs,
            self.params.mla_index,
            self.params.resolution_index,
        )
    }

    /// [`Wfs::user_reference_file`] below the documents folder `base`.
    pub fn user_reference_file_in(&self, base: &Path) -> Option<PathBuf> {
        let family = self.identified_family()?;
        Some(user_reference_path_in(
            base,
            family,
            &self.instrument.serial_wfs,
            self.params.mla_index,
            self.params.resolution_index,
        ))
    }

    fn identified_family(&self) -> Option<InstrumentFamily> {
        let family = self.instrument.family?;
        (!self.instrument.serial_wfs.is_empty()).then_some(family)
    }

    fn reference_call(&mut self, op: &'static str, raw: ViStatus) -> Status {
        let status = self.decode(op, raw);
        let file = self.user_reference_file();
        self.log(op, &status, format_args!("file={file:?}"));
        status
    }

    /// Takes the current spot centroids as the user reference.
    pub fn set_spots_to_user_reference(&mut self) -> Status {
        let raw = self.sdk.set_spots_to_user_reference(self.vi());
        self.reference_call("set_spots_to_user_reference", raw)
    }

    /// Installs a computed user reference.
    ///
    /// `reference_x/_y` are full spot grids in pixels, relative (0) to the
    /// internal reference or absolute (1). Arrays that are not given keep
    /// whatever was staged before.
    pub fn set_calc_spots_to_user_reference(
        &mut self,
        spot_ref_type: Option<i32>,
        reference_x: Option<&[f32]>,
        reference_y: Option<&[f32]>,
    ) -> Status {
        self.params.spot_ref_type = int(spot_ref_type, self.params.spot_ref_type);
        let b = &mut self.buffers;
        for (staging, input) in [
            (&mut b.user_reference_x, reference_x),
            (&mut b.user_reference_y, reference_y),
        ] {
            if let Some(input) = input {
                staging.reset();
                staging.copy_from(input);
            }
        }
        let vi = self.vi();
        let b = &mut self.buffers;
        let raw = self.sdk.set_calc_spots_to_user_reference(
            vi,
            self.params.spot_ref_type,
            b.user_reference_x.as_mut_slice(),
            b.user_reference_y.as_mut_slice(),
        );
        let status = self.decode("set_calc_spots_to_user_reference", raw);
        self.log(
            "set_calc_spots_to_user_reference",
            &status,
            format_args!("spot_ref_type={}", self.params.spot_ref_type),
        );
        status
    }

    pub fn create_default_user_reference(&mut self) -> Status {
        let raw = self.sdk.create_default_user_reference(self.vi());
        self.reference_call("create_default_user_reference", raw)
    }

    pub fn save_user_reference_file(&mut self) -> Status {
        let raw = self.sdk.save_user_reference_file(self.vi());
        self.reference_call("save_user_reference_file", raw)
    }

    pub fn load_user_reference_file(&mut self) -> Status {
        let raw = self.sdk.load_user_reference_file(self.vi());
        self.reference_call("load_user_reference_file", raw)
    }

    /// Uses a spherical reference of the last measured curvature.
    pub fn do_spherical_reference(&mut self) -> Status {
        let raw = self.sdk.do_spherical_reference(self.vi());
        let status = self.decode("do_spherical_reference", raw);
        self.log(
            "do_spherical_reference",
            &status,
            format_args!("roc={} mm", self.results.zernike.roc_mm),
        );
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;
    use crate::sdk::MockWfsSdk;

    fn identified() -> (MockWfsSdk, Wfs<MockWfsSdk>) {
        let sdk = MockWfsSdk::new();
        sdk.state().instrument_name = "WFS20-5C".to_string();
        let mut wfs = Wfs::new(sdk.clone());
        assert!(wfs.init(None, None, None).unwrap().is_ok());
        assert!(wfs.get_instrument_info().0.is_ok());
        sdk.clear_calls();
        (sdk, wfs)
    }

    #[test]
    fn saving_needs_a_user_reference() {
        let (_, mut wfs) = identified();
        let status = wfs.save_user_reference_file();
        assert_eq!(status, WFS_ERROR_NO_USER_REFERENCE);
        assert_eq!(status.message, "No User Reference available!");
        assert!(wfs.create_default_user_reference().is_ok());
        assert!(wfs.save_user_reference_file().is_ok());
        assert!(wfs.set_reference_plane(Some(WFS_REF_USER)).is_ok());
    }

    #[test]
    fn corrupt_file_message_is_normalized() {
        let (sdk, mut wfs) = identified();
        sdk.force("load_user_reference_file", WFS_ERROR_CORRUPT_REF_FILE);
        let status = wfs.load_user_reference_file();
        assert_eq!(status, WFS_ERROR_CORRUPT_REF_FILE);
        assert_eq!(status.message, "Corrupt reference file!");
    }

    #[test]
    fn computed_reference_is_staged() {
        let (sdk, mut wfs) = identified();
        let grid = vec![0.5f32; MAX_SPOTS_X * MAX_SPOTS_Y];
        assert!(wfs
            .set_calc_spots_to_user_reference(Some(1), Some(&grid), Some(&grid[..10]))
            .is_ok());
        assert_eq!(sdk.last_args("set_calc_spots_to_user_reference"), Some(vec![1.0]));
        assert_eq!(wfs.buffers().user_reference_x.get(79, 79), Some(0.5));
        assert_eq!(wfs.buffers().user_reference_y.get(0, 9), Some(0.5));
        assert_eq!(wfs.buffers().user_reference_y.get(0, 10), Some(0.0));
        assert_eq!(wfs.set_calc_spots_to_user_reference(Some(2), None, None), WFS_ERROR_PARAMETER2);
    }

    #[test]
    fn reference_file_follows_setup() {
        let (_, mut wfs) = identified();
        wfs.parameters_mut().resolution_index = 5;
        let documents = tempfile::tempdir().unwrap();
        let path = wfs.user_reference_file_in(documents.path()).unwrap();
        assert!(path.starts_with(documents.path()));
        assert!(path.ends_with("Thorlabs/Wavefront Sensor/Reference/WFS20_M00412345_0_5.ref"));
        assert_eq!(
            wfs.user_reference_file(),
            dirs::document_dir().and_then(|d| wfs.user_reference_file_in(&d))
        );
    }

    #[test]
    fn reference_calls_reach_driver() {
        let (sdk, mut wfs) = identified();
        assert!(wfs.set_spots_to_user_reference().is_ok());
        assert!(wfs.do_spherical_reference().is_ok());
        assert_eq!(
            sdk.call_names(),
            vec!["set_spots_to_user_reference", "do_spherical_reference"]
        );
    }

    #[test]
    fn unidentified_sensor_has_no_reference_file() {
        let wfs = Wfs::new(MockWfsSdk::new());
        let documents = tempfile::tempdir().unwrap();
        assert_eq!(wfs.user_reference_file_in(documents.path()), None);
        assert_eq!(wfs.user_reference_file(), None);
    }
}
