//! Session lifecycle and support calls.

use tracing::info;
use wfs_sys::{ViInt32, ViStatus};

use super::{flag, ErrorQuery, InstrumentInfo, Revision, SelfTest, Wfs};
use crate::constants::{DeviceStatus, InstrumentFamily, DEFAULT_RESOURCE_NAME, WFS_BUFFER_SIZE};
use crate::error::WfsResult;
use crate::sdk::WfsSdk;
use crate::status::Status;
use crate::vi::Vi;

impl<S: WfsSdk> Wfs<S> {
    /// Opens a session and stores its handle.
    ///
    /// Without a resource name the last discovered one is used, falling back
    /// to the first USB instrument. Fails only when the name does not fit the
    /// resource buffer; driver failures come back as the status.
    pub fn init(
        &mut self,
        resource_name: Option<&str>,
        id_query: Option<bool>,
        reset_device: Option<bool>,
    ) -> WfsResult<Status> {
        match resource_name {
            Some(name) => self.buffers.resource_name = Vi::rsrc(WFS_BUFFER_SIZE, name)?,
            None if self.buffers.resource_name.value().is_empty() => {
                self.buffers.resource_name = Vi::rsrc(WFS_BUFFER_SIZE, DEFAULT_RESOURCE_NAME)?;
            }
            None => {}
        }
        self.params.id_query = flag(id_query, self.params.id_query);
        self.params.reset_device = flag(reset_device, self.params.reset_device);

        let resource = self.buffers.resource_name.to_c_string();
        let mut handle = Vi::session(0);
        let raw = self.sdk.init(
            &resource,
            Vi::boolean(self.params.id_query).value(),
            Vi::boolean(self.params.reset_device).value(),
            handle.slot(),
        );
        let status = self.decode("init", raw);
        if status.is_ok() {
            self.session = handle;
            self.instrument.resource_name = self.buffers.resource_name.to_string_lossy();
        }
        self.log(
            "init",
            &status,
            format_args!(
                "resource={} id_query={} reset={} handle={:#x}",
                self.instrument.resource_name,
                self.params.id_query,
                self.params.reset_device,
                handle.value()
            ),
        );
        Ok(status)
    }

    /// Closes the session. The handle is zeroed whatever the driver returns.
    pub fn close(&mut self) -> Status {
        let closing = self.vi();
        let raw = self.sdk.close(closing);
        let status = self.decode("close", raw);
        self.session.set(0);
        self.log("close", &status, format_args!("closed={closing:#x}"));
        status
    }

    pub fn self_test(&mut self) -> (Status, SelfTest) {
        let mut result = Vi::int16(0);
        let vi = self.vi();
        self.buffers.self_test_message.clear();
        let raw = self.sdk.self_test(
            vi,
            result.slot(),
            self.buffers.self_test_message.as_mut_bytes(),
        );
        let status = self.decode("self_test", raw);
        let outcome = SelfTest {
            result: result.value(),
            message: self.buffers.self_test_message.to_string_lossy(),
        };
        self.log(
            "self_test",
            &status,
            format_args!("result={} message={:?}", outcome.result, outcome.message),
        );
        (status, outcome)
    }

    pub fn reset(&mut self) -> Status {
        let raw = self.sdk.reset(self.vi());
        let status = self.decode("reset", raw);
        self.log("reset", &status, format_args!(""));
        status
    }

    pub fn revision_query(&mut self) -> (Status, Revision) {
        let vi = self.vi();
        let buffers = &mut self.buffers;
        buffers.driver_revision.clear();
        buffers.firmware_revision.clear();
        let raw = self.sdk.revision_query(
            vi,
            buffers.driver_revision.as_mut_bytes(),
            buffers.firmware_revision.as_mut_bytes(),
        );
        let status = self.decode("revision_query", raw);
        let revision = Revision {
            driver: self.buffers.driver_revision.to_string_lossy(),
            firmware: self.buffers.firmware_revision.to_string_lossy(),
        };
        if status.is_ok() {
            self.instrument.driver_revision = revision.driver.clone();
            self.instrument.firmware_revision = revision.firmware.clone();
        }
        self.log(
            "revision_query",
            &status,
            format_args!("driver={} firmware={}", revision.driver, revision.firmware),
        );
        (status, revision)
    }

    pub fn error_query(&mut self) -> (Status, ErrorQuery) {
        let mut code = Vi::int32(0);
        let vi = self.vi();
        let buffer = &mut self.buffers.error_message;
        buffer.clear();
        let raw = self.sdk.error_query(vi, code.slot(), buffer.as_mut_bytes());
        let status = self.decode("error_query", raw);
        let query = ErrorQuery {
            code: code.value(),
            message: self.buffers.error_message.to_string_lossy(),
        };
        self.log(
            "error_query",
            &status,
            format_args!("code={} message={:?}", query.code, query.message),
        );
        (status, query)
    }

    /// Explains `code`: warnings come back as success with their text,
    /// errors with the driver's (normalised) message.
    pub fn error_message(&mut self, code: ViStatus) -> Status {
        let code = Vi::status(code).value();
        let status = self.describe(code);
        info!(
            target: "WFS",
            op = "error_message",
            session = self.vi(),
            code,
            "{}",
            status.message
        );
        status
    }

    pub fn get_status(&mut self) -> (Status, DeviceStatus) {
        let mut mask = Vi::int32(0);
        let raw = self.sdk.get_status(self.vi(), mask.slot());
        let status = self.decode("get_status", raw);
        let device_status = DeviceStatus(mask.value());
        if status.is_ok() {
            self.results.device_status = device_status;
        }
        self.log("get_status", &status, format_args!("device_status={device_status}"));
        (status, device_status)
    }

    pub fn get_instrument_info(&mut self) -> (Status, InstrumentInfo) {
        let vi = self.vi();
        let buffers = &mut self.buffers;
        for buffer in [
            &mut buffers.manufacturer,
            &mut buffers.instrument_name,
            &mut buffers.serial_wfs,
            &mut buffers.serial_cam,
        ] {
            buffer.clear();
        }
        let raw = self.sdk.get_instrument_info(
            vi,
            buffers.manufacturer.as_mut_bytes(),
            buffers.instrument_name.as_mut_bytes(),
            buffers.serial_wfs.as_mut_bytes(),
            buffers.serial_cam.as_mut_bytes(),
        );
        let status = self.decode("get_instrument_info", raw);
        if status.is_ok() {
            let info = &mut self.instrument;
            info.manufacturer = self.buffers.manufacturer.to_string_lossy();
            info.name = self.buffers.instrument_name.to_string_lossy();
            info.serial_wfs = self.buffers.serial_wfs.to_string_lossy();
            info.serial_cam = self.buffers.serial_cam.to_string_lossy();
            info.family = identify(&info.name, info.device_id);
        }
        self.log(
            "get_instrument_info",
            &status,
            format_args!(
                "manufacturer={} name={} serial_wfs={} serial_cam={}",
                self.instrument.manufacturer,
                self.instrument.name,
                self.instrument.serial_wfs,
                self.instrument.serial_cam
            ),
        );
        (status, self.instrument.clone())
    }
}

/// Family from the instrument name, else from a known device id.
pub(super) fn identify(name: &str, device_id: ViInt32) -> Option<InstrumentFamily> {
    InstrumentFamily::from_name(name)
        .or_else(|| (device_id > 0).then(|| InstrumentFamily::from_device_id(device_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;
    use crate::sdk::MockWfsSdk;

    fn open() -> (MockWfsSdk, Wfs<MockWfsSdk>) {
        let sdk = MockWfsSdk::new();
        let mut wfs = Wfs::new(sdk.clone());
        assert!(wfs.init(None, None, None).unwrap().is_ok());
        (sdk, wfs)
    }

    #[test]
    fn init_and_close_track_the_session() {
        let (sdk, mut wfs) = open();
        assert_eq!(wfs.session(), sdk.state().session);
        assert!(wfs.is_open());
        assert_eq!(sdk.last_args("init"), Some(vec![1.0, 1.0]));
        assert!(wfs.close().is_ok());
        assert_eq!(wfs.session(), 0);
    }

    #[test]
    fn close_zeroes_session_even_on_failure() {
        let (sdk, mut wfs) = open();
        sdk.force("close", WFS_ERROR_INVALID_HANDLE);
        let status = wfs.close();
        assert_eq!(status, WFS_ERROR_INVALID_HANDLE);
        assert_eq!(status.message, "Wrong Instrument handle!");
        assert!(!wfs.is_open());
    }

    #[test]
    fn overlong_resource_name_is_a_host_error() {
        let sdk = MockWfsSdk::new();
        let mut wfs = Wfs::new(sdk.clone());
        let name = "U".repeat(WFS_BUFFER_SIZE + 1);
        assert!(wfs.init(Some(&name), None, None).is_err());
        assert!(sdk.calls().is_empty());
    }

    #[test]
    fn unsupported_calls_are_warnings() {
        let (_, mut wfs) = open();
        let status = wfs.reset();
        assert_eq!(status, 0);
        assert_eq!(status.raw, WFS_WARN_NSUP_RESET);
        assert_eq!(status.message, "Reset not supported!");
        let (status, test) = wfs.self_test();
        assert!(status.is_warning());
        assert_eq!(test.message, "Self-test not supported!");
    }

    #[test]
    fn instrument_info_sets_family() {
        let (_, mut wfs) = open();
        let (status, info) = wfs.get_instrument_info();
        assert!(status.is_ok());
        assert_eq!(info.name, "WFS150-7AR");
        assert_eq!(wfs.instrument().family, Some(InstrumentFamily::Wfs150));
        let (_, revision) = wfs.revision_query();
        assert_eq!(revision.driver, "5.2");
    }

    #[test]
    fn error_message_decodes_without_failing() {
        let (sdk, mut wfs) = open();
        let status = wfs.error_message(WFS_WARN_NSUP_ID_QUERY);
        assert_eq!(status, 0);
        assert_eq!(status.message, "Identification query not supported!");
        let status = wfs.error_message(WFS_ERROR_CORRUPT_REF_FILE);
        assert_eq!(status.message, "Corrupt reference file!");
        assert_eq!(sdk.call_names().last(), Some(&"error_message"));
        assert!(wfs.error_message(0).is_ok());
    }

    #[test]
    fn identify_falls_back_to_device_id() {
        assert_eq!(identify("", 0x201), Some(InstrumentFamily::Wfs20));
        assert_eq!(identify("", 0), None);
        assert_eq!(identify("WFS40-7AR", 0x201), Some(InstrumentFamily::Wfs40));
    }

    #[test]
    fn status_mask_is_kept() {
        let (sdk, mut wfs) = open();
        sdk.state().device_status = (DeviceStatus::CFG | DeviceStatus::PUD) as ViInt32;
        let (status, mask) = wfs.get_status();
        assert!(status.is_ok());
        assert!(mask.contains(DeviceStatus::PUD));
        assert_eq!(wfs.results().device_status, mask);
    }
}
