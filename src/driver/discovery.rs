//! Instrument enumeration. Both calls work without an open session.

use super::{int, lifecycle::identify, ListedInstrument, Wfs};
use crate::sdk::WfsSdk;
use crate::status::Status;
use crate::vi::Vi;

impl<S: WfsSdk> Wfs<S> {
    /// Number of sensors attached to the host.
    pub fn get_instrument_list_len(&mut self) -> (Status, i32) {
        let mut count = Vi::int32(0);
        let raw = self.sdk.get_instrument_list_len(self.vi(), count.slot());
        let status = self.decode("get_instrument_list_len", raw);
        if status.is_ok() {
            self.instrument.count = count.value();
        }
        self.log(
            "get_instrument_list_len",
            &status,
            format_args!("count={}", count.value()),
        );
        (status, count.value())
    }

    /// Entry `index` of the instrument list (default: the first).
    ///
    /// On success the entry becomes the handle's instrument: its resource
    /// name is what a following `init` opens.
    pub fn get_instrument_list_info(&mut self, index: Option<i32>) -> (Status, ListedInstrument) {
        self.params.list_index = int(index, self.params.list_index);
        let mut device_id = Vi::int32(0);
        let mut in_use = Vi::int32(0);
        let vi = self.vi();
        let buffers = &mut self.buffers;
        buffers.instrument_name.clear();
        buffers.serial_wfs.clear();
        buffers.resource_name.clear();
        let raw = self.sdk.get_instrument_list_info(
            vi,
            self.params.list_index,
            device_id.slot(),
            in_use.slot(),
            buffers.instrument_name.as_mut_bytes(),
            buffers.serial_wfs.as_mut_bytes(),
            buffers.resource_name.as_mut_bytes(),
        );
        let status = self.decode("get_instrument_list_info", raw);
        let listed = ListedInstrument {
            device_id: device_id.value(),
            in_use: in_use.value() != 0,
            name: self.buffers.instrument_name.to_string_lossy(),
            serial_wfs: self.buffers.serial_wfs.to_string_lossy(),
            resource_name: self.buffers.resource_name.to_string_lossy(),
        };
        if status.is_ok() {
            let info = &mut self.instrument;
            info.device_id = listed.device_id;
            info.in_use = listed.in_use;
            info.name = listed.name.clone();
            info.serial_wfs = listed.serial_wfs.clone();
            info.resource_name = listed.resource_name.clone();
            info.family = identify(&listed.name, listed.device_id);
        }
        self.log(
            "get_instrument_list_info",
            &status,
            format_args!(
                "index={} device_id={} in_use={} name={} serial={} resource={}",
                self.params.list_index,
                listed.device_id,
                listed.in_use,
                listed.name,
                listed.serial_wfs,
                listed.resource_name
            ),
        );
        (status, listed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{InstrumentFamily, WFS_ERROR_PARAMETER2};
    use crate::sdk::MockWfsSdk;

    #[test]
    fn list_entry_becomes_the_instrument() {
        let sdk = MockWfsSdk::new();
        sdk.state().device_id = 0x201;
        sdk.state().instrument_name = "WFS20-5C".to_string();
        let mut wfs = Wfs::new(sdk.clone());

        let (status, count) = wfs.get_instrument_list_len();
        assert!(status.is_ok());
        assert_eq!(count, 1);

        let (status, listed) = wfs.get_instrument_list_info(None);
        assert!(status.is_ok());
        assert!(!listed.in_use);
        assert_eq!(listed.resource_name, "USB::0x1313::0x0000::513");
        assert_eq!(wfs.instrument().family, Some(InstrumentFamily::Wfs20));

        assert!(wfs.init(None, None, None).unwrap().is_ok());
        assert_eq!(wfs.instrument().resource_name, "USB::0x1313::0x0000::513");
    }

    #[test]
    fn index_past_the_list_is_rejected_by_the_driver() {
        let sdk = MockWfsSdk::new();
        let mut wfs = Wfs::new(sdk.clone());
        let (status, _) = wfs.get_instrument_list_info(Some(3));
        assert_eq!(status, WFS_ERROR_PARAMETER2);
        assert_eq!(status.message, "Parameter 2 out of range!");
        assert_eq!(sdk.call_names(), vec!["get_instrument_list_info", "error_message"]);
        assert_eq!(wfs.instrument().family, None);
    }
}
