//! Sensor-family constants and decode tables.
//!
//! Everything here is immutable and process-wide: status code domains,
//! warning and device-status tables, enumerations of the driver ABI,
//! buffer bounds, limits, and the per-family camera resolution tables.

use std::fmt;

use serde::{Deserialize, Serialize};
use wfs_sys::{ViInt32, ViStatus};

// =============================================================================
// Buffers and bounds
// =============================================================================

/// General purpose string buffer size.
pub const WFS_BUFFER_SIZE: usize = 256;
/// Size of the buffer `error_message` writes into.
pub const WFS_ERR_DESCR_BUFFER_SIZE: usize = 512;

pub const WFS_MAX_INSTRUMENTS: usize = 5;
pub const WFS_MAX_MLAS: usize = 7;
pub const MAX_SPOTS_X: usize = 80;
pub const MAX_SPOTS_Y: usize = 80;
pub const CAM_MAX_PIX_X: usize = 2048;
pub const CAM_MAX_PIX_Y: usize = 2048;
pub const MAX_ZERNIKE_MODES: usize = 66;
pub const MAX_ZERNIKE_ORDERS: usize = 10;

/// Default resource name when none has been discovered.
pub const DEFAULT_RESOURCE_NAME: &str = "USB::0x1313::0x0000::1";

/// `USB::0x1313::0x0000::<device-id>`
pub fn resource_name_for(device_id: ViInt32) -> String {
    format!("USB::0x1313::0x0000::{device_id}")
}

// =============================================================================
// Limits
// =============================================================================

pub const PUPIL_DIA_MIN_MM: f64 = 0.5;
pub const PUPIL_DIA_MAX_MM: f64 = 12.0;
pub const PUPIL_CTR_MIN_MM: f64 = -8.0;
pub const PUPIL_CTR_MAX_MM: f64 = 8.0;

/// Non-zero AOI sizes below this are rejected before reaching the driver.
pub const AOI_SIZE_MIN_MM: f64 = PUPIL_DIA_MIN_MM;

pub const ROC_CAL_MIN_MM: f64 = 100.0;
pub const ROC_CAL_MAX_MM: f64 = 5000.0;

pub const BLACK_LEVEL_MIN: ViInt32 = 0;
pub const BLACK_LEVEL_MAX: ViInt32 = 255;

pub const NOISE_LEVEL_MIN: ViInt32 = 0;
pub const NOISE_LEVEL_MAX: ViInt32 = 256;

/// Capture timeouts inside the driver, in seconds. Informational only.
pub const WFS_TIMEOUT_CAPTURE_NORMAL: f64 = 3.0;
pub const WFS_TIMEOUT_CAPTURE_TRIGGER: f64 = 0.1;

// =============================================================================
// Status code domains
// =============================================================================

pub const VI_ERROR: ViStatus = i32::MIN;
pub const WFS_INSTR_WARNING_OFFSET: ViStatus = 0x3FFC_0900;
pub const WFS_INSTR_ERROR_OFFSET: ViStatus = VI_ERROR + 0x3FFC_0900;

const PARAMETER_ERROR_BASE: ViStatus = VI_ERROR + 0x3FFC_0000;

pub const WFS_ERROR_PARAMETER1: ViStatus = PARAMETER_ERROR_BASE + 1;
pub const WFS_ERROR_PARAMETER2: ViStatus = PARAMETER_ERROR_BASE + 2;
pub const WFS_ERROR_PARAMETER3: ViStatus = PARAMETER_ERROR_BASE + 3;
pub const WFS_ERROR_PARAMETER4: ViStatus = PARAMETER_ERROR_BASE + 4;
pub const WFS_ERROR_PARAMETER5: ViStatus = PARAMETER_ERROR_BASE + 5;
pub const WFS_ERROR_PARAMETER6: ViStatus = PARAMETER_ERROR_BASE + 6;
pub const WFS_ERROR_PARAMETER7: ViStatus = PARAMETER_ERROR_BASE + 7;
pub const WFS_ERROR_PARAMETER8: ViStatus = PARAMETER_ERROR_BASE + 8;
pub const WFS_ERROR_PARAMETER9: ViStatus = PARAMETER_ERROR_BASE + 9;

/// `WFS_ERROR_PARAMETER{n}`, for n in 1..=9.
pub const fn parameter_error(n: u8) -> ViStatus {
    PARAMETER_ERROR_BASE + n as ViStatus
}

/// Position of a parameter error code (1..=9), if `code` is one.
pub fn parameter_index(code: ViStatus) -> Option<u8> {
    let n = code.checked_sub(PARAMETER_ERROR_BASE)?;
    u8::try_from(n).ok().filter(|n| (1..=9).contains(n))
}

pub const WFS_ERROR_NO_SENSOR_CONNECTED: ViStatus = WFS_INSTR_ERROR_OFFSET;
pub const WFS_ERROR_OUT_OF_MEMORY: ViStatus = WFS_INSTR_ERROR_OFFSET + 0x01;
pub const WFS_ERROR_INVALID_HANDLE: ViStatus = WFS_INSTR_ERROR_OFFSET + 0x02;
pub const WFS_ERROR_CAM_NOT_CONFIGURED: ViStatus = WFS_INSTR_ERROR_OFFSET + 0x03;
pub const WFS_ERROR_PIXEL_FORMAT: ViStatus = WFS_INSTR_ERROR_OFFSET + 0x04;
pub const WFS_ERROR_EEPROM_CHECKSUM: ViStatus = WFS_INSTR_ERROR_OFFSET + 0x05;
pub const WFS_ERROR_EEPROM_CAL_DATA: ViStatus = WFS_INSTR_ERROR_OFFSET + 0x06;
pub const WFS_ERROR_OLD_REF_FILE: ViStatus = WFS_INSTR_ERROR_OFFSET + 0x07;
pub const WFS_ERROR_NO_REF_FILE: ViStatus = WFS_INSTR_ERROR_OFFSET + 0x08;
pub const WFS_ERROR_CORRUPT_REF_FILE: ViStatus = WFS_INSTR_ERROR_OFFSET + 0x09;
pub const WFS_ERROR_WRITE_FILE: ViStatus = WFS_INSTR_ERROR_OFFSET + 0x0a;
pub const WFS_ERROR_INSUFF_SPOTS_FOR_ZERNFIT: ViStatus = WFS_INSTR_ERROR_OFFSET + 0x0b;
pub const WFS_ERROR_TOO_MANY_SPOTS_FOR_ZERNFIT: ViStatus = WFS_INSTR_ERROR_OFFSET + 0x0c;
pub const WFS_ERROR_FOURIER_ORDER: ViStatus = WFS_INSTR_ERROR_OFFSET + 0x0d;
pub const WFS_ERROR_NO_RECON_DEVIATIONS: ViStatus = WFS_INSTR_ERROR_OFFSET + 0x0e;
pub const WFS_ERROR_NO_PUPIL_DEFINED: ViStatus = WFS_INSTR_ERROR_OFFSET + 0x0f;
pub const WFS_ERROR_WRONG_PUPIL_DIA: ViStatus = WFS_INSTR_ERROR_OFFSET + 0x10;
pub const WFS_ERROR_WRONG_PUPIL_CTR: ViStatus = WFS_INSTR_ERROR_OFFSET + 0x11;
pub const WFS_ERROR_INVALID_CAL_DATA: ViStatus = WFS_INSTR_ERROR_OFFSET + 0x12;
pub const WFS_ERROR_INTERNAL_REQUIRED: ViStatus = WFS_INSTR_ERROR_OFFSET + 0x13;
pub const WFS_ERROR_ROC_RANGE: ViStatus = WFS_INSTR_ERROR_OFFSET + 0x14;
pub const WFS_ERROR_NO_USER_REFERENCE: ViStatus = WFS_INSTR_ERROR_OFFSET + 0x15;
pub const WFS_ERROR_AWAITING_TRIGGER: ViStatus = WFS_INSTR_ERROR_OFFSET + 0x16;
pub const WFS_ERROR_NO_HIGHSPEED: ViStatus = WFS_INSTR_ERROR_OFFSET + 0x17;
pub const WFS_ERROR_HIGHSPEED_ACTIVE: ViStatus = WFS_INSTR_ERROR_OFFSET + 0x18;
pub const WFS_ERROR_HIGHSPEED_NOT_ACTIVE: ViStatus = WFS_INSTR_ERROR_OFFSET + 0x19;
pub const WFS_ERROR_HIGHSPEED_WINDOW_MISMATCH: ViStatus = WFS_INSTR_ERROR_OFFSET + 0x1a;
pub const WFS_ERROR_NOT_SUPPORTED: ViStatus = WFS_INSTR_ERROR_OFFSET + 0x1b;
/// Documented with the same value as [`WFS_ERROR_NOT_SUPPORTED`].
pub const WFS_ERROR_SPOT_TRUNCATED: ViStatus = WFS_INSTR_ERROR_OFFSET + 0x1b;
pub const WFS_ERROR_NO_SPOT_DETECTED: ViStatus = WFS_INSTR_ERROR_OFFSET + 0x1c;
pub const WFS_ERROR_TILT_CALCULATION: ViStatus = WFS_INSTR_ERROR_OFFSET + 0x1d;

/// Replacement for the driver's misspelt corrupt-reference message.
pub const CORRUPT_REF_FILE_MESSAGE: &str = "Corrupt reference file!";

pub const WFS_WARN_NSUP_ID_QUERY: ViStatus = 0x3FFC_0101;
pub const WFS_WARN_NSUP_RESET: ViStatus = 0x3FFC_0102;
pub const WFS_WARN_NSUP_SELF_TEST: ViStatus = 0x3FFC_0103;
pub const WFS_WARN_NSUP_ERROR_QUERY: ViStatus = 0x3FFC_0104;
pub const WFS_WARN_NSUP_REV_QUERY: ViStatus = 0x3FFC_0105;

/// Warning codes and their documented messages.
pub const WFS_WARNING_CODES: &[(ViStatus, &str)] = &[
    (WFS_WARN_NSUP_ID_QUERY, "Identification query not supported!"),
    (WFS_WARN_NSUP_RESET, "Reset not supported!"),
    (WFS_WARN_NSUP_SELF_TEST, "Self-test not supported!"),
    (WFS_WARN_NSUP_ERROR_QUERY, "Error query not supported!"),
    (WFS_WARN_NSUP_REV_QUERY, "Instrument revision query not supported!"),
];

pub fn warning_message(code: ViStatus) -> Option<&'static str> {
    WFS_WARNING_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, message)| *message)
}

/// Whether `code` lies in the instrument-specific error range.
pub fn is_instrument_error(code: ViStatus) -> bool {
    (WFS_INSTR_ERROR_OFFSET..=WFS_ERROR_TILT_CALCULATION).contains(&code)
}

// =============================================================================
// Enumerations
// =============================================================================

macro_rules! raw_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $value:expr),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        #[repr(i32)]
        pub enum $name {
            $($variant = $value),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Value passed across the driver ABI.
            pub const fn raw(self) -> ViInt32 {
                self as ViInt32
            }

            pub fn from_raw(raw: ViInt32) -> Option<Self> {
                Self::ALL.iter().copied().find(|v| v.raw() == raw)
            }
        }

        impl From<$name> for ViInt32 {
            fn from(v: $name) -> ViInt32 {
                v.raw()
            }
        }
    };
}

raw_enum! {
    /// Camera pixel format. Only MONO8 is supported by current sensors.
    PixelFormat { Mono8 = 0, Mono16 = 1 }
}

raw_enum! {
    /// Trigger source and edge.
    TriggerMode { Off = 0, HardwareHighLow = 1, HardwareLowHigh = 2, Software = 3 }
}

raw_enum! {
    /// Wavefront calculated by `calc_wavefront`.
    WavefrontType { Measured = 0, Reconstructed = 1, Difference = 2 }
}

raw_enum! {
    /// Reference the spot deviations are measured against.
    ReferencePlane { Internal = 0, User = 1 }
}

raw_enum! {
    /// Interpretation of user reference arrays.
    SpotReferenceType { Relative = 0, Absolute = 1 }
}

pub const PIXEL_FORMAT_MONO8: ViInt32 = PixelFormat::Mono8.raw();
pub const PIXEL_FORMAT_MONO16: ViInt32 = PixelFormat::Mono16.raw();
pub const WFS_HW_TRIGGER_OFF: ViInt32 = TriggerMode::Off.raw();
pub const WFS_HW_TRIGGER_HL: ViInt32 = TriggerMode::HardwareHighLow.raw();
pub const WFS_HW_TRIGGER_LH: ViInt32 = TriggerMode::HardwareLowHigh.raw();
pub const WFS_SW_TRIGGER: ViInt32 = TriggerMode::Software.raw();
pub const WFS_REF_INTERNAL: ViInt32 = ReferencePlane::Internal.raw();
pub const WFS_REF_USER: ViInt32 = ReferencePlane::User.raw();

/// Orders accepted by `calc_fourier_optometric`.
pub const FOURIER_ORDERS: [ViInt32; 3] = [2, 4, 6];

// =============================================================================
// Zernike orders and modes
// =============================================================================

/// Order value asking `zernike_lsf` to pick the order itself.
pub const ZERNIKE_ORDERS_AUTO: ViInt32 = 0;

/// Number of Zernike modes fitted for each order 2..=10.
pub const ZERNIKE_MODES_PER_ORDER: [(ViInt32, usize); 9] = [
    (2, 6),
    (3, 10),
    (4, 15),
    (5, 21),
    (6, 28),
    (7, 36),
    (8, 45),
    (9, 55),
    (10, 66),
];

pub fn zernike_modes(order: ViInt32) -> Option<usize> {
    ZERNIKE_MODES_PER_ORDER
        .iter()
        .find(|(o, _)| *o == order)
        .map(|(_, modes)| *modes)
}

/// Orders `zernike_lsf` accepts: auto, or 2..=10.
pub fn is_valid_zernike_order(order: ViInt32) -> bool {
    order == ZERNIKE_ORDERS_AUTO || zernike_modes(order).is_some()
}

// =============================================================================
// Instrument families and camera resolutions
// =============================================================================

/// One entry of a camera resolution table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub x: ViInt32,
    pub y: ViInt32,
    /// 1 for full resolution, 2 for binned modes.
    pub factor: ViInt32,
}

const fn res(x: ViInt32, y: ViInt32, factor: ViInt32) -> Resolution {
    Resolution { x, y, factor }
}

pub const WFS_RESOLUTIONS: &[Resolution] = &[
    res(1280, 1024, 1),
    res(1024, 1024, 1),
    res(768, 768, 1),
    res(512, 512, 1),
    res(320, 320, 1),
];

pub const WFS10_RESOLUTIONS: &[Resolution] = &[
    res(640, 480, 1),
    res(480, 480, 1),
    res(360, 360, 1),
    res(260, 260, 1),
    res(180, 180, 1),
];

pub const WFS20_RESOLUTIONS: &[Resolution] = &[
    res(1440, 1080, 1),
    res(1080, 1080, 1),
    res(768, 768, 1),
    res(512, 512, 1),
    res(360, 360, 1),
    res(720, 540, 2),
    res(540, 540, 2),
    res(384, 384, 2),
    res(256, 256, 2),
    res(180, 180, 2),
];

pub const WFS30_RESOLUTIONS: &[Resolution] = &[
    res(1936, 1216, 1),
    res(1216, 1216, 1),
    res(1024, 1024, 1),
    res(768, 768, 1),
    res(512, 512, 1),
    res(360, 360, 1),
    res(968, 608, 2),
    res(608, 608, 2),
    res(512, 512, 2),
    res(384, 384, 2),
    res(256, 256, 2),
    res(180, 180, 2),
];

pub const WFS40_RESOLUTIONS: &[Resolution] = &[
    res(2048, 2048, 1),
    res(1536, 1536, 1),
    res(1024, 1024, 1),
    res(768, 768, 1),
    res(512, 512, 1),
    res(360, 360, 1),
    res(1024, 1024, 2),
    res(768, 768, 2),
    res(512, 512, 2),
    res(384, 384, 2),
    res(256, 256, 2),
    res(180, 180, 2),
];

pub const DEVICE_OFFSET_WFS10: ViInt32 = 0x100;
pub const DEVICE_OFFSET_WFS20: ViInt32 = 0x200;
pub const DEVICE_OFFSET_WFS30: ViInt32 = 0x400;
pub const DEVICE_OFFSET_WFS40: ViInt32 = 0x800;

/// Sensor family, as named by the instrument-name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentFamily {
    Wfs150,
    Wfs300,
    Wfs10,
    Wfs20,
    Wfs30,
    Wfs40,
}

impl InstrumentFamily {
    /// Prefix-match order; `WFS300` must be tried before `WFS30`.
    const BY_PREFIX: [InstrumentFamily; 6] = [
        InstrumentFamily::Wfs150,
        InstrumentFamily::Wfs300,
        InstrumentFamily::Wfs10,
        InstrumentFamily::Wfs20,
        InstrumentFamily::Wfs30,
        InstrumentFamily::Wfs40,
    ];

    pub const fn prefix(self) -> &'static str {
        match self {
            InstrumentFamily::Wfs150 => "WFS150",
            InstrumentFamily::Wfs300 => "WFS300",
            InstrumentFamily::Wfs10 => "WFS10",
            InstrumentFamily::Wfs20 => "WFS20",
            InstrumentFamily::Wfs30 => "WFS30",
            InstrumentFamily::Wfs40 => "WFS40",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_uppercase();
        Self::BY_PREFIX
            .into_iter()
            .find(|family| name.starts_with(family.prefix()))
    }

    /// Fallback when the instrument name is unavailable.
    pub fn from_device_id(device_id: ViInt32) -> Self {
        match device_id {
            id if id >= DEVICE_OFFSET_WFS40 => InstrumentFamily::Wfs40,
            id if id >= DEVICE_OFFSET_WFS30 => InstrumentFamily::Wfs30,
            id if id >= DEVICE_OFFSET_WFS20 => InstrumentFamily::Wfs20,
            id if id >= DEVICE_OFFSET_WFS10 => InstrumentFamily::Wfs10,
            _ => InstrumentFamily::Wfs150,
        }
    }

    pub const fn resolutions(self) -> &'static [Resolution] {
        match self {
            InstrumentFamily::Wfs150 | InstrumentFamily::Wfs300 => WFS_RESOLUTIONS,
            InstrumentFamily::Wfs10 => WFS10_RESOLUTIONS,
            InstrumentFamily::Wfs20 => WFS20_RESOLUTIONS,
            InstrumentFamily::Wfs30 => WFS30_RESOLUTIONS,
            InstrumentFamily::Wfs40 => WFS40_RESOLUTIONS,
        }
    }

    pub fn resolution(self, index: ViInt32) -> Option<Resolution> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.resolutions().get(i).copied())
    }

    /// Master gain bounds `(min, max)`.
    pub const fn master_gain_limits(self) -> (f64, f64) {
        match self {
            InstrumentFamily::Wfs150 | InstrumentFamily::Wfs300 => (1.0, 5.0),
            InstrumentFamily::Wfs10 => (1.0, 4.0),
            InstrumentFamily::Wfs20 | InstrumentFamily::Wfs30 | InstrumentFamily::Wfs40 => {
                (1.0, 1.5)
            }
        }
    }

    /// Families whose camera computes centroids in highspeed mode.
    pub const fn supports_highspeed(self) -> bool {
        !matches!(self, InstrumentFamily::Wfs150 | InstrumentFamily::Wfs300)
    }
}

impl fmt::Display for InstrumentFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

// =============================================================================
// Device status mask
// =============================================================================

/// One bit of the driver status mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusBit {
    pub mask: u32,
    pub tag: &'static str,
    pub description: &'static str,
}

const fn bit(mask: u32, tag: &'static str, description: &'static str) -> StatusBit {
    StatusBit {
        mask,
        tag,
        description,
    }
}

pub const WFS_DRIVER_STATUS: &[StatusBit] = &[
    bit(0x0000_0001, "CON", "USB connection lost, set by driver"),
    bit(0x0000_0002, "PTH", "Power too high (camera saturated)"),
    bit(0x0000_0004, "PTL", "Power too low (low camera digits)"),
    bit(0x0000_0008, "HAL", "High ambient light"),
    bit(0x0000_0010, "SCL", "Spot contrast too low"),
    bit(0x0000_0020, "ZFL", "Zernike fit failed because of not enough detected spots"),
    bit(0x0000_0040, "ZFH", "Zernike fit failed because of too many detected spots"),
    bit(0x0000_0080, "ATR", "Camera is still awaiting a trigger"),
    bit(0x0000_0100, "CFG", "Camera is configured, ready to use"),
    bit(0x0000_0200, "PUD", "Pupil is defined"),
    bit(0x0000_0400, "SPC", "Number of spots or pupil or aoi has been changed"),
    bit(0x0000_0800, "RDA", "Reconstructed spot deviations available"),
    bit(0x0000_1000, "URF", "User reference data available"),
    bit(0x0000_2000, "HSP", "Camera is in highspeed mode"),
    bit(0x0000_4000, "MIS", "Mismatched centroids in highspeed mode"),
    bit(0x0000_8000, "LOS", "Low number of detected spots, warning"),
    bit(0x0001_0000, "FIL", "Pupil is badly filled with spots, warning"),
];

/// Device status mask returned by `get_status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceStatus(pub ViInt32);

impl DeviceStatus {
    pub const CON: u32 = 0x0000_0001;
    pub const PTH: u32 = 0x0000_0002;
    pub const PTL: u32 = 0x0000_0004;
    pub const HAL: u32 = 0x0000_0008;
    pub const SCL: u32 = 0x0000_0010;
    pub const ZFL: u32 = 0x0000_0020;
    pub const ZFH: u32 = 0x0000_0040;
    pub const ATR: u32 = 0x0000_0080;
    pub const CFG: u32 = 0x0000_0100;
    pub const PUD: u32 = 0x0000_0200;
    pub const SPC: u32 = 0x0000_0400;
    pub const RDA: u32 = 0x0000_0800;
    pub const URF: u32 = 0x0000_1000;
    pub const HSP: u32 = 0x0000_2000;
    pub const MIS: u32 = 0x0000_4000;
    pub const LOS: u32 = 0x0000_8000;
    pub const FIL: u32 = 0x0001_0000;

    /// Only the low 24 bits carry meaning.
    pub const fn bits(self) -> u32 {
        (self.0 as u32) & 0x00FF_FFFF
    }

    pub const fn contains(self, mask: u32) -> bool {
        self.bits() & mask == mask
    }

    pub fn flags(self) -> impl Iterator<Item = &'static StatusBit> {
        WFS_DRIVER_STATUS
            .iter()
            .filter(move |b| self.bits() & b.mask != 0)
    }

    /// Any of the conditions that make a measurement unusable.
    pub const fn has_fault(self) -> bool {
        self.bits() & (Self::CON | Self::PTH | Self::PTL | Self::HAL | Self::SCL) != 0
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<&str> = self.flags().map(|b| b.tag).collect();
        if tags.is_empty() {
            write!(f, "0x{:06X}", self.bits())
        } else {
            write!(f, "0x{:06X} [{}]", self.bits(), tags.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_domains() {
        assert_eq!(WFS_INSTR_ERROR_OFFSET, -1_074_001_664);
        assert_eq!(WFS_ERROR_PARAMETER1, -1_074_003_967);
        assert_eq!(WFS_ERROR_PARAMETER2, -1_074_003_966);
        assert_eq!(WFS_ERROR_NO_USER_REFERENCE, -1_074_001_643);
        assert_eq!(WFS_ERROR_HIGHSPEED_NOT_ACTIVE, -1_074_001_639);
        assert_eq!(WFS_WARN_NSUP_RESET, 1_073_479_938);
        assert_eq!(parameter_error(4), WFS_ERROR_PARAMETER4);
        assert_eq!(parameter_index(WFS_ERROR_PARAMETER9), Some(9));
        assert_eq!(parameter_index(WFS_INSTR_ERROR_OFFSET), None);
        assert!(is_instrument_error(WFS_ERROR_CORRUPT_REF_FILE));
        assert!(!is_instrument_error(WFS_ERROR_PARAMETER2));
        assert_eq!(WFS_ERROR_SPOT_TRUNCATED, WFS_ERROR_NOT_SUPPORTED);
    }

    #[test]
    fn warning_table() {
        assert_eq!(
            warning_message(WFS_WARN_NSUP_REV_QUERY),
            Some("Instrument revision query not supported!")
        );
        assert_eq!(warning_message(0), None);
        assert_eq!(WFS_WARNING_CODES.len(), 5);
    }

    #[test]
    fn zernike_orders_map_to_modes() {
        let expected = [(2, 6), (3, 10), (4, 15), (5, 21), (6, 28), (7, 36), (8, 45), (9, 55), (10, 66)];
        for (order, modes) in expected {
            assert_eq!(zernike_modes(order), Some(modes));
        }
        assert_eq!(zernike_modes(ZERNIKE_ORDERS_AUTO), None);
        assert!(is_valid_zernike_order(ZERNIKE_ORDERS_AUTO));
        assert!(!is_valid_zernike_order(1));
        assert!(!is_valid_zernike_order(11));
        assert_eq!(zernike_modes(MAX_ZERNIKE_ORDERS as ViInt32), Some(MAX_ZERNIKE_MODES));
    }

    #[test]
    fn family_from_name_prefix() {
        assert_eq!(InstrumentFamily::from_name("WFS150-7AR"), Some(InstrumentFamily::Wfs150));
        assert_eq!(InstrumentFamily::from_name("WFS300-14AR"), Some(InstrumentFamily::Wfs300));
        assert_eq!(InstrumentFamily::from_name("WFS30-7AR"), Some(InstrumentFamily::Wfs30));
        assert_eq!(InstrumentFamily::from_name("WFS10-5C"), Some(InstrumentFamily::Wfs10));
        assert_eq!(InstrumentFamily::from_name("wfs20-5c"), Some(InstrumentFamily::Wfs20));
        assert_eq!(InstrumentFamily::from_name("WFS40-14AR"), Some(InstrumentFamily::Wfs40));
        assert_eq!(InstrumentFamily::from_name("PM100D"), None);
    }

    #[test]
    fn family_from_device_id() {
        assert_eq!(InstrumentFamily::from_device_id(1), InstrumentFamily::Wfs150);
        assert_eq!(InstrumentFamily::from_device_id(0x101), InstrumentFamily::Wfs10);
        assert_eq!(InstrumentFamily::from_device_id(0x201), InstrumentFamily::Wfs20);
        assert_eq!(InstrumentFamily::from_device_id(0x401), InstrumentFamily::Wfs30);
        assert_eq!(InstrumentFamily::from_device_id(0x801), InstrumentFamily::Wfs40);
    }

    #[test]
    fn resolution_tables() {
        assert_eq!(InstrumentFamily::Wfs150.resolution(0), Some(res(1280, 1024, 1)));
        assert_eq!(InstrumentFamily::Wfs300.resolution(4), Some(res(320, 320, 1)));
        assert_eq!(InstrumentFamily::Wfs10.resolution(2), Some(res(360, 360, 1)));
        assert_eq!(InstrumentFamily::Wfs20.resolution(5), Some(res(720, 540, 2)));
        assert_eq!(InstrumentFamily::Wfs30.resolution(6), Some(res(968, 608, 2)));
        assert_eq!(InstrumentFamily::Wfs40.resolution(0), Some(res(2048, 2048, 1)));
        assert_eq!(InstrumentFamily::Wfs150.resolution(5), None);
        assert_eq!(InstrumentFamily::Wfs40.resolution(-1), None);
        for family in InstrumentFamily::BY_PREFIX {
            assert!(family
                .resolutions()
                .iter()
                .all(|r| r.x as usize <= CAM_MAX_PIX_X && r.y as usize <= CAM_MAX_PIX_Y));
        }
    }

    #[test]
    fn device_status_flags() {
        let status = DeviceStatus((DeviceStatus::CFG | DeviceStatus::PUD | DeviceStatus::PTL) as i32);
        assert!(status.contains(DeviceStatus::CFG));
        assert!(!status.contains(DeviceStatus::HSP));
        assert!(status.has_fault());
        let tags: Vec<_> = status.flags().map(|b| b.tag).collect();
        assert_eq!(tags, vec!["PTL", "CFG", "PUD"]);
        assert_eq!(status.to_string(), "0x000304 [PTL CFG PUD]");
        assert_eq!(WFS_DRIVER_STATUS.len(), 17);
    }

    #[test]
    fn enum_raw_values() {
        assert_eq!(PixelFormat::from_raw(0), Some(PixelFormat::Mono8));
        assert_eq!(TriggerMode::from_raw(3), Some(TriggerMode::Software));
        assert_eq!(TriggerMode::from_raw(4), None);
        assert_eq!(WavefrontType::Difference.raw(), 2);
        assert_eq!(WFS_REF_USER, 1);
        assert_eq!(SpotReferenceType::Absolute.raw(), 1);
    }
}
