//! User reference files and the undetected-spot sentinel.
//!
//! The driver reads and writes `.ref` files itself; this module only knows
//! where they live so that load/save calls can be logged against a path.

use std::path::{Path, PathBuf};

use crate::constants::InstrumentFamily;

/// Folder below the user's documents directory holding reference files.
pub const REFERENCE_DIR: [&str; 3] = ["Thorlabs", "Wavefront Sensor", "Reference"];

/// Centroid value the driver stores for a spot it could not detect.
pub const UNDETECTED: f32 = 0.0;

/// `Some(value)` unless `value` is the undetected-spot sentinel.
pub fn detected(value: f32) -> Option<f32> {
    (value != UNDETECTED).then_some(value)
}

/// Family part of a reference file name. WFS150 and WFS300 files carry the
/// bare `WFS` prefix.
pub fn reference_prefix(family: InstrumentFamily) -> &'static str {
    match family {
        InstrumentFamily::Wfs150 | InstrumentFamily::Wfs300 => "WFS",
        other => other.prefix(),
    }
}

/// `WFS[10|20|...]_<serial>_<mla>_<resolution>.ref`
pub fn reference_file_name(
    family: InstrumentFamily,
    serial: &str,
    mla_index: i32,
    resolution_index: i32,
) -> String {
    format!(
        "{}_{}_{mla_index}_{resolution_index}.ref",
        reference_prefix(family),
        serial.trim()
    )
}

/// Reference file for one sensor setup below the documents folder `base`.
pub fn user_reference_path_in(
    base: &Path,
    family: InstrumentFamily,
    serial: &str,
    mla_index: i32,
    resolution_index: i32,
) -> PathBuf {
    let mut path = base.to_path_buf();
    path.extend(REFERENCE_DIR);
    path.push(reference_file_name(family, serial, mla_index, resolution_index));
    path
}

/// Full path of the user reference file for one sensor setup, `None` when
/// the platform has no documents directory.
pub fn user_reference_path(
    family: InstrumentFamily,
    serial: &str,
    mla_index: i32,
    resolution_index: i32,
) -> Option<PathBuf> {
    let documents = dirs::document_dir()?;
    Some(user_reference_path_in(
        &documents,
        family,
        serial,
        mla_index,
        resolution_index,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_undetected() {
        assert_eq!(detected(0.0), None);
        assert_eq!(detected(12.5), Some(12.5));
        assert_eq!(detected(-0.25), Some(-0.25));
    }

    #[test]
    fn file_names_follow_family() {
        assert_eq!(
            reference_file_name(InstrumentFamily::Wfs20, "M00512345", 0, 5),
            "WFS20_M00512345_0_5.ref"
        );
        assert_eq!(
            reference_file_name(InstrumentFamily::Wfs10, " M0001 ", 1, 0),
            "WFS10_M0001_1_0.ref"
        );
        assert_eq!(
            reference_file_name(InstrumentFamily::Wfs150, "M00412345", 0, 0),
            "WFS_M00412345_0_0.ref"
        );
    }

    #[test]
    fn path_lives_under_reference_folder() {
        let documents = tempfile::tempdir().unwrap();
        let path = user_reference_path_in(documents.path(), InstrumentFamily::Wfs30, "S1", 0, 2);
        assert_eq!(
            path,
            documents
                .path()
                .join("Thorlabs")
                .join("Wavefront Sensor")
                .join("Reference")
                .join("WFS30_S1_0_2.ref")
        );
    }

    #[test]
    fn path_follows_documents_dir() {
        let expected = dirs::document_dir()
            .map(|d| user_reference_path_in(&d, InstrumentFamily::Wfs40, "S2", 1, 3));
        assert_eq!(
            user_reference_path(InstrumentFamily::Wfs40, "S2", 1, 3),
            expected
        );
    }
}
