//! Type marshaller between host values and the VISA wire types.
//!
//! Every value handed to the vendor library lives in a storage cell of known
//! width ([`ViCell`]), a fixed-capacity byte buffer ([`CharBuf`]) or a
//! zero-initialised numeric array ([`ViArray`]). The [`Vi`] factories build
//! those from loosely typed [`HostValue`]s and apply two failure policies:
//!
//! * scalar and `char(n)` factories soft-default (0, or 512 bytes) and log a
//!   warning on target `VI`; the vendor library rejects bad values itself;
//! * string and array factories fail hard, because their buffers are consumed
//!   by the vendor before any status could be returned.

use std::ffi::CString;
use std::fmt;

use tracing::warn;
use wfs_sys::{
    ViBoolean, ViInt16, ViInt32, ViObject, ViReal32, ViReal64, ViSession, ViStatus, ViUInt16,
    ViUInt32, ViUInt8,
};

use crate::error::{WfsError, WfsResult};

/// Capacity used by [`Vi::char`] when the requested size is unusable.
pub const DEFAULT_CHAR_CAPACITY: usize = 512;

// =============================================================================
// Host values
// =============================================================================

/// A value as supplied by a caller, before it is placed in a wire cell.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Int(i64),
    Real(f64),
    Bool(bool),
    Text(String),
    Bytes(Vec<u8>),
}

impl HostValue {
    /// Integer reading of the value; reals truncate toward zero.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            HostValue::Int(i) => Some(*i),
            HostValue::Real(r) if r.is_finite() => Some(r.trunc() as i64),
            HostValue::Real(_) => None,
            HostValue::Bool(b) => Some(i64::from(*b)),
            HostValue::Text(s) => s.trim().parse().ok(),
            HostValue::Bytes(b) => std::str::from_utf8(b).ok()?.trim().parse().ok(),
        }
    }

    /// Floating point reading of the value.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            HostValue::Int(i) => Some(*i as f64),
            HostValue::Real(r) => Some(*r),
            HostValue::Bool(b) => Some(f64::from(u8::from(*b))),
            HostValue::Text(s) => s.trim().parse().ok(),
            HostValue::Bytes(b) => std::str::from_utf8(b).ok()?.trim().parse().ok(),
        }
    }

    /// Boolean reading: `0`/`1`, `true`/`false` in any of their usual spellings.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            HostValue::Bool(b) => Some(*b),
            HostValue::Int(0) => Some(false),
            HostValue::Int(1) => Some(true),
            HostValue::Int(_) | HostValue::Real(_) => None,
            HostValue::Text(s) => parse_flag(s),
            HostValue::Bytes(b) => parse_flag(std::str::from_utf8(b).ok()?),
        }
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim() {
        "1" | "true" | "TRUE" | "True" => Some(true),
        "0" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

macro_rules! host_value_from {
    ($variant:ident <- $($ty:ty),*) => {
        $(
            impl From<$ty> for HostValue {
                fn from(v: $ty) -> Self {
                    HostValue::$variant(v.into())
                }
            }
        )*
    };
}

host_value_from!(Int <- i8, i16, i32, i64, u8, u16, u32);
host_value_from!(Real <- f32, f64);
host_value_from!(Bool <- bool);
host_value_from!(Text <- &str, String);
host_value_from!(Bytes <- &[u8], Vec<u8>);

impl From<usize> for HostValue {
    fn from(v: usize) -> Self {
        i64::try_from(v).map_or(HostValue::Real(v as f64), HostValue::Int)
    }
}

// =============================================================================
// Storage cells
// =============================================================================

/// Fixed-width storage slot whose address is handed to the vendor library.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(transparent)]
pub struct ViCell<T: Copy>(T);

impl<T: Copy> ViCell<T> {
    /// Width of the slot in bytes.
    pub const SIZE: usize = std::mem::size_of::<T>();

    pub const fn new(value: T) -> Self {
        Self(value)
    }

    /// Read-back of the stored value.
    pub fn value(&self) -> T {
        self.0
    }

    pub fn set(&mut self, value: T) {
        self.0 = value;
    }

    /// The slot itself, for output parameters.
    pub fn slot(&mut self) -> &mut T {
        &mut self.0
    }
}

/// Fixed-capacity byte buffer (`ViChar[n]`).
#[derive(Clone, PartialEq, Eq)]
pub struct CharBuf {
    bytes: Vec<u8>,
}

impl CharBuf {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: vec![0; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Contents up to the first NUL byte.
    pub fn value(&self) -> &[u8] {
        let end = self
            .bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.bytes.len());
        &self.bytes[..end]
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.value()).into_owned()
    }

    /// Replaces the contents; fails if `s` exceeds the capacity.
    pub fn assign(&mut self, s: &[u8]) -> WfsResult<()> {
        if s.len() > self.bytes.len() {
            return Err(WfsError::StringTooLong {
                len: s.len(),
                capacity: self.bytes.len(),
            });
        }
        self.bytes.fill(0);
        self.bytes[..s.len()].copy_from_slice(s);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    /// Whole buffer, for the vendor to fill.
    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// NUL-terminated copy for passing as an input string.
    pub fn to_c_string(&self) -> CString {
        CString::new(self.value()).unwrap_or_default()
    }
}

impl fmt::Debug for CharBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CharBuf[{}]({:?})", self.capacity(), self.to_string_lossy())
    }
}

/// Zero-initialised rank-1 or rank-2 array (`rows × columns`, row-major).
#[derive(Clone, PartialEq)]
pub struct ViArray<T> {
    data: Vec<T>,
    columns: usize,
    rows: usize,
    rank: u8,
}

impl<T: Copy + Default> ViArray<T> {
    pub fn zeroed_1d(len: usize) -> Self {
        Self {
            data: vec![T::default(); len],
            columns: len,
            rows: 1,
            rank: 1,
        }
    }

    pub fn zeroed_2d(columns: usize, rows: usize) -> Self {
        Self {
            data: vec![T::default(); columns * rows],
            columns,
            rows,
            rank: 2,
        }
    }

    pub fn rank(&self) -> u8 {
        self.rank
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn get(&self, row: usize, column: usize) -> Option<T> {
        if row >= self.rows || column >= self.columns {
            return None;
        }
        self.data.get(row * self.columns + column).copied()
    }

    pub fn row(&self, row: usize) -> Option<&[T]> {
        let start = row.checked_mul(self.columns)?;
        self.data.get(start..start + self.columns)
    }

    /// Rows of the valid prefix the vendor filled (`rows × columns`).
    pub fn active(&self, rows: usize, columns: usize) -> impl Iterator<Item = &[T]> + '_ {
        let columns = columns.min(self.columns);
        self.data
            .chunks(self.columns.max(1))
            .take(rows.min(self.rows))
            .map(move |row| &row[..columns])
    }

    /// Copies as much of `src` as fits; returns the number of elements copied.
    pub fn copy_from(&mut self, src: &[T]) -> usize {
        let n = src.len().min(self.data.len());
        self.data[..n].copy_from_slice(&src[..n]);
        n
    }

    pub fn reset(&mut self) {
        self.data.fill(T::default());
    }
}

impl<T> fmt::Debug for ViArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rank == 1 {
            write!(f, "ViArray[{}]", self.columns)
        } else {
            write!(f, "ViArray[{}x{}]", self.rows, self.columns)
        }
    }
}

// =============================================================================
// Factories
// =============================================================================

/// Factories for the wire types of the WFS driver ABI.
pub struct Vi;

impl Vi {
    pub const TRUE: ViBoolean = wfs_sys::VI_TRUE;
    pub const FALSE: ViBoolean = wfs_sys::VI_FALSE;
    pub const NULL: ViSession = wfs_sys::VI_NULL;

    pub fn uint8(n: impl Into<HostValue>) -> ViCell<ViUInt8> {
        ViCell::new(integer("uint8", n.into()))
    }

    pub fn int16(n: impl Into<HostValue>) -> ViCell<ViInt16> {
        ViCell::new(integer("int16", n.into()))
    }

    pub fn uint16(n: impl Into<HostValue>) -> ViCell<ViUInt16> {
        ViCell::new(integer("uint16", n.into()))
    }

    pub fn int32(n: impl Into<HostValue>) -> ViCell<ViInt32> {
        ViCell::new(integer("int32", n.into()))
    }

    pub fn uint32(n: impl Into<HostValue>) -> ViCell<ViUInt32> {
        ViCell::new(integer("uint32", n.into()))
    }

    pub fn real64(n: impl Into<HostValue>) -> ViCell<ViReal64> {
        let value = n.into();
        ViCell::new(soft_default("real64", &value, value.as_real()))
    }

    pub fn real32(n: impl Into<HostValue>) -> ViCell<ViReal32> {
        let value = n.into();
        ViCell::new(soft_default("real32", &value, value.as_real()) as ViReal32)
    }

    /// `ViBoolean` (uint16): accepts 0/1 and true/false spellings.
    pub fn boolean(n: impl Into<HostValue>) -> ViCell<ViBoolean> {
        let value = n.into();
        let flag = value.as_flag().map(ViBoolean::from);
        ViCell::new(soft_default("boolean", &value, flag))
    }

    pub fn object(n: impl Into<HostValue>) -> ViCell<ViObject> {
        ViCell::new(integer("object", n.into()))
    }

    pub fn session(n: impl Into<HostValue>) -> ViCell<ViSession> {
        ViCell::new(integer("session", n.into()))
    }

    pub fn status(n: impl Into<HostValue>) -> ViCell<ViStatus> {
        ViCell::new(integer("status", n.into()))
    }

    /// Byte buffer of capacity `n`; unusable sizes fall back to 512.
    pub fn char(n: impl Into<HostValue>) -> CharBuf {
        let value = n.into();
        let capacity = value
            .as_integer()
            .and_then(|n| usize::try_from(n).ok());
        match capacity {
            Some(n) => CharBuf::with_capacity(n),
            None => {
                warn!(target: "VI", kind = "char", input = ?value, "not a size, using {DEFAULT_CHAR_CAPACITY}");
                CharBuf::with_capacity(DEFAULT_CHAR_CAPACITY)
            }
        }
    }

    /// Byte buffer of capacity `n` holding `s`.
    pub fn string(n: impl Into<HostValue>, s: &[u8]) -> WfsResult<CharBuf> {
        let mut buf = Vi::char(n);
        if let Err(err) = buf.assign(s) {
            warn!(target: "VI", kind = "string", len = s.len(), capacity = buf.capacity(), "rejected");
            return Err(err);
        }
        Ok(buf)
    }

    /// Resource name: a [`Vi::string`] that also takes text.
    pub fn rsrc(n: impl Into<HostValue>, s: impl AsRef<[u8]>) -> WfsResult<CharBuf> {
        Vi::string(n, s.as_ref())
    }

    /// `uint8` array of `x` columns (and `y` rows when given).
    pub fn array_uint8<X: Into<HostValue>>(x: X, y: Option<X>) -> WfsResult<ViArray<ViUInt8>> {
        array(x.into(), y.map(Into::into))
    }

    /// `float32` array of `x` columns (and `y` rows when given).
    pub fn array_float<X: Into<HostValue>>(x: X, y: Option<X>) -> WfsResult<ViArray<ViReal32>> {
        array(x.into(), y.map(Into::into))
    }
}

fn integer<T>(kind: &'static str, value: HostValue) -> T
where
    T: TryFrom<i64> + Default,
{
    let converted = value.as_integer().and_then(|i| T::try_from(i).ok());
    soft_default(kind, &value, converted)
}

fn soft_default<T: Default>(kind: &'static str, input: &HostValue, converted: Option<T>) -> T {
    converted.unwrap_or_else(|| {
        warn!(target: "VI", kind, input = ?input, "not convertible, defaulting to 0");
        T::default()
    })
}

fn dimension(value: &HostValue) -> WfsResult<usize> {
    value
        .as_integer()
        .and_then(|n| usize::try_from(n).ok())
        .filter(|&n| n > 0)
        .ok_or_else(|| {
            warn!(target: "VI", kind = "array", input = ?value, "not a dimension");
            WfsError::NotANumber(format!("{value:?} is not a positive array dimension"))
        })
}

fn array<T: Copy + Default>(x: HostValue, y: Option<HostValue>) -> WfsResult<ViArray<T>> {
    let columns = dimension(&x)?;
    match y {
        Some(y) => Ok(ViArray::zeroed_2d(columns, dimension(&y)?)),
        None => Ok(ViArray::zeroed_1d(columns)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn integer_cells_round_trip() {
        assert_eq!(Vi::uint8(0).value(), 0);
        assert_eq!(Vi::uint8(255).value(), 255);
        assert_eq!(Vi::int16(i16::MIN).value(), i16::MIN);
        assert_eq!(Vi::int16(i16::MAX).value(), i16::MAX);
        assert_eq!(Vi::uint16(u16::MAX).value(), u16::MAX);
        assert_eq!(Vi::int32(i32::MIN).value(), i32::MIN);
        assert_eq!(Vi::uint32(u32::MAX).value(), u32::MAX);
        assert_eq!(Vi::object(7u32).value(), 7);
        assert_eq!(Vi::session(Vi::NULL).value(), 0);
        assert_eq!(Vi::status(-1074001664).value(), -1074001664);
        assert_eq!(Vi::real64(1234.5).value(), 1234.5);
        assert_eq!(ViCell::<ViReal64>::SIZE, 8);
        assert_eq!(ViCell::<ViInt16>::SIZE, 2);
    }

    #[test]
    fn numeric_text_converts() {
        assert_eq!(Vi::int32("42").value(), 42);
        assert_eq!(Vi::real64(" 5.4 ").value(), 5.4);
        assert_eq!(Vi::int32(3.9).value(), 3);
    }

    #[test]
    #[traced_test]
    fn non_numeric_scalars_soft_default() {
        assert_eq!(Vi::uint8("").value(), 0);
        assert_eq!(Vi::int16("abc").value(), 0);
        assert_eq!(Vi::uint16("").value(), 0);
        assert_eq!(Vi::int32("").value(), 0);
        assert_eq!(Vi::uint32("").value(), 0);
        assert_eq!(Vi::real64("").value(), 0.0);
        assert_eq!(Vi::session("").value(), 0);
        assert_eq!(Vi::status("").value(), 0);
        assert!(logs_contain("defaulting to 0"));
    }

    #[test]
    fn out_of_range_integers_soft_default() {
        assert_eq!(Vi::uint8(256).value(), 0);
        assert_eq!(Vi::uint32(-1).value(), 0);
    }

    #[test]
    fn boolean_spellings() {
        for t in [
            Vi::boolean(true),
            Vi::boolean(1),
            Vi::boolean("TRUE"),
            Vi::boolean("true"),
            Vi::boolean(Vi::TRUE),
        ] {
            assert_eq!(t.value(), 1);
        }
        for f in [
            Vi::boolean(false),
            Vi::boolean(0),
            Vi::boolean("FALSE"),
            Vi::boolean("false"),
            Vi::boolean(Vi::FALSE),
        ] {
            assert_eq!(f.value(), 0);
        }
        assert_eq!(Vi::boolean("").value(), 0);
        assert_eq!(Vi::boolean(5).value(), 0);
    }

    #[test]
    fn char_defaults_to_512() {
        assert_eq!(Vi::char(255).capacity(), 255);
        let default = Vi::char("");
        assert_eq!(default.capacity(), DEFAULT_CHAR_CAPACITY);
        assert_eq!(default.value(), b"");
        assert_eq!(Vi::char(-1).capacity(), DEFAULT_CHAR_CAPACITY);
    }

    #[test]
    fn string_and_rsrc_hold_their_value() {
        let s = b"abcdefghijklmnopqrstuvwxyz1234567890";
        assert_eq!(Vi::string(255, s).unwrap().value(), s);
        assert_eq!(Vi::rsrc(255, s).unwrap().value(), s);
        assert_eq!(
            Vi::rsrc(255, "abcdefghijklmnopqrstuvwxyz1234567890")
                .unwrap()
                .value(),
            s
        );
        assert_eq!(Vi::string(3, b"abc").unwrap().value(), b"abc");
    }

    #[test]
    fn overlong_strings_fail() {
        assert!(matches!(
            Vi::rsrc(0, b"1"),
            Err(WfsError::StringTooLong { len: 1, capacity: 0 })
        ));
        assert!(matches!(
            Vi::rsrc(1, b"12"),
            Err(WfsError::StringTooLong { len: 2, capacity: 1 })
        ));
        assert!(matches!(
            Vi::rsrc("", [b'1'; 513]),
            Err(WfsError::StringTooLong { len: 513, .. })
        ));
    }

    #[test]
    fn arrays_are_zeroed_with_requested_shape() {
        let a = Vi::array_uint8(255, None).unwrap();
        assert_eq!((a.rank(), a.len()), (1, 255));
        assert!(a.as_slice().iter().all(|&v| v == 0));

        let b = Vi::array_float(80, Some(40)).unwrap();
        assert_eq!((b.rank(), b.columns(), b.rows()), (2, 80, 40));
        assert_eq!(b.get(39, 79), Some(0.0));
        assert_eq!(b.get(40, 0), None);
    }

    #[test]
    fn array_dimensions_must_be_numbers() {
        assert!(matches!(
            Vi::array_uint8("", None),
            Err(WfsError::NotANumber(_))
        ));
        assert!(matches!(
            Vi::array_float(HostValue::from(2), Some(HostValue::from("rows"))),
            Err(WfsError::NotANumber(_))
        ));
    }

    #[test]
    fn active_extent_iterates_prefix() {
        let mut a = Vi::array_float(4, Some(3)).unwrap();
        a.as_mut_slice()
            .iter_mut()
            .enumerate()
            .for_each(|(i, v)| *v = i as f32);
        let rows: Vec<Vec<f32>> = a.active(2, 2).map(<[f32]>::to_vec).collect();
        assert_eq!(rows, vec![vec![0.0, 1.0], vec![4.0, 5.0]]);
    }
}
