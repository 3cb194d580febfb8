use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::Validator;

/// The closed set of types a flag may have.
///
/// The textual names returned by [`FlagKind::type_name`] are the ones shown
/// in help output and error messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FlagKind {
    Bool,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Double,
    String,
}

impl FlagKind {
    pub const ALL: [FlagKind; 7] = [
        FlagKind::Bool,
        FlagKind::Int32,
        FlagKind::Uint32,
        FlagKind::Int64,
        FlagKind::Uint64,
        FlagKind::Double,
        FlagKind::String,
    ];

    pub fn type_name(self) -> &'static str {
        match self {
            FlagKind::Bool => "bool",
            FlagKind::Int32 => "int32",
            FlagKind::Uint32 => "uint32",
            FlagKind::Int64 => "int64",
            FlagKind::Uint64 => "uint64",
            FlagKind::Double => "double",
            FlagKind::String => "string",
        }
    }

    /// Looks a kind up by its textual type name.
    pub fn from_type_name(name: &str) -> Option<FlagKind> {
        Self::ALL.into_iter().find(|kind| kind.type_name() == name)
    }

    /// Returns the zero (or empty) value of this kind.
    pub fn zero_value(self) -> FlagValue {
        match self {
            FlagKind::Bool => FlagValue::Bool(false),
            FlagKind::Int32 => FlagValue::Int32(0),
            FlagKind::Uint32 => FlagValue::Uint32(0),
            FlagKind::Int64 => FlagValue::Int64(0),
            FlagKind::Uint64 => FlagValue::Uint64(0),
            FlagKind::Double => FlagValue::Double(0.0),
            FlagKind::String => FlagValue::String(String::new()),
        }
    }

    /// Parses `text` as a value of this kind.
    ///
    /// The whole token has to be consumed, and integers have to fit the
    /// kind's width. A leading `0x`/`0X` selects base 16; a leading `0`
    /// alone does not select octal.
    pub fn parse(self, text: &str) -> Option<FlagValue> {
        match self {
            FlagKind::Bool => parse_bool(text).map(FlagValue::Bool),
            FlagKind::String => Some(FlagValue::String(text.to_string())),
            FlagKind::Int32 => parse_signed(text)
                .and_then(|value| i32::try_from(value).ok())
                .map(FlagValue::Int32),
            FlagKind::Uint32 => parse_unsigned(text)
                .and_then(|value| u32::try_from(value).ok())
                .map(FlagValue::Uint32),
            FlagKind::Int64 => parse_signed(text).map(FlagValue::Int64),
            FlagKind::Uint64 => parse_unsigned(text).map(FlagValue::Uint64),
            FlagKind::Double => parse_double(text).map(FlagValue::Double),
        }
    }
}

impl fmt::Display for FlagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// The value of one flag, tagged with its kind.
///
/// A value never changes kind: [`FlagValue::parse_from`] and
/// [`FlagValue::copy_from`] keep the tag and only replace the payload.
///
/// # Examples
///
/// ```
/// use cmdflags::{FlagKind, FlagValue};
///
/// let mut value = FlagKind::Int32.zero_value();
/// assert!(value.parse_from("0x10"));
/// assert_eq!(value, FlagValue::Int32(16));
/// assert_eq!(value.to_string(), "16");
///
/// // Out of range for a 32-bit flag, so the value is left alone.
/// assert!(!value.parse_from("99999999999"));
/// assert_eq!(value, FlagValue::Int32(16));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum FlagValue {
    Bool(bool),
    Int32(i32),
    Uint32(u32),
    Int64(i64),
    Uint64(u64),
    Double(f64),
    String(String),
}

impl FlagValue {
    pub fn kind(&self) -> FlagKind {
        match self {
            FlagValue::Bool(_) => FlagKind::Bool,
            FlagValue::Int32(_) => FlagKind::Int32,
            FlagValue::Uint32(_) => FlagKind::Uint32,
            FlagValue::Int64(_) => FlagKind::Int64,
            FlagValue::Uint64(_) => FlagKind::Uint64,
            FlagValue::Double(_) => FlagKind::Double,
            FlagValue::String(_) => FlagKind::String,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind().type_name()
    }

    /// Replaces the payload with the parse of `text`.
    ///
    /// Returns `false`, leaving the value untouched, if `text` is not a
    /// legal value for this kind.
    pub fn parse_from(&mut self, text: &str) -> bool {
        match self.kind().parse(text) {
            Some(parsed) => {
                *self = parsed;
                true
            }
            None => false,
        }
    }

    /// A fresh zero value of the same kind.
    pub fn new_default(&self) -> FlagValue {
        self.kind().zero_value()
    }

    /// Copies the payload of `other`. Returns `false` if the kinds differ.
    pub fn copy_from(&mut self, other: &FlagValue) -> bool {
        if self.kind() != other.kind() {
            return false;
        }
        self.clone_from(other);
        true
    }

    /// Runs `validator` against this value.
    ///
    /// A validator written for a different kind never accepts the value.
    pub fn validate(&self, flag_name: &str, validator: &Validator) -> bool {
        match (self, validator) {
            (FlagValue::Bool(value), Validator::Bool(f)) => f(flag_name, *value),
            (FlagValue::Int32(value), Validator::Int32(f)) => f(flag_name, *value),
            (FlagValue::Uint32(value), Validator::Uint32(f)) => f(flag_name, *value),
            (FlagValue::Int64(value), Validator::Int64(f)) => f(flag_name, *value),
            (FlagValue::Uint64(value), Validator::Uint64(f)) => f(flag_name, *value),
            (FlagValue::Double(value), Validator::Double(f)) => f(flag_name, *value),
            (FlagValue::String(value), Validator::String(f)) => f(flag_name, value),
            _ => false,
        }
    }
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagValue::Bool(value) => f.write_str(if *value { "true" } else { "false" }),
            FlagValue::Int32(value) => write!(f, "{value}"),
            FlagValue::Uint32(value) => write!(f, "{value}"),
            FlagValue::Int64(value) => write!(f, "{value}"),
            FlagValue::Uint64(value) => write!(f, "{value}"),
            FlagValue::Double(value) => f.write_str(&format_double(*value)),
            FlagValue::String(value) => f.write_str(value),
        }
    }
}

const TRUE_SPELLINGS: [&str; 5] = ["1", "t", "true", "y", "yes"];
const FALSE_SPELLINGS: [&str; 5] = ["0", "f", "false", "n", "no"];

fn parse_bool(text: &str) -> Option<bool> {
    if TRUE_SPELLINGS.iter().any(|s| s.eq_ignore_ascii_case(text)) {
        Some(true)
    } else if FALSE_SPELLINGS.iter().any(|s| s.eq_ignore_ascii_case(text)) {
        Some(false)
    } else {
        None
    }
}

// Same set as C's isspace() in the "C" locale.
fn is_c_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0b' | '\x0c' | '\r')
}

/// Splits an integer token into (negative, magnitude).
fn parse_magnitude(text: &str) -> Option<(bool, u64)> {
    let radix = if text.starts_with("0x") || text.starts_with("0X") {
        16
    } else {
        10
    };
    let rest = text.trim_start_matches(is_c_space);
    let (negative, rest) = match rest.as_bytes().first() {
        Some(b'-') => (true, &rest[1..]),
        Some(b'+') => (false, &rest[1..]),
        _ => (false, rest),
    };
    let digits = if radix == 16 {
        rest.strip_prefix("0x")
            .or_else(|| rest.strip_prefix("0X"))
            .unwrap_or(rest)
    } else {
        rest
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    u64::from_str_radix(digits, radix)
        .ok()
        .map(|magnitude| (negative, magnitude))
}

fn parse_signed(text: &str) -> Option<i64> {
    let (negative, magnitude) = parse_magnitude(text)?;
    if negative {
        0i64.checked_sub_unsigned(magnitude)
    } else {
        i64::try_from(magnitude).ok()
    }
}

fn parse_unsigned(text: &str) -> Option<u64> {
    // A negative number would otherwise wrap around to a huge value.
    if text.trim_start_matches(is_c_space).starts_with('-') {
        return None;
    }
    match parse_magnitude(text)? {
        (false, magnitude) => Some(magnitude),
        (true, _) => None,
    }
}

fn parse_double(text: &str) -> Option<f64> {
    let trimmed = text.trim_start_matches(is_c_space);
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

/// Formats like C's `%.17g`, which is enough digits to round-trip any f64.
fn format_double(value: f64) -> String {
    const PRECISION: i32 = 17;

    if value.is_nan() {
        return if value.is_sign_negative() { "-nan" } else { "nan" }.to_string();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-inf" } else { "inf" }.to_string();
    }

    let scientific = format!("{:.*e}", (PRECISION - 1) as usize, value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if (-4..PRECISION).contains(&exponent) {
        let fixed = format!("{:.*}", (PRECISION - 1 - exponent) as usize, value);
        strip_fraction_zeros(&fixed).to_string()
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            strip_fraction_zeros(mantissa),
            sign,
            exponent.abs()
        )
    }
}

fn strip_fraction_zeros(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

/// Shared backing cell for a flag's current value.
///
/// A declared flag and the registry record for it hold the same cell, so a
/// write through either side is visible to the other. The cell's address is
/// stable for its whole lifetime and keys the registry's secondary index.
#[derive(Clone, Debug)]
pub struct FlagStorage(Arc<RwLock<FlagValue>>);

impl FlagStorage {
    pub fn new(value: FlagValue) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, FlagValue> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, FlagValue> {
        self.0.write()
    }

    /// The address of the backing cell.
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub fn kind(&self) -> FlagKind {
        self.read().kind()
    }
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for bool {}
    impl Sealed for i32 {}
    impl Sealed for u32 {}
    impl Sealed for i64 {}
    impl Sealed for u64 {}
    impl Sealed for f64 {}
    impl Sealed for String {}
}

/// Rust types that can back a flag.
///
/// Implemented for `bool`, `i32`, `u32`, `i64`, `u64`, `f64` and `String`
/// only.
pub trait FlagType: sealed::Sealed + Sized + 'static {
    const KIND: FlagKind;

    /// Signature of a validator for flags of this type.
    type ValidateFn: Copy;

    fn into_value(self) -> FlagValue;

    fn from_value(value: &FlagValue) -> Option<Self>;

    fn validator(f: Self::ValidateFn) -> Validator;
}

macro_rules! impl_flag_type {
    ($ty:ty, $variant:ident) => {
        impl FlagType for $ty {
            const KIND: FlagKind = FlagKind::$variant;
            type ValidateFn = fn(&str, $ty) -> bool;

            fn into_value(self) -> FlagValue {
                FlagValue::$variant(self)
            }

            fn from_value(value: &FlagValue) -> Option<Self> {
                match value {
                    FlagValue::$variant(v) => Some(*v),
                    _ => None,
                }
            }

            fn validator(f: Self::ValidateFn) -> Validator {
                Validator::$variant(f)
            }
        }
    };
}

impl_flag_type!(bool, Bool);
impl_flag_type!(i32, Int32);
impl_flag_type!(u32, Uint32);
impl_flag_type!(i64, Int64);
impl_flag_type!(u64, Uint64);
impl_flag_type!(f64, Double);

impl FlagType for String {
    const KIND: FlagKind = FlagKind::String;
    type ValidateFn = fn(&str, &str) -> bool;

    fn into_value(self) -> FlagValue {
        FlagValue::String(self)
    }

    fn from_value(value: &FlagValue) -> Option<Self> {
        match value {
            FlagValue::String(v) => Some(v.clone()),
            _ => None,
        }
    }

    fn validator(f: Self::ValidateFn) -> Validator {
        Validator::String(f)
    }
}
