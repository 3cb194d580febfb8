use std::fmt;

use crate::{Flag, FlagKind, FlagType, global_registry};

/// A validation function attached to a flag.
///
/// Each variant carries the signature for one flag type. The validator is
/// called with the flag's name and the candidate value, and accepts the
/// value by returning `true`.
#[derive(Clone, Copy)]
pub enum Validator {
    Bool(fn(&str, bool) -> bool),
    Int32(fn(&str, i32) -> bool),
    Uint32(fn(&str, u32) -> bool),
    Int64(fn(&str, i64) -> bool),
    Uint64(fn(&str, u64) -> bool),
    Double(fn(&str, f64) -> bool),
    String(fn(&str, &str) -> bool),
}

impl Validator {
    pub fn kind(&self) -> FlagKind {
        match self {
            Validator::Bool(_) => FlagKind::Bool,
            Validator::Int32(_) => FlagKind::Int32,
            Validator::Uint32(_) => FlagKind::Uint32,
            Validator::Int64(_) => FlagKind::Int64,
            Validator::Uint64(_) => FlagKind::Uint64,
            Validator::Double(_) => FlagKind::Double,
            Validator::String(_) => FlagKind::String,
        }
    }

    fn fn_addr(&self) -> usize {
        match *self {
            Validator::Bool(f) => f as usize,
            Validator::Int32(f) => f as usize,
            Validator::Uint32(f) => f as usize,
            Validator::Int64(f) => f as usize,
            Validator::Uint64(f) => f as usize,
            Validator::Double(f) => f as usize,
            Validator::String(f) => f as usize,
        }
    }

    /// Whether both validators are the same function.
    pub fn same_fn(&self, other: &Validator) -> bool {
        self.kind() == other.kind() && self.fn_addr() == other.fn_addr()
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validator::{}({:#x})", self.kind(), self.fn_addr())
    }
}

/// Attaches `validate_fn` to a declared flag in the global registry.
///
/// Every later assignment of the flag, including the ones made while parsing
/// argv, is checked with the function. Returns `false` if the flag already has
/// a different validator (only one is allowed per flag) or is not registered.
/// Registering the same function again is accepted.
///
/// # Examples
///
/// ```
/// use cmdflags::{define_int32, register_flag_validator};
///
/// define_int32!(validated_port, 8080, "port to listen on");
///
/// fn valid_port(_name: &str, port: i32) -> bool {
///     (1..65536).contains(&port)
/// }
///
/// assert!(register_flag_validator(&FLAGS_validated_port, valid_port));
/// assert!(register_flag_validator(&FLAGS_validated_port, valid_port));
/// ```
pub fn register_flag_validator<T: FlagType>(flag: &Flag<T>, validate_fn: T::ValidateFn) -> bool {
    global_registry().add_flag_validator(flag.storage().addr(), Some(T::validator(validate_fn)))
}

/// Removes any validator from a declared flag in the global registry.
pub fn clear_flag_validator<T: FlagType>(flag: &Flag<T>) -> bool {
    global_registry().add_flag_validator(flag.storage().addr(), None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FlagValue;

    fn positive(_: &str, value: i32) -> bool {
        value > 0
    }

    fn negative(_: &str, value: i32) -> bool {
        value < 0
    }

    fn not_empty(_: &str, value: &str) -> bool {
        !value.is_empty()
    }

    #[test]
    fn test_same_fn() {
        let a = Validator::Int32(positive);
        assert!(a.same_fn(&Validator::Int32(positive)));
        assert!(!a.same_fn(&Validator::Int32(negative)));
        assert!(!a.same_fn(&Validator::String(not_empty)));
    }

    #[test]
    fn test_validate_dispatch() {
        let validator = Validator::Int32(positive);
        assert!(FlagValue::Int32(3).validate("n", &validator));
        assert!(!FlagValue::Int32(-3).validate("n", &validator));
        // Kind mismatch never validates.
        assert!(!FlagValue::Int64(3).validate("n", &validator));

        let validator = Validator::String(not_empty);
        assert!(FlagValue::String("x".to_string()).validate("s", &validator));
        assert!(!FlagValue::String(String::new()).validate("s", &validator));
    }
}
