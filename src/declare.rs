use std::fmt;
use std::marker::PhantomData;
use std::sync::OnceLock;

use crate::{FlagStorage, FlagType, FlagValue};

/// Help text used instead of the real one when the `strip-help` feature is
/// enabled.
pub const STRIPPED_FLAG_HELP: &str = "\u{1}\u{2}\u{3}\u{4} (unknown) \u{4}\u{3}\u{2}\u{1}";

/// Passes `help` through, or replaces it when help text is stripped.
#[doc(hidden)]
pub const fn flag_help(help: &'static str) -> &'static str {
    if cfg!(feature = "strip-help") {
        STRIPPED_FLAG_HELP
    } else {
        help
    }
}

/// The static part of a declared flag.
///
/// Built at compile time by the `define_*!` macros. The current value is
/// allocated on first use from the default function, so a default may depend
/// on the environment.
pub struct FlagDef {
    name: &'static str,
    help: &'static str,
    file: &'static str,
    default: fn() -> FlagValue,
    storage: OnceLock<FlagStorage>,
}

impl FlagDef {
    pub const fn new(
        name: &'static str,
        help: &'static str,
        file: &'static str,
        default: fn() -> FlagValue,
    ) -> Self {
        Self {
            name,
            help,
            file,
            default,
            storage: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn help(&self) -> &'static str {
        self.help
    }

    pub fn file(&self) -> &'static str {
        self.file
    }

    /// A freshly computed default value.
    pub fn default_value(&self) -> FlagValue {
        (self.default)()
    }

    /// The current-value cell, shared with the registry record.
    pub fn storage(&self) -> &FlagStorage {
        self.storage
            .get_or_init(|| FlagStorage::new(self.default_value()))
    }
}

impl fmt::Debug for FlagDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlagDef")
            .field("name", &self.name)
            .field("file", &self.file)
            .field("storage", &self.storage.get())
            .finish()
    }
}

/// Typed handle to a declared flag: the `FLAGS_<name>` static.
///
/// Reading and writing through the handle touches the flag's value
/// directly, without going through the registry. The registry notices such
/// writes the next time it inspects the flag.
pub struct Flag<T: FlagType> {
    pub def: FlagDef,
    _type: PhantomData<fn() -> T>,
}

impl<T: FlagType> Flag<T> {
    pub const fn new(
        name: &'static str,
        help: &'static str,
        file: &'static str,
        default: fn() -> FlagValue,
    ) -> Self {
        Self {
            def: FlagDef::new(name, help, file, default),
            _type: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.def.name()
    }

    pub fn storage(&self) -> &FlagStorage {
        self.def.storage()
    }

    /// The current value.
    pub fn get(&self) -> T {
        let value = self.storage().read();
        match T::from_value(&value) {
            Some(value) => value,
            None => unreachable!("flag '{}' holds a {} value", self.name(), value.type_name()),
        }
    }

    /// Overwrites the current value.
    pub fn set(&self, value: T) {
        *self.storage().write() = value.into_value();
    }

    /// The value the flag was declared with.
    pub fn declared_default(&self) -> T {
        match T::from_value(&self.def.default_value()) {
            Some(value) => value,
            None => unreachable!("flag '{}' has a default of the wrong type", self.name()),
        }
    }
}

impl<T: FlagType> fmt::Debug for Flag<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flag")
            .field("name", &self.name())
            .field("kind", &T::KIND)
            .finish()
    }
}

/// Link-time registration of a declared flag.
#[derive(Debug)]
pub struct FlagReg(pub &'static FlagDef);

inventory::collect!(FlagReg);

#[doc(hidden)]
#[macro_export]
macro_rules! __define_flag {
    ($ty:ty, $variant:ident, $name:ident, $default:expr, $help:expr) => {
        $crate::__private::paste::paste! {
            #[allow(non_upper_case_globals)]
            pub static [<FLAGS_ $name>]: $crate::Flag<$ty> = $crate::Flag::new(
                stringify!($name),
                $crate::flag_help($help),
                file!(),
                {
                    fn [<__flags_default_ $name>]() -> $crate::FlagValue {
                        $crate::FlagValue::$variant($default)
                    }
                    [<__flags_default_ $name>]
                },
            );

            $crate::__private::inventory::submit! {
                $crate::FlagReg(&[<FLAGS_ $name>].def)
            }
        }
    };
}

/// Declares a boolean flag as `FLAGS_<name>`.
///
/// # Examples
///
/// ```
/// use cmdflags::define_bool;
///
/// define_bool!(dry_run, false, "print what would be done");
///
/// assert!(!FLAGS_dry_run.get());
/// ```
#[macro_export]
macro_rules! define_bool {
    ($name:ident, $default:expr, $help:expr $(,)?) => {
        $crate::__define_flag!(bool, Bool, $name, $default, $help);
    };
}

/// Declares an `i32` flag as `FLAGS_<name>`.
#[macro_export]
macro_rules! define_int32 {
    ($name:ident, $default:expr, $help:expr $(,)?) => {
        $crate::__define_flag!(i32, Int32, $name, $default, $help);
    };
}

/// Declares a `u32` flag as `FLAGS_<name>`.
#[macro_export]
macro_rules! define_uint32 {
    ($name:ident, $default:expr, $help:expr $(,)?) => {
        $crate::__define_flag!(u32, Uint32, $name, $default, $help);
    };
}

/// Declares an `i64` flag as `FLAGS_<name>`.
#[macro_export]
macro_rules! define_int64 {
    ($name:ident, $default:expr, $help:expr $(,)?) => {
        $crate::__define_flag!(i64, Int64, $name, $default, $help);
    };
}

/// Declares a `u64` flag as `FLAGS_<name>`.
#[macro_export]
macro_rules! define_uint64 {
    ($name:ident, $default:expr, $help:expr $(,)?) => {
        $crate::__define_flag!(u64, Uint64, $name, $default, $help);
    };
}

/// Declares an `f64` flag as `FLAGS_<name>`.
#[macro_export]
macro_rules! define_double {
    ($name:ident, $default:expr, $help:expr $(,)?) => {
        $crate::__define_flag!(f64, Double, $name, $default, $help);
    };
}

/// Declares a string flag as `FLAGS_<name>`.
///
/// The default may be anything convertible into a `String`.
///
/// # Examples
///
/// ```
/// use cmdflags::define_string;
///
/// define_string!(greeting, "hello", "what to say");
///
/// assert_eq!(FLAGS_greeting.get(), "hello");
/// FLAGS_greeting.set("bonjour".to_string());
/// assert_eq!(FLAGS_greeting.get(), "bonjour");
/// ```
#[macro_export]
macro_rules! define_string {
    ($name:ident, $default:expr, $help:expr $(,)?) => {
        $crate::__define_flag!(
            ::std::string::String,
            String,
            $name,
            ::std::string::String::from($default),
            $help
        );
    };
}

const FLAGFILE_HELP: &str = "load flags from file";
const FROMENV_HELP: &str = "set flags from the environment [use 'export FLAGS_flag1=value']";
const TRYFROMENV_HELP: &str = "set flags from the environment if present";
const UNDEFOK_HELP: &str = "comma-separated list of flag names that it is okay to specify on the \
    command line even if the program does not define a flag with that name.  IMPORTANT: flags \
    in this list that have arguments MUST use the flag=value format";

/// Names and help texts of the directive flags.
pub(crate) const DIRECTIVE_FLAG_HELP: [(&str, &str); 4] = [
    ("flagfile", FLAGFILE_HELP),
    ("fromenv", FROMENV_HELP),
    ("tryfromenv", TRYFROMENV_HELP),
    ("undefok", UNDEFOK_HELP),
];

fn empty_string() -> FlagValue {
    FlagValue::String(String::new())
}

// The directive flags are registered explicitly by the global registry,
// ahead of the flags collected at link time.
#[allow(non_upper_case_globals)]
pub static FLAGS_flagfile: Flag<String> =
    Flag::new("flagfile", flag_help(FLAGFILE_HELP), file!(), empty_string);
#[allow(non_upper_case_globals)]
pub static FLAGS_fromenv: Flag<String> =
    Flag::new("fromenv", flag_help(FROMENV_HELP), file!(), empty_string);
#[allow(non_upper_case_globals)]
pub static FLAGS_tryfromenv: Flag<String> =
    Flag::new("tryfromenv", flag_help(TRYFROMENV_HELP), file!(), empty_string);
#[allow(non_upper_case_globals)]
pub static FLAGS_undefok: Flag<String> =
    Flag::new("undefok", flag_help(UNDEFOK_HELP), file!(), empty_string);

pub(crate) fn directive_flags() -> [&'static FlagDef; 4] {
    [
        &FLAGS_flagfile.def,
        &FLAGS_fromenv.def,
        &FLAGS_tryfromenv.def,
        &FLAGS_undefok.def,
    ]
}
