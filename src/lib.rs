//! Command-line flags: typed configuration variables declared anywhere in a
//! program and set from argv, flag files and the environment.
//!
//! Each flag is a `FLAGS_<name>` static created by one of the `define_*!`
//! macros. Every declared flag, in any crate linked into the program, is
//! registered in a global [`FlagRegistry`] the first time the registry is
//! used. [`parse_command_line_flags`] then resolves the program's argv
//! against it.
//!
//! # Basic Usage
//!
//! ```rust
//! use cmdflags::{define_bool, define_string, parse_flags_with_registry, global_registry};
//!
//! define_bool!(lib_example_verbose, false, "print more output");
//! define_string!(lib_example_name, "world", "who to greet");
//!
//! let mut args: Vec<String> = ["greet", "--lib_example_verbose", "--lib_example_name=flags", "extra"]
//!     .iter()
//!     .map(|s| s.to_string())
//!     .collect();
//! let remaining = parse_flags_with_registry(&global_registry(), &mut args, true).unwrap();
//!
//! assert_eq!(remaining, 2);
//! assert_eq!(args, ["greet", "extra"]);
//! assert!(FLAGS_lib_example_verbose.get());
//! assert_eq!(FLAGS_lib_example_name.get(), "flags");
//! ```
//!
//! # Accepted Syntax
//!
//! ```text
//! --name          boolean flag, set to true
//! --noname        boolean flag, set to false
//! --name=value
//! --name value    non-boolean flags only
//! -name=value     a single dash works too
//! --              stop looking for flags
//! ```
//!
//! Non-flag arguments are moved after the flags, keeping their order.
//!
//! # Directive Flags
//!
//! Four flags are built in:
//!
//! - `--flagfile=f1,f2` reads flags from files, one per line (see the
//!   [`flagfile`] module for the format).
//! - `--fromenv=a,b` reads `FLAGS_a` and `FLAGS_b` from the environment; a
//!   missing variable is an error.
//! - `--tryfromenv=a,b` does the same, skipping missing variables.
//! - `--undefok=a,b` tolerates the unknown flags `a` and `b`.
//!
//! # Errors
//!
//! Problems with individual flags are collected over the whole parse and
//! reported together. Unrecoverable problems (a flag defined twice, an
//! unreadable flag file) end the process through the exit hook, which
//! [`set_exit_hook`] can replace.
//!
//! # Features
//!
//! - `serde` (default): `Serialize` for [`CommandLineFlagInfo`] and
//!   [`FlagKind`].
//! - `strip-help`: leave help texts out of the binary.

mod error;
pub use error::{
    ERROR_PREFIX, ExitHook, FlagError, exit_with, report_fatal, reset_exit_hook, set_exit_hook,
};

mod flag_value;
pub use flag_value::{FlagKind, FlagStorage, FlagType, FlagValue};

mod validator;
pub use validator::{Validator, clear_flag_validator, register_flag_validator};

mod command_line_flag;
pub use command_line_flag::{CommandLineFlag, CommandLineFlagInfo};

mod flag_registry;
pub use flag_registry::{
    FlagMap, FlagRegistry, FlagSettingMode, GLOBAL_FLAGS, LazyFlagRegistry, SplitArgument,
    UnresolvedArgument, global_registry, shut_down_command_line_flags,
};

mod declare;
pub use declare::{
    FLAGS_flagfile, FLAGS_fromenv, FLAGS_tryfromenv, FLAGS_undefok, Flag, FlagDef, FlagReg,
    STRIPPED_FLAG_HELP, flag_help,
};

pub mod flagfile;

mod parser;
pub use parser::{
    CommandLineFlagParser, Directive, ParseError, allow_command_line_reparsing,
    parse_command_line_flags, parse_flags_with_registry, read_flags_from_string,
    read_flags_from_string_with_registry, reparse_command_line_flags,
};

mod flag_saver;
pub use flag_saver::{FlagSaver, FlagSaverImpl};

mod access;
pub use access::{
    get_all_flags, get_command_line_flag_info, get_command_line_flag_info_or_die,
    get_command_line_option, set_command_line_option, set_command_line_option_with_mode,
};

mod program_info;
pub use program_info::{
    get_argv, get_argv_sum, get_argv0, get_argvs, program_invocation_name,
    program_invocation_short_name, program_usage, set_argv, set_usage_message,
    set_version_string, version_string,
};

mod env;
pub use env::{
    bool_from_env, double_from_env, int32_from_env, int64_from_env, string_from_env,
    uint32_from_env, uint64_from_env,
};

#[doc(hidden)]
pub mod __private {
    pub use inventory;
    pub use paste;
}
