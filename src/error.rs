//! Error type and the replaceable exit hook.
//!
//! Per-flag problems found while parsing are collected by the parser and
//! reported together. Conditions that leave the process in an unusable state
//! (a flag defined twice, an unreadable flag file) go through
//! [`report_fatal`], which ends in the exit hook.

use std::io;
use std::path::PathBuf;

use parking_lot::RwLock;

/// Prefix put in front of every reported parse error.
pub const ERROR_PREFIX: &str = "ERROR: ";

/// Errors produced by the flag registry and the command-line parser.
#[derive(Debug, thiserror::Error)]
pub enum FlagError {
    #[error("unknown command line flag '{name}'")]
    UnknownFlag { name: String },

    #[error("unknown command line flag '{name}' (via --fromenv or --tryfromenv)")]
    UnknownEnvFlag { name: String },

    #[error("boolean value ({arg}) specified for {type_name} command line flag")]
    BoolValueForNonBool { arg: String, type_name: &'static str },

    #[error("illegal value '{value}' specified for {type_name} flag '{name}'")]
    IllegalValue {
        value: String,
        type_name: &'static str,
        name: String,
    },

    #[error("failed validation of new value '{value}' for flag '{name}'")]
    FailedValidation { value: String, name: String },

    #[error("flag '{arg}' is missing its argument{}", help_suffix(.help))]
    MissingArgument { arg: String, help: Option<String> },

    #[error("{var} not found in environment")]
    EnvNotFound { var: String },

    #[error("infinite recursion on environment flag '{value}'")]
    InfiniteRecursion { value: String },

    #[error("--{name} must be set on the commandline (default value fails validation)")]
    DefaultFailsValidation { name: String },

    #[error("flag '{name}' was defined more than once (in files '{first}' and '{second}')")]
    DuplicateFlag {
        name: String,
        first: String,
        second: String,
    },

    #[error(
        "something wrong with flag '{name}' in file '{file}'.  One possibility: file '{file}' is being linked both statically and dynamically into this executable"
    )]
    DuplicateLinkage { name: String, file: String },

    #[error("empty flaglist entry")]
    EmptyFlagListEntry,

    #[error("flag \"{entry}\" begins with '-'")]
    FlagListEntryStartsWithDash { entry: String },

    #[error("{}: {source}", .path.display())]
    FlagfileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error parsing env variable '{var}' with value '{value}'")]
    EnvParse { var: String, value: String },

    #[error("flag name '{name}' doesn't exist")]
    NoSuchFlag { name: String },

    #[error("flag states were already saved into this snapshot")]
    SnapshotAlreadySaved,
}

fn help_suffix(help: &Option<String>) -> String {
    match help {
        Some(help) => format!("; flag description: {help}"),
        None => String::new(),
    }
}

/// Signature of the function invoked to terminate the process.
pub type ExitHook = fn(i32) -> !;

fn default_exit(code: i32) -> ! {
    std::process::exit(code)
}

static EXIT_HOOK: RwLock<ExitHook> = RwLock::new(default_exit);

/// Replaces the function called on unrecoverable errors.
///
/// The default is [`std::process::exit`]. Tests install a hook that panics so
/// that fatal paths can be observed without ending the test process.
pub fn set_exit_hook(hook: ExitHook) {
    *EXIT_HOOK.write() = hook;
}

/// Restores the default exit hook.
pub fn reset_exit_hook() {
    *EXIT_HOOK.write() = default_exit;
}

/// Calls the current exit hook with `code`.
pub fn exit_with(code: i32) -> ! {
    let hook = *EXIT_HOOK.read();
    hook(code)
}

/// Logs `error`, writes it to stderr and exits with status 1.
pub fn report_fatal(error: FlagError) -> ! {
    tracing::error!(%error, "fatal flag error");
    eprintln!("{ERROR_PREFIX}{error}");
    exit_with(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_argument_message() {
        let with_help = FlagError::MissingArgument {
            arg: "--port".to_string(),
            help: Some("port to listen on".to_string()),
        };
        assert_eq!(
            with_help.to_string(),
            "flag '--port' is missing its argument; flag description: port to listen on"
        );

        let without_help = FlagError::MissingArgument {
            arg: "--port".to_string(),
            help: None,
        };
        assert_eq!(without_help.to_string(), "flag '--port' is missing its argument");
    }

    #[test]
    fn test_illegal_value_message() {
        let error = FlagError::IllegalValue {
            value: "abc".to_string(),
            type_name: "int32",
            name: "port".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "illegal value 'abc' specified for int32 flag 'port'"
        );
    }
}
