//! Typed readers for environment variables, typically used as flag
//! defaults:
//!
//! ```
//! use cmdflags::{define_int32, int32_from_env};
//!
//! define_int32!(env_example_jobs, int32_from_env("ENV_EXAMPLE_JOBS", 2), "parallel jobs");
//!
//! assert_eq!(FLAGS_env_example_jobs.get(), 2);
//! ```
//!
//! A variable that is set but does not parse as the requested type is
//! fatal.

use std::env;

use crate::{FlagError, FlagKind, FlagType, report_fatal};

fn from_env<T: FlagType>(var: &str, default: T) -> T {
    let Ok(value) = env::var(var) else {
        return default;
    };
    FlagKind::parse(T::KIND, &value)
        .as_ref()
        .and_then(T::from_value)
        .unwrap_or_else(|| {
            report_fatal(FlagError::EnvParse {
                var: var.to_string(),
                value,
            })
        })
}

pub fn bool_from_env(var: &str, default: bool) -> bool {
    from_env(var, default)
}

pub fn int32_from_env(var: &str, default: i32) -> i32 {
    from_env(var, default)
}

pub fn uint32_from_env(var: &str, default: u32) -> u32 {
    from_env(var, default)
}

pub fn int64_from_env(var: &str, default: i64) -> i64 {
    from_env(var, default)
}

pub fn uint64_from_env(var: &str, default: u64) -> u64 {
    from_env(var, default)
}

pub fn double_from_env(var: &str, default: f64) -> f64 {
    from_env(var, default)
}

/// The variable's value verbatim, or `default`.
pub fn string_from_env(var: &str, default: &str) -> String {
    env::var(var).unwrap_or_else(|_| default.to_string())
}
