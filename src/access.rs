//! Reading and setting flags by name.
//!
//! These functions work on the global registry and take its lock for one
//! call at a time.

use crate::{
    CommandLineFlagInfo, CommandLineFlagParser, FlagError, FlagSettingMode, global_registry,
    report_fatal,
};

/// The current value of the flag called `name`, as text.
///
/// # Examples
///
/// ```
/// use cmdflags::{define_uint32, get_command_line_option};
///
/// define_uint32!(access_example_workers, 4, "number of workers");
///
/// assert_eq!(get_command_line_option("access_example_workers").as_deref(), Some("4"));
/// assert_eq!(get_command_line_option("no_such_flag"), None);
/// ```
pub fn get_command_line_option(name: &str) -> Option<String> {
    global_registry().lock().current_value_locked(name)
}

/// Everything known about the flag called `name`.
pub fn get_command_line_flag_info(name: &str) -> Option<CommandLineFlagInfo> {
    global_registry().flag_info(name)
}

/// Like [`get_command_line_flag_info`], but a missing flag is fatal.
pub fn get_command_line_flag_info_or_die(name: &str) -> CommandLineFlagInfo {
    match get_command_line_flag_info(name) {
        Some(info) => info,
        None => report_fatal(FlagError::NoSuchFlag {
            name: name.to_string(),
        }),
    }
}

/// Sets the flag called `name` as if `--name=value` had been parsed.
///
/// Returns a description of what was set, or the empty string if the flag
/// does not exist or rejects the value.
pub fn set_command_line_option(name: &str, value: &str) -> String {
    set_command_line_option_with_mode(name, value, FlagSettingMode::SetFlagsValue)
}

/// Sets the flag called `name` according to `mode`.
///
/// Setting a directive flag such as `flagfile` processes it right away.
pub fn set_command_line_option_with_mode(name: &str, value: &str, mode: FlagSettingMode) -> String {
    let registry = global_registry();
    let mut parser = CommandLineFlagParser::new(&registry);
    let mut flags = registry.lock();
    if flags.find_flag_locked(name).is_none() {
        return String::new();
    }
    parser.process_single_option_locked(&mut flags, name, value, mode)
}

/// Info for every global flag, sorted by declaring file, then by name.
pub fn get_all_flags() -> Vec<CommandLineFlagInfo> {
    global_registry().all_flags()
}
