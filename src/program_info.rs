//! Process-wide information about the running program: its argv, usage
//! message and version string.

use parking_lot::Mutex;

const UNKNOWN_PROGRAM: &str = "UNKNOWN";

#[derive(Debug)]
struct ProgramInfo {
    argv: Vec<String>,
    cmdline: String,
    argv_sum: u32,
    usage: String,
    version: String,
}

static PROGRAM_INFO: Mutex<ProgramInfo> = Mutex::new(ProgramInfo {
    argv: Vec::new(),
    cmdline: String::new(),
    argv_sum: 0,
    usage: String::new(),
    version: String::new(),
});

/// Records the program's argv. Only the first call has an effect.
pub fn set_argv<S: AsRef<str>>(argv: &[S]) {
    let mut info = PROGRAM_INFO.lock();
    if !info.argv.is_empty() || argv.is_empty() {
        return;
    }
    info.argv = argv.iter().map(|arg| arg.as_ref().to_string()).collect();
    info.cmdline = info.argv.join(" ");
    info.argv_sum = info
        .cmdline
        .bytes()
        .fold(0u32, |sum, byte| sum.wrapping_add(u32::from(byte)));
}

/// The saved argv, as given to [`set_argv`].
pub fn get_argvs() -> Vec<String> {
    PROGRAM_INFO.lock().argv.clone()
}

/// The saved argv joined with single spaces.
pub fn get_argv() -> String {
    PROGRAM_INFO.lock().cmdline.clone()
}

/// The saved program name, or `"UNKNOWN"` before [`set_argv`].
pub fn get_argv0() -> String {
    PROGRAM_INFO
        .lock()
        .argv
        .first()
        .cloned()
        .unwrap_or_else(|| UNKNOWN_PROGRAM.to_string())
}

/// Sum of the bytes of [`get_argv`]; a cheap command-line fingerprint.
pub fn get_argv_sum() -> u32 {
    PROGRAM_INFO.lock().argv_sum
}

/// The program name as invoked, including any directory.
pub fn program_invocation_name() -> String {
    get_argv0()
}

/// The program name without its directory.
pub fn program_invocation_short_name() -> String {
    short_name(&get_argv0()).to_string()
}

pub(crate) fn short_name(invocation_name: &str) -> &str {
    match invocation_name.rfind('/') {
        Some(slash) => &invocation_name[slash + 1..],
        None => invocation_name,
    }
}

pub fn set_usage_message(usage: impl Into<String>) {
    PROGRAM_INFO.lock().usage = usage.into();
}

/// The usage message, or a warning if none was set.
pub fn program_usage() -> String {
    let info = PROGRAM_INFO.lock();
    if info.usage.is_empty() {
        "Warning: set_usage_message() never called".to_string()
    } else {
        info.usage.clone()
    }
}

pub fn set_version_string(version: impl Into<String>) {
    PROGRAM_INFO.lock().version = version.into();
}

pub fn version_string() -> String {
    PROGRAM_INFO.lock().version.clone()
}
