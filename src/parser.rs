//! The command-line parser.
//!
//! Parsing moves through fixed stages: directives set before parsing are
//! applied, argv is scanned and every flag applied as it is found
//! (expanding `--flagfile`, `--fromenv` and `--tryfromenv` recursively),
//! every flag is validated, and finally the collected errors are reported
//! together.

use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::flagfile::{
    FlagfileLine, SectionTracker, flagfile_lines, parse_flag_list, read_flagfile,
};
use crate::program_info::{self, short_name};
use crate::{
    ERROR_PREFIX, FlagError, FlagMap, FlagRegistry, FlagSaver, FlagSettingMode, exit_with,
    global_registry,
};

static ALLOW_REPARSING: AtomicBool = AtomicBool::new(false);

/// The built-in flags whose assignment triggers further processing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Directive {
    /// `--flagfile`: read flags from each listed file.
    Flagfile,
    /// `--fromenv`: read each listed flag from `FLAGS_<name>`; a missing
    /// variable is an error.
    Fromenv,
    /// `--tryfromenv`: like `Fromenv`, but missing variables are skipped.
    Tryfromenv,
}

impl Directive {
    pub const ALL: [Directive; 3] = [Directive::Flagfile, Directive::Fromenv, Directive::Tryfromenv];

    pub fn flag_name(self) -> &'static str {
        match self {
            Directive::Flagfile => "flagfile",
            Directive::Fromenv => "fromenv",
            Directive::Tryfromenv => "tryfromenv",
        }
    }

    pub fn for_flag(name: &str) -> Option<Directive> {
        Self::ALL.into_iter().find(|d| d.flag_name() == name)
    }
}

/// The errors left over after a parse, in flag-name order.
#[derive(Debug, thiserror::Error)]
#[error("{}", error_lines(.errors))]
pub struct ParseError {
    errors: Vec<(String, Arc<FlagError>)>,
}

impl ParseError {
    /// Flag name and error, for every failure.
    pub fn errors(&self) -> &[(String, Arc<FlagError>)] {
        &self.errors
    }

    pub fn flag_names(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().map(|(name, _)| name.as_str())
    }

    /// All errors, one `ERROR: ` line each.
    pub fn message(&self) -> String {
        error_lines(&self.errors)
    }
}

fn error_lines(errors: &[(String, Arc<FlagError>)]) -> String {
    errors
        .iter()
        .map(|(_, error)| format!("{ERROR_PREFIX}{error}\n"))
        .collect()
}

/// Resolves argv, flag files and environment variables against a registry.
///
/// Errors and undefined names accumulate across calls on one parser; create
/// a new parser to start clean.
#[derive(Debug)]
pub struct CommandLineFlagParser<'a> {
    registry: &'a FlagRegistry,
    error_flags: BTreeMap<String, Arc<FlagError>>,
    undefined_names: BTreeSet<String>,
    invocation_name: String,
    allow_reparsing: bool,
}

impl<'a> CommandLineFlagParser<'a> {
    /// Creates a parser for `registry`, using the saved program name for
    /// flag-file sections.
    pub fn new(registry: &'a FlagRegistry) -> Self {
        Self {
            registry,
            error_flags: BTreeMap::new(),
            undefined_names: BTreeSet::new(),
            invocation_name: program_info::program_invocation_name(),
            allow_reparsing: ALLOW_REPARSING.load(Ordering::SeqCst),
        }
    }

    /// Overrides the program name matched against flag-file sections.
    pub fn with_program_name(mut self, invocation_name: impl Into<String>) -> Self {
        self.invocation_name = invocation_name.into();
        self
    }

    /// Overrides whether undefined flags are tolerated.
    pub fn with_reparsing_allowed(mut self, allow: bool) -> Self {
        self.allow_reparsing = allow;
        self
    }

    /// Runs every stage and returns the boundary between flags and
    /// positional arguments (see [`parse_new_command_line_flags`]).
    ///
    /// [`parse_new_command_line_flags`]: Self::parse_new_command_line_flags
    pub fn parse(&mut self, argv: &mut Vec<String>, remove_flags: bool) -> Result<usize, ParseError> {
        self.process_preset_directives();
        let boundary = self.parse_new_command_line_flags(argv, remove_flags);
        self.validate_all_flags();
        self.report_errors()?;
        Ok(boundary)
    }

    /// Applies directives that already hold a value, e.g. one set through
    /// [`set_command_line_option`](crate::set_command_line_option) before
    /// parsing.
    pub fn process_preset_directives(&mut self) {
        let registry = self.registry;
        let mut flags = registry.lock();
        for directive in Directive::ALL {
            let Some(value) = flags.current_value_locked(directive.flag_name()) else {
                continue;
            };
            if !value.is_empty() {
                self.expand_directive_locked(&mut flags, directive, &value, FlagSettingMode::SetFlagsValue);
            }
        }
    }

    /// Scans argv and applies each flag.
    ///
    /// Positional arguments are moved after the flags, keeping their order.
    /// Scanning stops at `--` and at a flag missing its value. Returns the
    /// index of the first positional argument; with `remove_flags` the flags
    /// are dropped from argv (the program name stays) and the new length is
    /// returned instead.
    pub fn parse_new_command_line_flags(&mut self, argv: &mut Vec<String>, remove_flags: bool) -> usize {
        let registry = self.registry;
        let mut flags = registry.lock();

        let mut first_nonopt = argv.len();
        let mut i = 1;
        while i < first_nonopt {
            if !argv[i].starts_with('-') || argv[i] == "-" {
                let positional = argv.remove(i);
                argv.push(positional);
                first_nonopt -= 1;
                continue;
            }

            let arg = strip_dashes(&argv[i]);
            if arg.is_empty() {
                first_nonopt = i + 1;
                break;
            }

            let split = match flags.split_argument_locked(arg) {
                Ok(split) => split,
                Err(unresolved) => {
                    self.undefined_names.insert(unresolved.key.clone());
                    self.error_flags.insert(unresolved.key, Arc::new(unresolved.error));
                    i += 1;
                    continue;
                }
            };

            let value = match split.value {
                Some(value) => value,
                None if i + 1 >= first_nonopt => {
                    let help = flags
                        .find_flag_locked(&split.name)
                        .map(|flag| flag.help())
                        .filter(|help| !help.is_empty() && *help != crate::STRIPPED_FLAG_HELP)
                        .map(str::to_string);
                    self.error_flags.insert(
                        split.name,
                        Arc::new(FlagError::MissingArgument {
                            arg: argv[i].clone(),
                            help,
                        }),
                    );
                    break;
                }
                None => {
                    i += 1;
                    let value = argv[i].clone();
                    if let Some(flag) = flags.find_flag_locked(&split.name) {
                        if value.starts_with('-')
                            && flag.kind() == crate::FlagKind::String
                            && flag.help().contains("true")
                            && flag.help().contains("false")
                        {
                            tracing::warn!(
                                flag = flag.name(),
                                value = %value,
                                "did you really mean to set this flag to a value starting with '-'?"
                            );
                        }
                    }
                    value
                }
            };

            self.process_single_option_locked(&mut flags, &split.name, &value, FlagSettingMode::SetFlagsValue);
            i += 1;
        }

        if remove_flags {
            if argv.is_empty() {
                return 0;
            }
            argv.drain(1..first_nonopt);
            return argv.len();
        }
        first_nonopt
    }

    /// Sets one flag and expands it if it is a directive.
    ///
    /// Returns the accumulated "set to" messages, or the empty string if
    /// the assignment itself failed (the error is recorded).
    pub fn process_single_option_locked(
        &mut self,
        flags: &mut FlagMap,
        name: &str,
        value: &str,
        mode: FlagSettingMode,
    ) -> String {
        let mut message = match flags.set_flag_locked(name, value, mode) {
            Ok(message) => message,
            Err(error) => {
                self.error_flags.insert(name.to_string(), Arc::new(error));
                return String::new();
            }
        };
        tracing::debug!(flag = name, message = message.trim_end(), "flag set");

        if let Some(directive) = Directive::for_flag(name) {
            let current = flags.current_value_locked(name).unwrap_or_default();
            message.push_str(&self.expand_directive_locked(flags, directive, &current, mode));
        }
        message
    }

    /// Like [`process_single_option_locked`](Self::process_single_option_locked),
    /// taking the registry lock for the duration of the call.
    pub fn process_single_option(&mut self, name: &str, value: &str, mode: FlagSettingMode) -> String {
        let registry = self.registry;
        let mut flags = registry.lock();
        self.process_single_option_locked(&mut flags, name, value, mode)
    }

    fn expand_directive_locked(
        &mut self,
        flags: &mut FlagMap,
        directive: Directive,
        value: &str,
        mode: FlagSettingMode,
    ) -> String {
        match directive {
            Directive::Flagfile => self.process_flagfile_locked(flags, value, mode),
            Directive::Fromenv => self.process_fromenv_locked(flags, value, mode, true),
            Directive::Tryfromenv => self.process_fromenv_locked(flags, value, mode, false),
        }
    }

    /// Reads each file of the comma-separated list and applies its flags.
    pub fn process_flagfile_locked(&mut self, flags: &mut FlagMap, flagval: &str, mode: FlagSettingMode) -> String {
        let mut message = String::new();
        for path in parse_flag_list(flagval) {
            let contents = read_flagfile(&path);
            message.push_str(&self.process_options_from_string_locked(flags, &contents, mode));
        }
        message
    }

    /// Applies `FLAGS_<name>` for each name of the comma-separated list.
    pub fn process_fromenv_locked(
        &mut self,
        flags: &mut FlagMap,
        flagval: &str,
        mode: FlagSettingMode,
        errors_are_fatal: bool,
    ) -> String {
        let mut message = String::new();
        for name in parse_flag_list(flagval) {
            if flags.find_flag_locked(&name).is_none() {
                self.error_flags.insert(
                    name.clone(),
                    Arc::new(FlagError::UnknownEnvFlag { name: name.clone() }),
                );
                self.undefined_names.insert(name);
                continue;
            }

            let var = format!("FLAGS_{name}");
            let Ok(value) = env::var(&var) else {
                tracing::debug!(%var, "environment variable not set");
                if errors_are_fatal {
                    self.error_flags.insert(name, Arc::new(FlagError::EnvNotFound { var }));
                }
                continue;
            };

            if value == "fromenv" || value == "tryfromenv" {
                self.error_flags.insert(name, Arc::new(FlagError::InfiniteRecursion { value }));
                continue;
            }

            tracing::debug!(%var, "reading flag from the environment");
            message.push_str(&self.process_single_option_locked(flags, &name, &value, mode));
        }
        message
    }

    /// Applies the flag lines of flag-file `contents` that are relevant to
    /// this program.
    ///
    /// Lines naming an unknown flag, or a flag without its value, are
    /// skipped without an error.
    pub fn process_options_from_string_locked(
        &mut self,
        flags: &mut FlagMap,
        contents: &str,
        mode: FlagSettingMode,
    ) -> String {
        let invocation_name = self.invocation_name.clone();
        let mut tracker = SectionTracker::new(&invocation_name, short_name(&invocation_name));
        let mut message = String::new();

        for line in flagfile_lines(contents) {
            if !tracker.accept(line) {
                continue;
            }
            let FlagfileLine::Flag(text) = line else {
                continue;
            };
            let Ok(split) = flags.split_argument_locked(strip_dashes(text)) else {
                continue;
            };
            let Some(value) = split.value else {
                continue;
            };
            message.push_str(&self.process_single_option_locked(flags, &split.name, &value, mode));
        }
        message
    }

    /// Runs every flag's validator against its current value.
    ///
    /// Flags that fail and have no error yet get one saying they must be
    /// set on the command line.
    pub fn validate_all_flags(&mut self) {
        let registry = self.registry;
        let flags = registry.lock();
        for flag in flags.iter() {
            if !flag.validate_current() {
                self.error_flags
                    .entry(flag.name().to_string())
                    .or_insert_with(|| {
                        Arc::new(FlagError::DefaultFailsValidation {
                            name: flag.name().to_string(),
                        })
                    });
            }
        }
    }

    /// Drops the errors exempted by `--undefok` or by reparsing mode and
    /// returns the rest. The remaining errors stay recorded on the parser.
    pub fn report_errors(&mut self) -> Result<(), ParseError> {
        let undefok = self
            .registry
            .lock()
            .current_value_locked("undefok")
            .unwrap_or_default();
        for name in parse_flag_list(&undefok) {
            let no_version = format!("no{name}");
            if self.undefined_names.contains(&name) {
                self.error_flags.remove(&name);
            } else if self.undefined_names.contains(&no_version) {
                self.error_flags.remove(&no_version);
            }
        }

        if self.allow_reparsing {
            for name in &self.undefined_names {
                self.error_flags.remove(name);
            }
        }

        if self.error_flags.is_empty() {
            return Ok(());
        }
        Err(ParseError {
            errors: self
                .error_flags
                .iter()
                .map(|(name, error)| (name.clone(), Arc::clone(error)))
                .collect(),
        })
    }

    /// Names of the flags with a recorded error.
    pub fn error_flag_names(&self) -> impl Iterator<Item = &str> {
        self.error_flags.keys().map(String::as_str)
    }

    /// Names of undefined flags met so far.
    pub fn undefined_names(&self) -> impl Iterator<Item = &str> {
        self.undefined_names.iter().map(String::as_str)
    }
}

/// Strips one or two leading dashes.
fn strip_dashes(arg: &str) -> &str {
    let arg = arg.strip_prefix('-').unwrap_or(arg);
    arg.strip_prefix('-').unwrap_or(arg)
}

/// Parses `argv` against `registry`, using `argv[0]` as the program name.
///
/// Nothing is printed and the process is not ended; the caller decides
/// what to do with the errors.
pub fn parse_flags_with_registry(
    registry: &FlagRegistry,
    argv: &mut Vec<String>,
    remove_flags: bool,
) -> Result<usize, ParseError> {
    let mut parser = CommandLineFlagParser::new(registry);
    if let Some(program) = argv.first() {
        parser = parser.with_program_name(program.clone());
    }
    parser.parse(argv, remove_flags)
}

/// Parses the program's argv into the global flags.
///
/// Saves argv (see [`set_argv`](crate::set_argv)), applies every flag and
/// returns the index of the first positional argument, or with
/// `remove_flags` the length of the compacted argv. On any error the
/// errors are written to stderr and the exit hook is called with status 1.
///
/// # Examples
///
/// ```no_run
/// use cmdflags::{define_int32, parse_command_line_flags};
///
/// define_int32!(port, 8080, "port to listen on");
///
/// let mut args: Vec<String> = std::env::args().collect();
/// parse_command_line_flags(&mut args, true);
/// println!("listening on {}", FLAGS_port.get());
/// ```
pub fn parse_command_line_flags(argv: &mut Vec<String>, remove_flags: bool) -> usize {
    program_info::set_argv(argv.as_slice());
    let registry = global_registry();
    let mut parser = CommandLineFlagParser::new(&registry);
    match parser.parse(argv, remove_flags) {
        Ok(boundary) => boundary,
        Err(error) => {
            eprint!("{error}");
            exit_with(1)
        }
    }
}

/// Tolerates unknown flags in later parses, so that flags declared by code
/// loaded afterwards can be picked up by [`reparse_command_line_flags`].
pub fn allow_command_line_reparsing() {
    ALLOW_REPARSING.store(true, Ordering::SeqCst);
}

/// Parses the saved argv again, without removing anything from it.
pub fn reparse_command_line_flags() {
    let mut argv = program_info::get_argvs();
    parse_command_line_flags(&mut argv, false);
}

/// Applies flag-file `contents` to the global flags.
///
/// On error every flag is restored to its previous state and `false` is
/// returned, or the process exits when `errors_are_fatal`.
pub fn read_flags_from_string(contents: &str, errors_are_fatal: bool) -> bool {
    read_flags_from_string_with_registry(&global_registry(), contents, errors_are_fatal)
}

/// [`read_flags_from_string`] against any registry.
pub fn read_flags_from_string_with_registry(
    registry: &Arc<FlagRegistry>,
    contents: &str,
    errors_are_fatal: bool,
) -> bool {
    let mut saver = FlagSaver::for_registry(Arc::clone(registry));
    let mut parser = CommandLineFlagParser::new(registry);
    {
        let mut flags = registry.lock();
        parser.process_options_from_string_locked(&mut flags, contents, FlagSettingMode::SetFlagsValue);
    }
    match parser.report_errors() {
        Ok(()) => {
            saver.discard();
            true
        }
        Err(error) => {
            eprint!("{error}");
            if errors_are_fatal {
                exit_with(1);
            }
            false
        }
    }
}
