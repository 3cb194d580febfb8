use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::declare::{DIRECTIVE_FLAG_HELP, FlagDef, FlagReg, directive_flags};
use crate::{CommandLineFlag, CommandLineFlagInfo, FlagError, FlagValue, Validator, report_fatal};

/// How [`FlagMap::set_flag_locked`] applies a new value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlagSettingMode {
    /// Update the flag's value unconditionally.
    SetFlagsValue,
    /// Update the flag's value, but only if it has not been modified yet.
    SetFlagIfDefault,
    /// Change the flag's default value. The current value follows unless
    /// the flag was already modified.
    SetFlagsDefault,
}

/// One `name` or `name=value` token resolved against the registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitArgument {
    /// Name of the resolved flag (without a `no` prefix).
    pub name: String,
    /// The value to apply. `None` means the value has to come from the next
    /// token; boolean flags always get one.
    pub value: Option<String>,
}

/// A token that did not resolve to a flag.
#[derive(Debug)]
pub struct UnresolvedArgument {
    /// The name part of the token as written.
    pub key: String,
    pub error: FlagError,
}

/// The flags of a [`FlagRegistry`], reachable only while its lock is held.
///
/// Flags are indexed by name and by the address of their current-value
/// storage; both indices always hold the same set of flags.
#[derive(Debug, Default)]
pub struct FlagMap {
    flags: BTreeMap<String, CommandLineFlag>,
    flags_by_ptr: HashMap<usize, String>,
}

impl FlagMap {
    /// Inserts `flag`, or returns it together with the error if the name is
    /// taken.
    pub fn insert_locked(&mut self, flag: CommandLineFlag) -> Result<(), (CommandLineFlag, FlagError)> {
        if let Some(existing) = self.flags.get(flag.name()) {
            let error = if existing.filename() != flag.filename() {
                FlagError::DuplicateFlag {
                    name: flag.name().to_string(),
                    first: existing.filename().to_string(),
                    second: flag.filename().to_string(),
                }
            } else {
                FlagError::DuplicateLinkage {
                    name: flag.name().to_string(),
                    file: flag.filename().to_string(),
                }
            };
            return Err((flag, error));
        }
        self.flags_by_ptr.insert(flag.flag_ptr(), flag.name().to_string());
        self.flags.insert(flag.name().to_string(), flag);
        Ok(())
    }

    /// Removes a flag from both indices.
    pub fn remove_flag_locked(&mut self, name: &str) -> Option<CommandLineFlag> {
        let flag = self.flags.remove(name)?;
        self.flags_by_ptr.remove(&flag.flag_ptr());
        Some(flag)
    }

    pub fn find_flag_locked(&self, name: &str) -> Option<&CommandLineFlag> {
        self.flags.get(name)
    }

    pub fn find_flag_locked_mut(&mut self, name: &str) -> Option<&mut CommandLineFlag> {
        self.flags.get_mut(name)
    }

    pub fn find_flag_via_ptr_locked(&self, flag_ptr: usize) -> Option<&CommandLineFlag> {
        self.flags_by_ptr
            .get(&flag_ptr)
            .and_then(|name| self.flags.get(name))
    }

    pub fn find_flag_via_ptr_locked_mut(&mut self, flag_ptr: usize) -> Option<&mut CommandLineFlag> {
        let name = self.flags_by_ptr.get(&flag_ptr)?;
        self.flags.get_mut(name)
    }

    /// Current value of a flag, as text.
    pub fn current_value_locked(&self, name: &str) -> Option<String> {
        self.flags.get(name).map(CommandLineFlag::current_value)
    }

    /// Iterates over the flags in name order.
    pub fn iter(&self) -> impl Iterator<Item = &CommandLineFlag> {
        self.flags.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CommandLineFlag> {
        self.flags.values_mut()
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Splits a `name` or `name=value` token (dashes already stripped) and
    /// resolves the name.
    ///
    /// `noname` resolves to the boolean flag `name` with the value `"0"`
    /// when no flag is literally called `noname`. A boolean flag given
    /// without a value gets `"1"`.
    pub fn split_argument_locked(&self, arg: &str) -> Result<SplitArgument, UnresolvedArgument> {
        let (key, mut value) = match arg.split_once('=') {
            Some((key, value)) => (key, Some(value.to_string())),
            None => (arg, None),
        };

        let flag = match self.find_flag_locked(key) {
            Some(flag) => flag,
            None => {
                let unknown = || UnresolvedArgument {
                    key: key.to_string(),
                    error: FlagError::UnknownFlag { name: key.to_string() },
                };
                let stripped = key.strip_prefix("no").ok_or_else(unknown)?;
                let flag = self.find_flag_locked(stripped).ok_or_else(unknown)?;
                if flag.kind() != crate::FlagKind::Bool {
                    return Err(UnresolvedArgument {
                        key: key.to_string(),
                        error: FlagError::BoolValueForNonBool {
                            arg: key.to_string(),
                            type_name: flag.type_name(),
                        },
                    });
                }
                value = Some("0".to_string());
                flag
            }
        };

        if value.is_none() && flag.kind() == crate::FlagKind::Bool {
            value = Some("1".to_string());
        }

        Ok(SplitArgument {
            name: flag.name().to_string(),
            value,
        })
    }

    /// Applies `value` to the flag called `name` according to `mode`.
    pub fn set_flag_locked(
        &mut self,
        name: &str,
        value: &str,
        mode: FlagSettingMode,
    ) -> Result<String, FlagError> {
        let flag = self
            .find_flag_locked_mut(name)
            .ok_or_else(|| FlagError::UnknownFlag { name: name.to_string() })?;
        flag.set_locked(value, mode)
    }
}

/// A collection of flags, indexed by name, guarded by a mutex.
///
/// Most programs only use the global registry (see [`global_registry`]),
/// which holds every flag declared with the `define_*!` macros. Private
/// registries are useful for snapshots and for parsing against an isolated
/// set of flags.
///
/// # Examples
///
/// ```
/// use cmdflags::{CommandLineFlag, FlagRegistry, FlagSettingMode, FlagValue};
///
/// let registry = FlagRegistry::new();
/// registry.register_flag(CommandLineFlag::new(
///     "retries",
///     "how many times to retry",
///     file!(),
///     FlagValue::Int32(3),
///     FlagValue::Int32(3),
/// ));
///
/// let mut flags = registry.lock();
/// flags.set_flag_locked("retries", "5", FlagSettingMode::SetFlagsValue).unwrap();
/// assert_eq!(flags.current_value_locked("retries").as_deref(), Some("5"));
/// ```
#[derive(Debug, Default)]
pub struct FlagRegistry {
    flags: Mutex<FlagMap>,
}

impl FlagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a private registry holding its own copies of the built-in
    /// `flagfile`, `fromenv`, `tryfromenv` and `undefok` flags.
    pub fn with_directive_flags() -> Self {
        let registry = Self::new();
        for (name, help) in DIRECTIVE_FLAG_HELP {
            registry.register_flag(CommandLineFlag::new(
                name,
                help,
                file!(),
                FlagValue::String(String::new()),
                FlagValue::String(String::new()),
            ));
        }
        registry
    }

    /// Acquires the registry lock.
    pub fn lock(&self) -> MutexGuard<'_, FlagMap> {
        self.flags.lock()
    }

    /// Adds a flag to the registry.
    ///
    /// Registering a second flag with an existing name is a fatal
    /// configuration error.
    pub fn register_flag(&self, flag: CommandLineFlag) {
        let result = self.lock().insert_locked(flag);
        if let Err((_, error)) = result {
            report_fatal(error);
        }
    }

    pub(crate) fn register_declared(&self, def: &FlagDef) {
        self.register_flag(CommandLineFlag::with_storage(
            def.name(),
            def.help(),
            def.file(),
            def.storage().clone(),
            def.default_value(),
        ));
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Attaches, replaces or clears the validator of the flag whose storage
    /// lives at `flag_ptr`.
    ///
    /// Registering the same function twice is fine; replacing one validator
    /// by a different one is refused.
    pub fn add_flag_validator(&self, flag_ptr: usize, validator: Option<Validator>) -> bool {
        let mut flags = self.lock();
        let Some(flag) = flags.find_flag_via_ptr_locked_mut(flag_ptr) else {
            tracing::warn!(flag_ptr, "ignoring validator registration: no flag found at that address");
            return false;
        };
        match (flag.validate_function().copied(), validator) {
            (Some(existing), Some(new)) if existing.same_fn(&new) => true,
            (Some(_), Some(_)) => {
                tracing::warn!(
                    flag = flag.name(),
                    "ignoring validator registration: validate-fn already registered"
                );
                false
            }
            (_, Some(new)) if new.kind() != flag.kind() => {
                tracing::warn!(
                    flag = flag.name(),
                    validator_type = %new.kind(),
                    "ignoring validator registration: validator type does not match flag"
                );
                false
            }
            (_, validator) => {
                flag.set_validate_function(validator);
                true
            }
        }
    }

    /// Info for one flag.
    pub fn flag_info(&self, name: &str) -> Option<CommandLineFlagInfo> {
        self.lock()
            .find_flag_locked_mut(name)
            .map(CommandLineFlag::fill_info)
    }

    /// Info for every flag, sorted by declaring file, then by name.
    pub fn all_flags(&self) -> Vec<CommandLineFlagInfo> {
        let mut infos: Vec<_> = self
            .lock()
            .iter_mut()
            .map(CommandLineFlag::fill_info)
            .collect();
        infos.sort_by(|a, b| {
            a.filename
                .cmp(&b.filename)
                .then_with(|| a.name.cmp(&b.name))
        });
        infos
    }
}

/// Lazily initialized holder of the global [`FlagRegistry`].
///
/// On first access the registry is created with the directive flags, and
/// every flag declared with the `define_*!` macros, in any linked crate, is
/// registered into it.
/// Construction is guarded by this holder's own mutex, distinct from the
/// lock of the registry it creates.
///
/// Most code should call [`global_registry`] rather than use this directly.
#[doc(hidden)]
#[derive(Debug)]
pub struct LazyFlagRegistry {
    data: Mutex<Option<Arc<FlagRegistry>>>,
}

impl LazyFlagRegistry {
    /// Gets the global registry, creating it if necessary.
    pub fn get(&self) -> Arc<FlagRegistry> {
        let mut data = self.data.lock();
        let registry = data.get_or_insert_with(|| {
            let registry = FlagRegistry::new();
            for def in directive_flags() {
                registry.register_declared(def);
            }
            for reg in inventory::iter::<FlagReg> {
                registry.register_declared(reg.0);
            }
            tracing::debug!(flags = registry.len(), "global flag registry initialized");
            Arc::new(registry)
        });
        Arc::clone(registry)
    }

    /// Drops the global registry. A later access builds a new one.
    pub fn shut_down(&self) {
        self.data.lock().take();
    }
}

/// The global registry of flags.
///
/// # Examples
///
/// ```
/// use cmdflags::{GLOBAL_FLAGS, define_bool};
///
/// define_bool!(global_example, true, "an example flag");
///
/// let registry = GLOBAL_FLAGS.get();
/// let flags = registry.lock();
/// let flag = flags.find_flag_locked("global_example").unwrap();
/// assert_eq!(flag.current_value(), "true");
/// ```
pub static GLOBAL_FLAGS: LazyFlagRegistry = LazyFlagRegistry {
    data: Mutex::new(None),
};

/// Returns the process-wide registry.
pub fn global_registry() -> Arc<FlagRegistry> {
    GLOBAL_FLAGS.get()
}

/// Tears down the global registry, releasing every flag record.
///
/// Declared `FLAGS_*` handles stay readable; they own their storage.
pub fn shut_down_command_line_flags() {
    GLOBAL_FLAGS.shut_down();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FlagValue;

    fn registry() -> FlagRegistry {
        let registry = FlagRegistry::new();
        registry.register_flag(CommandLineFlag::new(
            "verbose",
            "",
            "a.rs",
            FlagValue::Bool(false),
            FlagValue::Bool(false),
        ));
        registry.register_flag(CommandLineFlag::new(
            "depth",
            "",
            "a.rs",
            FlagValue::Int32(1),
            FlagValue::Int32(1),
        ));
        registry.register_flag(CommandLineFlag::new(
            "nosy",
            "",
            "b.rs",
            FlagValue::String("x".into()),
            FlagValue::String("x".into()),
        ));
        registry
    }

    fn positive(_: &str, value: i32) -> bool {
        value > 0
    }

    fn small(_: &str, value: i32) -> bool {
        value < 100
    }

    #[test]
    fn test_split_plain_and_inline() {
        let registry = registry();
        let flags = registry.lock();
        assert_eq!(
            flags.split_argument_locked("depth=4").unwrap(),
            SplitArgument { name: "depth".into(), value: Some("4".into()) }
        );
        assert_eq!(
            flags.split_argument_locked("depth").unwrap(),
            SplitArgument { name: "depth".into(), value: None }
        );
        assert_eq!(
            flags.split_argument_locked("depth=").unwrap(),
            SplitArgument { name: "depth".into(), value: Some(String::new()) }
        );
    }

    #[test]
    fn test_split_bool_forms() {
        let registry = registry();
        let flags = registry.lock();
        assert_eq!(
            flags.split_argument_locked("verbose").unwrap().value.as_deref(),
            Some("1")
        );
        let negated = flags.split_argument_locked("noverbose").unwrap();
        assert_eq!(negated.name, "verbose");
        assert_eq!(negated.value.as_deref(), Some("0"));
        // A literal flag wins over the no-prefix convention.
        assert_eq!(flags.split_argument_locked("nosy").unwrap().name, "nosy");
    }

    #[test]
    fn test_split_errors() {
        let registry = registry();
        let flags = registry.lock();

        let unknown = flags.split_argument_locked("missing=1").unwrap_err();
        assert_eq!(unknown.key, "missing");
        assert!(matches!(unknown.error, FlagError::UnknownFlag { .. }));

        let unknown = flags.split_argument_locked("nomissing").unwrap_err();
        assert!(matches!(unknown.error, FlagError::UnknownFlag { .. }));

        let non_bool = flags.split_argument_locked("nodepth").unwrap_err();
        assert_eq!(non_bool.key, "nodepth");
        assert_eq!(
            non_bool.error.to_string(),
            "boolean value (nodepth) specified for int32 command line flag"
        );
    }

    #[test]
    fn test_indices_stay_consistent() {
        let registry = registry();
        let mut flags = registry.lock();
        let ptr = flags.find_flag_locked("depth").unwrap().flag_ptr();
        assert_eq!(flags.find_flag_via_ptr_locked(ptr).unwrap().name(), "depth");

        let removed = flags.remove_flag_locked("depth").unwrap();
        assert_eq!(removed.name(), "depth");
        assert!(flags.find_flag_locked("depth").is_none());
        assert!(flags.find_flag_via_ptr_locked(ptr).is_none());
        assert_eq!(flags.len(), 2);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut flags = FlagMap::default();
        let flag = |file: &str| {
            CommandLineFlag::new("dup", "", file, FlagValue::Bool(true), FlagValue::Bool(true))
        };
        flags.insert_locked(flag("one.rs")).unwrap();

        let (_, error) = flags.insert_locked(flag("two.rs")).unwrap_err();
        assert_eq!(
            error.to_string(),
            "flag 'dup' was defined more than once (in files 'one.rs' and 'two.rs')"
        );
        let (_, error) = flags.insert_locked(flag("one.rs")).unwrap_err();
        assert!(matches!(error, FlagError::DuplicateLinkage { .. }));
        assert_eq!(flags.len(), 1);
    }

    #[test]
    fn test_add_flag_validator_rules() {
        let registry = registry();
        let ptr = registry.lock().find_flag_locked("depth").unwrap().flag_ptr();

        assert!(registry.add_flag_validator(ptr, Some(Validator::Int32(positive))));
        assert!(registry.add_flag_validator(ptr, Some(Validator::Int32(positive))));
        assert!(!registry.add_flag_validator(ptr, Some(Validator::Int32(small))));
        assert!(registry.add_flag_validator(ptr, None));
        assert!(registry.add_flag_validator(ptr, Some(Validator::Int32(small))));
        assert!(!registry.add_flag_validator(0, Some(Validator::Int32(small))));

        let mut flags = registry.lock();
        assert!(matches!(
            flags.set_flag_locked("depth", "500", FlagSettingMode::SetFlagsValue),
            Err(FlagError::FailedValidation { .. })
        ));
    }

    #[test]
    fn test_all_flags_sorted_by_file_then_name() {
        let registry = registry();
        let names: Vec<_> = registry
            .all_flags()
            .into_iter()
            .map(|info| info.name)
            .collect();
        assert_eq!(names, ["depth", "verbose", "nosy"]);
    }

    #[test]
    fn test_with_directive_flags() {
        let registry = FlagRegistry::with_directive_flags();
        let flags = registry.lock();
        for name in ["flagfile", "fromenv", "tryfromenv", "undefok"] {
            let flag = flags.find_flag_locked(name).unwrap();
            assert_eq!(flag.type_name(), "string");
            assert_eq!(flag.current_value(), "");
        }
    }
}
