use crate::{FlagError, FlagKind, FlagSettingMode, FlagStorage, FlagValue, Validator};

/// All the information about a single flag: name, help text, the file that
/// declared it, its default and current values, and an optional validator.
///
/// Every `CommandLineFlag` is owned by exactly one [`FlagRegistry`]; to
/// modify it, hold that registry's lock (see [`FlagRegistry::lock`]).
///
/// [`FlagRegistry`]: crate::FlagRegistry
/// [`FlagRegistry::lock`]: crate::FlagRegistry::lock
#[derive(Debug)]
pub struct CommandLineFlag {
    name: String,
    help: String,
    filename: String,
    modified: bool,
    default: FlagValue,
    current: FlagStorage,
    validator: Option<Validator>,
}

impl CommandLineFlag {
    /// Creates a flag that owns its current value.
    pub fn new(
        name: impl Into<String>,
        help: impl Into<String>,
        filename: impl Into<String>,
        current: FlagValue,
        default: FlagValue,
    ) -> Self {
        Self::with_storage(name, help, filename, FlagStorage::new(current), default)
    }

    /// Creates a flag whose current value lives in `storage`, which the
    /// caller may keep and read or write directly.
    pub fn with_storage(
        name: impl Into<String>,
        help: impl Into<String>,
        filename: impl Into<String>,
        storage: FlagStorage,
        default: FlagValue,
    ) -> Self {
        debug_assert_eq!(storage.kind(), default.kind());
        Self {
            name: name.into(),
            help: help.into(),
            filename: filename.into(),
            modified: false,
            default,
            current: storage,
            validator: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// The declaring file, without leading `./` components.
    pub fn clean_file_name(&self) -> &str {
        let mut name = self.filename.as_str();
        while let Some(rest) = name.strip_prefix("./") {
            name = rest;
        }
        name
    }

    pub fn kind(&self) -> FlagKind {
        self.default.kind()
    }

    pub fn type_name(&self) -> &'static str {
        self.kind().type_name()
    }

    pub fn current_value(&self) -> String {
        self.current.read().to_string()
    }

    pub fn default_value(&self) -> String {
        self.default.to_string()
    }

    /// A copy of the current typed value.
    pub fn current(&self) -> FlagValue {
        self.current.read().clone()
    }

    pub fn default_flag_value(&self) -> &FlagValue {
        &self.default
    }

    pub fn storage(&self) -> &FlagStorage {
        &self.current
    }

    /// Address of the current-value storage.
    pub fn flag_ptr(&self) -> usize {
        self.current.addr()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn validate_function(&self) -> Option<&Validator> {
        self.validator.as_ref()
    }

    pub(crate) fn set_validate_function(&mut self, validator: Option<Validator>) {
        self.validator = validator;
    }

    /// Marks the flag modified if its current value no longer equals the
    /// default, catching writes made straight to the storage.
    pub fn update_modified_bit(&mut self) {
        if !self.modified && *self.current.read() != self.default {
            self.modified = true;
        }
    }

    /// Runs the validator, if any, against `value`.
    pub fn validate(&self, value: &FlagValue) -> bool {
        match &self.validator {
            None => true,
            Some(validator) => value.validate(&self.name, validator),
        }
    }

    pub fn validate_current(&self) -> bool {
        let current = self.current.read();
        self.validate(&current)
    }

    /// Copies the mutable state of `other` into this flag.
    ///
    /// Name, help and filename are fixed at construction and never copied.
    pub fn copy_from(&mut self, other: &CommandLineFlag) {
        self.modified = other.modified;
        if self.current.addr() != other.current.addr() {
            let source = other.current.read();
            let mut current = self.current.write();
            if *current != *source {
                current.copy_from(&source);
            }
        }
        if self.default != other.default {
            self.default.copy_from(&other.default);
        }
        let same_validator = match (&self.validator, &other.validator) {
            (Some(a), Some(b)) => a.same_fn(b),
            (None, None) => true,
            _ => false,
        };
        if !same_validator {
            self.validator = other.validator;
        }
    }

    /// Creates an unregistered copy of this flag with its own storage.
    pub fn backup(&self) -> CommandLineFlag {
        let mut backup = CommandLineFlag::new(
            self.name.clone(),
            self.help.clone(),
            self.filename.clone(),
            self.kind().zero_value(),
            self.kind().zero_value(),
        );
        backup.copy_from(self);
        backup
    }

    /// Parses `value` into a scratch value and validates it.
    ///
    /// The flag itself is left untouched whatever the outcome.
    fn try_parse(&self, value: &str) -> Result<FlagValue, FlagError> {
        let mut tentative = self.default.new_default();
        if !tentative.parse_from(value) {
            return Err(FlagError::IllegalValue {
                value: value.to_string(),
                type_name: self.type_name(),
                name: self.name.clone(),
            });
        }
        if !self.validate(&tentative) {
            return Err(FlagError::FailedValidation {
                value: tentative.to_string(),
                name: self.name.clone(),
            });
        }
        Ok(tentative)
    }

    fn commit_current(&mut self, value: &str) -> Result<String, FlagError> {
        let parsed = self.try_parse(value)?;
        self.current.write().copy_from(&parsed);
        Ok(format!("{} set to {}\n", self.name, parsed))
    }

    /// Assigns `value` according to `mode`.
    ///
    /// Returns the "name set to value" message on success. On failure the
    /// flag keeps its previous state.
    pub fn set_locked(&mut self, value: &str, mode: FlagSettingMode) -> Result<String, FlagError> {
        self.update_modified_bit();
        match mode {
            FlagSettingMode::SetFlagsValue => {
                let message = self.commit_current(value)?;
                self.modified = true;
                Ok(message)
            }
            FlagSettingMode::SetFlagIfDefault => {
                if self.modified {
                    return Ok(format!("{} set to {}", self.name, self.current_value()));
                }
                let message = self.commit_current(value)?;
                self.modified = true;
                Ok(message)
            }
            FlagSettingMode::SetFlagsDefault => {
                let parsed = self.try_parse(value)?;
                self.default.copy_from(&parsed);
                if !self.modified {
                    self.current.write().copy_from(&parsed);
                }
                Ok(format!("{} set to {}\n", self.name, parsed))
            }
        }
    }

    /// Snapshots the externally visible state of this flag.
    pub fn fill_info(&mut self) -> CommandLineFlagInfo {
        self.update_modified_bit();
        CommandLineFlagInfo {
            name: self.name.clone(),
            type_name: self.type_name().to_string(),
            description: self.help.clone(),
            current_value: self.current_value(),
            default_value: self.default_value(),
            filename: self.clean_file_name().to_string(),
            has_validator_fn: self.validator.is_some(),
            is_default: !self.modified,
            flag_ptr: self.flag_ptr(),
        }
    }
}

/// Plain, detached description of a flag, as returned by the introspection
/// API.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CommandLineFlagInfo {
    /// The name of the flag.
    pub name: String,
    /// The type of the flag: `int32`, `string`, etc.
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub type_name: String,
    /// The help text.
    pub description: String,
    /// The current value, as text.
    pub current_value: String,
    /// The default value, as text.
    pub default_value: String,
    /// Cleaned name of the file declaring the flag.
    pub filename: String,
    /// Whether a validator is attached.
    pub has_validator_fn: bool,
    /// Whether the flag still has its default value and was never set.
    pub is_default: bool,
    /// Address of the flag's current-value storage.
    pub flag_ptr: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_flag(default: i32) -> CommandLineFlag {
        CommandLineFlag::new(
            "count",
            "how many",
            "src/main.rs",
            FlagValue::Int32(default),
            FlagValue::Int32(default),
        )
    }

    fn even(_: &str, value: i32) -> bool {
        value % 2 == 0
    }

    #[test]
    fn test_set_value_marks_modified() {
        let mut flag = int_flag(1);
        assert!(!flag.is_modified());
        let message = flag.set_locked("4", FlagSettingMode::SetFlagsValue).unwrap();
        assert_eq!(message, "count set to 4\n");
        assert_eq!(flag.current(), FlagValue::Int32(4));
        assert!(flag.is_modified());
    }

    #[test]
    fn test_failed_parse_leaves_value() {
        let mut flag = int_flag(1);
        let error = flag.set_locked("999999999999", FlagSettingMode::SetFlagsValue);
        assert!(matches!(error, Err(FlagError::IllegalValue { .. })));
        assert_eq!(flag.current(), FlagValue::Int32(1));
        assert!(!flag.is_modified());
    }

    #[test]
    fn test_failed_validation_leaves_value() {
        let mut flag = int_flag(2);
        flag.set_validate_function(Some(Validator::Int32(even)));
        let error = flag.set_locked("3", FlagSettingMode::SetFlagsValue);
        assert!(matches!(error, Err(FlagError::FailedValidation { .. })));
        assert_eq!(flag.current(), FlagValue::Int32(2));
        assert!(flag.set_locked("6", FlagSettingMode::SetFlagsValue).is_ok());
        assert_eq!(flag.current(), FlagValue::Int32(6));
    }

    #[test]
    fn test_set_if_default_only_once() {
        let mut flag = int_flag(1);
        flag.set_locked("5", FlagSettingMode::SetFlagIfDefault).unwrap();
        let message = flag.set_locked("9", FlagSettingMode::SetFlagIfDefault).unwrap();
        assert_eq!(message, "count set to 5");
        assert_eq!(flag.current(), FlagValue::Int32(5));
    }

    #[test]
    fn test_set_default_propagates_until_modified() {
        let mut flag = int_flag(1);
        flag.set_locked("7", FlagSettingMode::SetFlagsDefault).unwrap();
        assert_eq!(flag.default_value(), "7");
        assert_eq!(flag.current_value(), "7");
        assert!(!flag.is_modified());

        flag.set_locked("8", FlagSettingMode::SetFlagsValue).unwrap();
        flag.set_locked("9", FlagSettingMode::SetFlagsDefault).unwrap();
        assert_eq!(flag.default_value(), "9");
        assert_eq!(flag.current_value(), "8");
    }

    #[test]
    fn test_out_of_band_write_detected() {
        let mut flag = int_flag(1);
        *flag.storage().write() = FlagValue::Int32(10);
        assert!(!flag.is_modified());
        let info = flag.fill_info();
        assert!(!info.is_default);
        assert!(flag.is_modified());
    }

    #[test]
    fn test_backup_and_copy_from() {
        let mut flag = int_flag(1);
        flag.set_validate_function(Some(Validator::Int32(even)));
        flag.set_locked("4", FlagSettingMode::SetFlagsValue).unwrap();

        let backup = flag.backup();
        assert_ne!(backup.flag_ptr(), flag.flag_ptr());
        assert_eq!(backup.current(), FlagValue::Int32(4));
        assert!(backup.is_modified());
        assert!(backup.validate_function().is_some());

        flag.set_validate_function(None);
        flag.set_locked("12", FlagSettingMode::SetFlagsValue).unwrap();
        flag.copy_from(&backup);
        assert_eq!(flag.current(), FlagValue::Int32(4));
        assert!(flag.validate_function().is_some());
    }

    #[test]
    fn test_fill_info() {
        let mut flag = CommandLineFlag::new(
            "verbose",
            "talk more",
            "./src/log.rs",
            FlagValue::Bool(false),
            FlagValue::Bool(false),
        );
        let info = flag.fill_info();
        assert_eq!(info.name, "verbose");
        assert_eq!(info.type_name, "bool");
        assert_eq!(info.description, "talk more");
        assert_eq!(info.current_value, "false");
        assert_eq!(info.default_value, "false");
        assert_eq!(info.filename, "src/log.rs");
        assert!(info.is_default);
        assert!(!info.has_validator_fn);
        assert_eq!(info.flag_ptr, flag.flag_ptr());
    }
}
