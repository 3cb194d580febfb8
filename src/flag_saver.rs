use std::sync::Arc;

use crate::{CommandLineFlag, FlagError, FlagRegistry, global_registry};

/// A point-in-time copy of every flag in a registry.
///
/// Backups are unregistered flags with their own storage, so later writes
/// to the live flags leave them untouched.
#[derive(Debug)]
pub struct FlagSaverImpl {
    registry: Arc<FlagRegistry>,
    backup: Vec<CommandLineFlag>,
    saved: bool,
}

impl FlagSaverImpl {
    pub fn new(registry: Arc<FlagRegistry>) -> Self {
        Self {
            registry,
            backup: Vec::new(),
            saved: false,
        }
    }

    /// Copies the state of every flag. Can be done only once.
    pub fn save_from_registry(&mut self) -> Result<(), FlagError> {
        if self.saved {
            return Err(FlagError::SnapshotAlreadySaved);
        }
        self.save();
        Ok(())
    }

    fn save(&mut self) {
        let mut flags = self.registry.lock();
        self.backup = flags
            .iter_mut()
            .map(|flag| {
                flag.update_modified_bit();
                flag.backup()
            })
            .collect();
        self.saved = true;
    }

    /// Copies the saved state back onto the live flags.
    ///
    /// Flags removed from the registry since the save are skipped.
    pub fn restore_to_registry(&self) {
        let mut flags = self.registry.lock();
        for backup in &self.backup {
            match flags.find_flag_locked_mut(backup.name()) {
                Some(flag) => flag.copy_from(backup),
                None => tracing::warn!(
                    flag = backup.name(),
                    "flag was removed after being saved; not restored"
                ),
            }
        }
    }

    /// Number of saved flags.
    pub fn len(&self) -> usize {
        self.backup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backup.is_empty()
    }
}

/// Saves every flag on creation and restores them when dropped.
///
/// # Examples
///
/// ```
/// use cmdflags::{FlagSaver, define_int32};
///
/// define_int32!(saver_example_depth, 2, "search depth");
///
/// {
///     let _saver = FlagSaver::new();
///     FLAGS_saver_example_depth.set(10);
///     assert_eq!(FLAGS_saver_example_depth.get(), 10);
/// }
/// assert_eq!(FLAGS_saver_example_depth.get(), 2);
/// ```
#[derive(Debug)]
pub struct FlagSaver {
    inner: Option<FlagSaverImpl>,
}

impl FlagSaver {
    /// Snapshots the global registry.
    pub fn new() -> Self {
        Self::for_registry(global_registry())
    }

    /// Snapshots `registry`.
    pub fn for_registry(registry: Arc<FlagRegistry>) -> Self {
        let mut inner = FlagSaverImpl::new(registry);
        inner.save();
        Self { inner: Some(inner) }
    }

    /// Keeps the current flag values: nothing is restored on drop.
    pub fn discard(&mut self) {
        self.inner = None;
    }
}

impl Default for FlagSaver {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FlagSaver {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.restore_to_registry();
        }
    }
}
