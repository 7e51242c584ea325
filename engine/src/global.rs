//! Process-wide sync manager.
//!
//! Two managers writing the same storage key would overwrite each other's
//! queue, so an application installs exactly one. Library code should take
//! a [`SyncManager`] as a parameter; only application wiring reaches for
//! this accessor.

use crate::SyncManager;
use once_cell::sync::OnceCell;

static MANAGER: OnceCell<SyncManager> = OnceCell::new();

/// Install the process-wide manager.
///
/// Returns the manager back if one is already installed.
pub fn install(manager: SyncManager) -> Result<(), SyncManager> {
    MANAGER.set(manager)
}

/// The installed manager, if any.
pub fn get() -> Option<&'static SyncManager> {
    MANAGER.get()
}

/// The installed manager, building it with `init` on first use.
pub fn get_or_init(init: impl FnOnce() -> SyncManager) -> &'static SyncManager {
    MANAGER.get_or_init(init)
}
