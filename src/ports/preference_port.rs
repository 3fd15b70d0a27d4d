//! Per-user preference storage.

use crate::domain::error::LedgerError;
use crate::domain::preferences::{Preferences, PreferencesUpdate};

pub trait PreferencePort {
    /// Stored preferences, creating the default row on first access.
    fn get_preferences(&self, user_id: i64) -> Result<Preferences, LedgerError>;

    /// Overwrite only the fields set in `update`.
    fn update_preferences(
        &self,
        user_id: i64,
        update: &PreferencesUpdate,
    ) -> Result<(), LedgerError>;
}
