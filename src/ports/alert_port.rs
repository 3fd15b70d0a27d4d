//! Alert storage. Alerts are data only; nothing here evaluates them.

use crate::domain::alert::{Alert, AlertKind};
use crate::domain::error::LedgerError;

pub trait AlertPort {
    fn add_alert(
        &self,
        user_id: i64,
        symbol: &str,
        kind: AlertKind,
        value: f64,
    ) -> Result<Alert, LedgerError>;

    fn delete_alert(&self, alert_id: i64) -> Result<bool, LedgerError>;

    fn set_alert_active(&self, alert_id: i64, active: bool) -> Result<bool, LedgerError>;

    fn list_active_alerts(&self, user_id: i64) -> Result<Vec<Alert>, LedgerError>;
}
