//! Port traits the domain is driven through.

pub mod alert_port;
pub mod config_port;
pub mod export_port;
pub mod ledger_port;
pub mod preference_port;
pub mod watchlist_port;

use alert_port::AlertPort;
use ledger_port::LedgerPort;
use preference_port::PreferencePort;
use watchlist_port::WatchlistPort;

/// Everything a storage backend provides.
pub trait LedgerStore: LedgerPort + WatchlistPort + AlertPort + PreferencePort {}

impl<T: LedgerPort + WatchlistPort + AlertPort + PreferencePort> LedgerStore for T {}
