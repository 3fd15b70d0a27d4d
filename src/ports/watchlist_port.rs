//! Watchlist membership.

use crate::domain::error::LedgerError;
use crate::domain::watchlist::{Watchlist, WatchlistEntry};

pub trait WatchlistPort {
    fn create_watchlist(&self, user_id: i64, name: &str) -> Result<Watchlist, LedgerError>;

    /// The user's designated watchlist, created on first use.
    fn primary_watchlist(&self, user_id: i64) -> Result<Watchlist, LedgerError>;

    fn set_primary_watchlist(&self, user_id: i64, watchlist_id: i64) -> Result<bool, LedgerError>;

    fn list_watchlists(&self, user_id: i64) -> Result<Vec<Watchlist>, LedgerError>;

    fn list_watchlist_stocks(&self, watchlist_id: i64) -> Result<Vec<WatchlistEntry>, LedgerError>;

    /// True if the symbol was added, false if it was already present or the
    /// watchlist does not exist.
    fn add_to_watchlist(&self, watchlist_id: i64, symbol: &str) -> Result<bool, LedgerError>;

    fn remove_from_watchlist(&self, watchlist_id: i64, symbol: &str) -> Result<bool, LedgerError>;

    /// Deletes the watchlist together with its items.
    fn delete_watchlist(&self, watchlist_id: i64) -> Result<bool, LedgerError>;
}
