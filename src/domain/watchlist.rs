//! Watchlists: named symbol lists tracked without holding a position.

use chrono::{DateTime, Utc};

pub const DEFAULT_WATCHLIST_NAME: &str = "My Watchlist";

#[derive(Debug, Clone, PartialEq)]
pub struct Watchlist {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A stock on a watchlist, with the time it was added.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchlistEntry {
    pub watchlist_id: i64,
    pub stock_id: i64,
    pub symbol: String,
    pub company_name: String,
    pub added_at: DateTime<Utc>,
}
