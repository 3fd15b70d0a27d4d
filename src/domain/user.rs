//! Users and their designated primary portfolio and watchlist.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub primary_portfolio_id: Option<i64>,
    pub primary_watchlist_id: Option<i64>,
}
