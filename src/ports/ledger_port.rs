//! Users, stocks, portfolios and the transaction log.

use crate::domain::error::LedgerError;
use crate::domain::ledger::TradeOutcome;
use crate::domain::portfolio::Portfolio;
use crate::domain::position::Holding;
use crate::domain::stock::{Stock, StockDetails};
use crate::domain::trade::{Transaction, TransactionType};
use crate::domain::user::User;

pub trait LedgerPort {
    fn create_user(&self, username: &str, email: &str) -> Result<User, LedgerError>;

    fn get_or_create_user(&self, username: &str, email: &str) -> Result<User, LedgerError>;

    fn get_user(&self, user_id: i64) -> Result<Option<User>, LedgerError>;

    fn find_user(&self, username: &str) -> Result<Option<User>, LedgerError>;

    /// Insert or refresh a stock's descriptive fields.
    fn upsert_stock(&self, details: &StockDetails) -> Result<Stock, LedgerError>;

    fn get_stock(&self, symbol: &str) -> Result<Option<Stock>, LedgerError>;

    fn list_stocks(&self) -> Result<Vec<Stock>, LedgerError>;

    /// Append a trade to the log and apply it to the user's primary portfolio,
    /// atomically. Unknown symbols are created with a placeholder name.
    fn record_transaction(
        &self,
        user_id: i64,
        symbol: &str,
        kind: TransactionType,
        quantity: f64,
        price: f64,
    ) -> Result<TradeOutcome, LedgerError>;

    fn create_portfolio(&self, user_id: i64, name: &str) -> Result<Portfolio, LedgerError>;

    /// The user's designated portfolio, created on first use.
    fn primary_portfolio(&self, user_id: i64) -> Result<Portfolio, LedgerError>;

    /// Returns false when the portfolio does not exist or belongs to someone else.
    fn set_primary_portfolio(&self, user_id: i64, portfolio_id: i64) -> Result<bool, LedgerError>;

    fn list_portfolios(&self, user_id: i64) -> Result<Vec<Portfolio>, LedgerError>;

    fn list_holdings(&self, portfolio_id: i64) -> Result<Vec<Holding>, LedgerError>;

    /// Newest first; `limit` of `None` returns the whole log.
    fn list_transactions(
        &self,
        user_id: i64,
        limit: Option<usize>,
    ) -> Result<Vec<Transaction>, LedgerError>;
}
