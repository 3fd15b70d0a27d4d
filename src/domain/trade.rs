//! Trade instructions and the append-only transaction record.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use super::error::LedgerError;
use super::stock::normalize_symbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    Buy,
    Sell,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Buy => "Buy",
            TransactionType::Sell => "Sell",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(TransactionType::Buy),
            "sell" => Ok(TransactionType::Sell),
            other => Err(LedgerError::invalid(
                "transaction type",
                format!("expected buy or sell, got {other:?}"),
            )),
        }
    }
}

/// A validated buy/sell instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRequest {
    pub symbol: String,
    pub kind: TransactionType,
    pub quantity: f64,
    pub price: f64,
}

impl TradeRequest {
    /// Normalize the symbol and check quantity and price are finite and positive.
    pub fn new(
        symbol: &str,
        kind: TransactionType,
        quantity: f64,
        price: f64,
    ) -> Result<Self, LedgerError> {
        let symbol = normalize_symbol(symbol)?;
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(LedgerError::invalid(
                "quantity",
                format!("must be positive, got {quantity}"),
            ));
        }
        if !price.is_finite() || price <= 0.0 {
            return Err(LedgerError::invalid(
                "price",
                format!("must be positive, got {price}"),
            ));
        }
        Ok(TradeRequest {
            symbol,
            kind,
            quantity,
            price,
        })
    }

    pub fn value(&self) -> f64 {
        self.quantity * self.price
    }
}

/// One persisted trade, joined with its stock symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub stock_id: i64,
    pub symbol: String,
    pub kind: TransactionType,
    pub quantity: f64,
    pub price: f64,
    pub executed_at: DateTime<Utc>,
}

impl Transaction {
    pub fn total_value(&self) -> f64 {
        self.quantity * self.price
    }
}
