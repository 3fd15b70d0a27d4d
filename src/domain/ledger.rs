//! Trade planning: how a buy or sell changes the holding for its symbol.
//!
//! Storage adapters look up the current position, ask [`plan_trade`] what to
//! do, then apply the resulting [`TradePlan`] inside one database transaction.

use std::fmt;
use std::str::FromStr;

use super::error::LedgerError;
use super::position::{Position, QUANTITY_EPSILON};
use super::trade::{TradeRequest, Transaction, TransactionType};

/// What to do with a sell that exceeds the quantity held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SellPolicy {
    /// Fail with `InsufficientHoldings` and write nothing.
    #[default]
    Reject,
    /// Sell only what is held; record the reduced quantity.
    Clamp,
    /// Always record the sell; close the position if it goes to zero or below.
    Record,
}

impl SellPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SellPolicy::Reject => "reject",
            SellPolicy::Clamp => "clamp",
            SellPolicy::Record => "record",
        }
    }
}

impl fmt::Display for SellPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SellPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(SellPolicy::Reject),
            "clamp" => Ok(SellPolicy::Clamp),
            "record" => Ok(SellPolicy::Record),
            other => Err(format!(
                "unknown sell policy {other:?} (expected reject, clamp or record)"
            )),
        }
    }
}

/// Effect of a trade on the portfolio item for its symbol.
#[derive(Debug, Clone, PartialEq)]
pub enum HoldingChange {
    Opened(Position),
    Increased(Position),
    Reduced(Position),
    Closed,
    Unchanged,
}

impl HoldingChange {
    /// Position left after the trade, if any.
    pub fn position(&self) -> Option<&Position> {
        match self {
            HoldingChange::Opened(p) | HoldingChange::Increased(p) | HoldingChange::Reduced(p) => {
                Some(p)
            }
            HoldingChange::Closed | HoldingChange::Unchanged => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradePlan {
    /// Quantity written to the transaction log.
    pub recorded_quantity: f64,
    pub change: HoldingChange,
}

/// Result of `record_transaction`: the appended row and what happened to the holding.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeOutcome {
    pub transaction: Transaction,
    pub change: HoldingChange,
}

pub fn plan_trade(
    current: Option<&Position>,
    trade: &TradeRequest,
    policy: SellPolicy,
) -> Result<TradePlan, LedgerError> {
    match trade.kind {
        TransactionType::Buy => {
            let change = match current {
                None => HoldingChange::Opened(Position::open(
                    &trade.symbol,
                    trade.quantity,
                    trade.price,
                )),
                Some(pos) => {
                    let blended = pos.with_buy(trade.quantity, trade.price);
                    if !blended.quantity.is_finite() || !blended.average_price.is_finite() {
                        return Err(LedgerError::invalid(
                            "quantity",
                            format!(
                                "buying {} {} at {} overflows the held position",
                                trade.quantity, trade.symbol, trade.price
                            ),
                        ));
                    }
                    HoldingChange::Increased(blended)
                }
            };
            Ok(TradePlan {
                recorded_quantity: trade.quantity,
                change,
            })
        }
        TransactionType::Sell => plan_sell(current, trade, policy),
    }
}

fn plan_sell(
    current: Option<&Position>,
    trade: &TradeRequest,
    policy: SellPolicy,
) -> Result<TradePlan, LedgerError> {
    let held = current.map(|p| p.quantity).unwrap_or(0.0);
    let insufficient = || LedgerError::InsufficientHoldings {
        symbol: trade.symbol.clone(),
        held,
        requested: trade.quantity,
    };

    let recorded_quantity = match policy {
        SellPolicy::Reject if trade.quantity > held + QUANTITY_EPSILON => {
            return Err(insufficient());
        }
        SellPolicy::Clamp if held <= QUANTITY_EPSILON => return Err(insufficient()),
        SellPolicy::Clamp => trade.quantity.min(held),
        SellPolicy::Reject | SellPolicy::Record => trade.quantity,
    };

    let change = match current {
        None => HoldingChange::Unchanged,
        Some(pos) => match pos.with_sell(recorded_quantity) {
            Some(reduced) => HoldingChange::Reduced(reduced),
            None => HoldingChange::Closed,
        },
    };

    Ok(TradePlan {
        recorded_quantity,
        change,
    })
}
