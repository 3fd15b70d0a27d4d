//! Portfolios and their valuation against caller-supplied prices.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::position::Holding;

pub const DEFAULT_PORTFOLIO_NAME: &str = "My Portfolio";

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HoldingValuation {
    pub symbol: String,
    pub quantity: f64,
    pub average_price: f64,
    pub current_price: f64,
    pub invested: f64,
    pub current_value: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioValuation {
    pub holdings: Vec<HoldingValuation>,
    pub total_invested: f64,
    pub total_value: f64,
    pub total_pnl: f64,
    pub total_pnl_pct: f64,
}

fn pct(pnl: f64, invested: f64) -> f64 {
    if invested > 0.0 {
        pnl * 100.0 / invested
    } else {
        0.0
    }
}

impl PortfolioValuation {
    /// Value each holding at `prices[symbol]`, falling back to its average price
    /// when no quote is available.
    pub fn compute(holdings: &[Holding], prices: &HashMap<String, f64>) -> Self {
        let rows: Vec<HoldingValuation> = holdings
            .iter()
            .map(|h| {
                let current_price = prices.get(&h.symbol).copied().unwrap_or(h.average_price);
                let position = h.position();
                let invested = position.cost_basis();
                let current_value = position.market_value(current_price);
                let pnl = position.unrealized_pnl(current_price);
                HoldingValuation {
                    symbol: h.symbol.clone(),
                    quantity: h.quantity,
                    average_price: h.average_price,
                    current_price,
                    invested,
                    current_value,
                    pnl,
                    pnl_pct: pct(pnl, invested),
                }
            })
            .collect();

        let total_invested: f64 = rows.iter().map(|r| r.invested).sum();
        let total_value: f64 = rows.iter().map(|r| r.current_value).sum();
        let total_pnl = total_value - total_invested;

        PortfolioValuation {
            holdings: rows,
            total_invested,
            total_value,
            total_pnl,
            total_pnl_pct: pct(total_pnl, total_invested),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn holding(symbol: &str, quantity: f64, average_price: f64) -> Holding {
        Holding {
            portfolio_id: 1,
            stock_id: 1,
            symbol: symbol.to_string(),
            company_name: format!("{symbol} Inc."),
            quantity,
            average_price,
        }
    }

    #[test]
    fn empty_portfolio_values_to_zero() {
        let valuation = PortfolioValuation::compute(&[], &HashMap::new());
        assert!(valuation.holdings.is_empty());
        assert_relative_eq!(valuation.total_value, 0.0);
        assert_relative_eq!(valuation.total_pnl_pct, 0.0);
    }

    #[test]
    fn values_with_quotes() {
        let holdings = vec![holding("AAPL", 10.0, 100.0), holding("MSFT", 5.0, 200.0)];
        let mut prices = HashMap::new();
        prices.insert("AAPL".to_string(), 110.0);
        prices.insert("MSFT".to_string(), 180.0);

        let v = PortfolioValuation::compute(&holdings, &prices);
        assert_eq!(v.holdings.len(), 2);
        assert_relative_eq!(v.holdings[0].pnl, 100.0);
        assert_relative_eq!(v.holdings[0].pnl_pct, 10.0);
        assert_relative_eq!(v.holdings[1].pnl, -100.0);
        assert_relative_eq!(v.total_invested, 2000.0);
        assert_relative_eq!(v.total_value, 2000.0);
        assert_relative_eq!(v.total_pnl, 0.0);
    }

    #[test]
    fn missing_quote_falls_back_to_average() {
        let holdings = vec![holding("NVDA", 8.0, 212.80)];
        let v = PortfolioValuation::compute(&holdings, &HashMap::new());
        assert_relative_eq!(v.holdings[0].current_price, 212.80);
        assert_relative_eq!(v.holdings[0].pnl, 0.0);
        assert_relative_eq!(v.total_pnl_pct, 0.0);
    }
}
