//! Positions: the (quantity, weighted-average cost) pair held for one symbol.

/// Quantities closer to zero than this are treated as zero.
pub const QUANTITY_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub quantity: f64,
    pub average_price: f64,
}

impl Position {
    pub fn open(symbol: &str, quantity: f64, price: f64) -> Self {
        Position {
            symbol: symbol.to_string(),
            quantity,
            average_price: price,
        }
    }

    /// Amount paid for the current quantity at the blended average.
    pub fn cost_basis(&self) -> f64 {
        self.quantity * self.average_price
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity * (price - self.average_price)
    }

    /// Merge a purchase into the position using a quantity-weighted average.
    pub fn with_buy(&self, quantity: f64, price: f64) -> Position {
        let new_quantity = self.quantity + quantity;
        let total_cost = self.cost_basis() + quantity * price;
        Position {
            symbol: self.symbol.clone(),
            quantity: new_quantity,
            average_price: total_cost / new_quantity,
        }
    }

    /// Reduce the position; `None` once nothing meaningful remains.
    pub fn with_sell(&self, quantity: f64) -> Option<Position> {
        let remaining = self.quantity - quantity;
        if remaining <= QUANTITY_EPSILON {
            return None;
        }
        Some(Position {
            symbol: self.symbol.clone(),
            quantity: remaining,
            average_price: self.average_price,
        })
    }
}

/// A portfolio row joined with its stock, as returned by holding queries.
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub portfolio_id: i64,
    pub stock_id: i64,
    pub symbol: String,
    pub company_name: String,
    pub quantity: f64,
    pub average_price: f64,
}

impl Holding {
    pub fn position(&self) -> Position {
        Position {
            symbol: self.symbol.clone(),
            quantity: self.quantity,
            average_price: self.average_price,
        }
    }

    pub fn invested(&self) -> f64 {
        self.quantity * self.average_price
    }
}
