//! Stored alert conditions. Evaluation and delivery happen elsewhere.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    PriceAbove,
    PriceBelow,
    PercentChange,
    Earnings,
    News,
}

impl AlertKind {
    pub const ALL: [AlertKind; 5] = [
        AlertKind::PriceAbove,
        AlertKind::PriceBelow,
        AlertKind::PercentChange,
        AlertKind::Earnings,
        AlertKind::News,
    ];

    /// Label stored in the `alert_type` column.
    pub fn label(&self) -> &'static str {
        match self {
            AlertKind::PriceAbove => "Price Above",
            AlertKind::PriceBelow => "Price Below",
            AlertKind::PercentChange => "% Change",
            AlertKind::Earnings => "Earnings",
            AlertKind::News => "News",
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            AlertKind::PriceAbove => "price-above",
            AlertKind::PriceBelow => "price-below",
            AlertKind::PercentChange => "pct-change",
            AlertKind::Earnings => "earnings",
            AlertKind::News => "news",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AlertKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        AlertKind::ALL
            .iter()
            .copied()
            .find(|k| k.label().eq_ignore_ascii_case(wanted) || k.slug().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown alert kind: {wanted}"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub id: i64,
    pub user_id: i64,
    pub stock_id: i64,
    pub symbol: String,
    pub kind: AlertKind,
    pub value: f64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}
