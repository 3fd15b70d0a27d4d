//! Stock records and symbol handling.

use chrono::{DateTime, Utc};

use super::error::LedgerError;

#[derive(Debug, Clone, PartialEq)]
pub struct Stock {
    pub id: i64,
    pub symbol: String,
    pub company_name: String,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub last_updated: DateTime<Utc>,
}

/// Descriptive data supplied when a stock is known up front (e.g. demo data).
#[derive(Debug, Clone, PartialEq)]
pub struct StockDetails {
    pub symbol: String,
    pub company_name: String,
    pub sector: Option<String>,
    pub industry: Option<String>,
}

impl StockDetails {
    pub fn new(symbol: &str, company_name: &str, sector: &str, industry: &str) -> Self {
        StockDetails {
            symbol: symbol.to_string(),
            company_name: company_name.to_string(),
            sector: Some(sector.to_string()),
            industry: Some(industry.to_string()),
        }
    }
}

/// Trim and upper-case a ticker; empty input is rejected.
pub fn normalize_symbol(symbol: &str) -> Result<String, LedgerError> {
    let normalized = symbol.trim().to_uppercase();
    if normalized.is_empty() {
        return Err(LedgerError::invalid("symbol", "must not be empty"));
    }
    if normalized.chars().any(char::is_whitespace) {
        return Err(LedgerError::invalid(
            "symbol",
            format!("must not contain whitespace: {normalized:?}"),
        ));
    }
    Ok(normalized)
}

/// Display name given to a stock created on first reference.
pub fn placeholder_name(symbol: &str) -> String {
    format!("{symbol} Inc.")
}
