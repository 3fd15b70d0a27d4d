//! Sample data for a fresh database: one user with a watchlist, a few
//! holdings, preferences and alerts.

use tracing::info;

use crate::domain::alert::AlertKind;
use crate::domain::error::LedgerError;
use crate::domain::stock::StockDetails;
use crate::domain::trade::TransactionType;
use crate::domain::user::User;
use crate::ports::LedgerStore;

pub const DEMO_USERNAME: &str = "demo_user";
pub const DEMO_EMAIL: &str = "demo@example.com";

pub fn demo_stocks() -> Vec<StockDetails> {
    vec![
        StockDetails::new("AAPL", "Apple Inc.", "Technology", "Consumer Electronics"),
        StockDetails::new("MSFT", "Microsoft Corporation", "Technology", "Software"),
        StockDetails::new("GOOGL", "Alphabet Inc.", "Technology", "Internet Services"),
        StockDetails::new("AMZN", "Amazon.com Inc.", "Consumer Cyclical", "Internet Retail"),
        StockDetails::new("TSLA", "Tesla, Inc.", "Consumer Cyclical", "Auto Manufacturers"),
        StockDetails::new("NVDA", "NVIDIA Corporation", "Technology", "Semiconductors"),
        StockDetails::new("META", "Meta Platforms, Inc.", "Technology", "Internet Services"),
        StockDetails::new("NFLX", "Netflix, Inc.", "Communication Services", "Entertainment"),
    ]
}

const DEMO_WATCHLIST: [&str; 4] = ["AAPL", "MSFT", "GOOGL", "AMZN"];

const DEMO_HOLDINGS: [(&str, f64, f64); 4] = [
    ("AAPL", 10.0, 155.75),
    ("MSFT", 5.0, 285.30),
    ("GOOGL", 3.0, 125.50),
    ("NVDA", 8.0, 212.80),
];

const DEMO_ALERTS: [(&str, AlertKind, f64); 3] = [
    ("AAPL", AlertKind::PriceAbove, 180.0),
    ("MSFT", AlertKind::PriceBelow, 260.0),
    ("TSLA", AlertKind::PercentChange, 5.0),
];

/// Populate the demo account, finishing any earlier run that stopped part
/// way. Returns `None` when every demo item is already in place.
///
/// Each step is skipped per item: buys already in the transaction log and
/// active alerts with the same symbol and kind are not written again.
pub fn seed_demo_data(store: &dyn LedgerStore) -> Result<Option<User>, LedgerError> {
    let existing = store.find_user(DEMO_USERNAME)?;
    let resuming = existing.is_some();
    let user = match existing {
        Some(user) => user,
        None => store.create_user(DEMO_USERNAME, DEMO_EMAIL)?,
    };

    let mut written = !resuming;

    for details in demo_stocks() {
        store.upsert_stock(&details)?;
    }

    let watchlist = store.primary_watchlist(user.id)?;
    for symbol in DEMO_WATCHLIST {
        written |= store.add_to_watchlist(watchlist.id, symbol)?;
    }

    let logged = store.list_transactions(user.id, None)?;
    for (symbol, quantity, price) in DEMO_HOLDINGS {
        let already = logged
            .iter()
            .any(|t| t.symbol == symbol && t.kind == TransactionType::Buy);
        if !already {
            store.record_transaction(user.id, symbol, TransactionType::Buy, quantity, price)?;
            written = true;
        }
    }

    store.get_preferences(user.id)?;

    let alerts = store.list_active_alerts(user.id)?;
    for (symbol, kind, value) in DEMO_ALERTS {
        if !alerts.iter().any(|a| a.symbol == symbol && a.kind == kind) {
            store.add_alert(user.id, symbol, kind, value)?;
            written = true;
        }
    }

    if !written {
        info!("demo data already present");
        return Ok(None);
    }

    info!(user_id = user.id, resumed = resuming, "seeded demo data");
    Ok(store.get_user(user.id)?.or(Some(user)))
}
