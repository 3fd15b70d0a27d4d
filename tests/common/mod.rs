#![allow(dead_code)]

use stockledger::adapters::sqlite_adapter::SqliteAdapter;
use stockledger::domain::ledger::SellPolicy;
use stockledger::domain::position::Holding;
use stockledger::domain::user::User;
use stockledger::ports::ledger_port::LedgerPort;

pub fn store() -> SqliteAdapter {
    let adapter = SqliteAdapter::in_memory().unwrap();
    adapter.initialize_schema().unwrap();
    adapter
}

pub fn store_with_policy(policy: SellPolicy) -> SqliteAdapter {
    store().with_sell_policy(policy)
}

pub fn make_user(store: &SqliteAdapter, username: &str) -> User {
    store
        .create_user(username, &format!("{username}@example.com"))
        .unwrap()
}

pub fn holdings(store: &SqliteAdapter, user: &User) -> Vec<Holding> {
    let portfolio = store.primary_portfolio(user.id).unwrap();
    store.list_holdings(portfolio.id).unwrap()
}

pub fn holding(store: &SqliteAdapter, user: &User, symbol: &str) -> Option<Holding> {
    holdings(store, user).into_iter().find(|h| h.symbol == symbol)
}

pub fn stock_rows(store: &SqliteAdapter, symbol: &str) -> usize {
    store
        .list_stocks()
        .unwrap()
        .iter()
        .filter(|s| s.symbol == symbol)
        .count()
}
