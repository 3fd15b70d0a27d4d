//! Core domain types and rules.

pub mod alert;
pub mod clock;
pub mod config_validation;
pub mod demo;
pub mod error;
pub mod ledger;
pub mod portfolio;
pub mod position;
pub mod preferences;
pub mod stock;
pub mod trade;
pub mod user;
pub mod watchlist;
