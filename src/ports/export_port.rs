//! Tabular export of holdings and trade history.

use std::io::Write;

use crate::domain::error::LedgerError;
use crate::domain::position::Holding;
use crate::domain::trade::Transaction;

pub trait ExportPort {
    fn write_holdings(&self, holdings: &[Holding], out: &mut dyn Write) -> Result<(), LedgerError>;

    fn write_transactions(
        &self,
        transactions: &[Transaction],
        out: &mut dyn Write,
    ) -> Result<(), LedgerError>;
}
