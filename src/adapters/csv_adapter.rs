//! CSV export of holdings and transaction history.

use crate::domain::clock;
use crate::domain::error::LedgerError;
use crate::domain::position::Holding;
use crate::domain::trade::Transaction;
use crate::ports::export_port::ExportPort;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvExportAdapter;

impl CsvExportAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Serialize)]
struct HoldingRecord<'a> {
    symbol: &'a str,
    company_name: &'a str,
    quantity: f64,
    average_price: f64,
    invested: f64,
}

#[derive(Serialize)]
struct TransactionRecord<'a> {
    date: String,
    symbol: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    quantity: f64,
    price: f64,
    total_value: f64,
}

fn csv_err(e: csv::Error) -> LedgerError {
    LedgerError::Serialization {
        reason: format!("CSV write error: {e}"),
    }
}

fn write_records<T: Serialize>(
    records: impl IntoIterator<Item = T>,
    out: &mut dyn Write,
) -> Result<(), LedgerError> {
    let mut writer = csv::Writer::from_writer(out);
    for record in records {
        writer.serialize(record).map_err(csv_err)?;
    }
    writer.flush()?;
    Ok(())
}

impl ExportPort for CsvExportAdapter {
    fn write_holdings(&self, holdings: &[Holding], out: &mut dyn Write) -> Result<(), LedgerError> {
        write_records(
            holdings.iter().map(|h| HoldingRecord {
                symbol: &h.symbol,
                company_name: &h.company_name,
                quantity: h.quantity,
                average_price: h.average_price,
                invested: h.invested(),
            }),
            out,
        )
    }

    fn write_transactions(
        &self,
        transactions: &[Transaction],
        out: &mut dyn Write,
    ) -> Result<(), LedgerError> {
        write_records(
            transactions.iter().map(|t| TransactionRecord {
                date: clock::to_text(&t.executed_at),
                symbol: &t.symbol,
                kind: t.kind.as_str(),
                quantity: t.quantity,
                price: t.price,
                total_value: t.total_value(),
            }),
            out,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trade::TransactionType;
    use chrono::{TimeZone, Utc};

    fn holding(symbol: &str, quantity: f64, average_price: f64) -> Holding {
        Holding {
            portfolio_id: 1,
            stock_id: 1,
            symbol: symbol.to_string(),
            company_name: format!("{symbol} Corp"),
            quantity,
            average_price,
        }
    }

    #[test]
    fn holdings_have_header_and_rows() {
        let mut buf = Vec::new();
        CsvExportAdapter::new()
            .write_holdings(&[holding("AAPL", 10.0, 155.5), holding("MSFT", 2.0, 300.0)], &mut buf)
            .unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "symbol,company_name,quantity,average_price,invested");
        assert_eq!(lines[1], "AAPL,AAPL Corp,10.0,155.5,1555.0");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn company_names_with_commas_are_quoted() {
        let mut h = holding("TSLA", 1.0, 200.0);
        h.company_name = "Tesla, Inc.".to_string();
        let mut buf = Vec::new();
        CsvExportAdapter::new().write_holdings(&[h], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("\"Tesla, Inc.\""));
    }

    #[test]
    fn transactions_include_type_and_total() {
        let tx = Transaction {
            id: 7,
            user_id: 1,
            stock_id: 2,
            symbol: "NVDA".to_string(),
            kind: TransactionType::Sell,
            quantity: 2.0,
            price: 50.25,
            executed_at: Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap(),
        };
        let mut buf = Vec::new();
        CsvExportAdapter::new().write_transactions(&[tx], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "date,symbol,type,quantity,price,total_value");
        assert_eq!(lines[1], "2024-03-01T14:30:00.000000Z,NVDA,Sell,2.0,50.25,100.5");
    }

    #[test]
    fn empty_input_writes_nothing() {
        let mut buf = Vec::new();
        CsvExportAdapter::new().write_holdings(&[], &mut buf).unwrap();
        assert!(buf.is_empty());
    }
}
