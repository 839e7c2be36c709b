use crate::domain::charge::{Amount, BuildingId, UnixSeconds};
use crate::domain::ledger::LedgerItem;
use crate::domain::ports::Receipt;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct LedgerRow<'a> {
    due_at: UnixSeconds,
    building_id: &'a BuildingId,
    amount: Amount,
    charge_count: usize,
    charge_ids: String,
}

impl<'a> From<&'a LedgerItem> for LedgerRow<'a> {
    fn from(item: &'a LedgerItem) -> Self {
        let charge_ids = item
            .charges()
            .iter()
            .map(|charge| charge.id.as_str())
            .collect::<Vec<_>>()
            .join(";");
        Self {
            due_at: item.due_at(),
            building_id: item.building_id(),
            amount: item.amount(),
            charge_count: item.charges().len(),
            charge_ids,
        }
    }
}

/// Writes ledger items and receipts to any `Write` sink.
pub struct LedgerWriter<W: Write> {
    writer: W,
}

impl<W: Write> LedgerWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// One CSV row per ledger item; charge ids are joined with `;`.
    pub fn write_ledger_csv(&mut self, items: &[LedgerItem]) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(&mut self.writer);
        // Header is written explicitly so an empty ledger still has one.
        wtr.write_record(["due_at", "building_id", "amount", "charge_count", "charge_ids"])?;
        for item in items {
            wtr.serialize(LedgerRow::from(item))?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// The ledger items as a pretty-printed JSON array, charges included.
    pub fn write_ledger_json(&mut self, items: &[LedgerItem]) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.writer, items)?;
        writeln!(self.writer)?;
        Ok(())
    }

    pub fn write_receipts_csv(&mut self, receipts: &[Receipt]) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(&mut self.writer);
        wtr.write_record(["reference", "user_id", "amount"])?;
        for receipt in receipts {
            wtr.write_record([
                receipt.reference.as_str(),
                receipt.user_id.as_str(),
                &receipt.amount.to_string(),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }
}
