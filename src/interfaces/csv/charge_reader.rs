use crate::domain::charge::Charge;
use crate::error::{LedgerError, Result};
use std::io::Read;

/// Reads charges from a CSV source.
///
/// Expects the header `id,building_id,user_id,amount,due_at`. Whitespace around
/// fields is trimmed. Amounts are decimals and must not be negative.
pub struct ChargeReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> ChargeReader<R> {
    /// Creates a new `ChargeReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes charges.
    ///
    /// A malformed row yields an error for that row only; later rows are still read.
    pub fn charges(self) -> impl Iterator<Item = Result<Charge>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LedgerError::from))
    }
}
