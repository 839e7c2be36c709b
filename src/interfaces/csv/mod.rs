pub mod charge_reader;
pub mod ledger_writer;
