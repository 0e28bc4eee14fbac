pub mod transaction;

pub use transaction::{format_minor_units, Transaction, TransactionSnapshot, TxStatus};
