pub mod db;
pub mod error;
pub mod ledger;
pub mod types;

pub use db::DatabaseManager;
pub use error::{DbError, DbResult};
pub use ledger::{LedgerEvent, LedgerOutcome, PaymentState, Transition};
pub use types::*;
