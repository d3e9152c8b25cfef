mod account;
mod ledger;
mod transaction;

pub use account::*;
pub use ledger::*;
pub use transaction::*;
