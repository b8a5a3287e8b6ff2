mod entry;
mod money;
mod reconcile;
pub mod settlement;
mod wallet;
mod withdrawal;

pub use entry::*;
pub use money::*;
pub use reconcile::*;
pub use settlement::{settle, Settlement, SettlementError, SettlementRates, TaskClosed};
pub use wallet::*;
pub use withdrawal::*;
