// Application layer: the wallet service and its error type. Every client
// (HTTP API, CLI, tests) goes through `WalletService`.

pub mod error;
mod locks;
mod service;

pub use error::*;
pub use locks::{VendorGuard, VendorLocks};
pub use service::*;
