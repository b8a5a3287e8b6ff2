pub mod api;
pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod io;
pub mod storage;
pub mod telemetry;

pub use application::{AppError, WalletService};
pub use config::{Config, LedgerSettings};
pub use domain::*;
pub use storage::Repository;
