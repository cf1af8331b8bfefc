//! TaskSource - reference task source for PrimeHack workers
//!
//! Hands out Lucas-Lehmer chunks one exponent at a time, folds submitted
//! residues back in, and records every prime found.

pub mod cli;
pub mod config;
pub mod error;
pub mod ledger;
pub mod server;

pub use config::{Config, LedgerConfig};
pub use error::LedgerError;
pub use ledger::{Ledger, StatusReport, SubmitOutcome};
pub use server::{AppState, router, serve};
