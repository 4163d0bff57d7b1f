//! Shared utilities for the BioPay wallet.

pub mod logging;

pub use logging::{init_logging, try_init_logging, LogFormat};
