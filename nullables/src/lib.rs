//! Nullable infrastructure for deterministic testing.
//!
//! Every external seam of the wallet (key/value storage, the chain, the face
//! service, the camera, the clock) sits behind a trait. This crate provides
//! implementations that:
//! - Return scripted values
//! - Can be made to fail on demand
//! - Record what was sent to them
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod camera;
pub mod chain;
pub mod clock;
pub mod face;
pub mod store;

pub use camera::NullCamera;
pub use chain::{ChainOp, Failure, NullChain};
pub use clock::NullClock;
pub use face::{MatchOutcome, NullFaceService, PaymentOutcome};
pub use store::NullStore;

use std::sync::{Mutex, MutexGuard};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
