//! Shared-memory pipeline between an experiment process and its display.
//!
//! The producer copies every message into its own System V segment and hands
//! the segment id over through a fixed-size ring in shared memory. The
//! consumer drains the ring under a time budget, decodes the records and
//! folds them into the 1D and 2D curve stores the display draws from.

pub mod error;

// Module naming follows project convention
#[allow(non_snake_case)]
pub mod Core;
#[allow(non_snake_case)]
pub mod Debug;
#[allow(non_snake_case)]
pub mod Display;
#[allow(non_snake_case)]
pub mod Protocol;
#[allow(non_snake_case)]
pub mod Queue;
#[allow(non_snake_case)]
pub mod Store;

pub use error::{IpcError, Result};
