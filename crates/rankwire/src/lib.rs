//! Message-passing runtime for a fixed group of cooperating processes.
//!
//! A job of `N` processes, each with a stable rank in `[0, N)`, exchanges
//! tagged byte buffers point-to-point and takes part in collectives
//! (barrier, broadcast, reduction) over all ranks. An optional best-effort
//! deadlock detector surfaces pairwise receive deadlocks as errors instead
//! of hanging.
//!
//! # Crate structure
//!
//! - [`World`] — the runtime handle: lifecycle, `send`/`recv`, collectives
//! - [`channel`] — channel endpoints and the launcher wiring contract
//! - [`frame`] — the fixed-size packet codec and tag matching rule
//!
//! # Getting a world
//!
//! Workers started by the launcher call [`World::init`], which adopts the
//! inherited channel descriptors. Tests and embedders wire worlds
//! explicitly with [`World::from_channels`].

pub mod collective;
pub mod error;
mod inbox;
mod outbox;
mod receiver;
pub mod world;

pub use collective::ReduceOp;
pub use error::{CommError, InitError, Result};
pub use world::{World, WorldOptions};

/// Re-export of the channel layer.
pub use rankwire_channel as channel;

/// Re-export of the frame layer.
pub use rankwire_frame as frame;
