//! LoopCache master: ring lifecycle, node registry, health state machine
//! (§4.3, §5).
//!
//! Split into a library so integration tests can drive a real `MasterState`
//! + `server::run` over a loopback socket instead of re-implementing the
//! wire protocol by hand.

pub mod config;
pub mod error;
pub mod health;
pub mod probe;
pub mod server;
pub mod state;

pub use config::{CliArgs, MasterConfig};
pub use state::MasterState;
