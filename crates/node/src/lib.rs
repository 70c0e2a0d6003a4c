//! LoopCache data node: storage engine, server loop, migration engine
//! (§4.2, §4.4, §5).
//!
//! Split into a library so integration tests can drive a real `NodeState` +
//! `server::run` over a loopback socket instead of re-implementing the wire
//! protocol by hand.

pub mod config;
pub mod migration;
pub mod server;
pub mod state;

pub use config::{CliArgs, NodeConfig};
pub use state::NodeState;
