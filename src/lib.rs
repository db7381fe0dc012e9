//! Emoji Party: a peer-to-peer emoji charades game
//!
//! One peer hosts and owns the authoritative [`types::GameState`]; every
//! other peer keeps a replica that is replaced by whole snapshots. If the
//! host drops out of a running game, the first remaining player in roster
//! order takes over.

pub mod config;
pub mod error;
pub mod guess;
pub mod link;
pub mod protocol;
pub mod session;
pub mod state;
pub mod transport;
pub mod types;
