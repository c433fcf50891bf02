//! Match orchestration core
//!
//! Drives a match through its lifecycle phases and fans each phase out to
//! the rule modules subscribed to the matching capability.
//!
//! # Architecture
//!
//! - [`MatchPhase`]: lifecycle states and the replicated [`MatchSnapshot`]
//! - [`CapabilityRegistry`]: ordered module arena with per-capability subscriber cache
//! - [`dispatch`]: the pre/on/post barrier protocol
//! - [`Match`]: the state machine, built by [`MatchBuilder`]
//! - [`MatchCommand`] / [`MatchHandle`]: out-of-band inputs and observer mirror

pub mod command;
pub mod dispatch;
pub mod engine;
pub mod registry;
pub mod state;

pub use command::{MatchCommand, MatchHandle};
pub use dispatch::{DispatchFailure, DispatchReport, Hook};
pub use engine::{DEFAULT_TICK, Match, MatchBuilder, MatchSummary};
pub use registry::{Capability, CapabilityRegistry, ModuleId};
pub use state::{BombView, MatchPhase, MatchSnapshot, PlayerView};
