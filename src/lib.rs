//! `roundkeeper` - host-authoritative match orchestration
//!
//! A round-based match is driven by a phase state machine that fans each
//! lifecycle transition out to pluggable rule modules through a
//! capability registry. Rule modules decide when rounds and games end,
//! run the economy and shuffle teams; the host owns all state and mirrors
//! it read-only to observers.

pub mod autopilot;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod observability;
pub mod phase;
pub mod roster;
pub mod rules;
pub mod spawn;
