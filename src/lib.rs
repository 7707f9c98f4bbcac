#![forbid(unsafe_code)]

//! Client control core of a voice-driven air-traffic-control simulation aid.
//!
//! Two stateful pieces live here: the speech-model library
//! ([`app::ModelLifecycleManager`]) and the push-to-talk turn machine
//! ([`app::PttSessionMachine`]). Recognition, capture, response generation
//! and the simulator link are external services reached through the traits
//! in [`ports`]. [`app::AppController`] wires everything together.

pub mod adapters;
pub mod app;
pub mod commands;
pub mod domain;
pub mod infrastructure;
pub mod ports;

#[cfg(test)]
mod test_support;

pub use app::{AppController, Backends};
pub use domain::{DomainError, Language, PttState, SimulatorKind};
