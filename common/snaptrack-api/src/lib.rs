//! Shared API for the snaptrack host monitor.
//!
//! The wire protocol spoken with the monitoring agent is described in this crate.

pub mod codec;
pub mod command;
pub mod config;
pub mod env;
pub mod frame;
pub mod log;
