//! # Core
//!
//! Ambient engineering scaffolding shared by every binary in this
//! workspace: environment-driven [`config::Config`], the aggregating
//! [`error::CoreError`], [`logging`] initialisers, [`metrics`] counters,
//! [`shutdown`] primitives, and the [`supervisor::Supervisor`] state
//! machine that ties OS signals to a coordinated drain.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod shutdown;
pub mod supervisor;

pub use config::Config;
pub use error::CoreError;
pub use supervisor::{Supervisor, SupervisorState};
