//! # Scheduler Testing Utils
//!
//! Shared testing utilities for the wafer scheduler workspace.
//!
//! ## Features
//!
//! - **Test Data Builders**: transfer requests and robot registrations with
//!   sensible defaults
//! - **Strategy Probe**: drive any coordination strategy as a fleet of
//!   scripted robots
//! - **Helpers**: waiting on async conditions, test logging
//!
//! ## Usage
//!
//! Add this crate as a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! scheduler-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod probe;

pub use builders::*;
pub use helpers::*;
pub use probe::*;
