//! ODP Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the Open Data Platform workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`OdpError`] and the [`Result`] alias used at crate boundaries
//! - **Logging**: [`logging::LogConfig`] and [`logging::init_logging`], the single
//!   place where the global `tracing` subscriber is installed
//!
//! # Example
//!
//! ```no_run
//! use odp_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     let _guard = init_logging(&config)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

pub use error::{OdpError, Result};
