//! Trigger, tag, and remove GitHub Actions workflow runs across a fleet of
//! repositories.
//!
//! The pieces, leaves first:
//!
//! - [`manifest`] — which repositories each operation visits, in order.
//! - [`request`] — pure construction of one remote call per target.
//! - [`execute`] — sends a call and classifies the response.
//! - [`dispatch`] — plans a batch and runs it sequentially.

pub mod cli;
pub mod config;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod execute;
pub mod manifest;
pub mod model;
pub mod request;
pub mod telemetry;

pub use config::Config;
pub use credentials::Credentials;
pub use dispatch::{Batch, Dispatcher, Order};
pub use error::ConfigurationError;
pub use execute::Executor;
pub use manifest::{Manifest, Stage, Target};
