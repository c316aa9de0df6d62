//! Core data model for fleet dispatch.
//!
//! Operations describe intent, requests describe remote calls,
//! and results describe what each call did.

mod operation;
mod outcome;
mod request;

pub use operation::{Operation, OperationKind};
pub use outcome::{DispatchResult, Outcome};
pub use request::{DispatchBody, DispatchRequest, Method, display_path};
