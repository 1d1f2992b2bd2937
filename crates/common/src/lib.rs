//! Common types shared across the medical history assistant crates.
//!
//! This crate owns the pieces every other layer agrees on: the error
//! taxonomy, conversation roles and turns, and the patient identifier
//! that scopes every memory and completion call.

pub mod error;
pub mod message;
pub mod patient;

pub use error::{MedHistError, Result};
pub use message::{Role, Turn};
pub use patient::{PatientId, PatientIdError};
