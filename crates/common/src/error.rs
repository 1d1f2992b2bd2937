//! Error types for the medical history assistant.

use thiserror::Error;

use crate::patient::PatientIdError;

#[derive(Error, Debug)]
pub enum MedHistError {
    #[error("Completion error: {0}")]
    Completion(String),

    #[error("Memory error: {0}")]
    Memory(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Validation(#[from] PatientIdError),

    #[error("Invalid username or password. Please try again.")]
    InvalidCredentials,

    #[error("Please login to start")]
    Unauthenticated,

    #[error("Please enter a patient ID to start the chat.")]
    NoPatientSelected,

    /// Profile generation asked for with no patient selected.
    #[error("Please enter a patient ID first.")]
    NoPatientForProfile,

    #[error("Please enter a question.")]
    EmptyQuery,
}

impl MedHistError {
    /// Whether the error came from one of the external gateways.
    pub fn is_gateway(&self) -> bool {
        matches!(self, Self::Completion(_) | Self::Memory(_))
    }
}

pub type Result<T> = std::result::Result<T, MedHistError>;
