use thiserror::Error;

/// Raised while compiling flows into the table. Always fatal at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("No name is given to flow, failed to register")]
    Unnamed,
    #[error("Registering an empty flow is prohibited: {0}")]
    EmptyFlow(String),
    #[error("Named flow is already registered: {0}")]
    Duplicate(String),
}
