use thiserror::Error;

/// Everything that can go wrong between the engine and the content
/// generator. All variants are caught at the engine boundary and surfaced to
/// the UI as a single retry message; nothing here crosses the channel as a
/// panic.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Generator unreachable, timed out, or returned a non-success status.
    #[error("content generator unreachable: {0}")]
    Transport(String),

    /// Reply was empty or could not be decoded into the expected payload.
    #[error("could not parse generator reply: {0}")]
    Parse(String),

    /// Reply decoded fine but a required field is absent. Same retry path
    /// as a parse failure.
    #[error("generator reply missing required field `{0}`")]
    MissingField(String),

    /// The session itself is misconfigured (bad goal threshold, scenario
    /// missing required fields). Fatal to the session, back to setup.
    #[error("invalid session configuration: {0}")]
    Configuration(String),
}

impl EngineError {
    /// Recoverable errors keep the session alive; the user retries the same
    /// turn. Configuration errors drop the session back to setup.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, EngineError::Configuration(_))
    }

    /// The one user-visible message for all recoverable failures. The
    /// detailed variant goes to the log, not the screen.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::Configuration(detail) => {
                format!("This scenario could not be used ({detail}). Returning to setup.")
            }
            _ => "Failed to reach or understand the simulation service. \
                  Your last action was not applied — please try again."
                .to_string(),
        }
    }
}
