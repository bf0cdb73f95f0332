use thiserror::Error;

/// Error types for Selector Studio
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StudioError {
    // Remote workflow errors
    #[error("Failed to prepare page: {message}")]
    Preparation { message: String },

    #[error("Preview cannot be scripted: {reason}")]
    PreviewAccess { reason: String },

    #[error("Failed to validate selectors: {message}")]
    Validation { message: String },

    #[error("Failed to generate configuration: {message}")]
    Generation { message: String },

    #[error("Failed to save configuration: {message}")]
    Save { message: String },

    #[error("Scraper failed: {message}")]
    ScraperRun { message: String },

    // Local form and store errors
    #[error("A selection named '{name}' already exists")]
    DuplicateName { name: String },

    #[error("Please fill in all required fields (missing: {missing})")]
    IncompleteForm { missing: String },

    #[error("Selection not found: {name}")]
    NotFound { name: String },

    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    // Messaging errors
    #[error("Message rejected: {reason}")]
    MessageRejected { reason: String },

    #[error("Request already in progress: {kind}")]
    RequestInFlight { kind: String },

    // Generic errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Invalid state: {state}")]
    InvalidState { state: String },
}

impl StudioError {
    /// Create a preparation error
    pub fn preparation(message: impl Into<String>) -> Self {
        Self::Preparation { message: message.into() }
    }

    /// Create a preview access error
    pub fn preview_access(reason: impl Into<String>) -> Self {
        Self::PreviewAccess { reason: reason.into() }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation { message: message.into() }
    }

    pub fn save(message: impl Into<String>) -> Self {
        Self::Save { message: message.into() }
    }

    pub fn scraper_run(message: impl Into<String>) -> Self {
        Self::ScraperRun { message: message.into() }
    }

    pub fn duplicate_name(name: impl Into<String>) -> Self {
        Self::DuplicateName { name: name.into() }
    }

    pub fn incomplete_form(missing: impl Into<String>) -> Self {
        Self::IncompleteForm { missing: missing.into() }
    }

    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    pub fn message_rejected(reason: impl Into<String>) -> Self {
        Self::MessageRejected { reason: reason.into() }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into() }
    }

    pub fn invalid_state(state: impl Into<String>) -> Self {
        Self::InvalidState { state: state.into() }
    }

    /// Check if the user can retry or continue editing after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Configuration { .. } => false,
            _ => true,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Preparation { .. } | Self::PreviewAccess { .. } => "preview",
            Self::Validation { .. } => "validation",
            Self::Generation { .. } | Self::Save { .. } | Self::ScraperRun { .. } => "service",
            Self::DuplicateName { .. } | Self::IncompleteForm { .. } | Self::NotFound { .. } => "form",
            Self::InvalidSelector { .. } => "selector",
            Self::MessageRejected { .. } => "messaging",
            Self::RequestInFlight { .. } => "request",
            Self::Configuration { .. } => "configuration",
            Self::Serialization { .. } => "serialization",
            Self::InvalidState { .. } => "internal",
        }
    }
}

impl From<serde_json::Error> for StudioError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization { message: err.to_string() }
    }
}

impl From<serde_yaml::Error> for StudioError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization { message: err.to_string() }
    }
}

/// Result type alias for Selector Studio
pub type StudioResult<T> = std::result::Result<T, StudioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = StudioError::duplicate_name("price");
        assert_eq!(error.category(), "form");
        assert!(error.is_recoverable());
        assert_eq!(error.to_string(), "A selection named 'price' already exists");
    }

    #[test]
    fn test_configuration_errors_are_fatal() {
        let error = StudioError::config("service.base_url must not be empty");
        assert!(!error.is_recoverable());
        assert_eq!(error.category(), "configuration");
    }

    #[test]
    fn test_serde_errors_convert() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: StudioError = err.into();
        assert_eq!(error.category(), "serialization");
    }
}
