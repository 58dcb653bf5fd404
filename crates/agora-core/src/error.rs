use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgoraError {
    // LLM errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM streaming error: {0}")]
    LlmStream(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Agent graph errors
    #[error("Invalid preset format: {0}")]
    InvalidPreset(String),

    #[error("Invalid graph edge {from} -> {to}: {reason}")]
    InvalidGraphEdge {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Heavy mode run failed at agent '{agent_name}' ({agent_id}): {message}")]
    HeavyRun {
        agent_id: String,
        agent_name: String,
        message: String,
    },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgoraError {
    /// Whether this error came out of the generation layer (request or stream).
    pub fn is_generation(&self) -> bool {
        matches!(
            self,
            AgoraError::LlmRequest(_) | AgoraError::LlmStream(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AgoraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heavy_run_display_names_agent() {
        let err = AgoraError::HeavyRun {
            agent_id: "synth".into(),
            agent_name: "Synthesizer".into(),
            message: "HTTP 500".into(),
        };
        let text = err.to_string();
        assert!(text.contains("Synthesizer"));
        assert!(text.contains("synth"));
        assert!(text.contains("HTTP 500"));
    }

    #[test]
    fn test_is_generation() {
        assert!(AgoraError::LlmRequest("x".into()).is_generation());
        assert!(AgoraError::LlmStream("x".into()).is_generation());
        assert!(!AgoraError::Config("x".into()).is_generation());
        assert!(!AgoraError::InvalidPreset("x".into()).is_generation());
    }
}
