//! Error types for the runtime system

use crossbeam_channel::SendError;

/// Error type for work function operations
#[derive(Debug, thiserror::Error)]
pub enum WorkError {
    #[error("I/O error on capture input: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to send to output channel: {0}")]
    SendError(String),

    #[error("Node-specific error: {0}")]
    NodeError(String),

    #[error("Shutdown signal received")]
    Shutdown,
}

impl<T> From<SendError<T>> for WorkError {
    fn from(e: SendError<T>) -> Self {
        WorkError::SendError(format!("{}", e))
    }
}

/// Result type for work functions
pub type WorkResult<T = ()> = Result<T, WorkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_error_conversion() {
        let (tx, rx) = crossbeam_channel::bounded::<u8>(1);
        drop(rx);
        let err: WorkError = tx.send(7).unwrap_err().into();
        assert!(matches!(err, WorkError::SendError(_)));
        assert!(err.to_string().contains("disconnected"));
    }
}
