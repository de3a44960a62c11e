//! Gateway error types.
//!
//! None of these reach a socket client; the transport logs them and drops
//! the event. The HTTP layer maps them to status codes.

use uuid::Uuid;

use frontdesk_core::error::FrontdeskError;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("credential rejected")]
    Unauthorized,
    #[error("connection has not joined")]
    NotJoined,
    #[error("session not found: {0}")]
    SessionNotFound(Uuid),
    #[error("session is closed: {0}")]
    SessionClosed(Uuid),
    #[error("storage error: {0}")]
    Storage(FrontdeskError),
}

impl From<FrontdeskError> for GatewayError {
    fn from(err: FrontdeskError) -> Self {
        match err {
            FrontdeskError::SessionNotFound(id) => GatewayError::SessionNotFound(id),
            FrontdeskError::Validation(msg) => GatewayError::InvalidPayload(msg),
            other => GatewayError::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_through() {
        let id = Uuid::new_v4();
        let err: GatewayError = FrontdeskError::SessionNotFound(id).into();
        assert!(matches!(err, GatewayError::SessionNotFound(x) if x == id));
    }

    #[test]
    fn test_validation_maps_to_invalid_payload() {
        let err: GatewayError = FrontdeskError::Validation("empty".into()).into();
        assert!(matches!(err, GatewayError::InvalidPayload(_)));
    }

    #[test]
    fn test_other_errors_are_storage() {
        let err: GatewayError = FrontdeskError::Storage("disk".into()).into();
        assert!(matches!(err, GatewayError::Storage(_)));
        assert_eq!(err.to_string(), "storage error: Storage error: disk");
    }
}
