use settlement_engine::gateway::GatewayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
}

impl From<GatewayApiError> for GatewayError {
    fn from(e: GatewayApiError) -> Self {
        match e {
            GatewayApiError::Initialization(_) | GatewayApiError::RestResponseError(_) => {
                GatewayError::Unavailable(e.to_string())
            },
            GatewayApiError::JsonError(_) => GatewayError::InvalidResponse(e.to_string()),
            GatewayApiError::QueryError { status, .. } if status >= 500 || status == 429 => {
                GatewayError::Unavailable(e.to_string())
            },
            GatewayApiError::QueryError { .. } => GatewayError::Rejected(e.to_string()),
        }
    }
}
