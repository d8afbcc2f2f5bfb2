use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// 409 on order creation: the server refuses a second concurrent order.
    /// There is no retry path until the existing order resolves.
    #[error("you already have an active order")]
    ActiveOrderConflict,

    /// 402: the payment instrument was rejected.
    #[error("payment rejected: {0}")]
    PaymentRejected(String),

    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..MAX_ERROR_BODY_LENGTH],
                body.len()
            )
        }
    }

    /// Map a non-success status to the error taxonomy.
    ///
    /// The service only answers 409 from order creation, so the conflict
    /// translation applies unconditionally here.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            402 => ApiError::PaymentRejected(truncated),
            409 => ApiError::ActiveOrderConflict,
            _ => ApiError::Server {
                status: status.as_u16(),
                message: truncated,
            },
        }
    }
}
