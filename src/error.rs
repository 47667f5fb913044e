use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use log::error;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or semantically invalid input; never retried.
    #[error("{0}")]
    Validation(String),
    /// Reference to a film or user that does not exist.
    #[error("{0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
}

impl actix_web::ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Storage failures are logged in full but reported generically.
        let message = match self {
            Error::Storage(err) => {
                error!("storage failure: {:?}", err);
                "unexpected internal error".to_owned()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(json!({ "error": message }))
    }
}
