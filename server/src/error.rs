use ::agora_protocol::response::{status, ApiResponse};

#[derive(::thiserror::Error, Debug)]
pub enum SyncError {
    #[error("unauthorized: {0}")]
    Auth(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("infrastructure failure: {0:#}")]
    Infrastructure(#[from] ::anyhow::Error),
}

pub type SyncResult<T> = ::std::result::Result<T, SyncError>;

impl SyncError {
    pub fn validation(message: impl Into<String>) -> SyncError {
        SyncError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> SyncError {
        SyncError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> SyncError {
        SyncError::Conflict(message.into())
    }

    pub fn auth(message: impl Into<String>) -> SyncError {
        SyncError::Auth(message.into())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            SyncError::Auth(_) => 401,
            SyncError::Validation(_) => 400,
            SyncError::NotFound(_) => 404,
            SyncError::Conflict(_) => 409,
            SyncError::Infrastructure(_) => 500,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            SyncError::Auth(_) => status::UNAUTHORIZED,
            SyncError::Validation(_) => status::VALIDATION_ERROR,
            SyncError::NotFound(_) => status::NOT_FOUND,
            SyncError::Conflict(_) => status::ALREADY_DONE,
            SyncError::Infrastructure(_) => status::INTERNAL_ERROR,
        }
    }

    pub fn into_response<T>(self) -> ApiResponse<T> {
        if let SyncError::Infrastructure(err) = &self {
            ::log::error!("request failed: {:?}", err);
        }

        let message = match &self {
            SyncError::Infrastructure(_) => "internal error".to_string(),
            other => other.to_string(),
        };

        ApiResponse::failure(self.status_code(), self.status(), message)
    }
}
