pub mod status {
    pub const SUCCESS: &str = "success";
    pub const CREATED: &str = "created";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const VALIDATION_ERROR: &str = "validation_error";
    pub const NOT_FOUND: &str = "not_found";
    pub const ALREADY_DONE: &str = "already_done";
    pub const INTERNAL_ERROR: &str = "internal_error";
}

/// Envelope returned by every exposed operation.
#[derive(::serde::Serialize, ::serde::Deserialize, PartialEq, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(result: T) -> ApiResponse<T> {
        ApiResponse {
            status_code: 200,
            status: status::SUCCESS.to_string(),
            result: Some(result),
            message: None,
        }
    }

    pub fn created(result: T) -> ApiResponse<T> {
        ApiResponse {
            status_code: 201,
            status: status::CREATED.to_string(),
            result: Some(result),
            message: None,
        }
    }

    pub fn failure(
        status_code: u16,
        status: &str,
        message: impl Into<String>,
    ) -> ApiResponse<T> {
        ApiResponse {
            status_code,
            status: status.to_string(),
            result: None,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}
