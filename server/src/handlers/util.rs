use ::agora_protocol::response::{status, ApiResponse};
use ::warp::http::StatusCode;

#[derive(::serde::Deserialize)]
pub(crate) struct PageQuery {
    #[serde(default = "first_page")]
    pub page: u32,
}

pub(crate) fn first_page() -> u32 {
    1
}

/// Serializes the envelope with its status code as the HTTP status.
pub(crate) fn reply<T: ::serde::Serialize>(
    response: ApiResponse<T>,
) -> Box<dyn ::warp::Reply> {
    let code = StatusCode::from_u16(response.status_code)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    Box::new(::warp::reply::with_status(
        ::warp::reply::json(&response),
        code,
    ))
}

pub(crate) async fn handle_rejection(
    err: ::warp::Rejection,
) -> Result<Box<dyn ::warp::Reply>, ::std::convert::Infallible> {
    let response: ApiResponse<()> = if err.is_not_found() {
        ApiResponse::failure(404, status::NOT_FOUND, "no such route")
    } else if let Some(err) =
        err.find::<::warp::filters::body::BodyDeserializeError>()
    {
        ApiResponse::failure(400, status::VALIDATION_ERROR, err.to_string())
    } else if let Some(err) = err.find::<::warp::reject::InvalidQuery>() {
        ApiResponse::failure(400, status::VALIDATION_ERROR, err.to_string())
    } else if err.find::<::warp::reject::MethodNotAllowed>().is_some() {
        ApiResponse::failure(405, status::VALIDATION_ERROR, "method not allowed")
    } else {
        ::log::warn!("rejection {:?}", err);
        ApiResponse::failure(500, status::INTERNAL_ERROR, "internal error")
    };

    Ok(reply(response))
}
