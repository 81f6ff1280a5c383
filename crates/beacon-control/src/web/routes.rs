//! Control surface router

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, Uri},
    middleware::{self, Next},
    response::{Json, Response},
    Router,
};

use super::handlers::{handle_request, ApiResponse};
use super::server::AppState;

/// Build the router.
///
/// Dispatch happens on the path suffix, so everything goes through the
/// fallback handler instead of fixed routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .fallback(dispatch)
        .layer(middleware::from_fn(response_headers))
        .with_state(state)
}

async fn dispatch(State(state): State<AppState>, method: Method, uri: Uri) -> Json<ApiResponse> {
    Json(handle_request(state.control.as_ref(), &method, uri.path()))
}

/// Status answers must never be served from a cache
async fn response_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );

    response
}
