use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::errors::{api_error, ApiError};
use crate::state::SharedState;

/// Rejects requests without a known `Authorization: Token <key>` header.
pub async fn require_token(
    State(state): State<SharedState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_token);

    match token {
        Some(t) if state.is_known_token(t) => Ok(next.run(req).await),
        Some(_) => {
            warn!(path = %req.uri().path(), "auth: unknown token");
            Err(api_error(StatusCode::UNAUTHORIZED, "unauthorized", "Invalid token"))
        }
        None => Err(api_error(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "Authentication credentials were not provided",
        )),
    }
}

fn parse_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("token") && !token.is_empty()).then_some(token)
}
