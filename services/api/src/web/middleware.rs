//! services/api/src/web/middleware.rs
//!
//! Session middleware: every request gets a `SessionId`.

use axum::{
    extract::Request,
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error};
use uuid::Uuid;

use crate::web::state::SessionId;

pub const SESSION_COOKIE: &str = "lessongen_session";

/// Reads the session id from a `Cookie` header value, if present and well-formed.
pub fn session_from_cookie(cookie_header: &str) -> Option<SessionId> {
    cookie_header
        .split(';')
        .find_map(|c| c.trim().strip_prefix(SESSION_COOKIE)?.strip_prefix('='))
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .map(SessionId)
}

/// Middleware that resolves the browser session from its cookie.
///
/// If the cookie is missing or invalid, a new session id is issued and set on
/// the response. The id is inserted into request extensions for handlers.
pub async fn ensure_session(mut req: Request, next: Next) -> Response {
    // 1. Extract the session from the cookie header
    let existing = req
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(session_from_cookie);

    // 2. Issue a new one when absent
    let (session, is_new) = match existing {
        Some(session) => (session, false),
        None => (SessionId(Uuid::new_v4()), true),
    };

    // 3. Insert the session into request extensions
    req.extensions_mut().insert(session);

    // 4. Continue to the handler
    let mut response = next.run(req).await;

    // 5. Set the cookie for a fresh session
    if is_new {
        debug!(session_id = %session.0, "Issued new session cookie");
        let cookie = format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/",
            SESSION_COOKIE, session.0
        );
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => error!("Failed to build session cookie: {:?}", e),
        }
    }

    response
}
