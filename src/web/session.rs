//! Browser session cookie

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::SET_COOKIE, request::Parts, HeaderMap},
    response::{IntoResponse, Response},
};
use std::convert::Infallible;

pub const SESSION_COOKIE: &str = "portal_session";

/// Session token from the cookie, or a fresh one to be set on the response
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    is_new: bool,
}

impl Session {
    /// Attach the cookie when the session was just created
    pub fn respond(&self, response: impl IntoResponse) -> Response {
        let mut response = response.into_response();
        if self.is_new {
            if let Ok(value) = create_session_cookie(&self.token).parse() {
                response.headers_mut().append(SET_COOKIE, value);
            }
        }
        response
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(match get_session_token(&parts.headers) {
            Some(token) => Session { token, is_new: false },
            None => Session {
                token: uuid::Uuid::new_v4().to_string(),
                is_new: true,
            },
        })
    }
}

/// Extract session token from cookies
pub fn get_session_token(headers: &HeaderMap) -> Option<String> {
    let prefix = format!("{}=", SESSION_COOKIE);
    headers
        .get(axum::http::header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .find_map(|cookie| {
            cookie
                .trim()
                .strip_prefix(&prefix)
                .filter(|token| !token.is_empty())
                .map(str::to_string)
        })
}

/// Long-lived cookie; the session only keys client storage
pub fn create_session_cookie(token: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age=31536000",
        SESSION_COOKIE, token
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::COOKIE;

    #[test]
    fn test_token_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "theme=dark; portal_session=abc-123".parse().unwrap());
        assert_eq!(get_session_token(&headers).as_deref(), Some("abc-123"));

        headers.insert(COOKIE, "portal_session=".parse().unwrap());
        assert!(get_session_token(&headers).is_none());
    }

    #[test]
    fn test_new_session_sets_cookie() {
        let session = Session {
            token: "t1".to_string(),
            is_new: true,
        };
        let response = session.respond("ok");
        let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("portal_session=t1;"));

        let existing = Session {
            token: "t1".to_string(),
            is_new: false,
        };
        assert!(existing.respond("ok").headers().get(SET_COOKIE).is_none());
    }
}
