//! Discord OAuth2 authorization-code exchange

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{PortalError, Result};

const AUTHORIZE_URL: &str = "https://discord.com/oauth2/authorize";
const TOKEN_URL: &str = "https://discord.com/api/oauth2/token";
const CURRENT_USER_URL: &str = "https://discord.com/api/users/@me";

/// Discord application credentials plus the portal's registered redirect
#[derive(Clone)]
pub struct DiscordOAuth {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    http_client: reqwest::Client,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
}

/// User info from /users/@me
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl DiscordUser {
    pub fn display_name(&self) -> &str {
        self.global_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.username)
    }
}

impl DiscordOAuth {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            http_client: reqwest::Client::new(),
        }
    }

    /// Discord consent page; `state` comes back unchanged on the callback
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope=identify&state={}",
            AUTHORIZE_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(state)
        )
    }

    /// Trade an authorization code for the Discord account that granted it
    pub async fn identify(&self, code: &str) -> Result<DiscordUser> {
        let response = self
            .http_client
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Token exchange failed: {}", body);
            return Err(PortalError::backend("Discord rejected the sign-in code"));
        }
        let token: TokenResponse = response.json().await?;

        debug!("Got access token, fetching user info");
        let response = self
            .http_client
            .get(CURRENT_USER_URL)
            .header(
                "Authorization",
                format!("{} {}", token.token_type, token.access_token),
            )
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("User info request failed: {}", body);
            return Err(PortalError::backend("Failed to read Discord account"));
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_url_carries_state() {
        let oauth = DiscordOAuth::new("123", "secret", "https://portal.example/auth/discord/callback");
        let url = oauth.authorize_url("abc-def");
        assert!(url.starts_with("https://discord.com/oauth2/authorize?client_id=123"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fportal.example%2Fauth%2Fdiscord%2Fcallback"));
        assert!(url.ends_with("&state=abc-def"));
        assert!(!url.contains("secret"));
    }

    #[test]
    fn test_display_name_prefers_global_name() {
        let user: DiscordUser =
            serde_json::from_str(r#"{"id":"1","username":"kes","global_name":"Kestrel"}"#).unwrap();
        assert_eq!(user.display_name(), "Kestrel");

        let user: DiscordUser = serde_json::from_str(r#"{"id":"1","username":"kes","global_name":null}"#).unwrap();
        assert_eq!(user.display_name(), "kes");
    }
}
