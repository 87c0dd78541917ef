//! Portal configuration loaded from the environment

use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use super::roles::LogisticsRoles;

/// Where the spreadsheet-backed function lives
#[derive(Debug, Clone, PartialEq)]
pub enum SheetSource {
    /// Remote Apps Script deployment
    Remote { url: String },
    /// In-process sheet persisted under the state directory
    Local,
}

/// Discord application used for server-side sign-in
#[derive(Clone, PartialEq)]
pub struct DiscordApp {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for DiscordApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordApp")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl DiscordApp {
    fn from_env() -> Option<Self> {
        let client_id = std::env::var("DISCORD_CLIENT_ID").ok().filter(|v| !v.trim().is_empty())?;
        let client_secret = std::env::var("DISCORD_CLIENT_SECRET").ok().filter(|v| !v.trim().is_empty())?;
        Some(Self {
            client_id,
            client_secret,
        })
    }
}

/// Portal configuration
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub sheet: SheetSource,
    /// Bot API base URL (orders, threads, auth)
    pub bot_api_url: String,
    /// Public URL of this portal, used for the OAuth return address
    pub base_url: String,
    pub http_port: u16,
    /// HTTPS port, only used when TLS material is configured
    pub https_port: u16,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    pub state_path: PathBuf,
    /// Staff console background refresh interval
    pub order_refresh: Duration,
    /// Delay before the detail panel is re-opened after a status update
    pub status_settle: Duration,
    pub logistics_roles: LogisticsRoles,
    /// When set, sign-in runs the OAuth code exchange here instead of
    /// trusting the bot's redirect
    pub discord: Option<DiscordApp>,
    /// Per-browser view state is dropped after this much inactivity
    pub session_idle: Duration,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            sheet: SheetSource::Local,
            bot_api_url: "http://localhost:3000".to_string(),
            base_url: "http://localhost:8080".to_string(),
            http_port: 8080,
            https_port: 8443,
            cert_path: None,
            key_path: None,
            state_path: PathBuf::from("state"),
            order_refresh: Duration::from_secs(60),
            status_settle: Duration::from_millis(500),
            logistics_roles: LogisticsRoles::default(),
            discord: None,
            session_idle: Duration::from_secs(2 * 60 * 60),
        }
    }
}

impl PortalConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let sheet = match std::env::var("APPS_SCRIPT_URL") {
            Ok(url) if !url.trim().is_empty() => SheetSource::Remote { url },
            _ => {
                info!("APPS_SCRIPT_URL not set, using the local sheet backend");
                SheetSource::Local
            }
        };

        let logistics_roles = std::env::var("LOGISTICS_ROLES")
            .map(|s| LogisticsRoles::from_csv(&s))
            .unwrap_or_default();

        let discord = DiscordApp::from_env();
        if discord.is_none() {
            warn!("DISCORD_CLIENT_ID/DISCORD_CLIENT_SECRET not set, accepting sign-in handoff from the bot");
        }

        Self {
            sheet,
            bot_api_url: std::env::var("BOT_API_URL").unwrap_or(defaults.bot_api_url),
            base_url: std::env::var("WEB_BASE_URL").unwrap_or(defaults.base_url),
            http_port: parse_var("HTTP_PORT", defaults.http_port),
            https_port: parse_var("HTTPS_PORT", defaults.https_port),
            cert_path: std::env::var("TLS_CERT_PATH").ok().map(PathBuf::from),
            key_path: std::env::var("TLS_KEY_PATH").ok().map(PathBuf::from),
            state_path: std::env::var("STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.state_path),
            order_refresh: Duration::from_secs(parse_var("ORDER_REFRESH_SECS", 60)),
            status_settle: Duration::from_millis(parse_var("STATUS_SETTLE_MS", 500)),
            logistics_roles,
            discord,
            session_idle: Duration::from_secs(60 * parse_var("SESSION_IDLE_MINS", 120)),
        }
    }

    /// TLS material, when both halves are configured and present on disk
    pub fn tls_paths(&self) -> Option<(PathBuf, PathBuf)> {
        match (&self.cert_path, &self.key_path) {
            (Some(cert), Some(key)) if cert.exists() && key.exists() => {
                Some((cert.clone(), key.clone()))
            }
            (Some(cert), Some(key)) => {
                warn!(
                    "TLS configured but files missing (cert: {}, key: {}), serving plain HTTP",
                    cert.display(),
                    key.display()
                );
                None
            }
            _ => None,
        }
    }

    pub fn client_storage_file(&self) -> PathBuf {
        self.state_path.join("client_storage.json")
    }

    pub fn local_sheet_file(&self) -> PathBuf {
        self.state_path.join("local_sheet.json")
    }

    pub fn oauth_return_url(&self) -> String {
        format!("{}/auth/callback", self.base_url.trim_end_matches('/'))
    }

    /// Redirect registered with the Discord application
    pub fn discord_redirect_uri(&self) -> String {
        format!("{}/auth/discord/callback", self.base_url.trim_end_matches('/'))
    }
}

fn parse_var<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value '{raw}': {e}, using default {default}");
            default
        }),
        Err(_) => default,
    }
}
