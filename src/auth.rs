//! Signed-in identity for a browser session.
//!
//! With a Discord application configured the portal runs the OAuth code
//! exchange itself; otherwise it accepts the bot's redirect handoff. Either
//! way the staff flags come from the bot API, never from the browser. The
//! identity is cached in client storage under [`USER_KEY`] and refreshed
//! whenever a page loads. Subscribers learn about sign-in, role changes and
//! sign-out via [`AuthEvent`]s.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::backend::{DiscordOAuth, SharedBotBackend};
use crate::config::LogisticsRoles;
use crate::error::{PortalError, Result};
use crate::models::UserIdentity;
use crate::storage::{SharedClientStorage, USER_KEY};

/// How long a Discord consent round trip may take
pub const LOGIN_TTL: Duration = Duration::from_secs(10 * 60);

/// Message posted back by the OAuth popup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthMessage {
    pub success: bool,
    #[serde(default)]
    pub user: Option<UserIdentity>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    /// Identity resolved for a session (restored, signed in, or anonymous)
    Ready { session: String, authenticated: bool },
    RolesChanged { session: String, discord_id: String },
    LoggedOut { session: String },
}

/// Visibility of identity-dependent navigation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavState {
    pub show_staff_link: bool,
    pub show_user_info: bool,
}

/// Identity plus the navigation it implies
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub user: Option<UserIdentity>,
    pub nav: NavState,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

/// CSRF state of a Discord consent round trip in progress
struct PendingLogin {
    state: String,
    started: Instant,
}

pub struct AuthModule {
    storage: SharedClientStorage,
    bot: SharedBotBackend,
    logistics_roles: LogisticsRoles,
    bot_api_url: String,
    return_url: String,
    discord: Option<DiscordOAuth>,
    pending: DashMap<String, PendingLogin>,
    events: broadcast::Sender<AuthEvent>,
}

impl AuthModule {
    pub fn new(
        storage: SharedClientStorage,
        bot: SharedBotBackend,
        logistics_roles: LogisticsRoles,
        bot_api_url: impl Into<String>,
        return_url: impl Into<String>,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            storage,
            bot,
            logistics_roles,
            bot_api_url: bot_api_url.into(),
            return_url: return_url.into(),
            discord: None,
            pending: DashMap::new(),
            events,
        }
    }

    /// Sign in through the portal's own Discord application
    pub fn with_discord(mut self, discord: DiscordOAuth) -> Self {
        self.discord = Some(discord);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Popup target for the bot's Discord sign-in flow
    pub fn login_url(&self) -> String {
        format!(
            "{}/auth/discord?redirect={}",
            self.bot_api_url.trim_end_matches('/'),
            urlencoding::encode(&self.return_url)
        )
    }

    /// Where `/auth/login` sends the browser
    pub fn begin_login(&self, session: &str) -> String {
        let Some(discord) = &self.discord else {
            return self.login_url();
        };
        let state = uuid::Uuid::new_v4().simple().to_string();
        let url = discord.authorize_url(&state);
        self.pending.insert(
            session.to_string(),
            PendingLogin {
                state,
                started: Instant::now(),
            },
        );
        url
    }

    /// Drop consent round trips that were never completed
    pub fn prune_pending_logins(&self) {
        self.prune_logins_older_than(LOGIN_TTL);
    }

    fn prune_logins_older_than(&self, max_age: Duration) {
        self.pending.retain(|_, login| login.started.elapsed() < max_age);
    }

    pub fn nav_state(&self, user: Option<&UserIdentity>) -> NavState {
        NavState {
            show_staff_link: self.is_logistics_staff(user),
            show_user_info: user.is_some(),
        }
    }

    pub fn is_logistics_staff(&self, user: Option<&UserIdentity>) -> bool {
        user.is_some_and(|u| u.is_logistics_staff(&self.logistics_roles))
    }

    /// Cached identity for a session, if any
    pub async fn current_user(&self, session: &str) -> Option<UserIdentity> {
        self.storage.read().await.get_json(session, USER_KEY)
    }

    /// Restore the cached identity and announce readiness
    pub async fn init(&self, session: &str) -> AuthState {
        let user = self.current_user(session).await;
        let state = self.apply(user);
        self.publish(AuthEvent::Ready {
            session: session.to_string(),
            authenticated: state.is_authenticated(),
        });
        state
    }

    /// Finish the Discord consent round trip started by [`Self::begin_login`]
    pub async fn complete_login(&self, session: &str, code: &str, state: &str) -> Result<AuthState> {
        let Some(discord) = &self.discord else {
            return Err(PortalError::precondition("Discord sign-in is not configured"));
        };
        match self.pending.remove(session) {
            Some((_, login)) if login.state == state && login.started.elapsed() < LOGIN_TTL => {}
            _ => {
                return Err(PortalError::precondition(
                    "Sign-in link expired or was not started here, please try again",
                ))
            }
        }
        if code.is_empty() {
            return Err(PortalError::precondition("Discord did not return a sign-in code"));
        }

        let account = discord.identify(code).await?;
        let mut user = UserIdentity {
            discord_id: account.id.clone(),
            discord_username: account.display_name().to_string(),
            avatar: account.avatar.clone(),
            ..Default::default()
        };
        match self.bot.refresh_user(&user.discord_id).await {
            Ok(refresh) => {
                user.merge_roles(refresh);
            }
            Err(e) => warn!("No role data for {}, signing in without roles: {}", user.discord_id, e),
        }
        self.sign_in(session, user).await
    }

    /// Accept the identity handed over by the bot's sign-in redirect.
    ///
    /// Only the account fields are taken from the browser; the account must
    /// be known to the bot API and its roles are read from there.
    pub async fn handle_callback(&self, session: &str, message: AuthMessage) -> Result<AuthState> {
        if self.discord.is_some() {
            return Err(PortalError::precondition("Please sign in with Discord from the portal"));
        }
        let claimed = match message {
            AuthMessage {
                success: true,
                user: Some(user),
                ..
            } if !user.discord_id.is_empty() => user,
            AuthMessage { message, .. } => {
                return Err(PortalError::backend(
                    message.unwrap_or_else(|| "Discord sign-in failed".to_string()),
                ))
            }
        };

        let refresh = self.bot.refresh_user(&claimed.discord_id).await.map_err(|e| {
            warn!("Could not verify {} with the bot: {}", claimed.discord_id, e);
            PortalError::backend("Could not verify your Discord account")
        })?;
        let mut user = claimed.without_privileges();
        user.merge_roles(refresh);
        self.sign_in(session, user).await
    }

    /// Pull the latest role data. The cached identity survives a failed
    /// refresh but loses its staff privileges until the bot answers again.
    ///
    /// Returns the (possibly updated) state and whether the role set changed.
    pub async fn refresh_user_data(&self, session: &str) -> (AuthState, bool) {
        let Some(mut user) = self.current_user(session).await else {
            return (self.apply(None), false);
        };
        if user.discord_id.is_empty() {
            return (self.apply(Some(user.without_privileges())), false);
        }

        let refresh = match self.bot.refresh_user(&user.discord_id).await {
            Ok(refresh) => refresh,
            Err(e) => {
                warn!("Role refresh for {} failed, withholding staff access: {}", user.discord_id, e);
                return (self.apply(Some(user.without_privileges())), false);
            }
        };

        if !user.merge_roles(refresh) {
            debug!("Roles unchanged for {}", user.discord_id);
            return (self.apply(Some(user)), false);
        }

        if let Err(e) = self.store_user(session, &user).await {
            warn!("Failed to cache refreshed roles: {}", e);
        }
        info!("Roles changed for {}", user.discord_username);
        self.publish(AuthEvent::RolesChanged {
            session: session.to_string(),
            discord_id: user.discord_id.clone(),
        });
        (self.apply(Some(user)), true)
    }

    /// Forget the identity for this session
    pub async fn logout(&self, session: &str) {
        self.pending.remove(session);
        let mut storage = self.storage.write().await;
        storage.remove(session, USER_KEY);
        if let Err(e) = storage.save().await {
            warn!("Failed to persist logout: {}", e);
        }
        drop(storage);

        self.publish(AuthEvent::LoggedOut {
            session: session.to_string(),
        });
    }

    async fn sign_in(&self, session: &str, user: UserIdentity) -> Result<AuthState> {
        self.store_user(session, &user).await?;
        info!("Signed in {} ({})", user.discord_username, user.discord_id);

        let state = self.apply(Some(user));
        self.publish(AuthEvent::Ready {
            session: session.to_string(),
            authenticated: true,
        });
        Ok(state)
    }

    fn apply(&self, user: Option<UserIdentity>) -> AuthState {
        let nav = self.nav_state(user.as_ref());
        AuthState { user, nav }
    }

    async fn store_user(&self, session: &str, user: &UserIdentity) -> Result<()> {
        let mut storage = self.storage.write().await;
        storage.set_json(session, USER_KEY, user)?;
        storage.save().await
    }

    fn publish(&self, event: AuthEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RoleRefresh;
    use crate::sheet::{LocalSheet, SheetData};
    use crate::storage::{create_shared_client_storage, ClientStorage};
    use std::sync::Arc;

    fn member(roles: &[&str]) -> RoleRefresh {
        RoleRefresh {
            roles: roles.iter().map(|r| r.to_string()).collect(),
            ..Default::default()
        }
    }

    fn module(members: &[(&str, RoleRefresh)]) -> AuthModule {
        let mut data = SheetData::sample();
        for (id, refresh) in members {
            data.members.insert(id.to_string(), refresh.clone());
        }
        AuthModule::new(
            create_shared_client_storage(ClientStorage::new()),
            Arc::new(LocalSheet::in_memory(data)),
            LogisticsRoles::default(),
            "http://localhost:3000/",
            "http://localhost:8080/auth/callback",
        )
    }

    fn with_discord(auth: AuthModule) -> AuthModule {
        auth.with_discord(DiscordOAuth::new(
            "123",
            "secret",
            "http://localhost:8080/auth/discord/callback",
        ))
    }

    fn signed_in(id: &str, roles: &[&str]) -> AuthMessage {
        AuthMessage {
            success: true,
            user: Some(UserIdentity {
                discord_id: id.to_string(),
                discord_username: "alice".to_string(),
                roles: roles.iter().map(|r| r.to_string()).collect(),
                ..Default::default()
            }),
            message: None,
        }
    }

    fn state_param(url: &str) -> String {
        url.rsplit("state=").next().unwrap().to_string()
    }

    #[test]
    fn test_login_url() {
        let auth = module(&[]);
        assert_eq!(
            auth.login_url(),
            "http://localhost:3000/auth/discord?redirect=http%3A%2F%2Flocalhost%3A8080%2Fauth%2Fcallback"
        );
        assert_eq!(auth.begin_login("s1"), auth.login_url());
    }

    #[tokio::test]
    async fn test_init_without_identity() {
        let auth = module(&[]);
        let mut events = auth.subscribe();
        let state = auth.init("s1").await;
        assert!(!state.is_authenticated());
        assert_eq!(state.nav, NavState::default());
        assert_eq!(
            events.recv().await.unwrap(),
            AuthEvent::Ready {
                session: "s1".to_string(),
                authenticated: false
            }
        );
    }

    #[tokio::test]
    async fn test_callback_caches_identity() {
        let auth = module(&[("1001", member(&["Logistics"]))]);
        let state = auth.handle_callback("s1", signed_in("1001", &[])).await.unwrap();
        assert!(state.nav.show_staff_link);
        assert!(state.nav.show_user_info);

        let restored = auth.init("s1").await;
        assert_eq!(restored.user.unwrap().discord_id, "1001");
        assert!(auth.init("s2").await.user.is_none());
    }

    #[tokio::test]
    async fn test_callback_ignores_claimed_roles() {
        let auth = module(&[("1001", member(&["Member"]))]);
        let mut message = signed_in("1001", &["Logistics"]);
        if let Some(user) = message.user.as_mut() {
            user.is_staff = true;
            user.is_logistics_staff = true;
        }

        let state = auth.handle_callback("s1", message).await.unwrap();
        assert!(!state.nav.show_staff_link);
        let cached = auth.current_user("s1").await.unwrap();
        assert!(!cached.is_staff);
        assert_eq!(cached.roles, vec!["Member"]);
    }

    #[tokio::test]
    async fn test_callback_for_unknown_account_is_rejected() {
        let auth = module(&[]);
        assert!(auth.handle_callback("s1", signed_in("9999", &["Logistics"])).await.is_err());
        assert!(auth.current_user("s1").await.is_none());
    }

    #[tokio::test]
    async fn test_failed_callback_is_rejected() {
        let auth = module(&[("1001", member(&[]))]);
        let message = AuthMessage {
            success: false,
            user: None,
            message: Some("denied".to_string()),
        };
        assert!(auth.handle_callback("s1", message).await.is_err());
        assert!(auth.current_user("s1").await.is_none());
    }

    #[tokio::test]
    async fn test_handoff_refused_when_discord_app_configured() {
        let auth = with_discord(module(&[("1001", member(&["Logistics"]))]));
        let err = auth.handle_callback("s1", signed_in("1001", &[])).await.unwrap_err();
        assert!(err.is_precondition());
        assert!(auth.current_user("s1").await.is_none());
    }

    #[tokio::test]
    async fn test_discord_login_checks_state() {
        let auth = with_discord(module(&[]));
        let url = auth.begin_login("s1");
        assert!(url.starts_with("https://discord.com/oauth2/authorize"));
        let state = state_param(&url);

        // Another browser cannot finish this round trip
        let err = auth.complete_login("s2", "code", &state).await.unwrap_err();
        assert!(err.is_precondition());

        let err = auth.complete_login("s1", "code", "forged").await.unwrap_err();
        assert!(err.is_precondition());

        // The state is single use, even after a mismatch
        let err = auth.complete_login("s1", "code", &state).await.unwrap_err();
        assert!(err.is_precondition());
        assert!(auth.current_user("s1").await.is_none());
    }

    #[tokio::test]
    async fn test_stale_logins_are_pruned() {
        let auth = with_discord(module(&[]));
        auth.begin_login("s1");
        tokio::time::sleep(Duration::from_millis(30)).await;
        auth.begin_login("s2");
        auth.prune_logins_older_than(Duration::from_millis(15));
        assert!(!auth.pending.contains_key("s1"));
        assert!(auth.pending.contains_key("s2"));
    }

    #[tokio::test]
    async fn test_refresh_notifies_only_on_change() {
        let auth = module(&[("1001", member(&["Logistics"]))]);
        let user = UserIdentity {
            discord_id: "1001".to_string(),
            discord_username: "alice".to_string(),
            ..Default::default()
        };
        auth.store_user("s1", &user).await.unwrap();
        let mut events = auth.subscribe();

        let (state, changed) = auth.refresh_user_data("s1").await;
        assert!(changed);
        assert!(state.nav.show_staff_link);
        assert!(matches!(events.try_recv(), Ok(AuthEvent::RolesChanged { .. })));

        let (_, changed) = auth.refresh_user_data("s1").await;
        assert!(!changed);
        assert!(events.try_recv().is_err());

        // Identity fields survive the merge
        assert_eq!(auth.current_user("s1").await.unwrap().discord_username, "alice");
    }

    #[tokio::test]
    async fn test_refresh_failure_withholds_staff_access() {
        let auth = module(&[]);
        let user = UserIdentity {
            discord_id: "1001".to_string(),
            discord_username: "alice".to_string(),
            is_staff: true,
            roles: vec!["Logistics".to_string()],
            ..Default::default()
        };
        auth.store_user("s1", &user).await.unwrap();

        let (state, changed) = auth.refresh_user_data("s1").await;
        assert!(!changed);
        assert!(state.nav.show_user_info);
        assert!(!state.nav.show_staff_link);
        assert_eq!(state.user.map(|u| u.discord_username), Some("alice".to_string()));

        // The cache is left alone so access returns once the bot answers
        assert!(auth.current_user("s1").await.unwrap().is_staff);
    }

    #[tokio::test]
    async fn test_logout_clears_identity() {
        let auth = module(&[("1001", member(&[]))]);
        auth.handle_callback("s1", signed_in("1001", &[])).await.unwrap();
        auth.logout("s1").await;
        assert!(auth.current_user("s1").await.is_none());
        assert!(!auth.init("s1").await.nav.show_user_info);
    }
}
