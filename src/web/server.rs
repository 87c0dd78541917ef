//! Web server: shared state, routing, TLS and background refresh

use axum::{
    extract::Host,
    handler::HandlerWithoutStateExt,
    http::{HeaderValue, Method, StatusCode, Uri},
    response::{Html, Redirect},
    routing::{get, post},
    BoxError, Router,
};
use axum_server::tls_rustls::RustlsConfig;
use dashmap::{mapref::entry::Entry, DashMap};
use std::time::{Duration, Instant};
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};

use super::pages;
use super::{portal, staff};
use crate::auth::{AuthModule, AuthState};
use crate::backend::{DiscordOAuth, SharedBotBackend, SharedSheetBackend};
use crate::config::PortalConfig;
use crate::models::UserIdentity;
use crate::storage::{SharedClientStorage, STAFF_NAME_KEY};
use crate::views::{MyOrdersDriver, MyOrdersState, StaffConsoleState, StaffDriver, StaffEvent, Toast};

pub type SharedConsole = Arc<Mutex<StaffConsoleState>>;
pub type SharedMyOrders = Arc<Mutex<MyOrdersState>>;

/// Sign-in entry point; picks the bot handoff or the portal's own Discord app
pub const LOGIN_PATH: &str = "/auth/login";

const SESSION_SWEEP: Duration = Duration::from_secs(5 * 60);

/// View state one browser keeps between requests
struct SessionEntry {
    last_seen: Instant,
    console: Option<SharedConsole>,
    my_orders: Option<SharedMyOrders>,
    /// Toast for the next page this session renders
    flash: Option<Toast>,
}

impl SessionEntry {
    fn new() -> Self {
        Self {
            last_seen: Instant::now(),
            console: None,
            my_orders: None,
            flash: None,
        }
    }
}

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PortalConfig>,
    pub sheet: SharedSheetBackend,
    pub storage: SharedClientStorage,
    pub auth: Arc<AuthModule>,
    pub staff_driver: Arc<StaffDriver>,
    pub orders_driver: Arc<MyOrdersDriver>,
    sessions: Arc<DashMap<String, SessionEntry>>,
}

impl AppState {
    pub fn new(
        config: PortalConfig,
        sheet: SharedSheetBackend,
        bot: SharedBotBackend,
        storage: SharedClientStorage,
    ) -> Self {
        let mut auth = AuthModule::new(
            storage.clone(),
            bot.clone(),
            config.logistics_roles.clone(),
            config.bot_api_url.clone(),
            config.oauth_return_url(),
        );
        if let Some(app) = &config.discord {
            auth = auth.with_discord(DiscordOAuth::new(
                app.client_id.clone(),
                app.client_secret.clone(),
                config.discord_redirect_uri(),
            ));
        }
        let staff_driver = StaffDriver::new(bot.clone(), storage.clone(), config.status_settle);
        let orders_driver = MyOrdersDriver::new(bot);

        Self {
            config: Arc::new(config),
            sheet,
            storage,
            auth: Arc::new(auth),
            staff_driver: Arc::new(staff_driver),
            orders_driver: Arc::new(orders_driver),
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Identity for this request, refreshed against the bot API
    pub async fn auth_state(&self, session: &str) -> AuthState {
        if self.touch(session) {
            self.auth.init(session).await;
        }
        let (state, roles_changed) = self.auth.refresh_user_data(session).await;
        if roles_changed && !state.nav.show_staff_link {
            let dropped = self
                .sessions
                .get_mut(session)
                .is_some_and(|mut entry| entry.console.take().is_some());
            if dropped {
                info!("Dropped staff console for session after losing logistics roles");
            }
        }
        state
    }

    /// Mark a session active; true the first time it is seen
    fn touch(&self, session: &str) -> bool {
        match self.sessions.entry(session.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().last_seen = Instant::now();
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(SessionEntry::new());
                true
            }
        }
    }

    pub fn page(&self, title: &str, auth: &AuthState, toast: Option<&Toast>, body: &str) -> Html<String> {
        Html(pages::layout(title, auth, LOGIN_PATH, toast, body))
    }

    /// Queue a toast for the next page this session renders
    pub fn flash(&self, session: &str, toast: Toast) {
        let mut entry = self
            .sessions
            .entry(session.to_string())
            .or_insert_with(SessionEntry::new);
        entry.flash = Some(toast);
    }

    pub fn take_flash(&self, session: &str) -> Option<Toast> {
        self.sessions
            .get_mut(session)
            .and_then(|mut entry| entry.flash.take())
    }

    /// Staff console for a session, seeded with the remembered logistician name
    pub async fn console(&self, session: &str) -> SharedConsole {
        let existing = self.sessions.get(session).and_then(|entry| entry.console.clone());
        if let Some(console) = existing {
            return console;
        }
        let cached_name = self
            .storage
            .read()
            .await
            .get(session, STAFF_NAME_KEY)
            .map(str::to_string);
        let mut entry = self
            .sessions
            .entry(session.to_string())
            .or_insert_with(SessionEntry::new);
        entry
            .console
            .get_or_insert_with(|| Arc::new(Mutex::new(StaffConsoleState::new(cached_name))))
            .clone()
    }

    /// My Orders state for a session; starts over when the identity changes
    pub async fn my_orders(&self, session: &str, user: Option<&UserIdentity>) -> SharedMyOrders {
        let existing = self.sessions.get(session).and_then(|entry| entry.my_orders.clone());
        if let Some(orders) = existing {
            let same_user = orders.lock().await.user.as_ref().map(|u| &u.discord_id)
                == user.map(|u| &u.discord_id);
            if same_user {
                return orders;
            }
        }
        let fresh = Arc::new(Mutex::new(MyOrdersState::new(user.cloned())));
        let mut entry = self
            .sessions
            .entry(session.to_string())
            .or_insert_with(SessionEntry::new);
        entry.my_orders = Some(fresh.clone());
        fresh
    }

    pub fn forget_session(&self, session: &str) {
        self.sessions.remove(session);
    }

    /// Drop view state for sessions idle longer than `max_idle`
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| entry.last_seen.elapsed() < max_idle);
        self.auth.prune_pending_logins();
        before.saturating_sub(self.sessions.len())
    }

    /// Dispatch a background tick to every idle staff console
    async fn refresh_consoles(&self) {
        let consoles: Vec<(String, SharedConsole)> = self
            .sessions
            .iter()
            .filter_map(|entry| {
                entry
                    .console
                    .clone()
                    .map(|console| (entry.key().clone(), console))
            })
            .collect();
        if consoles.is_empty() {
            return;
        }

        let ticks = consoles.iter().map(|(session, console)| async move {
            match console.try_lock() {
                Ok(mut guard) => {
                    self.staff_driver
                        .dispatch(session, &mut guard, StaffEvent::Tick)
                        .await
                }
                Err(_) => debug!("Console busy, skipping background refresh"),
            }
        });
        futures::future::join_all(ticks).await;
    }
}

fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/", get(portal::catalog_page))
        .route("/request", post(portal::submit_request))
        .route("/kit/:name", get(portal::kit_page))
        .route("/orders", get(portal::my_orders_page))
        .route("/orders/:id", get(portal::order_detail_page))
        .route("/orders/:id/message", post(portal::send_order_message))
        .route(LOGIN_PATH, get(portal::login))
        .route("/auth/discord/callback", get(portal::discord_callback))
        .route(
            "/auth/callback",
            get(portal::auth_callback).post(portal::auth_callback_message),
        )
        .route("/auth/logout", get(portal::logout))
        .route("/staff", get(staff::console_page))
        .route("/staff/claim/:id", post(staff::claim))
        .route("/staff/name", post(staff::enter_name))
        .route("/staff/release/:id", post(staff::release))
        .route("/staff/status/:id", post(staff::update_status))
        .route("/staff/message/:id", post(staff::send_message))
        .route("/health", get(health))
        .fallback(not_found);

    match state.config.bot_api_url.trim_end_matches('/').parse::<HeaderValue>() {
        Ok(origin) => {
            app = app.layer(
                CorsLayer::new()
                    .allow_origin(origin)
                    .allow_methods([Method::GET, Method::POST])
                    .allow_credentials(true),
            );
        }
        Err(e) => warn!("Bot API URL is not a valid CORS origin: {}", e),
    }

    app.with_state(state)
}

/// Start the portal web server and the staff console refresh loop
pub async fn start_web_server(state: AppState) -> anyhow::Result<()> {
    let config = state.config.clone();
    let app = router(state.clone());

    let refresh_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(refresh_state.config.order_refresh);
        interval.tick().await;
        loop {
            interval.tick().await;
            refresh_state.refresh_consoles().await;
        }
    });

    let sweep_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP);
        interval.tick().await;
        loop {
            interval.tick().await;
            let evicted = sweep_state.evict_idle(sweep_state.config.session_idle);
            if evicted > 0 {
                debug!("Evicted {} idle sessions", evicted);
            }
        }
    });

    info!("Sheet backend: {:?}", config.sheet);
    info!("Bot API: {}", config.bot_api_url);
    if config.discord.is_some() {
        info!("Discord redirect: {}", config.discord_redirect_uri());
    } else {
        info!("Discord sign-in returns to {}", config.oauth_return_url());
    }

    let Some((cert_path, key_path)) = config.tls_paths() else {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Portal listening on http://{}", addr);
        axum::serve(listener, app).await?;
        return Ok(());
    };

    info!("Loading TLS certificates:");
    info!("  Certificate: {}", cert_path.display());
    info!("  Private key: {}", key_path.display());

    let tls_config = RustlsConfig::from_pem_file(&cert_path, &key_path)
        .await
        .map_err(|e| anyhow::anyhow!(
            "Failed to load TLS certificates: {}\n  Certificate: {}\n  Private key: {}\n\nHint: The private key must be in PKCS#8 PEM format. If you have an RSA key, convert it with:\n  openssl pkcs8 -topk8 -inform PEM -outform PEM -nocrypt -in private.key -out key.pem",
            e, cert_path.display(), key_path.display()
        ))?;

    tokio::spawn(redirect_http_to_https(Ports {
        http: config.http_port,
        https: config.https_port,
    }));

    let https_addr = SocketAddr::from(([0, 0, 0, 0], config.https_port));
    info!("Portal listening on https://0.0.0.0:{}", config.https_port);
    info!("HTTP redirect server on http://0.0.0.0:{}", config.http_port);

    axum_server::bind_rustls(https_addr, tls_config)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

#[derive(Clone, Copy)]
struct Ports {
    http: u16,
    https: u16,
}

fn make_https(host: &str, uri: Uri, https_port: u16) -> Result<Uri, BoxError> {
    let mut parts = uri.into_parts();

    parts.scheme = Some(axum::http::uri::Scheme::HTTPS);

    if parts.path_and_query.is_none() {
        parts.path_and_query = Some("/".parse()?);
    }

    let authority: axum::http::uri::Authority = host.parse()?;
    let bare_host = authority.host();

    // Only add port if it's not the default HTTPS port
    if https_port == 443 {
        parts.authority = Some(bare_host.parse()?);
    } else {
        parts.authority = Some(format!("{bare_host}:{https_port}").parse()?);
    }

    Ok(Uri::from_parts(parts)?)
}

/// Redirect all HTTP requests to HTTPS
async fn redirect_http_to_https(ports: Ports) {
    let redirect = move |Host(host): Host, uri: Uri| async move {
        match make_https(&host, uri, ports.https) {
            Ok(uri) => Ok(Redirect::permanent(&uri.to_string())),
            Err(error) => {
                warn!(%error, "Failed to convert URI to HTTPS");
                Err(StatusCode::BAD_REQUEST)
            }
        }
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], ports.http));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind HTTP redirect server on port {}: {}", ports.http, e);
            return;
        }
    };

    info!("HTTP redirect server listening on {}", addr);

    if let Err(e) = axum::serve(listener, redirect.into_make_service()).await {
        error!("HTTP redirect server error: {}", e);
    }
}

/// Health check endpoint
async fn health() -> &'static str {
    "Medrunner Portal Running"
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not found")
}
