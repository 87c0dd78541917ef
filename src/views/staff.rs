//! Staff console: order buckets, the archive, and the claim/release/status
//! workflow.
//!
//! [`StaffConsoleState::update`] is pure. It records what the console shows
//! and returns the [`StaffEffect`]s to run; [`StaffDriver`] runs them against
//! the bot API and client storage and feeds each result back in as another
//! [`StaffEvent`].

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::ops::RangeInclusive;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::backend::SharedBotBackend;
use crate::format::parse_datetime;
use crate::models::{Order, OrderStatus, StaffBucket, ThreadMessage};
use crate::storage::{SharedClientStorage, STAFF_NAME_KEY};

use super::my_orders::Composer;
use super::toast::Toast;

pub const PAGE_SIZES: [usize; 4] = [10, 25, 50, 100];
pub const DEFAULT_PAGE_SIZE: usize = 10;
const PAGE_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConsoleView {
    #[default]
    Active,
    Archived,
}

impl ConsoleView {
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("archived") || raw.eq_ignore_ascii_case("completed") {
            ConsoleView::Archived
        } else {
            ConsoleView::Active
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMove {
    Prev,
    Next,
}

impl PageMove {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "prev" => Some(PageMove::Prev),
            "next" => Some(PageMove::Next),
            _ => None,
        }
    }
}

/// Substring filters on the archive; empty fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveFilter {
    pub order_id: String,
    pub requester: String,
    pub logistician: String,
}

impl ArchiveFilter {
    pub fn matches(&self, order: &Order) -> bool {
        contains_ci(&order.order_id, &self.order_id)
            && contains_ci(&order.requester, &self.requester)
            && contains_ci(order.logistician.as_deref().unwrap_or(""), &self.logistician)
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim();
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// One rendered page of the archive
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivePage<'a> {
    pub orders: Vec<&'a Order>,
    pub total: usize,
    pub page: usize,
    pub total_pages: usize,
    /// Page-number buttons to show
    pub window: RangeInclusive<usize>,
    pub has_prev: bool,
    pub has_next: bool,
}

/// At most five page buttons around `current`, clamped to `1..=total_pages`
pub fn page_window(current: usize, total_pages: usize) -> RangeInclusive<usize> {
    let total_pages = total_pages.max(1);
    let current = current.clamp(1, total_pages);
    let span = PAGE_WINDOW - 1;
    let mut start = current.saturating_sub(2).max(1);
    let end = (start + span).min(total_pages);
    if end - start < span {
        start = end.saturating_sub(span).max(1);
    }
    start..=end
}

/// Name prompt shown before the first claim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimPrompt {
    pub order_id: String,
    pub from_panel: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StaffDetail {
    pub order: Order,
    pub messages: Vec<ThreadMessage>,
    pub thread_loading: bool,
    pub thread_error: Option<String>,
}

impl StaffDetail {
    fn new(order: Order) -> Self {
        Self {
            order,
            messages: Vec::new(),
            thread_loading: true,
            thread_error: None,
        }
    }

    pub fn composer(&self) -> Composer {
        Composer::for_status(&self.order.status)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StaffEvent {
    /// Page load or manual refresh
    Load,
    Refresh,
    /// Background timer
    Tick,
    OrdersLoaded(Vec<Order>),
    LoadFailed(String),
    SwitchView(ConsoleView),
    Filter(ArchiveFilter),
    SetPageSize(usize),
    ChangePage(PageMove),
    GoToPage(usize),
    OpenDetail(String),
    CloseDetail,
    ThreadLoaded {
        order_id: String,
        result: Result<Vec<ThreadMessage>, String>,
    },
    Claim { order_id: String, from_panel: bool },
    NameEntered(String),
    Claimed { order_id: String, from_panel: bool },
    ClaimFailed(String),
    Release { order_id: String, confirmed: bool },
    Released { order_id: String },
    ReleaseFailed(String),
    /// Dismiss the name prompt or the release confirmation
    Dismiss,
    UpdateStatus(OrderStatus),
    StatusUpdated { order_id: String },
    StatusUpdateFailed(String),
    SendMessage(String),
    MessageSent { order_id: String },
    SendFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StaffEffect {
    FetchOrders,
    FetchThread { order_id: String },
    PersistName(String),
    ClaimOrder {
        order_id: String,
        logistician: String,
        from_panel: bool,
    },
    ReleaseOrder { order_id: String },
    UpdateStatus { order_id: String, status: OrderStatus },
    SendMessage { order_id: String, message: String },
    /// Wait for tracking fields to settle, then re-open the panel
    ReopenAfterSettle { order_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StaffConsoleState {
    pub orders: Vec<Order>,
    pub is_loading: bool,
    pub view: ConsoleView,
    pub filter: ArchiveFilter,
    pub page: usize,
    pub page_size: usize,
    pub detail: Option<StaffDetail>,
    /// Cached display name used for claims
    pub logistician_name: Option<String>,
    pub name_prompt: Option<ClaimPrompt>,
    pub confirm_release: Option<String>,
    pending_reopen: Option<String>,
    pub toast: Option<Toast>,
    pub last_loaded: Option<DateTime<Utc>>,
}

impl StaffConsoleState {
    pub fn new(logistician_name: Option<String>) -> Self {
        Self {
            orders: Vec::new(),
            is_loading: false,
            view: ConsoleView::Active,
            filter: ArchiveFilter::default(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            detail: None,
            logistician_name: logistician_name.filter(|n| !n.trim().is_empty()),
            name_prompt: None,
            confirm_release: None,
            pending_reopen: None,
            toast: None,
            last_loaded: None,
        }
    }

    pub fn update(&mut self, event: StaffEvent) -> Vec<StaffEffect> {
        match event {
            StaffEvent::Load => self.fetch(),
            StaffEvent::Refresh => {
                self.toast = Some(Toast::info("Refreshing orders..."));
                self.is_loading = false;
                self.fetch()
            }
            StaffEvent::Tick => {
                if self.detail.is_some() {
                    debug!("Skipping refresh while an order is open");
                    return Vec::new();
                }
                self.fetch()
            }
            StaffEvent::OrdersLoaded(orders) => {
                self.is_loading = false;
                self.orders = orders;
                self.last_loaded = Some(Utc::now());
                self.page = self.page.min(self.archive_total_pages()).max(1);

                if let Some(open_id) = self.detail.as_ref().map(|d| d.order.order_id.clone()) {
                    match (self.find(&open_id).cloned(), self.detail.as_mut()) {
                        (Some(fresh), Some(detail)) => detail.order = fresh,
                        _ => self.detail = None,
                    }
                }

                match self.pending_reopen.take() {
                    Some(order_id) if self.find(&order_id).is_some() => {
                        vec![StaffEffect::ReopenAfterSettle { order_id }]
                    }
                    Some(_) => {
                        self.detail = None;
                        Vec::new()
                    }
                    None => Vec::new(),
                }
            }
            StaffEvent::LoadFailed(message) => {
                self.is_loading = false;
                self.pending_reopen = None;
                warn!("Order load failed: {}", message);
                self.toast = Some(Toast::error(
                    "Failed to load orders. Make sure Discord bot is running.",
                ));
                Vec::new()
            }
            StaffEvent::SwitchView(view) => {
                if self.view != view {
                    self.view = view;
                    self.page = 1;
                }
                Vec::new()
            }
            StaffEvent::Filter(filter) => {
                self.filter = filter;
                self.page = 1;
                Vec::new()
            }
            StaffEvent::SetPageSize(size) => {
                if PAGE_SIZES.contains(&size) {
                    self.page_size = size;
                    self.page = 1;
                }
                Vec::new()
            }
            StaffEvent::ChangePage(direction) => {
                let total_pages = self.archive_total_pages();
                match direction {
                    PageMove::Prev if self.page > 1 => self.page -= 1,
                    PageMove::Next if self.page < total_pages => self.page += 1,
                    _ => {}
                }
                Vec::new()
            }
            StaffEvent::GoToPage(page) => {
                self.page = page.clamp(1, self.archive_total_pages());
                Vec::new()
            }
            StaffEvent::OpenDetail(order_id) => {
                let Some(order) = self.find(&order_id).cloned() else {
                    self.detail = None;
                    self.toast = Some(Toast::error(format!("Order {} not found", order_id)));
                    return Vec::new();
                };
                self.detail = Some(StaffDetail::new(order));
                vec![StaffEffect::FetchThread { order_id }]
            }
            StaffEvent::CloseDetail => {
                self.detail = None;
                Vec::new()
            }
            StaffEvent::ThreadLoaded { order_id, result } => {
                let Some(detail) = self.detail.as_mut().filter(|d| d.order.order_id == order_id) else {
                    return Vec::new();
                };
                detail.thread_loading = false;
                match result {
                    Ok(messages) => {
                        detail.messages = messages;
                        detail.thread_error = None;
                    }
                    Err(message) => detail.thread_error = Some(message),
                }
                Vec::new()
            }
            StaffEvent::Claim { order_id, from_panel } => {
                if self.find(&order_id).is_none() {
                    debug!("Ignoring claim for unknown order {}", order_id);
                    return Vec::new();
                }
                match self.logistician_name.clone() {
                    Some(logistician) => vec![StaffEffect::ClaimOrder {
                        order_id,
                        logistician,
                        from_panel,
                    }],
                    None => {
                        self.name_prompt = Some(ClaimPrompt { order_id, from_panel });
                        Vec::new()
                    }
                }
            }
            StaffEvent::NameEntered(name) => {
                let Some(prompt) = self.name_prompt.take() else {
                    return Vec::new();
                };
                let name = name.trim();
                if name.is_empty() {
                    self.toast = Some(Toast::error("Username required to claim order"));
                    return Vec::new();
                }
                self.logistician_name = Some(name.to_string());
                vec![
                    StaffEffect::PersistName(name.to_string()),
                    StaffEffect::ClaimOrder {
                        order_id: prompt.order_id,
                        logistician: name.to_string(),
                        from_panel: prompt.from_panel,
                    },
                ]
            }
            StaffEvent::Claimed { order_id, from_panel } => {
                self.toast = Some(Toast::success(format!("Order {} claimed successfully!", order_id)));
                if from_panel {
                    self.detail = None;
                }
                self.fetch()
            }
            StaffEvent::ClaimFailed(message) => {
                self.toast = Some(Toast::error(format!("Failed to claim order: {}", message)));
                Vec::new()
            }
            StaffEvent::Release { order_id, confirmed } => {
                if !confirmed {
                    self.confirm_release = Some(order_id);
                    return Vec::new();
                }
                self.confirm_release = None;
                vec![StaffEffect::ReleaseOrder { order_id }]
            }
            StaffEvent::Released { order_id } => {
                self.toast = Some(Toast::success(format!("Order {} released successfully!", order_id)));
                self.detail = None;
                self.fetch()
            }
            StaffEvent::ReleaseFailed(message) => {
                self.toast = Some(Toast::error(format!("Failed to release order: {}", message)));
                Vec::new()
            }
            StaffEvent::Dismiss => {
                if self.name_prompt.take().is_some() {
                    self.toast = Some(Toast::error("Username required to claim order"));
                }
                self.confirm_release = None;
                Vec::new()
            }
            StaffEvent::UpdateStatus(status) => {
                let Some(detail) = &self.detail else {
                    return Vec::new();
                };
                if detail.order.status == status {
                    self.toast = Some(Toast::info("Status unchanged"));
                    return Vec::new();
                }
                vec![StaffEffect::UpdateStatus {
                    order_id: detail.order.order_id.clone(),
                    status,
                }]
            }
            StaffEvent::StatusUpdated { order_id } => {
                self.toast = Some(Toast::success("Order status updated successfully"));
                self.pending_reopen = Some(order_id);
                self.fetch()
            }
            StaffEvent::StatusUpdateFailed(message) => {
                self.toast = Some(Toast::error(format!(
                    "Failed to update order status: {}",
                    message
                )));
                Vec::new()
            }
            StaffEvent::SendMessage(message) => {
                let Some(detail) = &self.detail else {
                    self.toast = Some(Toast::error("No order selected"));
                    return Vec::new();
                };
                if detail.order.is_terminal() {
                    self.toast = Some(Toast::error(format!(
                        "Cannot send messages - order is {}",
                        detail.order.status
                    )));
                    return Vec::new();
                }
                let message = message.trim();
                if message.is_empty() {
                    self.toast = Some(Toast::error("Please enter a message"));
                    return Vec::new();
                }
                vec![StaffEffect::SendMessage {
                    order_id: detail.order.order_id.clone(),
                    message: message.to_string(),
                }]
            }
            StaffEvent::MessageSent { order_id } => {
                self.toast = Some(Toast::success("Message sent to Discord"));
                vec![StaffEffect::FetchThread { order_id }]
            }
            StaffEvent::SendFailed(message) => {
                self.toast = Some(Toast::error(format!("Failed to send message: {}", message)));
                Vec::new()
            }
        }
    }

    /// Single outstanding order fetch
    fn fetch(&mut self) -> Vec<StaffEffect> {
        if self.is_loading {
            debug!("Order fetch already in flight");
            return Vec::new();
        }
        self.is_loading = true;
        vec![StaffEffect::FetchOrders]
    }

    /// Clear state left behind by a dispatch that was dropped mid-fetch.
    /// Dispatches are serialized per console, so a set flag at entry means
    /// nobody will ever deliver the result.
    pub fn recover_interrupted_fetch(&mut self) {
        if self.is_loading {
            debug!("Clearing order fetch abandoned by an earlier request");
            self.is_loading = false;
            self.pending_reopen = None;
        }
    }

    pub fn find(&self, order_id: &str) -> Option<&Order> {
        self.orders.iter().find(|o| o.order_id == order_id)
    }

    pub fn bucket(&self, bucket: StaffBucket) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(move |o| o.staff_bucket() == bucket)
    }

    pub fn open_orders(&self) -> impl Iterator<Item = &Order> {
        self.bucket(StaffBucket::Open)
    }

    pub fn active_orders(&self) -> impl Iterator<Item = &Order> {
        self.bucket(StaffBucket::Active)
    }

    /// Open plus active, the count on the "Active" tab
    pub fn active_total(&self) -> usize {
        self.open_orders().count() + self.active_orders().count()
    }

    pub fn archived_total(&self) -> usize {
        self.bucket(StaffBucket::Archived).count()
    }

    /// Archived orders matching the filter, newest first
    pub fn filtered_archive(&self) -> Vec<&Order> {
        let mut orders: Vec<(Option<DateTime<Utc>>, &Order)> = self
            .bucket(StaffBucket::Archived)
            .filter(|o| self.filter.matches(o))
            .map(|o| (parse_datetime(&o.date, &Utc), o))
            .collect();
        orders.sort_by(|a, b| b.0.cmp(&a.0));
        orders.into_iter().map(|(_, o)| o).collect()
    }

    fn archive_total_pages(&self) -> usize {
        let total = self.filtered_archive().len();
        total.div_ceil(self.page_size).max(1)
    }

    pub fn archive_page(&self) -> ArchivePage<'_> {
        let filtered = self.filtered_archive();
        let total = filtered.len();
        let total_pages = total.div_ceil(self.page_size).max(1);
        let page = self.page.clamp(1, total_pages);
        let orders = filtered
            .into_iter()
            .skip((page - 1) * self.page_size)
            .take(self.page_size)
            .collect();

        ArchivePage {
            orders,
            total,
            page,
            total_pages,
            window: page_window(page, total_pages),
            has_prev: page > 1,
            has_next: page < total_pages,
        }
    }

    pub fn take_toast(&mut self) -> Option<Toast> {
        self.toast.take()
    }
}

/// Runs console effects against the bot API and client storage
pub struct StaffDriver {
    bot: SharedBotBackend,
    storage: SharedClientStorage,
    status_settle: Duration,
}

impl StaffDriver {
    pub fn new(bot: SharedBotBackend, storage: SharedClientStorage, status_settle: Duration) -> Self {
        Self {
            bot,
            storage,
            status_settle,
        }
    }

    /// Apply an event and run every effect it leads to
    pub async fn dispatch(&self, session: &str, state: &mut StaffConsoleState, event: StaffEvent) {
        state.recover_interrupted_fetch();
        let mut queue: VecDeque<StaffEffect> = state.update(event).into();
        while let Some(effect) = queue.pop_front() {
            if let Some(follow_up) = self.execute(session, effect).await {
                queue.extend(state.update(follow_up));
            }
        }
    }

    async fn execute(&self, session: &str, effect: StaffEffect) -> Option<StaffEvent> {
        let event = match effect {
            StaffEffect::FetchOrders => match self.bot.get_orders().await {
                Ok(orders) => StaffEvent::OrdersLoaded(orders),
                Err(e) => StaffEvent::LoadFailed(e.to_string()),
            },
            StaffEffect::FetchThread { order_id } => {
                let result = self
                    .bot
                    .get_thread_messages(&order_id)
                    .await
                    .map_err(|e| e.to_string());
                StaffEvent::ThreadLoaded { order_id, result }
            }
            StaffEffect::PersistName(name) => {
                let mut storage = self.storage.write().await;
                storage.set(session, STAFF_NAME_KEY, name);
                if let Err(e) = storage.save().await {
                    warn!("Failed to persist logistician name: {}", e);
                }
                return None;
            }
            StaffEffect::ClaimOrder {
                order_id,
                logistician,
                from_panel,
            } => match self.bot.claim_order(&order_id, &logistician).await {
                Ok(()) => {
                    info!("{} claimed {}", logistician, order_id);
                    StaffEvent::Claimed { order_id, from_panel }
                }
                Err(e) => StaffEvent::ClaimFailed(e.to_string()),
            },
            StaffEffect::ReleaseOrder { order_id } => match self.bot.release_order(&order_id).await {
                Ok(()) => StaffEvent::Released { order_id },
                Err(e) => StaffEvent::ReleaseFailed(e.to_string()),
            },
            StaffEffect::UpdateStatus { order_id, status } => {
                match self.bot.update_status(&order_id, &status).await {
                    Ok(()) => StaffEvent::StatusUpdated { order_id },
                    Err(e) => StaffEvent::StatusUpdateFailed(e.to_string()),
                }
            }
            StaffEffect::SendMessage { order_id, message } => {
                match self.bot.send_message(&order_id, &message, true).await {
                    Ok(()) => StaffEvent::MessageSent { order_id },
                    Err(e) => StaffEvent::SendFailed(e.to_string()),
                }
            }
            StaffEffect::ReopenAfterSettle { order_id } => {
                tokio::time::sleep(self.status_settle).await;
                StaffEvent::OpenDetail(order_id)
            }
        };
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BotBackend, SheetBackend, SubmitRequest};
    use crate::models::LineItem;
    use crate::sheet::{LocalSheet, SheetData};
    use crate::error::Result;
    use crate::models::RoleRefresh;
    use crate::storage::{create_shared_client_storage, ClientStorage};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Bot whose first order fetch never completes
    struct StallingBot {
        inner: Arc<LocalSheet>,
        stalled: AtomicBool,
    }

    #[async_trait::async_trait]
    impl BotBackend for StallingBot {
        async fn get_orders(&self) -> Result<Vec<Order>> {
            if !self.stalled.swap(true, Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            self.inner.get_orders().await
        }

        async fn get_user_orders(&self, discord_user_id: &str) -> Result<Vec<Order>> {
            self.inner.get_user_orders(discord_user_id).await
        }

        async fn claim_order(&self, order_id: &str, logistician: &str) -> Result<()> {
            self.inner.claim_order(order_id, logistician).await
        }

        async fn release_order(&self, order_id: &str) -> Result<()> {
            self.inner.release_order(order_id).await
        }

        async fn update_status(&self, order_id: &str, status: &OrderStatus) -> Result<()> {
            self.inner.update_status(order_id, status).await
        }

        async fn get_thread_messages(&self, order_id: &str) -> Result<Vec<ThreadMessage>> {
            self.inner.get_thread_messages(order_id).await
        }

        async fn send_message(&self, order_id: &str, message: &str, is_staff: bool) -> Result<()> {
            self.inner.send_message(order_id, message, is_staff).await
        }

        async fn refresh_user(&self, discord_id: &str) -> Result<RoleRefresh> {
            self.inner.refresh_user(discord_id).await
        }
    }

    fn order(id: &str, requester: &str, status: &str, logistician: Option<&str>) -> Order {
        Order {
            order_id: id.to_string(),
            requester: requester.to_string(),
            status: OrderStatus::parse(status),
            logistician: logistician.map(str::to_string),
            ..Default::default()
        }
    }

    fn loaded(orders: Vec<Order>) -> StaffConsoleState {
        let mut state = StaffConsoleState::new(None);
        state.update(StaffEvent::Load);
        state.update(StaffEvent::OrdersLoaded(orders));
        state
    }

    async fn fixture(count: usize) -> (Arc<LocalSheet>, SharedClientStorage, StaffDriver, Vec<String>) {
        let sheet = Arc::new(LocalSheet::in_memory(SheetData::sample()));
        let mut ids = Vec::new();
        for _ in 0..count {
            let receipt = sheet
                .submit_request(&SubmitRequest {
                    timestamp: String::new(),
                    date: "2025-01-01T00:00:00Z".to_string(),
                    discord_username: "Alice".to_string(),
                    discord_id: Some("1001".to_string()),
                    items: vec![LineItem::new("Rookie Kit", 1)],
                    availability: String::new(),
                    notes: String::new(),
                })
                .await
                .unwrap();
            ids.push(receipt.order_id);
        }
        let storage = create_shared_client_storage(ClientStorage::new());
        let driver = StaffDriver::new(sheet.clone(), storage.clone(), Duration::from_millis(1));
        (sheet, storage, driver, ids)
    }

    #[test]
    fn test_buckets() {
        let state = loaded(vec![
            order("MRS-1", "Alice", "Received", None),
            order("MRS-2", "Bob", "Processing", Some("Kestrel")),
            order("MRS-3", "Cara", "Processing", Some("  ")),
            order("MRS-4", "Dan", "Completed", Some("Kestrel")),
            order("MRS-5", "Eve", "Cancelled", None),
        ]);
        assert_eq!(state.open_orders().count(), 2);
        assert_eq!(state.active_orders().count(), 1);
        assert_eq!(state.active_total(), 3);
        assert_eq!(state.archived_total(), 2);
    }

    #[test]
    fn test_archive_filter_by_requester() {
        let mut state = loaded(vec![
            order("MRS-1", "Alice", "Completed", None),
            order("MRS-2", "Bob", "Completed", None),
        ]);
        state.update(StaffEvent::Filter(ArchiveFilter {
            requester: "ali".to_string(),
            ..Default::default()
        }));
        let page = state.archive_page();
        assert_eq!(page.orders.len(), 1);
        assert_eq!(page.orders[0].requester, "Alice");
    }

    #[test]
    fn test_archive_filters_must_all_match() {
        let mut state = loaded(vec![
            order("MRS-1", "Alice", "Completed", Some("Kestrel")),
            order("MRS-2", "Alice", "Completed", Some("Osprey")),
            order("MRS-3", "Alice", "Received", Some("Kestrel")),
        ]);
        state.update(StaffEvent::Filter(ArchiveFilter {
            order_id: "mrs".to_string(),
            requester: "ALICE".to_string(),
            logistician: "kes".to_string(),
        }));
        let page = state.archive_page();
        assert_eq!(page.total, 1);
        assert_eq!(page.orders[0].order_id, "MRS-1");
    }

    #[test]
    fn test_archive_sorted_newest_first() {
        let mut older = order("MRS-1", "A", "Completed", None);
        older.date = "2025-01-01T00:00:00Z".to_string();
        let mut newer = order("MRS-2", "B", "Completed", None);
        newer.date = "2025-02-01T00:00:00Z".to_string();
        let undated = order("MRS-3", "C", "Completed", None);

        let state = loaded(vec![older, undated, newer]);
        let ids: Vec<_> = state.archive_page().orders.iter().map(|o| o.order_id.as_str()).collect();
        assert_eq!(ids, vec!["MRS-2", "MRS-1", "MRS-3"]);
    }

    #[test]
    fn test_pagination_last_page() {
        let orders = (0..23)
            .map(|i| {
                let mut o = order(&format!("MRS-{}", i), "Alice", "Completed", None);
                o.date = format!("2025-01-01T00:00:{:02}Z", 59 - i);
                o
            })
            .collect();
        let mut state = loaded(orders);
        state.update(StaffEvent::SwitchView(ConsoleView::Archived));
        state.update(StaffEvent::GoToPage(3));

        let page = state.archive_page();
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.orders.len(), 3);
        let ids: Vec<_> = page.orders.iter().map(|o| o.order_id.as_str()).collect();
        assert_eq!(ids, vec!["MRS-20", "MRS-21", "MRS-22"]);
        assert!(!page.has_next);
        assert!(page.has_prev);

        state.update(StaffEvent::ChangePage(PageMove::Next));
        assert_eq!(state.page, 3);

        state.update(StaffEvent::SetPageSize(25));
        assert_eq!(state.page, 1);
        assert_eq!(state.archive_page().orders.len(), 23);
        state.update(StaffEvent::SetPageSize(7));
        assert_eq!(state.page_size, 25);
    }

    #[test]
    fn test_page_window() {
        assert_eq!(page_window(1, 1), 1..=1);
        assert_eq!(page_window(1, 10), 1..=5);
        assert_eq!(page_window(6, 10), 4..=8);
        assert_eq!(page_window(10, 10), 6..=10);
        assert_eq!(page_window(2, 3), 1..=3);
        assert_eq!(page_window(1, 0), 1..=1);
    }

    #[test]
    fn test_fetch_guard_and_tick() {
        let mut state = StaffConsoleState::new(None);
        assert_eq!(state.update(StaffEvent::Tick), vec![StaffEffect::FetchOrders]);
        assert!(state.update(StaffEvent::Tick).is_empty());
        assert!(state.update(StaffEvent::Load).is_empty());

        state.update(StaffEvent::OrdersLoaded(vec![order("MRS-1", "Alice", "Received", None)]));
        state.update(StaffEvent::OpenDetail("MRS-1".to_string()));
        assert!(state.update(StaffEvent::Tick).is_empty());

        state.update(StaffEvent::CloseDetail);
        assert_eq!(state.update(StaffEvent::Tick), vec![StaffEffect::FetchOrders]);
    }

    #[test]
    fn test_prev_on_first_page_stays() {
        let orders = (0..12)
            .map(|i| order(&format!("MRS-{}", i), "Alice", "Completed", None))
            .collect();
        let mut state = loaded(orders);
        state.update(StaffEvent::SwitchView(ConsoleView::Archived));

        state.update(StaffEvent::ChangePage(PageMove::Prev));
        assert_eq!(state.page, 1);
        state.update(StaffEvent::ChangePage(PageMove::Next));
        assert_eq!(state.page, 2);
        // Re-selecting the current tab keeps the page
        state.update(StaffEvent::SwitchView(ConsoleView::Archived));
        assert_eq!(state.page, 2);
        state.update(StaffEvent::ChangePage(PageMove::Prev));
        assert_eq!(state.page, 1);
        assert_eq!(PageMove::parse("next"), Some(PageMove::Next));
        assert_eq!(PageMove::parse("sideways"), None);
    }

    #[test]
    fn test_refresh_overrides_stale_fetch() {
        let mut state = StaffConsoleState::new(None);
        state.update(StaffEvent::Load);
        assert!(state.is_loading);
        assert_eq!(state.update(StaffEvent::Refresh), vec![StaffEffect::FetchOrders]);
    }

    #[test]
    fn test_claim_unknown_order_is_ignored() {
        let mut state = loaded(vec![order("MRS-1", "Alice", "Received", None)]);
        let effects = state.update(StaffEvent::Claim {
            order_id: "MRS-404".to_string(),
            from_panel: false,
        });
        assert!(effects.is_empty());
        assert!(state.name_prompt.is_none());
    }

    #[test]
    fn test_status_update_closes_panel_when_order_is_gone() {
        let mut state = loaded(vec![order("MRS-1", "Alice", "Processing", Some("Kestrel"))]);
        state.update(StaffEvent::OpenDetail("MRS-1".to_string()));

        let effects = state.update(StaffEvent::StatusUpdated {
            order_id: "MRS-1".to_string(),
        });
        assert_eq!(effects, vec![StaffEffect::FetchOrders]);

        let effects = state.update(StaffEvent::OrdersLoaded(vec![order("MRS-2", "Bob", "Received", None)]));
        assert!(effects.is_empty());
        assert!(state.detail.is_none());
        assert!(!state.is_loading);
    }

    #[test]
    fn test_status_unchanged_is_a_no_op() {
        let mut state = loaded(vec![order("MRS-1", "Alice", "Processing", Some("Kestrel"))]);
        state.update(StaffEvent::OpenDetail("MRS-1".to_string()));
        assert!(state.update(StaffEvent::UpdateStatus(OrderStatus::Processing)).is_empty());
        assert_eq!(state.take_toast(), Some(Toast::info("Status unchanged")));
    }

    #[test]
    fn test_release_needs_confirmation() {
        let mut state = loaded(vec![order("MRS-1", "Alice", "Processing", Some("Kestrel"))]);
        let release = |confirmed| StaffEvent::Release {
            order_id: "MRS-1".to_string(),
            confirmed,
        };
        assert!(state.update(release(false)).is_empty());
        assert_eq!(state.confirm_release.as_deref(), Some("MRS-1"));
        state.update(StaffEvent::Dismiss);
        assert!(state.confirm_release.is_none());

        assert_eq!(
            state.update(release(true)),
            vec![StaffEffect::ReleaseOrder {
                order_id: "MRS-1".to_string()
            }]
        );
    }

    #[test]
    fn test_terminal_order_blocks_staff_message() {
        let mut state = loaded(vec![order("MRS-1", "Alice", "Cancelled", Some("Kestrel"))]);
        state.update(StaffEvent::OpenDetail("MRS-1".to_string()));
        assert!(state.update(StaffEvent::SendMessage("hello".to_string())).is_empty());
        assert!(!state.detail.as_ref().unwrap().composer().enabled);
    }

    #[tokio::test]
    async fn test_claim_prompts_once_and_reuses_name() {
        let (sheet, storage, driver, ids) = fixture(2).await;
        let mut state = StaffConsoleState::new(None);
        driver.dispatch("s1", &mut state, StaffEvent::Load).await;

        let mut prompts = 0;
        for id in &ids {
            driver
                .dispatch(
                    "s1",
                    &mut state,
                    StaffEvent::Claim {
                        order_id: id.clone(),
                        from_panel: false,
                    },
                )
                .await;
            if state.name_prompt.is_some() {
                prompts += 1;
                driver
                    .dispatch("s1", &mut state, StaffEvent::NameEntered(" Kestrel ".to_string()))
                    .await;
            }
        }

        assert_eq!(prompts, 1);
        assert_eq!(storage.read().await.get("s1", STAFF_NAME_KEY), Some("Kestrel"));
        let orders = sheet.get_orders().await.unwrap();
        assert!(orders.iter().all(|o| o.logistician.as_deref() == Some("Kestrel")));
        assert_eq!(state.active_orders().count(), 2);

        // A fresh console for the same browser starts with the cached name
        let cached = storage.read().await.get("s1", STAFF_NAME_KEY).map(str::to_string);
        let mut next = StaffConsoleState::new(cached);
        next.update(StaffEvent::OrdersLoaded(state.orders.clone()));
        let effects = next.update(StaffEvent::Claim {
            order_id: ids[0].clone(),
            from_panel: true,
        });
        assert!(matches!(effects.as_slice(), [StaffEffect::ClaimOrder { .. }]));
    }

    #[tokio::test]
    async fn test_empty_name_does_not_claim() {
        let (sheet, _storage, driver, ids) = fixture(1).await;
        let mut state = StaffConsoleState::new(None);
        driver.dispatch("s1", &mut state, StaffEvent::Load).await;
        driver
            .dispatch(
                "s1",
                &mut state,
                StaffEvent::Claim {
                    order_id: ids[0].clone(),
                    from_panel: false,
                },
            )
            .await;
        driver
            .dispatch("s1", &mut state, StaffEvent::NameEntered("  ".to_string()))
            .await;
        assert_eq!(
            state.take_toast().unwrap().message,
            "Username required to claim order"
        );
        assert!(sheet.get_orders().await.unwrap()[0].logistician.is_none());
    }

    #[tokio::test]
    async fn test_status_update_refetches_and_reopens() {
        let (_sheet, _storage, driver, ids) = fixture(1).await;
        let mut state = StaffConsoleState::new(Some("Kestrel".to_string()));
        driver.dispatch("s1", &mut state, StaffEvent::Load).await;
        driver
            .dispatch("s1", &mut state, StaffEvent::OpenDetail(ids[0].clone()))
            .await;

        driver
            .dispatch(
                "s1",
                &mut state,
                StaffEvent::UpdateStatus(OrderStatus::PendingCollection),
            )
            .await;

        let detail = state.detail.as_ref().unwrap();
        assert_eq!(detail.order.status, OrderStatus::PendingCollection);
        let tracking = detail.order.tracking.as_ref().unwrap();
        assert!(tracking.processing_timestamp.is_some());
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn test_release_closes_panel() {
        let (sheet, _storage, driver, ids) = fixture(1).await;
        sheet.claim_order(&ids[0], "Kestrel").await.unwrap();

        let mut state = StaffConsoleState::new(Some("Kestrel".to_string()));
        driver.dispatch("s1", &mut state, StaffEvent::Load).await;
        driver
            .dispatch("s1", &mut state, StaffEvent::OpenDetail(ids[0].clone()))
            .await;
        driver
            .dispatch(
                "s1",
                &mut state,
                StaffEvent::Release {
                    order_id: ids[0].clone(),
                    confirmed: true,
                },
            )
            .await;

        assert!(state.detail.is_none());
        assert_eq!(state.open_orders().count(), 1);
    }

    #[tokio::test]
    async fn test_staff_message_lands_in_thread() {
        let (_sheet, _storage, driver, ids) = fixture(1).await;
        let mut state = StaffConsoleState::new(Some("Kestrel".to_string()));
        driver.dispatch("s1", &mut state, StaffEvent::Load).await;
        driver
            .dispatch("s1", &mut state, StaffEvent::OpenDetail(ids[0].clone()))
            .await;
        driver
            .dispatch("s1", &mut state, StaffEvent::SendMessage("Packed".to_string()))
            .await;

        let detail = state.detail.as_ref().unwrap();
        assert!(detail.messages.iter().any(|m| m.content == "Packed" && !m.is_bot));
        assert_eq!(state.take_toast().unwrap().message, "Message sent to Discord");
    }

    #[tokio::test]
    async fn test_dropped_fetch_does_not_wedge_console() {
        let (sheet, storage, _driver, ids) = fixture(1).await;
        let bot = Arc::new(StallingBot {
            inner: sheet,
            stalled: AtomicBool::new(false),
        });
        let driver = StaffDriver::new(bot, storage, Duration::from_millis(1));
        let mut state = StaffConsoleState::new(None);

        let interrupted = tokio::time::timeout(
            Duration::from_millis(20),
            driver.dispatch("s1", &mut state, StaffEvent::Load),
        )
        .await;
        assert!(interrupted.is_err());
        assert!(state.is_loading);

        driver.dispatch("s1", &mut state, StaffEvent::Load).await;
        assert!(!state.is_loading);
        assert_eq!(state.orders.len(), 1);
        assert_eq!(state.orders[0].order_id, ids[0]);
    }
}
