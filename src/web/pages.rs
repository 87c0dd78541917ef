//! Server-rendered HTML for the portal pages

use chrono::{DateTime, Utc};

use crate::auth::AuthState;
use crate::backend::PriceTable;
use crate::format::{format_availability, format_order_date, format_timestamp, html_escape, html_lines};
use crate::models::{KitInfo, Order, OrderStatus, ThreadMessage};
use crate::views::catalog::QUANTITY_FIELD_PREFIX;
use crate::views::my_orders::{DetailPanel, MyOrdersState};
use crate::views::staff::{ArchivePage, ConsoleView, StaffConsoleState, StaffDetail, PAGE_SIZES};
use crate::views::{CatalogView, Composer, Toast};

const PORTAL_CSS: &str = r#"
* { box-sizing: border-box; margin: 0; padding: 0; }
body {
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
    background: #1a1a2e;
    min-height: 100vh;
    color: #fff;
}
a { color: #7289da; text-decoration: none; }
a:hover { text-decoration: underline; }
.navbar {
    background: rgba(255,255,255,0.05);
    padding: 1rem 2rem;
    display: flex;
    justify-content: space-between;
    align-items: center;
    border-bottom: 1px solid rgba(255,255,255,0.1);
}
.navbar h1 { font-size: 1.25rem; }
.navbar nav { display: flex; gap: 1.5rem; align-items: center; }
.navbar .user { display: flex; align-items: center; gap: 0.75rem; }
.navbar .user img { width: 32px; height: 32px; border-radius: 50%; }
.container { max-width: 1200px; margin: 0 auto; padding: 2rem; }
.card {
    background: rgba(255,255,255,0.05);
    border: 1px solid rgba(255,255,255,0.1);
    border-radius: 12px;
    padding: 1.25rem;
    margin-bottom: 1rem;
}
.thumb { width: 100%; max-height: 140px; object-fit: contain; margin-bottom: 0.5rem; }
.grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(280px, 1fr)); gap: 1rem; }
h2 { margin: 1.5rem 0 1rem; }
h3 { margin-bottom: 0.5rem; }
.muted { color: #a0a0a0; font-size: 0.9rem; }
.btn {
    display: inline-block;
    background: #5865F2;
    color: #fff;
    border: none;
    padding: 0.5rem 1rem;
    border-radius: 6px;
    cursor: pointer;
    font-size: 0.9rem;
}
.btn:disabled { opacity: 0.5; cursor: not-allowed; }
.btn-danger { background: #e74c3c; }
.btn-secondary { background: #4a4a6a; }
input, select, textarea {
    background: #2a2a4a;
    color: #fff;
    border: 1px solid #4a4a6a;
    border-radius: 6px;
    padding: 0.4rem 0.6rem;
}
textarea { width: 100%; min-height: 4rem; }
input:disabled, textarea:disabled { opacity: 0.5; cursor: not-allowed; }
table { width: 100%; border-collapse: collapse; }
th, td { text-align: left; padding: 0.5rem; border-bottom: 1px solid rgba(255,255,255,0.1); }
.badge { padding: 0.15rem 0.6rem; border-radius: 999px; font-size: 0.8rem; }
.status-received { background: #34495e; }
.status-processing, .status-claimed { background: #2980b9; }
.status-ready { background: #d35400; }
.status-completed { background: #27ae60; }
.status-cancelled { background: #7f8c8d; }
.tag-academy { background: #8e44ad; }
.toast { padding: 0.75rem 1rem; border-radius: 8px; margin-bottom: 1rem; }
.toast-success { background: #1e8449; }
.toast-error { background: #922b21; }
.toast-info { background: #1f618d; }
.message { border-left: 4px solid; padding: 0.5rem 0.75rem; margin-bottom: 0.75rem; }
.border-purple-500 { border-color: #8e44ad; }
.border-blue-500 { border-color: #2980b9; }
.border-green-500 { border-color: #27ae60; }
.tabs { display: flex; gap: 1rem; margin-bottom: 1rem; }
.tabs a.current { font-weight: 700; text-decoration: underline; }
.pager { display: flex; gap: 0.5rem; align-items: center; margin-top: 1rem; }
.pager .current { font-weight: 700; }
.dialog { border: 1px solid #d35400; }
"#;

/// Full page with navigation and an optional toast
pub fn layout(title: &str, auth: &AuthState, login_url: &str, toast: Option<&Toast>, body: &str) -> String {
    let staff_link = if auth.nav.show_staff_link {
        r#"<a href="/staff">Staff Console</a>"#
    } else {
        ""
    };

    let user_info = match auth.user.as_ref().filter(|_| auth.nav.show_user_info) {
        Some(user) => {
            let avatar = user
                .avatar_url()
                .map(|url| format!(r#"<img src="{}" alt="">"#, html_escape(&url)))
                .unwrap_or_default();
            format!(
                r#"<div class="user">{}<span>{}</span><a href="/auth/logout">Logout</a></div>"#,
                avatar,
                html_escape(&user.discord_username)
            )
        }
        None => format!(
            r#"<a class="btn" href="{}">Login with Discord</a>"#,
            html_escape(login_url)
        ),
    };

    let toast = toast
        .map(|t| {
            format!(
                r#"<div class="toast {}">{}</div>"#,
                t.css_class(),
                html_escape(&t.message)
            )
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title} - Medrunner Logistics</title>
    <style>{css}</style>
</head>
<body>
    <div class="navbar">
        <h1>Medrunner Logistics</h1>
        <nav>
            <a href="/">Catalog</a>
            <a href="/orders">My Orders</a>
            {staff_link}
            {user_info}
        </nav>
    </div>
    <div class="container">
        {toast}
        {body}
    </div>
</body>
</html>"#,
        title = html_escape(title),
        css = PORTAL_CSS,
        staff_link = staff_link,
        user_info = user_info,
        toast = toast,
        body = body,
    )
}

pub fn sign_in_body(login_url: &str, reason: &str) -> String {
    format!(
        r#"<div class="card">
    <h2>Sign in required</h2>
    <p class="muted">{}</p>
    <p style="margin-top:1rem"><a class="btn" href="{}">Login with Discord</a></p>
</div>"#,
        html_escape(reason),
        html_escape(login_url)
    )
}

pub fn access_denied_body() -> String {
    r#"<div class="card">
    <h2>Access Denied</h2>
    <p class="muted">The staff console is limited to logistics staff.</p>
    <p class="muted">Please contact a logistics lead if you believe this is an error.</p>
</div>"#
        .to_string()
}

fn status_badge(status: &OrderStatus) -> String {
    format!(
        r#"<span class="badge {}">{}</span>"#,
        status.css_class(),
        html_escape(status.display_name())
    )
}

fn items_list(order: &Order) -> String {
    let items = order.parsed_items().display_items();
    if items.is_empty() {
        return r#"<p class="muted">No items</p>"#.to_string();
    }
    let rows: String = items
        .iter()
        .map(|item| format!("<li>{}x {}</li>", item.quantity, html_escape(&item.name)))
        .collect();
    format!("<ul>{}</ul>", rows)
}

fn money(value: Option<f64>) -> String {
    match value {
        Some(v) if v > 0.0 => format!("{:.0} aUEC", v),
        _ => "-".to_string(),
    }
}

fn tracking_list(order: &Order, now: &DateTime<Utc>) -> String {
    let Some(tracking) = order.tracking.as_ref().filter(|t| !t.is_empty()) else {
        return String::new();
    };
    let rows: String = tracking
        .milestones()
        .into_iter()
        .map(|(label, raw)| {
            format!(
                "<tr><td>{}</td><td>{}</td></tr>",
                label,
                html_escape(&format_timestamp(raw, now))
            )
        })
        .collect();
    format!("<h3>Tracking</h3><table>{}</table>", rows)
}

fn order_summary(order: &Order) -> String {
    format!(
        r#"<p>{status} <span class="muted">{date}</span></p>
<p class="muted">Requester: {requester}</p>
<p class="muted">Logistician: {logistician}</p>
<p class="muted">Items: {count} &middot; Cost: {cost} &middot; Stipend: {stipend}</p>"#,
        status = status_badge(&order.status),
        date = html_escape(&format_order_date(order.display_date(), &Utc)),
        requester = html_escape(&order.requester),
        logistician = html_escape(order.assigned_logistician().unwrap_or("Unassigned")),
        count = order.item_count,
        cost = money(order.cost),
        stipend = money(order.stipend),
    )
}

fn thread_view(
    messages: &[ThreadMessage],
    loading: bool,
    error: Option<&str>,
    viewer_id: Option<&str>,
) -> String {
    if loading {
        return r#"<p class="muted">Loading messages...</p>"#.to_string();
    }
    if let Some(error) = error {
        return format!(
            r#"<p class="muted">Failed to load messages</p><p class="muted">{}</p>"#,
            html_escape(error)
        );
    }
    if messages.is_empty() {
        return r#"<p class="muted">No messages yet</p>"#.to_string();
    }
    messages
        .iter()
        .map(|message| {
            let style = message.style_for(viewer_id);
            format!(
                r#"<div class="message {}"><strong>{}{}</strong> <span class="muted">{}</span><p>{}</p></div>"#,
                style.border_class(),
                html_escape(&message.author),
                style.suffix(),
                html_escape(&format_order_date(&message.timestamp, &Utc)),
                html_lines(&message.display_content())
            )
        })
        .collect()
}

fn composer_form(action: &str, composer: &Composer) -> String {
    let disabled = if composer.enabled { "" } else { " disabled" };
    format!(
        r#"<form method="post" action="{action}">
    <label>{label}</label>
    <textarea name="message" placeholder="{placeholder}"{disabled}></textarea>
    <button class="btn" type="submit"{disabled}>Send</button>
</form>"#,
        action = html_escape(action),
        label = html_escape(&composer.label),
        placeholder = html_escape(&composer.placeholder),
        disabled = disabled,
    )
}

// ---------------------------------------------------------------------------
// Catalog

pub fn catalog_body(view: &CatalogView, prices: &PriceTable, signed_in: bool) -> String {
    if view.is_empty() {
        return r#"<div class="card"><p class="muted">No equipment is listed right now.</p></div>"#
            .to_string();
    }

    let mut sections = String::new();
    for (category, items) in &view.categories {
        let cards: String = items
            .iter()
            .map(|item| {
                let academy = if item.is_academy_restricted {
                    r#" <span class="badge tag-academy">Academy</span>"#
                } else {
                    ""
                };
                let price = prices.get(&item.name).copied().or(item.market_price);
                let missions = item
                    .required_missions
                    .as_deref()
                    .filter(|m| !m.trim().is_empty())
                    .map(|m| format!(r#"<p class="muted">Required missions: {}</p>"#, html_escape(m)))
                    .unwrap_or_default();
                format!(
                    r#"<div class="card">
    <img class="thumb" src="{image}" alt="">
    <h3>{name}{academy}</h3>
    <p class="muted">Stock: {stock} &middot; Price: {price}</p>
    {missions}
    <p class="muted"><a href="/kit/{kit}">Contents</a></p>
    <label>Qty <input type="number" min="0" name="{prefix}{field}" value="0" style="width:5rem"></label>
</div>"#,
                    image = html_escape(item.image_or_placeholder()),
                    name = html_escape(&item.name),
                    academy = academy,
                    stock = html_escape(&item.stock.to_string()),
                    price = money(price),
                    missions = missions,
                    kit = urlencoding::encode(&item.name),
                    prefix = QUANTITY_FIELD_PREFIX,
                    field = html_escape(&item.name),
                )
            })
            .collect();
        sections.push_str(&format!(
            r#"<h2>{}</h2><div class="grid">{}</div>"#,
            html_escape(category),
            cards
        ));
    }

    let submit = if signed_in {
        r#"<button class="btn" type="submit">Submit Request</button>"#
    } else {
        r#"<button class="btn" type="submit" disabled>Sign in to submit</button>"#
    };

    format!(
        r#"<form method="post" action="/request">
{sections}
<div class="card">
    <h2>Availability</h2>
    <p>
        <input type="date" name="available_date">
        <input type="time" name="available_from"> to <input type="time" name="available_to">
        <label><input type="checkbox" name="all_day"> All day</label>
    </p>
    <h2>Notes</h2>
    <textarea name="notes"></textarea>
    <p style="margin-top:1rem">{submit}</p>
</div>
</form>"#,
        sections = sections,
        submit = submit,
    )
}

pub fn kit_body(kit: &KitInfo) -> String {
    let sections: String = kit
        .sections
        .iter()
        .map(|section| {
            let rows: String = section
                .items
                .iter()
                .map(|item| {
                    format!(
                        "<tr><td>{}</td><td>{}</td></tr>",
                        html_escape(&item.name),
                        html_escape(&item.quantity)
                    )
                })
                .collect();
            format!(
                r#"<div class="card"><h3>{}</h3><table><tr><th>Item</th><th>Qty</th></tr>{}</table></div>"#,
                html_escape(&section.name),
                rows
            )
        })
        .collect();
    format!(
        r#"<h2>{}</h2><p class="muted">{} items</p>{}<p><a href="/">Back to catalog</a></p>"#,
        html_escape(&kit.name),
        kit.item_total(),
        sections
    )
}

pub fn kit_missing_body(name: &str, reason: &str) -> String {
    format!(
        r#"<div class="card"><h2>{}</h2><p class="muted">{}</p><p><a href="/">Back to catalog</a></p></div>"#,
        html_escape(name),
        html_escape(reason)
    )
}

// ---------------------------------------------------------------------------
// My orders

fn user_order_card(order: &Order) -> String {
    format!(
        r#"<div class="card">
    <h3><a href="/orders/{link}">{id}</a></h3>
    {summary}
    {items}
</div>"#,
        link = urlencoding::encode(&order.order_id),
        id = html_escape(&order.order_id),
        summary = order_summary(order),
        items = items_list(order),
    )
}

pub fn my_orders_body(state: &MyOrdersState, now: &DateTime<Utc>) -> String {
    let detail = state
        .detail
        .as_ref()
        .map(|d| user_detail(d, state.user.as_ref().map(|u| u.discord_id.as_str()), now))
        .unwrap_or_default();

    if state.is_empty() {
        return format!(
            r#"{}<div class="card"><p>You have no orders yet.</p><p class="muted"><a href="/">Browse the catalog</a> to place your first request.</p></div>"#,
            detail
        );
    }

    let active: String = state.active_orders().map(user_order_card).collect();
    let completed: String = state.completed_orders().map(user_order_card).collect();
    let empty = r#"<p class="muted">None</p>"#;

    format!(
        r#"{detail}
<h2>Active Orders</h2><div class="grid">{active}</div>
<h2>Completed Orders</h2><div class="grid">{completed}</div>"#,
        detail = detail,
        active = if active.is_empty() { empty } else { active.as_str() },
        completed = if completed.is_empty() { empty } else { completed.as_str() },
    )
}

fn user_detail(detail: &DetailPanel, viewer_id: Option<&str>, now: &DateTime<Utc>) -> String {
    let order = &detail.order;
    format!(
        r#"<div class="card">
    <p style="float:right"><a href="/orders">Close</a></p>
    <h2>Order {id}</h2>
    {summary}
    <h3>Items</h3>{items}
    <h3>Availability</h3><p>{availability}</p>
    <h3>Notes</h3><p>{notes}</p>
    {tracking}
    <h3>Messages</h3>
    {thread}
    {composer}
</div>"#,
        id = html_escape(&order.order_id),
        summary = order_summary(order),
        items = items_list(order),
        availability = html_lines(&format_availability(&order.availability, &Utc)),
        notes = if order.notes.trim().is_empty() {
            "-".to_string()
        } else {
            html_lines(&order.notes)
        },
        tracking = tracking_list(order, now),
        thread = thread_view(
            &detail.messages,
            detail.thread_loading,
            detail.thread_error.as_deref(),
            viewer_id
        ),
        composer = composer_form(
            &format!("/orders/{}/message", urlencoding::encode(&order.order_id)),
            &detail.composer()
        ),
    )
}

// ---------------------------------------------------------------------------
// Staff console

fn staff_order_card(order: &Order, open: bool) -> String {
    let id = urlencoding::encode(&order.order_id);
    let action = if open {
        format!(
            r#"<form method="post" action="/staff/claim/{}"><button class="btn" type="submit">Claim</button></form>"#,
            id
        )
    } else {
        format!(
            r#"<form method="post" action="/staff/release/{}"><button class="btn btn-secondary" type="submit">Release</button></form>"#,
            id
        )
    };
    format!(
        r#"<div class="card">
    <h3><a href="/staff?order={link}">{order_id}</a></h3>
    {summary}
    {items}
    <p class="muted">Availability: {availability}</p>
    {action}
</div>"#,
        link = id,
        order_id = html_escape(&order.order_id),
        summary = order_summary(order),
        items = items_list(order),
        availability = html_lines(&format_availability(&order.availability, &Utc)),
        action = action,
    )
}

fn staff_prompts(state: &StaffConsoleState) -> String {
    let mut out = String::new();
    if let Some(prompt) = &state.name_prompt {
        out.push_str(&format!(
            r#"<div class="card dialog">
    <h3>Claim {order_id}</h3>
    <form method="post" action="/staff/name">
        <label>Enter your Discord username: <input type="text" name="name" autofocus></label>
        <button class="btn" type="submit">Claim</button>
        <button class="btn btn-secondary" type="submit" name="cancel" value="1">Cancel</button>
    </form>
</div>"#,
            order_id = html_escape(&prompt.order_id),
        ));
    }
    if let Some(order_id) = &state.confirm_release {
        out.push_str(&format!(
            r#"<div class="card dialog">
    <h3>Are you sure you want to release order {id}?</h3>
    <p class="muted">This will make it available for others to claim.</p>
    <form method="post" action="/staff/release/{link}">
        <input type="hidden" name="confirm" value="yes">
        <button class="btn btn-danger" type="submit">Release</button>
        <a class="btn btn-secondary" href="/staff?dismiss=1">Cancel</a>
    </form>
</div>"#,
            id = html_escape(order_id),
            link = urlencoding::encode(order_id),
        ));
    }
    out
}

fn staff_detail(detail: &StaffDetail, now: &DateTime<Utc>) -> String {
    let order = &detail.order;
    let id = urlencoding::encode(&order.order_id);

    let options: String = OrderStatus::SELECTABLE
        .iter()
        .map(|status| {
            let selected = if *status == order.status { " selected" } else { "" };
            format!(
                r#"<option value="{}"{}>{}</option>"#,
                status.as_str(),
                selected,
                status.display_name()
            )
        })
        .collect();

    let assignment = match order.assigned_logistician() {
        None if !order.is_terminal() => format!(
            r#"<form method="post" action="/staff/claim/{}"><input type="hidden" name="from_panel" value="1"><button class="btn" type="submit">Claim</button></form>"#,
            id
        ),
        Some(_) if !order.is_terminal() => format!(
            r#"<form method="post" action="/staff/release/{}"><button class="btn btn-secondary" type="submit">Release</button></form>"#,
            id
        ),
        _ => String::new(),
    };

    format!(
        r#"<div class="card">
    <p style="float:right"><a href="/staff">Close</a></p>
    <h2>Order {order_id}</h2>
    {summary}
    {assignment}
    <form method="post" action="/staff/status/{link}" style="margin-top:1rem">
        <label>Status <select name="status">{options}</select></label>
        <button class="btn" type="submit">Update Status</button>
    </form>
    <h3>Items</h3>{items}
    <h3>Availability</h3><p>{availability}</p>
    <h3>Notes</h3><p>{notes}</p>
    {tracking}
    <h3>Discord Thread</h3>
    {thread}
    {composer}
</div>"#,
        order_id = html_escape(&order.order_id),
        summary = order_summary(order),
        assignment = assignment,
        link = id,
        options = options,
        items = items_list(order),
        availability = html_lines(&format_availability(&order.availability, &Utc)),
        notes = if order.notes.trim().is_empty() {
            "-".to_string()
        } else {
            html_lines(&order.notes)
        },
        tracking = tracking_list(order, now),
        thread = thread_view(
            &detail.messages,
            detail.thread_loading,
            detail.thread_error.as_deref(),
            None
        ),
        composer = composer_form(&format!("/staff/message/{}", id), &detail.composer()),
    )
}

fn archive_query(state: &StaffConsoleState, page: usize) -> String {
    format!(
        "/staff?view=archived&order_id={}&requester={}&logistician={}&size={}&page={}",
        urlencoding::encode(&state.filter.order_id),
        urlencoding::encode(&state.filter.requester),
        urlencoding::encode(&state.filter.logistician),
        state.page_size,
        page
    )
}

fn archive_view(state: &StaffConsoleState, page: &ArchivePage<'_>) -> String {
    let sizes: String = PAGE_SIZES
        .iter()
        .map(|size| {
            let selected = if *size == state.page_size { " selected" } else { "" };
            format!(r#"<option value="{0}"{1}>{0}</option>"#, size, selected)
        })
        .collect();

    let rows: String = page
        .orders
        .iter()
        .map(|order| {
            format!(
                r#"<tr><td><a href="/staff?order={}">{}</a></td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>"#,
                urlencoding::encode(&order.order_id),
                html_escape(&order.order_id),
                html_escape(&order.requester),
                html_escape(order.assigned_logistician().unwrap_or("-")),
                status_badge(&order.status),
                html_escape(&format_order_date(&order.date, &Utc)),
            )
        })
        .collect();

    let buttons: String = page
        .window
        .clone()
        .map(|n| {
            if n == page.page {
                format!(r#"<span class="current">{}</span>"#, n)
            } else {
                format!(r#"<a href="{}">{}</a>"#, html_escape(&archive_query(state, n)), n)
            }
        })
        .collect();

    let prev = if page.has_prev {
        r#"<a href="/staff?view=archived&amp;move=prev">Prev</a>"#.to_string()
    } else {
        r#"<span class="muted">Prev</span>"#.to_string()
    };
    let next = if page.has_next {
        r#"<a href="/staff?view=archived&amp;move=next">Next</a>"#.to_string()
    } else {
        r#"<span class="muted">Next</span>"#.to_string()
    };

    format!(
        r#"<div class="card">
    <h3>Search Archived Orders</h3>
    <form method="get" action="/staff">
        <input type="hidden" name="view" value="archived">
        <input type="text" name="order_id" placeholder="Search by Order ID..." value="{order_id}">
        <input type="text" name="requester" placeholder="Search by Requester..." value="{requester}">
        <input type="text" name="logistician" placeholder="Search by Logistician..." value="{logistician}">
        <select name="size">{sizes}</select>
        <button class="btn" type="submit">Search</button>
    </form>
</div>
<p class="muted">Showing {shown} of {total} archived orders</p>
<table>
    <tr><th>Order</th><th>Requester</th><th>Logistician</th><th>Status</th><th>Date</th></tr>
    {rows}
</table>
<div class="pager">{prev}{buttons}{next}<span class="muted">Page {page} of {pages}</span></div>"#,
        order_id = html_escape(&state.filter.order_id),
        requester = html_escape(&state.filter.requester),
        logistician = html_escape(&state.filter.logistician),
        sizes = sizes,
        shown = page.orders.len(),
        total = page.total,
        rows = rows,
        prev = prev,
        buttons = buttons,
        next = next,
        page = page.page,
        pages = page.total_pages,
    )
}

pub fn staff_body(state: &StaffConsoleState, now: &DateTime<Utc>) -> String {
    let (active_class, archived_class) = match state.view {
        ConsoleView::Active => ("current", ""),
        ConsoleView::Archived => ("", "current"),
    };

    let tabs = format!(
        r#"<div class="tabs">
    <a class="{}" href="/staff?view=active">Active ({})</a>
    <a class="{}" href="/staff?view=archived">Completed ({})</a>
    <a href="/staff?refresh=1">Refresh</a>
    <span class="muted">Signed in as {}</span>
</div>"#,
        active_class,
        state.active_total(),
        archived_class,
        state.archived_total(),
        html_escape(state.logistician_name.as_deref().unwrap_or("(name not set)")),
    );

    let detail = state
        .detail
        .as_ref()
        .map(|d| staff_detail(d, now))
        .unwrap_or_default();

    let content = match state.view {
        ConsoleView::Active if state.active_total() == 0 => {
            r#"<div class="card"><p class="muted">No active orders.</p></div>"#.to_string()
        }
        ConsoleView::Active => {
            let open: String = state.open_orders().map(|o| staff_order_card(o, true)).collect();
            let active: String = state.active_orders().map(|o| staff_order_card(o, false)).collect();
            let mut out = String::new();
            if !open.is_empty() {
                out.push_str(&format!(
                    r#"<h2>OPEN ORDERS</h2><p class="muted">Orders awaiting assignment ({})</p><div class="grid">{}</div>"#,
                    state.open_orders().count(),
                    open
                ));
            }
            if !active.is_empty() {
                out.push_str(&format!(
                    r#"<h2>ACTIVE ORDERS</h2><p class="muted">Orders currently being worked on ({})</p><div class="grid">{}</div>"#,
                    state.active_orders().count(),
                    active
                ));
            }
            out
        }
        ConsoleView::Archived if state.archived_total() == 0 => {
            r#"<div class="card"><p class="muted">No completed orders.</p></div>"#.to_string()
        }
        ConsoleView::Archived => archive_view(state, &state.archive_page()),
    };

    format!("{}{}{}{}", tabs, staff_prompts(state), detail, content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::views::staff::StaffEvent;

    fn order(id: &str, status: &str) -> Order {
        Order {
            order_id: id.to_string(),
            requester: "Alice".to_string(),
            items: r#"[{"name":"P4-AR","quantity":2}]"#.to_string(),
            status: OrderStatus::parse(status),
            ..Default::default()
        }
    }

    #[test]
    fn test_layout_escapes_toast_and_hides_staff_link() {
        let html = layout(
            "Catalog",
            &AuthState::default(),
            "http://bot/auth/discord",
            Some(&Toast::error("<oops>")),
            "",
        );
        assert!(html.contains("&lt;oops&gt;"));
        assert!(!html.contains("/staff\""));
        assert!(html.contains("Login with Discord"));
    }

    #[test]
    fn test_items_render_structured_quantities() {
        assert!(items_list(&order("MRS-1", "Received")).contains("2x P4-AR"));
    }

    #[test]
    fn test_staff_body_disables_terminal_composer() {
        let mut state = StaffConsoleState::new(Some("Kestrel".to_string()));
        state.update(StaffEvent::Load);
        state.update(StaffEvent::OrdersLoaded(vec![order("MRS-1", "Completed")]));
        state.update(StaffEvent::OpenDetail("MRS-1".to_string()));
        let html = staff_body(&state, &Utc::now());
        assert!(html.contains("Messaging is disabled"));
        assert!(html.contains("<textarea name=\"message\""));
        assert!(html.contains(" disabled>Send</button>"));
    }
}
