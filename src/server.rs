//! ==============================================================================
//! server.rs - web surface for the sensor readings table
//! ==============================================================================
//!
//! routes:
//!     GET /               dashboard page (first page rendered server side)
//!     GET /api/readings   stateless query: filter, sort, direction, page, page_size
//!     GET /ws             live view session, one TableView per connection
//!     GET /health         liveness
//!
//! live session protocol (json text frames):
//!
//!     client -> server   {"type":"filter","value":"co"}
//!                        {"type":"sort","column":"readingTime"}
//!                        {"type":"page","index":2}
//!                        {"type":"pageSize","size":25}
//!     server -> client   {"type":"snapshot", ...TableSnapshot}
//!                        {"type":"error","message":"..."}
//!
//!     filter frames go through the session's debounced FilterInput; every
//!     other command is applied immediately.
//!
//! relationships:
//!     - uses: provider.rs (shared collection), view.rs, table.rs, debounce.rs
//!     - used by: main.rs
//!
//! ==============================================================================

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::TableConfig;
use crate::debounce::{FilterInput, FilterSubscription};
use crate::domain::SensorReading;
use crate::error::{DataError, ViewError};
use crate::provider::{Readings, SensorReadingsProvider};
use crate::table::{self, PageRequest, Sort, SortColumn, SortDirection};
use crate::view::{Column, PagerBinding, SortBinding, TableSnapshot, TableView};

// ==============================================================================
// shared state
// ==============================================================================

#[derive(Clone)]
pub struct AppState {
    provider: SensorReadingsProvider,
    table: TableConfig,
}

impl AppState {
    pub fn new(provider: SensorReadingsProvider, table: TableConfig) -> Self {
        Self { provider, table }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard_handler))
        .route("/api/readings", get(readings_handler))
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ==============================================================================
// errors
// ==============================================================================

#[derive(Debug)]
pub enum ApiError {
    Data(DataError),
    View(ViewError),
}

impl From<DataError> for ApiError {
    fn from(e: DataError) -> Self {
        ApiError::Data(e)
    }
}

impl From<ViewError> for ApiError {
    fn from(e: ViewError) -> Self {
        ApiError::View(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Data(e) => {
                tracing::error!(error = %e, "sensor readings unavailable");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiError::View(e) => (StatusCode::BAD_REQUEST, e.to_string()),
        };
        let body = serde_json::json!({ "status": "error", "message": message });
        (status, Json(body)).into_response()
    }
}

// ==============================================================================
// json api
// ==============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ReadingsQuery {
    #[serde(default)]
    filter: String,
    sort: Option<String>,
    direction: Option<SortDirection>,
    #[serde(default)]
    page: usize,
    page_size: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingsPage {
    rows: Vec<SensorReading>,
    total: usize,
    page_index: usize,
    page_size: usize,
    page_count: usize,
}

/// filter -> sort -> page over the cached collection, no session state
async fn readings_handler(
    State(state): State<AppState>,
    Query(q): Query<ReadingsQuery>,
) -> Result<Json<ReadingsPage>, ApiError> {
    let sort = match q.sort.as_deref() {
        None | Some("") => None,
        Some(column) => Some(Sort {
            column: column.parse::<SortColumn>()?,
            direction: q.direction.unwrap_or(SortDirection::Asc),
        }),
    };
    let request = PageRequest::new(q.page, q.page_size.unwrap_or(state.table.default_page_size))?;

    let readings = state.provider.get().await?;
    let page = table::query(&readings, &q.filter, sort, request).map(SensorReading::clone);

    Ok(Json(ReadingsPage {
        page_count: page.page_count(),
        total: page.total,
        page_index: page.index,
        page_size: page.size,
        rows: page.rows,
    }))
}

async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "dataset_loaded": state.provider.is_loaded(),
    }))
}

// ==============================================================================
// dashboard
// ==============================================================================

fn new_view(readings: Readings, table: &TableConfig) -> Result<TableView, ViewError> {
    TableView::builder(readings)
        .sort(SortBinding::default())
        .pager(PagerBinding::new(table.default_page_size)?)
        .build()
}

async fn dashboard_handler(State(state): State<AppState>) -> Response {
    let snapshot = match state.provider.get().await {
        Ok(readings) => new_view(readings, &state.table).map(|v| v.render()),
        Err(e) => {
            tracing::error!(error = %e, "dashboard cannot load sensor readings");
            return (StatusCode::INTERNAL_SERVER_ERROR, Html(error_page(&e.to_string())))
                .into_response();
        }
    };

    match snapshot {
        Ok(snapshot) => {
            Html(render_dashboard(&snapshot, state.table.filter_debounce_ms)).into_response()
        }
        Err(e) => {
            (StatusCode::INTERNAL_SERVER_ERROR, Html(error_page(&e.to_string()))).into_response()
        }
    }
}

fn error_page(message: &str) -> String {
    format!(
        r#"<!doctype html>
<html>
<head><title>error</title></head>
<body style="font-family: system-ui; padding: 2rem; background: #1a1a2e; color: #eee;">
    <h1 style="color: #ff6b6b;">sensor readings unavailable</h1>
    <p>the dataset could not be loaded:</p>
    <pre style="background: #16213e; padding: 1rem; border-radius: 8px; overflow-x: auto;">{}</pre>
</body>
</html>"#,
        html_escape(message)
    )
}

fn render_dashboard(snapshot: &TableSnapshot, debounce_ms: u64) -> String {
    let headers: String = snapshot
        .columns
        .iter()
        .map(|c| {
            if c.sortable {
                format!(r#"<th class="sortable" data-column="{}">{}</th>"#, c.key, c.header)
            } else {
                format!("<th>{}</th>", c.header)
            }
        })
        .collect();

    let rows: String = snapshot
        .rows
        .iter()
        .map(|row| {
            let cells: String = row
                .iter()
                .map(|cell| format!("<td>{}</td>", html_escape(cell)))
                .collect();
            format!("<tr>{cells}</tr>")
        })
        .collect();

    let options: String = snapshot
        .page_size_options
        .iter()
        .map(|size| {
            let selected = if *size == snapshot.page_size { " selected" } else { "" };
            format!(r#"<option value="{size}"{selected}>{size}</option>"#)
        })
        .collect();

    format!(
        r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>sensor readings</title></head>
<body>
<input class="Search" id="search" placeholder="Filter by Sensor Type or Name" autocomplete="off">
<table class="Table">
<thead><tr>{headers}</tr></thead>
<tbody id="rows">{rows}</tbody>
</table>
<div class="Pager">
  <select id="page-size">{options}</select>
  <button id="prev">&lsaquo;</button>
  <span id="range">{range}</span>
  <button id="next">&rsaquo;</button>
</div>
<script>
// debounce window is applied server side ({debounce_ms}ms)
const ws = new WebSocket((location.protocol === "https:" ? "wss://" : "ws://") + location.host + "/ws");
let state = {{ pageIndex: {page_index}, pageCount: {page_count} }};
const send = (cmd) => ws.readyState === 1 && ws.send(JSON.stringify(cmd));
const esc = (s) => s.replace(/[&<>"]/g, (c) => ({{"&":"&amp;","<":"&lt;",">":"&gt;",'"':"&quot;"}})[c]);
document.getElementById("search").addEventListener("input", (e) => send({{ type: "filter", value: e.target.value }}));
document.querySelectorAll("th.sortable").forEach((th) =>
  th.addEventListener("click", () => send({{ type: "sort", column: th.dataset.column }})));
document.getElementById("page-size").addEventListener("change", (e) => send({{ type: "pageSize", size: Number(e.target.value) }}));
document.getElementById("prev").addEventListener("click", () => state.pageIndex > 0 && send({{ type: "page", index: state.pageIndex - 1 }}));
document.getElementById("next").addEventListener("click", () => state.pageIndex + 1 < state.pageCount && send({{ type: "page", index: state.pageIndex + 1 }}));
ws.onmessage = (msg) => {{
  const m = JSON.parse(msg.data);
  if (m.type === "error") {{ console.warn(m.message); return; }}
  state = m;
  document.getElementById("rows").innerHTML = m.rows
    .map((r) => "<tr>" + r.map((c) => "<td>" + esc(c) + "</td>").join("") + "</tr>").join("");
  m.columns.forEach((c) => {{
    const th = document.querySelector(`th[data-column="${{c.key}}"]`);
    if (th) th.dataset.direction = c.direction || "";
  }});
  const first = m.total === 0 ? 0 : m.pageIndex * m.pageSize + 1;
  document.getElementById("range").textContent = `${{first}} - ${{Math.min(m.total, (m.pageIndex + 1) * m.pageSize)}} of ${{m.total}}`;
}};
</script>
</body>
</html>"#,
        range = page_range(snapshot),
        page_index = snapshot.page_index,
        page_count = snapshot.page_count,
    )
}

/// "1 - 10 of 42" pager label
fn page_range(s: &TableSnapshot) -> String {
    let first = if s.total == 0 { 0 } else { s.page_index * s.page_size + 1 };
    let last = (s.page_index * s.page_size + s.page_size).min(s.total);
    format!("{first} - {last} of {}", s.total)
}

/// escape html special characters to prevent xss
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
     .replace('<', "&lt;")
     .replace('>', "&gt;")
     .replace('"', "&quot;")
}

// ==============================================================================
// live session
// ==============================================================================

#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    Filter { value: String },
    Sort { column: String },
    Page { index: usize },
    PageSize { size: usize },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ServerMessage {
    Snapshot(TableSnapshot),
    Error { message: String },
}

/// one connected table: its view plus the debounced search input feeding it.
///
/// dropping the session drops the filter subscription, which stops the
/// debounce timer.
pub struct LiveSession {
    view: TableView,
    input: FilterInput,
    filter: FilterSubscription,
}

impl LiveSession {
    pub fn new(readings: Readings, table: &TableConfig) -> Result<Self, ViewError> {
        let view = new_view(readings, table)?;
        let input = FilterInput::new(table.debounce());
        let filter = input.subscribe();
        Ok(Self { view, input, filter })
    }

    pub fn snapshot(&self) -> TableSnapshot {
        self.view.render()
    }

    /// apply a client command. `None` means nothing to redraw yet.
    pub fn handle(&mut self, cmd: Command) -> Result<Option<TableSnapshot>, ViewError> {
        match cmd {
            Command::Filter { value } => {
                self.input.set(value);
                return Ok(None);
            }
            Command::Sort { column } => {
                self.view.click_header(column.parse::<Column>()?)?;
            }
            Command::Page { index } => self.view.set_page(index),
            Command::PageSize { size } => self.view.set_page_size(size)?,
        }
        Ok(Some(self.view.render()))
    }

    /// end of the session: release the debounced input before the view goes
    pub fn close(self) {
        tracing::debug!(
            filter = self.view.filter(),
            page = self.view.page_index(),
            "live session closed"
        );
        self.filter.unsubscribe();
    }

    /// wait for the next settled filter value
    pub async fn next_filter(&mut self) -> Option<String> {
        self.filter.next().await
    }

    pub fn apply_filter(&mut self, value: &str) -> Option<TableSnapshot> {
        self.view.set_filter(value).then(|| self.view.render())
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| live_session(socket, state))
}

async fn send(socket: &mut WebSocket, msg: &ServerMessage) -> bool {
    let text = match serde_json::to_string(msg) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode live session message");
            return false;
        }
    };
    socket.send(Message::Text(text)).await.is_ok()
}

async fn live_session(mut socket: WebSocket, state: AppState) {
    let session = match state.provider.get().await {
        Ok(readings) => LiveSession::new(readings, &state.table).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    let mut session = match session {
        Ok(session) => session,
        Err(message) => {
            tracing::error!(%message, "live session could not start");
            send(&mut socket, &ServerMessage::Error { message }).await;
            return;
        }
    };

    tracing::debug!(subscribers = session.input.subscriber_count(), "live session opened");
    if !send(&mut socket, &ServerMessage::Snapshot(session.snapshot())).await {
        return;
    }

    loop {
        let reply = tokio::select! {
            msg = socket.recv() => match msg {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<Command>(&text) {
                        Ok(cmd) => match session.handle(cmd) {
                            Ok(snapshot) => snapshot.map(ServerMessage::Snapshot),
                            Err(e) => Some(ServerMessage::Error { message: e.to_string() }),
                        },
                        Err(e) => Some(ServerMessage::Error { message: format!("bad command: {e}") }),
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => None,
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "live session socket error");
                    break;
                }
            },
            Some(value) = session.next_filter() => {
                session.apply_filter(&value).map(ServerMessage::Snapshot)
            }
        };

        if let Some(reply) = reply {
            if !send(&mut socket, &reply).await {
                break;
            }
        }
    }

    session.close();
}
