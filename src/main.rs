use axum::{
    extract::{Form, Json, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use chrono::Local;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use log::{LevelFilter, Log, Metadata, Record};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    env,
    fs::OpenOptions,
    io::Write,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    path::PathBuf,
    sync::{Arc, Mutex},
};
use subtle::ConstantTimeEq;
use tokio::signal;
use tower_cookies::{Cookie, CookieManagerLayer, Cookies};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    set_header::SetResponseHeaderLayer,
};

use authorgate_server::commands::{settings_from_form, validate_destination, SettingsForm};
use authorgate_server::models::{
    Author, Page, RedirectInstruction, RedirectSettings, RequestClassification,
};
use authorgate_server::services::{
    decide, filter_author_link, OptionStore, SettingsManager, SiteContent,
};

// ============================================================================
// Constants
// ============================================================================

const AUTH_COOKIE_NAME: &str = "authorgate_session";
const COOKIE_MAX_AGE_SECS: i64 = 7 * 24 * 60 * 60; // 7 days
const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 300;
const DEFAULT_PORT: u16 = 8010;

// ============================================================================
// Application State
// ============================================================================

#[derive(Clone)]
struct AppState {
    settings_manager: Arc<SettingsManager>,
    site_content: Arc<SiteContent>,
    auth_token: Option<String>,
    rate_limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

#[derive(Serialize)]
struct InvokeResponse {
    ok: bool,
    data: Option<Value>,
    error: Option<String>,
}

// ============================================================================
// Logging
// ============================================================================

struct ServerLogger {
    file: Mutex<std::fs::File>,
    level: LevelFilter,
}

impl ServerLogger {
    fn new(log_dir: &std::path::Path, level: LevelFilter) -> Result<Self, Box<dyn std::error::Error>> {
        let log_path = log_dir.join("authorgate-server.log");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;
        Ok(Self {
            file: Mutex::new(file),
            level,
        })
    }
}

impl Log for ServerLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let timestamp = Local::now();
        let date = timestamp.format("%Y-%m-%d");
        let time = timestamp.format("%H:%M:%S");
        let target = record.target();
        let level = record.level();
        let message = format!("{}", record.args());
        let line = format!("[{date}][{time}][{target}][{level}] {message}");

        if let Ok(mut file) = self.file.try_lock() {
            let _ = writeln!(file, "{line}");
        }

        eprintln!("{line}");
    }

    fn flush(&self) {}
}

fn init_logger(log_dir: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
    let level = env::var("AUTHORGATE_LOG_LEVEL")
        .ok()
        .and_then(|value| value.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);

    let logger = ServerLogger::new(log_dir, level)?;
    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(level);
    Ok(())
}

// ============================================================================
// Security Utilities
// ============================================================================

/// Constant-time token comparison to prevent timing attacks
fn verify_token(expected: &str, provided: &str) -> bool {
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

/// Extract bearer token from Authorization header
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Sanitize error messages to prevent information disclosure
fn sanitize_error(error: &str) -> String {
    let lower = error.to_lowercase();

    if lower.contains("failed to read") || lower.contains("no such file") || lower.contains("not found") {
        return "Resource not found".to_string();
    }
    if lower.contains("parse") || lower.contains("invalid") {
        return "Invalid request format".to_string();
    }
    if lower.contains("permission") || lower.contains("access") || lower.contains("denied") {
        return "Access denied".to_string();
    }

    log::debug!("Sanitized error: {error}");
    "Operation failed".to_string()
}

fn parse_host(host: &str) -> IpAddr {
    host.parse()
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

// ============================================================================
// CORS Configuration
// ============================================================================

fn build_cors_layer() -> CorsLayer {
    let cors_origins = env::var("AUTHORGATE_CORS_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:*,http://127.0.0.1:*".to_string());

    let allowed_origins: Vec<String> = cors_origins
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            let origin_str = match origin.to_str() {
                Ok(s) => s,
                Err(_) => return false,
            };

            allowed_origins.iter().any(|allowed| {
                if allowed.ends_with(":*") {
                    // Wildcard port matching
                    let prefix = allowed.trim_end_matches(":*");
                    origin_str.starts_with(prefix) && origin_str[prefix.len()..].starts_with(':')
                } else {
                    origin_str == allowed
                }
            })
        }))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::COOKIE, header::AUTHORIZATION])
        .allow_credentials(true)
}

// ============================================================================
// Authentication Endpoints
// ============================================================================

#[derive(Deserialize)]
struct LoginRequest {
    token: String,
}

/// Set a session cookie
fn set_session_cookie(cookies: &Cookies) {
    let session_id = uuid::Uuid::new_v4().to_string();
    let cookie = Cookie::build((AUTH_COOKIE_NAME, session_id))
        .http_only(true)
        .secure(false) // Set to true when using HTTPS
        .same_site(tower_cookies::cookie::SameSite::Strict)
        .path("/")
        .max_age(tower_cookies::cookie::time::Duration::seconds(COOKIE_MAX_AGE_SECS))
        .build();
    cookies.add(cookie);
}

/// POST /auth/login - Validate token and set HttpOnly cookie
async fn auth_login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<LoginRequest>,
) -> impl IntoResponse {
    let expected_token = state.auth_token.as_deref();

    match expected_token {
        None => {
            // No token configured - open access, set session cookie anyway
            set_session_cookie(&cookies);
            Json(json!({ "ok": true }))
        }
        Some(expected) if verify_token(expected, &payload.token) => {
            set_session_cookie(&cookies);
            Json(json!({ "ok": true }))
        }
        _ => {
            // Invalid token - add a small delay to prevent brute force
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            Json(json!({ "ok": false, "error": "Invalid token" }))
        }
    }
}

/// POST /auth/logout - Clear session cookie
async fn auth_logout(cookies: Cookies) -> impl IntoResponse {
    let cookie = Cookie::build((AUTH_COOKIE_NAME, ""))
        .path("/")
        .max_age(tower_cookies::cookie::time::Duration::ZERO)
        .build();
    cookies.remove(cookie);
    Json(json!({ "ok": true }))
}

/// GET /auth/check - Check if session is valid
async fn auth_check(
    State(state): State<AppState>,
    cookies: Cookies,
) -> impl IntoResponse {
    // If no token configured, always authenticated
    if state.auth_token.is_none() {
        return Json(json!({ "authenticated": true, "required": false }));
    }

    let is_authenticated = cookies.get(AUTH_COOKIE_NAME).is_some();
    Json(json!({ "authenticated": is_authenticated, "required": true }))
}

// ============================================================================
// Middleware
// ============================================================================

/// Authentication middleware - check for valid session cookie
async fn auth_middleware(
    State(state): State<AppState>,
    cookies: Cookies,
    headers: HeaderMap,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    // If no token configured, allow all requests
    if state.auth_token.is_none() {
        return next.run(request).await;
    }

    // Check for valid session cookie
    if cookies.get(AUTH_COOKIE_NAME).is_some() {
        return next.run(request).await;
    }

    // Also accept Bearer token for programmatic access
    if let Some(token) = bearer_token(&headers) {
        if let Some(expected) = state.auth_token.as_deref() {
            if verify_token(expected, token) {
                return next.run(request).await;
            }
        }
    }

    // No valid session
    let response = InvokeResponse {
        ok: false,
        data: None,
        error: Some("Authentication required".to_string()),
    };
    (StatusCode::UNAUTHORIZED, Json(response)).into_response()
}

/// Rate limiting middleware
async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    match state.rate_limiter.check() {
        Ok(_) => next.run(request).await,
        Err(_) => {
            let response = InvokeResponse {
                ok: false,
                data: None,
                error: Some("Rate limit exceeded. Please try again later.".to_string()),
            };
            (StatusCode::TOO_MANY_REQUESTS, Json(response)).into_response()
        }
    }
}

// ============================================================================
// Health Handlers
// ============================================================================

async fn health() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

/// Readiness check - verifies the stores are functional
async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let settings_ok = state.settings_manager.load().is_ok();
    let site_ok = state.site_content.load().is_ok();
    let ready = settings_ok && site_ok;

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "ready": ready,
            "checks": { "settings": settings_ok, "site": site_ok },
        })),
    )
}

// ============================================================================
// Redirect Decision Glue
// ============================================================================

/// Load the settings for this request, falling back to defaults rather
/// than failing a visitor-facing page.
fn current_settings(state: &AppState) -> RedirectSettings {
    state.settings_manager.load().unwrap_or_else(|e| {
        log::warn!("Failed to load settings, using defaults: {e}");
        RedirectSettings::default()
    })
}

/// Convert a decision into the response that terminates the request
fn redirect_response(instruction: &RedirectInstruction) -> Response {
    let status = StatusCode::from_u16(instruction.status.code())
        .unwrap_or(StatusCode::MOVED_PERMANENTLY);
    let location = HeaderValue::from_str(&instruction.location)
        .unwrap_or_else(|_| HeaderValue::from_static("/"));

    let mut response = status.into_response();
    response.headers_mut().insert(header::LOCATION, location);
    response
}

/// Run the redirect decision for a classified request. Some(response)
/// means the request is finished and nothing may be rendered after it.
fn apply_decision(
    state: &AppState,
    classification: &RequestClassification,
    settings: &RedirectSettings,
) -> Option<Response> {
    let instruction = decide(classification, settings, state.site_content.as_ref())?;
    log::info!(
        "Redirecting to {} with status {}",
        instruction.location,
        instruction.status.as_str()
    );
    Some(redirect_response(&instruction))
}

/// Whether the request's query string carries an author marker
fn author_query_present(query: &HashMap<String, String>) -> bool {
    query.contains_key("author") || query.contains_key("author_name")
}

// ============================================================================
// Site Rendering
// ============================================================================

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn render_layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head><meta charset=\"utf-8\"><title>{}</title></head>\n\
         <body>\n<header><a href=\"/\">Home</a></header>\n{}\n</body>\n</html>\n",
        escape_html(title),
        body
    ))
}

/// Byline markup for a page. The author link URL passes through the
/// author-link filter; an empty filtered value renders as plain text.
fn render_byline(state: &AppState, settings: &RedirectSettings, author: &Author) -> String {
    let link = filter_author_link(&state.site_content.author_permalink(&author.slug), settings);
    if link.is_empty() {
        format!("<p class=\"byline\">By {}</p>", escape_html(&author.display_name))
    } else {
        format!(
            "<p class=\"byline\">By <a href=\"{}\" rel=\"author\">{}</a></p>",
            escape_html(&link),
            escape_html(&author.display_name)
        )
    }
}

fn render_page_body(state: &AppState, settings: &RedirectSettings, page: &Page) -> String {
    let byline = page
        .author
        .as_deref()
        .and_then(|author_id| state.site_content.find_author(author_id))
        .map(|author| render_byline(state, settings, &author))
        .unwrap_or_default();

    format!(
        "<article>\n<h1>{}</h1>\n{}<p>{}</p>\n</article>",
        escape_html(&page.title),
        byline,
        escape_html(&page.body)
    )
}

fn not_found_page() -> Response {
    let html = render_layout("Not Found", "<h1>Page not found</h1>");
    (StatusCode::NOT_FOUND, html).into_response()
}

// ============================================================================
// Site Handlers
// ============================================================================

/// GET / - Site home, lists all pages
async fn site_home(State(state): State<AppState>) -> Response {
    let settings = current_settings(&state);
    if let Some(response) = apply_decision(&state, &RequestClassification::page(), &settings) {
        return response;
    }

    let site = match state.site_content.load() {
        Ok(site) => site,
        Err(e) => {
            log::error!("Failed to load site content: {e}");
            return not_found_page();
        }
    };

    let items: String = site
        .pages
        .iter()
        .map(|page| {
            format!(
                "<li><a href=\"/p/{}/\">{}</a></li>\n",
                urlencoding::encode(&page.slug),
                escape_html(&page.title)
            )
        })
        .collect();

    render_layout("Home", &format!("<h1>Pages</h1>\n<ul>\n{items}</ul>")).into_response()
}

/// GET /p/:slug - Render a single page
async fn site_page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let settings = current_settings(&state);

    let page = match state.site_content.find_page_by_slug(&slug) {
        Some(page) => page,
        None => {
            let classification = RequestClassification::not_found(author_query_present(&query));
            if let Some(response) = apply_decision(&state, &classification, &settings) {
                return response;
            }
            return not_found_page();
        }
    };

    if let Some(response) = apply_decision(&state, &RequestClassification::page(), &settings) {
        return response;
    }

    render_layout(&page.title, &render_page_body(&state, &settings, &page)).into_response()
}

/// GET /author/:slug - Author archive, or a 404 that still names an author
async fn site_author_archive(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Response {
    let settings = current_settings(&state);

    let author = match state.site_content.find_author_by_slug(&slug) {
        Some(author) => author,
        None => {
            // Unknown author slug: a 404 with the author marker still set
            let classification = RequestClassification::not_found(true);
            if let Some(response) = apply_decision(&state, &classification, &settings) {
                return response;
            }
            return not_found_page();
        }
    };

    let classification = RequestClassification::author_archive(author.id.clone());
    if let Some(response) = apply_decision(&state, &classification, &settings) {
        return response;
    }

    let pages = state.site_content.pages_by_author(&author.id);
    let items: String = pages
        .iter()
        .map(|page| {
            format!(
                "<li><a href=\"/p/{}/\">{}</a></li>\n",
                urlencoding::encode(&page.slug),
                escape_html(&page.title)
            )
        })
        .collect();

    let body = format!(
        "<h1>Posts by {}</h1>\n<ul>\n{items}</ul>",
        escape_html(&author.display_name)
    );
    render_layout(&author.display_name, &body).into_response()
}

/// Fallback - anything the router did not match is a 404
async fn site_fallback(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let settings = current_settings(&state);
    let classification = RequestClassification::not_found(author_query_present(&query));
    if let Some(response) = apply_decision(&state, &classification, &settings) {
        return response;
    }

    not_found_page()
}

// ============================================================================
// Admin Settings Handlers
// ============================================================================

fn checked(value: bool) -> &'static str {
    if value {
        " checked"
    } else {
        ""
    }
}

fn selected(value: bool) -> &'static str {
    if value {
        " selected"
    } else {
        ""
    }
}

fn render_settings_form(state: &AppState, settings: &RedirectSettings, saved: bool) -> Html<String> {
    let notice = if saved {
        "<p class=\"notice\">Settings saved.</p>\n"
    } else {
        ""
    };

    let mut destination_options = String::from("<option value=\"\">Site home</option>\n");
    for page in state.site_content.page_summaries() {
        destination_options.push_str(&format!(
            "<option value=\"{}\"{}>{}</option>\n",
            escape_html(&page.id),
            selected(page.id == settings.destination),
            escape_html(&page.title)
        ));
    }

    let body = format!(
        "<h1>Author Pages</h1>\n\
         <p>Settings to disable the author pages.</p>\n\
         {notice}\
         <form method=\"POST\" action=\"/admin/settings\">\n\
         <label><input type=\"checkbox\" name=\"activate\" value=\"1\"{activate}> Disable author pages</label><br>\n\
         <label>HTTP status\n\
         <select name=\"status\">\n\
         <option value=\"301\"{s301}>301 (Moved Permanently)</option>\n\
         <option value=\"307\"{s307}>307 (Temporary Redirect)</option>\n\
         </select></label><br>\n\
         <label>Destination page\n\
         <select name=\"destination\">\n{destinations}</select></label><br>\n\
         <label><input type=\"checkbox\" name=\"authorlink\" value=\"1\"{authorlink}> Disable author link</label><br>\n\
         <label><input type=\"checkbox\" name=\"redirect_non_authors\" value=\"1\"{non_authors}> Redirect non-existing author pages</label><br>\n\
         <label><input type=\"checkbox\" name=\"adminonly\" value=\"1\"{adminonly}> Disable admin author pages only</label><br>\n\
         <button type=\"submit\">Save Changes</button>\n\
         </form>",
        notice = notice,
        activate = checked(settings.activate),
        s301 = selected(settings.status.as_str() == "301"),
        s307 = selected(settings.status.as_str() == "307"),
        destinations = destination_options,
        authorlink = checked(settings.author_link_disabled),
        non_authors = checked(settings.redirect_non_authors),
        adminonly = checked(settings.admin_only),
    );

    render_layout("Author Pages Settings", &body)
}

/// GET /admin/settings - The settings form
async fn admin_settings_page(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let settings = match state.settings_manager.load() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Failed to load settings for admin page: {e}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Settings unavailable").into_response();
        }
    };

    render_settings_form(&state, &settings, query.contains_key("saved")).into_response()
}

/// POST /admin/settings - Save the settings form
async fn admin_settings_save(
    State(state): State<AppState>,
    Form(form): Form<SettingsForm>,
) -> Response {
    let settings = match settings_from_form(&form, &state.site_content) {
        Ok(settings) => settings,
        Err(e) => {
            log::warn!("Rejected settings form: {e}");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    if let Err(e) = state.settings_manager.save(&settings) {
        log::error!("Failed to save settings: {e}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            sanitize_error(&e),
        )
            .into_response();
    }

    log::info!(
        "Settings saved: activate={}, destination='{}', status={}",
        settings.activate,
        settings.destination,
        settings.status.as_str()
    );
    Redirect::to("/admin/settings?saved=1").into_response()
}

// ============================================================================
// Command Handler
// ============================================================================

async fn invoke(
    Path(command): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    let result = invoke_command(&state, &command, payload).await;

    match result {
        Ok(data) => {
            let response = InvokeResponse {
                ok: true,
                data: Some(data),
                error: None,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(error) => {
            let response = InvokeResponse {
                ok: false,
                data: None,
                error: Some(sanitize_error(&error)),
            };
            (StatusCode::BAD_REQUEST, Json(response)).into_response()
        }
    }
}

async fn invoke_command(state: &AppState, command: &str, payload: Value) -> Result<Value, String> {
    match command {
        "get_settings" => Ok(json!(state.settings_manager.load()?)),
        "save_settings" => {
            let settings: RedirectSettings = get_arg(&payload, "settings")?;
            validate_destination(&settings.destination, &state.site_content)
                .map_err(|e| e.to_string())?;
            state.settings_manager.save(&settings)?;
            Ok(Value::Null)
        }
        "list_pages" => Ok(json!(state.site_content.page_summaries())),
        "uninstall" => {
            state.settings_manager.uninstall()?;
            log::info!("Uninstalled: author pages options removed");
            Ok(Value::Null)
        }
        _ => Err(format!("Unknown command: {command}")),
    }
}

fn get_arg<T: DeserializeOwned>(payload: &Value, key: &str) -> Result<T, String> {
    let obj = payload
        .as_object()
        .ok_or_else(|| "Invalid payload".to_string())?;
    let value = obj
        .get(key)
        .ok_or_else(|| format!("Missing argument: {key}"))?;
    serde_json::from_value(value.clone()).map_err(|e| format!("Invalid {key}: {e}"))
}

// ============================================================================
// Server Setup
// ============================================================================

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::info!("Shutdown signal received, server shutting down");
}

fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = env::var("AUTHORGATE_DATA_DIR") {
        return PathBuf::from(dir);
    }

    dirs_next::data_local_dir()
        .map(|dir| dir.join("authorgate"))
        .unwrap_or_else(|| PathBuf::from("data"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from environment
    let data_dir = resolve_data_dir();
    let log_dir = env::var("AUTHORGATE_LOG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| data_dir.join("logs"));
    let host = env::var("AUTHORGATE_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = env::var("AUTHORGATE_PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let auth_token = env::var("AUTHORGATE_ADMIN_TOKEN").ok().and_then(|value| {
        let trimmed = value.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    });

    std::fs::create_dir_all(&data_dir)?;
    std::fs::create_dir_all(&log_dir)?;
    init_logger(&log_dir)?;

    let option_store = Arc::new(OptionStore::new(data_dir.clone()));
    option_store.start_watcher();

    let settings_manager = Arc::new(SettingsManager::new(Arc::clone(&option_store)));
    let site_content = Arc::new(SiteContent::new(data_dir.clone()));

    // Seed defaults on first run and report the current state
    match settings_manager.load() {
        Ok(settings) => log::info!(
            "Author page redirect {}",
            if settings.activate { "active" } else { "inactive" }
        ),
        Err(e) => log::warn!("Failed to load settings at startup: {e}"),
    }
    match site_content.load() {
        Ok(site) => log::info!(
            "Site content loaded: {} pages, {} authors",
            site.pages.len(),
            site.authors.len()
        ),
        Err(e) => log::warn!("Failed to load site content at startup: {e}"),
    }

    // Initialize rate limiter
    let rate_limit = env::var("AUTHORGATE_RATE_LIMIT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_RATE_LIMIT_PER_MINUTE);
    let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(
        NonZeroU32::new(rate_limit).unwrap_or(NonZeroU32::new(100).expect("nonzero")),
    )));

    let state = AppState {
        settings_manager,
        site_content,
        auth_token,
        rate_limiter,
    };

    // Build CORS layer
    let cors = build_cors_layer();

    // Build CSP header
    let csp_value = HeaderValue::from_static(
        "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; \
         img-src 'self' data:; connect-src 'self'",
    );

    // Admin routes (require authentication)
    let admin_routes = Router::new()
        .route("/admin/settings", get(admin_settings_page).post(admin_settings_save))
        .route("/api/invoke/:command", post(invoke))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/auth/login", post(auth_login))
        .route("/auth/logout", post(auth_logout))
        .route("/auth/check", get(auth_check));

    // The site itself; permalinks carry trailing slashes
    let site_routes = Router::new()
        .route("/", get(site_home))
        .route("/p/:slug", get(site_page))
        .route("/p/:slug/", get(site_page))
        .route("/author/:slug", get(site_author_archive))
        .route("/author/:slug/", get(site_author_archive))
        .fallback(get(site_fallback));

    let app = Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .merge(site_routes)
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(CookieManagerLayer::new())
        .layer(cors)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CONTENT_SECURITY_POLICY,
            csp_value,
        ));

    let address = SocketAddr::new(parse_host(&host), port);
    log::info!("Authorgate backend listening on http://{address}");
    if state.auth_token.is_some() {
        log::info!("  Admin authentication: enabled");
    } else {
        log::info!("  Admin authentication: disabled (no token configured)");
    }

    let listener = tokio::net::TcpListener::bind(address).await?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
