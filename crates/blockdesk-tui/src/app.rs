//! Application state management for the blocklist console.
//!
//! This module contains the core `App` struct that manages all UI state,
//! the shared session, and background request coordination.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use blockdesk_core::api::{ApiClient, ApiError};
use blockdesk_core::auth::{Identity, SessionManager, SessionStore};
use blockdesk_core::config::{Config, PASSWORD_ENV, USERNAME_ENV};
use blockdesk_core::models::{
    parse_indicator_lines, ApiKey, ApiLogEntry, AuditEntry, BlockOutcome, BlocklistEntry,
    IndicatorType, UnblockOutcome,
};
use blockdesk_core::routes::{self, Access, Route};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Maximum length for username input (the backend's user model limit).
const MAX_USERNAME_LENGTH: usize = 150;

/// Maximum length for password input.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Maximum length for a block/unblock reason (the backend's field limit).
const MAX_REASON_LENGTH: usize = 255;

/// Maximum length for an API key name.
const MAX_KEY_NAME_LENGTH: usize = 100;

/// Number of items to scroll on page up/down.
pub const PAGE_SCROLL_SIZE: usize = 10;

pub const MSG_NO_INDICATORS: &str = "Please enter at least one indicator";
pub const MSG_NO_REASON: &str = "Please enter a reason for this action";
pub const MSG_NO_KEY_NAME: &str = "Please enter a name for the API key";
const MSG_SESSION_ENDED: &str = "Session expired. Please log in again.";
const MSG_ADMIN_ONLY: &str = "That view requires an administrator account";
const MSG_RETRY_HINT: &str = " Press u to try again.";

// ============================================================================
// UI State Types
// ============================================================================

/// Main navigation tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Submit,
    Blocklist,
    AuditLog,
    ApiKeys,
    ApiLogs,
}

impl Tab {
    pub const ALL: [Tab; 5] = [
        Tab::Submit,
        Tab::Blocklist,
        Tab::AuditLog,
        Tab::ApiKeys,
        Tab::ApiLogs,
    ];

    pub fn title(&self) -> &'static str {
        self.route().title()
    }

    pub fn route(&self) -> Route {
        match self {
            Tab::Submit => Route::Submit,
            Tab::Blocklist => Route::Blocklist,
            Tab::AuditLog => Route::AuditLog,
            Tab::ApiKeys => Route::ApiKeys,
            Tab::ApiLogs => Route::ApiLogs,
        }
    }

    /// Tab showing `route`; the login route has no tab and maps home.
    pub fn from_route(route: Route) -> Self {
        match route {
            Route::Login | Route::Submit => Tab::Submit,
            Route::Blocklist => Tab::Blocklist,
            Route::AuditLog => Tab::AuditLog,
            Route::ApiKeys => Tab::ApiKeys,
            Route::ApiLogs => Tab::ApiLogs,
        }
    }
}

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    Searching,
    /// Typing into the block/unblock form.
    Editing,
    /// A single-line prompt (unblock reason, new key name) is open.
    Prompting,
    Confirming,
    ShowingHelp,
    LoggingIn,
    ConfirmingQuit,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoginFocus {
    Username,
    Password,
    Button,
}

/// Block/unblock form focus state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Type,
    Indicators,
    Reason,
    Block,
    Unblock,
}

impl FormField {
    pub fn next(&self) -> Self {
        match self {
            FormField::Type => FormField::Indicators,
            FormField::Indicators => FormField::Reason,
            FormField::Reason => FormField::Block,
            FormField::Block => FormField::Unblock,
            FormField::Unblock => FormField::Type,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            FormField::Type => FormField::Unblock,
            FormField::Indicators => FormField::Type,
            FormField::Reason => FormField::Indicators,
            FormField::Block => FormField::Reason,
            FormField::Unblock => FormField::Block,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormAction {
    Block,
    Unblock,
}

/// The block/unblock form on the home tab.
#[derive(Debug, Clone)]
pub struct SubmitForm {
    pub indicator_type: IndicatorType,
    pub indicators: String,
    pub reason: String,
    pub focus: FormField,
}

impl Default for SubmitForm {
    fn default() -> Self {
        Self {
            indicator_type: IndicatorType::Ip,
            indicators: String::new(),
            reason: String::new(),
            focus: FormField::Indicators,
        }
    }
}

impl SubmitForm {
    /// Indicators (one per non-blank line) and the trimmed reason, or the
    /// message to show the user.
    pub fn validate(&self) -> Result<(Vec<String>, String), &'static str> {
        let indicators = parse_indicator_lines(&self.indicators);
        if indicators.is_empty() {
            return Err(MSG_NO_INDICATORS);
        }
        let reason = self.reason.trim();
        if reason.is_empty() {
            return Err(MSG_NO_REASON);
        }
        Ok((indicators, reason.to_string()))
    }

    /// Clear what was typed; the selected type stays.
    pub fn clear(&mut self) {
        self.indicators.clear();
        self.reason.clear();
        self.focus = FormField::Indicators;
    }
}

/// What the last form submission produced.
#[derive(Debug, Clone)]
pub enum FormOutcome {
    Blocked(BlockOutcome),
    Unblocked(UnblockOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptKind {
    UnblockReason {
        kind: IndicatorType,
        indicator: String,
    },
    NewKeyName,
}

#[derive(Debug, Clone)]
pub struct Prompt {
    pub kind: PromptKind,
    pub input: String,
    /// Only used by `NewKeyName`.
    pub read_only: bool,
    pub error: Option<String>,
}

impl Prompt {
    fn new(kind: PromptKind) -> Self {
        Self {
            kind,
            input: String::new(),
            read_only: true,
            error: None,
        }
    }

    pub fn title(&self) -> String {
        match &self.kind {
            PromptKind::UnblockReason { indicator, .. } => format!("Unblock {indicator}"),
            PromptKind::NewKeyName => "New API key".to_string(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self.kind {
            PromptKind::UnblockReason { .. } => "Reason",
            PromptKind::NewKeyName => "Name",
        }
    }

    fn max_len(&self) -> usize {
        match self.kind {
            PromptKind::UnblockReason { .. } => MAX_REASON_LENGTH,
            PromptKind::NewKeyName => MAX_KEY_NAME_LENGTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmAction {
    DeleteKey { id: i64, name: String },
    RegenerateKey { id: i64, name: String },
    Logout,
}

impl ConfirmAction {
    pub fn question(&self) -> String {
        match self {
            ConfirmAction::DeleteKey { name, .. } => format!("Delete API key \"{name}\"?"),
            ConfirmAction::RegenerateKey { name, .. } => {
                format!("Regenerate API key \"{name}\"? The old key stops working.")
            }
            ConfirmAction::Logout => "Log out?".to_string(),
        }
    }
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Where an unblock request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Form,
    Blocklist,
}

/// Results sent from spawned request tasks back to the draw loop.
enum RefreshResult {
    Blocklist(Vec<BlocklistEntry>),
    AuditLog(Vec<AuditEntry>),
    ApiKeys(Vec<ApiKey>),
    ApiLogs(Vec<ApiLogEntry>),
    Blocked(BlockOutcome),
    Unblocked(UnblockOutcome, Origin),
    /// A created or regenerated key; shown once.
    KeyIssued(ApiKey),
    KeyDeleted(i64),
    Failed { task: &'static str, error: ApiError },
}

/// A result tagged with the session it was requested under.
struct Tagged {
    generation: u64,
    result: RefreshResult,
}

// ============================================================================
// Main Application Struct
// ============================================================================

pub struct App {
    // Core services
    pub config: Config,
    pub session: Arc<SessionManager>,
    pub api: ApiClient,

    // UI State
    pub state: AppState,
    pub current_tab: Tab,
    pub search_query: String,
    pub identity: Option<Identity>,
    pub session_minutes: Option<i64>,

    // Login form state
    pub login_username: String,
    pub login_password: String,
    pub login_focus: LoginFocus,
    pub login_error: Option<String>,

    // Block/unblock form
    pub form: SubmitForm,
    pub form_error: Option<String>,
    pub form_outcome: Option<FormOutcome>,

    // Data
    pub blocklist: Vec<BlocklistEntry>,
    pub blocklist_filter: Option<IndicatorType>,
    pub audit_log: Vec<AuditEntry>,
    pub api_keys: Vec<ApiKey>,
    pub api_logs: Vec<ApiLogEntry>,
    /// Full value of a freshly created or regenerated key.
    pub issued_key: Option<ApiKey>,

    // Selection indices
    pub blocklist_selection: usize,
    pub audit_selection: usize,
    pub api_keys_selection: usize,
    pub api_logs_selection: usize,

    // Modal input
    pub prompt: Option<Prompt>,
    pub pending_confirm: Option<ConfirmAction>,

    // Background tasks
    refresh_rx: mpsc::Receiver<Tagged>,
    refresh_tx: mpsc::Sender<Tagged>,
    generation: u64,
    pub in_flight: usize,
    last_api_log_fetch: Option<Instant>,

    pub status_message: Option<String>,
}

impl App {
    /// Create the application from on-disk config and the environment.
    pub fn new() -> Result<Self> {
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };

        let api_url = config.api_url();
        debug!(%api_url, "Backend configured");

        let mut session = SessionManager::new(api_url)?;
        match config.cache_dir() {
            Ok(dir) => session = session.with_store(SessionStore::new(&dir)),
            Err(e) => warn!(error = %e, "No cache directory, session will not be persisted"),
        }

        let mut app = Self::with_session(config, Arc::new(session));
        if let Ok(username) = std::env::var(USERNAME_ENV) {
            app.login_username = username;
        }
        app.login_password = std::env::var(PASSWORD_ENV).unwrap_or_default();
        Ok(app)
    }

    /// Create the application around an existing session.
    pub fn with_session(config: Config, session: Arc<SessionManager>) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let api = ApiClient::from_session(session.clone());
        let login_username = config.last_username.clone().unwrap_or_default();

        Self {
            config,
            session,
            api,

            state: AppState::Normal,
            current_tab: Tab::Submit,
            search_query: String::new(),
            identity: None,
            session_minutes: None,

            login_username,
            login_password: String::new(),
            login_focus: LoginFocus::Username,
            login_error: None,

            form: SubmitForm::default(),
            form_error: None,
            form_outcome: None,

            blocklist: Vec::new(),
            blocklist_filter: None,
            audit_log: Vec::new(),
            api_keys: Vec::new(),
            api_logs: Vec::new(),
            issued_key: None,

            blocklist_selection: 0,
            audit_selection: 0,
            api_keys_selection: 0,
            api_logs_selection: 0,

            prompt: None,
            pending_confirm: None,

            refresh_rx: rx,
            refresh_tx: tx,
            generation: 0,
            in_flight: 0,
            last_api_log_fetch: None,

            status_message: None,
        }
    }

    // =========================================================================
    // Session
    // =========================================================================

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn is_privileged(&self) -> bool {
        self.identity.as_ref().map(|i| i.is_privileged).unwrap_or(false)
    }

    /// Pick up a persisted session, if any.
    pub async fn restore_session(&mut self) -> bool {
        let restored = self.session.restore().await;
        self.sync_session().await;
        restored
    }

    /// Mirror the session into render state. A session that disappeared
    /// since the last call sends the user back to the login overlay.
    pub async fn sync_session(&mut self) {
        let identity = self.session.identity().await;
        self.session_minutes = self.session.minutes_until_expiry().await;

        if identity.is_none() && self.identity.is_some() && self.state != AppState::LoggingIn {
            self.identity = None;
            self.session_ended(MSG_SESSION_ENDED);
            return;
        }
        self.identity = identity;
    }

    /// Drop everything tied to the old session and show the login overlay.
    fn session_ended(&mut self, message: &str) {
        info!("Session ended, returning to login");
        self.clear_session_data();
        self.start_login();
        self.login_error = Some(message.to_string());
    }

    fn clear_session_data(&mut self) {
        self.generation += 1;
        self.in_flight = 0;
        self.identity = None;
        self.session_minutes = None;
        self.blocklist.clear();
        self.audit_log.clear();
        self.api_keys.clear();
        self.api_logs.clear();
        self.issued_key = None;
        self.form_outcome = None;
        self.form_error = None;
        self.prompt = None;
        self.pending_confirm = None;
        self.search_query.clear();
        self.last_api_log_fetch = None;
        self.current_tab = Tab::Submit;
    }

    /// Start the login process (show login overlay)
    pub fn start_login(&mut self) {
        self.state = AppState::LoggingIn;
        self.login_focus = if self.login_username.is_empty() {
            LoginFocus::Username
        } else {
            LoginFocus::Password
        };
        self.login_error = None;
    }

    /// Attempt login with the credentials from the login form
    pub async fn attempt_login(&mut self) -> Result<()> {
        let username = self.login_username.trim().to_string();
        let password = self.login_password.clone();

        if username.is_empty() || password.is_empty() {
            self.login_error = Some("Username and password required".to_string());
            return Err(anyhow::anyhow!("Username and password required"));
        }

        self.login_error = None;

        match self.session.login(&username, &password).await {
            Ok(identity) => {
                self.config.last_username = Some(username);
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }

                self.login_password.clear();
                self.identity = Some(identity);
                self.session_minutes = self.session.minutes_until_expiry().await;
                self.state = AppState::Normal;
                self.current_tab = Tab::Submit;
                self.refresh_all();
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Login failed");
                let user_message = match &e {
                    ApiError::InvalidCredentials => "Invalid username or password".to_string(),
                    ApiError::NetworkUnavailable(_) => {
                        "Unable to connect to server. Check the API URL.".to_string()
                    }
                    other => format!("Login failed: {}", other),
                };
                self.login_error = Some(user_message);
                Err(e.into())
            }
        }
    }

    pub async fn logout(&mut self) {
        self.session.logout().await;
        self.clear_session_data();
        self.start_login();
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Tabs the current identity may open, in display order.
    pub fn visible_tabs(&self) -> Vec<Tab> {
        Tab::ALL
            .iter()
            .copied()
            .filter(|t| routes::guard(t.route(), self.identity.as_ref()) == Access::Allow)
            .collect()
    }

    /// Switch to `tab` if the route guard allows it.
    pub fn navigate(&mut self, tab: Tab) {
        match routes::guard(tab.route(), self.identity.as_ref()) {
            Access::Allow => {
                if self.current_tab != tab {
                    self.current_tab = tab;
                    self.search_query.clear();
                    self.load_tab_if_empty();
                }
            }
            Access::RedirectToHome => {
                self.current_tab = Tab::from_route(Route::HOME);
                self.status_message = Some(MSG_ADMIN_ONLY.to_string());
            }
            Access::RedirectToLogin => self.start_login(),
        }
    }

    pub fn next_tab(&mut self) {
        self.step_tab(1);
    }

    pub fn prev_tab(&mut self) {
        self.step_tab(-1);
    }

    fn step_tab(&mut self, delta: isize) {
        let tabs = self.visible_tabs();
        if tabs.is_empty() {
            return;
        }
        let pos = tabs
            .iter()
            .position(|t| *t == self.current_tab)
            .unwrap_or(0) as isize;
        let len = tabs.len() as isize;
        let next = tabs[((pos + delta).rem_euclid(len)) as usize];
        self.navigate(next);
    }

    /// Cycle the blocklist type filter (all, ip, domain, url) and refetch.
    pub fn cycle_blocklist_filter(&mut self) {
        self.blocklist_filter = match self.blocklist_filter {
            None => Some(IndicatorType::Ip),
            Some(IndicatorType::Url) => None,
            Some(kind) => Some(kind.next()),
        };
        self.blocklist_selection = 0;
        self.fetch_blocklist();
    }

    // =========================================================================
    // Background requests
    // =========================================================================

    /// Helper to send results, logging any channel errors
    async fn send_result(tx: &mpsc::Sender<Tagged>, tagged: Tagged) {
        if let Err(e) = tx.send(tagged).await {
            error!(error = %e, "Failed to send request result - channel closed");
        }
    }

    /// Run `request` on a spawned task and deliver its result to the draw loop.
    fn spawn_request<T, Fut, F>(&mut self, task: &'static str, request: Fut, wrap: F)
    where
        T: Send + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
        F: FnOnce(T) -> RefreshResult + Send + 'static,
    {
        let tx = self.refresh_tx.clone();
        let generation = self.generation;
        self.in_flight += 1;
        debug!(task, "Spawning request");

        tokio::spawn(async move {
            let result = match request.await {
                Ok(value) => wrap(value),
                Err(error) => {
                    error!(task, error = %error, "Request failed");
                    RefreshResult::Failed { task, error }
                }
            };
            Self::send_result(&tx, Tagged { generation, result }).await;
        });
    }

    pub fn fetch_blocklist(&mut self) {
        let api = self.api.clone();
        let filter = self.blocklist_filter;
        self.spawn_request(
            "blocklist",
            async move { api.fetch_blocklist(filter).await },
            RefreshResult::Blocklist,
        );
    }

    pub fn fetch_audit_log(&mut self) {
        let api = self.api.clone();
        self.spawn_request(
            "audit log",
            async move { api.fetch_audit_log(None).await },
            RefreshResult::AuditLog,
        );
    }

    pub fn fetch_api_keys(&mut self) {
        let api = self.api.clone();
        self.spawn_request(
            "api keys",
            async move { api.list_api_keys().await },
            RefreshResult::ApiKeys,
        );
    }

    pub fn fetch_api_logs(&mut self) {
        let api = self.api.clone();
        self.last_api_log_fetch = Some(Instant::now());
        self.spawn_request(
            "api logs",
            async move { api.fetch_api_logs().await },
            RefreshResult::ApiLogs,
        );
    }

    /// Refetch whatever the current tab shows.
    pub fn refresh_current_tab(&mut self) {
        match self.current_tab {
            Tab::Submit => {}
            Tab::Blocklist => self.fetch_blocklist(),
            Tab::AuditLog => self.fetch_audit_log(),
            Tab::ApiKeys => self.fetch_api_keys(),
            Tab::ApiLogs => self.fetch_api_logs(),
        }
    }

    /// Fetch every view the identity may open.
    pub fn refresh_all(&mut self) {
        self.fetch_blocklist();
        self.fetch_audit_log();
        if self.is_privileged() {
            self.fetch_api_keys();
            self.fetch_api_logs();
        }
    }

    fn load_tab_if_empty(&mut self) {
        let empty = match self.current_tab {
            Tab::Submit => false,
            Tab::Blocklist => self.blocklist.is_empty(),
            Tab::AuditLog => self.audit_log.is_empty(),
            Tab::ApiKeys => self.api_keys.is_empty(),
            Tab::ApiLogs => self.api_logs.is_empty(),
        };
        if empty {
            self.refresh_current_tab();
        }
    }

    /// Periodic work between frames: API log auto-refresh.
    pub fn tick(&mut self) {
        if self.current_tab != Tab::ApiLogs || !self.is_privileged() {
            return;
        }
        let interval = Duration::from_secs(self.config.api_log_refresh_secs.max(1));
        let due = self
            .last_api_log_fetch
            .map(|at| at.elapsed() >= interval)
            .unwrap_or(true);
        if due {
            debug!("Auto-refreshing API logs");
            self.fetch_api_logs();
        }
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Validate the form and send it as a block or unblock request.
    pub fn submit_form(&mut self, action: FormAction) {
        let (indicators, reason) = match self.form.validate() {
            Ok(parts) => parts,
            Err(message) => {
                self.form_error = Some(message.to_string());
                return;
            }
        };
        self.form_error = None;
        self.form_outcome = None;
        self.status_message = Some("Submitting...".to_string());

        let api = self.api.clone();
        let kind = self.form.indicator_type;
        match action {
            FormAction::Block => self.spawn_request(
                "block",
                async move { api.block_indicators(kind, &indicators, &reason).await },
                RefreshResult::Blocked,
            ),
            FormAction::Unblock => self.spawn_request(
                "unblock",
                async move { api.unblock_indicators(kind, &indicators, &reason).await },
                |outcome| RefreshResult::Unblocked(outcome, Origin::Form),
            ),
        }
    }

    /// Ask for a reason, then unblock the selected blocklist entry.
    pub fn start_unblock_selected(&mut self) {
        let selected = self
            .filtered_blocklist()
            .get(self.blocklist_selection)
            .map(|e| (e.indicator.clone(), e.indicator_type.parse::<IndicatorType>()));

        match selected {
            Some((indicator, Ok(kind))) => {
                self.prompt = Some(Prompt::new(PromptKind::UnblockReason { kind, indicator }));
                self.state = AppState::Prompting;
            }
            Some((indicator, Err(e))) => {
                warn!(%indicator, error = %e, "Cannot unblock entry with unknown type");
                self.status_message = Some(format!("Error: {e}"));
            }
            None => {}
        }
    }

    pub fn start_new_api_key(&mut self) {
        self.prompt = Some(Prompt::new(PromptKind::NewKeyName));
        self.state = AppState::Prompting;
    }

    pub fn cancel_prompt(&mut self) {
        self.prompt = None;
        self.state = AppState::Normal;
    }

    pub fn push_prompt_char(&mut self, c: char) {
        if let Some(prompt) = self.prompt.as_mut() {
            if can_add_text_char(prompt.input.chars().count(), prompt.max_len(), c) {
                prompt.input.push(c);
                prompt.error = None;
            }
        }
    }

    /// Validate and send the open prompt.
    pub fn submit_prompt(&mut self) {
        let Some(prompt) = self.prompt.as_mut() else {
            return;
        };
        let input = prompt.input.trim().to_string();

        match prompt.kind.clone() {
            PromptKind::UnblockReason { kind, indicator } => {
                if input.is_empty() {
                    prompt.error = Some(MSG_NO_REASON.to_string());
                    return;
                }
                let api = self.api.clone();
                self.spawn_request(
                    "unblock",
                    async move { api.unblock_indicators(kind, &[indicator], &input).await },
                    |outcome| RefreshResult::Unblocked(outcome, Origin::Blocklist),
                );
            }
            PromptKind::NewKeyName => {
                if input.is_empty() {
                    prompt.error = Some(MSG_NO_KEY_NAME.to_string());
                    return;
                }
                let read_only = prompt.read_only;
                let api = self.api.clone();
                self.spawn_request(
                    "create api key",
                    async move { api.create_api_key(&input, read_only).await },
                    RefreshResult::KeyIssued,
                );
            }
        }
        self.cancel_prompt();
    }

    pub fn selected_api_key(&self) -> Option<&ApiKey> {
        self.api_keys.get(self.api_keys_selection)
    }

    pub fn confirm(&mut self, action: ConfirmAction) {
        self.pending_confirm = Some(action);
        self.state = AppState::Confirming;
    }

    pub async fn execute_confirmed(&mut self) {
        self.state = AppState::Normal;
        let Some(action) = self.pending_confirm.take() else {
            return;
        };
        let api = self.api.clone();
        match action {
            ConfirmAction::DeleteKey { id, .. } => self.spawn_request(
                "delete api key",
                async move { api.delete_api_key(id).await.map(|_| id) },
                RefreshResult::KeyDeleted,
            ),
            ConfirmAction::RegenerateKey { id, .. } => self.spawn_request(
                "regenerate api key",
                async move { api.regenerate_api_key(id).await },
                RefreshResult::KeyIssued,
            ),
            ConfirmAction::Logout => self.logout().await,
        }
    }

    // =========================================================================
    // Result processing
    // =========================================================================

    /// Check for completed background tasks and process results
    pub fn check_background_tasks(&mut self) {
        let mut results = Vec::new();
        while let Ok(tagged) = self.refresh_rx.try_recv() {
            results.push(tagged);
        }

        for Tagged { generation, result } in results {
            if generation != self.generation {
                debug!("Dropping result from an earlier session");
                continue;
            }
            self.in_flight = self.in_flight.saturating_sub(1);
            self.process_refresh_result(result);
        }
    }

    fn process_refresh_result(&mut self, result: RefreshResult) {
        match result {
            RefreshResult::Blocklist(data) => {
                self.blocklist = data;
                self.blocklist_selection = clamp_selection(self.blocklist_selection, self.blocklist.len());
            }
            RefreshResult::AuditLog(data) => {
                self.audit_log = data;
                self.audit_selection = clamp_selection(self.audit_selection, self.audit_log.len());
            }
            RefreshResult::ApiKeys(data) => {
                self.api_keys = data;
                self.api_keys_selection = clamp_selection(self.api_keys_selection, self.api_keys.len());
            }
            RefreshResult::ApiLogs(data) => {
                self.api_logs = data;
                self.api_logs_selection = clamp_selection(self.api_logs_selection, self.api_logs.len());
            }
            RefreshResult::Blocked(outcome) => {
                info!(blocked = outcome.blocked.len(), "Block request completed");
                self.status_message = Some(outcome.message.clone());
                self.form_outcome = Some(FormOutcome::Blocked(outcome));
                self.form.clear();
                self.fetch_blocklist();
                self.fetch_audit_log();
            }
            RefreshResult::Unblocked(outcome, origin) => {
                info!(unblocked = outcome.unblocked.len(), "Unblock request completed");
                self.status_message = Some(outcome.message.clone());
                if origin == Origin::Form {
                    self.form_outcome = Some(FormOutcome::Unblocked(outcome));
                    self.form.clear();
                }
                self.fetch_blocklist();
                self.fetch_audit_log();
            }
            RefreshResult::KeyIssued(key) => {
                self.status_message = Some(format!(
                    "API key \"{}\" issued. Copy it now, it will not be shown again.",
                    key.name
                ));
                self.issued_key = Some(key);
                self.fetch_api_keys();
            }
            RefreshResult::KeyDeleted(id) => {
                self.api_keys.retain(|k| k.id != id);
                self.api_keys_selection = clamp_selection(self.api_keys_selection, self.api_keys.len());
                if self.issued_key.as_ref().map(|k| k.id) == Some(id) {
                    self.issued_key = None;
                }
                self.status_message = Some("API key deleted".to_string());
            }
            RefreshResult::Failed { task, error } => self.handle_failure(task, error),
        }
    }

    fn handle_failure(&mut self, task: &'static str, error: ApiError) {
        if error.ends_session() {
            self.session_ended(MSG_SESSION_ENDED);
            return;
        }

        let mut user_message = match &error {
            ApiError::PermissionDenied(detail) => format!("Permission denied: {detail}"),
            ApiError::RateLimited => "Server is busy.".to_string(),
            ApiError::NetworkUnavailable(_) => "Network error. Check your connection.".to_string(),
            other => format!("Error: {}", other),
        };
        if error.is_transient() {
            user_message.push_str(MSG_RETRY_HINT);
        }

        if matches!(task, "block" | "unblock") && self.current_tab == Tab::Submit {
            self.form_error = Some(user_message.clone());
        }
        self.status_message = Some(user_message);
    }

    // =========================================================================
    // Filtered views
    // =========================================================================

    pub fn filtered_blocklist(&self) -> Vec<&BlocklistEntry> {
        self.blocklist
            .iter()
            .filter(|e| e.matches_search(&self.search_query))
            .collect()
    }

    pub fn filtered_audit_log(&self) -> Vec<&AuditEntry> {
        self.audit_log
            .iter()
            .filter(|e| e.matches_search(&self.search_query))
            .collect()
    }

    pub fn filtered_api_logs(&self) -> Vec<&ApiLogEntry> {
        self.api_logs
            .iter()
            .filter(|e| e.matches_search(&self.search_query))
            .collect()
    }

    /// Number of rows in the current tab's list.
    pub fn current_list_len(&self) -> usize {
        match self.current_tab {
            Tab::Submit => 0,
            Tab::Blocklist => self.filtered_blocklist().len(),
            Tab::AuditLog => self.filtered_audit_log().len(),
            Tab::ApiKeys => self.api_keys.len(),
            Tab::ApiLogs => self.filtered_api_logs().len(),
        }
    }

    pub fn current_selection_mut(&mut self) -> Option<&mut usize> {
        match self.current_tab {
            Tab::Submit => None,
            Tab::Blocklist => Some(&mut self.blocklist_selection),
            Tab::AuditLog => Some(&mut self.audit_selection),
            Tab::ApiKeys => Some(&mut self.api_keys_selection),
            Tab::ApiLogs => Some(&mut self.api_logs_selection),
        }
    }

    /// Move the current list selection by `delta`, clamped to the list.
    pub fn move_selection(&mut self, delta: isize) {
        let max_index = self.current_list_len().saturating_sub(1);
        if let Some(selection) = self.current_selection_mut() {
            let moved = (*selection as isize + delta).clamp(0, max_index as isize);
            *selection = moved as usize;
        }
    }

    pub fn select_first(&mut self) {
        if let Some(selection) = self.current_selection_mut() {
            *selection = 0;
        }
    }

    pub fn select_last(&mut self) {
        let max_index = self.current_list_len().saturating_sub(1);
        if let Some(selection) = self.current_selection_mut() {
            *selection = max_index;
        }
    }
}

fn clamp_selection(selection: usize, len: usize) -> usize {
    selection.min(len.saturating_sub(1))
}

// ============================================================================
// Input validation helpers (exported for use in input.rs)
// ============================================================================

/// Check if a character is valid for input (no control characters)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

/// Check if a username character should be accepted
pub fn can_add_username_char(current_len: usize, c: char) -> bool {
    current_len < MAX_USERNAME_LENGTH && is_valid_input_char(c)
}

/// Check if a password character should be accepted
pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

/// Check if a character may be added to a single-line text field
pub fn can_add_text_char(current_len: usize, max_len: usize, c: char) -> bool {
    current_len < max_len && is_valid_input_char(c)
}

/// Check if a reason character should be accepted
pub fn can_add_reason_char(current_len: usize, c: char) -> bool {
    can_add_text_char(current_len, MAX_REASON_LENGTH, c)
}

// ============================================================================
// Tests
// ============================================================================
