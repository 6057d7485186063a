use crate::application::bootstrap::bootstrap_workspace;
use crate::application::calendar_sync::{
    CalendarServiceStatus, ConnectionTestResult, GoogleCalendarSync, TodoCalendarSync,
    DEFAULT_CALENDAR_NAME,
};
use crate::application::oauth::{load_oauth_config_from_env, CalendarAuthorizer, OAuthManager};
use crate::domain::due_instant::{is_overdue, parse_due_date, parse_wall_clock, resolve_due_instant};
use crate::domain::filter::{display_status_or_stored, TodoFilter};
use crate::domain::models::{
    DisplayStatus, FieldError, Reminder, ReminderType, ReminderUnit, TimeSlot, TodoRecord,
    TodoStatus,
};
use crate::domain::reminder::{
    default_reminders, describe_reminder, describe_reminders, normalize_reminder, renormalize, ReminderInput,
};
use crate::infrastructure::config::{load_app_config_from_env, AppConfig};
use crate::infrastructure::credential_store::KeyringCredentialStore;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::google_calendar_client::{GoogleCalendarSummary, ReqwestGoogleCalendarClient};
use crate::infrastructure::oauth_client::ReqwestOAuthClient;
use crate::infrastructure::storage::{SqliteTodoRepository, TodoRepository};
use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct AppState {
    config: AppConfig,
    repository: Arc<dyn TodoRepository>,
    calendar_sync: Option<Arc<dyn TodoCalendarSync>>,
    calendar_authorizer: Option<Arc<dyn CalendarAuthorizer>>,
    calendar_fallback_status: CalendarServiceStatus,
    logs_dir: PathBuf,
    log_guard: Mutex<()>,
    now_provider: NowProvider,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let config = load_app_config_from_env(&bootstrap.config_dir)?;
        let repository: Arc<dyn TodoRepository> =
            Arc::new(SqliteTodoRepository::new(&bootstrap.database_path));

        let mut state = Self::with_repository(config, repository, bootstrap.logs_dir);
        state.connect_google_calendar();
        Ok(state)
    }

    /// State without calendar sync; the caller wires collaborators explicitly.
    pub fn with_repository(
        config: AppConfig,
        repository: Arc<dyn TodoRepository>,
        logs_dir: PathBuf,
    ) -> Self {
        Self {
            config,
            repository,
            calendar_sync: None,
            calendar_authorizer: None,
            calendar_fallback_status: CalendarServiceStatus::unavailable(
                "Google Calendar 服務未設定",
                "請設定 GOOGLE_CLIENT_ID 與 GOOGLE_CLIENT_SECRET 環境變數",
            ),
            logs_dir,
            log_guard: Mutex::new(()),
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_calendar_sync(mut self, calendar_sync: Arc<dyn TodoCalendarSync>) -> Self {
        self.calendar_sync = Some(calendar_sync);
        self
    }

    pub fn with_calendar_authorizer(mut self, authorizer: Arc<dyn CalendarAuthorizer>) -> Self {
        self.calendar_authorizer = Some(authorizer);
        self
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    fn connect_google_calendar(&mut self) {
        if !self.config.calendar_sync.enabled {
            self.calendar_fallback_status = CalendarServiceStatus::unavailable(
                "Google Calendar 同步已停用",
                "在 config/app.json 將 calendarSync.enabled 設為 true",
            );
            tracing::warn!("google calendar sync disabled by config");
            return;
        }

        let oauth_config = match load_oauth_config_from_env() {
            Ok(oauth_config) => oauth_config,
            Err(error) => {
                tracing::warn!(%error, "google calendar sync unavailable; local persistence only");
                self.calendar_fallback_status = CalendarServiceStatus::unavailable(
                    format!("Google OAuth 設定不完整: {error}"),
                    "請設定 GOOGLE_CLIENT_ID 與 GOOGLE_CLIENT_SECRET 環境變數",
                );
                return;
            }
        };

        let manager = Arc::new(OAuthManager::new(
            oauth_config,
            Arc::new(KeyringCredentialStore::default()),
            Arc::new(ReqwestOAuthClient::new()),
        ));
        let sync = GoogleCalendarSync::new(
            Arc::new(ReqwestGoogleCalendarClient::new()),
            Arc::clone(&manager),
            self.config.calendar_sync.calendar_id.clone(),
            self.config.timezone,
            self.config.event_duration_minutes,
        );
        tracing::info!(
            calendar_id = %self.config.calendar_sync.calendar_id,
            "google calendar sync configured"
        );
        self.calendar_sync = Some(Arc::new(sync));
        self.calendar_authorizer = Some(manager);
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.now_provider)()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        tracing::info!(command, "{message}");
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        tracing::error!(command, "{message}");
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderPayload {
    #[serde(rename = "type", default)]
    pub reminder_type: Option<String>,
    #[serde(default)]
    pub value: Option<serde_json::Number>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub minutes: Option<serde_json::Number>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub time_slot: Option<String>,
    #[serde(default)]
    pub custom_time: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub reminders: Option<Vec<ReminderPayload>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DueCheckRequest {
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub time_slot: Option<String>,
    #[serde(default)]
    pub custom_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DueCheckResponse {
    pub due_date_time: String,
    pub is_past: bool,
}

/// A stored record plus the views derived from it at one reference time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoView {
    #[serde(flatten)]
    pub record: TodoRecord,
    pub due_date_time: Option<String>,
    pub is_overdue: bool,
    pub display_status: DisplayStatus,
    pub reminder_descriptions: Vec<String>,
    pub reminder_summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteTodoResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarListResponse {
    pub success: bool,
    pub message: String,
    pub calendars: Vec<GoogleCalendarSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCalendarResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationUrlResponse {
    pub authorization_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorizeResponse {
    pub status: String,
}

#[derive(Debug, Clone)]
struct ValidatedTodo {
    title: String,
    description: String,
    due_date: String,
    time_slot: TimeSlot,
    custom_time: Option<String>,
    location: String,
    status: Option<TodoStatus>,
    reminders: Option<Vec<Reminder>>,
}

fn validate_todo_input(input: &TodoInput) -> Result<ValidatedTodo, InfraError> {
    let mut errors = Vec::new();

    let title = trimmed(input.title.as_deref());
    if title.is_empty() {
        errors.push(FieldError::new("title", "標題不能為空"));
    }
    let description = trimmed(input.description.as_deref());
    if description.is_empty() {
        errors.push(FieldError::new("description", "說明不能為空"));
    }

    let due_date = trimmed(input.due_date.as_deref());
    if parse_due_date(&due_date).is_none() {
        errors.push(FieldError::new("dueDate", "日期格式必須是 YYYY-MM-DD"));
    }

    let time_slot = input.time_slot.as_deref().and_then(TimeSlot::parse);
    if time_slot.is_none() {
        errors.push(FieldError::new("timeSlot", "時間段選擇不正確"));
    }

    let custom_time = if time_slot == Some(TimeSlot::Custom) {
        validate_custom_time_input(input.custom_time.as_deref(), &mut errors)
    } else {
        None
    };

    let status = match input.status.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
        None => None,
        Some(raw) => {
            let parsed = TodoStatus::parse(raw);
            if parsed.is_none() {
                errors.push(FieldError::new(
                    "status",
                    "狀態必須是 pending、in-progress、completed 或 cancelled",
                ));
            }
            parsed
        }
    };

    let reminders = input
        .reminders
        .as_deref()
        .map(|payloads| normalize_reminder_payloads(payloads, &mut errors));

    if !errors.is_empty() {
        return Err(InfraError::Validation(errors));
    }

    let Some(time_slot) = time_slot else {
        return Err(InfraError::validation("timeSlot", "時間段選擇不正確"));
    };
    Ok(ValidatedTodo {
        title,
        description,
        due_date,
        time_slot,
        custom_time,
        location: trimmed(input.location.as_deref()),
        status,
        reminders,
    })
}

fn trimmed(value: Option<&str>) -> String {
    value.map(str::trim).unwrap_or_default().to_string()
}

fn validate_custom_time_input(raw: Option<&str>, errors: &mut Vec<FieldError>) -> Option<String> {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        errors.push(FieldError::new("customTime", "當選擇自訂時間時，必須提供具體時間"));
        return None;
    };
    let Some(time) = parse_wall_clock(raw) else {
        errors.push(FieldError::new("customTime", "自訂時間格式必須是 HH:MM"));
        return None;
    };
    if time.minute() % 10 != 0 {
        errors.push(FieldError::new("customTime", "分鐘數必須是10的倍數"));
        return None;
    }
    Some(time.format("%H:%M").to_string())
}

fn normalize_reminder_payloads(
    payloads: &[ReminderPayload],
    errors: &mut Vec<FieldError>,
) -> Vec<Reminder> {
    if payloads.is_empty() {
        errors.push(FieldError::new("reminders", "至少需要一個提醒設定"));
        return Vec::new();
    }

    let mut reminders = Vec::with_capacity(payloads.len());
    for (index, payload) in payloads.iter().enumerate() {
        let field = |name: &str| format!("reminders[{index}].{name}");

        let reminder_type = match payload.reminder_type.as_deref().map(str::trim) {
            None | Some("") => None,
            Some("popup") => Some(ReminderType::Popup),
            Some("email") => Some(ReminderType::Email),
            Some(_) => {
                errors.push(FieldError::new(field("type"), "提醒類型必須是 popup 或 email"));
                continue;
            }
        };
        let unit = match payload.unit.as_deref().map(str::trim) {
            None | Some("") => None,
            Some("minutes") => Some(ReminderUnit::Minutes),
            Some("hours") => Some(ReminderUnit::Hours),
            Some("days") => Some(ReminderUnit::Days),
            Some(_) => {
                errors.push(FieldError::new(field("unit"), "提醒單位必須是 minutes、hours 或 days"));
                continue;
            }
        };
        let value = match payload.value.as_ref().map(whole_number) {
            None => None,
            Some(Ok(value)) if value >= 1 => Some(value),
            Some(Ok(_)) => {
                errors.push(FieldError::new(field("value"), "提醒數值必須是正數"));
                continue;
            }
            Some(Err(())) => {
                errors.push(FieldError::new(field("value"), "提醒數值必須是正整數"));
                continue;
            }
        };
        let minutes = match payload.minutes.as_ref().filter(|_| value.is_none()).map(whole_number) {
            None => None,
            Some(Ok(minutes)) if minutes >= 0 => Some(minutes),
            Some(Ok(_)) => {
                errors.push(FieldError::new(field("minutes"), "提醒分鐘數必須是非負數"));
                continue;
            }
            Some(Err(())) => {
                errors.push(FieldError::new(field("minutes"), "提醒分鐘數必須是整數"));
                continue;
            }
        };

        let normalized = ReminderInput::from_fields(reminder_type, value, unit, minutes)
            .and_then(normalize_reminder);
        match normalized {
            Ok(reminder) => reminders.push(reminder),
            Err(error) => errors.push(FieldError::new(format!("reminders[{index}]"), format!("提醒設定無效: {error}"))),
        }
    }
    reminders
}

/// Integral JSON numbers, including floats such as `2.0`; fractions are rejected.
fn whole_number(number: &serde_json::Number) -> Result<i64, ()> {
    if let Some(value) = number.as_i64() {
        return Ok(value);
    }
    match number.as_f64() {
        Some(value) if value.fract() == 0.0 && value.abs() <= i64::MAX as f64 => Ok(value as i64),
        _ => Err(()),
    }
}

fn build_view(state: &AppState, record: TodoRecord, now: DateTime<Utc>) -> TodoView {
    let tz = state.config.timezone;
    let due_instant = record.due_instant(tz).ok();
    let is_overdue = record.is_overdue(tz, now).unwrap_or(false);
    let display_status = display_status_or_stored(&record, tz, now);
    let reminder_descriptions = record
        .reminders
        .iter()
        .map(|reminder| describe_reminder(reminder, state.config.locale))
        .collect();
    let reminder_summary = describe_reminders(&record.reminders, state.config.locale);
    TodoView {
        due_date_time: due_instant.map(|instant| instant.to_rfc3339_opts(SecondsFormat::Secs, false)),
        is_overdue,
        display_status,
        reminder_descriptions,
        reminder_summary,
        record,
    }
}

fn normalize_todo_id(todo_id: &str) -> Result<&str, InfraError> {
    let todo_id = todo_id.trim();
    if todo_id.is_empty() {
        return Err(InfraError::validation("id", "todo id must not be empty"));
    }
    Ok(todo_id)
}

fn load_existing(state: &AppState, todo_id: &str) -> Result<TodoRecord, InfraError> {
    state
        .repository
        .get(todo_id)?
        .ok_or_else(|| InfraError::NotFound(format!("todo {todo_id}")))
}

pub fn list_todos_impl(
    state: &AppState,
    status: Option<String>,
    keyword: Option<String>,
) -> Result<Vec<TodoView>, InfraError> {
    let filter = TodoFilter::parse(status.as_deref(), keyword.as_deref())
        .map_err(|message| InfraError::validation("status", message))?;
    let now = state.now();
    let tz = state.config.timezone;

    let records = state.repository.list_recent()?;
    let views = filter
        .apply(&records, tz, now)
        .into_iter()
        .cloned()
        .map(|record| build_view(state, record, now))
        .collect::<Vec<_>>();
    Ok(views)
}

pub fn get_todo_impl(state: &AppState, todo_id: String) -> Result<TodoView, InfraError> {
    let todo_id = normalize_todo_id(&todo_id)?;
    let record = load_existing(state, todo_id)?;
    Ok(build_view(state, record, state.now()))
}

pub async fn create_todo_impl(state: &AppState, input: TodoInput) -> Result<TodoView, InfraError> {
    let validated = validate_todo_input(&input)?;
    let now = state.now();

    let mut todo = TodoRecord {
        id: next_id("todo"),
        title: validated.title,
        description: validated.description,
        due_date: validated.due_date,
        time_slot: validated.time_slot,
        custom_time: validated.custom_time,
        location: validated.location,
        status: validated.status.unwrap_or_default(),
        reminders: validated.reminders.unwrap_or_else(default_reminders),
        google_event_id: None,
        created_at: now,
        updated_at: now,
    };
    todo.validate()
        .map_err(|message| InfraError::validation("todo", message))?;

    state.repository.insert(&todo)?;
    state.log_info("create_todo", &format!("created todo_id={}", todo.id));

    if let Some(calendar_sync) = state.calendar_sync.as_ref() {
        match calendar_sync.create_event(&todo).await {
            Ok(event_id) => {
                todo.google_event_id = Some(event_id.clone());
                match state.repository.replace(&todo) {
                    Ok(_) => state.log_info(
                        "create_todo",
                        &format!("synced todo_id={} event_id={event_id}", todo.id),
                    ),
                    Err(error) => state.log_error(
                        "create_todo",
                        &format!("failed to persist event_id={event_id} for todo_id={}: {error}", todo.id),
                    ),
                }
            }
            Err(error) => state.log_error(
                "create_todo",
                &format!("calendar sync failed for todo_id={}: {error}", todo.id),
            ),
        }
    }

    Ok(build_view(state, todo, now))
}

pub async fn update_todo_impl(
    state: &AppState,
    todo_id: String,
    input: TodoInput,
) -> Result<TodoView, InfraError> {
    let todo_id = normalize_todo_id(&todo_id)?;
    let validated = validate_todo_input(&input)?;
    let existing = load_existing(state, todo_id)?;
    let now = state.now();

    let reminders = match validated.reminders {
        Some(reminders) => reminders,
        None => existing
            .reminders
            .iter()
            .map(renormalize)
            .collect::<Result<Vec<_>, _>>()?,
    };

    let mut todo = TodoRecord {
        id: existing.id.clone(),
        title: validated.title,
        description: validated.description,
        due_date: validated.due_date,
        time_slot: validated.time_slot,
        custom_time: validated.custom_time,
        location: validated.location,
        status: validated.status.unwrap_or(existing.status),
        reminders,
        google_event_id: existing.google_event_id.clone(),
        created_at: existing.created_at,
        updated_at: now,
    };
    todo.validate()
        .map_err(|message| InfraError::validation("todo", message))?;

    if !state.repository.replace(&todo)? {
        return Err(InfraError::NotFound(format!("todo {todo_id}")));
    }
    state.log_info("update_todo", &format!("updated todo_id={todo_id}"));

    if let Some(calendar_sync) = state.calendar_sync.as_ref() {
        match todo.google_event_id.clone() {
            Some(event_id) => {
                if let Err(error) = calendar_sync.update_event(&event_id, &todo).await {
                    state.log_error(
                        "update_todo",
                        &format!("calendar update failed for todo_id={todo_id} event_id={event_id}: {error}"),
                    );
                }
            }
            None => match calendar_sync.create_event(&todo).await {
                Ok(event_id) => {
                    todo.google_event_id = Some(event_id.clone());
                    if let Err(error) = state.repository.replace(&todo) {
                        state.log_error(
                            "update_todo",
                            &format!("failed to persist event_id={event_id} for todo_id={todo_id}: {error}"),
                        );
                    }
                }
                Err(error) => state.log_error(
                    "update_todo",
                    &format!("calendar sync failed for todo_id={todo_id}: {error}"),
                ),
            },
        }
    }

    Ok(build_view(state, todo, now))
}

pub async fn delete_todo_impl(state: &AppState, todo_id: String) -> Result<DeleteTodoResponse, InfraError> {
    let todo_id = normalize_todo_id(&todo_id)?;
    let existing = load_existing(state, todo_id)?;

    if let (Some(calendar_sync), Some(event_id)) =
        (state.calendar_sync.as_ref(), existing.google_event_id.as_deref())
    {
        if let Err(error) = calendar_sync.delete_event(event_id).await {
            state.log_error(
                "delete_todo",
                &format!("calendar delete failed for todo_id={todo_id} event_id={event_id}: {error}"),
            );
        }
    }

    if !state.repository.delete(todo_id)? {
        return Err(InfraError::NotFound(format!("todo {todo_id}")));
    }
    state.log_info("delete_todo", &format!("deleted todo_id={todo_id}"));
    Ok(DeleteTodoResponse {
        message: "Todo deleted successfully".to_string(),
    })
}

pub fn check_due_impl(state: &AppState, request: DueCheckRequest) -> Result<DueCheckResponse, InfraError> {
    let due_date = trimmed(request.due_date.as_deref());
    let time_slot = TimeSlot::parse_lenient(request.time_slot.as_deref());
    let instant = resolve_due_instant(
        &due_date,
        time_slot,
        request.custom_time.as_deref(),
        state.config.timezone,
    )
    .map_err(|error| InfraError::validation("dueDate", error.to_string()))?;

    Ok(DueCheckResponse {
        due_date_time: instant.to_rfc3339_opts(SecondsFormat::Secs, false),
        is_past: is_overdue(&instant, TodoStatus::Pending, state.now()),
    })
}

pub async fn calendar_status_impl(state: &AppState) -> CalendarServiceStatus {
    match state.calendar_sync.as_ref() {
        Some(calendar_sync) => calendar_sync.status().await,
        None => state.calendar_fallback_status.clone(),
    }
}

pub async fn test_calendar_connection_impl(state: &AppState) -> ConnectionTestResult {
    let Some(calendar_sync) = state.calendar_sync.as_ref() else {
        return ConnectionTestResult {
            success: false,
            message: state.calendar_fallback_status.reason.clone(),
            calendar_name: None,
            calendar_id: state.config.calendar_sync.calendar_id.clone(),
            error_code: None,
        };
    };
    let result = calendar_sync.test_connection().await;
    if result.success {
        state.log_info("test_calendar_connection", &result.message);
    } else {
        state.log_error("test_calendar_connection", &result.message);
    }
    result
}

pub async fn list_calendars_impl(state: &AppState) -> CalendarListResponse {
    let Some(calendar_sync) = state.calendar_sync.as_ref() else {
        return CalendarListResponse {
            success: false,
            message: state.calendar_fallback_status.reason.clone(),
            calendars: Vec::new(),
        };
    };
    match calendar_sync.list_calendars().await {
        Ok(calendars) => CalendarListResponse {
            success: true,
            message: format!("找到 {} 個可用日曆", calendars.len()),
            calendars,
        },
        Err(error) => {
            let message = format!("獲取日曆列表失敗: {error}");
            state.log_error("list_calendars", &message);
            CalendarListResponse {
                success: false,
                message,
                calendars: Vec::new(),
            }
        }
    }
}

pub async fn create_calendar_impl(state: &AppState, name: Option<String>) -> CreateCalendarResponse {
    let Some(calendar_sync) = state.calendar_sync.as_ref() else {
        return CreateCalendarResponse {
            success: false,
            message: state.calendar_fallback_status.reason.clone(),
            calendar_id: None,
            calendar_name: None,
        };
    };
    let name = name
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_CALENDAR_NAME)
        .to_string();
    match calendar_sync.create_calendar(&name).await {
        Ok(calendar) => {
            state.log_info("create_calendar", &format!("created calendar_id={}", calendar.id));
            CreateCalendarResponse {
                success: true,
                message: format!("日曆建立成功: {}", calendar.name),
                calendar_id: Some(calendar.id),
                calendar_name: Some(calendar.name),
            }
        }
        Err(error) => {
            let message = format!("建立日曆失敗: {error}");
            state.log_error("create_calendar", &message);
            CreateCalendarResponse {
                success: false,
                message,
                calendar_id: None,
                calendar_name: None,
            }
        }
    }
}

fn require_authorizer(state: &AppState) -> Result<&Arc<dyn CalendarAuthorizer>, InfraError> {
    state
        .calendar_authorizer
        .as_ref()
        .ok_or_else(|| InfraError::CalendarUnavailable(state.calendar_fallback_status.reason.clone()))
}

pub fn authorization_url_impl(state: &AppState) -> Result<AuthorizationUrlResponse, InfraError> {
    let authorizer = require_authorizer(state)?;
    let authorization_url = authorizer.authorization_url(&next_id("state"))?;
    Ok(AuthorizationUrlResponse { authorization_url })
}

pub async fn authorize_impl(state: &AppState, code: Option<String>) -> Result<AuthorizeResponse, InfraError> {
    let authorizer = require_authorizer(state)?;
    let code = code.unwrap_or_default();
    if code.trim().is_empty() {
        return Err(InfraError::validation("code", "authorization code must not be empty"));
    }
    authorizer.authorize(&code).await?;
    state.log_info("authorize_google", "stored google oauth token");
    Ok(AuthorizeResponse {
        status: "authorized".to_string(),
    })
}
