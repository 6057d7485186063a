use crate::domain::reminder::Locale;
use crate::infrastructure::error::InfraError;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

const APP_JSON: &str = "app.json";
const DEFAULT_TIMEZONE: &str = "Asia/Taipei";
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:5000";
const DEFAULT_FRONTEND_ORIGIN: &str = "http://localhost:3000";
const DEFAULT_CALENDAR_ID: &str = "primary";
const DEFAULT_EVENT_DURATION_MINUTES: u32 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarSyncConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
}

impl Default for CalendarSyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            calendar_id: DEFAULT_CALENDAR_ID.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub timezone: Tz,
    pub listen_addr: SocketAddr,
    pub frontend_origin: String,
    pub locale: Locale,
    pub event_duration_minutes: u32,
    pub calendar_sync: CalendarSyncConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Asia::Taipei,
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            frontend_origin: DEFAULT_FRONTEND_ORIGIN.to_string(),
            locale: Locale::ZhTw,
            event_duration_minutes: DEFAULT_EVENT_DURATION_MINUTES,
            calendar_sync: CalendarSyncConfig::default(),
        }
    }
}

/// On-disk shape of `config/app.json`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppConfigFile {
    schema: u8,
    #[serde(default = "default_timezone")]
    timezone: String,
    #[serde(default = "default_listen_addr")]
    listen_addr: String,
    #[serde(default = "default_frontend_origin")]
    frontend_origin: String,
    #[serde(default)]
    locale: Locale,
    #[serde(default = "default_event_duration")]
    event_duration_minutes: u32,
    #[serde(default)]
    calendar_sync: CalendarSyncConfig,
}

fn default_true() -> bool {
    true
}

fn default_calendar_id() -> String {
    DEFAULT_CALENDAR_ID.to_string()
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

fn default_frontend_origin() -> String {
    DEFAULT_FRONTEND_ORIGIN.to_string()
}

fn default_event_duration() -> u32 {
    DEFAULT_EVENT_DURATION_MINUTES
}

fn default_app_file() -> serde_json::Value {
    serde_json::json!({
        "schema": 1,
        "timezone": DEFAULT_TIMEZONE,
        "listenAddr": DEFAULT_LISTEN_ADDR,
        "frontendOrigin": DEFAULT_FRONTEND_ORIGIN,
        "locale": "zh-TW",
        "eventDurationMinutes": DEFAULT_EVENT_DURATION_MINUTES,
        "calendarSync": {
            "enabled": true,
            "calendarId": DEFAULT_CALENDAR_ID
        }
    })
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    fs::create_dir_all(config_dir)?;
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&default_app_file())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_app_config_from_env(config_dir: &Path) -> Result<AppConfig, InfraError> {
    load_app_config(config_dir, |key| std::env::var(key).ok())
}

/// Reads `app.json` and layers environment overrides on top of it.
pub fn load_app_config<F>(config_dir: &Path, lookup: F) -> Result<AppConfig, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    let path = config_dir.join(APP_JSON);
    let file: AppConfigFile = serde_json::from_value(read_config(&path)?)?;

    let timezone_name = optional_lookup_value(&lookup, &["TODO_TIMEZONE", "TZ_NAME"])
        .unwrap_or(file.timezone);
    let timezone = parse_timezone(&timezone_name)?;

    let mut listen_addr = parse_listen_addr(&file.listen_addr)?;
    if let Some(port) = optional_lookup_value(&lookup, &["PORT"]) {
        let port = port
            .parse::<u16>()
            .map_err(|error| InfraError::InvalidConfig(format!("invalid PORT '{port}': {error}")))?;
        listen_addr.set_port(port);
    }

    let frontend_origin =
        optional_lookup_value(&lookup, &["FRONTEND_URL"]).unwrap_or(file.frontend_origin);

    let mut calendar_sync = file.calendar_sync;
    if let Some(calendar_id) = optional_lookup_value(&lookup, &["GOOGLE_CALENDAR_ID"]) {
        calendar_sync.calendar_id = calendar_id;
    }
    if calendar_sync.calendar_id.trim().is_empty() {
        calendar_sync.calendar_id = DEFAULT_CALENDAR_ID.to_string();
    }

    let locale = match optional_lookup_value(&lookup, &["TODO_LOCALE"]) {
        Some(raw) => Locale::parse(&raw)
            .ok_or_else(|| InfraError::InvalidConfig(format!("unsupported TODO_LOCALE '{raw}'")))?,
        None => file.locale,
    };

    if file.event_duration_minutes == 0 {
        return Err(InfraError::InvalidConfig(
            "eventDurationMinutes must be positive".to_string(),
        ));
    }

    Ok(AppConfig {
        timezone,
        listen_addr,
        frontend_origin,
        locale,
        event_duration_minutes: file.event_duration_minutes,
        calendar_sync,
    })
}

pub fn parse_timezone(value: &str) -> Result<Tz, InfraError> {
    value
        .trim()
        .parse::<Tz>()
        .map_err(|error| InfraError::InvalidConfig(format!("invalid timezone '{value}': {error}")))
}

fn parse_listen_addr(value: &str) -> Result<SocketAddr, InfraError> {
    value
        .trim()
        .parse::<SocketAddr>()
        .map_err(|error| InfraError::InvalidConfig(format!("invalid listenAddr '{value}': {error}")))
}

pub(crate) fn required_lookup_value<F>(
    lookup: &F,
    keys: &[&str],
    field_name: &str,
) -> Result<String, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    optional_lookup_value(lookup, keys).ok_or_else(|| {
        InfraError::InvalidConfig(format!(
            "missing {} (set one of: {})",
            field_name,
            keys.join(", ")
        ))
    })
}

pub(crate) fn optional_lookup_value<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    for key in keys {
        if let Some(value) = lookup(key) {
            let normalized = value.trim();
            if !normalized.is_empty() {
                return Some(normalized.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};

    static NEXT_TEMP_CONFIG: AtomicU64 = AtomicU64::new(1);

    struct TempConfigDir {
        path: PathBuf,
    }

    impl TempConfigDir {
        fn new() -> Self {
            let sequence = NEXT_TEMP_CONFIG.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "todo-calendar-config-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp config dir");
            Self { path }
        }

        fn write_app(&self, value: serde_json::Value) {
            fs::write(self.path.join(APP_JSON), value.to_string()).expect("write app.json");
        }
    }

    impl Drop for TempConfigDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn default_config_file_loads_to_defaults() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");
        let config = load_app_config(&dir.path, no_env).expect("load config");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn ensure_default_configs_keeps_existing_file() {
        let dir = TempConfigDir::new();
        dir.write_app(serde_json::json!({ "schema": 1, "timezone": "UTC" }));
        ensure_default_configs(&dir.path).expect("ensure defaults");
        let config = load_app_config(&dir.path, no_env).expect("load config");
        assert_eq!(config.timezone, chrono_tz::UTC);
        assert_eq!(config.event_duration_minutes, 60);
    }

    #[test]
    fn environment_overrides_file_values() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");
        let config = load_app_config(&dir.path, |key| match key {
            "TODO_TIMEZONE" => Some("America/New_York".to_string()),
            "PORT" => Some("8081".to_string()),
            "FRONTEND_URL" => Some(" https://todo.example.com ".to_string()),
            "GOOGLE_CALENDAR_ID" => Some("team@group.calendar.google.com".to_string()),
            "TODO_LOCALE" => Some("EN".to_string()),
            _ => None,
        })
        .expect("load config");
        assert_eq!(config.locale, Locale::En);
        assert_eq!(config.timezone, chrono_tz::America::New_York);
        assert_eq!(config.listen_addr.port(), 8081);
        assert_eq!(config.frontend_origin, "https://todo.example.com");
        assert_eq!(config.calendar_sync.calendar_id, "team@group.calendar.google.com");
    }

    #[test]
    fn unknown_locale_override_is_rejected() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");
        let result = load_app_config(&dir.path, |key| (key == "TODO_LOCALE").then(|| "fr".to_string()));
        match result {
            Err(InfraError::InvalidConfig(message)) => assert!(message.contains("TODO_LOCALE")),
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn unsupported_schema_is_rejected() {
        let dir = TempConfigDir::new();
        dir.write_app(serde_json::json!({ "schema": 2 }));
        match load_app_config(&dir.path, no_env) {
            Err(InfraError::InvalidConfig(message)) => assert!(message.contains("unsupported schema")),
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn invalid_timezone_and_port_are_rejected() {
        let dir = TempConfigDir::new();
        dir.write_app(serde_json::json!({ "schema": 1, "timezone": "Mars/Olympus" }));
        assert!(matches!(
            load_app_config(&dir.path, no_env),
            Err(InfraError::InvalidConfig(_))
        ));

        dir.write_app(serde_json::json!({ "schema": 1 }));
        let result = load_app_config(&dir.path, |key| (key == "PORT").then(|| "http".to_string()));
        assert!(matches!(result, Err(InfraError::InvalidConfig(_))));
    }

    #[test]
    fn required_lookup_reports_all_keys() {
        let result = required_lookup_value(&no_env, &["A_KEY", "B_KEY"], "thing");
        match result {
            Err(InfraError::InvalidConfig(message)) => {
                assert!(message.contains("thing"));
                assert!(message.contains("A_KEY, B_KEY"));
            }
            other => panic!("expected invalid config, got {other:?}"),
        }
    }
}
