use crate::application::oauth::AccessTokenSource;
use crate::domain::models::TodoRecord;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::{encode_todo_event, GoogleCalendarEvent};
use crate::infrastructure::google_calendar_client::{GoogleCalendarClient, GoogleCalendarSummary};
use async_trait::async_trait;
use chrono_tz::Tz;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::time::{sleep, Duration as TokioDuration};

pub const DEFAULT_CALENDAR_NAME: &str = "TODO List";

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u8,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarServiceStatus {
    pub available: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_id: Option<String>,
}

impl CalendarServiceStatus {
    pub fn unavailable(reason: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            available: false,
            reason: reason.into(),
            suggestion: Some(suggestion.into()),
            calendar_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTestResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_name: Option<String>,
    pub calendar_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u16>,
}

/// Mirror of todo records onto a Google calendar. Callers treat every error as
/// non-fatal for local persistence.
#[async_trait]
pub trait TodoCalendarSync: Send + Sync {
    async fn status(&self) -> CalendarServiceStatus;
    async fn create_event(&self, todo: &TodoRecord) -> Result<String, InfraError>;
    async fn update_event(&self, event_id: &str, todo: &TodoRecord) -> Result<(), InfraError>;
    async fn delete_event(&self, event_id: &str) -> Result<(), InfraError>;
    async fn test_connection(&self) -> ConnectionTestResult;
    async fn list_calendars(&self) -> Result<Vec<GoogleCalendarSummary>, InfraError>;
    async fn create_calendar(&self, name: &str) -> Result<GoogleCalendarSummary, InfraError>;
}

pub struct GoogleCalendarSync<C, T>
where
    C: GoogleCalendarClient,
    T: AccessTokenSource,
{
    calendar_client: Arc<C>,
    token_source: Arc<T>,
    calendar_id: String,
    timezone: Tz,
    event_duration_minutes: u32,
    retry_policy: RetryPolicy,
}

impl<C, T> GoogleCalendarSync<C, T>
where
    C: GoogleCalendarClient,
    T: AccessTokenSource,
{
    pub fn new(
        calendar_client: Arc<C>,
        token_source: Arc<T>,
        calendar_id: impl Into<String>,
        timezone: Tz,
        event_duration_minutes: u32,
    ) -> Self {
        Self {
            calendar_client,
            token_source,
            calendar_id: calendar_id.into(),
            timezone,
            event_duration_minutes,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    async fn require_token(&self) -> Result<String, InfraError> {
        self.token_source.access_token().await?.ok_or_else(|| {
            InfraError::CalendarUnavailable("google authorization required".to_string())
        })
    }

    fn encode(&self, todo: &TodoRecord) -> Result<GoogleCalendarEvent, InfraError> {
        Ok(encode_todo_event(todo, self.timezone, self.event_duration_minutes)?)
    }

    async fn with_retry<F, Fut, R>(&self, mut operation: F) -> Result<R, InfraError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, InfraError>>,
    {
        let max_attempts = self.retry_policy.max_attempts.max(1);
        let mut attempt: u8 = 0;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if should_retry(&error) && attempt + 1 < max_attempts => {
                    let delay = self
                        .retry_policy
                        .base_delay_ms
                        .saturating_mul(2u64.saturating_pow(attempt as u32));
                    tracing::debug!(attempt, delay_ms = delay, %error, "retrying google calendar call");
                    sleep(TokioDuration::from_millis(delay)).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(error) => return Err(error),
            }
        }
    }
}

fn should_retry(error: &InfraError) -> bool {
    match error {
        InfraError::Calendar(message) => {
            let message = message.to_ascii_lowercase();
            message.contains("network error")
                || message.contains("timeout")
                || message.contains("timed out")
                || message.contains("temporarily unavailable")
                || message.contains("connection reset")
        }
        InfraError::CalendarHttp { status, .. } => *status == 429 || *status >= 500,
        _ => false,
    }
}

fn connection_failure_message(calendar_id: &str, error: &InfraError) -> (String, Option<u16>) {
    match error {
        InfraError::CalendarHttp { status: 404, .. } => (
            format!("日曆 ID \"{calendar_id}\" 不存在或無權限存取，請確認日曆 ID 或改用 \"primary\""),
            Some(404),
        ),
        InfraError::CalendarHttp { status: 403, .. } => (
            "權限不足，請確認 Google Calendar API 已啟用且帳戶可管理目標日曆".to_string(),
            Some(403),
        ),
        InfraError::CalendarHttp { status: 401, .. } => (
            "認證失敗，請重新完成 Google 授權".to_string(),
            Some(401),
        ),
        InfraError::CalendarHttp { status, .. } => (format!("連接失敗: {error}"), Some(*status)),
        other => (format!("連接失敗: {other}"), None),
    }
}

#[async_trait]
impl<C, T> TodoCalendarSync for GoogleCalendarSync<C, T>
where
    C: GoogleCalendarClient,
    T: AccessTokenSource,
{
    async fn status(&self) -> CalendarServiceStatus {
        match self.token_source.access_token().await {
            Ok(Some(_)) => CalendarServiceStatus {
                available: true,
                reason: "Google Calendar 服務正常運作".to_string(),
                suggestion: None,
                calendar_id: Some(self.calendar_id.clone()),
            },
            Ok(None) => CalendarServiceStatus::unavailable(
                "尚未完成 Google 授權",
                "請開啟 /api/google-calendar/auth 完成授權",
            ),
            Err(error) => CalendarServiceStatus::unavailable(
                format!("無法取得 Google 存取權杖: {error}"),
                "請檢查 GOOGLE_CLIENT_ID 與 GOOGLE_CLIENT_SECRET 設定並重新授權",
            ),
        }
    }

    async fn create_event(&self, todo: &TodoRecord) -> Result<String, InfraError> {
        let event = self.encode(todo)?;
        let token = self.require_token().await?;
        // events.insert is not idempotent; sent once, never retried.
        self.calendar_client
            .create_event(&token, &self.calendar_id, &event)
            .await
    }

    async fn update_event(&self, event_id: &str, todo: &TodoRecord) -> Result<(), InfraError> {
        let event = self.encode(todo)?;
        let token = self.require_token().await?;
        self.with_retry(|| {
            self.calendar_client
                .update_event(&token, &self.calendar_id, event_id, &event)
        })
        .await
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), InfraError> {
        let token = self.require_token().await?;
        self.with_retry(|| {
            self.calendar_client
                .delete_event(&token, &self.calendar_id, event_id)
        })
        .await
    }

    async fn test_connection(&self) -> ConnectionTestResult {
        let outcome = match self.require_token().await {
            Ok(token) => {
                self.with_retry(|| self.calendar_client.get_calendar(&token, &self.calendar_id))
                    .await
            }
            Err(error) => Err(error),
        };

        match outcome {
            Ok(calendar) => ConnectionTestResult {
                success: true,
                message: format!("成功連接到日曆: {}", calendar.name),
                calendar_name: Some(calendar.name),
                calendar_id: self.calendar_id.clone(),
                error_code: None,
            },
            Err(error) => {
                let (message, error_code) = connection_failure_message(&self.calendar_id, &error);
                ConnectionTestResult {
                    success: false,
                    message,
                    calendar_name: None,
                    calendar_id: self.calendar_id.clone(),
                    error_code,
                }
            }
        }
    }

    async fn list_calendars(&self) -> Result<Vec<GoogleCalendarSummary>, InfraError> {
        let token = self.require_token().await?;
        self.with_retry(|| self.calendar_client.list_calendars(&token))
            .await
    }

    async fn create_calendar(&self, name: &str) -> Result<GoogleCalendarSummary, InfraError> {
        let name = Some(name.trim())
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_CALENDAR_NAME);
        let token = self.require_token().await?;
        self.calendar_client
            .create_calendar(&token, name, Some(self.timezone.name()))
            .await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::models::{TimeSlot, TodoStatus};
    use crate::domain::reminder::default_reminders;
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub(crate) struct StaticTokenSource(pub Option<String>);

    #[async_trait]
    impl AccessTokenSource for StaticTokenSource {
        async fn access_token(&self) -> Result<Option<String>, InfraError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Debug, Clone)]
    enum FakeFailure {
        Network,
        Http(u16),
    }

    impl FakeFailure {
        fn into_error(self) -> InfraError {
            match self {
                Self::Network => InfraError::Calendar("network error while creating event: reset".to_string()),
                Self::Http(status) => InfraError::CalendarHttp {
                    status,
                    body: String::new(),
                },
            }
        }
    }

    #[derive(Debug, Default)]
    struct FakeGoogleCalendarClient {
        failures: Mutex<VecDeque<FakeFailure>>,
        created: Mutex<Vec<GoogleCalendarEvent>>,
        create_calls: AtomicUsize,
        get_calls: AtomicUsize,
        update_calls: AtomicUsize,
        lose_create_response: bool,
    }

    impl FakeGoogleCalendarClient {
        fn failing_with(failures: Vec<FakeFailure>) -> Self {
            Self {
                failures: Mutex::new(failures.into()),
                ..Self::default()
            }
        }

        fn next_failure(&self) -> Option<InfraError> {
            self.failures
                .lock()
                .expect("failures mutex poisoned")
                .pop_front()
                .map(FakeFailure::into_error)
        }
    }

    #[async_trait]
    impl GoogleCalendarClient for FakeGoogleCalendarClient {
        async fn get_calendar(
            &self,
            _access_token: &str,
            calendar_id: &str,
        ) -> Result<GoogleCalendarSummary, InfraError> {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(error) = self.next_failure() {
                return Err(error);
            }
            Ok(GoogleCalendarSummary {
                id: calendar_id.to_string(),
                name: "Work".to_string(),
                description: String::new(),
                access_role: Some("owner".to_string()),
                primary: false,
            })
        }

        async fn list_calendars(
            &self,
            _access_token: &str,
        ) -> Result<Vec<GoogleCalendarSummary>, InfraError> {
            Ok(Vec::new())
        }

        async fn create_calendar(
            &self,
            _access_token: &str,
            summary: &str,
            _time_zone: Option<&str>,
        ) -> Result<GoogleCalendarSummary, InfraError> {
            Ok(GoogleCalendarSummary {
                id: "new-calendar".to_string(),
                name: summary.to_string(),
                description: String::new(),
                access_role: None,
                primary: false,
            })
        }

        async fn create_event(
            &self,
            _access_token: &str,
            _calendar_id: &str,
            event: &GoogleCalendarEvent,
        ) -> Result<String, InfraError> {
            let call = self.create_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(error) = self.next_failure() {
                return Err(error);
            }
            self.created
                .lock()
                .expect("created mutex poisoned")
                .push(event.clone());
            if self.lose_create_response {
                return Err(InfraError::Calendar(
                    "network error while creating event: operation timed out".to_string(),
                ));
            }
            Ok(format!("evt-{call}"))
        }

        async fn update_event(
            &self,
            _access_token: &str,
            _calendar_id: &str,
            _event_id: &str,
            _event: &GoogleCalendarEvent,
        ) -> Result<(), InfraError> {
            self.update_calls.fetch_add(1, Ordering::SeqCst);
            match self.next_failure() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }

        async fn delete_event(
            &self,
            _access_token: &str,
            _calendar_id: &str,
            _event_id: &str,
        ) -> Result<(), InfraError> {
            Ok(())
        }
    }

    fn sample_todo() -> TodoRecord {
        let created = DateTime::parse_from_rfc3339("2026-08-01T00:00:00Z")
            .expect("valid datetime")
            .with_timezone(&Utc);
        TodoRecord {
            id: "todo-1".to_string(),
            title: "Dentist".to_string(),
            description: "Annual check".to_string(),
            due_date: "2026-08-20".to_string(),
            time_slot: TimeSlot::Afternoon,
            custom_time: None,
            location: String::new(),
            status: TodoStatus::Pending,
            reminders: default_reminders(),
            google_event_id: None,
            created_at: created,
            updated_at: created,
        }
    }

    fn sync_with(
        client: &Arc<FakeGoogleCalendarClient>,
        token: Option<&str>,
    ) -> GoogleCalendarSync<FakeGoogleCalendarClient, StaticTokenSource> {
        GoogleCalendarSync::new(
            Arc::clone(client),
            Arc::new(StaticTokenSource(token.map(ToOwned::to_owned))),
            "primary",
            chrono_tz::Asia::Taipei,
            60,
        )
        .with_retry_policy(RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
        })
    }

    #[tokio::test]
    async fn create_event_sends_resolved_event() {
        let client = Arc::new(FakeGoogleCalendarClient::default());
        let event_id = sync_with(&client, Some("token"))
            .create_event(&sample_todo())
            .await
            .expect("create event");
        assert_eq!(event_id, "evt-0");
        let created = client.created.lock().expect("created mutex poisoned");
        assert_eq!(
            created[0].start.date_time.as_deref(),
            Some("2026-08-20T18:00:00+08:00")
        );
    }

    #[tokio::test]
    async fn transient_update_failures_are_retried() {
        let client = Arc::new(FakeGoogleCalendarClient::failing_with(vec![
            FakeFailure::Network,
            FakeFailure::Http(503),
        ]));
        sync_with(&client, Some("token"))
            .update_event("evt-9", &sample_todo())
            .await
            .expect("update event after retries");
        assert_eq!(client.update_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let client = Arc::new(FakeGoogleCalendarClient::failing_with(vec![FakeFailure::Http(400)]));
        let result = sync_with(&client, Some("token"))
            .update_event("evt-9", &sample_todo())
            .await;
        assert!(matches!(result, Err(InfraError::CalendarHttp { status: 400, .. })));
        assert_eq!(client.update_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn create_event_is_sent_once_even_on_transient_failure() {
        let client = Arc::new(FakeGoogleCalendarClient::failing_with(vec![FakeFailure::Http(503)]));
        let result = sync_with(&client, Some("token")).create_event(&sample_todo()).await;
        assert!(matches!(result, Err(InfraError::CalendarHttp { status: 503, .. })));
        assert_eq!(client.create_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn lost_create_response_leaves_a_single_remote_event() {
        let client = Arc::new(FakeGoogleCalendarClient {
            lose_create_response: true,
            ..FakeGoogleCalendarClient::default()
        });
        let result = sync_with(&client, Some("token")).create_event(&sample_todo()).await;
        assert!(matches!(result, Err(InfraError::Calendar(_))));
        assert_eq!(client.create_calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.created.lock().expect("created mutex poisoned").len(), 1);
    }

    #[tokio::test]
    async fn missing_authorization_makes_service_unavailable() {
        let client = Arc::new(FakeGoogleCalendarClient::default());
        let sync = sync_with(&client, None);
        let status = sync.status().await;
        assert!(!status.available);
        assert!(status.suggestion.is_some());

        let result = sync.create_event(&sample_todo()).await;
        assert!(matches!(result, Err(InfraError::CalendarUnavailable(_))));
        assert_eq!(client.create_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn connection_test_explains_missing_calendar() {
        let client = Arc::new(FakeGoogleCalendarClient::failing_with(vec![FakeFailure::Http(404)]));
        let result = sync_with(&client, Some("token")).test_connection().await;
        assert!(!result.success);
        assert_eq!(result.error_code, Some(404));
        assert!(result.message.contains("primary"));

        let result = sync_with(&client, Some("token")).test_connection().await;
        assert!(result.success);
        assert_eq!(result.calendar_name.as_deref(), Some("Work"));
    }

    #[tokio::test]
    async fn create_calendar_defaults_name() {
        let client = Arc::new(FakeGoogleCalendarClient::default());
        let created = sync_with(&client, Some("token"))
            .create_calendar("  ")
            .await
            .expect("create calendar");
        assert_eq!(created.name, DEFAULT_CALENDAR_NAME);
    }

    proptest! {
        #[test]
        fn retries_never_exceed_max_attempts(failures in 0usize..6, max_attempts in 1u8..5) {
            let runtime = tokio::runtime::Runtime::new().expect("runtime");
            runtime.block_on(async move {
                let client = Arc::new(FakeGoogleCalendarClient::failing_with(
                    vec![FakeFailure::Network; failures],
                ));
                let sync = sync_with(&client, Some("token")).with_retry_policy(RetryPolicy {
                    max_attempts,
                    base_delay_ms: 0,
                });
                let result = sync.update_event("evt-9", &sample_todo()).await;
                let calls = client.update_calls.load(Ordering::SeqCst);
                assert!(calls <= usize::from(max_attempts));
                assert_eq!(result.is_ok(), failures < usize::from(max_attempts));
            });
        }
    }
}
