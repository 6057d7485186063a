use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::GoogleCalendarEvent;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use url::Url;

const CALENDAR_LIST_ENDPOINT: &str = "https://www.googleapis.com/calendar/v3/users/me/calendarList";
const CALENDAR_CREATE_ENDPOINT: &str = "https://www.googleapis.com/calendar/v3/calendars";
const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3/";
const CREATED_CALENDAR_DESCRIPTION: &str = "由 TODO List 應用程式建立的日曆";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCalendarSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_role: Option<String>,
    pub primary: bool,
}

#[async_trait]
pub trait GoogleCalendarClient: Send + Sync {
    async fn get_calendar(
        &self,
        access_token: &str,
        calendar_id: &str,
    ) -> Result<GoogleCalendarSummary, InfraError>;

    async fn list_calendars(
        &self,
        access_token: &str,
    ) -> Result<Vec<GoogleCalendarSummary>, InfraError>;

    async fn create_calendar(
        &self,
        access_token: &str,
        summary: &str,
        time_zone: Option<&str>,
    ) -> Result<GoogleCalendarSummary, InfraError>;

    async fn create_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &GoogleCalendarEvent,
    ) -> Result<String, InfraError>;

    async fn update_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
        event: &GoogleCalendarEvent,
    ) -> Result<(), InfraError>;

    /// Deleting an event that is already gone succeeds.
    async fn delete_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<(), InfraError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestGoogleCalendarClient {
    client: Client,
}

impl ReqwestGoogleCalendarClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
        if value.trim().is_empty() {
            return Err(InfraError::Calendar(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn http_error(status: StatusCode, body: &str) -> InfraError {
        InfraError::CalendarHttp {
            status: status.as_u16(),
            body: body.trim().to_string(),
        }
    }

    fn endpoint(segments_to_push: &[&str]) -> Result<Url, InfraError> {
        let mut url = Url::parse(CALENDAR_API_BASE)
            .map_err(|error| InfraError::Calendar(format!("invalid calendar api base url: {error}")))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                InfraError::Calendar("calendar api base URL cannot be a base".to_string())
            })?;
            segments.pop_if_empty();
            for segment in segments_to_push {
                segments.push(segment);
            }
        }
        Ok(url)
    }

    fn calendar_endpoint(calendar_id: &str) -> Result<Url, InfraError> {
        Self::endpoint(&["calendars", calendar_id])
    }

    fn events_endpoint(calendar_id: &str) -> Result<Url, InfraError> {
        Self::endpoint(&["calendars", calendar_id, "events"])
    }

    fn event_endpoint(calendar_id: &str, event_id: &str) -> Result<Url, InfraError> {
        Self::endpoint(&["calendars", calendar_id, "events", event_id])
    }

    async fn read_body(response: reqwest::Response, action: &str) -> Result<(StatusCode, String), InfraError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Calendar(format!("failed reading {action} response: {error}")))?;
        Ok((status, body))
    }
}

#[derive(Debug, serde::Deserialize)]
struct CalendarListResponse {
    items: Option<Vec<CalendarListItem>>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarListItem {
    id: String,
    summary: Option<String>,
    description: Option<String>,
    access_role: Option<String>,
    primary: Option<bool>,
}

impl CalendarListItem {
    fn into_summary(self) -> Option<GoogleCalendarSummary> {
        let id = self.id.trim().to_string();
        if id.is_empty() {
            return None;
        }
        let name = self
            .summary
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| id.clone());
        Some(GoogleCalendarSummary {
            id,
            name,
            description: self.description.unwrap_or_default(),
            access_role: self.access_role,
            primary: self.primary.unwrap_or(false),
        })
    }
}

#[derive(Debug, serde::Serialize)]
struct CreateCalendarRequest<'a> {
    summary: &'a str,
    description: &'a str,
    #[serde(rename = "timeZone", skip_serializing_if = "Option::is_none")]
    time_zone: Option<&'a str>,
}

#[async_trait]
impl GoogleCalendarClient for ReqwestGoogleCalendarClient {
    async fn get_calendar(
        &self,
        access_token: &str,
        calendar_id: &str,
    ) -> Result<GoogleCalendarSummary, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(calendar_id, "calendar id")?;

        let response = self
            .client
            .get(Self::calendar_endpoint(calendar_id)?)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|error| InfraError::Calendar(format!("network error while reading calendar: {error}")))?;

        let (status, body) = Self::read_body(response, "calendar get").await?;
        if !status.is_success() {
            return Err(Self::http_error(status, &body));
        }

        let parsed: CalendarListItem = serde_json::from_str(&body).map_err(|error| {
            InfraError::Calendar(format!("invalid calendar payload: {error}; body={body}"))
        })?;
        parsed
            .into_summary()
            .ok_or_else(|| InfraError::Calendar("calendar response did not include id".to_string()))
    }

    async fn list_calendars(
        &self,
        access_token: &str,
    ) -> Result<Vec<GoogleCalendarSummary>, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;

        let response = self
            .client
            .get(CALENDAR_LIST_ENDPOINT)
            .query(&[("maxResults", 250)])
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|error| InfraError::Calendar(format!("network error while listing calendars: {error}")))?;

        let (status, body) = Self::read_body(response, "calendar list").await?;
        if !status.is_success() {
            return Err(Self::http_error(status, &body));
        }

        let parsed: CalendarListResponse = serde_json::from_str(&body).map_err(|error| {
            InfraError::Calendar(format!("invalid calendar list payload: {error}; body={body}"))
        })?;

        Ok(parsed
            .items
            .unwrap_or_default()
            .into_iter()
            .filter_map(CalendarListItem::into_summary)
            .collect())
    }

    async fn create_calendar(
        &self,
        access_token: &str,
        summary: &str,
        time_zone: Option<&str>,
    ) -> Result<GoogleCalendarSummary, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(summary, "calendar summary")?;

        let summary = summary.trim();
        let request = CreateCalendarRequest {
            summary,
            description: CREATED_CALENDAR_DESCRIPTION,
            time_zone: time_zone.map(str::trim).filter(|value| !value.is_empty()),
        };

        let response = self
            .client
            .post(CALENDAR_CREATE_ENDPOINT)
            .bearer_auth(access_token)
            .json(&request)
            .send()
            .await
            .map_err(|error| InfraError::Calendar(format!("network error while creating calendar: {error}")))?;

        let (status, body) = Self::read_body(response, "calendar create").await?;
        if !status.is_success() {
            return Err(Self::http_error(status, &body));
        }

        let parsed: CalendarListItem = serde_json::from_str(&body).map_err(|error| {
            InfraError::Calendar(format!("invalid calendar create payload: {error}; body={body}"))
        })?;
        let mut created = parsed.into_summary().ok_or_else(|| {
            InfraError::Calendar("calendar create response did not include id".to_string())
        })?;
        if created.name == created.id {
            created.name = summary.to_string();
        }
        Ok(created)
    }

    async fn create_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &GoogleCalendarEvent,
    ) -> Result<String, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(calendar_id, "calendar id")?;

        let response = self
            .client
            .post(Self::events_endpoint(calendar_id)?)
            .bearer_auth(access_token)
            .json(event)
            .send()
            .await
            .map_err(|error| InfraError::Calendar(format!("network error while creating event: {error}")))?;

        let (status, body) = Self::read_body(response, "event create").await?;
        if !status.is_success() {
            return Err(Self::http_error(status, &body));
        }

        let parsed: GoogleCalendarEvent = serde_json::from_str(&body).map_err(|error| {
            InfraError::Calendar(format!("invalid event create payload: {error}; body={body}"))
        })?;
        parsed
            .id
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| InfraError::Calendar("event create response did not include id".to_string()))
    }

    async fn update_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
        event: &GoogleCalendarEvent,
    ) -> Result<(), InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(calendar_id, "calendar id")?;
        Self::ensure_non_empty(event_id, "event id")?;

        let response = self
            .client
            .put(Self::event_endpoint(calendar_id, event_id)?)
            .bearer_auth(access_token)
            .json(event)
            .send()
            .await
            .map_err(|error| InfraError::Calendar(format!("network error while updating event: {error}")))?;

        let (status, body) = Self::read_body(response, "event update").await?;
        if !status.is_success() {
            return Err(Self::http_error(status, &body));
        }
        Ok(())
    }

    async fn delete_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<(), InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(calendar_id, "calendar id")?;
        Self::ensure_non_empty(event_id, "event id")?;

        let response = self
            .client
            .delete(Self::event_endpoint(calendar_id, event_id)?)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|error| InfraError::Calendar(format!("network error while deleting event: {error}")))?;

        let (status, body) = Self::read_body(response, "event delete").await?;
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Ok(());
        }
        if !status.is_success() {
            return Err(Self::http_error(status, &body));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_percent_encode_calendar_and_event_ids() {
        let url = ReqwestGoogleCalendarClient::event_endpoint("team@group.calendar.google.com", "evt/1")
            .expect("event endpoint");
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/team@group.calendar.google.com/events/evt%2F1"
        );

        let url = ReqwestGoogleCalendarClient::calendar_endpoint("primary").expect("calendar endpoint");
        assert_eq!(url.as_str(), "https://www.googleapis.com/calendar/v3/calendars/primary");
    }

    #[test]
    fn calendar_list_items_fall_back_to_id_for_name() {
        let item: CalendarListItem = serde_json::from_value(serde_json::json!({
            "id": " work@example.com ",
            "accessRole": "owner",
            "primary": true
        }))
        .expect("parse item");
        let summary = item.into_summary().expect("summary");
        assert_eq!(summary.id, "work@example.com");
        assert_eq!(summary.name, "work@example.com");
        assert_eq!(summary.access_role.as_deref(), Some("owner"));
        assert!(summary.primary);

        let blank: CalendarListItem =
            serde_json::from_value(serde_json::json!({ "id": "  " })).expect("parse blank");
        assert!(blank.into_summary().is_none());
    }

    #[test]
    fn http_errors_keep_status_code() {
        let error = ReqwestGoogleCalendarClient::http_error(StatusCode::FORBIDDEN, " denied ");
        match error {
            InfraError::CalendarHttp { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "denied");
            }
            other => panic!("expected http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn blank_arguments_are_rejected_before_network() {
        let client = ReqwestGoogleCalendarClient::new();
        let result = client.delete_event("token", "primary", "  ").await;
        assert!(matches!(result, Err(InfraError::Calendar(_))));
        let result = client.list_calendars(" ").await;
        assert!(matches!(result, Err(InfraError::Calendar(_))));
    }
}
