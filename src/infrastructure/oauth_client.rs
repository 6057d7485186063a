use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Google OAuth token as kept in the credential store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
    pub scope: Option<String>,
}

impl OAuthToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>, leeway_seconds: i64) -> bool {
        self.expires_at > now + Duration::seconds(leeway_seconds)
            && !self.access_token.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenGrant {
    AuthorizationCode { code: String, redirect_uri: String },
    RefreshToken(String),
}

impl TokenGrant {
    fn form(&self, client_id: &str, client_secret: &str) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("client_id", client_id.to_string()),
            ("client_secret", client_secret.to_string()),
        ];
        match self {
            Self::AuthorizationCode { code, redirect_uri } => {
                form.push(("grant_type", "authorization_code".to_string()));
                form.push(("code", code.clone()));
                form.push(("redirect_uri", redirect_uri.clone()));
            }
            Self::RefreshToken(refresh_token) => {
                form.push(("grant_type", "refresh_token".to_string()));
                form.push(("refresh_token", refresh_token.clone()));
            }
        }
        form
    }
}

#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub token_endpoint: String,
    pub client_id: String,
    pub client_secret: String,
    pub grant: TokenGrant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

#[async_trait]
pub trait OAuthHttpClient: Send + Sync {
    async fn request_token(&self, request: TokenRequest) -> Result<TokenResponse, InfraError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestOAuthClient {
    client: Client,
}

#[derive(Debug, Deserialize)]
struct TokenPayload {
    #[serde(default)]
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    token_type: Option<String>,
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl ReqwestOAuthClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

fn parse_token_payload(status: reqwest::StatusCode, body: &str) -> Result<TokenResponse, InfraError> {
    let parsed = serde_json::from_str::<TokenPayload>(body).map_err(|error| {
        InfraError::OAuth(format!("invalid token response payload: {error}; body={body}"))
    })?;

    if !status.is_success() || parsed.error.is_some() {
        let code = parsed.error.unwrap_or_else(|| format!("http_{}", status.as_u16()));
        let detail = parsed.error_description.unwrap_or_else(|| body.to_string());
        return Err(InfraError::OAuth(format!("token endpoint error: {code}; {detail}")));
    }

    let access_token = parsed
        .access_token
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| InfraError::OAuth("token response did not include access_token".to_string()))?;

    Ok(TokenResponse {
        access_token,
        refresh_token: parsed.refresh_token,
        expires_in: parsed.expires_in.unwrap_or(0).max(0),
        token_type: parsed.token_type,
        scope: parsed.scope,
    })
}

#[async_trait]
impl OAuthHttpClient for ReqwestOAuthClient {
    async fn request_token(&self, request: TokenRequest) -> Result<TokenResponse, InfraError> {
        let form = request.grant.form(&request.client_id, &request.client_secret);
        let response = self
            .client
            .post(&request.token_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|error| InfraError::OAuth(format!("network error while requesting token: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::OAuth(format!("failed reading token response: {error}")))?;

        parse_token_payload(status, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn grant_forms_carry_grant_specific_fields() {
        let form = TokenGrant::RefreshToken("refresh-1".to_string()).form("client", "secret");
        assert!(form.contains(&("grant_type", "refresh_token".to_string())));
        assert!(form.contains(&("refresh_token", "refresh-1".to_string())));
        assert!(!form.iter().any(|(key, _)| *key == "code"));

        let form = TokenGrant::AuthorizationCode {
            code: "abc".to_string(),
            redirect_uri: "http://localhost/cb".to_string(),
        }
        .form("client", "secret");
        assert!(form.contains(&("grant_type", "authorization_code".to_string())));
        assert!(form.contains(&("redirect_uri", "http://localhost/cb".to_string())));
    }

    #[test]
    fn token_payload_errors_surface_google_error_code() {
        let result = parse_token_payload(
            StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_grant","error_description":"Token has been expired or revoked."}"#,
        );
        match result {
            Err(InfraError::OAuth(message)) => {
                assert!(message.contains("invalid_grant"));
                assert!(message.contains("revoked"));
            }
            other => panic!("expected oauth error, got {other:?}"),
        }
    }

    #[test]
    fn token_payload_parses_success() {
        let response = parse_token_payload(
            StatusCode::OK,
            r#"{"access_token":"ya29","expires_in":3599,"token_type":"Bearer"}"#,
        )
        .expect("parse token");
        assert_eq!(response.access_token, "ya29");
        assert_eq!(response.expires_in, 3599);
        assert_eq!(response.refresh_token, None);
    }

    #[test]
    fn token_validity_respects_leeway() {
        let now = Utc::now();
        let token = OAuthToken {
            access_token: "ya29".to_string(),
            refresh_token: None,
            expires_at: now + Duration::seconds(30),
            token_type: "Bearer".to_string(),
            scope: None,
        };
        assert!(token.is_valid_at(now, 0));
        assert!(!token.is_valid_at(now, 60));
    }
}
