use crate::infrastructure::config::{optional_lookup_value, required_lookup_value};
use crate::infrastructure::credential_store::CredentialStore;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::oauth_client::{
    OAuthHttpClient, OAuthToken, TokenGrant, TokenRequest, TokenResponse,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use url::Url;

const DEFAULT_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:5000/api/google-calendar/auth/callback";
const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/calendar";
const TOKEN_LEEWAY_SECONDS: i64 = 60;

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub token_endpoint: String,
    pub authorization_endpoint: String,
}

impl OAuthConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            scopes,
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            authorization_endpoint: DEFAULT_AUTHORIZATION_ENDPOINT.to_string(),
        }
    }
}

pub fn load_oauth_config_from_env() -> Result<OAuthConfig, InfraError> {
    load_oauth_config_from_lookup(|key| std::env::var(key).ok())
}

pub fn load_oauth_config_from_lookup<F>(lookup: F) -> Result<OAuthConfig, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    let client_id = required_lookup_value(&lookup, &["GOOGLE_CLIENT_ID"], "google client id")?;
    let client_secret =
        required_lookup_value(&lookup, &["GOOGLE_CLIENT_SECRET"], "google client secret")?;
    let redirect_uri = optional_lookup_value(&lookup, &["GOOGLE_REDIRECT_URI"])
        .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());
    let scopes = optional_lookup_value(&lookup, &["GOOGLE_SCOPES"])
        .map(|raw| parse_scope_list(&raw))
        .filter(|scopes| !scopes.is_empty())
        .unwrap_or_else(|| vec![DEFAULT_SCOPE.to_string()]);

    Ok(OAuthConfig::new(client_id, client_secret, redirect_uri, scopes))
}

fn parse_scope_list(raw: &str) -> Vec<String> {
    raw.split([',', ' ', '\n', '\t'])
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureTokenResult {
    Existing(OAuthToken),
    Refreshed(OAuthToken),
    ReauthenticationRequired,
}

/// Supplies a bearer token for Google Calendar calls. `None` means the user has to
/// authorize again before calendar sync can run.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<Option<String>, InfraError>;
}

/// Interactive authorization-code flow exposed over HTTP.
#[async_trait]
pub trait CalendarAuthorizer: Send + Sync {
    fn authorization_url(&self, state: &str) -> Result<String, InfraError>;
    async fn authorize(&self, authorization_code: &str) -> Result<(), InfraError>;
}

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct OAuthManager<S, C>
where
    S: CredentialStore,
    C: OAuthHttpClient,
{
    config: OAuthConfig,
    credential_store: Arc<S>,
    oauth_client: Arc<C>,
    now_provider: NowProvider,
}

impl<S, C> OAuthManager<S, C>
where
    S: CredentialStore,
    C: OAuthHttpClient,
{
    pub fn new(config: OAuthConfig, credential_store: Arc<S>, oauth_client: Arc<C>) -> Self {
        Self {
            config,
            credential_store,
            oauth_client,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn is_token_valid(&self, token: &OAuthToken) -> bool {
        token.is_valid_at((self.now_provider)(), TOKEN_LEEWAY_SECONDS)
    }

    pub fn build_authorization_url(&self, state: &str) -> Result<String, InfraError> {
        if state.trim().is_empty() {
            return Err(InfraError::OAuth("state must not be empty".to_string()));
        }
        if self.config.scopes.is_empty() {
            return Err(InfraError::OAuth("at least one scope is required".to_string()));
        }

        let mut url = Url::parse(&self.config.authorization_endpoint)
            .map_err(|error| InfraError::OAuth(format!("invalid authorization endpoint: {error}")))?;
        let scope = self.config.scopes.join(" ");

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &scope)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", state);

        Ok(url.to_string())
    }

    pub async fn authenticate_with_code(&self, authorization_code: &str) -> Result<OAuthToken, InfraError> {
        let code = authorization_code.trim();
        if code.is_empty() {
            return Err(InfraError::OAuth("authorization code must not be empty".to_string()));
        }

        let response = self
            .oauth_client
            .request_token(self.token_request(TokenGrant::AuthorizationCode {
                code: code.to_string(),
                redirect_uri: self.config.redirect_uri.clone(),
            }))
            .await?;

        let token = self.token_from_response(response, None);
        self.credential_store.save_token(&token)?;
        Ok(token)
    }

    pub async fn ensure_access_token(&self) -> Result<EnsureTokenResult, InfraError> {
        let Some(stored_token) = self.credential_store.load_token()? else {
            return Ok(EnsureTokenResult::ReauthenticationRequired);
        };

        if self.is_token_valid(&stored_token) {
            return Ok(EnsureTokenResult::Existing(stored_token));
        }

        let Some(refresh_token) = stored_token.refresh_token.clone() else {
            return Ok(EnsureTokenResult::ReauthenticationRequired);
        };

        match self
            .oauth_client
            .request_token(self.token_request(TokenGrant::RefreshToken(refresh_token)))
            .await
        {
            Ok(response) => {
                let token = self.token_from_response(response, stored_token.refresh_token);
                self.credential_store.save_token(&token)?;
                Ok(EnsureTokenResult::Refreshed(token))
            }
            Err(InfraError::OAuth(message)) if !message.contains("network error") => {
                Ok(EnsureTokenResult::ReauthenticationRequired)
            }
            Err(error) => Err(error),
        }
    }

    pub fn clear_stored_token(&self) -> Result<(), InfraError> {
        self.credential_store.delete_token()
    }

    fn token_request(&self, grant: TokenGrant) -> TokenRequest {
        TokenRequest {
            token_endpoint: self.config.token_endpoint.clone(),
            client_id: self.config.client_id.clone(),
            client_secret: self.config.client_secret.clone(),
            grant,
        }
    }

    fn token_from_response(
        &self,
        response: TokenResponse,
        fallback_refresh_token: Option<String>,
    ) -> OAuthToken {
        let expires_at = (self.now_provider)() + Duration::seconds(response.expires_in.max(0));
        OAuthToken {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(fallback_refresh_token),
            expires_at,
            token_type: response.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scope: response.scope,
        }
    }
}

#[async_trait]
impl<S, C> AccessTokenSource for OAuthManager<S, C>
where
    S: CredentialStore,
    C: OAuthHttpClient,
{
    async fn access_token(&self) -> Result<Option<String>, InfraError> {
        match self.ensure_access_token().await? {
            EnsureTokenResult::Existing(token) | EnsureTokenResult::Refreshed(token) => {
                Ok(Some(token.access_token))
            }
            EnsureTokenResult::ReauthenticationRequired => Ok(None),
        }
    }
}

#[async_trait]
impl<S, C> CalendarAuthorizer for OAuthManager<S, C>
where
    S: CredentialStore,
    C: OAuthHttpClient,
{
    fn authorization_url(&self, state: &str) -> Result<String, InfraError> {
        self.build_authorization_url(state)
    }

    async fn authorize(&self, authorization_code: &str) -> Result<(), InfraError> {
        self.authenticate_with_code(authorization_code).await.map(|_| ())
    }
}
