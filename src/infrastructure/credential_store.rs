use crate::infrastructure::error::InfraError;
use crate::infrastructure::oauth_client::OAuthToken;
use std::sync::Mutex;

const DEFAULT_SERVICE_NAME: &str = "todo-calendar.oauth.google";
const DEFAULT_ACCOUNT_NAME: &str = "default";

pub trait CredentialStore: Send + Sync {
    fn save_token(&self, token: &OAuthToken) -> Result<(), InfraError>;
    fn load_token(&self) -> Result<Option<OAuthToken>, InfraError>;
    fn delete_token(&self) -> Result<(), InfraError>;
}

/// OS keychain backed token storage.
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service_name: String,
    account_name: String,
}

impl KeyringCredentialStore {
    pub fn new(service_name: impl Into<String>, account_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            account_name: account_name.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, InfraError> {
        keyring::Entry::new(&self.service_name, &self.account_name)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_NAME, DEFAULT_ACCOUNT_NAME)
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn save_token(&self, token: &OAuthToken) -> Result<(), InfraError> {
        let payload =
            serde_json::to_string(token).map_err(|error| InfraError::Credential(error.to_string()))?;
        self.entry()?
            .set_password(&payload)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }

    fn load_token(&self) -> Result<Option<OAuthToken>, InfraError> {
        let payload = match self.entry()?.get_password() {
            Ok(value) => value,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(error) => return Err(InfraError::Credential(error.to_string())),
        };

        serde_json::from_str::<OAuthToken>(&payload)
            .map(Some)
            .map_err(|error| InfraError::Credential(format!("stored token is unreadable: {error}")))
    }

    fn delete_token(&self) -> Result<(), InfraError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(InfraError::Credential(error.to_string())),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    token: Mutex<Option<OAuthToken>>,
}

impl InMemoryCredentialStore {
    pub fn with_token(token: OAuthToken) -> Self {
        Self {
            token: Mutex::new(Some(token)),
        }
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, Option<OAuthToken>>, InfraError> {
        self.token
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn save_token(&self, token: &OAuthToken) -> Result<(), InfraError> {
        *self.guard()? = Some(token.clone());
        Ok(())
    }

    fn load_token(&self) -> Result<Option<OAuthToken>, InfraError> {
        Ok(self.guard()?.clone())
    }

    fn delete_token(&self) -> Result<(), InfraError> {
        *self.guard()? = None;
        Ok(())
    }
}
