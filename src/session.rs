//! Bearer credential sources.
//!
//! The client never caches a credential: it asks its [`CredentialProvider`]
//! at the start of every request, so a token rotated between two calls is
//! used by the second one.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::client::ClientError;
use crate::options::SecretString;

/// Key of the bearer token in a [`SessionStore`].
pub const TOKEN_KEY: &str = "token";

/// Key of the serialized signed-in user in a [`SessionStore`].
pub const USER_KEY: &str = "user";

/// Source of the bearer token attached to each request.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// The current token, or `None` when nobody is signed in.
    async fn bearer_token(&self) -> Result<Option<SecretString>, ClientError>;
}

#[async_trait]
impl CredentialProvider for SecretString {
    async fn bearer_token(&self) -> Result<Option<SecretString>, ClientError> {
        Ok(Some(self.clone()))
    }
}

#[async_trait]
impl<T: CredentialProvider + ?Sized> CredentialProvider for Arc<T> {
    async fn bearer_token(&self) -> Result<Option<SecretString>, ClientError> {
        (**self).bearer_token().await
    }
}

/// In-memory string key-value store shared by the whole application.
///
/// Holds the session token under [`TOKEN_KEY`] and the signed-in user as
/// JSON under [`USER_KEY`].
#[derive(Debug, Default)]
pub struct SessionStore {
    entries: RwLock<HashMap<String, String>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    /// The stored token. An empty value counts as signed out.
    pub fn token(&self) -> Option<SecretString> {
        self.get(TOKEN_KEY)
            .filter(|token| !token.is_empty())
            .map(SecretString::new)
    }

    pub fn set_token(&self, token: impl Into<String>) {
        self.set(TOKEN_KEY, token);
    }

    /// Deserialize the stored user. A missing or corrupt entry yields `None`.
    pub fn user<T: DeserializeOwned>(&self) -> Option<T> {
        let raw = self.get(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!(error = %e, "stored user is not valid JSON");
                None
            }
        }
    }

    pub fn set_user<T: Serialize + ?Sized>(&self, user: &T) -> Result<(), ClientError> {
        self.set(USER_KEY, serde_json::to_string(user)?);
        Ok(())
    }

    /// Forget the token and the user.
    pub fn logout(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(TOKEN_KEY);
        entries.remove(USER_KEY);
    }
}

#[async_trait]
impl CredentialProvider for SessionStore {
    async fn bearer_token(&self) -> Result<Option<SecretString>, ClientError> {
        Ok(self.token())
    }
}
