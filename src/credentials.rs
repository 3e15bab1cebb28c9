//! Credential storage for the PATCH API client.
//!
//! The access token is held as a [`SecretString`] so it never leaks through
//! `Debug` output. Setters swap the whole value behind an `RwLock`: an
//! in-flight request observes either the old or the new state, never a torn
//! pair. Ordering between concurrent setters is the caller's problem.

use std::sync::RwLock;

use secrecy::{ExposeSecret, SecretString};

/// Point-in-time view of the credential state, taken once per request.
#[derive(Clone, Default)]
pub struct CredentialSnapshot {
    pub access_token: Option<SecretString>,
    pub account_type: Option<String>,
}

impl CredentialSnapshot {
    /// The raw token value, if any.
    pub fn token(&self) -> Option<&str> {
        self.access_token.as_ref().map(|t| t.expose_secret())
    }
}

impl std::fmt::Debug for CredentialSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSnapshot")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<redacted>"),
            )
            .field("account_type", &self.account_type)
            .finish()
    }
}

/// Mutable credential store shared by concurrent requests.
#[derive(Default)]
pub struct Credentials {
    state: RwLock<CredentialSnapshot>,
}

impl Credentials {
    pub fn new(access_token: Option<String>, account_type: Option<String>) -> Self {
        Self {
            state: RwLock::new(CredentialSnapshot {
                access_token: access_token.map(SecretString::from),
                account_type,
            }),
        }
    }

    pub fn set_access_token(&self, token: Option<String>) {
        let mut state = self.write_lock();
        state.access_token = token.map(SecretString::from);
    }

    pub fn set_account_type(&self, account_type: Option<String>) {
        let mut state = self.write_lock();
        state.account_type = account_type;
    }

    pub fn snapshot(&self) -> CredentialSnapshot {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, CredentialSnapshot> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("state", &self.snapshot())
            .finish()
    }
}
