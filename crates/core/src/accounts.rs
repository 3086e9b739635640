//! Staff accounts.
//!
//! Passwords are stored as argon2 PHC strings. The binaries call
//! [`AccountService::bootstrap_default_admin`] on start-up so a fresh data directory always has
//! one administrator; token issuance is left to whatever fronts the service.

use crate::store::{Record, RecordStore};
use crate::{ClinicError, ClinicResult};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{self, PasswordHasher, SaltString};
use argon2::{Argon2, PasswordHash, PasswordVerifier};
use chrono::{DateTime, Utc};
use clinic_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => f.write_str("admin"),
            Role::Staff => f.write_str("staff"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: u64,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Record for UserAccount {
    const KIND: &'static str = "User";

    fn id(&self) -> u64 {
        self.id
    }
    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
    fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.created_at = at;
    }
    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

/// Result of [`AccountService::bootstrap_default_admin`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Created,
    AlreadyPresent,
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn RecordStore<UserAccount>>,
}

impl AccountService {
    pub fn new(store: Arc<dyn RecordStore<UserAccount>>) -> Self {
        Self { store }
    }

    pub fn find_by_username(&self, username: &str) -> ClinicResult<Option<UserAccount>> {
        let username = username.trim();
        Ok(self
            .store
            .find_many(&|u: &UserAccount| u.username == username)?
            .into_iter()
            .next())
    }

    /// Creates an account with a freshly salted argon2 hash.
    ///
    /// # Errors
    ///
    /// - [`ClinicError::Text`] if the username is blank
    /// - [`ClinicError::InvalidInput`] if the password is blank
    /// - [`ClinicError::UserExists`] if the username is taken
    pub fn register(&self, username: &str, password: &str, role: Role) -> ClinicResult<UserAccount> {
        let username = NonEmptyText::new(username)?;
        if password.trim().is_empty() {
            return Err(ClinicError::InvalidInput("password cannot be empty".into()));
        }
        if self.find_by_username(username.as_str())?.is_some() {
            return Err(ClinicError::UserExists(username.into_string()));
        }

        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        let account = self.store.create(UserAccount {
            id: 0,
            username: username.into_string(),
            password_hash: hash_password(password)?,
            role,
            created_at: epoch,
            updated_at: epoch,
            version: 0,
        })?;
        tracing::info!(id = account.id, username = %account.username, role = %account.role, "account registered");
        Ok(account)
    }

    /// Ensures an administrator named `username` exists. Safe to call on every start-up; an
    /// existing account is left untouched, including its password.
    pub fn bootstrap_default_admin(
        &self,
        username: &str,
        password: &str,
    ) -> ClinicResult<BootstrapOutcome> {
        if self.find_by_username(username)?.is_some() {
            tracing::debug!(username, "default administrator already present");
            return Ok(BootstrapOutcome::AlreadyPresent);
        }
        self.register(username, password, Role::Admin)?;
        tracing::info!(username, "default administrator created");
        Ok(BootstrapOutcome::Created)
    }

    /// # Errors
    ///
    /// Returns [`ClinicError::InvalidCredentials`] for an unknown user or a wrong password; the
    /// two cases produce the same error.
    pub fn verify_credentials(&self, username: &str, password: &str) -> ClinicResult<UserAccount> {
        let account = self
            .find_by_username(username)?
            .ok_or(ClinicError::InvalidCredentials)?;
        let parsed = PasswordHash::new(&account.password_hash)
            .map_err(|e| ClinicError::PasswordHash(e.to_string()))?;
        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(account),
            Err(password_hash::Error::Password) => Err(ClinicError::InvalidCredentials),
            Err(e) => Err(ClinicError::PasswordHash(e.to_string())),
        }
    }
}

fn hash_password(password: &str) -> ClinicResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ClinicError::PasswordHash(e.to_string()))
}
