//! Trading account identity and credentials.
//!
//! `AccountCredentials` carries everything needed to open a session to the
//! remote quote server. The password never leaves the crate: it is readable
//! only by the adapter's connect path and is redacted from `Debug` output.
//! Everything else the adapter logs or reports goes through `AccountLabel`.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of a trading account, used for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(i64);

impl AccountId {
    /// Create a new account identifier.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Get the raw identifier.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for AccountId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Identifier for one session opened by the adapter.
///
/// A new one is generated on every connect so disconnect events can be
/// correlated with the session that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new unique session identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The diagnostic identity of an account: everything but the secret.
///
/// Displays as `[{account_id}]({display_name}) {login}`, the prefix used in
/// connect errors and log lines.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountLabel {
    /// Account identifier.
    pub account_id: AccountId,
    /// Human readable account name.
    pub display_name: String,
    /// Numeric login on the quote server.
    pub login: i32,
}

impl fmt::Display for AccountLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]({}) {}", self.account_id, self.display_name, self.login)
    }
}

/// Credentials for a quote-server session. Immutable after construction.
#[derive(Clone, PartialEq, Eq)]
pub struct AccountCredentials {
    account_id: AccountId,
    login: i32,
    password: String,
    host: String,
    port: u16,
    display_name: String,
}

impl AccountCredentials {
    /// Create a new credential set.
    #[must_use]
    pub fn new(
        account_id: AccountId,
        login: i32,
        password: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            account_id,
            login,
            password: password.into(),
            host: host.into(),
            port,
            display_name: display_name.into(),
        }
    }

    /// Account identifier.
    #[must_use]
    pub const fn account_id(&self) -> AccountId {
        self.account_id
    }

    /// Numeric login.
    #[must_use]
    pub const fn login(&self) -> i32 {
        self.login
    }

    /// Quote server host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Quote server port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Display name of the account.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    /// The loggable identity of this account.
    #[must_use]
    pub fn label(&self) -> AccountLabel {
        AccountLabel {
            account_id: self.account_id,
            display_name: self.display_name.clone(),
            login: self.login,
        }
    }
}

impl fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountCredentials")
            .field("account_id", &self.account_id)
            .field("login", &self.login)
            .field("password", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("display_name", &self.display_name)
            .finish()
    }
}
