//! Random secrets for the accounts created on a new host.

use std::fmt;

use rand::Rng;
use rand::distr::Alphanumeric;

/// Length of every generated account secret.
pub const SECRET_LENGTH: usize = 20;

/// Produce `length` characters drawn uniformly from `[A-Za-z0-9]`.
///
/// Each call uses the thread-local generator, so callers never share or see
/// seed state. A `length` of zero yields an empty string.
#[must_use]
pub fn generate(length: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// An account name paired with the secret generated for it during this run.
///
/// `Debug` redacts the secret so credentials never leak into logs.
#[derive(Clone, PartialEq, Eq)]
pub struct GeneratedCredential {
    pub account: String,
    secret: String,
}

impl GeneratedCredential {
    /// Generate a fresh secret for `account`.
    #[must_use]
    pub fn for_account(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            secret: generate(SECRET_LENGTH),
        }
    }

    #[must_use]
    pub fn new(account: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            secret: secret.into(),
        }
    }

    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// `account:secret` line in the format `chpasswd` reads from stdin.
    #[must_use]
    pub fn chpasswd_line(&self) -> String {
        format!("{}:{}\n", self.account, self.secret)
    }
}

impl fmt::Debug for GeneratedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedCredential")
            .field("account", &self.account)
            .field("secret", &"<redacted>")
            .finish()
    }
}
