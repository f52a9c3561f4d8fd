use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use pgwire::api::auth::{AuthSource, LoginInfo, Password};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};

use crate::limits::MAX_USER_NAME_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Admin => f.write_str("admin"),
        }
    }
}

/// A verified requester and the role claim that came with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user: String,
    pub role: Role,
}

impl Identity {
    pub fn new(user: impl Into<String>, role: Role) -> Self {
        Self {
            user: user.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone)]
struct Account {
    password: String,
    role: Role,
}

/// Static credential table standing in for the external identity provider.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    accounts: HashMap<String, Account>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: &str, password: &str, role: Role) -> Self {
        self.accounts.insert(
            user.to_string(),
            Account {
                password: password.to_string(),
                role,
            },
        );
        self
    }

    /// Parse `name:password:role` entries separated by commas.
    pub fn parse(spec: &str) -> Result<Self, String> {
        let mut dir = Self::new();
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            // Passwords may contain ':'; the name and role may not.
            let Some((user, password, role)) = entry
                .split_once(':')
                .and_then(|(user, rest)| rest.rsplit_once(':').map(|(pw, role)| (user, pw, role)))
            else {
                return Err(format!("bad user entry {entry:?}: expected name:password:role"));
            };
            if user.is_empty() || user.len() > MAX_USER_NAME_LEN {
                return Err(format!("bad user name in entry {entry:?}"));
            }
            if dir.accounts.contains_key(user) {
                return Err(format!("duplicate user: {user}"));
            }
            dir = dir.with_user(user, password, role.parse()?);
        }
        if dir.accounts.is_empty() {
            return Err("no users configured".into());
        }
        Ok(dir)
    }

    pub fn identity(&self, user: &str) -> Option<Identity> {
        self.accounts
            .get(user)
            .map(|acct| Identity::new(user, acct.role))
    }

    fn password(&self, user: &str) -> Option<&str> {
        self.accounts.get(user).map(|acct| acct.password.as_str())
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[derive(Debug)]
pub struct HallbookAuthSource {
    directory: Arc<UserDirectory>,
}

impl HallbookAuthSource {
    pub fn new(directory: Arc<UserDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl AuthSource for HallbookAuthSource {
    async fn get_password(&self, login: &LoginInfo) -> PgWireResult<Password> {
        let user = login.user().unwrap_or_default();
        match self.directory.password(user) {
            Some(pw) => Ok(Password::new(None, pw.as_bytes().to_vec())),
            None => {
                tracing::warn!(user, "login for unknown user");
                metrics::counter!(crate::observability::AUTH_FAILURES_TOTAL).increment(1);
                Err(PgWireError::UserError(Box::new(ErrorInfo::new(
                    "FATAL".into(),
                    "28P01".into(),
                    format!("password authentication failed for user \"{user}\""),
                ))))
            }
        }
    }
}
