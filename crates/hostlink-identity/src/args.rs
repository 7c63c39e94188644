//! Launch arguments relevant to login.
//!
//! Launchers pass auth parameters on the command line as `KEY=VALUE`
//! pairs, optionally with a leading dash (`-AUTH_TYPE=exchangecode`).
//! Keys are matched case-insensitively; bare flags without `=` are kept
//! with an empty value.

use std::collections::BTreeMap;

use hostlink_backend::Credentials;

/// Key selecting the auto-login flow.
pub const AUTH_TYPE: &str = "AUTH_TYPE";
/// Key carrying the login id for the auto-login flow.
pub const AUTH_LOGIN: &str = "AUTH_LOGIN";
/// Key carrying the secret for the auto-login flow.
pub const AUTH_PASSWORD: &str = "AUTH_PASSWORD";

/// Parsed `KEY=VALUE` launch parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchArgs {
    params: BTreeMap<String, String>,
}

impl LaunchArgs {
    /// Parses an argument list. Anything that isn't `KEY=VALUE` or a flag
    /// (positional arguments, empty strings) is skipped.
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut params = BTreeMap::new();
        for arg in args {
            let arg = arg.as_ref();
            let Some(stripped) = arg.strip_prefix('-') else {
                if let Some((key, value)) = arg.split_once('=') {
                    insert(&mut params, key, value);
                }
                continue;
            };
            let stripped = stripped.trim_start_matches('-');
            match stripped.split_once('=') {
                Some((key, value)) => insert(&mut params, key, value),
                None => insert(&mut params, stripped, ""),
            }
        }
        Self { params }
    }

    /// Parses the current process's arguments, skipping the program name.
    pub fn from_env() -> Self {
        Self::parse(std::env::args().skip(1))
    }

    /// Value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .get(&key.to_ascii_uppercase())
            .map(String::as_str)
    }

    /// Sets a parameter. Mostly useful in tests and demos.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.insert(key.to_ascii_uppercase(), value.into());
        self
    }

    /// The auto-login flow, if one was passed and is non-empty.
    pub fn auth_type(&self) -> Option<&str> {
        self.get(AUTH_TYPE).filter(|value| !value.is_empty())
    }

    /// Credentials assembled from `AUTH_TYPE`, `AUTH_LOGIN` and
    /// `AUTH_PASSWORD`. This is what a backend's auto-login reads.
    pub fn credentials(&self) -> Option<Credentials> {
        let kind = self.auth_type()?;
        Some(Credentials {
            kind: kind.to_string(),
            id: self.get(AUTH_LOGIN).unwrap_or_default().to_string(),
            token: self.get(AUTH_PASSWORD).unwrap_or_default().to_string(),
        })
    }

    /// Returns `true` if nothing was parsed.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

fn insert(params: &mut BTreeMap<String, String>, key: &str, value: &str) {
    let key = key.trim();
    if key.is_empty() {
        return;
    }
    params.insert(key.to_ascii_uppercase(), value.to_string());
}
