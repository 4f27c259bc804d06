//! Secret references.
//!
//! Credential values in `config.toml` may point at secrets stored outside the
//! file:
//!
//! - `pass::path/in/store` runs `pass show path/in/store` and keeps the first line
//! - `env::VAR_NAME` reads `$VAR_NAME`
//! - anything else is used as-is

use crate::error::{ClientError, ClientResult};

/// A parsed credential value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretRef<'a> {
    /// Entry in the `pass` password store.
    Pass(&'a str),
    /// Environment variable.
    Env(&'a str),
    /// Inline value.
    Plain(&'a str),
}

impl<'a> SecretRef<'a> {
    /// Parses a raw config value.
    pub fn parse(value: &'a str) -> Self {
        if let Some(path) = value.strip_prefix("pass::") {
            Self::Pass(path)
        } else if let Some(var) = value.strip_prefix("env::") {
            Self::Env(var)
        } else {
            Self::Plain(value)
        }
    }

    /// Returns true if the value is stored outside the config file.
    pub fn is_reference(&self) -> bool {
        !matches!(self, Self::Plain(_))
    }

    /// Looks the secret up.
    pub fn resolve(&self) -> ClientResult<String> {
        match *self {
            Self::Pass(path) => resolve_pass(path),
            Self::Env(var) => std::env::var(var).map_err(|_| {
                ClientError::Secret(format!("environment variable `{}` is not set", var))
            }),
            Self::Plain(value) => Ok(value.to_string()),
        }
    }
}

/// Resolves a config value that may be a secret reference.
pub fn resolve(value: &str) -> ClientResult<String> {
    SecretRef::parse(value).resolve()
}

/// Masks inline secrets so they can be printed. References are kept.
pub fn redact(value: &str) -> String {
    if value.is_empty() || SecretRef::parse(value).is_reference() {
        value.to_string()
    } else {
        "<redacted>".to_string()
    }
}

fn resolve_pass(path: &str) -> ClientResult<String> {
    let output = std::process::Command::new("pass")
        .arg("show")
        .arg(path)
        .output()
        .map_err(|e| ClientError::Secret(format!("failed to run `pass show {}`: {}", path, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ClientError::Secret(format!(
            "`pass show {}` failed ({}): {}",
            path,
            output.status,
            stderr.trim()
        )));
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(str::to_string)
        .ok_or_else(|| ClientError::Secret(format!("`pass show {}` produced no output", path)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_prefixes() {
        assert_eq!(SecretRef::parse("pass::calpanel/token"), SecretRef::Pass("calpanel/token"));
        assert_eq!(SecretRef::parse("env::GOOGLE_CLIENT_ID"), SecretRef::Env("GOOGLE_CLIENT_ID"));
        assert_eq!(
            SecretRef::parse("xxx.apps.googleusercontent.com"),
            SecretRef::Plain("xxx.apps.googleusercontent.com")
        );
        assert!(!SecretRef::parse("env:FOO").is_reference());
    }

    #[test]
    fn plain_text_passthrough() {
        assert_eq!(resolve("hello").unwrap(), "hello");
        assert_eq!(resolve("").unwrap(), "");
    }

    #[test]
    fn env_prefix_resolves() {
        unsafe {
            std::env::set_var("_CALPANEL_TEST_SECRET", "my-secret-value");
        }
        assert_eq!(resolve("env::_CALPANEL_TEST_SECRET").unwrap(), "my-secret-value");
        unsafe {
            std::env::remove_var("_CALPANEL_TEST_SECRET");
        }
    }

    #[test]
    fn env_prefix_missing_var_errors() {
        let err = resolve("env::_CALPANEL_NONEXISTENT_VAR_12345").unwrap_err();
        assert!(matches!(err, ClientError::Secret(_)));
        assert!(err.to_string().contains("not set"));
    }

    #[test]
    fn pass_prefix_unknown_entry_errors() {
        // Fails whether or not `pass` is installed.
        assert!(resolve("pass::nonexistent/entry/that/should/not/exist/12345").is_err());
    }

    #[test]
    fn redact_hides_inline_values_only() {
        assert_eq!(redact("1//0g-refresh"), "<redacted>");
        assert_eq!(redact("env::GOOGLE_CLIENT_SECRET"), "env::GOOGLE_CLIENT_SECRET");
        assert_eq!(redact("pass::calpanel/refresh"), "pass::calpanel/refresh");
        assert_eq!(redact(""), "");
    }
}
