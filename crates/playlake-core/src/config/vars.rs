//! Environment variable interpolation for config files.
//!
//! Credentials are usually referenced from the environment rather than
//! written into the config file. Interpolation happens once, on the raw file
//! text, so the resulting `Config` value is the only carrier of secrets for
//! the rest of the run.
//!
//! Supported syntax:
//! - `$VAR` or `${VAR}` - substitute with env var value, error if missing
//! - `${VAR:-default}` - use default if VAR is unset OR empty
//! - `${VAR-default}` - use default only if VAR is unset (empty is OK)
//! - `$$` - escape sequence for literal `$`

use regex::{Captures, Regex};
use std::env;
use std::sync::LazyLock;

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \$\$                           # escaped dollar
        |
        \$\{
            ([A-Za-z_][A-Za-z0-9_]*)   # 1: braced name
            (?:(:?-)([^}]*))?          # 2: default operator, 3: default value
        \}
        |
        \$([A-Za-z_][A-Za-z0-9_]*)     # 4: bare name
        ",
    )
    .expect("Invalid regex pattern")
});

/// Result of environment variable interpolation.
#[derive(Debug)]
pub struct InterpolationResult {
    /// The interpolated text.
    pub text: String,
    /// Any errors encountered during interpolation.
    pub errors: Vec<String>,
}

impl InterpolationResult {
    /// Returns true if there were no errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// How a `${VAR...}` reference falls back when the variable is missing.
#[derive(Debug, Clone, Copy)]
enum Fallback<'a> {
    /// No default, missing variable is an error.
    None,
    /// `${VAR-default}`: default only when unset.
    Unset(&'a str),
    /// `${VAR:-default}`: default when unset or empty.
    UnsetOrEmpty(&'a str),
}

impl<'a> Fallback<'a> {
    fn from_captures(caps: &Captures<'a>) -> Self {
        let default = caps.get(3).map(|m| m.as_str()).unwrap_or("");
        match caps.get(2).map(|m| m.as_str()) {
            Some(":-") => Fallback::UnsetOrEmpty(default),
            Some(_) => Fallback::Unset(default),
            None => Fallback::None,
        }
    }
}

/// Resolve one variable reference. `Err` carries the message to report.
fn resolve(name: &str, fallback: Fallback<'_>) -> Result<String, String> {
    match (env::var(name), fallback) {
        (Ok(value), _) if value.contains('\n') || value.contains('\r') => Err(format!(
            "environment variable '{name}' contains newlines, which is not allowed"
        )),
        (Ok(value), Fallback::UnsetOrEmpty(default)) if value.is_empty() => Ok(default.to_string()),
        (Ok(value), _) => Ok(value),
        (Err(_), Fallback::Unset(default) | Fallback::UnsetOrEmpty(default)) => {
            Ok(default.to_string())
        }
        (Err(_), Fallback::None) => Err(format!("environment variable '{name}' is not set")),
    }
}

/// Interpolate environment variables in the given text.
///
/// All errors are accumulated so the user can see every missing variable at
/// once. References that failed are left in the text verbatim.
pub fn interpolate(input: &str) -> InterpolationResult {
    let mut errors = Vec::new();

    let text = ENV_VAR_PATTERN
        .replace_all(input, |caps: &Captures| {
            let whole = &caps[0];
            if whole == "$$" {
                return "$".to_string();
            }

            let name = caps
                .get(1)
                .or_else(|| caps.get(4))
                .map(|m| m.as_str())
                .unwrap_or("");

            match resolve(name, Fallback::from_captures(caps)) {
                Ok(value) => value,
                Err(message) => {
                    errors.push(message);
                    whole.to_string()
                }
            }
        })
        .into_owned();

    InterpolationResult { text, errors }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_env_vars<F, R>(vars: &[(&str, Option<&str>)], f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let originals: Vec<_> = vars.iter().map(|(k, _)| (*k, env::var(k).ok())).collect();

        // SAFETY: each test uses variable names no other test touches.
        for (key, value) in vars {
            match value {
                Some(v) => unsafe { env::set_var(key, v) },
                None => unsafe { env::remove_var(key) },
            }
        }

        let result = f();

        // SAFETY: restoring the state captured above.
        for (key, original) in originals {
            match original {
                Some(v) => unsafe { env::set_var(key, v) },
                None => unsafe { env::remove_var(key) },
            }
        }

        result
    }

    #[test]
    fn test_bare_and_braced_substitution() {
        with_env_vars(&[("PLAYLAKE_TEST_KEY_ID", Some("AKIA123"))], || {
            let result = interpolate("a: $PLAYLAKE_TEST_KEY_ID\nb: ${PLAYLAKE_TEST_KEY_ID}");
            assert!(result.is_ok());
            assert_eq!(result.text, "a: AKIA123\nb: AKIA123");
        });
    }

    #[test]
    fn test_missing_variables_are_all_reported() {
        with_env_vars(
            &[
                ("PLAYLAKE_TEST_MISSING_A", None),
                ("PLAYLAKE_TEST_MISSING_B", None),
            ],
            || {
                let result = interpolate("$PLAYLAKE_TEST_MISSING_A ${PLAYLAKE_TEST_MISSING_B}");
                assert_eq!(result.errors.len(), 2);
                assert!(result.errors[0].contains("PLAYLAKE_TEST_MISSING_A"));
                assert!(result.errors[1].contains("not set"));
                assert_eq!(
                    result.text,
                    "$PLAYLAKE_TEST_MISSING_A ${PLAYLAKE_TEST_MISSING_B}"
                );
            },
        );
    }

    #[test]
    fn test_default_when_unset() {
        with_env_vars(&[("PLAYLAKE_TEST_UNSET", None)], || {
            let result = interpolate("${PLAYLAKE_TEST_UNSET:-us-west-2} ${PLAYLAKE_TEST_UNSET-x}");
            assert!(result.is_ok());
            assert_eq!(result.text, "us-west-2 x");
        });
    }

    #[test]
    fn test_empty_value_defaults_only_with_colon() {
        with_env_vars(&[("PLAYLAKE_TEST_EMPTY", Some(""))], || {
            let result = interpolate("[${PLAYLAKE_TEST_EMPTY:-d}] [${PLAYLAKE_TEST_EMPTY-d}]");
            assert!(result.is_ok());
            assert_eq!(result.text, "[d] []");
        });
    }

    #[test]
    fn test_newline_injection_rejected() {
        with_env_vars(&[("PLAYLAKE_TEST_NEWLINE", Some("a\nb: c"))], || {
            let result = interpolate("key: $PLAYLAKE_TEST_NEWLINE");
            assert!(!result.is_ok());
            assert!(result.errors[0].contains("newlines"));
        });
    }

    #[test]
    fn test_escape_sequence() {
        let result = interpolate("secret: pa$$word");
        assert!(result.is_ok());
        assert_eq!(result.text, "secret: pa$word");
    }
}
