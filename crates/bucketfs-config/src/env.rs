use regex::{Captures, Regex};
use std::env;

use crate::ConfigError;

/// Interpolate environment variables in a string.
///
/// `${VAR_NAME}` is replaced with the variable's value and
/// `${VAR_NAME:-fallback}` falls back to `fallback` when the variable is unset.
/// Every unset variable without a fallback is reported at once.
pub fn interpolate_env(input: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
        .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;

    let mut missing = Vec::new();

    let result = re.replace_all(input, |cap: &Captures| {
        let var_name = &cap[1];
        match (env::var(var_name), cap.get(2)) {
            (Ok(value), _) => value,
            (Err(_), Some(fallback)) => fallback.as_str().to_string(),
            (Err(_), None) => {
                if !missing.iter().any(|m| m == var_name) {
                    missing.push(var_name.to_string());
                }
                String::new()
            }
        }
    });

    if !missing.is_empty() {
        return Err(ConfigError::MissingEnvVars(missing));
    }

    Ok(result.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_env() {
        env::set_var("BFS_TEST_BUCKET", "gs://photos");
        env::set_var("BFS_TEST_REGION", "eu-west-1");

        let input = "bucket: ${BFS_TEST_BUCKET}\nregion: ${BFS_TEST_REGION}";
        let result = interpolate_env(input).unwrap();
        assert_eq!(result, "bucket: gs://photos\nregion: eu-west-1");
    }

    #[test]
    fn test_interpolate_env_missing() {
        let input = "token: ${BFS_MISSING_VAR_12345}";
        match interpolate_env(input) {
            Err(ConfigError::MissingEnvVars(vars)) => {
                assert_eq!(vars, vec!["BFS_MISSING_VAR_12345"]);
            }
            other => panic!("Expected MissingEnvVars error, got {:?}", other),
        }
    }

    #[test]
    fn test_interpolate_env_missing_reported_once() {
        let input = "${BFS_MISSING_TWICE_12345} ${BFS_MISSING_TWICE_12345} ${BFS_MISSING_OTHER_12345}";
        match interpolate_env(input) {
            Err(ConfigError::MissingEnvVars(vars)) => {
                assert_eq!(
                    vars,
                    vec!["BFS_MISSING_TWICE_12345", "BFS_MISSING_OTHER_12345"]
                );
            }
            other => panic!("Expected MissingEnvVars error, got {:?}", other),
        }
    }

    #[test]
    fn test_interpolate_env_fallback_used_when_unset() {
        let input = "ttl: ${BFS_UNSET_TTL_12345:-1s}";
        assert_eq!(interpolate_env(input).unwrap(), "ttl: 1s");
    }

    #[test]
    fn test_interpolate_env_fallback_ignored_when_set() {
        env::set_var("BFS_SET_TTL", "5s");
        let input = "ttl: ${BFS_SET_TTL:-1s}";
        assert_eq!(interpolate_env(input).unwrap(), "ttl: 5s");
    }

    #[test]
    fn test_interpolate_env_empty_fallback() {
        let input = "[${BFS_UNSET_EMPTY_12345:-}]";
        assert_eq!(interpolate_env(input).unwrap(), "[]");
    }

    #[test]
    fn test_interpolate_env_no_vars() {
        let input = "bucket: file:///srv/data";
        assert_eq!(interpolate_env(input).unwrap(), input);
    }

    #[test]
    fn test_interpolate_env_partial_syntax_not_matched() {
        let input = "not a $VAR variable, nor ${VAR unclosed";
        assert_eq!(interpolate_env(input).unwrap(), input);
    }

    #[test]
    fn test_interpolate_env_adjacent_vars() {
        env::set_var("BFS_VAR_A", "gs://");
        env::set_var("BFS_VAR_B", "bucket");
        assert_eq!(
            interpolate_env("${BFS_VAR_A}${BFS_VAR_B}").unwrap(),
            "gs://bucket"
        );
    }

    #[test]
    fn test_interpolate_env_special_chars_in_value() {
        env::set_var("BFS_SPECIAL_VAR", "ya29.$abc/def==");
        assert_eq!(
            interpolate_env("${BFS_SPECIAL_VAR}").unwrap(),
            "ya29.$abc/def=="
        );
    }
}
