use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Failure while expanding placeholders in the raw config text
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExpandError {
    #[error("line {line}: environment variable `{name}` is not set and has no default")]
    MissingVar { line: usize, name: String },
    #[error("line {line}: only `env.` placeholders are supported, found `{key}`")]
    UnsupportedScope { line: usize, key: String },
}

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // `{{ env.NAME }}` or `{{ env.NAME | default("value") }}`
    RE.get_or_init(|| {
        Regex::new(r#"\{\{\s*([A-Za-z0-9_.]+)\s*(?:\|\s*default\("([^"]*)"\))?\s*\}\}"#).expect("valid placeholder regex")
    })
}

/// Substitute `{{ env.NAME }}` placeholders before the TOML is parsed
///
/// Keeps API keys out of the config file itself. Commented lines are left
/// alone so a disabled provider does not require its variable to be set.
pub fn expand_env(input: &str) -> Result<String, ExpandError> {
    let mut lines = Vec::new();

    for (index, line) in input.lines().enumerate() {
        if line.trim_start().starts_with('#') || !line.contains("{{") {
            lines.push(line.to_owned());
            continue;
        }

        let mut failure = None;
        let expanded = placeholder().replace_all(line, |caps: &Captures<'_>| {
            match resolve(&caps[1], caps.get(2).map(|m| m.as_str()), index + 1) {
                Ok(value) => value,
                Err(e) => {
                    failure.get_or_insert(e);
                    String::new()
                }
            }
        });

        if let Some(e) = failure {
            return Err(e);
        }

        lines.push(expanded.into_owned());
    }

    let mut output = lines.join("\n");
    if input.ends_with('\n') {
        output.push('\n');
    }

    Ok(output)
}

fn resolve(key: &str, default: Option<&str>, line: usize) -> Result<String, ExpandError> {
    let Some(name) = key.strip_prefix("env.").filter(|name| !name.contains('.')) else {
        return Err(ExpandError::UnsupportedScope {
            line,
            key: key.to_owned(),
        });
    };

    match (std::env::var(name), default) {
        (Ok(value), _) => Ok(value),
        (Err(_), Some(default)) => Ok(default.to_owned()),
        (Err(_), None) => Err(ExpandError::MissingVar {
            line,
            name: name.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_without_placeholders_is_untouched() {
        let input = "[generation]\ndefault_provider = \"gemini\"\n";
        assert_eq!(expand_env(input).unwrap(), input);
    }

    #[test]
    fn expands_api_keys() {
        let vars = [("ATELIER_TEST_GEMINI", Some("g-key")), ("ATELIER_TEST_OPENAI", Some("o-key"))];
        temp_env::with_vars(vars, || {
            let input = "a = \"{{ env.ATELIER_TEST_GEMINI }}\"\nb = \"{{env.ATELIER_TEST_OPENAI}}\"";
            assert_eq!(expand_env(input).unwrap(), "a = \"g-key\"\nb = \"o-key\"");
        });
    }

    #[test]
    fn missing_variable_reports_line() {
        temp_env::with_var_unset("ATELIER_TEST_MISSING", || {
            let err = expand_env("x = 1\nkey = \"{{ env.ATELIER_TEST_MISSING }}\"").unwrap_err();
            assert_eq!(
                err,
                ExpandError::MissingVar {
                    line: 2,
                    name: "ATELIER_TEST_MISSING".to_owned()
                }
            );
        });
    }

    #[test]
    fn default_applies_only_when_unset() {
        temp_env::with_var_unset("ATELIER_TEST_OPTIONAL", || {
            let out = expand_env("k = \"{{ env.ATELIER_TEST_OPTIONAL | default(\"fallback\") }}\"").unwrap();
            assert_eq!(out, "k = \"fallback\"");
        });

        temp_env::with_var("ATELIER_TEST_OPTIONAL", Some("set"), || {
            let out = expand_env("k = \"{{ env.ATELIER_TEST_OPTIONAL | default(\"fallback\") }}\"").unwrap();
            assert_eq!(out, "k = \"set\"");
        });
    }

    #[test]
    fn empty_default_is_allowed() {
        temp_env::with_var_unset("ATELIER_TEST_OPTIONAL", || {
            let out = expand_env("k = \"{{ env.ATELIER_TEST_OPTIONAL | default(\"\") }}\"").unwrap();
            assert_eq!(out, "k = \"\"");
        });
    }

    #[test]
    fn other_scopes_are_rejected() {
        let err = expand_env("k = \"{{ secrets.KEY }}\"").unwrap_err();
        assert!(matches!(err, ExpandError::UnsupportedScope { line: 1, .. }));
    }

    #[test]
    fn comments_are_not_expanded() {
        temp_env::with_var_unset("ATELIER_TEST_MISSING", || {
            let input = "  # api_key = \"{{ env.ATELIER_TEST_MISSING }}\"";
            assert_eq!(expand_env(input).unwrap(), input);
        });
    }
}
