use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BackdateError, Result};

/// Optional tuning file in the repository directory.
pub const CONFIG_FILE: &str = "backdate.toml";
/// Optional dotenv file in the repository directory.
pub const DOTENV_FILE: &str = ".env";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_min_step_minutes")]
    pub min_step_minutes: u32,
    #[serde(default = "default_max_step_minutes")]
    pub max_step_minutes: u32,
    #[serde(default = "default_rest_day")]
    pub rest_day: Weekday,
    #[serde(default = "default_rest_day_keep_percent")]
    pub rest_day_keep_percent: u8,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            min_step_minutes: default_min_step_minutes(),
            max_step_minutes: default_max_step_minutes(),
            rest_day: default_rest_day(),
            rest_day_keep_percent: default_rest_day_keep_percent(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_payload_file")]
    pub payload_file: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            payload_file: default_payload_file(),
        }
    }
}

impl Config {
    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason for the first violated constraint.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let s = &self.schedule;
        if s.min_step_minutes == 0 {
            return Err("schedule.min_step_minutes must be at least 1".to_string());
        }
        if s.min_step_minutes > s.max_step_minutes {
            return Err(format!(
                "schedule.min_step_minutes ({}) exceeds schedule.max_step_minutes ({})",
                s.min_step_minutes, s.max_step_minutes
            ));
        }
        // A longer step could jump past the stop day in one draw.
        if s.max_step_minutes > MAX_STEP_CEILING {
            return Err(format!(
                "schedule.max_step_minutes must not exceed {MAX_STEP_CEILING}"
            ));
        }
        // Zero would stall forever on a late rest-day eve: every step lands
        // on the rest day and none is kept.
        if !(1..=100).contains(&s.rest_day_keep_percent) {
            return Err("schedule.rest_day_keep_percent must be between 1 and 100".to_string());
        }

        let file = &self.store.payload_file;
        let plain = file.components().count() == 1
            && matches!(file.components().next(), Some(Component::Normal(_)));
        if !plain {
            return Err(format!(
                "store.payload_file must be a plain file name, got {}",
                file.display()
            ));
        }
        Ok(())
    }
}

/// Load `backdate.toml` from `repo_dir`, or defaults if it does not exist.
///
/// # Errors
///
/// Returns [`BackdateError::InvalidConfiguration`] if the file cannot be read,
/// parsed, or validated.
pub fn load_config(repo_dir: &Path) -> Result<Config> {
    let path = repo_dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(Config::default());
    }

    let invalid = |reason: String| BackdateError::InvalidConfiguration {
        path: path.clone(),
        reason,
    };

    let content = std::fs::read_to_string(&path).map_err(|err| invalid(err.to_string()))?;
    let config = toml::from_str::<Config>(&content).map_err(|err| invalid(err.to_string()))?;
    config.validate().map_err(invalid)?;

    debug!(path = %path.display(), "loaded configuration");
    Ok(config)
}

/// Pre-load `.env` from `repo_dir` into the process environment.
///
/// Variables already set in the environment win. Returns the loaded path, or
/// `None` when there is no `.env` file.
///
/// # Errors
///
/// Returns [`BackdateError::InvalidConfiguration`] if the file is malformed.
pub fn load_dotenv(repo_dir: &Path) -> Result<Option<PathBuf>> {
    let path = repo_dir.join(DOTENV_FILE);
    if !path.is_file() {
        return Ok(None);
    }

    let invalid = |reason: String| BackdateError::InvalidConfiguration {
        path: path.clone(),
        reason,
    };

    let content = std::fs::read_to_string(&path).map_err(|err| invalid(err.to_string()))?;
    let normalized = quote_bare_values(&content);
    dotenvy::from_read(normalized.as_bytes()).map_err(|err| invalid(err.to_string()))?;

    debug!(path = %path.display(), "loaded dotenv file");
    Ok(Some(path))
}

/// Quote unquoted values that contain whitespace so `dotenvy` reads them the
/// way godotenv-style files expect: `NAME=First Last` means `First Last`.
///
/// An unquoted value runs to the end of the line, minus a trailing
/// ` # comment`. Quoted values, including multi-line ones, pass through.
fn quote_bare_values(content: &str) -> String {
    let mut out = String::with_capacity(content.len() + 16);
    let mut open_quote: Option<char> = None;

    for line in content.lines() {
        match open_quote {
            Some(quote) => {
                if closes_quote(line, quote) {
                    open_quote = None;
                }
                out.push_str(line);
            }
            None => out.push_str(&rewrite_line(line, &mut open_quote)),
        }
        out.push('\n');
    }
    out
}

fn rewrite_line<'a>(line: &'a str, open_quote: &mut Option<char>) -> Cow<'a, str> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Cow::Borrowed(line);
    }
    let Some((key, raw)) = line.split_once('=') else {
        return Cow::Borrowed(line);
    };

    let value = raw.trim();
    match value.chars().next() {
        None => Cow::Borrowed(line),
        Some(quote @ ('"' | '\'')) => {
            if !closes_quote(&value[1..], quote) {
                *open_quote = Some(quote);
            }
            Cow::Borrowed(line)
        }
        Some(_) => {
            let value = strip_inline_comment(value);
            if value.contains(char::is_whitespace) {
                Cow::Owned(format!("{}={}", key.trim_end(), quote_value(value)))
            } else {
                Cow::Borrowed(line)
            }
        }
    }
}

/// `true` if `text` contains an unescaped `quote`.
fn closes_quote(text: &str, quote: char) -> bool {
    let mut escaped = false;
    for c in text.chars() {
        if escaped {
            escaped = false;
        } else if c == '\\' && quote == '"' {
            escaped = true;
        } else if c == quote {
            return true;
        }
    }
    false
}

fn strip_inline_comment(value: &str) -> &str {
    value
        .char_indices()
        .find(|&(i, c)| c == '#' && value[..i].ends_with(char::is_whitespace))
        .map_or(value, |(i, _)| value[..i].trim_end())
}

/// Single quotes are literal; fall back to escaped double quotes when the
/// value itself holds a `'`.
fn quote_value(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '\\' | '"' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

const MAX_STEP_CEILING: u32 = 720;

const fn default_min_step_minutes() -> u32 {
    60
}

const fn default_max_step_minutes() -> u32 {
    720
}

const fn default_rest_day() -> Weekday {
    Weekday::Sun
}

const fn default_rest_day_keep_percent() -> u8 {
    10
}

fn default_payload_file() -> PathBuf {
    PathBuf::from("file")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_config_uses_defaults() {
        let dir = TempDir::new().expect("temp dir");
        let cfg = load_config(dir.path()).expect("load should succeed");
        assert_eq!(cfg.schedule.min_step_minutes, 60);
        assert_eq!(cfg.schedule.max_step_minutes, 720);
        assert_eq!(cfg.schedule.rest_day, Weekday::Sun);
        assert_eq!(cfg.schedule.rest_day_keep_percent, 10);
        assert_eq!(cfg.store.payload_file, PathBuf::from("file"));
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let dir = TempDir::new().expect("temp dir");
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[schedule]\nrest_day = \"Sat\"\nrest_day_keep_percent = 25\n",
        )
        .expect("write config");

        let cfg = load_config(dir.path()).expect("load should succeed");
        assert_eq!(cfg.schedule.rest_day, Weekday::Sat);
        assert_eq!(cfg.schedule.rest_day_keep_percent, 25);
        assert_eq!(cfg.schedule.min_step_minutes, 60);
        assert_eq!(cfg.store, StoreConfig::default());
    }

    #[test]
    fn inverted_step_range_is_rejected() {
        let dir = TempDir::new().expect("temp dir");
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[schedule]\nmin_step_minutes = 300\nmax_step_minutes = 120\n",
        )
        .expect("write config");

        let err = load_config(dir.path()).expect_err("invalid range");
        assert!(matches!(err, BackdateError::InvalidConfiguration { .. }));
        assert!(err.to_string().contains("backdate.toml"));
    }

    #[test]
    fn zero_keep_percent_is_rejected() {
        let mut cfg = Config::default();
        cfg.schedule.rest_day_keep_percent = 0;
        assert!(cfg.validate().is_err());
        cfg.schedule.rest_day_keep_percent = 100;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn step_ceiling_is_enforced() {
        let mut cfg = Config::default();
        cfg.schedule.max_step_minutes = 721;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn payload_file_must_be_plain_name() {
        let mut cfg = Config::default();
        for bad in ["../escape", "/abs/file", "nested/file", ""] {
            cfg.store.payload_file = PathBuf::from(bad);
            assert!(cfg.validate().is_err(), "{bad} should be rejected");
        }
        cfg.store.payload_file = PathBuf::from("activity.bin");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn malformed_toml_is_invalid_configuration() {
        let dir = TempDir::new().expect("temp dir");
        std::fs::write(dir.path().join(CONFIG_FILE), "[schedule\n").expect("write config");
        assert!(matches!(
            load_config(dir.path()),
            Err(BackdateError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn absent_dotenv_is_not_an_error() {
        let dir = TempDir::new().expect("temp dir");
        assert_eq!(load_dotenv(dir.path()).expect("no file"), None);
    }

    fn parsed(content: &str) -> Vec<(String, String)> {
        dotenvy::from_read_iter(quote_bare_values(content).as_bytes())
            .collect::<std::result::Result<_, _>>()
            .expect("normalized dotenv parses")
    }

    fn pair(key: &str, value: &str) -> (String, String) {
        (key.to_string(), value.to_string())
    }

    #[test]
    fn unquoted_value_with_space_is_kept_whole() {
        assert_eq!(
            parsed("GIT_UNAME=Xavier Milgo\nGIT_EMAIL=x@example.com\n"),
            vec![
                pair("GIT_UNAME", "Xavier Milgo"),
                pair("GIT_EMAIL", "x@example.com"),
            ]
        );
    }

    #[test]
    fn unquoted_value_drops_trailing_comment() {
        assert_eq!(
            parsed("# identity\nGIT_UNAME=Ada King   # full name\n"),
            vec![pair("GIT_UNAME", "Ada King")]
        );
    }

    #[test]
    fn apostrophe_in_bare_value_survives() {
        assert_eq!(
            parsed("GIT_UNAME=Conan O'Brien $HOME\n"),
            vec![pair("GIT_UNAME", "Conan O'Brien $HOME")]
        );
    }

    #[test]
    fn quoted_and_exported_values_pass_through() {
        let content = "export A=\"x y\"\nB='p q'\nC=plain\n";
        assert_eq!(quote_bare_values(content), content);
        assert_eq!(
            parsed(content),
            vec![pair("A", "x y"), pair("B", "p q"), pair("C", "plain")]
        );
    }

    #[test]
    fn multiline_quoted_value_is_not_rewritten() {
        let content = "KEY=\"first line\nsecond = line two\"\nNEXT=a b\n";
        assert_eq!(
            quote_bare_values(content),
            "KEY=\"first line\nsecond = line two\"\nNEXT='a b'\n"
        );
    }

    #[test]
    fn dotenv_with_spaced_name_loads_into_environment() {
        let dir = TempDir::new().expect("temp dir");
        std::fs::write(
            dir.path().join(DOTENV_FILE),
            "BACKDATE_TEST_NAME=Xavier Milgo\nBACKDATE_TEST_EMAIL=x@example.com\n",
        )
        .expect("write .env");

        let loaded = load_dotenv(dir.path()).expect("spaced value is accepted");
        assert_eq!(loaded, Some(dir.path().join(DOTENV_FILE)));
        assert_eq!(
            std::env::var("BACKDATE_TEST_NAME").expect("name set"),
            "Xavier Milgo"
        );
        assert_eq!(
            std::env::var("BACKDATE_TEST_EMAIL").expect("email set"),
            "x@example.com"
        );
    }

    #[test]
    fn malformed_dotenv_is_invalid_configuration() {
        let dir = TempDir::new().expect("temp dir");
        std::fs::write(dir.path().join(DOTENV_FILE), "NO EQUALS SIGN\n").expect("write .env");
        assert!(matches!(
            load_dotenv(dir.path()),
            Err(BackdateError::InvalidConfiguration { .. })
        ));
    }
}
