use std::{collections::HashMap, fs, path::Path};

use anyhow::{anyhow, Context};
use client_core::{session::DEFAULT_POINTS_PER_CORRECT, ScoringPolicy};
use tracing::{info, warn};
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "quiz.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    Fixed,
    ServerDelta,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub request_timeout_secs: u64,
    pub bypass_auth: bool,
    pub scoring_policy: PolicyKind,
    pub points_per_correct: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".into(),
            request_timeout_secs: 20,
            bypass_auth: false,
            scoring_policy: PolicyKind::Fixed,
            points_per_correct: DEFAULT_POINTS_PER_CORRECT,
        }
    }
}

impl Settings {
    pub fn scoring_policy(&self) -> ScoringPolicy {
        match self.scoring_policy {
            PolicyKind::Fixed => ScoringPolicy::FixedIncrement(self.points_per_correct),
            PolicyKind::ServerDelta => ScoringPolicy::AuthoritativeDelta,
        }
    }
}

pub fn load_settings(path: &Path) -> Settings {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => {
            apply_file(&mut settings, &raw);
            info!(path = %path.display(), "loaded settings file");
        }
        Err(e) => {
            info!(path = %path.display(), error = %e, "no settings file, using defaults");
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file(settings: &mut Settings, raw: &str) {
    let file_cfg = match toml::from_str::<HashMap<String, toml::Value>>(raw) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(error = %e, "failed to parse settings file, ignoring it");
            return;
        }
    };

    for (key, value) in file_cfg {
        let value = match value {
            toml::Value::String(s) => s,
            other => other.to_string(),
        };
        apply_value(settings, &key, &value);
    }
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("QUIZ_API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = lookup("APP__API_URL") {
        settings.api_url = v;
    }

    for (var, key) in [
        ("APP__REQUEST_TIMEOUT_SECS", "request_timeout_secs"),
        ("APP__BYPASS_AUTH", "bypass_auth"),
        ("APP__SCORING_POLICY", "scoring_policy"),
        ("APP__POINTS_PER_CORRECT", "points_per_correct"),
    ] {
        if let Some(v) = lookup(var) {
            apply_value(settings, key, &v);
        }
    }
}

fn apply_value(settings: &mut Settings, key: &str, value: &str) {
    let value = value.trim();
    match key {
        "api_url" => settings.api_url = value.to_string(),
        "request_timeout_secs" => match value.parse::<u64>() {
            Ok(secs) if secs > 0 => settings.request_timeout_secs = secs,
            _ => warn!(key, value, "ignoring invalid request timeout"),
        },
        "bypass_auth" => match parse_bool(value) {
            Some(flag) => settings.bypass_auth = flag,
            None => warn!(key, value, "ignoring invalid boolean"),
        },
        "scoring_policy" => match value.to_ascii_lowercase().as_str() {
            "fixed" => settings.scoring_policy = PolicyKind::Fixed,
            "server_delta" => settings.scoring_policy = PolicyKind::ServerDelta,
            _ => warn!(key, value, "ignoring unknown scoring policy"),
        },
        "points_per_correct" => match value.parse::<i64>() {
            Ok(points) if points >= 0 => settings.points_per_correct = points,
            _ => warn!(key, value, "ignoring invalid points per correct answer"),
        },
        _ => warn!(key, "ignoring unknown setting"),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Validates the scoring API base URL and strips trailing slashes.
pub fn normalize_api_url(raw: &str) -> anyhow::Result<String> {
    let raw = raw.trim();
    let url = Url::parse(raw).with_context(|| format!("invalid api url '{raw}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(anyhow!(
            "api url '{raw}' must use http or https, got '{}'",
            url.scheme()
        ));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
