//! Application-level configuration loading for match timing and collaborator endpoints.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_DUEL_BACK_CONFIG_PATH";
/// Environment variable that overrides the Result Persistence API base URL.
const RESULT_API_URL_ENV: &str = "RESULT_API_URL";

/// Seconds counted down between both players being ready and the match start.
const DEFAULT_COUNTDOWN_SECS: u64 = 3;
/// Seconds the first finisher waits for the opponent before the match is force-ended.
const DEFAULT_GRACE_PERIOD_SECS: u64 = 30;
/// Points awarded for a correct answer; time taken never changes the award.
const DEFAULT_POINTS_PER_CORRECT: u32 = 10;
/// Per-question answer window in seconds. Enforced client-side; exposed so
/// clients can read it instead of hardcoding their own value.
const DEFAULT_ANSWER_WINDOW_SECS: u64 = 30;
/// Fallback base URL for the Result Persistence API.
const DEFAULT_RESULT_API_URL: &str = "http://localhost:3000/api";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    countdown_secs: u64,
    grace_period_secs: u64,
    points_per_correct: u32,
    answer_window_secs: u64,
    result_api_url: String,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    ///
    /// `RESULT_API_URL` in the environment takes precedence over the file for
    /// the Result Persistence API endpoint so deployments can rewire it
    /// without shipping a config file.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded configuration from file");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        if let Ok(url) = env::var(RESULT_API_URL_ENV) {
            config.result_api_url = url;
        }

        config
    }

    /// Duration of the pre-match countdown shared by both clients.
    pub fn countdown(&self) -> Duration {
        Duration::from_secs(self.countdown_secs)
    }

    /// How long the first finisher waits before the match is force-resolved.
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    /// Points awarded for each correct answer.
    pub fn points_per_correct(&self) -> u32 {
        self.points_per_correct
    }

    /// Advisory per-question answer window, in seconds.
    pub fn answer_window_secs(&self) -> u64 {
        self.answer_window_secs
    }

    /// Base URL of the Result Persistence API.
    pub fn result_api_url(&self) -> &str {
        &self.result_api_url
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            countdown_secs: DEFAULT_COUNTDOWN_SECS,
            grace_period_secs: DEFAULT_GRACE_PERIOD_SECS,
            points_per_correct: DEFAULT_POINTS_PER_CORRECT,
            answer_window_secs: DEFAULT_ANSWER_WINDOW_SECS,
            result_api_url: DEFAULT_RESULT_API_URL.to_owned(),
        }
    }
}

/// On-disk representation of the configuration file; every field is optional.
#[derive(Debug, Deserialize)]
struct RawConfig {
    countdown_secs: Option<u64>,
    grace_period_secs: Option<u64>,
    points_per_correct: Option<u32>,
    answer_window_secs: Option<u64>,
    result_api_url: Option<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            countdown_secs: raw.countdown_secs.unwrap_or(defaults.countdown_secs),
            grace_period_secs: raw.grace_period_secs.unwrap_or(defaults.grace_period_secs),
            points_per_correct: raw
                .points_per_correct
                .unwrap_or(defaults.points_per_correct),
            answer_window_secs: raw
                .answer_window_secs
                .unwrap_or(defaults.answer_window_secs),
            result_api_url: raw.result_api_url.unwrap_or(defaults.result_api_url),
        }
    }
}

fn resolve_config_path() -> PathBuf {
    env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}
