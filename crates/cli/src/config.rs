//! Configuration: `digest.toml` plus environment.
//!
//! The file carries everything non-secret. Credentials are only ever read
//! from the environment, and a handful of file settings can be overridden
//! from it as well (see [`Config::apply_env`]).

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Duration;
use pipeline::schedule::{parse_time, WEEKDAYS};
use pipeline::Schedule;
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "digest.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub github: GithubConfig,
    pub slack: SlackConfig,
    pub commits: CommitsConfig,
    pub channel: ChannelConfig,
    pub lookup: LookupConfig,
    pub ai: AiConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub api_base: String,
    pub owner: String,
    pub repo: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: github::DEFAULT_API_BASE.to_string(),
            owner: String::new(),
            repo: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    pub api_base: String,
    /// Where digests and lookup results are posted.
    pub bot_channel: String,
    /// The channel the weekly digest summarises.
    pub summary_channel: String,
    /// Listen address of the slash-command receiver.
    pub bind: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            api_base: slack::DEFAULT_API_BASE.to_string(),
            bot_channel: String::new(),
            summary_channel: String::new(),
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommitsConfig {
    pub enabled: bool,
    pub lookback_hours: i64,
    pub max_commits: usize,
    pub schedule: String,
}

impl Default for CommitsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lookback_hours: 24,
            max_commits: 100,
            schedule: "0 9 * * 1-5".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub enabled: bool,
    pub lookback_days: i64,
    pub max_messages: usize,
    pub summary_day: String,
    pub summary_time: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lookback_days: 7,
            max_messages: 1000,
            summary_day: "Sunday".to_string(),
            summary_time: "18:00".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    pub enabled: bool,
    pub threshold: f64,
    pub registry: RegistryConfig,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: pipeline::fuzzy::DEFAULT_THRESHOLD,
            registry: RegistryConfig::default(),
        }
    }
}

/// Where the contact registry lives.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RegistryConfig {
    Csv {
        path: PathBuf,
    },
    Sheets {
        spreadsheet_id: String,
        range: String,
        #[serde(default = "default_sheets_base")]
        api_base: String,
    },
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig::Csv {
            path: PathBuf::from("data.csv"),
        }
    }
}

fn default_sheets_base() -> String {
    registry::DEFAULT_SHEETS_BASE.to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Gates the commit digest summary. The channel digest and lookups are
    /// summarised whenever an API key is present.
    pub enabled: bool,
    pub base_url: String,
    pub commit_model: String,
    pub channel_model: String,
    pub lookup_model: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: llm::DEFAULT_BASE_URL.to_string(),
            commit_model: llm::DEFAULT_MODEL.to_string(),
            channel_model: "gpt-4-turbo".to_string(),
            lookup_model: llm::DEFAULT_MODEL.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

/// Credentials, read from the environment only.
#[derive(Clone, Default)]
pub struct Secrets {
    pub slack_bot_token: Option<String>,
    pub slack_signing_secret: Option<String>,
    pub github_token: Option<String>,
    pub openai_api_key: Option<String>,
    pub google_sheets_api_key: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        Self {
            slack_bot_token: get("SLACK_BOT_TOKEN"),
            slack_signing_secret: get("SLACK_SIGNING_SECRET"),
            github_token: get("GITHUB_TOKEN"),
            openai_api_key: get("OPENAI_API_KEY"),
            google_sheets_api_key: get("GOOGLE_SHEETS_API_KEY"),
        }
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Secrets")
            .field("slack_bot_token", &set(&self.slack_bot_token))
            .field("slack_signing_secret", &set(&self.slack_signing_secret))
            .field("github_token", &set(&self.github_token))
            .field("openai_api_key", &set(&self.openai_api_key))
            .field("google_sheets_api_key", &set(&self.google_sheets_api_key))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Loads, overrides from the environment, and validates.
///
/// An explicit `path` must exist. Without one, `digest.toml` in the working
/// directory is used when present and built-in defaults otherwise.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => read_file(path)?,
        None => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            if default.exists() {
                read_file(default)?
            } else {
                Config::default()
            }
        }
    };
    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

fn read_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

impl Config {
    /// Applies `REPO_OWNER`, `REPO_NAME`, `BOT_CHANNEL`, `SUMMARY_CHANNEL`,
    /// `LOOKBACK_HOURS`, `USE_AI` and `CRON_SCHEDULE` when set.
    pub fn apply_env(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("REPO_OWNER") {
            self.github.owner = v;
        }
        if let Some(v) = get("REPO_NAME") {
            self.github.repo = v;
        }
        if let Some(v) = get("BOT_CHANNEL") {
            self.slack.bot_channel = v;
        }
        if let Some(v) = get("SUMMARY_CHANNEL") {
            self.slack.summary_channel = v;
        }
        if let Some(v) = get("LOOKBACK_HOURS") {
            self.commits.lookback_hours = v
                .parse()
                .with_context(|| format!("LOOKBACK_HOURS must be a whole number, got '{v}'"))?;
        }
        if let Some(v) = get("USE_AI") {
            self.ai.enabled = v.eq_ignore_ascii_case("true") || v == "1";
        }
        if let Some(v) = get("CRON_SCHEDULE") {
            self.commits.schedule = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let any_enabled = self.commits.enabled || self.channel.enabled || self.lookup.enabled;
        if any_enabled && self.slack.bot_channel.trim().is_empty() {
            bail!("slack.bot_channel (or BOT_CHANNEL) must be set");
        }

        if self.commits.enabled {
            if self.github.owner.trim().is_empty() || self.github.repo.trim().is_empty() {
                bail!("github.owner and github.repo (or REPO_OWNER / REPO_NAME) must be set when the commit digest is enabled");
            }
            self.commit_lookback()?;
            if self.commits.max_commits == 0 {
                bail!("commits.max_commits must be > 0");
            }
            self.commit_schedule()?;
        }

        if self.channel.enabled {
            if self.slack.summary_channel.trim().is_empty() {
                bail!("slack.summary_channel (or SUMMARY_CHANNEL) must be set when the channel digest is enabled");
            }
            self.channel_lookback()?;
            if self.channel.max_messages == 0 {
                bail!("channel.max_messages must be > 0");
            }
            self.channel_schedule()?;
        }

        if self.lookup.enabled && !(0.0..=1.0).contains(&self.lookup.threshold) {
            bail!("lookup.threshold must be in [0.0, 1.0]");
        }
        Ok(())
    }

    /// `commits.lookback_hours` as a duration. Must be positive and small
    /// enough to represent.
    pub fn commit_lookback(&self) -> Result<Duration> {
        let hours = self.commits.lookback_hours;
        if hours <= 0 {
            bail!("commits.lookback_hours must be > 0");
        }
        Duration::try_hours(hours)
            .with_context(|| format!("commits.lookback_hours {hours} is out of range"))
    }

    /// `channel.lookback_days` as a duration.
    pub fn channel_lookback(&self) -> Result<Duration> {
        let days = self.channel.lookback_days;
        if days <= 0 {
            bail!("channel.lookback_days must be > 0");
        }
        Duration::try_days(days)
            .with_context(|| format!("channel.lookback_days {days} is out of range"))
    }

    pub fn commit_schedule(&self) -> Result<Schedule> {
        Schedule::parse(&self.commits.schedule).context("commits.schedule is invalid")
    }

    /// Weekly schedule derived from `summary_day` and `summary_time`.
    pub fn channel_schedule(&self) -> Result<Schedule> {
        let day = self.channel.summary_day.trim();
        if !WEEKDAYS.iter().any(|d| d.eq_ignore_ascii_case(day)) {
            bail!(
                "channel.summary_day must be one of {}, got '{day}'",
                WEEKDAYS.join(", ")
            );
        }
        parse_time(&self.channel.summary_time).context("channel.summary_time is invalid")?;
        Schedule::weekly(day, &self.channel.summary_time).context("channel schedule is invalid")
    }
}
