use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::scheduler::firetimes::ScheduleSpec;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Destination for the recurring poll: `<number>@c.us` or `<groupid>@g.us`.
    /// The format is owned by the transport; only non-emptiness is checked.
    pub target: String,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub poll: PollConfig,
    /// Test flag: dispatch one poll as soon as the session is ready.
    #[serde(default)]
    pub dispatch_on_ready: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    #[serde(default = "default_pattern")]
    pub pattern: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
            timezone: default_timezone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollConfig {
    #[serde(default = "default_question")]
    pub question: String,
    #[serde(default = "default_options")]
    pub options: Vec<String>,
    #[serde(default = "default_allow_multiple")]
    pub allow_multiple: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            question: default_question(),
            options: default_options(),
            allow_multiple: default_allow_multiple(),
        }
    }
}

fn default_pattern() -> String {
    "0 9 * * *".to_string()
}

fn default_timezone() -> String {
    "Africa/Cairo".to_string()
}

fn default_question() -> String {
    "من سيحضر الصلاة اليوم؟".to_string()
}

fn default_options() -> Vec<String> {
    ["الفجر", "الظهر", "العصر", "المغرب", "العشاء"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_allow_multiple() -> bool {
    true
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to load config from {}", path.display()))
    }

    fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;
        // A missing target is fatal: there is nowhere to send the poll.
        if config.target.trim().is_empty() {
            bail!("target is not set; refusing to start without a destination");
        }
        Ok(config)
    }

    pub fn schedule_spec(&self) -> ScheduleSpec {
        ScheduleSpec {
            pattern: self.schedule.pattern.clone(),
            timezone: self.schedule.timezone.clone(),
        }
    }
}
