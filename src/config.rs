use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{SeeShotError, SeeShotResult};
use crate::llm::prompts;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    #[serde(default)]
    pub compression: CompressionConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    pub active_provider: String,
    pub providers: HashMap<String, ProviderEntry>,
    /// Role-to-model mapping. If a role is absent, falls back to active_provider defaults.
    #[serde(default)]
    pub roles: RolesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub display_name: String,
    /// Full chat-completions endpoint URL.
    pub api_base: String,
    /// Default model for this provider (used as fallback when no role config exists).
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Optional API key stored in config.toml (falls back to env var SEESHOT_<ID>_API_KEY).
    #[serde(default)]
    pub api_key: Option<String>,
    /// Name of an extra environment variable holding the key, e.g. "OPENROUTER_API_KEY".
    #[serde(default)]
    pub api_key_env: Option<String>,
}

/// Maps the two decision roles to specific provider+model combinations.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RolesConfig {
    /// Grounding model that returns a single aim point.
    pub aiming: Option<RoleEntry>,
    /// Tool-calling model that picks gameplay actions.
    pub gameplay: Option<RoleEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleEntry {
    /// Must match a key under [llm.providers.*].
    pub provider: String,
    /// Model name sent to the API.
    pub model: String,
    /// Overrides the provider-level temperature for this role.
    pub temperature: Option<f64>,
    /// Router-side fallback models, tried in order when `model` is unavailable.
    #[serde(default)]
    pub fallback_models: Vec<String>,
    /// Upstream providers the router must not use.
    #[serde(default)]
    pub ignore_providers: Vec<String>,
}

fn default_temperature() -> f64 {
    0.1
}

/// Which team the agent plays. Resolved once at startup into a [`SideProfile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "CT")]
    CounterTerrorist,
    #[serde(rename = "T")]
    Terrorist,
}

impl FromStr for Side {
    type Err = SeeShotError;

    fn from_str(s: &str) -> SeeShotResult<Self> {
        match s.trim() {
            "CT" => Ok(Side::CounterTerrorist),
            "T" => Ok(Side::Terrorist),
            other => Err(SeeShotError::Config(format!(
                "unknown side '{other}'; choose one of ['CT', 'T']"
            ))),
        }
    }
}

/// Per-side settings: the aiming prompt and the in-game team/skin menu choices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideProfile {
    pub side: Side,
    pub aiming_prompt: &'static str,
    pub team_choice: &'static str,
    pub skin_choice: &'static str,
}

impl Side {
    pub fn profile(self) -> SideProfile {
        match self {
            Side::CounterTerrorist => SideProfile {
                side: self,
                aiming_prompt: prompts::CT_AIMING_PROMPT,
                team_choice: "2",
                skin_choice: "3",
            },
            Side::Terrorist => SideProfile {
                side: self,
                aiming_prompt: prompts::T_AIMING_PROMPT,
                team_choice: "1",
                skin_choice: "4",
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub side: Side,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
    /// Scales the aim offset from screen center.
    #[serde(default = "default_aim_multiplier")]
    pub aim_multiplier: f64,
    #[serde(default = "default_fire_clicks")]
    pub fire_clicks: u32,
    #[serde(default = "default_click_interval_ms")]
    pub click_interval_ms: u64,
    /// How long a finished-but-unneeded gameplay result may be drained.
    #[serde(default = "default_drain_grace_ms")]
    pub drain_grace_ms: u64,
    #[serde(default)]
    pub aiming_timeout_ms: Option<u64>,
    #[serde(default)]
    pub gameplay_timeout_ms: Option<u64>,
    #[serde(default)]
    pub max_consecutive_failures: Option<u32>,
    #[serde(default)]
    pub max_duration_minutes: Option<u32>,
    #[serde(default)]
    pub wait_on_start_ms: u64,
    /// Type the side's team and skin menu choices before the first iteration.
    #[serde(default)]
    pub join_team: bool,
}

fn default_iterations() -> u32 {
    10
}

fn default_memory_capacity() -> usize {
    3
}

fn default_aim_multiplier() -> f64 {
    1.3
}

fn default_fire_clicks() -> u32 {
    3
}

fn default_click_interval_ms() -> u64 {
    200
}

fn default_drain_grace_ms() -> u64 {
    10
}

impl AgentConfig {
    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }

    pub fn aiming_timeout(&self) -> Option<Duration> {
        self.aiming_timeout_ms.map(Duration::from_millis)
    }

    pub fn gameplay_timeout(&self) -> Option<Duration> {
        self.gameplay_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Target size of a remembered frame, as a percentage of the captured frame.
    #[serde(default = "default_target_size_percent")]
    pub target_size_percent: u8,
    /// Linear downscale applied before the quality search.
    #[serde(default = "default_scale_percent")]
    pub scale_percent: u8,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            target_size_percent: default_target_size_percent(),
            scale_percent: default_scale_percent(),
        }
    }
}

fn default_target_size_percent() -> u8 {
    25
}

fn default_scale_percent() -> u8 {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Monitor index from the OS enumeration; `None` selects the primary monitor.
    #[serde(default)]
    pub monitor_index: Option<usize>,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            monitor_index: None,
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

fn default_jpeg_quality() -> u8 {
    90
}

fn check_percent(name: &str, value: u8) -> SeeShotResult<()> {
    if (1..=100).contains(&value) {
        Ok(())
    } else {
        Err(SeeShotError::Config(format!(
            "{name} must be within 1..=100, got {value}"
        )))
    }
}

impl AppConfig {
    /// Reject settings that indicate a programming or configuration mistake.
    pub fn validate(&self) -> SeeShotResult<()> {
        check_percent("compression.target_size_percent", self.compression.target_size_percent)?;
        check_percent("compression.scale_percent", self.compression.scale_percent)?;
        check_percent("capture.jpeg_quality", self.capture.jpeg_quality)?;

        if self.agent.memory_capacity == 0 {
            return Err(SeeShotError::Config("agent.memory_capacity must be at least 1".into()));
        }
        if !self.agent.aim_multiplier.is_finite() || self.agent.aim_multiplier <= 0.0 {
            return Err(SeeShotError::Config(format!(
                "agent.aim_multiplier must be a positive number, got {}",
                self.agent.aim_multiplier
            )));
        }

        let roles = [
            ("aiming", self.llm.roles.aiming.as_ref()),
            ("gameplay", self.llm.roles.gameplay.as_ref()),
        ];
        for (role, entry) in roles {
            if let Some(entry) = entry {
                if !self.llm.providers.contains_key(&entry.provider) {
                    return Err(SeeShotError::Config(format!(
                        "role '{role}' references unknown provider '{}'",
                        entry.provider
                    )));
                }
            }
        }
        Ok(())
    }
}

fn resolve_config_path() -> SeeShotResult<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    Err(SeeShotError::Config(
        "config.toml not found next to executable or in working directory".into(),
    ))
}

pub fn parse_config(content: &str) -> SeeShotResult<AppConfig> {
    let config: AppConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

pub fn load_config() -> SeeShotResult<AppConfig> {
    let path = resolve_config_path()?;
    let content = std::fs::read_to_string(&path)?;
    let config = parse_config(&content)?;
    tracing::info!(
        path = %path.display(),
        provider = %config.llm.active_provider,
        side = ?config.agent.side,
        "config loaded"
    );
    Ok(config)
}
