use crate::error::Result;
use crate::paths;
use crate::registry::AgentRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ExecutorBackend
// ---------------------------------------------------------------------------

/// How an agent's prompt is turned into artifact text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutorBackend {
    /// `claude -p <prompt>` in print mode; stdout is the artifact.
    Claude {
        #[serde(default = "default_claude_model")]
        model: String,
        #[serde(default)]
        allowed_tools: Vec<String>,
        #[serde(default)]
        permission_mode: Option<String>,
        #[serde(default)]
        timeout_minutes: Option<u32>,
    },
    /// Any program: prompt on stdin, artifact on stdout.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        timeout_minutes: Option<u32>,
    },
}

fn default_claude_model() -> String {
    "claude-sonnet-4-6".to_string()
}

impl ExecutorBackend {
    pub fn timeout(&self) -> Option<Duration> {
        let minutes = match self {
            ExecutorBackend::Claude {
                timeout_minutes, ..
            }
            | ExecutorBackend::Command {
                timeout_minutes, ..
            } => *timeout_minutes,
        };
        minutes.map(|m| Duration::from_secs(u64::from(m) * 60))
    }

    pub fn program(&self) -> &str {
        match self {
            ExecutorBackend::Claude { .. } => "claude",
            ExecutorBackend::Command { program, .. } => program,
        }
    }
}

fn default_executor() -> ExecutorBackend {
    ExecutorBackend::Claude {
        model: default_claude_model(),
        allowed_tools: vec![
            "Read".to_string(),
            "Glob".to_string(),
            "Grep".to_string(),
            "WebFetch".to_string(),
        ],
        permission_mode: Some("acceptEdits".to_string()),
        timeout_minutes: Some(30),
    }
}

// ---------------------------------------------------------------------------
// RetryConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per agent, first try included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    2
}

fn default_backoff_ms() -> u64 {
    2_000
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetryConfig {
    /// No retries, no delay.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Delay before attempt `attempt + 1`, given that `attempt` (1-based) failed.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(20);
        let ms = self
            .backoff_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_executor")]
    pub executor: ExecutorBackend,
    /// Per-agent backend overrides.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub agents: BTreeMap<String, ExecutorBackend>,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub optional_agents: Vec<String>,
    #[serde(default = "default_agents_dir")]
    pub agents_dir: PathBuf,
    #[serde(default = "default_presets_dir")]
    pub presets_dir: PathBuf,
}

fn default_version() -> u32 {
    1
}

fn default_agents_dir() -> PathBuf {
    PathBuf::from(paths::AGENTS_DIR)
}

fn default_presets_dir() -> PathBuf {
    PathBuf::from(paths::PRESETS_DIR)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            executor: default_executor(),
            agents: BTreeMap::new(),
            retry: RetryConfig::default(),
            optional_agents: Vec::new(),
            agents_dir: default_agents_dir(),
            presets_dir: default_presets_dir(),
        }
    }
}

impl Config {
    pub fn backend_for(&self, agent: &str) -> &ExecutorBackend {
        self.agents.get(agent).unwrap_or(&self.executor)
    }

    /// `agents_dir` resolved against the project root.
    pub fn agents_path(&self, root: &Path) -> PathBuf {
        root.join(&self.agents_dir)
    }

    pub fn presets_path(&self, root: &Path) -> PathBuf {
        root.join(&self.presets_dir)
    }

    /// Load `.shared/config.yaml`; a project without one gets defaults.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self, agents: &AgentRegistry) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut warn = |message: String| {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message,
            })
        };

        for name in self.agents.keys() {
            if !agents.contains(name) {
                warn(format!("unknown agent '{name}' in agents"));
            }
        }
        for name in &self.optional_agents {
            if !agents.contains(name) {
                warn(format!("unknown agent '{name}' in optional_agents"));
            }
        }

        let backends = std::iter::once(("executor".to_string(), &self.executor)).chain(
            self.agents
                .iter()
                .map(|(name, b)| (format!("agents.{name}"), b)),
        );
        for (key, backend) in backends {
            if let ExecutorBackend::Command { program, .. } = backend {
                if program.trim().is_empty() {
                    warn(format!("{key} has an empty program"));
                }
            }
            if backend.timeout() == Some(Duration::ZERO) {
                warn(format!("{key} has timeout_minutes=0"));
            }
        }

        if self.retry.max_attempts == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "retry.max_attempts=0; agents will still run once".to_string(),
            });
        } else if self.retry.max_attempts > 10 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "retry.max_attempts={} (>10 is unusual)",
                    self.retry.max_attempts
                ),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
