use serde::{Deserialize, Serialize};

/// Configuration from config.toml in the data directory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub user: UserConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    /// Default: see DEFAULT_USER
    #[serde(default = "default_user")]
    pub id: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        UserConfig { id: default_user() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Pause between completing a parent and releasing its children.
    /// Interactive front ends use this as an animation window.
    #[serde(default)]
    pub cascade_delay_ms: u64,
    /// Promote postponed tasks into today whenever a snapshot loads
    #[serde(default = "default_true")]
    pub auto_migrate: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            cascade_delay_ms: 0,
            auto_migrate: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_true")]
    pub show_completed: bool,
    /// Maximum completed tasks shown by `list all`
    #[serde(default = "default_completed_limit")]
    pub completed_limit: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            show_completed: true,
            completed_limit: default_completed_limit(),
        }
    }
}

pub const DEFAULT_USER: &str = "local";

fn default_user() -> String {
    DEFAULT_USER.to_string()
}

fn default_true() -> bool {
    true
}

fn default_completed_limit() -> usize {
    20
}
