use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AppConfig {
    pub logging: LogConfig,
    pub session: SessionConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionConfig {
    /// The signed-in user the conversation list belongs to.
    pub user_id: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { user_id: 1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncConfig {
    /// Idle interval after which the runner triggers a snapshot refresh,
    /// standing in for the app-resume and pull-to-refresh triggers.
    pub refresh_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 30_000,
        }
    }
}
