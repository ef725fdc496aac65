use serde_derive::{Deserialize, Serialize};

/// Process-level configuration, optionally loaded from a TOML file via `--config` and
/// overridden by the matching CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigLoad {
    /// Path to the durability log.
    pub db: String,

    /// REPL prompt string.
    pub prompt: Option<String>,

    /// Print keyspace status after each non-interactive run.
    pub show_stats: Option<bool>,
}

impl Default for ConfigLoad {
    fn default() -> Self {
        ConfigLoad {
            db: kv::storage::log::DEFAULT_LOG_PATH.to_string(),
            prompt: Some("kvcli".to_string()),
            show_stats: Some(false),
        }
    }
}

impl ConfigLoad {
    pub fn from_path(path: &str) -> anyhow::Result<Self> {
        Ok(confy::load_path(path)?)
    }
}
