use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::advisor::{AdvisoryDesk, GenerativeAdvisor};

pub const DEFAULT_ADVISOR_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

/// Process-wide settings. Every flag can also come from the environment.
#[derive(Debug, Args)]
pub struct Settings {
    /// SQLite database holding students and the intervention log
    #[arg(long, global = true, env = "DATABASE_URL", default_value = "sqlite://early_warning.db")]
    pub database_url: String,

    /// Directory containing classifier.json, scaler.json and columns.json
    #[arg(long, global = true, env = "MODEL_DIR", default_value = "model")]
    pub model_dir: PathBuf,

    /// API key for the advisory service; advice is disabled without it
    #[arg(long, global = true, env = "ADVISOR_API_KEY", hide_env_values = true)]
    pub advisor_api_key: Option<String>,

    #[arg(long, global = true, env = "ADVISOR_MODEL", default_value = "gemini-1.5-flash")]
    pub advisor_model: String,

    #[arg(long, global = true, env = "ADVISOR_ENDPOINT", default_value = DEFAULT_ADVISOR_ENDPOINT)]
    pub advisor_endpoint: String,

    #[arg(long, global = true, env = "ADVISOR_TIMEOUT_SECS", default_value_t = 20)]
    pub advisor_timeout_secs: u64,
}

impl Settings {
    pub fn advisory_desk(&self) -> AdvisoryDesk {
        match self.advisor_api_key.as_deref().filter(|key| !key.is_empty()) {
            Some(api_key) => AdvisoryDesk::new(
                Box::new(GenerativeAdvisor::new(
                    &self.advisor_endpoint,
                    &self.advisor_model,
                    api_key,
                )),
                Duration::from_secs(self.advisor_timeout_secs),
            ),
            None => AdvisoryDesk::disabled(),
        }
    }
}
