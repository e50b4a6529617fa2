//! Command-line arguments
//!
//! Flags override the environment; the environment overrides defaults.

use std::path::PathBuf;

use clap::Parser;
use remediation::{AutonomyConfig, RemediationResult};

/// Default agent-management API when neither flag nor env is set
const DEFAULT_AGENT_API: &str = "http://127.0.0.1:8080";

/// Default authority override endpoint
const DEFAULT_AUTHORITY_URL: &str = "http://127.0.0.1:8080/authority/override";

/// Run the remediation controller over a batch of health signals
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Newline-delimited JSON signals; `-` reads stdin
    #[arg(long, default_value = "-")]
    pub signals: String,

    /// Agent-management API base URL (overrides AGENT_API_URL)
    #[arg(long)]
    pub agent_api: Option<String>,

    /// Authority override endpoint (overrides AUTHORITY_URL)
    #[arg(long)]
    pub authority_url: Option<String>,

    /// Attempts per signal before escalating (overrides MAX_ATTEMPTS)
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Playbook override file (overrides PLAYBOOK_FILE)
    #[arg(long)]
    pub playbooks: Option<PathBuf>,

    /// Lineage entries included in the report
    #[arg(long, default_value_t = 50)]
    pub lineage_limit: usize,
}

impl Args {
    /// Layer flags over an environment-derived config
    pub fn apply(&self, mut config: AutonomyConfig) -> RemediationResult<AutonomyConfig> {
        if let Some(max_attempts) = self.max_attempts {
            config.max_attempts = max_attempts;
        }
        if let Some(path) = &self.playbooks {
            config.playbook_file = Some(path.clone());
        }
        config.validate()?;
        Ok(config)
    }

    pub fn agent_api(&self) -> String {
        resolve(self.agent_api.as_deref(), "AGENT_API_URL", DEFAULT_AGENT_API)
    }

    pub fn authority_url(&self) -> String {
        resolve(self.authority_url.as_deref(), "AUTHORITY_URL", DEFAULT_AUTHORITY_URL)
    }

    /// `None` means stdin
    pub fn signals_path(&self) -> Option<PathBuf> {
        (self.signals != "-").then(|| PathBuf::from(&self.signals))
    }
}

fn resolve(flag: Option<&str>, env_key: &str, default: &str) -> String {
    flag.map(str::to_string)
        .or_else(|| std::env::var(env_key).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| default.to_string())
}
