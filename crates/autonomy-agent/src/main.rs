//! autonomy-agent: feeds health signals to the remediation controller
//!
//! ```bash
//! # Signals from a file, collaborators from the environment
//! autonomy-agent --signals signals.ndjson
//!
//! # Signals on stdin, explicit endpoints
//! monitor --ndjson | autonomy-agent --agent-api http://agents:8080 \
//!     --authority-url http://governance:8080/override
//! ```

mod cli;
mod report;
mod signals;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use remediation::{
    AutonomyConfig, Collaborators, HttpAgentControl, HttpAgentState, HttpAuthorityChannel,
    RemediationOrchestrator,
};
use tokio::io::AsyncReadExt;
use tracing::{error, info, warn};

use cli::Args;
use report::RunReport;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let config = match AutonomyConfig::from_env().and_then(|c| args.apply(c)) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Configuration rejected");
            return Err(e).context("loading configuration");
        }
    };

    let agent_api = args.agent_api();
    let authority_url = args.authority_url();
    info!(
        %agent_api,
        %authority_url,
        auto_remediate = config.auto_remediate,
        max_attempts = config.max_attempts,
        "Autonomy agent starting"
    );

    let collaborators = Collaborators {
        control: Arc::new(HttpAgentControl::new(&agent_api, config.step_timeout)?),
        state: Arc::new(HttpAgentState::new(&agent_api, config.step_timeout)?),
        authority: Arc::new(HttpAuthorityChannel::new(
            &authority_url,
            config.escalation_timeout,
        )?),
    };
    let orchestrator = RemediationOrchestrator::new(config, collaborators)
        .context("building remediation orchestrator")?
        .shared();

    let text = match args.signals_path() {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading signals from {}", path.display()))?,
        None => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("reading signals from stdin")?;
            text
        }
    };
    let signals = signals::parse_signals(&text)?;
    info!(count = signals.len(), "Signals loaded");

    let handles: Vec<_> = signals
        .into_iter()
        .map(|signal| orchestrator.execute_detached(signal))
        .collect();
    let mut outcomes = Vec::with_capacity(handles.len());
    for joined in futures::future::join_all(handles).await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => warn!(error = %e, "Remediation task did not complete"),
        }
    }

    let report = RunReport::new(&orchestrator, &outcomes, args.lineage_limit);
    info!(
        resolved = outcomes.iter().filter(|o| o.resolved).count(),
        escalated = outcomes.iter().filter(|o| o.escalated).count(),
        alerts = report.alerts.len(),
        "Batch complete"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
