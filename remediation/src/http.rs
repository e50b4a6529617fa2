//! HTTP adapters for the three collaborators
//!
//! | Collaborator | Request |
//! |---|---|
//! | [`HttpAgentControl`] | `POST {base}/agents/{id}/actions/{action}` with resolved args |
//! | [`HttpAgentState`] | `GET {base}/agents/{id}/metrics` |
//! | [`HttpAuthorityChannel`] | `POST {url}` with the escalation payload |
//!
//! Each client carries its own request timeout. The orchestrator still wraps
//! every call in its own bound.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use crate::error::{ActionError, DeliveryError, RemediationError, RemediationResult, StateError};
use crate::escalation::{AuthorityChannel, EscalationPayload};
use crate::executor::{ActionKind, AgentControl, ResolvedArgs};
use crate::verifier::{AgentMetrics, AgentStateSource};

fn client(collaborator: &'static str, timeout: Duration) -> RemediationResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RemediationError::HttpClient {
            collaborator,
            message: e.to_string(),
        })
}

fn trim_base(base: &str) -> String {
    base.trim_end_matches('/').to_string()
}

/// Agent-management surface over HTTP
#[derive(Debug, Clone)]
pub struct HttpAgentControl {
    base: String,
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpAgentControl {
    pub fn new(base: &str, timeout: Duration) -> RemediationResult<Self> {
        Ok(Self {
            base: trim_base(base),
            http: client("agent control", timeout)?,
            timeout,
        })
    }

    fn url(&self, agent_id: &str, action: ActionKind) -> String {
        format!("{}/agents/{}/actions/{}", self.base, agent_id, action)
    }
}

#[async_trait]
impl AgentControl for HttpAgentControl {
    async fn perform(
        &self,
        agent_id: &str,
        action: ActionKind,
        args: &ResolvedArgs,
    ) -> Result<(), ActionError> {
        let url = self.url(agent_id, action);
        debug!(%url, "Dispatching action");
        let resp = self.http.post(&url).json(args).send().await.map_err(|e| {
            if e.is_timeout() {
                ActionError::Timeout {
                    action: action.name().to_string(),
                    after: self.timeout,
                }
            } else {
                ActionError::Unreachable {
                    action: action.name().to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        let reason = if body.is_empty() {
            status.to_string()
        } else {
            format!("{status}: {body}")
        };
        if status.is_server_error() {
            Err(ActionError::Unreachable {
                action: action.name().to_string(),
                reason,
            })
        } else {
            Err(ActionError::Rejected {
                action: action.name().to_string(),
                reason,
            })
        }
    }
}

/// Agent-state source over HTTP
#[derive(Debug, Clone)]
pub struct HttpAgentState {
    base: String,
    http: reqwest::Client,
}

impl HttpAgentState {
    pub fn new(base: &str, timeout: Duration) -> RemediationResult<Self> {
        Ok(Self {
            base: trim_base(base),
            http: client("agent state", timeout)?,
        })
    }
}

#[async_trait]
impl AgentStateSource for HttpAgentState {
    async fn fetch_metrics(&self, agent_id: &str) -> Result<AgentMetrics, StateError> {
        let url = format!("{}/agents/{}/metrics", self.base, agent_id);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| StateError::Unreachable(e.to_string()))?;
        match resp.status() {
            StatusCode::NOT_FOUND => Err(StateError::NotFound(agent_id.to_string())),
            status if !status.is_success() => {
                Err(StateError::Unreachable(format!("{url} returned {status}")))
            }
            _ => resp
                .json::<AgentMetrics>()
                .await
                .map_err(|e| StateError::Unreachable(format!("bad metrics body: {e}"))),
        }
    }
}

/// Authority override endpoint over HTTP
#[derive(Debug, Clone)]
pub struct HttpAuthorityChannel {
    url: String,
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpAuthorityChannel {
    pub fn new(url: &str, timeout: Duration) -> RemediationResult<Self> {
        Ok(Self {
            url: url.to_string(),
            http: client("authority channel", timeout)?,
            timeout,
        })
    }
}

#[async_trait]
impl AuthorityChannel for HttpAuthorityChannel {
    async fn deliver(&self, payload: &EscalationPayload) -> Result<(), DeliveryError> {
        let resp = self
            .http
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout(self.timeout)
                } else {
                    DeliveryError::Transport(e.to_string())
                }
            })?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Rejected(status.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SignalMetrics;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Answer one request with `status` and `body`; yields the raw request
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = tx.send(String::from_utf8_lossy(&request).into_owned());
        });
        (format!("http://{addr}"), rx)
    }

    #[tokio::test]
    async fn test_control_posts_args_to_action_url() {
        let (base, request) = serve_once("200 OK", "{}").await;
        let control = HttpAgentControl::new(&format!("{base}/"), Duration::from_secs(5)).unwrap();
        let args: ResolvedArgs =
            serde_json::from_value(serde_json::json!({"agent": "cmo"})).unwrap();
        control
            .perform("cmo", ActionKind::ThrottleAgent, &args)
            .await
            .unwrap();

        let request = request.await.unwrap();
        assert!(request.starts_with("POST /agents/cmo/actions/throttle-agent HTTP/1.1"));
        assert!(request.ends_with(r#"{"agent":"cmo"}"#));
    }

    #[tokio::test]
    async fn test_control_maps_client_error_to_rejected() {
        let (base, _request) = serve_once("409 Conflict", "agent busy").await;
        let control = HttpAgentControl::new(&base, Duration::from_secs(5)).unwrap();
        let err = control
            .perform("cmo", ActionKind::RestartAgent, &ResolvedArgs::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Rejected { ref reason, .. } if reason.contains("agent busy")));
    }

    #[tokio::test]
    async fn test_state_reads_metrics() {
        let (base, request) = serve_once(
            "200 OK",
            r#"{"successRate":0.95,"alignmentScore":0.9,"backlogAgeMinutes":2.0,"costBurnRate":1.5,"lastTaskSucceeded":true}"#,
        )
        .await;
        let state = HttpAgentState::new(&base, Duration::from_secs(5)).unwrap();
        let metrics = state.fetch_metrics("ops").await.unwrap();

        assert!(request.await.unwrap().starts_with("GET /agents/ops/metrics "));
        assert_eq!(
            metrics.metrics,
            SignalMetrics {
                success_rate: 0.95,
                alignment_score: 0.9,
                backlog_age_minutes: 2.0,
                cost_burn_rate: 1.5,
            }
        );
        assert!(metrics.last_task_succeeded);
        assert!(!metrics.config_healthy);
    }

    #[tokio::test]
    async fn test_state_not_found() {
        let (base, _request) = serve_once("404 Not Found", "").await;
        let state = HttpAgentState::new(&base, Duration::from_secs(5)).unwrap();
        assert_eq!(
            state.fetch_metrics("ghost").await.unwrap_err(),
            StateError::NotFound("ghost".into())
        );
    }

    #[tokio::test]
    async fn test_authority_unreachable_is_transport_error() {
        // Bind then drop to get a port nobody listens on
        let addr = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();
        let channel =
            HttpAuthorityChannel::new(&format!("http://{addr}/override"), Duration::from_secs(2))
                .unwrap();
        let payload: EscalationPayload = serde_json::from_value(serde_json::json!({
            "escalationId": "00000000-0000-0000-0000-000000000000",
            "target": "ultimate-authority",
            "reason": "AutoRemediationFailed",
            "agent": "ops",
            "classification": "transient",
            "context": {},
            "lastAttempts": [],
            "recommendedOptions": [],
            "lineageRef": []
        }))
        .unwrap();
        let err = channel.deliver(&payload).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Transport(_)));
    }
}
