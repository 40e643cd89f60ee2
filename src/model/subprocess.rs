//! SubprocessModel: reaches an llm-orc style ensemble over MCP stdio
//!
//! Spawns the configured server command (default `llm-orc mcp serve`) on
//! first use and keeps it running. Each completion is one JSON-RPC
//! `tools/call` request invoking the configured ensemble with the rendered
//! prompt as input data. The process is restarted after a transport failure.

use super::{LanguageModel, ModelError, Prompt};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Configuration for the subprocess model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubprocessModelConfig {
    /// Executable to spawn
    pub command: String,
    pub args: Vec<String>,
    /// Ensemble invoked for each translation
    pub ensemble: String,
    /// Agent whose response is used when the ensemble has several
    pub agent: Option<String>,
    /// Working directory for the server process
    pub working_dir: Option<String>,
    /// Per-request read timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for SubprocessModelConfig {
    fn default() -> Self {
        Self {
            command: "llm-orc".to_string(),
            args: vec!["mcp".to_string(), "serve".to_string()],
            ensemble: "self-query".to_string(),
            agent: None,
            working_dir: None,
            timeout_seconds: 60,
        }
    }
}

/// Result of invoking an llm-orc ensemble.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeResponse {
    /// Per-agent results (agent name → output)
    pub results: HashMap<String, AgentResult>,
    /// Overall execution status
    pub status: String,
    /// Execution metadata (timing, usage)
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl InvokeResponse {
    pub fn is_failed(&self) -> bool {
        self.status == "failed"
    }

    /// Pick the response text: the named agent if given, otherwise the
    /// first successful agent by name.
    pub fn response_text(&self, agent: Option<&str>) -> Option<&str> {
        if let Some(name) = agent {
            return self.results.get(name).and_then(|r| r.response.as_deref());
        }
        let mut names: Vec<&String> = self.results.keys().collect();
        names.sort();
        names
            .into_iter()
            .filter_map(|n| self.results.get(n))
            .filter(|r| r.is_success())
            .find_map(|r| r.response.as_deref())
    }
}

/// Result from a single agent in an ensemble.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    /// The agent's response text or JSON
    #[serde(default)]
    pub response: Option<String>,
    /// Agent status
    #[serde(default)]
    pub status: Option<String>,
    /// Error message if the agent failed
    #[serde(default)]
    pub error: Option<String>,
}

impl AgentResult {
    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some("success")
    }
}

/// MCP JSON-RPC request
#[derive(Debug, Serialize)]
struct McpRequest {
    jsonrpc: &'static str,
    id: u64,
    method: String,
    params: serde_json::Value,
}

/// MCP JSON-RPC response
#[derive(Debug, Deserialize)]
struct McpResponse {
    #[serde(default)]
    id: Option<serde_json::Value>,
    result: Option<serde_json::Value>,
    error: Option<McpError>,
}

#[derive(Debug, Deserialize)]
struct McpError {
    code: i64,
    message: String,
}

/// Running server process
struct McpConnection {
    process: Child,
    stdout: BufReader<ChildStdout>,
    request_id: u64,
    /// Set while a request is written but its reply not yet read. A
    /// connection left in this state by a dropped call is never reused.
    in_flight: bool,
}

impl McpConnection {
    fn start(config: &SubprocessModelConfig) -> Result<Self, ModelError> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        if let Some(dir) = &config.working_dir {
            cmd.current_dir(dir);
        }

        let mut process = cmd.spawn().map_err(|e| {
            ModelError::Unavailable(format!("failed to start '{}': {}", config.command, e))
        })?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| ModelError::Unavailable("no stdout available".to_string()))?;

        debug!(command = %config.command, "model server started");
        Ok(Self {
            process,
            stdout: BufReader::new(stdout),
            request_id: 0,
            in_flight: false,
        })
    }

    async fn call(
        &mut self,
        method: &str,
        params: serde_json::Value,
        timeout_duration: Duration,
    ) -> Result<serde_json::Value, ModelError> {
        self.request_id += 1;
        let request = McpRequest {
            jsonrpc: "2.0",
            id: self.request_id,
            method: method.to_string(),
            params,
        };
        let mut line = serde_json::to_string(&request)
            .map_err(|e| ModelError::InvocationFailed(format!("failed to serialize request: {}", e)))?;
        line.push('\n');

        self.in_flight = true;
        let stdin = self
            .process
            .stdin
            .as_mut()
            .ok_or_else(|| ModelError::Unavailable("no stdin available".to_string()))?;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| ModelError::Unavailable(format!("failed to write request: {}", e)))?;
        stdin
            .flush()
            .await
            .map_err(|e| ModelError::Unavailable(format!("failed to flush stdin: {}", e)))?;

        let response = match timeout(timeout_duration, self.read_reply(request.id)).await {
            Ok(reply) => reply?,
            Err(_) => {
                return Err(ModelError::Unavailable(format!(
                    "request timed out after {}s",
                    timeout_duration.as_secs()
                )))
            }
        };
        self.in_flight = false;

        if let Some(error) = response.error {
            return Err(ModelError::InvocationFailed(format!(
                "MCP error {}: {}",
                error.code, error.message
            )));
        }
        response
            .result
            .ok_or_else(|| ModelError::ParseError("empty response".to_string()))
    }

    /// Read lines until the reply to request `id`, skipping notifications
    /// and replies to other requests.
    async fn read_reply(&mut self, id: u64) -> Result<McpResponse, ModelError> {
        loop {
            let mut line = String::new();
            let read = self
                .stdout
                .read_line(&mut line)
                .await
                .map_err(|e| ModelError::Unavailable(format!("failed to read response: {}", e)))?;
            if read == 0 {
                return Err(ModelError::Unavailable("server closed its output".to_string()));
            }
            if line.trim().is_empty() {
                continue;
            }
            let response: McpResponse = serde_json::from_str(&line)
                .map_err(|e| ModelError::ParseError(format!("invalid JSON-RPC reply: {}", e)))?;
            match response.id.as_ref().and_then(|v| v.as_u64()) {
                Some(reply_id) if reply_id == id => return Ok(response),
                other => debug!(expected = id, got = ?other, "skipping unmatched message"),
            }
        }
    }
}

/// Language model reached through a long-running MCP server process.
pub struct SubprocessModel {
    config: SubprocessModelConfig,
    connection: Mutex<Option<McpConnection>>,
}

impl SubprocessModel {
    pub fn new(config: SubprocessModelConfig) -> Self {
        Self {
            config,
            connection: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SubprocessModelConfig {
        &self.config
    }

    /// Turn a `tools/call` result into the model's answer text.
    fn extract_text(&self, result: &serde_json::Value) -> Result<String, ModelError> {
        let raw = tool_result_text(result)
            .ok_or_else(|| ModelError::ParseError("tool result carried no text".to_string()))?;

        match serde_json::from_str::<InvokeResponse>(&raw) {
            Ok(invoked) => {
                if invoked.is_failed() {
                    return Err(ModelError::InvocationFailed(format!(
                        "ensemble '{}' failed",
                        self.config.ensemble
                    )));
                }
                invoked
                    .response_text(self.config.agent.as_deref())
                    .map(str::to_string)
                    .ok_or_else(|| ModelError::ParseError("no successful agent response".to_string()))
            }
            Err(_) => Ok(raw),
        }
    }
}

/// MCP tool results are either `{"content": [{"type": "text", "text": ..}]}`
/// or a bare string.
fn tool_result_text(result: &serde_json::Value) -> Option<String> {
    if let Some(items) = result.get("content").and_then(|c| c.as_array()) {
        let texts: Vec<&str> = items
            .iter()
            .filter_map(|item| item.get("text").and_then(|t| t.as_str()))
            .collect();
        if !texts.is_empty() {
            return Some(texts.join("\n"));
        }
    }
    result
        .get("result")
        .and_then(|r| r.as_str())
        .or_else(|| result.as_str())
        .map(str::to_string)
}

#[async_trait]
impl LanguageModel for SubprocessModel {
    async fn is_available(&self) -> bool {
        let mut guard = self.connection.lock().await;
        if guard.is_none() {
            match McpConnection::start(&self.config) {
                Ok(conn) => *guard = Some(conn),
                Err(_) => return false,
            }
        }
        true
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String, ModelError> {
        let mut guard = self.connection.lock().await;
        if guard.as_ref().map_or(false, |conn| conn.in_flight) {
            warn!("previous request was abandoned, restarting model server");
            *guard = None;
        }
        if guard.is_none() {
            *guard = Some(McpConnection::start(&self.config)?);
        }
        let conn = guard
            .as_mut()
            .ok_or_else(|| ModelError::Unavailable("no connection available".to_string()))?;

        let params = serde_json::json!({
            "name": "invoke",
            "arguments": {
                "ensemble_name": self.config.ensemble,
                "input_data": prompt.render(),
            }
        });
        let timeout_duration = Duration::from_secs(self.config.timeout_seconds);

        match conn.call("tools/call", params, timeout_duration).await {
            Ok(result) => self.extract_text(&result),
            Err(err) => {
                if matches!(err, ModelError::Unavailable(_)) {
                    warn!(error = %err, "dropping model server connection");
                    *guard = None;
                }
                Err(err)
            }
        }
    }
}
