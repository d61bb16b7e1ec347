//! Stdio transport: spawns a server subprocess and exchanges newline-delimited
//! JSON-RPC messages over its stdin/stdout.

use crate::config::ServerConfig;
use crate::error::McpError;
use crate::jsonrpc::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

/// Async stdio transport for one MCP server process.
pub struct StdioTransport {
    next_id: AtomicU64,
    outbox: mpsc::Sender<String>,
    pending: PendingMap,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
    child: Arc<Mutex<Child>>,
    timeout_ms: u64,
}

impl StdioTransport {
    /// Spawn the server process and start the background reader/writer tasks.
    pub fn spawn(config: &ServerConfig) -> Result<Self, McpError> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| McpError::SpawnFailed {
            name: config.command.clone(),
            source: e,
        })?;

        let mut stdin = child.stdin.take().expect("stdin was piped");
        let stdout = child.stdout.take().expect("stdout was piped");

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        // Writer task: drains the outbox into the child's stdin, one message
        // per line.
        let (outbox, mut outbox_rx) = mpsc::channel::<String>(64);
        let writer_task = tokio::spawn(async move {
            while let Some(line) = outbox_rx.recv().await {
                let write = async {
                    stdin.write_all(line.as_bytes()).await?;
                    stdin.write_all(b"\n").await?;
                    stdin.flush().await
                };
                if write.await.is_err() {
                    break;
                }
            }
        });

        // Reader task: parses each stdout line as a JSON-RPC response and
        // hands it to whoever is waiting on that id.
        let pending_for_reader = Arc::clone(&pending);
        let reader_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.trim().is_empty() {
                    continue;
                }
                let resp: JsonRpcResponse = match serde_json::from_str(&line) {
                    Ok(resp) => resp,
                    Err(e) => {
                        tracing::warn!("Unparseable MCP message: {e}: {line}");
                        continue;
                    }
                };
                // Server-initiated notifications carry no id and are ignored.
                if let Some(id) = resp.id {
                    if let Some(waiter) = pending_for_reader.lock().await.remove(&id) {
                        let _ = waiter.send(resp);
                    }
                }
            }
        });

        Ok(Self {
            next_id: AtomicU64::new(1),
            outbox,
            pending,
            reader_task,
            writer_task,
            child: Arc::new(Mutex::new(child)),
            timeout_ms: config.timeout_ms,
        })
    }

    /// Send a JSON-RPC request and wait for the matching response.
    pub async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<JsonRpcResponse, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let line = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        self.outbox
            .send(line)
            .await
            .map_err(|_| McpError::Protocol("Writer channel closed".to_string()))?;

        let deadline = std::time::Duration::from_millis(self.timeout_ms);
        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(_)) => Err(McpError::Protocol("Response channel dropped".to_string())),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(McpError::Timeout {
                    method: method.to_string(),
                    timeout_ms: self.timeout_ms,
                })
            }
        }
    }

    /// Send a JSON-RPC notification (fire-and-forget).
    pub async fn notify(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), McpError> {
        let line = serde_json::to_string(&JsonRpcNotification::new(method, params))?;
        self.outbox
            .send(line)
            .await
            .map_err(|_| McpError::Protocol("Writer channel closed".to_string()))
    }

    /// Shut down the transport: close the child's stdin, wait briefly for a
    /// graceful exit, then kill.
    pub async fn shutdown(self) {
        drop(self.outbox);

        let child = self.child;
        let graceful = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            let _ = child.lock().await.wait().await;
        })
        .await;

        if graceful.is_err() {
            let _ = child.lock().await.kill().await;
        }

        self.reader_task.abort();
        self.writer_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(command: &str, args: &[&str], timeout_ms: u64) -> ServerConfig {
        ServerConfig {
            command: command.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            env: HashMap::new(),
            timeout_ms,
            transport: crate::config::TransportKind::Stdio,
        }
    }

    #[tokio::test]
    async fn spawn_echo_process() {
        let transport = StdioTransport::spawn(&config_for("cat", &[], 5000));
        assert!(transport.is_ok());
        transport.unwrap().shutdown().await;
    }

    #[tokio::test]
    async fn spawn_missing_command_fails() {
        let result = StdioTransport::spawn(&config_for("no_such_binary_xyz123", &[], 5000));
        match result {
            Err(McpError::SpawnFailed { name, .. }) => {
                assert_eq!(name, "no_such_binary_xyz123");
            }
            Err(other) => panic!("Expected SpawnFailed, got: {other:?}"),
            Ok(_) => panic!("Expected error, got Ok"),
        }
    }

    #[tokio::test]
    async fn request_response_roundtrip_with_mock() {
        // A bash loop that answers every request with a canned result,
        // echoing back the request id.
        let script = r#"while IFS= read -r line; do id=$(echo "$line" | python3 -c "import sys,json; print(json.loads(sys.stdin.read())['id'])"); echo "{\"jsonrpc\":\"2.0\",\"id\":$id,\"result\":{\"ok\":true}}"; done"#;
        let transport = StdioTransport::spawn(&config_for("bash", &["-c", script], 5000));

        if transport.is_err() {
            // Skip if bash/python3 are unavailable
            return;
        }
        let transport = transport.unwrap();

        let resp = transport
            .request("test/method", Some(serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(resp.result.unwrap()["ok"], true);

        transport.shutdown().await;
    }

    #[tokio::test]
    async fn notify_does_not_block() {
        let transport = StdioTransport::spawn(&config_for("cat", &[], 5000)).unwrap();
        let result = transport.notify("notifications/initialized", None).await;
        assert!(result.is_ok());
        transport.shutdown().await;
    }

    #[tokio::test]
    async fn unresponsive_server_times_out() {
        // `sleep` never writes to stdout, so the request must time out.
        let transport = StdioTransport::spawn(&config_for("sleep", &["10"], 100)).unwrap();
        let result = transport
            .request("test/method", Some(serde_json::json!({})))
            .await;
        match result.unwrap_err() {
            McpError::Timeout { timeout_ms, .. } => assert_eq!(timeout_ms, 100),
            other => panic!("Expected Timeout, got: {other:?}"),
        }
        transport.shutdown().await;
    }
}
