//! DAP client for communicating with debug adapters
//!
//! The client owns the adapter subprocess and talks to it over stdio.
//! Requests are answered in-line: while waiting for a response every event
//! the adapter emits is queued, and [`DapClient::next_event`] drains that
//! queue before reading further messages. There is no background reader,
//! which keeps the debuggee strictly synchronous from the harness's view.

use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::common::{Error, Result};

use super::codec;
use super::types::*;

/// How long an adapter gets to exit on its own after `disconnect`
const EXIT_GRACE: Duration = Duration::from_millis(500);

/// DAP client for communicating with a debug adapter
pub struct DapClient {
    /// Adapter subprocess
    adapter: Child,
    /// Buffered reader for adapter stdout
    reader: BufReader<ChildStdout>,
    /// Buffered writer for adapter stdin
    writer: BufWriter<ChildStdin>,
    /// Sequence number for the next request
    seq: i64,
    /// Events received while waiting for responses
    pending_events: VecDeque<Event>,
    /// Timeout applied to each request
    request_timeout: Duration,
}

impl DapClient {
    /// Spawn a new DAP adapter and create a client
    pub async fn spawn(adapter_path: &Path, args: &[String], request_timeout: Duration) -> Result<Self> {
        let mut adapter = Command::new(adapter_path)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::AdapterStartFailed(format!(
                    "Failed to start {}: {}",
                    adapter_path.display(),
                    e
                ))
            })?;

        let stdin = adapter
            .stdin
            .take()
            .ok_or_else(|| Error::AdapterStartFailed("Failed to get adapter stdin".to_string()))?;
        let stdout = adapter
            .stdout
            .take()
            .ok_or_else(|| Error::AdapterStartFailed("Failed to get adapter stdout".to_string()))?;

        tracing::debug!(
            adapter = %adapter_path.display(),
            pid = ?adapter.id(),
            "Spawned debug adapter"
        );

        Ok(Self {
            adapter,
            reader: BufReader::new(stdout),
            writer: BufWriter::new(stdin),
            seq: 1,
            pending_events: VecDeque::new(),
            request_timeout,
        })
    }

    /// OS process id of the adapter, `None` once it has been reaped
    pub fn pid(&self) -> Option<u32> {
        self.adapter.id()
    }

    /// Send a request and return its sequence number
    async fn send_request(&mut self, command: &str, arguments: Option<Value>) -> Result<i64> {
        let seq = self.seq;
        self.seq += 1;

        let mut request = serde_json::json!({
            "seq": seq,
            "type": "request",
            "command": command,
        });
        if let Some(args) = arguments {
            request["arguments"] = args;
        }

        let json = serde_json::to_string(&request)?;
        tracing::trace!("DAP >>> {}", json);
        codec::write_message(&mut self.writer, &json).await?;

        Ok(seq)
    }

    /// Read the next message from the adapter
    async fn read_value(&mut self) -> Result<Value> {
        let json = codec::read_message(&mut self.reader).await?;
        tracing::trace!("DAP <<< {}", json);
        serde_json::from_str(&json).map_err(|e| Error::DapProtocol(format!("Invalid JSON: {e}")))
    }

    /// Read messages until the response to `seq` arrives, queueing events
    async fn await_response(&mut self, seq: i64) -> Result<ResponseMessage> {
        loop {
            let msg = self.read_value().await?;
            match msg.get("type").and_then(Value::as_str) {
                Some("response") => {
                    let response: ResponseMessage = serde_json::from_value(msg)?;
                    if response.request_seq == seq {
                        return Ok(response);
                    }
                    tracing::warn!(
                        request_seq = response.request_seq,
                        command = %response.command,
                        "Dropping response to a request nobody waits for"
                    );
                }
                Some("event") => {
                    let event_msg: EventMessage = serde_json::from_value(msg)?;
                    self.pending_events.push_back(Event::from_message(event_msg));
                }
                other => {
                    tracing::warn!("Unknown message type: {:?}", other);
                }
            }
        }
    }

    /// Send a request and wait for its raw response
    async fn round_trip(&mut self, command: &str, arguments: Option<Value>) -> Result<ResponseMessage> {
        let seq = self.send_request(command, arguments).await?;
        let timeout = self.request_timeout;
        tokio::time::timeout(timeout, self.await_response(seq))
            .await
            .map_err(|_| Error::Timeout(timeout.as_secs()))?
    }

    /// Send a request and deserialize the body of a successful response
    pub async fn request<A: Serialize, T: DeserializeOwned>(
        &mut self,
        command: &str,
        arguments: Option<&A>,
    ) -> Result<T> {
        let arguments = arguments.map(serde_json::to_value).transpose()?;
        let response = self.round_trip(command, arguments).await?;

        if !response.success {
            return Err(Error::dap_request_failed(command, &response.error_text()));
        }

        let body = response.body.unwrap_or(Value::Null);
        serde_json::from_value(body).map_err(|e| {
            Error::DapProtocol(format!("Failed to parse {command} response: {e}"))
        })
    }

    /// Next event from the adapter, waiting for one if none is queued
    ///
    /// `None` waits without limit.
    pub async fn next_event(&mut self, timeout: Option<Duration>) -> Result<Event> {
        if let Some(event) = self.pending_events.pop_front() {
            return Ok(event);
        }

        match timeout {
            Some(limit) => tokio::time::timeout(limit, self.read_event())
                .await
                .map_err(|_| Error::Timeout(limit.as_secs()))?,
            None => self.read_event().await,
        }
    }

    /// Read messages until an event arrives
    async fn read_event(&mut self) -> Result<Event> {
        loop {
            let msg = self.read_value().await?;
            match msg.get("type").and_then(Value::as_str) {
                Some("event") => {
                    let event_msg: EventMessage = serde_json::from_value(msg)?;
                    return Ok(Event::from_message(event_msg));
                }
                Some("response") => {
                    tracing::warn!("Unexpected response while waiting for an event: {}", msg);
                }
                other => tracing::warn!("Unknown message type: {:?}", other),
            }
        }
    }

    /// Initialize the debug adapter
    pub async fn initialize(&mut self, adapter_id: &str, timeout: Duration) -> Result<Capabilities> {
        let args = InitializeArguments::new(adapter_id);
        let caps: Capabilities = tokio::time::timeout(timeout, self.request("initialize", Some(&args)))
            .await
            .map_err(|_| Error::Timeout(timeout.as_secs()))??;

        Ok(caps)
    }

    /// Send the launch request
    pub async fn launch(&mut self, args: &LaunchArguments) -> Result<()> {
        self.request::<_, Value>("launch", Some(args)).await?;
        Ok(())
    }

    /// Wait for the `initialized` event, keeping every other event queued
    pub async fn wait_initialized(&mut self) -> Result<()> {
        let limit = self.request_timeout;
        let mut skipped = Vec::new();
        let result = loop {
            match self.next_event(Some(limit)).await {
                Ok(Event::Initialized) => break Ok(()),
                Ok(event) => skipped.push(event),
                Err(e) => break Err(e),
            }
        };
        for event in skipped.into_iter().rev() {
            self.pending_events.push_front(event);
        }
        result
    }

    /// Signal that configuration is done, the debuggee starts running
    pub async fn configuration_done(&mut self) -> Result<()> {
        self.request::<Value, Value>("configurationDone", None).await?;
        Ok(())
    }

    /// Replace the set of line breakpoints for a source file
    pub async fn set_breakpoints(&mut self, source_path: &Path, lines: &[u32]) -> Result<Vec<Breakpoint>> {
        let args = SetBreakpointsArguments {
            source: Source {
                name: source_path.file_name().map(|n| n.to_string_lossy().into_owned()),
                path: Some(source_path.to_string_lossy().into_owned()),
            },
            breakpoints: lines.iter().map(|&line| SourceBreakpoint { line }).collect(),
        };

        let response: SetBreakpointsResponseBody = self.request("setBreakpoints", Some(&args)).await?;
        Ok(response.breakpoints)
    }

    /// Resume execution of a thread
    pub async fn continue_thread(&mut self, thread_id: i64) -> Result<()> {
        let args = ContinueArguments { thread_id };
        self.request::<_, Value>("continue", Some(&args)).await?;
        Ok(())
    }

    /// Get threads
    pub async fn threads(&mut self) -> Result<Vec<Thread>> {
        let response: ThreadsResponseBody = self.request::<Value, _>("threads", None).await?;
        Ok(response.threads)
    }

    /// Get the innermost `levels` frames of a thread
    pub async fn stack_trace(&mut self, thread_id: i64, levels: i64) -> Result<Vec<StackFrame>> {
        let args = StackTraceArguments {
            thread_id,
            start_frame: 0,
            levels,
        };
        let response: StackTraceResponseBody = self.request("stackTrace", Some(&args)).await?;
        Ok(response.stack_frames)
    }

    /// Get scopes for a frame
    pub async fn scopes(&mut self, frame_id: i64) -> Result<Vec<Scope>> {
        let args = ScopesArguments { frame_id };
        let response: ScopesResponseBody = self.request("scopes", Some(&args)).await?;
        Ok(response.scopes)
    }

    /// Get variables
    pub async fn variables(&mut self, variables_reference: i64) -> Result<Vec<Variable>> {
        let args = VariablesArguments {
            variables_reference,
        };
        let response: VariablesResponseBody = self.request("variables", Some(&args)).await?;
        Ok(response.variables)
    }

    /// Evaluate an expression or a console command
    pub async fn evaluate(
        &mut self,
        expression: &str,
        frame_id: Option<i64>,
        context: EvaluateContext,
    ) -> Result<EvaluateResponseBody> {
        let args = EvaluateArguments {
            expression: expression.to_string(),
            frame_id,
            context,
        };
        self.request("evaluate", Some(&args)).await
    }

    /// Ask the adapter to end the session, killing the debuggee
    pub async fn disconnect(&mut self) -> Result<()> {
        let args = DisconnectArguments {
            terminate_debuggee: true,
        };
        let arguments = serde_json::to_value(&args)?;
        let seq = self.send_request("disconnect", Some(arguments)).await?;

        // The adapter may exit before answering
        match tokio::time::timeout(EXIT_GRACE, self.await_response(seq)).await {
            Ok(Ok(response)) if !response.success => {
                tracing::warn!("Adapter refused disconnect: {}", response.error_text());
            }
            Ok(Err(e)) => tracing::debug!("No disconnect response: {}", e),
            _ => {}
        }
        Ok(())
    }

    /// Disconnect, then make sure the adapter process is gone and reaped
    pub async fn terminate(&mut self) -> Result<()> {
        if self.is_running() {
            let _ = self.disconnect().await;
        }

        if tokio::time::timeout(EXIT_GRACE, self.adapter.wait()).await.is_err() {
            tracing::debug!("Adapter still running after disconnect, killing it");
            self.adapter.kill().await?;
        }
        Ok(())
    }

    /// Check if the adapter is still running
    pub fn is_running(&mut self) -> bool {
        self.adapter.try_wait().ok().flatten().is_none()
    }
}

impl Drop for DapClient {
    fn drop(&mut self) {
        // Best-effort; async teardown happens in terminate()
        let _ = self.adapter.start_kill();
    }
}
