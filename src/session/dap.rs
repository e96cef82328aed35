//! Debugger session backed by a DAP adapter

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::common::config::{AdapterType, Config};
use crate::common::{Error, Result};
use crate::dap::{DapClient, EvaluateContext, Event, StoppedEventBody};
use crate::testing::EvalPath;

use super::{BreakpointHandle, Debugger, FrameLocation, RenderedValue, StopEvent};

/// Process state as seen by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessState {
    /// Adapter initialized, no target yet
    Configuring,
    /// Launch request sent, waiting for configurationDone
    TargetCreated,
    Running,
    Stopped,
    Exited,
    Closed,
}

impl ProcessState {
    fn as_str(&self) -> &'static str {
        match self {
            ProcessState::Configuring => "not created",
            ProcessState::TargetCreated => "not launched",
            ProcessState::Running => "running",
            ProcessState::Stopped => "stopped",
            ProcessState::Exited => "exited",
            ProcessState::Closed => "closed",
        }
    }
}

/// A debugger session driving one adapter and one target process
pub struct DapSession {
    client: DapClient,
    adapter_type: AdapterType,
    state: ProcessState,
    /// lldb-dap: printer commands sent with the launch request
    init_commands: Vec<String>,
    /// REPL adapters: commands evaluated after the launch request
    repl_commands: Vec<String>,
    /// Requested lines per source file, in creation order
    breakpoints: HashMap<PathBuf, Vec<u32>>,
    stopped_thread: Option<i64>,
    frame: Option<FrameLocation>,
    exit_code: Option<i32>,
    stop_timeout: Option<Duration>,
    max_depth: usize,
}

impl DapSession {
    /// Spawn and initialize the named adapter, or the configured default
    pub async fn open(config: &Config, adapter: Option<&str>) -> Result<Self> {
        let name = adapter.unwrap_or(&config.defaults.adapter);
        let adapter_config = config
            .get_adapter(name)
            .ok_or_else(|| Error::adapter_not_found(name, &["config.toml", "PATH"]))?;

        tracing::info!(
            adapter = name,
            path = %adapter_config.path.display(),
            "Opening debugger session"
        );

        let mut client = DapClient::spawn(
            &adapter_config.path,
            &adapter_config.args,
            Duration::from_secs(config.timeouts.dap_request_secs),
        )
        .await?;

        let init_timeout = Duration::from_secs(config.timeouts.dap_initialize_secs);
        let caps = client
            .initialize(name, init_timeout)
            .await
            .map_err(|e| Error::SessionInit(format!("initialize failed: {e}")))?;
        tracing::debug!(?caps, "Adapter initialized");

        Ok(Self {
            client,
            adapter_type: adapter_config.adapter_type,
            state: ProcessState::Configuring,
            init_commands: Vec::new(),
            repl_commands: Vec::new(),
            breakpoints: HashMap::new(),
            stopped_thread: None,
            frame: None,
            exit_code: None,
            stop_timeout: config.timeouts.stop_secs.map(Duration::from_secs),
            max_depth: config.render.max_depth,
        })
    }

    /// OS process id of the adapter while it is alive
    pub fn adapter_pid(&self) -> Option<u32> {
        self.client.pid()
    }

    fn require_state(&self, action: &str, expected: ProcessState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::invalid_state(action, self.state.as_str()))
        }
    }

    /// Block until the process stops, exits or the adapter ends the session
    async fn wait_for_stop(&mut self) -> Result<StopEvent> {
        loop {
            match self.client.next_event(self.stop_timeout).await? {
                Event::Stopped(body) => return self.on_stopped(body).await,
                Event::Exited(body) => {
                    tracing::debug!(exit_code = body.exit_code, "Process exited");
                    self.exit_code = Some(body.exit_code);
                    self.state = ProcessState::Exited;
                    return Ok(StopEvent::Exited {
                        exit_code: body.exit_code,
                    });
                }
                Event::Terminated => {
                    self.state = ProcessState::Exited;
                    return Ok(StopEvent::Exited {
                        exit_code: self.exit_code.unwrap_or(0),
                    });
                }
                Event::Output(body) => {
                    let category = body.category.as_deref().unwrap_or("console");
                    tracing::debug!(category, "{}", body.output.trim_end());
                }
                Event::Process(body) => {
                    tracing::debug!(name = %body.name, pid = ?body.system_process_id, "Process started");
                }
                other => tracing::trace!(?other, "Ignoring event"),
            }
        }
    }

    async fn on_stopped(&mut self, body: StoppedEventBody) -> Result<StopEvent> {
        let thread_id = match body.thread_id {
            Some(id) => Some(id),
            None => self.client.threads().await?.first().map(|t| t.id),
        };

        let frame = match thread_id {
            Some(id) => self
                .client
                .stack_trace(id, 1)
                .await?
                .into_iter()
                .next()
                .map(|f| FrameLocation {
                    frame_id: f.id,
                    function: f.name,
                    file: f.source.and_then(|s| s.path.or(s.name)),
                    line: f.line,
                }),
            None => None,
        };

        tracing::debug!(
            reason = %body.reason,
            thread = ?thread_id,
            hit = ?body.hit_breakpoint_ids,
            "Process stopped"
        );

        self.state = ProcessState::Stopped;
        self.stopped_thread = thread_id;
        self.frame = frame.clone();

        Ok(StopEvent::Stopped {
            reason: body.reason,
            thread_id,
            hit_breakpoint_ids: body.hit_breakpoint_ids,
            frame,
        })
    }

    /// Printer command echoed in a launch error, if one of them failed
    fn failed_init_command(&self, message: &str) -> Option<&str> {
        self.init_commands
            .iter()
            .rev()
            .find(|c| message.contains(c.as_str()))
            .map(String::as_str)
    }

    /// Fill in children of `root` breadth-first down to the configured depth
    async fn expand(&mut self, root: &mut RenderedValue, reference: i64) -> Result<()> {
        let mut queue = VecDeque::from([(Vec::<usize>::new(), reference, 1usize)]);

        while let Some((path, reference, depth)) = queue.pop_front() {
            if reference <= 0 || depth > self.max_depth {
                continue;
            }
            let variables = self.client.variables(reference).await?;
            let Some(node) = root.descend_mut(&path) else {
                continue;
            };
            for var in variables {
                let mut child_path = path.clone();
                child_path.push(node.children.len());
                queue.push_back((child_path, var.variables_reference, depth + 1));
                node.children
                    .push(RenderedValue::new(var.name, var.type_name, var.value));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Debugger for DapSession {
    async fn load_pretty_printers(&mut self, script: &Path, load_stmt: &str) -> Result<()> {
        if !script.is_file() {
            return Err(Error::SessionInit(format!(
                "pretty-printer script '{}' not found",
                script.display()
            )));
        }

        let commands = self.adapter_type.pretty_printer_commands(script, load_stmt);
        if self.adapter_type.uses_init_commands() {
            self.init_commands.extend(commands);
        } else {
            self.repl_commands.extend(commands);
        }
        Ok(())
    }

    async fn create_target(&mut self, program: &Path, cwd: &Path) -> Result<()> {
        self.require_state("create target", ProcessState::Configuring)?;

        let target_error = |reason: String| Error::TargetCreation {
            program: program.display().to_string(),
            reason,
        };

        // lldb-dap aborts the launch only for failing `!`-prefixed commands
        let args = crate::dap::LaunchArguments {
            program: program.display().to_string(),
            cwd: Some(cwd.display().to_string()),
            init_commands: self.init_commands.iter().map(|c| format!("!{c}")).collect(),
            ..Default::default()
        };
        if let Err(e) = self.client.launch(&args).await {
            let message = e.to_string();
            return Err(match self.failed_init_command(&message) {
                Some(command) => Error::SessionInit(format!("'{command}' failed: {message}")),
                None => target_error(message),
            });
        }
        self.client
            .wait_initialized()
            .await
            .map_err(|e| target_error(format!("no initialized event: {e}")))?;

        for command in std::mem::take(&mut self.repl_commands) {
            tracing::debug!(%command, "Loading pretty printers");
            self.client
                .evaluate(&command, None, EvaluateContext::Repl)
                .await
                .map_err(|e| Error::SessionInit(format!("'{command}' failed: {e}")))?;
        }

        self.state = ProcessState::TargetCreated;
        Ok(())
    }

    async fn set_breakpoint(&mut self, file: &Path, line: u32) -> Result<BreakpointHandle> {
        let location = format!("{}:{}", file.display(), line);
        let lines = self.breakpoints.entry(file.to_path_buf()).or_default();
        lines.push(line);
        let lines = lines.clone();

        let response = self
            .client
            .set_breakpoints(file, &lines)
            .await
            .map_err(|e| Error::breakpoint_failed(&location, &e.to_string()))?;

        let bp = response
            .get(lines.len() - 1)
            .ok_or_else(|| Error::breakpoint_failed(&location, "adapter returned no breakpoint"))?;

        if !bp.verified {
            tracing::warn!(
                %location,
                message = bp.message.as_deref().unwrap_or(""),
                "Breakpoint not verified yet"
            );
        }

        Ok(BreakpointHandle {
            id: bp.id,
            requested_line: line,
            line: bp.line,
            verified: bp.verified,
        })
    }

    async fn launch(&mut self) -> Result<StopEvent> {
        self.require_state("launch", ProcessState::TargetCreated)?;
        self.client.configuration_done().await?;
        self.state = ProcessState::Running;
        self.wait_for_stop().await
    }

    async fn resume(&mut self) -> Result<StopEvent> {
        self.require_state("continue", ProcessState::Stopped)?;
        let thread_id = match self.stopped_thread {
            Some(id) => id,
            None => self
                .client
                .threads()
                .await?
                .first()
                .map(|t| t.id)
                .ok_or_else(|| Error::invalid_state("continue", "without threads"))?,
        };

        self.client.continue_thread(thread_id).await?;
        self.state = ProcessState::Running;
        self.frame = None;
        self.wait_for_stop().await
    }

    async fn evaluate(&mut self, expression: &str) -> Result<RenderedValue> {
        self.require_state("evaluate", ProcessState::Stopped)?;
        let eval_error = |e: Error| Error::evaluation(EvalPath::Expression, expression, e.to_string());

        let frame_id = self.frame.as_ref().map(|f| f.frame_id);
        let response = self
            .client
            .evaluate(expression, frame_id, EvaluateContext::Watch)
            .await
            .map_err(eval_error)?;

        let mut value = RenderedValue::new(expression, response.type_name, response.result);
        self.expand(&mut value, response.variables_reference)
            .await
            .map_err(eval_error)?;
        Ok(value)
    }

    async fn frame_variable(&mut self, name: &str) -> Result<RenderedValue> {
        self.require_state("read frame variables", ProcessState::Stopped)?;
        let lookup_error =
            |message: String| Error::evaluation(EvalPath::FrameVariable, name, message);

        let frame = self
            .frame
            .clone()
            .ok_or_else(|| lookup_error("no frame selected".to_string()))?;

        let scopes = self
            .client
            .scopes(frame.frame_id)
            .await
            .map_err(|e| lookup_error(e.to_string()))?;

        // Locals and arguments may live in separate scopes
        let mut found = None;
        for scope in scopes.iter().filter(|s| !s.expensive) {
            let variables = self
                .client
                .variables(scope.variables_reference)
                .await
                .map_err(|e| lookup_error(e.to_string()))?;
            if let Some(var) = variables.into_iter().find(|v| v.name == name) {
                tracing::trace!(scope = %scope.name, name, "Frame variable found");
                found = Some(var);
                break;
            }
        }
        let var =
            found.ok_or_else(|| lookup_error(format!("no variable named '{name}' in {frame}")))?;

        let mut value = RenderedValue::new(var.name, var.type_name, var.value);
        self.expand(&mut value, var.variables_reference)
            .await
            .map_err(|e| lookup_error(e.to_string()))?;
        Ok(value)
    }

    async fn shutdown(&mut self) -> Result<()> {
        if self.state == ProcessState::Closed {
            return Ok(());
        }
        self.state = ProcessState::Closed;
        self.client.terminate().await?;
        tracing::debug!("Debugger session closed");
        Ok(())
    }
}
