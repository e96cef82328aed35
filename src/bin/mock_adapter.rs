//! Mock DAP adapter binary for integration testing
//!
//! Implements just enough of the Debug Adapter Protocol to run the harness
//! without a real debugger. The "process" follows a scripted trace:
//!
//! ```json
//! {
//!   "stops": [
//!     {"line": 12, "function": "main", "locals": [
//!       {"name": "p", "type": "Point", "value": "{...}", "pretty": "Point(1, 2)",
//!        "children": [{"name": "x", "type": "int", "value": "1"}]}
//!     ]}
//!   ],
//!   "exit_code": 0
//! }
//! ```
//!
//! Running the process visits the trace in order and stops at every entry
//! whose line has a breakpoint. `pretty` replaces `value` once printers are
//! loaded; `frame_value` replaces it for frame variable lookups only. A stop
//! may also list `args`, reported in a separate "Arguments" scope.
//!
//! Like lldb-dap, a failing launch `initCommands` entry aborts the launch only
//! when it is prefixed with `!`. Like gdb, an `evaluate` request without a
//! `frameId` cannot see locals or arguments.
//!
//! Flags: `--trace <file>`, `--fail-launch`.

use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
struct Trace {
    #[serde(default)]
    stops: Vec<TraceStop>,
    #[serde(default)]
    exit_code: i32,
}

#[derive(Debug, Deserialize)]
struct TraceStop {
    line: u32,
    #[serde(default = "default_function")]
    function: String,
    #[serde(default)]
    locals: Vec<TraceVar>,
    #[serde(default)]
    args: Vec<TraceVar>,
}

fn default_function() -> String {
    "main".to_string()
}

#[derive(Debug, Clone, Deserialize)]
struct TraceVar {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
    value: String,
    #[serde(default)]
    pretty: Option<String>,
    #[serde(default)]
    frame_value: Option<String>,
    #[serde(default)]
    children: Vec<TraceVar>,
}

/// Reference of the arguments scope
const ARGUMENTS_REF: i64 = 900;
/// Reference of the locals scope
const LOCALS_REF: i64 = 1000;

fn main() {
    let mut trace = Trace::default();
    let mut fail_launch = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--trace" => {
                let Some(path) = args.next() else {
                    eprintln!("mock_adapter: --trace needs a file");
                    std::process::exit(2);
                };
                trace = match std::fs::read_to_string(&path)
                    .map_err(|e| e.to_string())
                    .and_then(|s| serde_json::from_str(&s).map_err(|e| e.to_string()))
                {
                    Ok(trace) => trace,
                    Err(e) => {
                        eprintln!("mock_adapter: bad trace {path}: {e}");
                        std::process::exit(2);
                    }
                };
            }
            "--fail-launch" => fail_launch = true,
            other => eprintln!("mock_adapter: ignoring argument {other}"),
        }
    }

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut reader = BufReader::new(stdin.lock());
    let mut writer = stdout.lock();

    let mut state = MockState::new(trace, fail_launch);

    loop {
        // Read Content-Length header
        let mut header_line = String::new();
        if reader.read_line(&mut header_line).unwrap_or(0) == 0 {
            break; // EOF
        }

        if !header_line.starts_with("Content-Length:") {
            continue;
        }

        let content_length: usize = header_line
            .trim_start_matches("Content-Length:")
            .trim()
            .parse()
            .unwrap_or(0);

        // Read empty line
        let mut empty_line = String::new();
        reader.read_line(&mut empty_line).ok();

        // Read JSON body
        let mut body = vec![0u8; content_length];
        if reader.read_exact(&mut body).is_err() {
            break;
        }

        let message: Value = match serde_json::from_slice(&body) {
            Ok(v) => v,
            Err(_) => continue,
        };

        if let Some(responses) = state.process_message(&message) {
            for response in responses {
                send_message(&mut writer, &response);
            }
        }

        if state.disconnected {
            break;
        }
    }
}

fn send_message<W: Write>(writer: &mut W, message: &Value) {
    let body = message.to_string();
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    writer.write_all(header.as_bytes()).ok();
    writer.write_all(body.as_bytes()).ok();
    writer.flush().ok();
}

struct MockState {
    seq: i64,
    trace: Trace,
    fail_launch: bool,
    disconnected: bool,
    program: Option<String>,
    source_path: Option<String>,
    script_imported: bool,
    pretty_loaded: bool,
    /// (source, line) -> breakpoint id
    breakpoint_ids: HashMap<(String, u32), u32>,
    /// Lines with a breakpoint in the current set
    active_lines: HashMap<u32, u32>,
    next_bp_id: u32,
    /// Index of the next trace entry to run through
    cursor: usize,
    /// Trace entry the process is stopped at
    current: Option<usize>,
    /// variablesReference -> variables, rebuilt at each stop
    references: HashMap<i64, Vec<TraceVar>>,
}

impl MockState {
    fn new(trace: Trace, fail_launch: bool) -> Self {
        Self {
            seq: 1,
            trace,
            fail_launch,
            disconnected: false,
            program: None,
            source_path: None,
            script_imported: false,
            pretty_loaded: false,
            breakpoint_ids: HashMap::new(),
            active_lines: HashMap::new(),
            next_bp_id: 1,
            cursor: 0,
            current: None,
            references: HashMap::new(),
        }
    }

    fn next_seq(&mut self) -> i64 {
        let seq = self.seq;
        self.seq += 1;
        seq
    }

    fn event(&mut self, event: &str, body: Value) -> Value {
        json!({
            "seq": self.next_seq(),
            "type": "event",
            "event": event,
            "body": body
        })
    }

    /// Run a debugger console command, as used to load pretty printers
    ///
    /// gdb's `source`/`python` are treated like lldb's `command script import`/`script`.
    fn run_command(&mut self, command: &str) -> Result<String, String> {
        let command = command
            .strip_prefix("source ")
            .map(|script| format!("command script import {script}"))
            .or_else(|| command.strip_prefix("python ").map(|stmt| format!("script {stmt}")))
            .unwrap_or_else(|| command.to_string());
        if let Some(script) = command.strip_prefix("command script import ") {
            if !Path::new(script.trim()).is_file() {
                return Err(format!("error: module importing failed: no such file '{}'", script.trim()));
            }
            self.script_imported = true;
            Ok(String::new())
        } else if let Some(stmt) = command.strip_prefix("script ") {
            if !self.script_imported {
                return Err(format!("NameError: name '{}' is not defined", stmt.trim()));
            }
            if stmt.trim_start().starts_with("raise") {
                return Err("Exception raised by load statement".to_string());
            }
            self.pretty_loaded = true;
            Ok(String::new())
        } else {
            Err(format!("error: '{command}' is not a valid command."))
        }
    }

    /// Run until the next trace entry with a breakpoint, or to the end
    fn advance(&mut self, events: &mut Vec<Value>) {
        self.current = None;
        self.references.clear();

        while self.cursor < self.trace.stops.len() {
            let index = self.cursor;
            self.cursor += 1;

            let line = self.trace.stops[index].line;
            if let Some(&id) = self.active_lines.get(&line) {
                self.current = Some(index);
                let stop = &self.trace.stops[index];
                let (locals, args) = (stop.locals.clone(), stop.args.clone());
                self.references.insert(LOCALS_REF, locals);
                self.references.insert(ARGUMENTS_REF, args);
                let stopped = self.event(
                    "stopped",
                    json!({
                        "reason": "breakpoint",
                        "threadId": 1,
                        "allThreadsStopped": true,
                        "hitBreakpointIds": [id]
                    }),
                );
                events.push(stopped);
                return;
            }
        }

        let exit_code = self.trace.exit_code;
        let exited = self.event("exited", json!({ "exitCode": exit_code }));
        events.push(exited);
        let terminated = self.event("terminated", json!({}));
        events.push(terminated);
    }

    fn register_children(&mut self, children: &[TraceVar]) -> i64 {
        if children.is_empty() {
            return 0;
        }
        let reference = LOCALS_REF + 1 + self.references.len() as i64;
        self.references.insert(reference, children.to_vec());
        reference
    }

    fn render(&self, var: &TraceVar, frame: bool) -> String {
        if frame {
            if let Some(v) = &var.frame_value {
                return v.clone();
            }
        }
        match (&var.pretty, self.pretty_loaded) {
            (Some(pretty), true) => pretty.clone(),
            _ => var.value.clone(),
        }
    }

    /// Locals, then arguments, of the current stop
    fn frame_vars(&self) -> impl Iterator<Item = &TraceVar> {
        self.current
            .map(|i| &self.trace.stops[i])
            .into_iter()
            .flat_map(|stop| stop.locals.iter().chain(stop.args.iter()))
    }

    fn process_message(&mut self, message: &Value) -> Option<Vec<Value>> {
        let msg_type = message.get("type")?.as_str()?;

        if msg_type != "request" {
            return None;
        }

        let command = message.get("command")?.as_str()?;
        let request_seq = message.get("seq")?.as_i64()?;
        let arguments = message.get("arguments").cloned().unwrap_or(json!({}));

        let mut events = Vec::new();
        let seq = self.next_seq();

        let (success, body) = match command {
            "initialize" => (
                true,
                json!({
                    "supportsConfigurationDoneRequest": true,
                    "supportsEvaluateForHovers": true,
                    "supportsTerminateRequest": false
                }),
            ),
            "launch" => {
                let program = arguments
                    .get("program")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                let init_commands: Vec<String> = arguments
                    .get("initCommands")
                    .and_then(|v| v.as_array())
                    .map(|a| a.iter().filter_map(|c| c.as_str().map(String::from)).collect())
                    .unwrap_or_default();

                let mut failure = None;
                let mut console = String::new();
                for cmd in &init_commands {
                    let (required, command) = match cmd.strip_prefix('!') {
                        Some(command) => (true, command),
                        None => (false, cmd.as_str()),
                    };
                    console.push_str(&format!("(lldb) {command}\n"));
                    if let Err(e) = self.run_command(command) {
                        console.push_str(&format!("{e}\n"));
                        if required {
                            failure = Some(console.clone());
                            break;
                        }
                    }
                }
                if !console.is_empty() {
                    let output = self.event("output", json!({ "category": "console", "output": console }));
                    events.push(output);
                }
                if failure.is_none() {
                    if self.fail_launch {
                        failure = Some("error: launch failed (mock)".to_string());
                    } else if !Path::new(&program).is_file() {
                        failure = Some(format!("error: unable to find executable '{program}'"));
                    }
                }

                match failure {
                    Some(message) => (false, json!({ "error": { "id": 1, "format": message } })),
                    None => {
                        self.program = Some(program.clone());
                        let initialized = self.event("initialized", json!({}));
                        events.push(initialized);
                        let process = self.event(
                            "process",
                            json!({ "name": program, "systemProcessId": std::process::id() }),
                        );
                        events.push(process);
                        (true, json!(null))
                    }
                }
            }
            "setBreakpoints" => {
                let source = arguments
                    .get("source")
                    .and_then(|s| s.get("path"))
                    .and_then(|p| p.as_str())
                    .unwrap_or("unknown")
                    .to_string();
                let lines: Vec<u32> = arguments
                    .get("breakpoints")
                    .and_then(|b| b.as_array())
                    .map(|a| {
                        a.iter()
                            .filter_map(|bp| bp.get("line").and_then(|l| l.as_u64()))
                            .map(|l| l as u32)
                            .collect()
                    })
                    .unwrap_or_default();

                self.source_path = Some(source.clone());
                self.active_lines.clear();
                let mut breakpoints = Vec::new();
                for line in lines {
                    let next_id = self.next_bp_id;
                    let id = *self
                        .breakpoint_ids
                        .entry((source.clone(), line))
                        .or_insert(next_id);
                    if id == next_id {
                        self.next_bp_id += 1;
                    }
                    self.active_lines.insert(line, id);
                    breakpoints.push(json!({
                        "id": id,
                        "verified": true,
                        "line": line,
                        "source": { "path": source }
                    }));
                }
                (true, json!({ "breakpoints": breakpoints }))
            }
            "configurationDone" => {
                if self.program.is_none() {
                    (false, json!({ "error": { "id": 2, "format": "no target" } }))
                } else {
                    let output = self.event(
                        "output",
                        json!({ "category": "console", "output": "Process launched (mock)\n" }),
                    );
                    events.push(output);
                    self.advance(&mut events);
                    (true, json!(null))
                }
            }
            "continue" => {
                self.advance(&mut events);
                (true, json!({ "allThreadsContinued": true }))
            }
            "threads" => (true, json!({ "threads": [{ "id": 1, "name": "main" }] })),
            "stackTrace" => match self.current {
                Some(i) => {
                    let stop = &self.trace.stops[i];
                    let path = self.source_path.clone().unwrap_or_default();
                    (
                        true,
                        json!({
                            "stackFrames": [{
                                "id": 1,
                                "name": stop.function,
                                "source": { "path": path },
                                "line": stop.line,
                                "column": 1
                            }],
                            "totalFrames": 1
                        }),
                    )
                }
                None => (false, json!({ "error": { "id": 3, "format": "process is running" } })),
            },
            "scopes" => (
                true,
                json!({
                    "scopes": [
                        { "name": "Arguments", "variablesReference": ARGUMENTS_REF, "expensive": false },
                        { "name": "Locals", "variablesReference": LOCALS_REF, "expensive": false },
                        { "name": "Registers", "variablesReference": 2000, "expensive": true }
                    ]
                }),
            ),
            "variables" => {
                let var_ref = arguments
                    .get("variablesReference")
                    .and_then(|v| v.as_i64())
                    .unwrap_or(0);
                let vars = self.references.get(&var_ref).cloned().unwrap_or_default();
                let frame = var_ref == LOCALS_REF || var_ref == ARGUMENTS_REF;
                let rendered: Vec<Value> = vars
                    .iter()
                    .map(|var| {
                        let reference = self.register_children(&var.children);
                        json!({
                            "name": var.name,
                            "value": self.render(var, frame),
                            "type": var.type_name,
                            "variablesReference": reference
                        })
                    })
                    .collect();
                (true, json!({ "variables": rendered }))
            }
            "evaluate" => {
                let expr = arguments
                    .get("expression")
                    .and_then(|e| e.as_str())
                    .unwrap_or("")
                    .to_string();
                let context = arguments.get("context").and_then(|c| c.as_str()).unwrap_or("");

                if context == "repl" {
                    match self.run_command(&expr) {
                        Ok(output) => (true, json!({ "result": output, "variablesReference": 0 })),
                        Err(e) => (false, json!({ "error": { "id": 4, "format": e } })),
                    }
                } else {
                    // Without a frame only globals resolve, and the trace has none
                    let in_frame = arguments.get("frameId").and_then(|f| f.as_i64()).is_some();
                    let found = if in_frame {
                        self.frame_vars().find(|v| v.name == expr).cloned()
                    } else {
                        None
                    };
                    match found {
                        Some(var) => {
                            let reference = self.register_children(&var.children);
                            (
                                true,
                                json!({
                                    "result": self.render(&var, false),
                                    "type": var.type_name,
                                    "variablesReference": reference
                                }),
                            )
                        }
                        None if in_frame => (
                            false,
                            json!({ "error": { "id": 5, "format": format!("use of undeclared identifier '{expr}'") } }),
                        ),
                        None => (
                            false,
                            json!({ "error": { "id": 6, "format": format!("No symbol \"{expr}\" in current context.") } }),
                        ),
                    }
                }
            }
            "disconnect" => {
                self.disconnected = true;
                (true, json!(null))
            }
            _ => (
                false,
                json!({ "error": { "id": 99, "format": format!("Unknown command: {command}") } }),
            ),
        };

        let mut responses = vec![json!({
            "seq": seq,
            "type": "response",
            "request_seq": request_seq,
            "success": success,
            "command": command,
            "body": body
        })];
        responses.extend(events);

        Some(responses)
    }
}
