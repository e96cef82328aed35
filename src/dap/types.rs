//! DAP message types
//!
//! Only the requests, responses and events the harness drives are modelled.
//! See: https://microsoft.github.io/debug-adapter-protocol/specification

use serde::{Deserialize, Serialize};
use serde_json::Value;

// === Base Protocol Messages ===

/// DAP response message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub seq: i64,
    pub request_seq: i64,
    pub success: bool,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl ResponseMessage {
    /// Best error text a failed response offers
    ///
    /// Adapters put the user-facing text either in `message` or in
    /// `body.error.format`.
    pub fn error_text(&self) -> String {
        self.body
            .as_ref()
            .and_then(|b| b.get("error"))
            .and_then(|e| e.get("format"))
            .and_then(|f| f.as_str())
            .map(String::from)
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "Unknown error".to_string())
    }
}

/// DAP event message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub seq: i64,
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

// === Request Arguments ===

/// Initialize request arguments
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeArguments {
    pub client_id: String,
    pub client_name: String,
    #[serde(rename = "adapterID")]
    pub adapter_id: String,
    pub lines_start_at1: bool,
    pub columns_start_at1: bool,
    pub path_format: String,
    pub supports_variable_type: bool,
}

impl InitializeArguments {
    pub fn new(adapter_id: &str) -> Self {
        Self {
            client_id: "pptest".to_string(),
            client_name: "Pretty-printer test harness".to_string(),
            adapter_id: adapter_id.to_string(),
            lines_start_at1: true,
            columns_start_at1: true,
            path_format: "path".to_string(),
            supports_variable_type: true,
        }
    }
}

/// Launch request arguments
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchArguments {
    pub program: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    pub stop_on_entry: bool,
    /// lldb-dap: commands run before the target is created
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub init_commands: Vec<String>,
}

/// SetBreakpoints request arguments
#[derive(Debug, Clone, Serialize)]
pub struct SetBreakpointsArguments {
    pub source: Source,
    pub breakpoints: Vec<SourceBreakpoint>,
}

/// Thread-scoped request arguments (continue)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinueArguments {
    pub thread_id: i64,
}

/// StackTrace request arguments
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceArguments {
    pub thread_id: i64,
    pub start_frame: i64,
    pub levels: i64,
}

/// Scopes request arguments
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopesArguments {
    pub frame_id: i64,
}

/// Variables request arguments
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariablesArguments {
    pub variables_reference: i64,
}

/// Evaluate request arguments
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateArguments {
    pub expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<i64>,
    pub context: EvaluateContext,
}

/// Where an evaluate request comes from; adapters treat them differently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluateContext {
    /// Expression evaluation
    Watch,
    /// Debugger console command
    Repl,
}

/// Disconnect request arguments
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectArguments {
    pub terminate_debuggee: bool,
}

// === Response Bodies ===

/// Capabilities returned by initialize response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    #[serde(default)]
    pub supports_configuration_done_request: bool,
    #[serde(default)]
    pub supports_evaluate_for_hovers: bool,
    #[serde(default)]
    pub supports_terminate_request: bool,
}

/// SetBreakpoints response body
#[derive(Debug, Clone, Deserialize)]
pub struct SetBreakpointsResponseBody {
    pub breakpoints: Vec<Breakpoint>,
}

/// StackTrace response body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceResponseBody {
    pub stack_frames: Vec<StackFrame>,
}

/// Threads response body
#[derive(Debug, Clone, Deserialize)]
pub struct ThreadsResponseBody {
    pub threads: Vec<Thread>,
}

/// Scopes response body
#[derive(Debug, Clone, Deserialize)]
pub struct ScopesResponseBody {
    pub scopes: Vec<Scope>,
}

/// Variables response body
#[derive(Debug, Clone, Deserialize)]
pub struct VariablesResponseBody {
    pub variables: Vec<Variable>,
}

/// Evaluate response body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponseBody {
    pub result: String,
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    #[serde(default)]
    pub variables_reference: i64,
}

// === Common Types ===

/// Source location
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Breakpoint to set at a source location
#[derive(Debug, Clone, Serialize)]
pub struct SourceBreakpoint {
    pub line: u32,
}

/// Breakpoint information
#[derive(Debug, Clone, Deserialize)]
pub struct Breakpoint {
    pub id: Option<u32>,
    pub verified: bool,
    pub message: Option<String>,
    pub line: Option<u32>,
}

/// Stack frame
#[derive(Debug, Clone, Deserialize)]
pub struct StackFrame {
    pub id: i64,
    pub name: String,
    pub source: Option<Source>,
    pub line: u32,
}

/// Thread
#[derive(Debug, Clone, Deserialize)]
pub struct Thread {
    pub id: i64,
    pub name: String,
}

/// Scope
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub name: String,
    pub variables_reference: i64,
    #[serde(default)]
    pub expensive: bool,
}

/// Variable
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub name: String,
    pub value: String,
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    #[serde(default)]
    pub variables_reference: i64,
}

// === Event Bodies ===

/// Stopped event body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoppedEventBody {
    pub reason: String,
    pub description: Option<String>,
    pub thread_id: Option<i64>,
    #[serde(default)]
    pub hit_breakpoint_ids: Vec<u32>,
}

/// Output event body
#[derive(Debug, Clone, Deserialize)]
pub struct OutputEventBody {
    pub category: Option<String>,
    pub output: String,
}

/// Exited event body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitedEventBody {
    pub exit_code: i32,
}

/// Process event body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessEventBody {
    pub name: String,
    pub system_process_id: Option<u32>,
}

// === Parsed Events ===

/// Parsed DAP event
#[derive(Debug, Clone)]
pub enum Event {
    Initialized,
    Stopped(StoppedEventBody),
    Exited(ExitedEventBody),
    Terminated,
    Process(ProcessEventBody),
    Output(OutputEventBody),
    Unknown { event: String, body: Option<Value> },
}

impl Event {
    /// Parse an event from an EventMessage
    ///
    /// Bodies that fail to deserialize degrade to `Unknown` instead of
    /// failing the whole session.
    pub fn from_message(msg: EventMessage) -> Self {
        fn parse<T: serde::de::DeserializeOwned>(body: &Option<Value>) -> Option<T> {
            body.as_ref()
                .and_then(|b| serde_json::from_value(b.clone()).ok())
        }

        let parsed = match msg.event.as_str() {
            "initialized" => Some(Event::Initialized),
            "terminated" => Some(Event::Terminated),
            "stopped" => parse(&msg.body).map(Event::Stopped),
            "exited" => Some(Event::Exited(
                parse(&msg.body).unwrap_or(ExitedEventBody { exit_code: 0 }),
            )),
            "process" => parse(&msg.body).map(Event::Process),
            "output" => parse(&msg.body).map(Event::Output),
            _ => None,
        };

        parsed.unwrap_or(Event::Unknown {
            event: msg.event,
            body: msg.body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(name: &str, body: Value) -> EventMessage {
        EventMessage {
            seq: 1,
            event: name.to_string(),
            body: Some(body),
        }
    }

    #[test]
    fn test_stopped_event_with_hit_ids() {
        let ev = Event::from_message(event(
            "stopped",
            json!({"reason": "breakpoint", "threadId": 7, "hitBreakpointIds": [2]}),
        ));
        match ev {
            Event::Stopped(body) => {
                assert_eq!(body.reason, "breakpoint");
                assert_eq!(body.thread_id, Some(7));
                assert_eq!(body.hit_breakpoint_ids, vec![2]);
            }
            other => panic!("Expected Stopped, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_stopped_event_is_unknown() {
        let ev = Event::from_message(event("stopped", json!({"threadId": 1})));
        assert!(matches!(ev, Event::Unknown { event, .. } if event == "stopped"));
    }

    #[test]
    fn test_exited_without_body_defaults_to_zero() {
        let ev = Event::from_message(EventMessage {
            seq: 3,
            event: "exited".to_string(),
            body: None,
        });
        assert!(matches!(ev, Event::Exited(ExitedEventBody { exit_code: 0 })));
    }

    #[test]
    fn test_error_text_prefers_formatted_body() {
        let response: ResponseMessage = serde_json::from_value(json!({
            "seq": 4, "request_seq": 2, "success": false, "command": "evaluate",
            "message": "error",
            "body": {"error": {"id": 1, "format": "use of undeclared identifier 'q'"}}
        }))
        .unwrap();
        assert_eq!(response.error_text(), "use of undeclared identifier 'q'");
    }

    #[test]
    fn test_launch_arguments_skip_empty_fields() {
        let args = LaunchArguments {
            program: "/tmp/a_cc__".to_string(),
            ..Default::default()
        };
        let value = serde_json::to_value(&args).unwrap();
        assert_eq!(value, json!({"program": "/tmp/a_cc__", "stopOnEntry": false}));
    }
}
