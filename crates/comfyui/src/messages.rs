//! Typed parsing for backend WebSocket frames.
//!
//! The backend sends JSON frames shaped `{"type": "<kind>", "data":
//! {...}}`. Only the message kinds the completion wait consumes are
//! modeled; anything else fails parsing and is logged and skipped by
//! the caller.

use serde::Deserialize;

/// Backend WebSocket message kinds consumed by the execution wait.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ComfyUIMessage {
    /// Server status broadcast (queue depth).
    #[serde(rename = "status")]
    Status(StatusData),

    /// A queued graph has started executing.
    #[serde(rename = "execution_start")]
    ExecutionStart(ExecutionStartData),

    /// Nodes skipped because their outputs were cached.
    #[serde(rename = "execution_cached")]
    ExecutionCached(ExecutionCachedData),

    /// A node is executing; `node: null` means the graph is done.
    #[serde(rename = "executing")]
    Executing(ExecutingData),

    /// Step-level progress within a long-running node.
    #[serde(rename = "progress")]
    Progress(ProgressData),

    /// A node finished and produced output.
    #[serde(rename = "executed")]
    Executed(ExecutedData),

    /// Execution failed.
    #[serde(rename = "execution_error")]
    ExecutionError(ErrorData),
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusData {
    pub status: QueueStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueStatus {
    pub exec_info: ExecInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecInfo {
    pub queue_remaining: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionStartData {
    pub prompt_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionCachedData {
    pub prompt_id: String,
    #[serde(default)]
    pub nodes: Vec<String>,
}

/// Payload for `executing` frames. `node: None` is the completion
/// signal for the named prompt.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutingData {
    pub node: Option<String>,
    pub prompt_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgressData {
    /// Current step number.
    pub value: i32,
    /// Total number of steps.
    pub max: i32,
}

impl ProgressData {
    /// Completion percentage in [0,100]; zero when `max` is unknown.
    pub fn percent(&self) -> i16 {
        if self.max > 0 {
            ((self.value as f64 / self.max as f64) * 100.0) as i16
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutedData {
    pub node: String,
    /// Raw output value (image filenames, etc.).
    pub output: serde_json::Value,
    pub prompt_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorData {
    pub prompt_id: String,
    pub node_id: String,
    pub exception_message: String,
    pub exception_type: String,
}

/// Parse one text frame into a typed message.
///
/// Returns `Err` for malformed JSON or unknown `type` values; callers
/// log unknown frames and continue reading.
pub fn parse_message(text: &str) -> Result<ComfyUIMessage, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn completion_signal_is_executing_with_null_node() {
        let msg = parse_message(r#"{"type":"executing","data":{"node":null,"prompt_id":"p1"}}"#)
            .unwrap();
        assert_matches!(msg, ComfyUIMessage::Executing(data) => {
            assert!(data.node.is_none());
            assert_eq!(data.prompt_id, "p1");
        });
    }

    #[test]
    fn executing_frame_names_the_current_node() {
        let msg = parse_message(r#"{"type":"executing","data":{"node":"33","prompt_id":"p1"}}"#)
            .unwrap();
        assert_matches!(msg, ComfyUIMessage::Executing(data) => {
            assert_eq!(data.node.as_deref(), Some("33"));
        });
    }

    #[test]
    fn error_frame_carries_node_and_exception() {
        let json = r#"{"type":"execution_error","data":{"prompt_id":"p1","node_id":"3","exception_message":"CUDA out of memory","exception_type":"RuntimeError"}}"#;
        assert_matches!(parse_message(json).unwrap(), ComfyUIMessage::ExecutionError(data) => {
            assert_eq!(data.node_id, "3");
            assert_eq!(data.exception_type, "RuntimeError");
            assert_eq!(data.exception_message, "CUDA out of memory");
        });
    }

    #[test]
    fn progress_percent_is_computed_from_steps() {
        let json = r#"{"type":"progress","data":{"value":2,"max":4}}"#;
        assert_matches!(parse_message(json).unwrap(), ComfyUIMessage::Progress(data) => {
            assert_eq!(data.percent(), 50);
        });
    }

    #[test]
    fn progress_percent_with_zero_max_is_zero() {
        let data = ProgressData { value: 3, max: 0 };
        assert_eq!(data.percent(), 0);
    }

    #[test]
    fn status_frame_reports_queue_depth() {
        let json = r#"{"type":"status","data":{"status":{"exec_info":{"queue_remaining":0}}}}"#;
        assert_matches!(parse_message(json).unwrap(), ComfyUIMessage::Status(data) => {
            assert_eq!(data.status.exec_info.queue_remaining, 0);
        });
    }

    #[test]
    fn executed_frame_keeps_raw_output() {
        let json = r#"{"type":"executed","data":{"node":"9","output":{"images":[{"filename":"ComfyUI_00001_.png"}]},"prompt_id":"p1"}}"#;
        assert_matches!(parse_message(json).unwrap(), ComfyUIMessage::Executed(data) => {
            assert_eq!(data.node, "9");
            assert!(data.output["images"].is_array());
        });
    }

    #[test]
    fn cached_frame_defaults_to_no_nodes() {
        let json = r#"{"type":"execution_cached","data":{"prompt_id":"p1"}}"#;
        assert_matches!(parse_message(json).unwrap(), ComfyUIMessage::ExecutionCached(data) => {
            assert!(data.nodes.is_empty());
        });
    }

    #[test]
    fn unknown_kind_and_bad_json_fail_parsing() {
        assert!(parse_message(r#"{"type":"execution_success","data":{}}"#).is_err());
        assert!(parse_message("definitely not json").is_err());
    }
}
