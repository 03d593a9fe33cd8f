//! Per-connection stream session state.

use crate::streaming::chunk::StreamFrame;
use crate::types::ResourceKind;

/// One agent-initiated tool invocation observed mid-stream.
///
/// Created when an "add" delta announces the call; its `submit_id` arrives
/// asynchronously through a later correlation event; consumed once the
/// resolved result has been spliced into the output.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    /// Vendor-assigned id, unique within one stream session.
    pub id: String,
    pub name: String,
    pub arguments: String,
    pub submit_id: Option<String>,
    pub resource_type: Option<ResourceKind>,
    pub resolved: bool,
}

impl ToolCallRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
            submit_id: None,
            resource_type: None,
            resolved: false,
        }
    }
}

/// Mutable state owned by exactly one translator/orchestrator pair.
///
/// `started` and `finished` each flip true at most once; `finalize` is the
/// single site allowed to emit the terminal marker, and every write after
/// `finished` is dropped.
#[derive(Debug)]
pub struct StreamSession {
    pub model: String,
    started: bool,
    finished: bool,
    agent_finished: bool,
    pub(crate) current_tool_call_id: Option<String>,
    /// Pending tool calls in submission order.
    pub(crate) pending_tool_calls: Vec<ToolCallRecord>,
    pub(crate) expected_tool_count: usize,
    pub(crate) received_tool_results: usize,
    /// Guards resolution dispatch against double firing.
    pub(crate) has_processed_tools: bool,
}

impl StreamSession {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            started: false,
            finished: false,
            agent_finished: false,
            current_tool_call_id: None,
            pending_tool_calls: Vec::new(),
            expected_tool_count: 0,
            received_tool_results: 0,
            has_processed_tools: false,
        }
    }

    pub fn started(&self) -> bool {
        self.started
    }

    pub fn finished(&self) -> bool {
        self.finished
    }

    pub fn agent_finished(&self) -> bool {
        self.agent_finished
    }

    pub(crate) fn mark_started(&mut self) {
        self.started = true;
    }

    pub(crate) fn mark_agent_finished(&mut self) {
        self.agent_finished = true;
    }

    /// Append a frame unless the session has already finished.
    pub(crate) fn emit(&self, frame: StreamFrame, out: &mut Vec<StreamFrame>) {
        if !self.finished {
            out.push(frame);
        }
    }

    /// The one place the terminal marker comes from. Returns it on the
    /// first call and `None` ever after.
    pub fn finalize(&mut self) -> Option<StreamFrame> {
        if self.finished {
            None
        } else {
            self.finished = true;
            Some(StreamFrame::Done)
        }
    }
}
