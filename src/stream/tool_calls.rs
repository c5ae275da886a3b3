//! Reassembly of streamed tool-call fragments.

use crate::logging;
use crate::models::ToolCall;
use crate::stream::sse::ToolCallDelta;

/// In-progress tool call.
#[derive(Debug, Default)]
struct PendingCall {
    id: String,
    name: String,
    arguments: String,
}

/// Merges tool-call deltas into complete calls.
///
/// Calls are kept in arrival order. The provider-supplied `index` is not
/// trusted: a delta with an `id` opens a new call and every delta without one
/// extends the most recently opened call.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: Vec<PendingCall>,
}

/// What a delta did to the accumulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaOutcome {
    /// A new call was opened with this function name.
    Opened { name: String },
    Extended,
    /// No call was open to receive the fragment.
    Dropped,
}

impl ToolCallAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn push(&mut self, delta: ToolCallDelta) -> DeltaOutcome {
        let ToolCallDelta {
            index,
            id,
            function_name,
            function_arguments,
        } = delta;

        if let Some(id) = id {
            // Some providers echo the id on every fragment of the same call.
            let repeats_open_call = self.calls.last().is_some_and(|call| call.id == id);
            if !repeats_open_call {
                let name = function_name.unwrap_or_default();
                self.calls.push(PendingCall {
                    id,
                    name: name.clone(),
                    arguments: function_arguments.unwrap_or_default(),
                });
                return DeltaOutcome::Opened { name };
            }
        }

        let Some(call) = self.calls.last_mut() else {
            logging::warn(format!(
                "Dropping tool call fragment for index {index}: no open tool call"
            ));
            return DeltaOutcome::Dropped;
        };
        if let Some(arguments) = function_arguments {
            call.arguments.push_str(&arguments);
        }
        DeltaOutcome::Extended
    }

    /// Finalize every open call, in arrival order.
    #[must_use]
    pub fn finish(self) -> Vec<ToolCall> {
        self.calls
            .into_iter()
            .map(|call| ToolCall::new(call.id, call.name, call.arguments))
            .collect()
    }
}
