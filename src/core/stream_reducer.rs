//! Folds gateway stream chunks into chat message state.

use std::sync::Arc;

use crate::api::StreamChunk;
use crate::core::constants::UNKNOWN_STREAM_ERROR;
use crate::core::message::MessageListState;

/// Result of folding one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamReduction {
    pub state: MessageListState,
    /// Message the caller should surface to the user (toast, status line).
    pub ui_message: Option<String>,
    /// Thread identity reported by the gateway for a newly created thread.
    pub new_thread_id: Option<String>,
}

impl StreamReduction {
    fn state_only(state: MessageListState) -> Self {
        Self {
            state,
            ui_message: None,
            new_thread_id: None,
        }
    }
}

/// Apply `chunk` to `state`. Pure and infallible; the caller is responsible
/// for turning transport failures into an `Error` chunk before calling this.
pub fn reduce(
    mut state: MessageListState,
    chunk: &StreamChunk,
    streaming_message_id: &str,
) -> StreamReduction {
    match chunk {
        StreamChunk::Delta { delta } => {
            if delta.is_empty() {
                return StreamReduction::state_only(state);
            }
            if let Some(message) = state
                .messages
                .iter_mut()
                .find(|message| message.id == streaming_message_id)
            {
                Arc::make_mut(message).content.push_str(delta);
            }
            StreamReduction::state_only(state)
        }
        StreamChunk::ToolCall {
            tool_calls,
            tool_name,
        } => {
            // A call without any name keeps the previous task label.
            let name = tool_name.clone().or_else(|| {
                tool_calls
                    .as_ref()
                    .and_then(|calls| calls.first())
                    .and_then(|call| call.name.clone())
            });
            if let Some(name) = name {
                state.active_assistant_task = Some(name);
            }
            StreamReduction::state_only(state)
        }
        StreamChunk::ToolResult { .. } => {
            state.active_assistant_task = None;
            StreamReduction::state_only(state)
        }
        StreamChunk::Done { thread_id, .. } => {
            state.streaming_message_id = None;
            state.active_assistant_task = None;
            StreamReduction {
                state,
                ui_message: None,
                new_thread_id: thread_id.clone(),
            }
        }
        StreamChunk::Error { error } => {
            state.streaming_message_id = None;
            state.active_assistant_task = None;
            let message = error
                .as_deref()
                .filter(|text| !text.trim().is_empty())
                .unwrap_or(UNKNOWN_STREAM_ERROR)
                .to_string();
            StreamReduction {
                state,
                ui_message: Some(message),
                new_thread_id: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ToolCallInfo;
    use crate::core::message::ChatMessage;

    fn streaming_state() -> MessageListState {
        let mut state = MessageListState::with_messages([
            ChatMessage::user("u1", "Say hello"),
            ChatMessage::assistant("m1", "Hel"),
        ]);
        state.streaming_message_id = Some("m1".into());
        state
    }

    fn tool_call(name: Option<&str>, first_call: Option<&str>) -> StreamChunk {
        StreamChunk::ToolCall {
            tool_calls: first_call.map(|n| {
                vec![ToolCallInfo {
                    id: Some("c1".into()),
                    name: Some(n.into()),
                    arguments: None,
                }]
            }),
            tool_name: name.map(str::to_string),
        }
    }

    #[test]
    fn delta_appends_only_to_streaming_message() {
        let before = streaming_state();
        let out = reduce(before.clone(), &StreamChunk::delta("lo"), "m1");

        assert_eq!(out.state.find("m1").map(|m| m.content.as_str()), Some("Hello"));
        assert!(Arc::ptr_eq(&before.messages[0], &out.state.messages[0]));
        assert_eq!(before.find("m1").map(|m| m.content.as_str()), Some("Hel"));
        assert_eq!(out.state.streaming_message_id.as_deref(), Some("m1"));
        assert!(out.ui_message.is_none());
        assert!(out.new_thread_id.is_none());
    }

    #[test]
    fn empty_delta_leaves_state_untouched() {
        let before = streaming_state();
        let out = reduce(before.clone(), &StreamChunk::delta(""), "m1");
        assert_eq!(out.state, before);
        assert!(Arc::ptr_eq(&before.messages[1], &out.state.messages[1]));
    }

    #[test]
    fn delta_for_unknown_message_changes_nothing() {
        let before = streaming_state();
        let out = reduce(before.clone(), &StreamChunk::delta("x"), "gone");
        assert_eq!(out.state, before);
    }

    #[test]
    fn tool_call_prefers_explicit_name_then_first_call() {
        let out = reduce(
            streaming_state(),
            &tool_call(Some("search"), Some("ignored")),
            "m1",
        );
        assert_eq!(out.state.active_assistant_task.as_deref(), Some("search"));

        let out = reduce(streaming_state(), &tool_call(None, Some("fetch")), "m1");
        assert_eq!(out.state.active_assistant_task.as_deref(), Some("fetch"));
    }

    #[test]
    fn nameless_tool_call_keeps_previous_task() {
        let mut state = streaming_state();
        state.active_assistant_task = Some("search".into());
        let out = reduce(state.clone(), &tool_call(None, None), "m1");
        assert_eq!(out.state, state);
    }

    #[test]
    fn tool_result_clears_task_without_touching_content() {
        let mut state = streaming_state();
        state.active_assistant_task = Some("search".into());
        let out = reduce(
            state.clone(),
            &StreamChunk::ToolResult {
                tool_result: Some(serde_json::json!({"hits": 3})),
            },
            "m1",
        );
        assert!(out.state.active_assistant_task.is_none());
        assert_eq!(out.state.messages, state.messages);
    }

    #[test]
    fn done_ends_stream_and_reports_thread() {
        let mut state = streaming_state();
        state.active_assistant_task = Some("search".into());
        let out = reduce(
            state,
            &StreamChunk::Done {
                finish_reason: Some("stop".into()),
                usage: None,
                thread_id: Some("t1".into()),
            },
            "m1",
        );
        assert!(out.state.streaming_message_id.is_none());
        assert!(out.state.active_assistant_task.is_none());
        assert_eq!(out.new_thread_id.as_deref(), Some("t1"));

        let out = reduce(streaming_state(), &StreamChunk::done(), "m1");
        assert!(out.new_thread_id.is_none());
    }

    #[test]
    fn error_ends_stream_and_keeps_partial_content() {
        let mut state = streaming_state();
        state.active_assistant_task = Some("search".into());
        let out = reduce(state, &StreamChunk::error("rate limited"), "m1");

        assert!(out.state.streaming_message_id.is_none());
        assert!(out.state.active_assistant_task.is_none());
        assert_eq!(out.ui_message.as_deref(), Some("rate limited"));
        assert_eq!(out.state.find("m1").map(|m| m.content.as_str()), Some("Hel"));
    }

    #[test]
    fn error_without_message_uses_default_text() {
        let out = reduce(streaming_state(), &StreamChunk::Error { error: None }, "m1");
        let text = out.ui_message.expect("default message");
        assert!(!text.is_empty());
        assert_eq!(text, UNKNOWN_STREAM_ERROR);

        let out = reduce(streaming_state(), &StreamChunk::error("  \n"), "m1");
        assert_eq!(out.ui_message.as_deref(), Some(UNKNOWN_STREAM_ERROR));
    }

    #[test]
    fn error_text_is_surfaced_as_given() {
        let out = reduce(streaming_state(), &StreamChunk::error(" quota exceeded\n"), "m1");
        assert_eq!(out.ui_message.as_deref(), Some(" quota exceeded\n"));
    }

    #[test]
    fn full_tool_assisted_stream_folds_in_order() {
        let mut state = MessageListState::with_messages([ChatMessage::assistant("m1", "")]);
        state.streaming_message_id = Some("m1".into());

        let chunks = [
            tool_call(Some("search"), None),
            StreamChunk::delta("Hello "),
            StreamChunk::delta("world"),
            StreamChunk::ToolResult { tool_result: None },
            StreamChunk::Done {
                finish_reason: None,
                usage: None,
                thread_id: Some("abc".into()),
            },
        ];

        let mut new_thread_id = None;
        for chunk in &chunks {
            let out = reduce(state, chunk, "m1");
            state = out.state;
            if out.new_thread_id.is_some() {
                new_thread_id = out.new_thread_id;
            }
        }

        assert_eq!(state.find("m1").map(|m| m.content.as_str()), Some("Hello world"));
        assert!(state.active_assistant_task.is_none());
        assert!(state.streaming_message_id.is_none());
        assert_eq!(new_thread_id.as_deref(), Some("abc"));
    }
}
