//! Caller-supplied side effects of a streaming completion.
//!
//! Parsing and accumulation never depend on these; swapping in [`SilentSink`]
//! and [`NeverCancel`] leaves the stream state machine unchanged.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

/// Presentation cues emitted while streaming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    /// First reasoning chunk after non-reasoning output.
    ReasoningStart,
    /// Reasoning gave way to content or a tool call.
    ReasoningEnd,
    /// The model opened a tool call.
    ToolCallStarted { name: String },
}

/// Receives streamed output as it arrives.
pub trait StreamSink {
    /// New answer text.
    fn on_token(&mut self, text: &str);

    /// New reasoning text.
    fn on_reasoning(&mut self, _text: &str) {}

    fn on_display(&mut self, _event: DisplayEvent) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSink;

impl StreamSink for SilentSink {
    fn on_token(&mut self, _text: &str) {}
}

/// Non-blocking cancellation poll, checked once per stream line.
pub trait CancelCheck {
    fn should_cancel(&self) -> bool;
}

/// Never cancels.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverCancel;

impl CancelCheck for NeverCancel {
    fn should_cancel(&self) -> bool {
        false
    }
}

impl CancelCheck for CancellationToken {
    fn should_cancel(&self) -> bool {
        self.is_cancelled()
    }
}

impl CancelCheck for AtomicBool {
    fn should_cancel(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

impl<F: Fn() -> bool> CancelCheck for F {
    fn should_cancel(&self) -> bool {
        self()
    }
}

/// Cancel `token` on the first interrupt. Resolves to `true` on a second
/// interrupt, when the stream has not reached a line boundary in time and the
/// caller should give up waiting. Resolves to `false` if the interrupt
/// listener fails.
pub async fn cancel_on_interrupt<F, Fut>(token: CancellationToken, mut interrupt: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if interrupt().await.is_err() {
        return false;
    }
    token.cancel();
    interrupt().await.is_ok()
}
