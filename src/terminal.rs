//! Interactive rendering of a streaming completion.

use std::io::Write;

use colored::Colorize;

use crate::hooks::{DisplayEvent, StreamSink};

const REASONING_RULE: &str = "────────────────────";

/// Writes tokens as they arrive; reasoning is dimmed and fenced by rules.
pub struct TerminalSink<W: Write> {
    out: W,
    wrote_output: bool,
}

impl TerminalSink<std::io::Stdout> {
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            wrote_output: false,
        }
    }

    /// Whether anything has been printed yet.
    #[must_use]
    pub fn wrote_output(&self) -> bool {
        self.wrote_output
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, text: &str) {
        self.wrote_output = true;
        write!(self.out, "{text}").ok();
        self.out.flush().ok();
    }
}

impl<W: Write> StreamSink for TerminalSink<W> {
    fn on_token(&mut self, text: &str) {
        self.write(text);
    }

    fn on_reasoning(&mut self, text: &str) {
        let dimmed = text.dimmed().to_string();
        self.write(&dimmed);
    }

    fn on_display(&mut self, event: DisplayEvent) {
        let line = match event {
            DisplayEvent::ReasoningStart => {
                format!("{} {}\n", "thinking".dimmed().italic(), REASONING_RULE.dimmed())
            }
            DisplayEvent::ReasoningEnd => format!("\n{}\n", REASONING_RULE.dimmed()),
            DisplayEvent::ToolCallStarted { name } => {
                let prefix = if self.wrote_output { "\n" } else { "" };
                format!("{prefix}{} {}\n", "→".cyan(), name.bold())
            }
        };
        self.write(&line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_tokens_reasoning_and_tool_calls() {
        let mut sink = TerminalSink::new(Vec::new());
        assert!(!sink.wrote_output());
        sink.on_display(DisplayEvent::ReasoningStart);
        sink.on_reasoning("plan");
        sink.on_display(DisplayEvent::ReasoningEnd);
        sink.on_token("Hello");
        sink.on_display(DisplayEvent::ToolCallStarted {
            name: "read_file".to_string(),
        });
        assert!(sink.wrote_output());

        let out = String::from_utf8(sink.into_inner()).expect("utf8 output");
        assert!(out.contains("thinking"));
        assert!(out.contains("plan"));
        assert!(out.contains("Hello"));
        assert!(out.contains("read_file"));
        assert!(out.find("plan") < out.find("Hello"));
    }
}
