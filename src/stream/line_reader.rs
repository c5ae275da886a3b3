//! Newline-delimited record reader over a fragmented byte stream.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};

/// Longest line kept in full; anything past it is discarded up to the next
/// line feed.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Yields complete lines from a stream of byte chunks.
///
/// Chunk boundaries may fall anywhere, including inside a `\r\n` pair or a
/// multi-byte UTF-8 sequence; lines are only decoded once complete.
pub struct LineReader<S> {
    source: S,
    chunk: Bytes,
    pos: usize,
    line: Vec<u8>,
    has_partial: bool,
    max_line: usize,
    finished: bool,
}

impl<S, E> LineReader<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    pub fn new(source: S) -> Self {
        Self::with_max_line_bytes(source, MAX_LINE_BYTES)
    }

    pub fn with_max_line_bytes(source: S, max_line: usize) -> Self {
        Self {
            source,
            chunk: Bytes::new(),
            pos: 0,
            line: Vec::new(),
            has_partial: false,
            max_line,
            finished: false,
        }
    }

    /// Next line without its terminator, or `None` once the stream is
    /// exhausted. Unterminated trailing bytes are returned once as a final
    /// line.
    pub async fn next_line(&mut self) -> Result<Option<String>, E> {
        loop {
            if self.pos < self.chunk.len() {
                let rest = self.chunk.slice(self.pos..);
                match rest.iter().position(|&b| b == b'\n') {
                    Some(i) => {
                        self.push_capped(&rest[..i]);
                        self.pos += i + 1;
                        return Ok(Some(self.take_line()));
                    }
                    None => {
                        self.push_capped(&rest);
                        self.pos = self.chunk.len();
                    }
                }
            }

            if self.finished {
                if self.has_partial {
                    return Ok(Some(self.take_line()));
                }
                return Ok(None);
            }

            match self.source.next().await {
                Some(Ok(chunk)) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                Some(Err(err)) => return Err(err),
                None => self.finished = true,
            }
        }
    }

    fn push_capped(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.has_partial = true;
        let room = self.max_line.saturating_sub(self.line.len());
        self.line.extend_from_slice(&bytes[..bytes.len().min(room)]);
    }

    fn take_line(&mut self) -> String {
        if self.line.last() == Some(&b'\r') {
            self.line.pop();
        }
        self.has_partial = false;
        let line = String::from_utf8_lossy(&self.line).into_owned();
        self.line.clear();
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    use futures_util::stream;

    async fn collect_lines(chunks: Vec<Vec<u8>>, max_line: usize) -> Vec<String> {
        let source = stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<Bytes, Infallible>(Bytes::from(c))),
        );
        let mut reader = LineReader::with_max_line_bytes(source, max_line);
        let mut lines = Vec::new();
        while let Some(line) = reader.next_line().await.expect("infallible") {
            lines.push(line);
        }
        assert!(reader.next_line().await.expect("infallible").is_none());
        lines
    }

    const SAMPLE: &str = "data: {\"choices\":[{\"delta\":{\"content\":\"héllo\"}}]}\r\n\r\n: keep-alive\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"日本\"}}]}\n\ndata: [DONE]\n";

    #[tokio::test]
    async fn whole_stream_yields_lines() {
        let lines = collect_lines(vec![SAMPLE.as_bytes().to_vec()], MAX_LINE_BYTES).await;
        assert_eq!(
            lines,
            vec![
                "data: {\"choices\":[{\"delta\":{\"content\":\"héllo\"}}]}",
                "",
                ": keep-alive",
                "",
                "data: {\"choices\":[{\"delta\":{\"content\":\"日本\"}}]}",
                "",
                "data: [DONE]",
            ]
        );
    }

    /// Every single split and every pair of splits must produce the same
    /// lines as one whole read.
    async fn assert_split_invariant(bytes: &[u8], max_line: usize) -> Vec<String> {
        let expected = collect_lines(vec![bytes.to_vec()], max_line).await;
        for first in 0..=bytes.len() {
            let chunks = vec![bytes[..first].to_vec(), bytes[first..].to_vec()];
            assert_eq!(
                collect_lines(chunks, max_line).await,
                expected,
                "split at {first}"
            );
            for second in first..=bytes.len() {
                let chunks = vec![
                    bytes[..first].to_vec(),
                    bytes[first..second].to_vec(),
                    bytes[second..].to_vec(),
                ];
                assert_eq!(
                    collect_lines(chunks, max_line).await,
                    expected,
                    "splits at {first} and {second}"
                );
            }
        }
        expected
    }

    #[tokio::test]
    async fn any_fragmentation_matches_whole_read() {
        assert_split_invariant(SAMPLE.as_bytes(), MAX_LINE_BYTES).await;
    }

    #[tokio::test]
    async fn capped_lines_and_crlf_survive_any_fragmentation() {
        let sample = "data: abcdefghijkl\r\nabcdefgh\r\nabcdefg\r\n\r\nok";
        let lines = assert_split_invariant(sample.as_bytes(), 8).await;
        assert_eq!(lines, vec!["data: ab", "abcdefgh", "abcdefg", "", "ok"]);
    }

    #[tokio::test]
    async fn byte_at_a_time_matches_whole_read() {
        let bytes = SAMPLE.as_bytes();
        let expected = collect_lines(vec![bytes.to_vec()], MAX_LINE_BYTES).await;
        let chunks = bytes.iter().map(|b| vec![*b]).collect();
        assert_eq!(collect_lines(chunks, MAX_LINE_BYTES).await, expected);
    }

    #[tokio::test]
    async fn unterminated_tail_is_returned_once() {
        let lines = collect_lines(vec![b"a\nb".to_vec(), b"c".to_vec()], MAX_LINE_BYTES).await;
        assert_eq!(lines, vec!["a", "bc"]);
    }

    #[tokio::test]
    async fn empty_stream_has_no_lines() {
        assert!(collect_lines(Vec::new(), MAX_LINE_BYTES).await.is_empty());
        assert!(collect_lines(vec![Vec::new()], MAX_LINE_BYTES).await.is_empty());
    }

    #[tokio::test]
    async fn long_lines_are_truncated_without_losing_the_next_line() {
        let lines = collect_lines(
            vec![b"abcdef".to_vec(), b"ghij\nnext\n".to_vec()],
            4,
        )
        .await;
        assert_eq!(lines, vec!["abcd", "next"]);
    }

    #[tokio::test]
    async fn source_errors_propagate() {
        let source = stream::iter(vec![
            Ok(Bytes::from_static(b"first\n")),
            Err("boom"),
        ]);
        let mut reader = LineReader::new(source);
        assert_eq!(reader.next_line().await, Ok(Some("first".to_string())));
        assert_eq!(reader.next_line().await, Err("boom"));
    }
}
