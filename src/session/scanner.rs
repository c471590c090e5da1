//! Incremental prompt scanning
//!
//! Output from the REPL arrives in arbitrary chunks. The scanner accumulates
//! it and looks for the earliest match of either prompt pattern, the same way
//! an expect-style driver does.

use regex::Regex;

use crate::error::Result;

/// Longest prompt match the scanner can find across chunk boundaries
///
/// A failed search is resumed this many bytes before the end of the text it
/// already covered, so a prompt cut in half by a chunk boundary is still found.
pub const PROMPT_LOOKBACK: usize = 64;

/// Which prompt the REPL showed after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptOutcome {
    /// Ready for a new top-level command
    Primary,
    /// Waiting for more input to finish the current statement
    Continuation,
}

/// Location of a prompt inside the scan buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptMatch {
    pub outcome: PromptOutcome,
    pub start: usize,
    pub end: usize,
}

/// Buffers child output and matches it against the two prompt patterns
#[derive(Debug)]
pub struct PromptScanner {
    primary: Regex,
    continuation: Regex,
    /// Decoded text not yet consumed by a prompt match
    buffer: String,
    /// Trailing bytes of an incomplete UTF-8 sequence
    pending: Vec<u8>,
    /// Text that preceded the most recent prompt match
    before: String,
    /// Offset into `buffer` before which no prompt can start
    resume_at: usize,
}

impl PromptScanner {
    /// Compile both prompt patterns
    pub fn new(primary: &str, continuation: &str) -> Result<Self> {
        Ok(Self {
            primary: Regex::new(primary)?,
            continuation: Regex::new(continuation)?,
            buffer: String::new(),
            pending: Vec::new(),
            before: String::new(),
            resume_at: 0,
        })
    }

    /// Append a chunk of raw output
    pub fn feed(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    self.pending.clear();
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    // The prefix up to `valid` is well-formed
                    self.buffer
                        .push_str(std::str::from_utf8(&self.pending[..valid]).unwrap_or_default());
                    match e.error_len() {
                        // Sequence is cut off at the end of the chunk; wait for more bytes
                        None => {
                            self.pending.drain(..valid);
                            return;
                        }
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                    }
                }
            }
        }
    }

    /// Find the earliest prompt in the buffer; ties go to the primary prompt
    ///
    /// Only text fed since the last failed search, plus [`PROMPT_LOOKBACK`]
    /// bytes, is searched. Anchors still see the whole buffer.
    pub fn find_prompt(&self) -> Option<PromptMatch> {
        let start = self.resume_at;
        let primary = self.primary.find_at(&self.buffer, start).map(|m| PromptMatch {
            outcome: PromptOutcome::Primary,
            start: m.start(),
            end: m.end(),
        });
        let continuation = self
            .continuation
            .find_at(&self.buffer, start)
            .map(|m| PromptMatch {
                outcome: PromptOutcome::Continuation,
                start: m.start(),
                end: m.end(),
            });

        match (primary, continuation) {
            (Some(p), Some(c)) if c.start < p.start => Some(c),
            (Some(p), _) => Some(p),
            (None, c) => c,
        }
    }

    /// Look for a prompt and, if found, consume everything up to its end
    pub fn scan(&mut self) -> Option<PromptOutcome> {
        let Some(found) = self.find_prompt() else {
            self.resume_at = self.lookback_start();
            return None;
        };
        self.before = self.buffer[..found.start].to_string();
        self.buffer.drain(..found.end);
        self.resume_at = 0;
        Some(found.outcome)
    }

    fn lookback_start(&self) -> usize {
        let mut start = self.buffer.len().saturating_sub(PROMPT_LOOKBACK);
        while !self.buffer.is_char_boundary(start) {
            start -= 1;
        }
        start
    }

    /// Text that preceded the most recent prompt match
    pub fn before(&self) -> &str {
        &self.before
    }

    /// Move whatever is left in the buffer into `before`, as happens at end-of-stream
    pub fn flush_remaining(&mut self) -> &str {
        if !self.pending.is_empty() {
            self.buffer
                .push_str(&String::from_utf8_lossy(&std::mem::take(&mut self.pending)));
        }
        self.before = std::mem::take(&mut self.buffer);
        self.resume_at = 0;
        &self.before
    }

    /// Unconsumed text
    pub fn buffered(&self) -> &str {
        &self.buffer
    }
}
