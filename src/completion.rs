//! Keyword Completion and Completeness Checks
//!
//! Both are static heuristics that run without touching the REPL.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Map;

use crate::kernel::protocol::{CompleteReply, Completeness, IsCompleteReply, ReplyStatus};

/// Keywords offered for completion, in sorted order
pub const SML_KEYWORDS: [&str; 23] = [
    "andalso",
    "case",
    "datatype",
    "else",
    "end",
    "exception",
    "false",
    "fn",
    "fun",
    "handle",
    "if",
    "in",
    "int",
    "let",
    "of",
    "orelse",
    "raise",
    "real",
    "then",
    "true",
    "type",
    "use",
    "val",
];

static TRAILING_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w+)$").expect("valid regex"));

/// Complete the word that ends at `cursor_pos` (a character offset into `code`)
pub fn complete(code: &str, cursor_pos: usize) -> CompleteReply {
    let before_cursor: String = code.chars().take(cursor_pos).collect();
    let cursor = before_cursor.chars().count();

    let mut reply = CompleteReply {
        status: ReplyStatus::Ok,
        matches: Vec::new(),
        cursor_start: cursor,
        cursor_end: cursor,
        metadata: Map::new(),
    };

    let Some(word) = TRAILING_WORD.find(&before_cursor) else {
        return reply;
    };
    let word = word.as_str();

    let matches: Vec<String> = SML_KEYWORDS
        .iter()
        .filter(|keyword| keyword.starts_with(word))
        .map(|keyword| keyword.to_string())
        .collect();

    if !matches.is_empty() {
        reply.cursor_start = cursor - word.chars().count();
        reply.matches = matches;
    }
    reply
}

/// Guess whether `code` is ready to run
///
/// Text ending in a statement terminator or a comment close might be complete;
/// anything else is reported as incomplete so the front-end keeps reading lines.
pub fn is_complete(code: &str) -> IsCompleteReply {
    let stripped = code.trim_end();
    if stripped.is_empty() {
        IsCompleteReply {
            status: Completeness::Complete,
            indent: None,
        }
    } else if stripped.ends_with("*)") || stripped.ends_with(';') {
        IsCompleteReply {
            status: Completeness::Unknown,
            indent: None,
        }
    } else {
        IsCompleteReply {
            status: Completeness::Incomplete,
            indent: Some(String::new()),
        }
    }
}
