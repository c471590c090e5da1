//! Unit Tests for Keyword Completion and Completeness Checks

use smlnj_kernel::completion::{complete, is_complete, SML_KEYWORDS};
use smlnj_kernel::kernel::protocol::{Completeness, ReplyStatus};

#[test]
fn test_every_keyword_completes_from_its_first_letter() {
    for keyword in SML_KEYWORDS {
        let prefix = &keyword[..1];
        let reply = complete(prefix, 1);
        assert!(
            reply.matches.iter().any(|m| *m == keyword),
            "{} missing from completions of {:?}",
            keyword,
            prefix
        );
    }
}

#[test]
fn test_full_keyword_completes_to_itself() {
    let reply = complete("datatype", 8);
    assert_eq!(reply.matches, vec!["datatype"]);
    assert_eq!(reply.cursor_start, 0);
}

#[test]
fn test_prefix_shared_by_several_keywords() {
    let reply = complete("let x = e", 9);
    assert_eq!(reply.matches, vec!["else", "end", "exception"]);
    assert_eq!(reply.cursor_start, 8);
    assert_eq!(reply.cursor_end, 9);
    assert_eq!(reply.status, ReplyStatus::Ok);
}

#[test]
fn test_word_after_punctuation() {
    let reply = complete("(fn x => ra", 11);
    assert_eq!(reply.matches, vec!["raise"]);
    assert_eq!(reply.cursor_start, 9);
}

#[test]
fn test_cursor_in_middle_of_code() {
    let code = "va x = 1; val y = 2;";
    let reply = complete(code, 2);
    assert_eq!(reply.matches, vec!["val"]);
    assert_eq!((reply.cursor_start, reply.cursor_end), (0, 2));
}

#[test]
fn test_cursor_counts_characters_not_bytes() {
    let code = "val λ = ca";
    let cursor = code.chars().count();
    let reply = complete(code, cursor);
    assert_eq!(reply.matches, vec!["case"]);
    assert_eq!(reply.cursor_start, cursor - 2);
    assert_eq!(reply.cursor_end, cursor);
}

#[test]
fn test_empty_code() {
    let reply = complete("", 0);
    assert!(reply.matches.is_empty());
    assert_eq!((reply.cursor_start, reply.cursor_end), (0, 0));
    assert!(reply.metadata.is_empty());
}

#[test]
fn test_is_complete_verdicts() {
    assert_eq!(is_complete("").status, Completeness::Complete);
    assert_eq!(is_complete("\n\t ").status, Completeness::Complete);
    assert_eq!(is_complete("val x = 1;   \n").status, Completeness::Unknown);
    assert_eq!(is_complete("(* comment *)").status, Completeness::Unknown);
    assert_eq!(is_complete("let val x = 1").status, Completeness::Incomplete);
    assert_eq!(is_complete("(* open comment").status, Completeness::Incomplete);
}

#[test]
fn test_is_complete_indent_only_when_incomplete() {
    assert_eq!(is_complete("val x = 1;").indent, None);
    assert_eq!(is_complete("val x =").indent.as_deref(), Some(""));
}
