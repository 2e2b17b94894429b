//! Output sanitizer — neutralizes terminal-injection payloads echoed back
//! from the transcription server before they ever reach the clipboard.
//!
//! # Policy
//!
//! 1. Strip ANSI CSI (`ESC [ … [mGKH]`) and OSC title (`ESC ] 0 ; … BEL`)
//!    escape sequences.
//! 2. Apply a strict whitelist: keep only `0x20..=0x7E` plus `\n`, `\r`,
//!    `\t`. Drop everything else, including NUL, DEL, all C0/C1 controls,
//!    and all non-ASCII code points.
//! 3. Trim leading/trailing whitespace.
//!
//! Both regexes compile to Rust's `regex` crate automaton, which is
//! DFA/NFA-based and never backtracks — the whole pipeline is linear in
//! the input length, so malicious server payloads can't trigger a ReDoS.

use std::sync::OnceLock;

use regex::Regex;

fn ansi_escape_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\x1b\[[0-9;]*[mGKH]|\x1b\]0;.*?\x07").expect("static ANSI regex is valid")
    })
}

fn whitelist_complement_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[^\x20-\x7E\n\r\t]").expect("static whitelist regex is valid")
    })
}

/// Sanitize server-returned text before it is copied to the clipboard.
///
/// Returns an empty string if `text` is empty, cleans to empty, or if
/// sanitization fails internally (fail-secure — the caller must treat an
/// empty result as "do not paste").
pub fn sanitize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let without_ansi = ansi_escape_regex().replace_all(text, "");
    let whitelisted = whitelist_complement_regex().replace_all(&without_ansi, "");
    let trimmed = whitelisted.trim();

    if trimmed != text {
        log::warn!("sanitizer neutralized control sequences or non-whitelisted characters");
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_returns_empty() {
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn strips_csi_color_codes() {
        assert_eq!(sanitize("\x1b[31mExploit\x1b[0m"), "Exploit");
    }

    #[test]
    fn strips_osc_title_sequence() {
        assert_eq!(sanitize("Safe\x1b]0;Evil Title\x07Text"), "SafeText");
    }

    #[test]
    fn drops_null_and_non_whitelisted_bytes() {
        assert_eq!(sanitize("Valid\x00Truncated?"), "ValidTruncated?");
    }

    #[test]
    fn keeps_plain_ascii_unchanged() {
        assert_eq!(sanitize("hello world"), "hello world");
    }

    #[test]
    fn keeps_newlines_tabs_and_carriage_returns() {
        assert_eq!(sanitize("a\nb\tc\r"), "a\nb\tc");
    }

    #[test]
    fn drops_non_ascii() {
        assert_eq!(sanitize("caf\u{e9}"), "caf");
    }

    #[test]
    fn trims_leading_and_trailing_whitespace() {
        assert_eq!(sanitize("   hello   "), "hello");
    }

    #[test]
    fn idempotent() {
        let inputs = [
            "\x1b[31mExploit\x1b[0m",
            "Safe\x1b]0;Evil Title\x07Text",
            "Valid\x00Truncated?",
            "plain text",
            "",
        ];
        for input in inputs {
            let once = sanitize(input);
            let twice = sanitize(&once);
            assert_eq!(once, twice, "sanitize not idempotent for {input:?}");
        }
    }

    #[test]
    fn large_clean_input_is_processed_linearly() {
        let input = "a".repeat(100) + "!";
        assert_eq!(sanitize(&input), input);
    }

    #[test]
    fn whitespace_only_input_cleans_to_empty() {
        assert_eq!(sanitize("   \t  "), "");
    }
}
