//! Prompt detection and output cleaning.
//!
//! Interactive network shells do not frame their responses; the only signal
//! that a command has finished is the prompt reappearing at the end of the
//! output. The heuristic here tests whether the last line of accumulated
//! output ends with one of a fixed set of prompt markers.
//!
//! The test is inherently approximate: output whose final line happens to
//! end in a marker is misclassified as a prompt and the read stops early.
//! That is an accepted limitation of scraping a human-oriented terminal.

/// Marker strings a prompt line ends with, covering common interactive
/// shells and network-device modes.
const PROMPT_MARKERS: [&str; 6] = [">", "#", "$", "%", "(enable)", "(config)"];

/// Check whether a single line, trailing whitespace trimmed, is a prompt.
pub(crate) fn line_is_prompt(line: &str) -> bool {
    let trimmed = line.trim_end();
    if trimmed.is_empty() {
        return false;
    }
    PROMPT_MARKERS.iter().any(|marker| trimmed.ends_with(marker))
}

/// Check whether accumulated output currently ends at a prompt.
pub(crate) fn is_prompt(text: &str) -> bool {
    let last_line = text.rsplit('\n').next().unwrap_or("");
    line_is_prompt(last_line)
}

/// Byte-buffer variant of [`is_prompt`]; only the final line is decoded.
pub(crate) fn buffer_ends_with_prompt(buffer: &[u8]) -> bool {
    let tail = match memchr::memrchr(b'\n', buffer) {
        Some(pos) => &buffer[pos + 1..],
        None => buffer,
    };
    line_is_prompt(&String::from_utf8_lossy(tail))
}

/// Clean raw command output: drop everything up to and including the first
/// line containing the echoed command, drop the final line if it is itself
/// a prompt, and trim trailing blank lines.
///
/// Text with no command echo is kept whole, so cleaning already-clean
/// output returns it unchanged (after trailing-blank-line trimming).
pub(crate) fn clean_output(raw: &str, command: &str) -> String {
    let lines: Vec<&str> = raw.split('\n').collect();

    let echo = if command.is_empty() {
        None
    } else {
        lines.iter().position(|line| line.contains(command))
    };
    let mut kept: Vec<&str> = match echo {
        Some(idx) => lines[idx + 1..].to_vec(),
        None => lines,
    };

    if kept.last().is_some_and(|line| line_is_prompt(line)) {
        kept.pop();
    }

    while kept.last().is_some_and(|line| line.trim().is_empty()) {
        kept.pop();
    }

    kept.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_prompts_match() {
        assert!(is_prompt("switch1#"));
        assert!(is_prompt("router1>"));
        assert!(is_prompt("user@host:~$"));
        assert!(is_prompt("host% "));
        assert!(is_prompt("switch1 (enable)"));
        assert!(is_prompt("router1(config)"));
    }

    #[test]
    fn prompt_after_output_matches() {
        assert!(is_prompt("Cisco IOS Software\nswitch1#"));
        assert!(is_prompt("line one\r\nswitch1# "));
    }

    #[test]
    fn non_prompts_do_not_match() {
        assert!(!is_prompt("Building configuration..."));
        assert!(!is_prompt("switch1# show version\nCisco IOS Software,"));
        assert!(!is_prompt(""));
        // A trailing newline means the last line is blank.
        assert!(!is_prompt("switch1#\n"));
    }

    #[test]
    fn buffer_variant_agrees_with_text_variant() {
        assert!(buffer_ends_with_prompt(b"banner\nswitch1#"));
        assert!(buffer_ends_with_prompt(b"switch1#"));
        assert!(!buffer_ends_with_prompt(b"banner\nloading"));
        assert!(!buffer_ends_with_prompt(b""));
    }

    #[test]
    fn clean_drops_echo_and_prompt() {
        let raw = "show version\r\nCisco IOS Software\r\nuptime is 1 week\r\nswitch1#";
        let cleaned = clean_output(raw, "show version");
        assert_eq!(cleaned, "Cisco IOS Software\r\nuptime is 1 week\r");
    }

    #[test]
    fn clean_drops_leading_junk_before_echo() {
        let raw = "\nswitch1# show clock\n12:00:00 UTC\nswitch1#";
        assert_eq!(clean_output(raw, "show clock"), "12:00:00 UTC");
    }

    #[test]
    fn clean_trims_trailing_blank_lines() {
        let raw = "show clock\n12:00:00 UTC\n\n   \nswitch1#";
        assert_eq!(clean_output(raw, "show clock"), "12:00:00 UTC");
    }

    #[test]
    fn clean_is_idempotent_on_clean_text() {
        let cleaned = "Cisco IOS Software\nuptime is 1 week";
        assert_eq!(clean_output(cleaned, "show version"), cleaned);
        assert_eq!(
            clean_output(&clean_output(cleaned, "show version"), "show version"),
            cleaned
        );
    }

    #[test]
    fn clean_without_echo_keeps_everything() {
        let raw = "no echo here\njust output";
        assert_eq!(clean_output(raw, "show version"), raw);
    }

    #[test]
    fn clean_empty_command_keeps_output() {
        assert_eq!(clean_output("banner text", ""), "banner text");
    }
}
