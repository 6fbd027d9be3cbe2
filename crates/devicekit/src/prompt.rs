//! Prompt detection and output cleanup for interactive CLI sessions.

use regex::Regex;
use std::sync::LazyLock;

static DEVICE_PROMPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[\w.\-@/:]+(?:\([\w.\-/ ]+\))?[#>]\s*\z")
        .expect("device prompt regex is valid")
});

static CONFIRM_PROMPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\[confirm\]|\[yes/no\]|\[y/n\]|\(y/n\)|continue\?)\s*[:?]?\s*\z")
        .expect("confirmation regex is valid")
});

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("escape regex is valid"));

/// What the device is waiting for at the end of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waiting {
    /// Ready for the next command
    Command,
    /// Asking to confirm the previous command
    Confirmation,
}

/// Check whether `buffer` ends in a prompt.
pub fn detect(buffer: &str) -> Option<Waiting> {
    if CONFIRM_PROMPT.is_match(buffer) {
        Some(Waiting::Confirmation)
    } else if DEVICE_PROMPT.is_match(buffer) {
        Some(Waiting::Command)
    } else {
        None
    }
}

/// Whether the prompt at the end of `buffer` is a configuration-mode prompt.
pub fn is_config_mode(buffer: &str) -> bool {
    buffer
        .lines()
        .next_back()
        .is_some_and(|last| last.contains("(config"))
}

/// Normalize raw terminal bytes: strip ANSI escapes and carriage returns.
pub fn normalize(raw: &str) -> String {
    ANSI_ESCAPE.replace_all(raw, "").replace('\r', "")
}

/// Strip the echoed command (first line) and the trailing prompt line.
pub fn command_output(buffer: &str, command: &str) -> String {
    let mut lines: Vec<&str> = buffer.lines().collect();

    if lines
        .first()
        .is_some_and(|first| first.trim_end().ends_with(command.trim()))
    {
        lines.remove(0);
    }

    if lines.last().is_some_and(|last| detect(last).is_some()) {
        lines.pop();
    }

    lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_exec_prompts() {
        assert_eq!(detect("Router#"), Some(Waiting::Command));
        assert_eq!(detect("output\nedge-1.lab>"), Some(Waiting::Command));
        assert_eq!(detect("edge1(config)# "), Some(Waiting::Command));
        assert_eq!(detect("edge1(config-if)#"), Some(Waiting::Command));
    }

    #[test]
    fn test_partial_output_is_not_a_prompt() {
        assert_eq!(detect("username expert privilege 15"), None);
        assert_eq!(detect("Router#show run\nusername a"), None);
    }

    #[test]
    fn test_detects_confirmation() {
        let text = "This operation will remove all username related configurations \
                    with same name.Do you want to continue? [confirm]";
        assert_eq!(detect(text), Some(Waiting::Confirmation));
        assert_eq!(detect("Proceed? [yes/no]: "), Some(Waiting::Confirmation));
    }

    #[test]
    fn test_config_mode_prompt() {
        assert!(is_config_mode("Enter configuration commands\nedge1(config)#"));
        assert!(!is_config_mode("edge1#"));
    }

    #[test]
    fn test_normalize_strips_escapes() {
        assert_eq!(normalize("\x1b[Kline\r\n"), "line\n");
    }

    #[test]
    fn test_command_output_strips_echo_and_prompt() {
        let buffer = "edge1#show run | include ^username\n\
                      username expert privilege 15 secret 9 x\n\
                      username bob secret 5 y\n\
                      edge1#";
        let out = command_output(buffer, "show run | include ^username");
        assert_eq!(
            out,
            "username expert privilege 15 secret 9 x\nusername bob secret 5 y"
        );
    }
}
