//! Panic hook that records panics in the log file.
//!
//! The default panic handler writes to stderr only, which is lost once the
//! terminal closes. This hook routes the panic location and message through
//! `tracing` first, so the crash lands in the session log, then chains to
//! the original hook for the usual stderr output.

use std::panic::{self, PanicHookInfo};

/// Install the panic hook.
///
/// Call once, early in startup, after logging is initialized. The previous
/// hook is preserved and still runs after ours.
pub fn init() {
    let original_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| {
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown location".to_string());

        tracing::error!(
            location = %location,
            message = %panic_message(info),
            "Panic, shutting down"
        );

        original_hook(info);
    }));
}

/// Extracts the payload as text, covering the two payload types `panic!`
/// actually produces.
fn panic_message(info: &PanicHookInfo<'_>) -> String {
    if let Some(message) = info.payload().downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = info.payload().downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_from_str_payload() {
        let result = panic::catch_unwind(|| panic!("literal message"));
        assert!(result.is_err());

        // catch_unwind gives us the payload directly; exercise the same
        // downcast order the hook uses.
        let payload = result.unwrap_err();
        let text = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            String::new()
        };
        assert_eq!(text, "literal message");
    }

    #[test]
    fn test_panic_message_from_formatted_payload() {
        let result = panic::catch_unwind(|| panic!("job {} failed", 42));
        let payload = result.unwrap_err();
        let text = payload.downcast_ref::<String>().cloned().unwrap_or_default();
        assert_eq!(text, "job 42 failed");
    }
}
