//! First-observation error reporting: log with a cleaned call stack, then
//! register with the error-tracking collaborator.

use crate::fault::Fault;
use crate::hub::Hub;

/// Path fragments identifying vendored/third-party frames, removed from
/// logged call stacks.
pub const VENDOR_ROOTS: &[&str] = &[".cargo/registry", ".cargo/git", "/rustc/"];

/// Report a fault observed for the first time.
///
/// Logs an error header naming the failing operation, the fault's message,
/// and each remaining frame of the cleaned call stack, then registers the
/// fault with the hub's error tracker. The caller re-raises afterwards;
/// reporting never swallows the error.
pub(crate) fn report(fault: &Fault, qualified_name: &str, hub: &Hub) {
    tracing::error!(operation = qualified_name, "An error occurred in {qualified_name}");
    tracing::error!("{}", fault.message());
    for frame in fault.clean_frames() {
        tracing::error!("{frame}");
    }
    hub.register_error(fault);
}

/// Remove frames whose path lies under a known vendored root.
///
/// A rendered std backtrace pairs each symbol line with an indented
/// `at path:line` line; when the location is vendored both lines go. An
/// empty rendering (backtraces disabled) yields no frames.
pub fn clean_backtrace(rendered: &str) -> Vec<String> {
    let mut frames: Vec<String> = Vec::new();
    for line in rendered.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if VENDOR_ROOTS.iter().any(|root| trimmed.contains(root)) {
            // Drop the symbol line this vendored location belongs to.
            if trimmed.starts_with("at ")
                && frames.last().is_some_and(|prev| !prev.trim_start().starts_with("at "))
            {
                frames.pop();
            }
            continue;
        }
        frames.push(line.trim_end().to_string());
    }
    frames
}
