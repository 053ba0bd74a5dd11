//! Server timestamps for response annotation.

use chrono::{Local, SecondsFormat};

/// Current local time as RFC 3339 with offset, e.g. `2026-10-19T14:03:22+02:00`.
///
/// Whole seconds; a zero offset is written as `Z`.
pub fn now_rfc3339() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
