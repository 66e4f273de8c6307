//! Clock-face formatting shared by timer displays and note timestamps.

/// `M:SS` below an hour, `H:MM:SS` from an hour up. Minutes are not padded in
/// the short form (`2:05`, `12:00`).
pub fn format_clock(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

/// Overtime is rendered with a leading `+`.
pub fn format_overtime(seconds: u64) -> String {
    format!("+{}", format_clock(seconds))
}
