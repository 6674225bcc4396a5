//! Human-readable media time formatting
//!
//! Stream positions and lengths are carried as milliseconds everywhere; this
//! module renders them for log lines and status output.

/// Streams shorter than this render without an hours field
const HOUR_MS: u64 = 3_600_000;

/// Format a media time in milliseconds.
///
/// - Below one hour: `M:SS.mmm`
/// - One hour and above: `H:MM:SS`
///
/// # Examples
///
/// ```
/// use totem_common::human_time::format_media_time;
///
/// assert_eq!(format_media_time(0), "0:00.000");
/// assert_eq!(format_media_time(5_250), "0:05.250");
/// assert_eq!(format_media_time(125_000), "2:05.000");
/// assert_eq!(format_media_time(3_723_000), "1:02:03");
/// ```
pub fn format_media_time(ms: u64) -> String {
    if ms >= HOUR_MS {
        let total_secs = ms / 1000;
        let hours = total_secs / 3600;
        let mins = (total_secs % 3600) / 60;
        let secs = total_secs % 60;
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        let mins = ms / 60_000;
        let secs = (ms % 60_000) / 1000;
        let millis = ms % 1000;
        format!("{}:{:02}.{:03}", mins, secs, millis)
    }
}

/// Format a media time that may be unknown.
///
/// Unknown (`None` or zero) lengths render as `--:--`, which is how live
/// streams are displayed.
///
/// # Examples
///
/// ```
/// use totem_common::human_time::format_stream_length;
///
/// assert_eq!(format_stream_length(None), "--:--");
/// assert_eq!(format_stream_length(Some(0)), "--:--");
/// assert_eq!(format_stream_length(Some(61_000)), "1:01.000");
/// ```
pub fn format_stream_length(length_ms: Option<u64>) -> String {
    match length_ms {
        Some(ms) if ms > 0 => format_media_time(ms),
        _ => "--:--".to_string(),
    }
}
