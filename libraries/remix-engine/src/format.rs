//! Display formatting for the playback and rate surfaces

use std::time::Duration;

/// Placeholder for unknown times
pub const EMPTY_CLOCK: &str = "00:00";

/// Format seconds as `MM:SS`
///
/// Non-finite or negative input renders as `00:00`. Minutes are not wrapped
/// at 60, so long files show e.g. `75:03`.
pub fn format_clock_secs(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return EMPTY_CLOCK.to_string();
    }
    let whole = seconds.floor() as u64;
    format!("{:02}:{:02}", whole / 60, whole % 60)
}

/// Format an optional duration as `MM:SS`
pub fn format_clock(time: Option<Duration>) -> String {
    time.map(|t| format_clock_secs(t.as_secs_f64()))
        .unwrap_or_else(|| EMPTY_CLOCK.to_string())
}

/// `position / duration` label shown next to the transport
pub fn format_time_label(position: Option<Duration>, duration: Option<Duration>) -> String {
    format!("{} / {}", format_clock(position), format_clock(duration))
}

/// Rate label, e.g. `1.50×`
pub fn format_multiplier(value: f64) -> String {
    format!("{value:.2}×")
}

/// File extension for a recorder MIME type
///
/// Parameters such as `;codecs=opus` are ignored.
pub fn extension_for_mime(mime_type: &str) -> Option<&'static str> {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "audio/webm" | "video/webm" => Some("webm"),
        "audio/ogg" | "video/ogg" => Some("ogg"),
        "audio/wav" | "audio/wave" | "audio/x-wav" => Some("wav"),
        "audio/mp4" | "video/mp4" => Some("m4a"),
        "audio/mpeg" => Some("mp3"),
        "audio/flac" => Some("flac"),
        _ => None,
    }
}

/// Artifact file name: `<basename>-<suffix>.<extension>`
pub fn artifact_file_name(basename: &str, suffix: &str, extension: &str) -> String {
    format!("{basename}-{suffix}.{extension}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_formatting() {
        assert_eq!(format_clock_secs(0.0), "00:00");
        assert_eq!(format_clock_secs(59.99), "00:59");
        assert_eq!(format_clock_secs(61.0), "01:01");
        assert_eq!(format_clock_secs(3723.0), "62:03");
        assert_eq!(format_clock_secs(f64::NAN), "00:00");
        assert_eq!(format_clock_secs(f64::INFINITY), "00:00");
    }

    #[test]
    fn time_label_with_unknown_duration() {
        assert_eq!(
            format_time_label(Some(Duration::from_secs(5)), None),
            "00:05 / 00:00"
        );
        assert_eq!(format_time_label(None, None), "00:00 / 00:00");
    }

    #[test]
    fn multiplier_has_two_decimals() {
        assert_eq!(format_multiplier(1.0), "1.00×");
        assert_eq!(format_multiplier(1.5), "1.50×");
        assert_eq!(format_multiplier(1.234), "1.23×");
    }

    #[test]
    fn mime_to_extension() {
        assert_eq!(extension_for_mime("audio/webm;codecs=opus"), Some("webm"));
        assert_eq!(extension_for_mime("audio/wav"), Some("wav"));
        assert_eq!(extension_for_mime("application/octet-stream"), None);
    }

    #[test]
    fn artifact_name() {
        assert_eq!(artifact_file_name("song", "remix", "webm"), "song-remix.webm");
    }
}
