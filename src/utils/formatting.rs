/// Human-readable duration: `45s`, `2m 5s`, `1h 3m`. Sub-second values
/// round down to `0s`.
pub fn format_duration(ms: u64) -> String {
    let secs = ms / 1000;
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

pub fn format_percentage(fraction: f64) -> String {
    let pct = if fraction.is_finite() { fraction.clamp(0.0, 1.0) * 100.0 } else { 0.0 };
    format!("{:.1}%", pct)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration_seconds() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(999), "0s");
        assert_eq!(format_duration(45_000), "45s");
    }

    #[test]
    fn test_format_duration_minutes() {
        assert_eq!(format_duration(60_000), "1m 0s");
        assert_eq!(format_duration(125_000), "2m 5s");
    }

    #[test]
    fn test_format_duration_hours() {
        assert_eq!(format_duration(3_600_000), "1h 0m");
        assert_eq!(format_duration(3_780_000), "1h 3m");
    }

    #[test]
    fn test_format_percentage() {
        assert_eq!(format_percentage(2.0 / 3.0), "66.7%");
        assert_eq!(format_percentage(0.0), "0.0%");
        assert_eq!(format_percentage(1.5), "100.0%");
        assert_eq!(format_percentage(f64::NAN), "0.0%");
    }
}
