//! Human-readable formatting for durations and probe latencies
//!
//! Everything here feeds log lines and the run summary, so output favours
//! brevity over precision.

/// Render a millisecond count compactly.
///
/// Below one second the value stays in milliseconds. Below a minute it becomes
/// fractional seconds (two decimals, one from 10s up). Longer spans are split
/// into `h`/`m`/`s` parts and zero parts are left out, e.g. `1h5s`.
pub fn format_duration(millis: u64) -> String {
    match millis {
        0..1_000 => format!("{millis}ms"),
        1_000..10_000 => format!("{:.2}s", millis as f64 / 1000.0),
        10_000..60_000 => format!("{:.1}s", millis as f64 / 1000.0),
        _ => {
            let total_seconds = millis / 1000;
            let parts = [
                (total_seconds / 3600, 'h'),
                ((total_seconds % 3600) / 60, 'm'),
                (total_seconds % 60, 's'),
            ];
            parts
                .iter()
                .filter(|(value, _)| *value > 0)
                .map(|(value, unit)| format!("{value}{unit}"))
                .collect()
        }
    }
}

/// Formats a probe latency; failed probes (infinite latency) render as `unreachable`
pub fn format_latency(millis: f64) -> String {
    if !millis.is_finite() {
        return "unreachable".to_string();
    }
    if millis < 10.0 {
        format!("{:.2}ms", millis)
    } else if millis < 1000.0 {
        format!("{:.1}ms", millis)
    } else {
        format_duration(millis.round() as u64)
    }
}

/// Share of `part` in `total` as a percentage string
pub fn format_ratio(part: usize, total: usize) -> String {
    if total == 0 {
        return "0.0%".to_string();
    }
    format!("{:.1}%", part as f64 * 100.0 / total as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0ms");
        assert_eq!(format_duration(500), "500ms");
        assert_eq!(format_duration(1000), "1.00s");
        assert_eq!(format_duration(1500), "1.50s");
        assert_eq!(format_duration(10000), "10.0s");
        assert_eq!(format_duration(60000), "1m");
        assert_eq!(format_duration(90000), "1m30s");
        assert_eq!(format_duration(3600000), "1h");
        assert_eq!(format_duration(3661000), "1h1m1s");
        assert_eq!(format_duration(3605000), "1h5s");
        assert_eq!(format_duration(59_999), "60.0s");
    }

    #[test]
    fn test_format_latency() {
        assert_eq!(format_latency(2.5), "2.50ms");
        assert_eq!(format_latency(42.0), "42.0ms");
        assert_eq!(format_latency(1500.0), "1.50s");
        assert_eq!(format_latency(f64::INFINITY), "unreachable");
    }

    #[test]
    fn test_format_ratio() {
        assert_eq!(format_ratio(0, 0), "0.0%");
        assert_eq!(format_ratio(1, 4), "25.0%");
        assert_eq!(format_ratio(3, 3), "100.0%");
    }
}
