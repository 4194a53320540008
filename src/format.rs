use std::time::Duration;

const COUNT_UNITS: [&str; 6] = ["", "K", "M", "B", "T", "Q"];
const SIZE_UNITS: [&str; 5] = ["K", "M", "G", "T", "P"];

/// Scale a raw count into a unit-suffixed string: decimal (SI) steps,
/// three significant digits, round-half-up.
pub fn format_count(count: u64) -> String {
    let mut value = count as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit + 1 < COUNT_UNITS.len() {
        value /= 1000.0;
        unit += 1;
    }
    format!("{}{}", format_scaled(value), COUNT_UNITS[unit])
}

/// Scale a byte size into a unit-suffixed string: binary steps. `long_form`
/// expands "K" to "KB" and so on; a plain "B" is never doubled.
pub fn format_data_size(bytes: u64, long_form: bool) -> String {
    let mut value = bytes as f64;
    let mut unit = None;
    for candidate in SIZE_UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = Some(candidate);
    }
    let unit = match unit {
        None => "B".to_string(),
        Some(u) if long_form => format!("{u}B"),
        Some(u) => u.to_string(),
    };
    format!("{}{}", format_scaled(value), unit)
}

/// Rows (or similar counts) per second over the elapsed duration. A zero
/// duration yields a zero rate rather than an error.
pub fn format_count_rate(count: u64, elapsed: Duration, long_form: bool) -> String {
    let mut formatted = format_count(per_second(count, elapsed));
    if long_form {
        let unpadded = formatted.trim_end().len();
        formatted.truncate(unpadded);
        formatted.push_str("/s");
    }
    formatted
}

/// Bytes per second over the elapsed duration, zero on a zero duration.
pub fn format_data_rate(bytes: u64, elapsed: Duration, long_form: bool) -> String {
    let mut formatted = format_data_size(per_second(bytes, elapsed), false);
    if long_form {
        if !formatted.ends_with('B') {
            formatted.push('B');
        }
        formatted.push_str("/s");
    }
    formatted
}

/// Elapsed wall time as m:ss.
pub fn format_time(elapsed: Duration) -> String {
    let total_seconds = elapsed.as_secs();
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

fn per_second(value: u64, elapsed: Duration) -> u64 {
    let rate = value as f64 / elapsed.as_secs_f64();
    if rate.is_finite() {
        rate as u64
    } else {
        0
    }
}

/// Three significant digits: <10 gets two decimals, <100 one, else none.
/// Half-up rounding, trailing zeros trimmed (1.00 renders as "1").
fn format_scaled(value: f64) -> String {
    let decimals: usize = if value < 10.0 {
        2
    } else if value < 100.0 {
        1
    } else {
        0
    };
    let scale = 10f64.powi(decimals as i32);
    let rounded = (value * scale + 0.5).floor() / scale;
    let mut formatted = format!("{rounded:.decimals$}");
    if formatted.contains('.') {
        let trimmed = formatted.trim_end_matches('0').trim_end_matches('.').len();
        formatted.truncate(trimmed);
    }
    formatted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_scales_at_powers_of_one_thousand() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1K");
        assert_eq!(format_count(1250), "1.25K");
        assert_eq!(format_count(12_500), "12.5K");
        assert_eq!(format_count(125_000), "125K");
        assert_eq!(format_count(1_500_000), "1.5M");
        assert_eq!(format_count(2_000_000_000), "2B");
        assert_eq!(format_count(3_000_000_000_000), "3T");
        assert_eq!(format_count(4_000_000_000_000_000), "4Q");
    }

    #[test]
    fn data_size_scales_at_powers_of_1024() {
        assert_eq!(format_data_size(0, false), "0B");
        assert_eq!(format_data_size(1023, false), "1023B");
        assert_eq!(format_data_size(1024, false), "1K");
        assert_eq!(format_data_size(1536, false), "1.5K");
        assert_eq!(format_data_size(1024 * 1024, false), "1M");
    }

    #[test]
    fn long_form_expands_units_but_never_doubles_b() {
        assert_eq!(format_data_size(1024 * 1024, true), "1MB");
        assert_eq!(format_data_size(1024, true), "1KB");
        assert_eq!(format_data_size(512, true), "512B");
    }

    #[test]
    fn rates_divide_by_elapsed_seconds() {
        let elapsed = Duration::from_secs(2);
        assert_eq!(format_count_rate(3000, elapsed, false), "1.5K");
        assert_eq!(format_count_rate(3000, elapsed, true), "1.5K/s");
        assert_eq!(format_data_rate(4096, elapsed, false), "2K");
        assert_eq!(format_data_rate(4096, elapsed, true), "2KB/s");
        assert_eq!(format_data_rate(100, elapsed, true), "50B/s");
    }

    #[test]
    fn zero_duration_rates_are_zero_not_an_error() {
        assert_eq!(format_count_rate(1_000_000, Duration::ZERO, true), "0/s");
        assert_eq!(format_data_rate(1_000_000, Duration::ZERO, true), "0B/s");
        assert_eq!(format_data_rate(1_000_000, Duration::ZERO, false), "0B");
    }

    #[test]
    fn time_renders_minutes_and_padded_seconds() {
        assert_eq!(format_time(Duration::ZERO), "0:00");
        assert_eq!(format_time(Duration::from_secs(17)), "0:17");
        assert_eq!(format_time(Duration::from_secs(95)), "1:35");
        assert_eq!(format_time(Duration::from_secs(3600)), "60:00");
    }
}
