//! Aggregate functions over columnar string values.
//!
//! Numeric aggregates coerce element-wise with best-effort parsing and
//! silently skip unparsable values; `mode` and `string_concat` treat values
//! as opaque strings.

fn parse_values(values: &[String]) -> Vec<f64> {
    values
        .iter()
        .filter_map(|v| v.trim().parse::<f64>().ok())
        .collect()
}

/// Sum of the parseable values; 0 for an empty set.
#[must_use]
pub fn sum(values: &[String]) -> f64 {
    parse_values(values).iter().sum()
}

/// Arithmetic mean of the parseable values; 0 for an empty set.
#[must_use]
pub fn mean(values: &[String]) -> f64 {
    let nums = parse_values(values);
    if nums.is_empty() {
        return 0.0;
    }
    nums.iter().sum::<f64>() / nums.len() as f64
}

/// Minimum of the parseable values; +inf when none parse.
#[must_use]
pub fn min(values: &[String]) -> f64 {
    parse_values(values).into_iter().fold(f64::INFINITY, f64::min)
}

/// Maximum of the parseable values; -inf when none parse.
#[must_use]
pub fn max(values: &[String]) -> f64 {
    parse_values(values)
        .into_iter()
        .fold(f64::NEG_INFINITY, f64::max)
}

/// Number of non-empty inputs, or all inputs when `count_all` is set.
#[must_use]
pub fn count(values: &[String], count_all: bool) -> usize {
    if count_all {
        values.len()
    } else {
        values.iter().filter(|v| !v.is_empty()).count()
    }
}

/// Median of the parseable values: lower-mid mean pairing for even counts.
#[must_use]
pub fn median(values: &[String]) -> String {
    let mut nums = parse_values(values);
    if nums.is_empty() {
        return "0".to_string();
    }
    nums.sort_by(|a, b| a.total_cmp(b));
    let n = nums.len();
    let median = if n % 2 == 0 {
        (nums[n / 2 - 1] + nums[n / 2]) / 2.0
    } else {
        nums[n / 2]
    };
    format_number(median)
}

/// Most frequent value by exact string match; first-seen wins ties.
#[must_use]
pub fn mode(values: &[String]) -> String {
    let mut counts: Vec<(&String, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, n)) => *n += 1,
            None => counts.push((value, 1)),
        }
    }
    let mut best: Option<(&String, usize)> = None;
    for (value, n) in counts {
        if best.is_none_or(|(_, best_n)| n > best_n) {
            best = Some((value, n));
        }
    }
    best.map(|(v, _)| v.clone()).unwrap_or_default()
}

/// Variance of the parseable values, population or sample by flag.
#[must_use]
pub fn variance(values: &[String], population: bool) -> f64 {
    let nums = parse_values(values);
    let n = nums.len();
    if n == 0 || (!population && n < 2) {
        return 0.0;
    }
    let mean = nums.iter().sum::<f64>() / n as f64;
    let squared: f64 = nums.iter().map(|v| (v - mean).powi(2)).sum();
    let divisor = if population { n } else { n - 1 };
    squared / divisor as f64
}

/// Standard deviation, population or sample by flag.
#[must_use]
pub fn stddev(values: &[String], population: bool) -> f64 {
    variance(values, population).sqrt()
}

/// Joins all values with the separator.
#[must_use]
pub fn string_concat(values: &[String], separator: &str) -> String {
    values.join(separator)
}

/// Linear-interpolated p-th percentile (0..=100) of the parseable values.
#[must_use]
pub fn percentile(values: &[String], p: f64) -> f64 {
    let mut nums = parse_values(values);
    if nums.is_empty() {
        return 0.0;
    }
    nums.sort_by(|a, b| a.total_cmp(b));
    let clamped = p.clamp(0.0, 100.0);
    let rank = clamped / 100.0 * (nums.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return nums[lower];
    }
    let weight = rank - lower as f64;
    nums[lower] * (1.0 - weight) + nums[upper] * weight
}

/// Formats an aggregate result for output.
///
/// Non-finite values (the MIN/MAX of an all-unparsable set) collapse to 0.
#[must_use]
pub fn format_number(value: f64) -> String {
    if value.is_finite() {
        value.to_string()
    } else {
        "0".to_string()
    }
}
