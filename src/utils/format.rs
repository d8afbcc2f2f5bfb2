use chrono::{DateTime, Utc};

/// Format the time remaining until `expected`.
///
/// The difference is decomposed into days/hours/minutes/seconds and
/// zero-valued units are dropped, so 90 seconds renders as
/// "1 minutes, 30 seconds". When nothing measurable remains (including a
/// deadline already passed) the sentinel "Less than a second" is returned.
pub fn time_remaining(expected: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = expected - now;
    let total_seconds = diff.num_seconds();
    if total_seconds <= 0 {
        return "Less than a second".to_string();
    }

    let days = total_seconds / 86_400;
    let hours = (total_seconds / 3_600) % 24;
    let minutes = (total_seconds / 60) % 60;
    let seconds = total_seconds % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days} days"));
    }
    if hours > 0 {
        parts.push(format!("{hours} hours"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes} minutes"));
    }
    if seconds > 0 {
        parts.push(format!("{seconds} seconds"));
    }

    if parts.is_empty() {
        "Less than a second".to_string()
    } else {
        parts.join(", ")
    }
}

/// Format an estimated delivery time given in whole minutes.
pub fn delivery_time(minutes: i64) -> String {
    if minutes <= 0 {
        return "less than a minute".to_string();
    }

    let mut remaining = minutes;
    let mut parts = Vec::new();
    if remaining >= 1440 {
        parts.push(format!("{} days", remaining / 1440));
        remaining %= 1440;
    }
    if remaining >= 60 {
        parts.push(format!("{} hours", remaining / 60));
        remaining %= 60;
    }
    if remaining > 0 {
        parts.push(format!("{remaining} minutes"));
    }
    parts.join(" ")
}

/// Render a timestamp as "dd/mm/yyyy at HH:MM" for order summaries.
pub fn day_and_time(timestamp: Option<DateTime<Utc>>) -> String {
    match timestamp {
        Some(ts) => ts.format("%d/%m/%Y at %H:%M").to_string(),
        None => "Not available".to_string(),
    }
}
