use jiff::SpanRelativeTo;

/// Accepts "PT30S", friendly spans like "5m" or "1h 30m", and plain seconds.
pub fn parse_duration(input: &str) -> Result<jiff::SignedDuration, String> {
    let duration = if let Ok(duration) = input.parse::<jiff::SignedDuration>() {
        duration
    } else if let Ok(duration) = input
        .parse::<jiff::Span>()
        .and_then(|span| span.to_duration(SpanRelativeTo::days_are_24_hours()))
    {
        duration
    } else if let Ok(seconds) = input.parse::<i64>() {
        jiff::SignedDuration::from_secs(seconds)
    } else {
        return Err(format!("Invalid duration {input:?}"));
    };

    if duration.is_positive() {
        Ok(duration)
    } else {
        Err(String::from("Duration must be positive"))
    }
}
