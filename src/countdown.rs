use crate::store::RefreshState;

/// Predicted milliseconds until charges are full.
///
/// Extrapolates linearly from the snapshot: every missing charge takes
/// `cooldown_ms`, minus the time elapsed since the snapshot arrived. Zero or
/// negative means the predicted full time has already passed.
pub fn ms_until_full(state: &RefreshState, now_ms: i64) -> i64 {
    let charges = &state.snapshot.charges;
    let missing = charges.max as f64 - charges.count;
    let total = missing * charges.cooldown_ms as f64;
    let elapsed = state.age_ms(now_ms) as f64;
    (total - elapsed).round() as i64
}

/// Formats a duration as `H:MM:SS`, or `M:SS` below one hour.
///
/// Returns `None` when the duration is zero, negative or not finite, meaning
/// "full".
pub fn format_time(total_seconds: f64) -> Option<String> {
    if total_seconds <= 0.0 || !total_seconds.is_finite() {
        return None;
    }

    let hours = (total_seconds / 3600.0).floor() as u64;
    let rest = total_seconds % 3600.0;
    let minutes = (rest / 60.0).floor() as u64;
    let seconds = (rest % 60.0).floor() as u64;

    if hours > 0 {
        Some(format!("{hours}:{minutes:02}:{seconds:02}"))
    } else {
        Some(format!("{minutes}:{seconds:02}"))
    }
}

/// Countdown text for the given state, `None` when full.
pub fn countdown_text(state: &RefreshState, now_ms: i64) -> Option<String> {
    format_time(ms_until_full(state, now_ms) as f64 / 1000.0)
}
