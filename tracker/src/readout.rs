/// Seconds needed to cover `distance_m` at `speed_mps`, rounded up.
pub fn remaining_seconds(distance_m: f64, speed_mps: f64) -> u64 {
    if speed_mps <= 0.0 || !speed_mps.is_finite() || distance_m <= 0.0 {
        return 0;
    }
    (distance_m / speed_mps).ceil() as u64
}

/// `"42s"` below a minute, `"3m 5s"` otherwise.
pub fn format_duration(total_seconds: u64) -> String {
    if total_seconds >= 60 {
        format!("{}m {}s", total_seconds / 60, total_seconds % 60)
    } else {
        format!("{total_seconds}s")
    }
}

pub fn format_remaining(distance_m: f64, speed_mps: f64) -> String {
    format_duration(remaining_seconds(distance_m, speed_mps))
}

/// Map zoom level that keeps a trip of `distance_m` on screen.
pub fn zoom_for_distance(distance_m: f64) -> u8 {
    match distance_m {
        d if d < 50.0 => 18,
        d if d < 200.0 => 16,
        d if d < 500.0 => 15,
        d if d < 1000.0 => 14,
        _ => 13,
    }
}

pub fn progress_percent(traveled_m: f64, target_m: f64) -> f64 {
    if target_m <= 0.0 {
        return 0.0;
    }
    (traveled_m / target_m * 100.0).clamp(0.0, 100.0)
}
