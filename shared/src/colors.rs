/// Number of discrete heatmap color buckets (level 0 through 4).
pub const LEVEL_COUNT: usize = 5;

/// Heatmap cell ramp, indexed by color level. Level 0 is reserved for empty cells.
pub const LEVEL_RAMP: [&str; LEVEL_COUNT] = ["#f0f0f0", "#92eee7", "#ebe00f", "#ee970c", "#cc0000"];

/// Quantize `value` into a color level against the positive value range.
///
/// Zero always maps to level 0. Positive values map to 1..=4, with `min_value`
/// at level 1 and `max_value` at level 4.
pub fn color_level(value: u64, min_value: u64, max_value: u64) -> u8 {
    if value == 0 {
        return 0;
    }
    let span = max_value.saturating_sub(min_value);
    let span = if span == 0 { 1.0 } else { span as f64 };
    let offset = value as f64 - min_value as f64;
    let bucket = (offset / span * 4.0).floor() + 1.0;
    bucket.clamp(1.0, 4.0) as u8
}

/// Hex color for a level; out-of-range levels clamp to the hottest color.
pub fn level_color(level: u8) -> &'static str {
    LEVEL_RAMP[usize::from(level).min(LEVEL_COUNT - 1)]
}

fn lerp_u8(a: u8, b: u8, t: f64) -> u8 {
    let t = t.clamp(0.0, 1.0);
    let value = a as f64 + (b as f64 - a as f64) * t;
    value.round().clamp(0.0, 255.0) as u8
}

/// Green → yellow → red gradient used by the animated port map.
pub fn map_heat_color(intensity: f64) -> (u8, u8, u8) {
    const STOPS: &[(f64, (u8, u8, u8))] = &[
        (0.0, (0, 255, 0)),
        (0.5, (255, 255, 0)),
        (1.0, (255, 0, 0)),
    ];

    let intensity = if intensity.is_nan() {
        0.0
    } else {
        intensity.clamp(0.0, 1.0)
    };
    for window in STOPS.windows(2) {
        let (left_pos, left_color) = window[0];
        let (right_pos, right_color) = window[1];
        if intensity >= left_pos && intensity <= right_pos {
            let span = (right_pos - left_pos).max(f64::EPSILON);
            let t = (intensity - left_pos) / span;
            return (
                lerp_u8(left_color.0, right_color.0, t),
                lerp_u8(left_color.1, right_color.1, t),
                lerp_u8(left_color.2, right_color.2, t),
            );
        }
    }

    STOPS
        .last()
        .map(|(_, color)| *color)
        .unwrap_or((255, 0, 0))
}
