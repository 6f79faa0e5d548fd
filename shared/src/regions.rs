/// Catch-all bucket for ports without a state and states without a region.
pub const UNKNOWN: &str = "Unknown";

/// Border state → region grouping used by the heatmap hierarchy.
pub const STATE_REGIONS: &[(&str, &str)] = &[
    ("Alaska", "Pacific"),
    ("California", "Pacific"),
    ("Washington", "Pacific"),
    ("Arizona", "West"),
    ("Idaho", "West"),
    ("Montana", "West"),
    ("New Mexico", "West"),
    ("Maine", "Northeast"),
    ("New York", "Northeast"),
    ("Vermont", "Northeast"),
    ("Michigan", "Midwest"),
    ("Minnesota", "Midwest"),
    ("North Dakota", "Midwest"),
    ("Texas", "South"),
    (UNKNOWN, UNKNOWN),
];

/// Region for `state` in `table`, or [`UNKNOWN`] when unmapped.
pub fn region_for_state<'a>(table: &[(&'a str, &'a str)], state: &str) -> &'a str {
    table
        .iter()
        .find(|(name, _)| *name == state)
        .map(|(_, region)| *region)
        .unwrap_or(UNKNOWN)
}
