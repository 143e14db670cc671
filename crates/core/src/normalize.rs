/// Normalizes an item name for matching: surrounding whitespace stripped,
/// lowercased. Aggregation and sorting both key on this form, so "Milk"
/// and " milk " land on the same row.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Normalizes a unit for matching, same rules as [`normalize_name`].
#[must_use]
pub fn normalize_unit(unit: &str) -> String {
    unit.trim().to_lowercase()
}
