/// Lowercased name with everything but letters and digits removed.
///
/// Used for approximate name matching, e.g. "WGS_1984" and "WGS 1984" both
/// become "wgs1984".
pub fn canonicalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}
