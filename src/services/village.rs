/// Derives a locality name from a formatted address: first known village
/// found in any comma-separated segment wins (canonical spelling returned),
/// otherwise the third-from-last segment, the first segment, or "Unknown".
pub fn extract_village(formatted_address: &str, known_villages: &[&str]) -> String {
    let segments: Vec<&str> = formatted_address.split(',').map(str::trim).collect();

    for segment in &segments {
        let lower = segment.to_lowercase();
        for name in known_villages {
            if lower.contains(&name.to_lowercase()) {
                return (*name).to_string();
            }
        }
    }

    if segments.len() >= 3 {
        segments[segments.len() - 3].to_string()
    } else if segments.len() >= 2 {
        segments[0].to_string()
    } else {
        "Unknown".to_string()
    }
}
