/// clap value parser for `--percentile`: whole percent in 1..=100.
pub fn parse_percentile(raw: &str) -> Result<u8, String> {
    let value: u8 = raw
        .parse()
        .map_err(|_| format!("`{raw}` is not a whole number"))?;
    if (1..=100).contains(&value) {
        Ok(value)
    } else {
        Err(format!("percentile must be between 1 and 100, got {value}"))
    }
}
