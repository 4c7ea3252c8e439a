/// Parse a positive integer from an env-style string value, falling back to the default on absence or garbage.
pub fn parse_u64(value: Option<String>, default: u64) -> u64 {
    value.and_then(|v| v.trim().parse::<u64>().ok()).unwrap_or(default)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn integers() {
        assert_eq!(parse_u64(Some("120".into()), 5), 120);
        assert_eq!(parse_u64(Some("12s".into()), 5), 5);
        assert_eq!(parse_u64(None, 5), 5);
    }
}
