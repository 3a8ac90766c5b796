use ammonia;

/// Strips markup from feedback comments before they are stored.
///
/// Uses ammonia's whitelist cleaner: safe inline tags survive, while
/// `<script>` and friends are removed together with their content and
/// event-handler attributes are dropped.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// `clean_html` for optional fields; blank results collapse to `None`.
pub fn clean_optional(input: Option<&str>) -> Option<String> {
    input
        .map(clean_html)
        .filter(|cleaned| !cleaned.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripts_are_removed() {
        assert_eq!(clean_html("<b>ok</b><script>alert(1)</script>"), "<b>ok</b>");
    }

    #[test]
    fn test_blank_after_cleaning_is_none() {
        assert_eq!(clean_optional(Some("<script>x</script>")), None);
        assert_eq!(clean_optional(Some("fine")), Some("fine".to_string()));
        assert_eq!(clean_optional(None), None);
    }
}
