use std::sync::LazyLock;

use regex::Regex;

// `\w` with the `unicode` default covers letters, digits, and underscore
// across scripts. Hyphens are NOT in the class: `#cannabis-education`
// tokenizes as `cannabis` followed by the literal `-education`.
static HASHTAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#(\w+)").unwrap());

/// Extract hashtags from free text: lowercase, `#` stripped, deduplicated.
/// Returned in first-seen order; callers treat the result as a set.
pub fn extract_hashtags(text: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for cap in HASHTAG_RE.captures_iter(text) {
        let tag = cap[1].to_lowercase();
        if !seen.contains(&tag) {
            seen.push(tag);
        }
    }
    seen
}

/// Normalized topic id for a tag (the stored primary key).
pub fn topic_id(tag: &str) -> String {
    tag.trim_start_matches('#').to_lowercase()
}

/// Display form of a topic: the tag with its `#` re-attached.
pub fn topic_display_name(tag: &str) -> String {
    format!("#{}", topic_id(tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_and_lowercases() {
        let tags = extract_hashtags("Loving #CannabisEducation today");
        assert_eq!(tags, vec!["cannabiseducation"]);
    }

    #[test]
    fn deduplicates_across_case() {
        let tags = extract_hashtags("#Terpenes and more #terpenes and #TERPENES");
        assert_eq!(tags, vec!["terpenes"]);
    }

    #[test]
    fn hyphen_splits_the_token() {
        let tags = extract_hashtags("#cannabis-education");
        assert_eq!(tags, vec!["cannabis"]);
    }

    #[test]
    fn combined_boundary_example() {
        let tags = extract_hashtags("Loving #CannabisEducation and #cannabis-education");
        assert_eq!(tags, vec!["cannabiseducation", "cannabis"]);
    }

    #[test]
    fn leading_digits_allowed() {
        let tags = extract_hashtags("happy #420friendly everyone");
        assert_eq!(tags, vec!["420friendly"]);
    }

    #[test]
    fn underscore_stays_in_token() {
        let tags = extract_hashtags("#grow_tips");
        assert_eq!(tags, vec!["grow_tips"]);
    }

    #[test]
    fn emoji_terminates_token() {
        let tags = extract_hashtags("#chill🌿vibes");
        assert_eq!(tags, vec!["chill"]);
    }

    #[test]
    fn unicode_letters_supported() {
        let tags = extract_hashtags("#köln meetup und #日本");
        assert_eq!(tags, vec!["köln", "日本"]);
    }

    #[test]
    fn bare_hash_yields_nothing() {
        assert!(extract_hashtags("# nothing here #").is_empty());
        assert!(extract_hashtags("no tags at all").is_empty());
    }

    #[test]
    fn display_name_reattaches_hash() {
        assert_eq!(topic_display_name("CannabisEducation"), "#cannabiseducation");
        assert_eq!(topic_id("#Terpenes"), "terpenes");
    }
}
