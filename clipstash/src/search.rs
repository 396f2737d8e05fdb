//! Keyword search helpers: LIKE pattern construction and display previews

/// Default preview width used by listings
pub const PREVIEW_CHARS: usize = 100;

/// Build a `LIKE ... ESCAPE '\'` pattern matching `keyword` anywhere.
/// `%`, `_` and `\` in the keyword are matched literally.
pub fn like_pattern(keyword: &str) -> String {
    let escaped = keyword
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Single-line preview: whitespace runs collapse to one space, long text ends in an ellipsis
pub fn generate_preview(content: &str, max_chars: usize) -> String {
    let mut preview = String::new();
    let mut taken = 0usize;
    let mut truncated = false;

    for word in content.split_whitespace() {
        let needed = word.chars().count() + usize::from(taken > 0);
        if taken + needed > max_chars {
            let room = max_chars.saturating_sub(taken + usize::from(taken > 0));
            if room > 0 {
                if taken > 0 {
                    preview.push(' ');
                }
                preview.extend(word.chars().take(room));
            }
            truncated = true;
            break;
        }
        if taken > 0 {
            preview.push(' ');
        }
        preview.push_str(word);
        taken += needed;
    }

    if truncated {
        preview.push('…');
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("abc"), "%abc%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("snake_case"), "%snake\\_case%");
        assert_eq!(like_pattern("C:\\tmp"), "%C:\\\\tmp%");
        assert_eq!(like_pattern(""), "%%");
    }

    #[test]
    fn test_preview_collapses_whitespace() {
        assert_eq!(generate_preview("  hello\n\n\tworld  ", 100), "hello world");
    }

    #[test]
    fn test_preview_truncates_with_ellipsis() {
        let preview = generate_preview("alpha beta gamma delta", 12);
        assert_eq!(preview, "alpha beta g…");
        assert_eq!(generate_preview("exactly ten", 11), "exactly ten");
    }

    #[test]
    fn test_preview_counts_characters_not_bytes() {
        assert_eq!(generate_preview("日本語テキスト", 3), "日本語…");
    }
}
