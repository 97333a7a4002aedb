/// Truncate a string to at most `max_bytes` bytes at a character boundary.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Strip markdown code fences from a model response.
fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Slice out the outermost `{ ... }` span of a response that wraps a JSON
/// object in prose. Returns `None` when no balanced-looking span exists.
pub fn extract_json_object(response: &str) -> Option<&str> {
    let body = strip_code_blocks(response);
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (end > start).then(|| &body[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_never_splits_a_multibyte_char() {
        let text = "gm 🚀🚀 frens";
        for limit in 0..text.len() {
            let cut = truncate_to_char_boundary(text, limit);
            assert!(cut.len() <= limit);
            assert!(text.starts_with(cut));
        }
    }

    #[test]
    fn truncate_within_bounds_is_identity() {
        assert_eq!(truncate_to_char_boundary("floor", 100), "floor");
    }

    #[test]
    fn strips_fenced_json() {
        assert_eq!(strip_code_blocks("```json\n{\"score\": 1}\n```"), "{\"score\": 1}");
        assert_eq!(strip_code_blocks("  {}  "), "{}");
    }

    #[test]
    fn extracts_object_from_prose() {
        let raw = "Sure! Here it is: {\"score\": 0.4, \"labels\": []} hope that helps";
        assert_eq!(
            extract_json_object(raw),
            Some("{\"score\": 0.4, \"labels\": []}")
        );
        assert_eq!(extract_json_object("SCORE: 0.7"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }
}
