use unicode_segmentation::UnicodeSegmentation;

const ELLIPSIS: char = '…';

/// Smallest budget that fits an ellipsis on both sides of at least one grapheme.
pub const MIN_PREVIEW_GRAPHEMES: usize = 3;

/// Byte offset of the first case-insensitive occurrence of `needle`.
pub fn find_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    let needle = needle.to_lowercase();
    let lowered = haystack.to_lowercase();
    let position = lowered.find(&needle)?;
    // Lowercasing keeps byte offsets only when no character changed its encoded length.
    if lowered.len() == haystack.len() && haystack.is_char_boundary(position) {
        return Some(position);
    }
    haystack
        .char_indices()
        .map(|(offset, _)| offset)
        .find(|&offset| haystack[offset..].to_lowercase().starts_with(&needle))
}

/// Non-overlapping, case-insensitive occurrences of `needle`.
pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack
        .to_lowercase()
        .matches(needle.to_lowercase().as_str())
        .count()
}

/// At most `max_graphemes` graphemes of `content` (ellipsis marks included),
/// positioned so that the first match of `query` sits in the first third.
pub fn make_preview(content: &str, query: &str, max_graphemes: usize) -> String {
    let graphemes: Vec<(usize, &str)> = content.grapheme_indices(true).collect();
    if graphemes.len() <= max_graphemes {
        return content.to_string();
    }
    if max_graphemes == 0 {
        return String::new();
    }

    // room for an ellipsis on each side, budgets too small for that get none
    let marked = max_graphemes >= MIN_PREVIEW_GRAPHEMES;
    let body_length = if marked { max_graphemes - 2 } else { max_graphemes };
    let match_index = find_case_insensitive(content, query)
        .map(|byte_offset| graphemes.partition_point(|(offset, _)| *offset < byte_offset))
        .unwrap_or(0);
    let start = match_index
        .saturating_sub(body_length / 3)
        .min(graphemes.len() - body_length);
    let end = start + body_length;

    let start_byte = graphemes[start].0;
    let end_byte = graphemes.get(end).map_or(content.len(), |(offset, _)| *offset);

    let mut preview = String::with_capacity(end_byte - start_byte + 6);
    if marked && start > 0 {
        preview.push(ELLIPSIS);
    }
    preview.push_str(content[start_byte..end_byte].trim());
    if marked && end < graphemes.len() {
        preview.push(ELLIPSIS);
    }
    preview
}
