//! Lossy sentence-level compression of memory content
//!
//! Keeps the opening sentence, the longest interior sentence and the closing
//! sentence. The result is prefixed with [`COMPRESSED_MARKER`] so readers can
//! tell a compressed payload apart without consulting lifecycle metadata.
//! There is no way back to the original text.

/// Prefix marking compressed content
pub const COMPRESSED_MARKER: &str = "[COMPRESSED] ";

/// Sentence delimiter used for splitting and re-joining
pub const SENTENCE_DELIMITER: &str = ". ";

/// Contents with at most this many sentences are left untouched
pub const MIN_SENTENCES_TO_COMPRESS: usize = 4;

/// Compress `content` to its first, longest interior, and last sentences.
///
/// Content with three or fewer sentences is returned unchanged.
pub fn compress(content: &str) -> String {
    let sentences: Vec<&str> = content.split(SENTENCE_DELIMITER).collect();
    if sentences.len() < MIN_SENTENCES_TO_COMPRESS {
        return content.to_string();
    }

    let (first, rest) = match sentences.split_first() {
        Some(split) => split,
        None => return content.to_string(),
    };
    let (last, interior) = match rest.split_last() {
        Some(split) => split,
        None => return content.to_string(),
    };

    // Ties go to the earliest sentence
    let longest = interior
        .iter()
        .copied()
        .fold(None::<&str>, |best, s| match best {
            Some(b) if b.len() >= s.len() => Some(b),
            _ => Some(s),
        });

    let kept: Vec<&str> = match longest {
        Some(longest) => vec![*first, longest, *last],
        None => vec![*first, *last],
    };

    format!("{COMPRESSED_MARKER}{}", kept.join(SENTENCE_DELIMITER))
}

/// Whether `content` carries the compression marker
pub fn is_compressed(content: &str) -> bool {
    content.starts_with(COMPRESSED_MARKER)
}

/// Number of sentences `compress` sees in `content`
pub fn sentence_count(content: &str) -> usize {
    content.split(SENTENCE_DELIMITER).count()
}

/// Ratio of the compressed length to the current length, scaled by the
/// current ratio and clamped to [0, 1]
pub fn next_compression_ratio(current_ratio: f32, before: &str, after: &str) -> f32 {
    if before.is_empty() || before == after {
        return current_ratio;
    }
    (current_ratio * after.len() as f32 / before.len() as f32).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_five_sentences_keep_first_longest_last() {
        let content = "Alice met Bob. They talked about the weather. \
                       Bob explained his long plan to sail around the world next year. \
                       Alice laughed. They parted ways.";

        let compressed = compress(content);

        assert_eq!(
            compressed,
            "[COMPRESSED] Alice met Bob. \
             Bob explained his long plan to sail around the world next year. \
             They parted ways."
        );
        assert!(is_compressed(&compressed));
        assert_eq!(
            sentence_count(compressed.trim_start_matches(COMPRESSED_MARKER)),
            3
        );
    }

    #[test]
    fn test_short_content_unchanged() {
        let content = "Alice likes tea. Bob prefers coffee.";
        assert_eq!(compress(content), content);
        assert!(!is_compressed(&compress(content)));
    }

    #[test]
    fn test_three_sentences_unchanged() {
        let content = "One. Two. Three.";
        assert_eq!(compress(content), content);
    }

    #[test]
    fn test_interior_tie_prefers_first() {
        let content = "Start. aaaa. bbbb. cccc. End";
        assert_eq!(compress(content), "[COMPRESSED] Start. aaaa. End");
    }

    #[test]
    fn test_empty_and_single_sentence() {
        assert_eq!(compress(""), "");
        assert_eq!(compress("no delimiter at all"), "no delimiter at all");
    }

    #[test]
    fn test_compressing_twice_is_stable() {
        let content = "First point. Second point here. A much longer third point follows. Fourth. Last one.";
        let once = compress(content);
        assert_eq!(compress(&once), once);
    }

    #[test]
    fn test_next_compression_ratio() {
        assert_eq!(next_compression_ratio(1.0, "abcdefghij", "abcde"), 0.5);
        assert_eq!(next_compression_ratio(0.8, "same", "same"), 0.8);
        assert_eq!(next_compression_ratio(0.9, "", "x"), 0.9);
        assert_eq!(next_compression_ratio(1.0, "ab", "abcdef"), 1.0);
    }
}
