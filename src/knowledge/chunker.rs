//! Document chunking.
//!
//! Splits on sentence boundaries and greedily packs sentences into chunks
//! up to an approximate token budget (estimated at 4 characters per token).

/// Characters treated as sentence terminators.
fn is_boundary(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '\n')
}

/// Split `text` into chunks of at most ~`token_budget` tokens each.
///
/// A sentence that would push the current chunk past the budget starts a
/// new chunk; a single oversized sentence becomes its own chunk rather than
/// being split mid-sentence.
pub fn chunk_text(text: &str, token_budget: usize) -> Vec<String> {
    let budget_chars = token_budget * 4;

    let sentences = text
        .split(is_boundary)
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in sentences {
        let combined = if current.is_empty() {
            sentence.to_string()
        } else {
            format!("{current}. {sentence}")
        };

        if combined.len() > budget_chars && !current.is_empty() {
            chunks.push(current);
            current = sentence.to_string();
        } else {
            current = combined;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunk_text("Welcome to the server. Be kind!", 500);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "Welcome to the server. Be kind");
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_text("", 500).is_empty());
        assert!(chunk_text("...\n\n!!!", 500).is_empty());
    }

    #[test]
    fn long_text_splits_at_sentence_boundaries() {
        // 40 sentences of ~100 chars each against a 100-token (~400 char)
        // budget: every chunk must respect the budget and no sentence may be
        // split internally.
        let sentence = "This sentence pads the chunk with a fairly long run of words for testing";
        let text = (0..40).map(|_| format!("{sentence}. ")).collect::<String>();
        let chunks = chunk_text(&text, 100);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 100 * 4 + sentence.len());
            assert!(chunk.contains("pads the chunk"));
        }
    }

    #[test]
    fn oversized_single_sentence_is_kept_whole() {
        let huge = "x".repeat(3000);
        let chunks = chunk_text(&huge, 500);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 3000);
    }

    #[test]
    fn newlines_are_boundaries() {
        let text = "First line\nSecond line\nThird line";
        let chunks = chunk_text(text, 500);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "First line. Second line. Third line");
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = "One. Two. Three. Four. Five.";
        assert_eq!(chunk_text(text, 500), chunk_text(text, 500));
    }
}
