/// Split `text` into chunks of at most `max_chars` characters.
///
/// Breaks at the last paragraph break inside the window, then the last
/// newline, then the last whitespace, and only cuts mid-word when the window
/// has none. Lengths are counted in chars, so a multi-byte character is never
/// split. Whitespace at a break is dropped.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    if text.is_empty() {
        return Vec::new();
    }
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while remaining.chars().count() > max_chars {
        let limit = remaining
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(remaining.len());
        let window = &remaining[..limit];

        let split_at = window
            .rfind("\n\n")
            .or_else(|| window.rfind('\n'))
            .or_else(|| window.rfind(char::is_whitespace))
            .filter(|&i| i > 0)
            .unwrap_or(limit);

        let chunk = remaining[..split_at].trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        remaining = remaining[split_at..].trim_start();
    }

    if !remaining.is_empty() {
        chunks.push(remaining.to_string());
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 1950;

    fn squash(s: &str) -> String {
        s.split_whitespace().collect()
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(split_message("", MAX).is_empty());
    }

    #[test]
    fn short_text_is_single_chunk() {
        assert_eq!(split_message("Hello, world!", MAX), vec!["Hello, world!"]);
    }

    #[test]
    fn exact_limit_is_single_chunk() {
        let text = "a".repeat(MAX);
        assert_eq!(split_message(&text, MAX), vec![text.clone()]);
    }

    #[test]
    fn prefers_paragraph_breaks() {
        let para = "word ".repeat(300); // 1500 chars
        let text = format!("{para}\n\n{para}\n{para}");
        let chunks = split_message(&text, MAX);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], para.trim_end());
        for c in &chunks {
            assert!(c.chars().count() <= MAX);
        }
    }

    #[test]
    fn long_word_is_cut_at_the_limit() {
        let text = "x".repeat(4000);
        let chunks = split_message(&text, MAX);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), MAX);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn multibyte_chars_are_never_split() {
        let text = "héllo wörld 🦀 ".repeat(400);
        let chunks = split_message(&text, 100);
        for c in &chunks {
            assert!(c.chars().count() <= 100);
        }
        assert_eq!(squash(&chunks.concat()), squash(&text));

        let dense = "é".repeat(250);
        let chunks = split_message(&dense, 100);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.concat(), dense);
    }

    #[test]
    fn split_is_deterministic_and_reconstructs() {
        let text = "The quick brown fox jumps over the lazy dog.\n".repeat(200);
        let a = split_message(&text, 300);
        let b = split_message(&text, 300);
        assert_eq!(a, b);
        assert_eq!(squash(&a.join(" ")), squash(&text));
        assert!(a.iter().all(|c| !c.is_empty() && c.chars().count() <= 300));
    }

    #[test]
    fn leading_whitespace_window_still_progresses() {
        let text = format!(" {}", "y".repeat(50));
        let chunks = split_message(&text, 10);
        assert_eq!(chunks.concat(), "y".repeat(50));
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
    }
}
