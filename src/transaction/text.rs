/// Keep at most `max` sentences; sentences end in `.`, `!` or `?` followed by whitespace.
pub fn limit_sentences(text: &str, max: usize) -> String {
    let text = text.trim();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, ch)) = chars.next() {
        if !matches!(ch, '.' | '!' | '?') {
            continue;
        }
        if let Some(&(next, next_ch)) = chars.peek() {
            if next_ch.is_whitespace() {
                sentences.push(&text[start..next]);
                // Skip the whitespace run between sentences
                while let Some(&(_, c)) = chars.peek() {
                    if !c.is_whitespace() {
                        break;
                    }
                    chars.next();
                }
                start = chars.peek().map(|&(j, _)| j).unwrap_or(text.len());
            }
        }
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }

    sentences.into_iter().take(max).collect::<Vec<_>>().join(" ")
}
