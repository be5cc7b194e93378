/// Split `text` into chunks of at most `limit` characters, preferring word
/// boundaries. Concatenating the chunks reproduces the input exactly. A
/// single word longer than the limit is cut hard at the limit.
pub fn split_text(text: &str, limit: usize) -> Vec<String> {
    if limit == 0 || text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    // Indexing by char, not byte: the campaign copy is Vietnamese.
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut prev = 0usize;

    while chars.len() - prev > limit {
        let cursor = prev + limit;
        let split_at = if chars[cursor] == ' ' {
            // The word ends exactly at the limit.
            cursor
        } else {
            // Scan backward for the nearest space inside the segment.
            match (prev + 1..=cursor).rev().find(|&i| chars[i - 1] == ' ') {
                Some(i) => i,
                // One unbroken word spanning the whole segment: hard cut.
                None => cursor,
            }
        };
        chunks.push(chars[prev..split_at].iter().collect());
        prev = split_at;
    }

    chunks.push(chars[prev..].iter().collect());
    chunks
}
