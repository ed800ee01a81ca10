//! Line-aligned text chunking.
//!
//! Oversized statement text is split into ordered chunks bounded by a soft
//! maximum size. Splitting happens only at line boundaries so a transaction
//! record never straddles two chunks.

/// Split `text` into ordered, non-empty chunks of roughly `max_size` bytes.
///
/// Text that already fits is returned unchanged as a single chunk. A single
/// line longer than `max_size` is emitted as its own oversized chunk; the
/// size bound is a soft target, not a hard ceiling. Purely whitespace
/// buffers are dropped rather than emitted.
///
/// The result is a pure function of `text` and `max_size`.
pub fn chunk(text: &str, max_size: usize) -> Vec<String> {
    if text.len() <= max_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut buffer = String::new();

    for line in text.split('\n') {
        // +1 for the newline that would join the buffer to this line.
        let projected = if buffer.is_empty() {
            line.len()
        } else {
            buffer.len() + 1 + line.len()
        };

        if projected > max_size {
            if buffer.trim().is_empty() {
                buffer.clear();
            } else {
                chunks.push(std::mem::take(&mut buffer));
            }
            buffer.push_str(line);
        } else {
            if !buffer.is_empty() {
                buffer.push('\n');
            }
            buffer.push_str(line);
        }
    }

    if !buffer.trim().is_empty() {
        chunks.push(buffer);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_short_input_is_a_single_chunk() {
        let text = "2024-03-05  Coffee  -4.50";
        assert_eq!(chunk(text, 1000), vec![text.to_string()]);
    }

    #[test]
    fn test_exact_fit_is_a_single_chunk() {
        let text = "abc\ndef";
        assert_eq!(chunk(text, text.len()), vec![text.to_string()]);
    }

    #[test]
    fn test_splits_only_at_line_boundaries() {
        let chunks = chunk("aaa\nbbb\nccc", 7);
        assert_eq!(chunks, vec!["aaa\nbbb".to_string(), "ccc".to_string()]);
    }

    #[test]
    fn test_rejoining_chunks_recovers_the_input() {
        let text = "one 1.00\ntwo 2.00\nthree 3.00\nfour 4.00\nfive 5.00";
        let chunks = chunk(text, 20);
        assert!(chunks.len() > 1);
        assert_eq!(chunks.join("\n"), text);
    }

    #[test]
    fn test_no_chunk_boundary_inside_a_line() {
        let text = "alpha beta\ngamma delta\nepsilon zeta";
        let lines: Vec<&str> = text.split('\n').collect();
        for piece in chunk(text, 12) {
            for line in piece.split('\n') {
                assert!(lines.contains(&line), "fabricated line: {line:?}");
            }
        }
    }

    #[test]
    fn test_oversized_line_becomes_its_own_chunk() {
        let long = "x".repeat(40);
        let text = format!("aaa\n{long}\nbbb");
        let chunks = chunk(&text, 10);
        assert_eq!(
            chunks,
            vec!["aaa".to_string(), long.clone(), "bbb".to_string()]
        );
    }

    #[test]
    fn test_whitespace_only_buffers_are_dropped() {
        let chunks = chunk("aaa\n \nbbb\n ", 3);
        assert_eq!(chunks, vec!["aaa".to_string(), "bbb".to_string()]);
    }

    #[test]
    fn test_deterministic() {
        let text = "a 1\nb 2\nc 3\nd 4";
        assert_eq!(chunk(text, 6), chunk(text, 6));
    }
}
