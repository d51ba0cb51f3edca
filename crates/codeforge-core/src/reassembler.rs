//! Line reassembly across arbitrary chunk boundaries.
//!
//! Upstream text arrives in chunks with no alignment to lines, so the
//! incomplete trailing fragment of each chunk is carried into the next one.
//! This layer knows nothing about markers or SSE fields.

/// Turns a sequence of text chunks into complete lines.
#[derive(Debug, Default, Clone)]
pub struct LineReassembler {
    /// Incomplete trailing fragment
    pending: String,
}

impl LineReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completes, in order.
    ///
    /// Lines are returned without their terminator; a `\r` before the `\n`
    /// is stripped as well.
    pub fn feed(&mut self, chunk: &str) -> Vec<String> {
        self.pending.push_str(chunk);

        let Some(last_newline) = self.pending.rfind('\n') else {
            return Vec::new();
        };

        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        complete[..complete.len() - 1]
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect()
    }

    /// Surface the pending fragment as a final line, if non-empty.
    ///
    /// Call once at stream end.
    pub fn flush(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.pending);
        Some(match line.strip_suffix('\r') {
            Some(stripped) => stripped.to_string(),
            None => line,
        })
    }

    /// Bytes held back waiting for a terminator.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_all(chunks: &[&str]) -> Vec<String> {
        let mut reassembler = LineReassembler::new();
        let mut lines: Vec<String> = chunks.iter().flat_map(|c| reassembler.feed(c)).collect();
        lines.extend(reassembler.flush());
        lines
    }

    #[test]
    fn test_complete_lines_in_one_chunk() {
        let mut reassembler = LineReassembler::new();
        assert_eq!(reassembler.feed("a\nb\n"), vec!["a", "b"]);
        assert!(!reassembler.has_pending());
        assert_eq!(reassembler.flush(), None);
    }

    #[test]
    fn test_fragment_carried_forward() {
        let mut reassembler = LineReassembler::new();
        assert!(reassembler.feed("=== FILE").is_empty());
        assert_eq!(reassembler.pending_len(), 8);
        assert_eq!(reassembler.feed("NAME: a.js ===\nx"), vec!["=== FILENAME: a.js ==="]);
        assert_eq!(reassembler.flush(), Some("x".to_string()));
    }

    #[test]
    fn test_empty_lines_preserved() {
        assert_eq!(collect_all(&["a\n\n", "\nb"]), vec!["a", "", "", "b"]);
    }

    #[test]
    fn test_crlf_split_across_chunks() {
        assert_eq!(collect_all(&["one\r", "\ntwo\r\n"]), vec!["one", "two"]);
    }

    #[test]
    fn test_chunking_does_not_change_lines() {
        let text = "=== FILENAME: a.js ===\nconst x = 1;\n=== END FILE ===\ntrailing";
        let whole = collect_all(&[text]);
        for split in 0..text.len() {
            if !text.is_char_boundary(split) {
                continue;
            }
            let (head, tail) = text.split_at(split);
            assert_eq!(collect_all(&[head, tail]), whole, "split at {}", split);
        }
        let per_char: Vec<String> = text.chars().map(String::from).collect();
        let per_char: Vec<&str> = per_char.iter().map(String::as_str).collect();
        assert_eq!(collect_all(&per_char), whole);
    }
}
