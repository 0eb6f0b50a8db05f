//! Recursive character text splitter
//!
//! Splits on the coarsest separator present, recursing into finer ones for
//! pieces that are still too long, then greedily merges neighbours back up
//! to `chunk_size` while carrying up to `chunk_overlap` characters from the
//! end of one chunk into the start of the next. Lengths are in characters.

use std::collections::VecDeque;

const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// A chunk of text and its byte offset in the source
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub text: String,
    pub start_index: usize,
}

#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

impl TextSplitter {
    /// Overlap is clamped below the chunk size
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_separators(mut self, separators: Vec<String>) -> Self {
        self.separators = separators;
        self
    }

    /// Split `text` into trimmed, non-empty chunks
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    /// Split and record where each chunk starts in `text`
    pub fn split_with_offsets(&self, text: &str) -> Vec<TextChunk> {
        let mut search_from = 0;
        self.split_text(text)
            .into_iter()
            .map(|chunk| {
                let start_index = text
                    .get(search_from..)
                    .and_then(|rest| rest.find(&chunk))
                    .map(|pos| search_from + pos)
                    .unwrap_or(search_from);
                // the next chunk may overlap this one, so only step past its first char
                search_from = start_index + chunk.chars().next().map_or(1, char::len_utf8);
                TextChunk {
                    text: chunk,
                    start_index,
                }
            })
            .collect()
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let Some(position) = separators
            .iter()
            .position(|s| !s.is_empty() && text.contains(s.as_str()))
        else {
            let trimmed = text.trim();
            return if trimmed.is_empty() {
                Vec::new()
            } else {
                vec![trimmed.to_string()]
            };
        };

        let separator = separators[position].as_str();
        let finer = &separators[position + 1..];

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in text.split(separator).filter(|p| !p.is_empty()) {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge_splits(&pending, separator));
                pending.clear();
            }
            chunks.extend(self.split_recursive(piece, finer));
        }

        if !pending.is_empty() {
            chunks.extend(self.merge_splits(&pending, separator));
        }

        chunks
    }

    fn merge_splits(&self, splits: &[&str], separator: &str) -> Vec<String> {
        let separator_len = char_len(separator);
        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in splits {
            let len = char_len(piece);
            let joiner = if current.is_empty() { 0 } else { separator_len };

            if total + len + joiner > self.chunk_size && !current.is_empty() {
                if let Some(doc) = join(&current, separator) {
                    docs.push(doc);
                }

                while total > self.chunk_overlap
                    || (total > 0
                        && total + len + if current.is_empty() { 0 } else { separator_len }
                            > self.chunk_size)
                {
                    let Some(first) = current.pop_front() else {
                        break;
                    };
                    let joined = if current.is_empty() { 0 } else { separator_len };
                    total = total.saturating_sub(char_len(first) + joined);
                }
            }

            current.push_back(piece);
            total += len + if current.len() > 1 { separator_len } else { 0 };
        }

        if let Some(doc) = join(&current, separator) {
            docs.push(doc);
        }

        docs
    }
}

fn join(parts: &VecDeque<&str>, separator: &str) -> Option<String> {
    let joined = parts.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("word{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_short_text_is_a_single_chunk() {
        let splitter = TextSplitter::new(500, 50);
        assert_eq!(splitter.split_text("  Hello UelloSend.  "), vec!["Hello UelloSend."]);
    }

    #[test]
    fn test_blank_text_yields_nothing() {
        let splitter = TextSplitter::new(500, 50);
        assert!(splitter.split_text(" \n\n \n").is_empty());
    }

    #[test]
    fn test_chunks_respect_size() {
        let splitter = TextSplitter::new(50, 10);
        let chunks = splitter.split_text(&words(200));

        assert!(chunks.len() > 10);
        assert!(chunks.iter().all(|c| c.chars().count() <= 50));
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let splitter = TextSplitter::new(50, 10);
        let chunks = splitter.split_text(&words(100));

        for pair in chunks.windows(2) {
            let last_word = pair[0].split(' ').last().unwrap();
            assert!(
                pair[1].starts_with(last_word),
                "{:?} does not continue from {:?}",
                pair[1],
                pair[0]
            );
        }
    }

    #[test]
    fn test_paragraphs_split_before_words() {
        let text = format!("{}\n\n{}", "a".repeat(30), "b".repeat(30));
        let splitter = TextSplitter::new(40, 5);

        assert_eq!(splitter.split_text(&text), vec!["a".repeat(30), "b".repeat(30)]);
    }

    #[test]
    fn test_unsplittable_run_is_kept_whole() {
        let long = "x".repeat(80);
        let splitter = TextSplitter::new(50, 10);

        let chunks = splitter.split_text(&format!("short {}", long));

        assert_eq!(chunks, vec!["short".to_string(), long]);
    }

    #[test]
    fn test_offsets_point_into_source() {
        let text = words(60);
        let splitter = TextSplitter::new(40, 8);

        let chunks = splitter.split_with_offsets(&text);

        assert_eq!(chunks[0].start_index, 0);
        for chunk in &chunks {
            assert_eq!(&text[chunk.start_index..chunk.start_index + chunk.text.len()], chunk.text);
        }
        assert!(chunks.windows(2).all(|w| w[0].start_index < w[1].start_index));
    }
}
