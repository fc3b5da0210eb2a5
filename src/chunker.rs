//! Fixed-width character windows over extracted page text.

use anyhow::Result;

use crate::embeddings::Chunk;
use crate::pdf::PageText;

/// Tunables controlling how page text is split into chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkingConfig {
    /// Window width in characters (~700 tokens at the defaults).
    pub chunk_chars: usize,
    /// Fraction of each window shared with the next one.
    pub overlap_ratio: f64,
    /// Pages with fewer whitespace-separated words are skipped.
    pub min_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_chars: 2500,
            overlap_ratio: 0.2,
            min_words: 10,
        }
    }
}

impl ChunkingConfig {
    /// Distance in characters between the starts of consecutive windows.
    pub fn stride(&self) -> Result<usize> {
        anyhow::ensure!(self.chunk_chars > 0, "chunk size must be positive");
        anyhow::ensure!(
            (0.0..1.0).contains(&self.overlap_ratio),
            "overlap ratio {} must be in [0, 1)",
            self.overlap_ratio
        );
        // epsilon keeps 2500 * 0.8 from flooring to 1999
        let stride = (self.chunk_chars as f64 * (1.0 - self.overlap_ratio) + 1e-9).floor() as usize;
        Ok(stride.max(1))
    }
}

/// Splits every qualifying page into chunks, ordered by `(page_no, chunk)`.
pub fn chunk_pages(doc: &str, pages: &[PageText], config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    let stride = config.stride()?;
    let mut chunks = Vec::new();
    for page in pages {
        if page.text.split_whitespace().count() < config.min_words {
            continue;
        }
        chunk_page(doc, page, config.chunk_chars, stride, &mut chunks);
    }
    Ok(chunks)
}

fn chunk_page(doc: &str, page: &PageText, width: usize, stride: usize, out: &mut Vec<Chunk>) {
    let text = page.text.as_str();
    let offsets: Vec<usize> = text.char_indices().map(|(idx, _)| idx).collect();
    let len = offsets.len();
    if len <= width {
        out.push(Chunk {
            doc: doc.to_string(),
            page_no: page.page_no,
            chunk: 0,
            text: text.to_string(),
        });
        return;
    }

    let byte_at = |char_idx: usize| offsets.get(char_idx).copied().unwrap_or(text.len());
    for (window, start) in (0..len).step_by(stride).enumerate() {
        let end = (start + width).min(len);
        out.push(Chunk {
            doc: doc.to_string(),
            page_no: page.page_no,
            chunk: window,
            text: text[byte_at(start)..byte_at(end)].to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn page(page_no: usize, text: &str) -> PageText {
        PageText {
            page_no,
            text: text.to_string(),
        }
    }

    fn words(count: usize) -> String {
        (0..count).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn skips_sparse_pages() {
        let pages = vec![page(0, "too few words here"), page(1, &words(10))];
        let chunks = chunk_pages("a.pdf", &pages, &ChunkingConfig::default()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].page_no, 1);
        assert_eq!(chunks[0].chunk, 0);
        assert_eq!(chunks[0].doc, "a.pdf");
    }

    #[test]
    fn short_page_is_single_chunk() {
        let text = words(50);
        let chunks = chunk_pages("a.pdf", &[page(4, &text)], &ChunkingConfig::default()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
    }

    #[test]
    fn long_page_windows_overlap_and_cover() {
        let config = ChunkingConfig {
            chunk_chars: 100,
            overlap_ratio: 0.2,
            min_words: 1,
        };
        let text: String = (0..350)
            .map(|i| if i % 7 == 0 { ' ' } else { char::from(b'a' + (i % 26) as u8) })
            .collect();
        let chunks = chunk_pages("a.pdf", &[page(0, &text)], &config).unwrap();

        // starts at 0, 80, 160, 240, 320
        assert_eq!(chunks.len(), 5);
        assert_eq!(
            chunks.iter().map(|c| c.chunk).collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 4]
        );
        for pair in chunks.windows(2) {
            let overlap = &pair[0].text[80..];
            assert!(pair[1].text.starts_with(overlap));
        }
        assert_eq!(chunks[0].text, &text[..100]);
        assert_eq!(chunks[4].text, &text[320..]);
        assert!(text.ends_with(&chunks.last().unwrap().text));
    }

    #[test]
    fn splits_only_past_chunk_width() {
        let config = ChunkingConfig {
            chunk_chars: 100,
            overlap_ratio: 0.2,
            min_words: 1,
        };
        let exact = "x".repeat(100);
        let chunks = chunk_pages("a.pdf", &[page(0, &exact)], &config).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, exact);

        let over = "x".repeat(101);
        let chunks = chunk_pages("a.pdf", &[page(0, &over)], &config).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text.len(), 100);
        assert_eq!(chunks[1].text.len(), 21);
        assert_eq!(chunks[1].chunk, 1);
    }

    #[test]
    fn windows_count_characters_not_bytes() {
        let config = ChunkingConfig {
            chunk_chars: 10,
            overlap_ratio: 0.5,
            min_words: 1,
        };
        let text = "é".repeat(25);
        let chunks = chunk_pages("a.pdf", &[page(0, &text)], &config).unwrap();
        assert_eq!(chunks.len(), 5);
        assert!(chunks[..3].iter().all(|c| c.text.chars().count() == 10));
        assert_eq!(chunks[3].text.chars().count(), 10);
        assert_eq!(chunks[4].text.chars().count(), 5);
    }

    #[test]
    fn default_stride_matches_eighty_percent() {
        assert_eq!(ChunkingConfig::default().stride().unwrap(), 2000);
    }

    #[test]
    fn rejects_invalid_overlap() {
        let config = ChunkingConfig {
            overlap_ratio: 1.0,
            ..ChunkingConfig::default()
        };
        assert!(chunk_pages("a.pdf", &[], &config).is_err());
    }
}
