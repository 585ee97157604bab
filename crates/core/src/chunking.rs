use crate::error::IngestError;

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
    pub min_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 1_200,
            overlap_chars: 120,
            min_chars: 120,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_chars == 0 {
            return Err(IngestError::InvalidArgument(
                "max_chars must be positive".to_string(),
            ));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(IngestError::InvalidArgument(format!(
                "overlap_chars {} must be below max_chars {}",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\u{a0}', " ")
}

/// Pack paragraphs into chunks of at most `max_chars`, splitting oversized
/// paragraphs with `overlap_chars` of carry-over between the pieces.
/// Fragments below `min_chars` are dropped unless they are all there is.
pub fn chunk_by_paragraph(text: &str, config: ChunkingConfig) -> Vec<String> {
    let paragraphs = text
        .split("\n\n")
        .map(|paragraph| normalize_whitespace(paragraph))
        .filter(|paragraph| !paragraph.is_empty())
        .collect::<Vec<_>>();

    let mut packed = Vec::new();
    let mut current = String::new();

    for paragraph in paragraphs {
        if current.is_empty() {
            current.push_str(&paragraph);
            continue;
        }

        if current.len() + paragraph.len() + 1 <= config.max_chars {
            current.push(' ');
            current.push_str(&paragraph);
        } else {
            if current.len() >= config.min_chars {
                packed.push(current.clone());
            }
            current.clear();
            current.push_str(&paragraph);
        }
    }

    if current.len() >= config.min_chars {
        packed.push(current);
    }

    if packed.is_empty() {
        let fallback = normalize_whitespace(text);
        if !fallback.is_empty() {
            packed.push(fallback);
        }
    }

    let mut sized = Vec::new();
    for chunk in packed {
        if chunk.len() <= config.max_chars {
            sized.push(chunk);
            continue;
        }

        let chars: Vec<char> = chunk.chars().collect();
        let mut start = 0;
        while start < chars.len() {
            let end = (start + config.max_chars).min(chars.len());
            sized.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start = start.saturating_add(config.max_chars.saturating_sub(config.overlap_chars));
        }
    }

    sized
}

#[cfg(test)]
mod tests {
    use super::{chunk_by_paragraph, normalize_whitespace, ChunkingConfig};

    #[test]
    fn whitespace_is_normalized() {
        let input = "A  \t  lot\nof   spacing";
        assert_eq!(normalize_whitespace(input), "A lot of spacing");
    }

    #[test]
    fn chunks_respect_max_chars() {
        let config = ChunkingConfig {
            max_chars: 24,
            overlap_chars: 4,
            min_chars: 4,
        };
        let text = "first paragraph of text\n\nsecond paragraph of text\n\nthird one";
        let chunks = chunk_by_paragraph(text, config);

        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|chunk| chunk.len() <= 24));
    }

    #[test]
    fn short_input_survives_as_single_chunk() {
        let config = ChunkingConfig {
            max_chars: 200,
            overlap_chars: 20,
            min_chars: 50,
        };
        let chunks = chunk_by_paragraph("tiny", config);
        assert_eq!(chunks, vec!["tiny".to_string()]);
    }

    #[test]
    fn invalid_overlap_is_rejected() {
        let config = ChunkingConfig {
            max_chars: 10,
            overlap_chars: 10,
            min_chars: 1,
        };
        assert!(config.validate().is_err());
    }
}
