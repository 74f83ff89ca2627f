//! PositionResolver: maps a chunk's text back to per-page bounding boxes using the
//! layout JSON produced by the parse service (spec §4.4).

use crate::model::{LayoutRecord, PositionTuple};

/// A character of the reference string together with the index of the layout block
/// it originated from. Built once per document (spec §9: "immutable BlockSpan[]
/// index first, then scanned read-only" — avoids cyclic block/chunk references).
struct BlockSpan {
    ch: char,
    block_index: usize,
}

pub struct PositionResolver;

impl PositionResolver {
    pub fn new() -> Self {
        Self
    }

    /// Returns `None` when no full match is found; the orchestrator then falls back
    /// to the `top_int = source_index` hint (spec §4.4, §7 IntegrityError path).
    pub fn resolve(&self, layout: &LayoutRecord, chunk_text: &str) -> Option<Vec<PositionTuple>> {
        if layout.blocks.is_empty() || chunk_text.trim().is_empty() {
            return None;
        }

        let spans = build_spans(layout);
        let (normalized_ref, ref_map) = normalize_with_mapping(&spans);
        let normalized_chunk = normalize_plain(chunk_text);

        if normalized_chunk.is_empty() {
            return None;
        }

        let match_start = find_leftmost(&normalized_ref, &normalized_chunk)?;
        let match_end = match_start + normalized_chunk.len();

        let orig_start = ref_map[match_start];
        let orig_end = ref_map[match_end - 1];

        let touched_blocks: Vec<usize> = spans[orig_start..=orig_end]
            .iter()
            .map(|span| span.block_index)
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();

        if touched_blocks.is_empty() {
            return None;
        }

        Some(merge_by_page_in_appearance_order(layout, &touched_blocks))
    }
}

impl Default for PositionResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn build_spans(layout: &LayoutRecord) -> Vec<BlockSpan> {
    let mut spans = Vec::new();
    for (block_index, block) in layout.blocks.iter().enumerate() {
        let text = block
            .text
            .clone()
            .unwrap_or_else(|| block.lines.join("\n"));
        for ch in text.chars() {
            spans.push(BlockSpan { ch, block_index });
        }
    }
    spans
}

/// Collapse whitespace and drop Markdown punctuation, keeping a mapping back to the
/// original span index for every retained (and collapsed-whitespace) character.
fn normalize_with_mapping(spans: &[BlockSpan]) -> (Vec<char>, Vec<usize>) {
    let mut normalized = Vec::new();
    let mut mapping = Vec::new();
    let mut last_was_space = true;

    for (i, span) in spans.iter().enumerate() {
        if is_dropped_punctuation(span.ch) {
            continue;
        }
        if span.ch.is_whitespace() {
            if !last_was_space {
                normalized.push(' ');
                mapping.push(i);
                last_was_space = true;
            }
            continue;
        }
        normalized.push(span.ch);
        mapping.push(i);
        last_was_space = false;
    }

    while normalized.last() == Some(&' ') {
        normalized.pop();
        mapping.pop();
    }

    (normalized, mapping)
}

fn normalize_plain(text: &str) -> Vec<char> {
    let mut normalized = Vec::new();
    let mut last_was_space = true;
    for ch in text.chars() {
        if is_dropped_punctuation(ch) {
            continue;
        }
        if ch.is_whitespace() {
            if !last_was_space {
                normalized.push(' ');
                last_was_space = true;
            }
            continue;
        }
        normalized.push(ch);
        last_was_space = false;
    }
    while normalized.last() == Some(&' ') {
        normalized.pop();
    }
    normalized
}

fn is_dropped_punctuation(c: char) -> bool {
    matches!(c, '#' | '*' | '_' | '`' | '>' | '|')
}

/// Leftmost occurrence of `needle` in `haystack`, case-sensitive. A linear scan is
/// used here; correctness matters more than asymptotic complexity for chunk-sized
/// inputs.
fn find_leftmost(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn merge_by_page_in_appearance_order(
    layout: &LayoutRecord,
    touched_blocks: &[usize],
) -> Vec<PositionTuple> {
    let mut order: Vec<u32> = Vec::new();
    let mut by_page: std::collections::HashMap<u32, (i64, i64, i64, i64)> =
        std::collections::HashMap::new();

    for &block_index in touched_blocks {
        let block = &layout.blocks[block_index];
        let page = block.page_index + 1;
        let (left, right, top, bottom) = block.bbox;

        by_page
            .entry(page)
            .and_modify(|bbox| {
                bbox.0 = bbox.0.min(left);
                bbox.1 = bbox.1.max(right);
                bbox.2 = bbox.2.min(top);
                bbox.3 = bbox.3.max(bottom);
            })
            .or_insert_with(|| {
                order.push(page);
                (left, right, top, bottom)
            });
    }

    order
        .into_iter()
        .map(|page| {
            let (left, right, top, bottom) = by_page[&page];
            (page, left, right, top, bottom)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BlockType, LayoutBlock};

    fn block(page_index: u32, bbox: (i64, i64, i64, i64), text: &str) -> LayoutBlock {
        LayoutBlock {
            page_index,
            bbox,
            block_type: BlockType::Text,
            lines: vec![],
            text: Some(text.to_string()),
        }
    }

    #[test]
    fn resolves_chunk_spanning_two_pages() {
        let layout = LayoutRecord {
            blocks: vec![
                block(0, (10, 200, 50, 80), "Hello world"),
                block(1, (10, 200, 100, 160), "continues here"),
            ],
        };
        let resolver = PositionResolver::new();
        let positions = resolver.resolve(&layout, "Hello world continues here").unwrap();
        assert_eq!(positions, vec![(1, 10, 200, 50, 80), (2, 10, 200, 100, 160)]);
    }

    #[test]
    fn returns_none_when_no_match() {
        let layout = LayoutRecord {
            blocks: vec![block(0, (0, 10, 0, 10), "something else entirely")],
        };
        let resolver = PositionResolver::new();
        assert!(resolver.resolve(&layout, "not present anywhere").is_none());
    }

    #[test]
    fn returns_none_for_empty_layout() {
        let layout = LayoutRecord::default();
        let resolver = PositionResolver::new();
        assert!(resolver.resolve(&layout, "text").is_none());
    }
}
