//! A minimal Markdown block parser: groups raw text into heading/paragraph/list/table/
//! code/blockquote/hr blocks in document order. Deliberately line-oriented rather than
//! a full CommonMark AST — good enough to make token-budgeted splitting block-aware
//! without ever fragmenting a table or a fenced code region.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Heading(u8),
    Paragraph,
    List,
    Table,
    Code,
    Blockquote,
    Hr,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub kind: BlockKind,
    pub text: String,
    /// For headings, the heading text without the leading `#`s.
    pub heading_text: Option<String>,
}

fn heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(#{1,6})\s+(.*)$").unwrap())
}

fn hr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(-{3,}|\*{3,}|_{3,})\s*$").unwrap())
}

fn list_item_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*([-*+]|\d+\.)\s+").unwrap())
}

/// Parse `markdown` into an ordered sequence of blocks.
pub fn parse_blocks(markdown: &str) -> Vec<Block> {
    let lines: Vec<&str> = markdown.lines().collect();
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        if line.trim().is_empty() {
            i += 1;
            continue;
        }

        // Fenced code: ``` or ~~~ until a matching closing fence (or EOF).
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            let fence = &trimmed[..3];
            let start = i;
            i += 1;
            while i < lines.len() && !lines[i].trim_start().starts_with(fence) {
                i += 1;
            }
            if i < lines.len() {
                i += 1; // consume closing fence
            }
            blocks.push(Block {
                kind: BlockKind::Code,
                text: lines[start..i].join("\n"),
                heading_text: None,
            });
            continue;
        }

        // HTML table block: from <table> to the matching </table>.
        if trimmed.starts_with("<table") {
            let start = i;
            i += 1;
            while i < lines.len() && !lines[i].contains("</table>") {
                i += 1;
            }
            if i < lines.len() {
                i += 1;
            }
            blocks.push(Block {
                kind: BlockKind::Table,
                text: lines[start..i].join("\n"),
                heading_text: None,
            });
            continue;
        }

        // Markdown pipe table: a header row followed by a `---|---` separator row.
        if trimmed.starts_with('|')
            && i + 1 < lines.len()
            && is_table_separator(lines[i + 1].trim())
        {
            let start = i;
            i += 2;
            while i < lines.len() && lines[i].trim_start().starts_with('|') {
                i += 1;
            }
            blocks.push(Block {
                kind: BlockKind::Table,
                text: lines[start..i].join("\n"),
                heading_text: None,
            });
            continue;
        }

        if let Some(caps) = heading_regex().captures(line) {
            let level = caps[1].len() as u8;
            let text = caps[2].trim().to_string();
            blocks.push(Block {
                kind: BlockKind::Heading(level),
                text: line.to_string(),
                heading_text: Some(text),
            });
            i += 1;
            continue;
        }

        if hr_regex().is_match(line.trim()) {
            blocks.push(Block {
                kind: BlockKind::Hr,
                text: line.to_string(),
                heading_text: None,
            });
            i += 1;
            continue;
        }

        if line.trim_start().starts_with('>') {
            let start = i;
            while i < lines.len() && lines[i].trim_start().starts_with('>') {
                i += 1;
            }
            blocks.push(Block {
                kind: BlockKind::Blockquote,
                text: lines[start..i].join("\n"),
                heading_text: None,
            });
            continue;
        }

        if list_item_regex().is_match(line) {
            let start = i;
            while i < lines.len()
                && !lines[i].trim().is_empty()
                && (list_item_regex().is_match(lines[i]) || lines[i].starts_with("  "))
            {
                i += 1;
            }
            blocks.push(Block {
                kind: BlockKind::List,
                text: lines[start..i].join("\n"),
                heading_text: None,
            });
            continue;
        }

        // Plain paragraph: consecutive non-blank, non-special lines.
        let start = i;
        while i < lines.len() && !lines[i].trim().is_empty() && !is_block_opener(lines[i]) {
            i += 1;
        }
        blocks.push(Block {
            kind: BlockKind::Paragraph,
            text: lines[start..i].join("\n"),
            heading_text: None,
        });
    }

    blocks
}

fn is_table_separator(line: &str) -> bool {
    !line.is_empty()
        && line
            .chars()
            .all(|c| matches!(c, '|' | '-' | ':' | ' '))
        && line.contains('-')
}

fn is_block_opener(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```")
        || trimmed.starts_with("~~~")
        || trimmed.starts_with("<table")
        || trimmed.starts_with('#')
        || trimmed.starts_with('>')
        || hr_regex().is_match(line.trim())
        || list_item_regex().is_match(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_heading_and_paragraph() {
        let blocks = parse_blocks("# Title\n\nSome body text.\n");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].kind, BlockKind::Heading(1));
        assert_eq!(blocks[1].kind, BlockKind::Paragraph);
    }

    #[test]
    fn keeps_fenced_code_as_one_block() {
        let md = "```rust\nfn main() {}\n```\n";
        let blocks = parse_blocks(md);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, BlockKind::Code);
        assert!(blocks[0].text.contains("fn main()"));
    }

    #[test]
    fn keeps_html_table_as_one_block() {
        let md = "<table><tr><td>a</td></tr></table>\n";
        let blocks = parse_blocks(md);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, BlockKind::Table);
    }

    #[test]
    fn keeps_pipe_table_as_one_block() {
        let md = "| a | b |\n| - | - |\n| 1 | 2 |\n";
        let blocks = parse_blocks(md);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, BlockKind::Table);
    }
}
