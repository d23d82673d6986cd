//! HTML body to content block conversion.

use super::builder::ConversionError;
use super::model::Block;

/// Result of converting one body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Converted {
    /// Structured blocks in document order.
    pub blocks: Vec<Block>,
    /// Non-fatal problems noticed during conversion.
    pub warnings: Vec<String>,
}

/// Converts a raw HTML body into structured content blocks.
pub trait BodyConverter: Send + Sync {
    /// Converts `html` into blocks.
    ///
    /// # Errors
    ///
    /// Returns an error if the body cannot be converted at all.
    fn html_to_blocks(&self, html: &str) -> Result<Converted, ConversionError>;
}

/// Default converter: HTML to Markdown with `htmd`, then Markdown to blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmdConverter;

impl BodyConverter for HtmdConverter {
    fn html_to_blocks(&self, html: &str) -> Result<Converted, ConversionError> {
        let mut warnings = Vec::new();
        if html.trim().is_empty() {
            warnings.push("message body is empty".to_string());
            return Ok(Converted {
                blocks: Vec::new(),
                warnings,
            });
        }

        let markdown = htmd::convert(html).map_err(|e| ConversionError::Body(e.to_string()))?;
        let blocks = markdown_to_blocks(&markdown);
        if blocks.is_empty() {
            warnings.push("body produced no content blocks".to_string());
        }

        Ok(Converted { blocks, warnings })
    }
}

/// Splits Markdown text into blocks.
///
/// Handles the constructs `htmd` emits for mail bodies: ATX and setext
/// headings, lists, block quotes, fenced code and thematic breaks.
/// Everything else becomes paragraph text.
fn markdown_to_blocks(markdown: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();
    let mut lines = markdown.lines();

    while let Some(raw) = lines.next() {
        let line = raw.trim_end();
        let trimmed = line.trim_start();

        if let Some(fence) = code_fence(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks);
            let language = trimmed[fence.len()..].trim();
            let mut code = Vec::new();
            for code_line in lines.by_ref() {
                if code_line.trim_start().starts_with(fence) {
                    break;
                }
                code.push(code_line);
            }
            blocks.push(Block::Code {
                language: (!language.is_empty()).then(|| language.to_string()),
                text: code.join("\n"),
            });
            continue;
        }

        if trimmed.is_empty() {
            flush_paragraph(&mut paragraph, &mut blocks);
            continue;
        }

        if !paragraph.is_empty()
            && let Some(level) = setext_level(trimmed)
        {
            let text = paragraph.join(" ");
            paragraph.clear();
            blocks.push(Block::Heading { level, text });
            continue;
        }

        if is_thematic_break(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks);
            blocks.push(Block::Divider);
            continue;
        }

        if let Some((level, text)) = atx_heading(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks);
            blocks.push(Block::Heading {
                level,
                text: text.to_string(),
            });
            continue;
        }

        if let Some(quoted) = trimmed.strip_prefix('>') {
            flush_paragraph(&mut paragraph, &mut blocks);
            let quoted = quoted.trim();
            if let Some(Block::Quote { text }) = blocks.last_mut() {
                text.push('\n');
                text.push_str(quoted);
            } else {
                blocks.push(Block::Quote {
                    text: quoted.to_string(),
                });
            }
            continue;
        }

        if let Some(item) = bullet_item(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks);
            blocks.push(Block::Bulleted {
                text: item.to_string(),
            });
            continue;
        }

        if let Some(item) = numbered_item(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks);
            blocks.push(Block::Numbered {
                text: item.to_string(),
            });
            continue;
        }

        // Indented continuation of the previous list item.
        if paragraph.is_empty()
            && line.starts_with(char::is_whitespace)
            && let Some(Block::Bulleted { text } | Block::Numbered { text }) = blocks.last_mut()
        {
            text.push(' ');
            text.push_str(trimmed);
            continue;
        }

        paragraph.push(trimmed);
    }

    flush_paragraph(&mut paragraph, &mut blocks);
    blocks
}

fn flush_paragraph(paragraph: &mut Vec<&str>, blocks: &mut Vec<Block>) {
    if paragraph.is_empty() {
        return;
    }
    blocks.push(Block::Paragraph {
        text: paragraph.join("\n"),
    });
    paragraph.clear();
}

fn code_fence(line: &str) -> Option<&'static str> {
    if line.starts_with("```") {
        Some("```")
    } else if line.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

fn setext_level(line: &str) -> Option<u8> {
    if line.chars().all(|c| c == '=') {
        Some(1)
    } else if line.len() >= 2 && line.chars().all(|c| c == '-') {
        Some(2)
    } else {
        None
    }
}

fn is_thematic_break(line: &str) -> bool {
    let marks: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    marks.len() >= 3
        && ['-', '*', '_']
            .iter()
            .any(|mark| marks.chars().all(|c| c == *mark))
}

fn atx_heading(line: &str) -> Option<(u8, &str)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&level) {
        return None;
    }
    let rest = &line[level..];
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    let text = rest.trim().trim_end_matches('#').trim_end();
    u8::try_from(level).ok().map(|level| (level, text))
}

fn bullet_item(line: &str) -> Option<&str> {
    ["- ", "* ", "+ "]
        .iter()
        .find_map(|marker| line.strip_prefix(marker))
        .map(str::trim)
}

fn numbered_item(line: &str) -> Option<&str> {
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 || digits > 9 {
        return None;
    }
    let rest = &line[digits..];
    rest.strip_prefix(". ")
        .or_else(|| rest.strip_prefix(") "))
        .map(str::trim)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn paragraph(text: &str) -> Block {
        Block::Paragraph {
            text: text.to_string(),
        }
    }

    #[test]
    fn test_markdown_structure() {
        let markdown = "# Title\n\nFirst line\nsecond line\n\n- one\n- two\n  continued\n\n1. first\n2) second\n\n> quoted\n> more\n\n* * *\n\n```rust\nfn main() {}\n```\n\nSub\n---\n";

        let blocks = markdown_to_blocks(markdown);

        assert_eq!(
            blocks,
            vec![
                Block::Heading {
                    level: 1,
                    text: "Title".to_string()
                },
                paragraph("First line\nsecond line"),
                Block::Bulleted {
                    text: "one".to_string()
                },
                Block::Bulleted {
                    text: "two continued".to_string()
                },
                Block::Numbered {
                    text: "first".to_string()
                },
                Block::Numbered {
                    text: "second".to_string()
                },
                Block::Quote {
                    text: "quoted\nmore".to_string()
                },
                Block::Divider,
                Block::Code {
                    language: Some("rust".to_string()),
                    text: "fn main() {}".to_string()
                },
                Block::Heading {
                    level: 2,
                    text: "Sub".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_hash_without_space_is_text() {
        assert_eq!(markdown_to_blocks("#hashtag"), vec![paragraph("#hashtag")]);
    }

    #[test]
    fn test_htmd_converter_paragraphs() {
        let converted = HtmdConverter
            .html_to_blocks("<h2>Agenda</h2><p>Hello <b>team</b></p><ul><li>Budget</li></ul>")
            .unwrap();

        assert!(converted.warnings.is_empty());
        assert_eq!(
            converted.blocks.first(),
            Some(&Block::Heading {
                level: 2,
                text: "Agenda".to_string()
            })
        );
        assert!(converted.blocks.contains(&paragraph("Hello **team**")));
        assert!(
            converted
                .blocks
                .iter()
                .any(|b| matches!(b, Block::Bulleted { text } if text == "Budget"))
        );
    }

    #[test]
    fn test_empty_body_warns() {
        let converted = HtmdConverter.html_to_blocks("   ").unwrap();
        assert!(converted.blocks.is_empty());
        assert_eq!(converted.warnings, vec!["message body is empty".to_string()]);
    }
}
