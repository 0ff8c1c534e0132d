//! Plain-text extraction from message nodes.
//!
//! Selections are captured from rendered text, so occurrence matching must run
//! against the same formatting-free text the user saw.

use std::borrow::Cow;

use pulldown_cmark::{Event, Options, Parser, TagEnd};

use super::model::MessageNode;

/// Returns the searchable plain text of a node.
pub trait TextAccessor: Send + Sync {
    fn plain_text<'a>(&self, node: &'a MessageNode) -> Cow<'a, str>;
}

/// Uses message content verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextAccessor;

impl TextAccessor for PlainTextAccessor {
    fn plain_text<'a>(&self, node: &'a MessageNode) -> Cow<'a, str> {
        Cow::Borrowed(&node.content)
    }
}

/// Strips markdown formatting, keeping text, inline code and code blocks.
///
/// Block boundaries become single newlines.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownTextAccessor;

impl MarkdownTextAccessor {
    pub fn strip(markdown: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TABLES);

        let mut out = String::with_capacity(markdown.len());
        for event in Parser::new_ext(markdown, options) {
            match event {
                Event::Text(text) | Event::Code(text) => out.push_str(&text),
                Event::SoftBreak | Event::HardBreak => out.push('\n'),
                Event::End(TagEnd::TableCell) => out.push(' '),
                Event::End(
                    TagEnd::Paragraph
                    | TagEnd::Heading(_)
                    | TagEnd::CodeBlock
                    | TagEnd::Item
                    | TagEnd::BlockQuote(_)
                    | TagEnd::TableHead
                    | TagEnd::TableRow,
                ) => {
                    if !out.is_empty() && !out.ends_with('\n') {
                        out.push('\n');
                    }
                }
                _ => {}
            }
        }

        let trimmed = out.trim_end().len();
        out.truncate(trimmed);
        out
    }
}

impl TextAccessor for MarkdownTextAccessor {
    fn plain_text<'a>(&self, node: &'a MessageNode) -> Cow<'a, str> {
        Cow::Owned(Self::strip(&node.content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_removes_inline_formatting() {
        let text = MarkdownTextAccessor::strip("# Title\n\nSome **bold** and `code`.");
        assert_eq!(text, "Title\nSome bold and code.");
    }

    #[test]
    fn test_strip_keeps_code_blocks_and_list_items() {
        let text = MarkdownTextAccessor::strip("- one\n- *two*\n\n```rust\nfn main() {}\n```\n");
        assert_eq!(text, "one\ntwo\nfn main() {}");
    }

    #[test]
    fn test_strip_drops_link_targets() {
        let text = MarkdownTextAccessor::strip("see [the docs](https://example.com) now");
        assert_eq!(text, "see the docs now");
    }
}
