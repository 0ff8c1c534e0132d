//! Rendering boundary.
//!
//! The engine builds a [`ChainView`] (ordered nodes, their plain text and
//! resolved highlight ranges) and hands it to a [`Renderer`]. Renderers only
//! read; they never get mutable access to the tree.

use super::highlight::{HighlightRange, MarkupWrapper, apply_ranges};
use super::model::{MessageNode, ThreadAnnotation};

/// One node prepared for display.
#[derive(Debug, Clone)]
pub struct RenderedNode<'a> {
    pub node: &'a MessageNode,
    /// Plain text the highlight offsets refer to.
    pub text: String,
    pub highlights: Vec<HighlightRange>,
    /// Number of threads anchored to this node (drafts included).
    pub thread_count: usize,
}

/// An ordered chain ready to render, oldest node first.
#[derive(Debug, Clone)]
pub struct ChainView<'a> {
    /// The thread this chain belongs to, or `None` for the main conversation.
    pub thread: Option<&'a ThreadAnnotation>,
    pub nodes: Vec<RenderedNode<'a>>,
}

impl ChainView<'_> {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

pub trait Renderer {
    fn render(&mut self, view: &ChainView<'_>);
}

/// Renders chains as plain lines with textual highlight markers.
#[derive(Debug, Clone)]
pub struct MarkupRenderer {
    open: String,
    close: String,
    lines: Vec<String>,
}

impl MarkupRenderer {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
            lines: Vec::new(),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_output(self) -> String {
        self.lines.join("\n")
    }
}

impl Renderer for MarkupRenderer {
    fn render(&mut self, view: &ChainView<'_>) {
        if let Some(thread) = view.thread {
            self.lines.push(format!(
                "thread {} on \"{}\" (occurrence {})",
                thread.id.short(),
                thread.selection_text,
                thread.match_index + 1
            ));
        }

        for item in &view.nodes {
            let mut wrapper = MarkupWrapper::new(item.text.as_str(), &self.open, &self.close);
            apply_ranges(&mut wrapper, &item.highlights);

            let badge = match item.thread_count {
                0 => String::new(),
                1 => "  (1 thread)".to_string(),
                n => format!("  ({n} threads)"),
            };
            self.lines.push(format!(
                "{} [{}] {}{}",
                item.node.id.short(),
                item.node.role,
                wrapper.as_str(),
                badge
            ));
        }
    }
}
