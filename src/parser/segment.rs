use super::lines::{HeadingMatch, Line, LineClassifier, PatternSet};

/// Text following one heading, up to the next heading or the end of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub number: String,
    pub title: String,
    pub function_id: String,
    pub body: String,
}

/// Running state of the left-to-right scan: the open heading and its buffered lines.
#[derive(Debug, Default)]
struct SegmentState {
    open: Option<HeadingMatch>,
    buffer: Vec<String>,
}

impl SegmentState {
    fn close(&mut self) -> Option<Block> {
        let heading = self.open.take()?;
        let body = std::mem::take(&mut self.buffer).join("\n");
        Some(Block {
            number: heading.number,
            title: heading.title,
            function_id: heading.function_id,
            body,
        })
    }
}

/// Split document text into blocks using the customer-function dialect.
pub fn segment(text: &str) -> Vec<Block> {
    segment_with(text, PatternSet::customer_function())
}

/// Split document text into blocks, one per heading line recognised by `classifier`.
///
/// Lines before the first heading belong to no block and are dropped. Non-heading
/// lines are trimmed and kept verbatim, blank ones included.
pub fn segment_with(text: &str, classifier: &impl LineClassifier) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut state = SegmentState::default();

    for line in text.split('\n') {
        match classifier.classify(line) {
            Line::Heading(heading) => {
                if let Some(block) = state.close() {
                    blocks.push(block);
                }
                state.open = Some(heading);
            }
            Line::Text(t) if state.open.is_some() => state.buffer.push(t.to_string()),
            Line::Text(_) => {}
        }
    }

    if let Some(block) = state.close() {
        blocks.push(block);
    }

    blocks
}

// ── Tests ──
