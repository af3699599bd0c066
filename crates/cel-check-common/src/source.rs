//! Source text with line bookkeeping for diagnostics.

/// A line/column position within a [`Source`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Location {
    /// 1-based line number.
    pub line: usize,
    /// 0-based column, counted in characters.
    pub column: usize,
}

/// Expression source text plus a description used in error headers.
#[derive(Debug, Clone)]
pub struct Source {
    content: String,
    description: String,
    /// Byte offset of the start of each line.
    line_offsets: Vec<usize>,
}

impl Source {
    /// Create a source with the default `<input>` description.
    pub fn new(content: impl Into<String>) -> Self {
        Self::with_description(content, "<input>")
    }

    pub fn with_description(content: impl Into<String>, description: impl Into<String>) -> Self {
        let content = content.into();
        let line_offsets = compute_line_offsets(&content);
        Self {
            content,
            description: description.into(),
            line_offsets,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Map a byte offset to its line and column.
    ///
    /// Offsets past the end clamp to the end of the text.
    pub fn location(&self, offset: usize) -> Location {
        let offset = offset.min(self.content.len());
        let line_index = match self.line_offsets.binary_search(&offset) {
            Ok(index) => index,
            Err(index) => index.saturating_sub(1),
        };
        let line_start = self.line_offsets[line_index];
        let column = self
            .content
            .get(line_start..offset)
            .map(|prefix| prefix.chars().count())
            .unwrap_or(0);
        Location {
            line: line_index + 1,
            column,
        }
    }

    /// Text of the given 1-based line, without its terminator.
    pub fn snippet(&self, line: usize) -> Option<&str> {
        let start = *self.line_offsets.get(line.checked_sub(1)?)?;
        let end = self
            .line_offsets
            .get(line)
            .map(|next| next - 1)
            .unwrap_or(self.content.len());
        self.content.get(start..end)
    }
}

fn compute_line_offsets(content: &str) -> Vec<usize> {
    let mut offsets = vec![0];
    for (i, c) in content.char_indices() {
        if c == '\n' {
            offsets.push(i + 1);
        }
    }
    offsets
}
