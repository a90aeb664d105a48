//! The query context: a line of text and a cursor offset.

use quill::prelude::*;

/// A completion request at `offset` in `text`.
#[derive(Debug, Clone)]
pub struct WordQuery {
    text: String,
    offset: usize,
}

impl WordQuery {
    /// Places the cursor at the end of `text`.
    pub fn at_end(text: impl Into<String>) -> Self {
        let text = text.into();
        let offset = text.len();
        Self { text, offset }
    }

    /// Places the cursor at `offset`, clamped to the text and moved back to a
    /// character boundary.
    pub fn at(text: impl Into<String>, offset: usize) -> Self {
        let text = text.into();
        let mut offset = offset.min(text.len());
        while !text.is_char_boundary(offset) {
            offset -= 1;
        }
        Self { text, offset }
    }

    /// Text before the cursor.
    pub fn before(&self) -> &str {
        &self.text[..self.offset]
    }

    /// The partial word immediately before the cursor.
    pub fn prefix(&self) -> &str {
        let before = self.before();
        let start = before
            .char_indices()
            .rev()
            .take_while(|(_, c)| is_word_char(*c))
            .last()
            .map_or(before.len(), |(i, _)| i);
        &before[start..]
    }

    /// Whether the partial word is the first word on its line.
    pub fn at_line_start(&self) -> bool {
        let before = self.before();
        let head = &before[..before.len() - self.prefix().len()];
        head.rsplit('\n').next().is_none_or(|line| line.trim().is_empty())
    }

    /// Complete words in the text, excluding the one being typed.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        let typed = self.offset - self.prefix().len();
        self.text
            .split(|c: char| !is_word_char(c))
            .filter(|w| !w.is_empty())
            .filter(move |w| {
                let start = w.as_ptr() as usize - self.text.as_ptr() as usize;
                start != typed
            })
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

impl QueryContext for WordQuery {
    type Position = usize;

    fn position(&self) -> &usize {
        &self.offset
    }
}
