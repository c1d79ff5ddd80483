//! Character-by-character phrase reveal

/// Reveals a phrase one Unicode scalar value at a time
#[derive(Debug, Clone)]
pub struct Typewriter {
    text: String,
    revealed: usize,
    total: usize,
}

impl Typewriter {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let total = text.chars().count();
        Self {
            text,
            revealed: 0,
            total,
        }
    }

    /// Reveal one more character; false once everything is shown
    pub fn advance(&mut self) -> bool {
        if self.revealed >= self.total {
            return false;
        }
        self.revealed += 1;
        true
    }

    pub fn revealed_text(&self) -> &str {
        let end = self
            .text
            .char_indices()
            .nth(self.revealed)
            .map(|(i, _)| i)
            .unwrap_or(self.text.len());
        &self.text[..end]
    }

    pub fn is_complete(&self) -> bool {
        self.revealed >= self.total
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}
