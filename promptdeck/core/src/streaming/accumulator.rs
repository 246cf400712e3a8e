//! Response Accumulator
//!
//! Folds `Text` events into the growing response text.

use super::decoder::StreamEvent;

/// Append-only text buffer for one response
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseAccumulator {
    text: String,
    chunks: usize,
}

impl ResponseAccumulator {
    /// Create an empty accumulator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the accumulator with `content` appended
    #[must_use]
    pub fn append(mut self, content: &str) -> Self {
        self.push(content);
        self
    }

    /// Append `content` in place
    pub fn push(&mut self, content: &str) {
        self.text.push_str(content);
        self.chunks += 1;
    }

    /// Fold a sequence of events; non-text events are skipped
    pub fn fold<'a>(events: impl IntoIterator<Item = &'a StreamEvent>) -> Self {
        events
            .into_iter()
            .fold(Self::new(), |acc, event| match event {
                StreamEvent::Text { content } => acc.append(content),
                _ => acc,
            })
    }

    /// Text accumulated so far
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Number of text chunks folded in
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks
    }

    /// Length of the text in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Whether no text has arrived
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Consume the accumulator, returning the text
    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(content: &str) -> StreamEvent {
        StreamEvent::Text {
            content: content.to_string(),
        }
    }

    #[test]
    fn test_fold_concatenates_in_order() {
        let events = [text("Hel"), text("lo"), text(", "), text("world")];
        let acc = ResponseAccumulator::fold(&events);
        assert_eq!(acc.as_str(), "Hello, world");
        assert_eq!(acc.chunk_count(), 4);
    }

    #[test]
    fn test_fold_skips_non_text_events() {
        let events = [
            text("a"),
            StreamEvent::Error {
                message: "ignored".to_string(),
            },
            text("b"),
        ];
        assert_eq!(ResponseAccumulator::fold(&events).as_str(), "ab");
    }

    #[test]
    fn test_no_dedup_of_repeated_chunks() {
        let acc = ResponseAccumulator::new().append("na").append("na").append("");
        assert_eq!(acc.as_str(), "nana");
        assert_eq!(acc.chunk_count(), 3);
    }

    #[test]
    fn test_empty() {
        let acc = ResponseAccumulator::new();
        assert!(acc.is_empty());
        assert_eq!(acc.len(), 0);
        assert_eq!(acc.into_text(), "");
    }
}
