//! Viewports: named sub-ranges of a source buffer.

use std::ops::Range;
use std::sync::Arc;

use super::buffer::{Buffer, BufferId};

/// A named, directive-marked sub-span of a source buffer.
///
/// The viewport shares the buffer it was extracted from rather than owning
/// a copy; the span is a byte range into the buffer's content that excludes
/// the directive text itself. Viewports produced by one extraction call
/// never overlap.
#[derive(Debug, Clone)]
pub struct Viewport {
    source: Arc<Buffer>,
    span: Range<usize>,
    id: BufferId,
}

impl Viewport {
    pub(crate) fn new(source: Arc<Buffer>, span: Range<usize>, id: BufferId) -> Self {
        debug_assert!(span.end <= source.content.len());
        Self { source, span, id }
    }

    /// The buffer this viewport was extracted from.
    pub fn source(&self) -> &Arc<Buffer> {
        &self.source
    }

    /// Byte range of the region body within the source content.
    pub fn span(&self) -> Range<usize> {
        self.span.clone()
    }

    /// The id addressing this region (`file@label`).
    pub fn id(&self) -> &BufferId {
        &self.id
    }

    /// The region body text.
    pub fn text(&self) -> &str {
        &self.source.content[self.span.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_returns_the_spanned_slice() {
        let buffer = Arc::new(Buffer::new(BufferId::file("A.cs"), "abc def ghi", 0));
        let viewport = Viewport::new(Arc::clone(&buffer), 4..7, BufferId::region("A.cs", "mid"));
        assert_eq!(viewport.text(), "def");
        assert_eq!(viewport.id(), &BufferId::region("A.cs", "mid"));
        assert_eq!(viewport.span(), 4..7);
    }
}
