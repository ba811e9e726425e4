//! The workspace data model submitted per analysis request.

pub mod buffer;
pub mod regions;
pub mod viewport;

pub use buffer::{Buffer, BufferId};
pub use regions::{Directive, DirectiveScanner, LineDirectiveScanner, extract_viewports};
pub use viewport::Viewport;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::BridgeResult;

/// The ordered collection of buffers submitted together as one analysis
/// request. Owns its buffers; viewports extracted from it share them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub workspace_type: String,
    pub buffers: Vec<Buffer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_buffer_id: Option<BufferId>,
    #[serde(default)]
    pub include_instrumentation: bool,
}

impl Workspace {
    pub fn new(workspace_type: impl Into<String>, buffers: Vec<Buffer>) -> Self {
        Self {
            workspace_type: workspace_type.into(),
            buffers,
            active_buffer_id: None,
            include_instrumentation: false,
        }
    }

    /// Single-buffer workspace around one piece of source, named
    /// `Program.cs` by convention.
    pub fn from_source(workspace_type: impl Into<String>, source: impl Into<String>) -> Self {
        let buffer = Buffer::new(BufferId::file("Program.cs"), source, 0);
        Self::new(workspace_type, vec![buffer])
    }

    /// Select the buffer the caller's cursor is in.
    pub fn with_active_buffer(mut self, id: BufferId) -> Self {
        self.active_buffer_id = Some(id);
        self
    }

    pub fn with_instrumentation(mut self) -> Self {
        self.include_instrumentation = true;
        self
    }

    /// Look up a buffer by id.
    pub fn find_buffer(&self, id: &BufferId) -> Option<&Buffer> {
        self.buffers.iter().find(|buffer| &buffer.id == id)
    }

    /// Extract every directive-marked region of this workspace's buffers.
    ///
    /// Fails with [`crate::error::BridgeError::DuplicateRegionLabel`] when
    /// any two regions share a label, including across buffers.
    pub fn extract_viewports(&self, scanner: &dyn DirectiveScanner) -> BridgeResult<Vec<Viewport>> {
        let shared: Vec<Arc<Buffer>> = self.buffers.iter().cloned().map(Arc::new).collect();
        extract_viewports(&shared, scanner)
    }
}
