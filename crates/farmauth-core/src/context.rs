//! Per-request context passed through the authorization surface.
//!
//! Evaluation is bounded and in-memory, so there is no deadline here; the
//! context only carries correlation data into audit records.

/// Caller-supplied request metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    request_id: Option<String>,
}

impl RequestContext {
    /// Context with no correlation data.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_request_id(request_id: impl Into<String>) -> Self {
        Self {
            request_id: Some(request_id.into()),
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }
}
