//! Resource emission sinks
//!
//! A sink receives fully built resources one at a time on the collecting
//! task. [`BufferSink`] keeps them all; [`StreamSink`] hands each to a
//! callback and stops at the first callback error.

use crate::error::{BoxError, CollectError};
use crate::resource::Resource;

/// Destination for collected resources.
pub trait ResourceSink {
    /// Accept one resource.
    ///
    /// An error stops the collection run; no further resources are emitted.
    fn emit(&mut self, resource: Resource) -> Result<(), CollectError>;
}

/// Buffers every resource in arrival order.
#[derive(Debug, Default, Clone)]
pub struct BufferSink {
    resources: Vec<Resource>,
}

impl BufferSink {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffered resources.
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Consume the sink, returning the buffered resources.
    pub fn into_resources(self) -> Vec<Resource> {
        self.resources
    }

    /// Number of buffered resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether nothing has been buffered.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl ResourceSink for BufferSink {
    fn emit(&mut self, resource: Resource) -> Result<(), CollectError> {
        self.resources.push(resource);
        Ok(())
    }
}

/// Passes every resource to a callback.
pub struct StreamSink<F> {
    callback: F,
    emitted: usize,
}

impl<F, E> StreamSink<F>
where
    F: FnMut(Resource) -> Result<(), E>,
    E: Into<BoxError>,
{
    /// Wrap a callback.
    pub fn new(callback: F) -> Self {
        Self {
            callback,
            emitted: 0,
        }
    }

    /// Resources accepted by the callback so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }
}

impl<F, E> ResourceSink for StreamSink<F>
where
    F: FnMut(Resource) -> Result<(), E>,
    E: Into<BoxError>,
{
    fn emit(&mut self, resource: Resource) -> Result<(), CollectError> {
        (self.callback)(resource).map_err(CollectError::sink)?;
        self.emitted += 1;
        Ok(())
    }
}

impl<F> std::fmt::Debug for StreamSink<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSink")
            .field("emitted", &self.emitted)
            .finish_non_exhaustive()
    }
}
