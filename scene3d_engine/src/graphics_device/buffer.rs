/// Buffer trait and buffer descriptor

use crate::error::Result;

/// Buffer usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Vertex buffer
    Vertex,
    /// Index buffer
    Index,
    /// Uniform/constant buffer
    Uniform,
    /// Storage buffer (per-instance vectors, light lists, tile data)
    Storage,
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone)]
pub struct BufferDesc {
    /// Debug name
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Buffer usage
    pub usage: BufferUsage,
}

/// Buffer resource trait
pub trait Buffer: Send + Sync {
    /// Size in bytes fixed at creation
    fn size(&self) -> u64;

    /// Write `data` at byte `offset`
    ///
    /// Fails when the write would run past `size()`.
    fn update(&self, offset: u64, data: &[u8]) -> Result<()>;
}
