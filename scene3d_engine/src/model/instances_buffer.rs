/// Per-frame storage of instance vectors
///
/// Every visit of a frame gets its own region of the buffer: `clear()`
/// starts a region at the current cursor, models reserve their slice with
/// `add()`, then a lock/fill/unlock window writes the vectors and uploads
/// that region. Regions of earlier visits in the same frame stay valid
/// until `begin_frame()`.

use std::sync::Arc;
use glam::Vec4;

use crate::error::Result;
use crate::engine_debug;
use crate::graphics_device::{Buffer, BufferDesc, BufferUsage, GraphicsDevice};

/// Smallest GPU buffer allocation, in vectors
const MIN_GPU_VECTORS: usize = 1024;

const VECTOR_SIZE: u64 = std::mem::size_of::<Vec4>() as u64;

pub struct InstancesBuffer {
    vectors: Vec<Vec4>,
    cursor: usize,
    visit_start: usize,
    gpu_buffer: Option<Arc<dyn Buffer>>,
    gpu_capacity: usize,
}

impl Default for InstancesBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl InstancesBuffer {
    pub fn new() -> Self {
        Self {
            vectors: Vec::new(),
            cursor: 0,
            visit_start: 0,
            gpu_buffer: None,
            gpu_capacity: 0,
        }
    }

    /// Forget every region (start of a render frame)
    pub fn begin_frame(&mut self) {
        self.cursor = 0;
        self.visit_start = 0;
    }

    /// Start the region of a new visit
    pub fn clear(&mut self) {
        self.visit_start = self.cursor;
    }

    /// Reserve `count` vectors, returning their offset in the buffer
    pub fn add(&mut self, count: usize) -> usize {
        let offset = self.cursor;
        self.cursor += count;
        if self.vectors.len() < self.cursor {
            self.vectors.resize(self.cursor, Vec4::ZERO);
        }
        offset
    }

    /// Vectors reserved since the last `clear()`
    pub fn visit_len(&self) -> usize {
        self.cursor - self.visit_start
    }

    /// Vectors reserved since `begin_frame()`
    pub fn frame_len(&self) -> usize {
        self.cursor
    }

    /// Open the fill window for the current visit
    pub fn lock(&mut self) -> InstancesLock<'_> {
        InstancesLock { buffer: self }
    }

    /// GPU buffer holding the uploaded vectors
    pub fn buffer(&self) -> Option<&Arc<dyn Buffer>> {
        self.gpu_buffer.as_ref()
    }

    pub fn gpu_capacity(&self) -> usize {
        self.gpu_capacity
    }

    fn ensure_gpu_capacity(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        if self.gpu_buffer.is_some() && self.gpu_capacity >= self.cursor {
            return Ok(());
        }

        // Earlier regions of this frame are re-uploaded into the new buffer
        let capacity = self.cursor.next_power_of_two().max(MIN_GPU_VECTORS);
        let buffer = device.create_buffer(BufferDesc {
            name: "instances".to_string(),
            size: capacity as u64 * VECTOR_SIZE,
            usage: BufferUsage::Storage,
        })?;
        engine_debug!("scene3d::InstancesBuffer", "Instance buffer grown to {} vectors", capacity);

        let previous = self.visit_start;
        if previous > 0 {
            buffer.update(0, bytemuck::cast_slice(&self.vectors[..previous]))?;
        }
        self.gpu_buffer = Some(buffer);
        self.gpu_capacity = capacity;
        Ok(())
    }
}

/// Fill window of one visit's region
///
/// Dropping the guard without `unlock()` leaves the GPU copy stale.
pub struct InstancesLock<'a> {
    buffer: &'a mut InstancesBuffer,
}

impl<'a> InstancesLock<'a> {
    /// Mutable view of `len` vectors starting at `offset`
    pub fn region_mut(&mut self, offset: usize, len: usize) -> &mut [Vec4] {
        debug_assert!(offset >= self.buffer.visit_start && offset + len <= self.buffer.cursor);
        &mut self.buffer.vectors[offset..offset + len]
    }

    /// Upload this visit's region and close the window
    pub fn unlock(self, device: &mut dyn GraphicsDevice) -> Result<()> {
        let buffer = self.buffer;
        if buffer.visit_len() == 0 {
            return Ok(());
        }
        buffer.ensure_gpu_capacity(device)?;

        let start = buffer.visit_start;
        let end = buffer.cursor;
        if let Some(gpu) = &buffer.gpu_buffer {
            gpu.update(start as u64 * VECTOR_SIZE, bytemuck::cast_slice(&buffer.vectors[start..end]))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "instances_buffer_tests.rs"]
mod tests;
