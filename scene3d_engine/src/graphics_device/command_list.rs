/// CommandList trait - for recording rendering commands

use std::sync::Arc;
use crate::error::Result;
use super::{Buffer, FrameBuffer, Program, Texture};

/// Integer rectangle in pixels (viewports, scissors, the scene viewport)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect2D {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle at the origin
    pub fn from_size(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }

    /// True when either dimension is zero (minimized window, collapsed view)
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Clear value for an attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// Color clear value (RGBA)
    Color([f32; 4]),
    /// Depth/stencil clear value
    DepthStencil { depth: f32, stencil: u32 },
}

/// Color blending for subsequent draws
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    Opaque,
    /// src_alpha, one_minus_src_alpha
    Alpha,
    /// one, one
    Additive,
}

/// Depth test/write for subsequent draws
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthMode {
    Disabled,
    /// less-or-equal test, no writes
    TestOnly,
    /// less test with writes
    TestAndWrite,
}

/// Command list for recording rendering commands
///
/// Recorded commands reach the GPU via `GraphicsDevice::submit()`.
pub trait CommandList {
    /// Bind a frame buffer; `None` selects the device's presentation target
    fn set_frame_buffer(&mut self, frame_buffer: Option<&Arc<dyn FrameBuffer>>) -> Result<()>;

    fn set_viewport(&mut self, viewport: Rect2D) -> Result<()>;

    /// Clear the bound frame buffer attachments
    fn clear(&mut self, values: &[ClearValue]) -> Result<()>;

    fn set_blend_mode(&mut self, mode: BlendMode) -> Result<()>;

    fn set_depth_mode(&mut self, mode: DepthMode) -> Result<()>;

    fn bind_program(&mut self, program: &Arc<dyn Program>) -> Result<()>;

    fn bind_texture(&mut self, slot: u32, texture: &Arc<dyn Texture>) -> Result<()>;

    fn bind_buffer(&mut self, slot: u32, buffer: &Arc<dyn Buffer>) -> Result<()>;

    /// Small per-draw constant block (see the `#[repr(C)]` structs in the stages)
    fn push_constants(&mut self, data: &[u8]) -> Result<()>;

    /// Draw non-indexed vertices
    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()>;

    /// Draw non-indexed vertices for several instances
    fn draw_instanced(&mut self, vertex_count: u32, first_vertex: u32, instance_count: u32) -> Result<()>;

    /// Draw indexed vertices for several instances
    ///
    /// `first_instance` is added to the instance index seen by the shader.
    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        first_index: u32,
        instance_count: u32,
        first_instance: u32,
    ) -> Result<()>;

    /// Dispatch compute work groups
    fn dispatch(&mut self, groups_x: u32, groups_y: u32, groups_z: u32) -> Result<()>;

    /// Open a named GPU timer scope
    fn begin_timer(&mut self, name: &str) -> Result<()>;

    /// Close the innermost GPU timer scope
    fn end_timer(&mut self) -> Result<()>;
}
