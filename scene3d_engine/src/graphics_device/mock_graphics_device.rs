/// Mock graphics device for unit tests (no GPU required)
///
/// Records every created resource and every recorded command in shared
/// logs so tests can assert on allocation and draw behaviour.

use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::engine_bail;
use super::{
    Buffer, BufferDesc, CommandList, FrameBuffer, FrameBufferDesc, GraphicsDevice,
    GpuTimerResult, Program, ProgramDesc, Texture, TextureDesc, TextureInfo,
    Rect2D, ClearValue, BlendMode, DepthMode,
};

// ============================================================================
// Mock Texture
// ============================================================================

#[derive(Debug)]
pub struct MockTexture {
    pub info: TextureInfo,
    pub name: String,
}

impl Texture for MockTexture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }

    fn update(&self, layer: u32, data: &[u8]) -> Result<()> {
        if layer >= self.info.array_layers {
            engine_bail!("scene3d::mock", "texture '{}': layer {} out of range", self.name, layer);
        }
        let expected = self.info.width as usize
            * self.info.height as usize
            * self.info.format.bytes_per_texel() as usize;
        if data.len() > expected {
            engine_bail!("scene3d::mock",
                "texture '{}': {} bytes exceed layer size {}", self.name, data.len(), expected);
        }
        Ok(())
    }
}

// ============================================================================
// Mock Buffer
// ============================================================================

#[derive(Debug)]
pub struct MockBuffer {
    pub size: u64,
    pub name: String,
    pub bytes_written: Arc<Mutex<u64>>,
}

impl Buffer for MockBuffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        if offset + data.len() as u64 > self.size {
            engine_bail!("scene3d::mock",
                "buffer '{}': write of {} bytes at {} exceeds size {}",
                self.name, data.len(), offset, self.size);
        }
        *self.bytes_written.lock().unwrap() += data.len() as u64;
        Ok(())
    }
}

// ============================================================================
// Mock Program / FrameBuffer
// ============================================================================

#[derive(Debug)]
pub struct MockProgram {
    pub name: String,
}

impl Program for MockProgram {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug)]
pub struct MockFrameBuffer {
    pub width: u32,
    pub height: u32,
}

impl FrameBuffer for MockFrameBuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

// ============================================================================
// Mock CommandList
// ============================================================================

/// Appends a line per command to the owning device's shared log
pub struct MockCommandList {
    log: Arc<Mutex<Vec<String>>>,
}

impl MockCommandList {
    fn record(&mut self, command: String) -> Result<()> {
        self.log.lock().unwrap().push(command);
        Ok(())
    }
}

impl CommandList for MockCommandList {
    fn set_frame_buffer(&mut self, frame_buffer: Option<&Arc<dyn FrameBuffer>>) -> Result<()> {
        match frame_buffer {
            Some(fb) => self.record(format!("set_frame_buffer {}x{}", fb.width(), fb.height())),
            None => self.record("set_frame_buffer default".to_string()),
        }
    }

    fn set_viewport(&mut self, viewport: Rect2D) -> Result<()> {
        self.record(format!("set_viewport {}x{}", viewport.width, viewport.height))
    }

    fn clear(&mut self, values: &[ClearValue]) -> Result<()> {
        self.record(format!("clear {}", values.len()))
    }

    fn set_blend_mode(&mut self, mode: BlendMode) -> Result<()> {
        self.record(format!("set_blend_mode {:?}", mode))
    }

    fn set_depth_mode(&mut self, mode: DepthMode) -> Result<()> {
        self.record(format!("set_depth_mode {:?}", mode))
    }

    fn bind_program(&mut self, program: &Arc<dyn Program>) -> Result<()> {
        self.record(format!("bind_program {}", program.name()))
    }

    fn bind_texture(&mut self, slot: u32, _texture: &Arc<dyn Texture>) -> Result<()> {
        self.record(format!("bind_texture {}", slot))
    }

    fn bind_buffer(&mut self, slot: u32, _buffer: &Arc<dyn Buffer>) -> Result<()> {
        self.record(format!("bind_buffer {}", slot))
    }

    fn push_constants(&mut self, data: &[u8]) -> Result<()> {
        self.record(format!("push_constants {}", data.len()))
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()> {
        self.record(format!("draw {} {}", vertex_count, first_vertex))
    }

    fn draw_instanced(&mut self, vertex_count: u32, first_vertex: u32, instance_count: u32) -> Result<()> {
        self.record(format!("draw_instanced {} {} {}", vertex_count, first_vertex, instance_count))
    }

    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        first_index: u32,
        instance_count: u32,
        first_instance: u32,
    ) -> Result<()> {
        self.record(format!(
            "draw_indexed_instanced {} {} {} {}",
            index_count, first_index, instance_count, first_instance
        ))
    }

    fn dispatch(&mut self, groups_x: u32, groups_y: u32, groups_z: u32) -> Result<()> {
        self.record(format!("dispatch {} {} {}", groups_x, groups_y, groups_z))
    }

    fn begin_timer(&mut self, name: &str) -> Result<()> {
        self.record(format!("begin_timer {}", name))
    }

    fn end_timer(&mut self) -> Result<()> {
        self.record("end_timer".to_string())
    }
}

// ============================================================================
// Mock GraphicsDevice
// ============================================================================

/// Mock device that tracks created resources and recorded commands
pub struct MockGraphicsDevice {
    pub created_textures: Arc<Mutex<Vec<String>>>,
    pub created_buffers: Arc<Mutex<Vec<String>>>,
    pub created_programs: Arc<Mutex<Vec<String>>>,
    pub created_frame_buffers: Arc<Mutex<Vec<String>>>,
    pub commands: Arc<Mutex<Vec<String>>>,
    pub submit_count: usize,
    /// Makes every texture allocation fail with OutOfMemory
    pub fail_texture_allocation: bool,
    /// Returned (once) by the next `check_error()`
    pub pending_error: Option<Error>,
    timers_open: Vec<String>,
    timers_closed: Vec<String>,
    scanned_commands: usize,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self {
            created_textures: Arc::new(Mutex::new(Vec::new())),
            created_buffers: Arc::new(Mutex::new(Vec::new())),
            created_programs: Arc::new(Mutex::new(Vec::new())),
            created_frame_buffers: Arc::new(Mutex::new(Vec::new())),
            commands: Arc::new(Mutex::new(Vec::new())),
            submit_count: 0,
            fail_texture_allocation: false,
            pending_error: None,
            timers_open: Vec::new(),
            timers_closed: Vec::new(),
            scanned_commands: 0,
        }
    }

    pub fn get_created_textures(&self) -> Vec<String> {
        self.created_textures.lock().unwrap().clone()
    }

    pub fn get_created_buffers(&self) -> Vec<String> {
        self.created_buffers.lock().unwrap().clone()
    }

    pub fn get_created_programs(&self) -> Vec<String> {
        self.created_programs.lock().unwrap().clone()
    }

    pub fn get_commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Recorded commands starting with `prefix`
    pub fn count_commands(&self, prefix: &str) -> usize {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Number of textures created under `name`
    pub fn count_textures(&self, name: &str) -> usize {
        self.created_textures
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.as_str() == name)
            .count()
    }

    pub fn clear_logs(&mut self) {
        self.created_textures.lock().unwrap().clear();
        self.created_buffers.lock().unwrap().clear();
        self.created_programs.lock().unwrap().clear();
        self.created_frame_buffers.lock().unwrap().clear();
        self.commands.lock().unwrap().clear();
        self.scanned_commands = 0;
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn create_texture(&mut self, desc: TextureDesc) -> Result<Arc<dyn Texture>> {
        if self.fail_texture_allocation {
            return Err(Error::OutOfMemory);
        }
        if desc.width == 0 || desc.height == 0 || desc.array_layers == 0 {
            engine_bail!(InvalidResource, "scene3d::mock",
                "texture '{}' has zero extent {}x{}x{}",
                desc.name, desc.width, desc.height, desc.array_layers);
        }
        self.created_textures.lock().unwrap().push(desc.name.clone());
        Ok(Arc::new(MockTexture {
            info: TextureInfo {
                width: desc.width,
                height: desc.height,
                array_layers: desc.array_layers,
                format: desc.format,
                usage: desc.usage,
            },
            name: desc.name,
        }))
    }

    fn create_buffer(&mut self, desc: BufferDesc) -> Result<Arc<dyn Buffer>> {
        self.created_buffers.lock().unwrap().push(desc.name.clone());
        Ok(Arc::new(MockBuffer {
            size: desc.size,
            name: desc.name,
            bytes_written: Arc::new(Mutex::new(0)),
        }))
    }

    fn create_program(&mut self, desc: ProgramDesc) -> Result<Arc<dyn Program>> {
        self.created_programs.lock().unwrap().push(desc.name.clone());
        Ok(Arc::new(MockProgram { name: desc.name }))
    }

    fn create_frame_buffer(&mut self, desc: FrameBufferDesc) -> Result<Arc<dyn FrameBuffer>> {
        let first = desc
            .color_attachments
            .first()
            .or(desc.depth_attachment.as_ref());
        let (width, height) = match first {
            Some(attachment) => (attachment.texture.info().width, attachment.texture.info().height),
            None => engine_bail!(InvalidResource, "scene3d::mock", "frame buffer without attachments"),
        };
        self.created_frame_buffers
            .lock()
            .unwrap()
            .push(format!("frame_buffer_{}x{}", width, height));
        Ok(Arc::new(MockFrameBuffer { width, height }))
    }

    fn create_command_list(&mut self) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(MockCommandList { log: self.commands.clone() }))
    }

    fn submit(&mut self, _commands: Box<dyn CommandList>) -> Result<()> {
        self.submit_count += 1;
        let log = self.commands.lock().unwrap();
        for command in log.iter().skip(self.scanned_commands) {
            if let Some(name) = command.strip_prefix("begin_timer ") {
                self.timers_open.push(name.to_string());
            } else if command == "end_timer" {
                if let Some(name) = self.timers_open.pop() {
                    self.timers_closed.push(name);
                }
            }
        }
        self.scanned_commands = log.len();
        Ok(())
    }

    fn timer_results(&mut self) -> Vec<GpuTimerResult> {
        self.timers_closed
            .drain(..)
            .map(|name| GpuTimerResult { name, time_ms: 0.25 })
            .collect()
    }

    fn check_error(&mut self) -> Result<()> {
        match self.pending_error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
