/// GraphicsDevice trait - resource factory and submission interface

use std::sync::Arc;
use crate::error::Result;
use super::{
    Buffer, BufferDesc, CommandList, FrameBuffer, FrameBufferDesc,
    Program, ProgramDesc, Texture, TextureDesc,
};

/// GPU time measured for one timer scope of the last completed frame
#[derive(Debug, Clone, PartialEq)]
pub struct GpuTimerResult {
    pub name: String,
    pub time_ms: f32,
}

/// Graphics device
///
/// Central factory for GPU resources. Implemented by the platform backend;
/// the scene never sees API-specific types.
pub trait GraphicsDevice {
    fn create_texture(&mut self, desc: TextureDesc) -> Result<Arc<dyn Texture>>;

    fn create_buffer(&mut self, desc: BufferDesc) -> Result<Arc<dyn Buffer>>;

    /// Compile and link a program
    fn create_program(&mut self, desc: ProgramDesc) -> Result<Arc<dyn Program>>;

    fn create_frame_buffer(&mut self, desc: FrameBufferDesc) -> Result<Arc<dyn FrameBuffer>>;

    fn create_command_list(&mut self) -> Result<Box<dyn CommandList>>;

    /// Submit recorded commands for execution
    fn submit(&mut self, commands: Box<dyn CommandList>) -> Result<()>;

    /// Timer results of the most recent frame whose queries have resolved
    fn timer_results(&mut self) -> Vec<GpuTimerResult>;

    /// Report any asynchronous device error raised since the last check
    fn check_error(&mut self) -> Result<()>;
}
