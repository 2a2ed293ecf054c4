/// Graphics device module - the opaque GPU abstraction the renderer drives

pub mod graphics_device;
pub mod texture;
pub mod buffer;
pub mod program;
pub mod frame_buffer;
pub mod command_list;

pub use graphics_device::*;
pub use texture::*;
pub use buffer::*;
pub use program::*;
pub use frame_buffer::*;
pub use command_list::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
