/// Frame buffer trait - groups render target attachments
///
/// Created once and reused every frame. Recreated only when an attached
/// texture is reallocated.

use std::sync::Arc;
use super::Texture;

/// Frame buffer: a set of color attachments plus an optional depth attachment
pub trait FrameBuffer: Send + Sync {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

/// One attached texture layer
#[derive(Clone)]
pub struct Attachment {
    pub texture: Arc<dyn Texture>,
    pub layer: u32,
}

impl Attachment {
    pub fn new(texture: &Arc<dyn Texture>) -> Self {
        Self { texture: texture.clone(), layer: 0 }
    }

    pub fn layer(texture: &Arc<dyn Texture>, layer: u32) -> Self {
        Self { texture: texture.clone(), layer }
    }
}

/// Descriptor for creating a frame buffer
#[derive(Clone, Default)]
pub struct FrameBufferDesc {
    pub color_attachments: Vec<Attachment>,
    pub depth_attachment: Option<Attachment>,
}
