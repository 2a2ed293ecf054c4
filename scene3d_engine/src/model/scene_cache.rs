/// Asset source supplied by the application
///
/// The scene never parses files. Model data and texture pixels come from
/// an external importer through this trait.

use std::sync::Arc;

use crate::error::Result;
use crate::graphics_device::{GraphicsDevice, Texture};
use super::ModelData;

/// A texture as loaded by the importer
///
/// Animated textures carry several frames; `frame_duration` is the time
/// each frame stays on screen. Static textures have a single frame.
#[derive(Clone)]
pub struct CachedTexture {
    pub frames: Vec<Arc<dyn Texture>>,
    pub frame_duration: f32,
}

impl CachedTexture {
    pub fn single(texture: Arc<dyn Texture>) -> Self {
        Self { frames: vec![texture], frame_duration: 0.0 }
    }

    pub fn is_animated(&self) -> bool {
        self.frames.len() > 1 && self.frame_duration > 0.0
    }
}

impl std::fmt::Debug for CachedTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedTexture")
            .field("frames", &self.frames.len())
            .field("frame_duration", &self.frame_duration)
            .finish()
    }
}

/// Importer interface
pub trait SceneCache {
    /// Parsed model data registered under `name`
    fn model_data(&mut self, name: &str) -> Result<Arc<ModelData>>;

    /// Load a texture by name; `linear` selects a non-sRGB format
    fn texture(
        &mut self,
        device: &mut dyn GraphicsDevice,
        name: &str,
        linear: bool,
    ) -> Result<CachedTexture>;
}
