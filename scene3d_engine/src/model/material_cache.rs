/// Textures referenced by model materials, with frame animation

use std::sync::Arc;
use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::engine_debug;
use crate::graphics_device::{GraphicsDevice, Texture};
use super::{CachedTexture, SceneCache};

struct MaterialTexture {
    texture: CachedTexture,
    frame: usize,
    elapsed: f32,
}

/// Texture cache shared by every model in a scene
///
/// Each texture is loaded once through the `SceneCache`. Animated textures
/// advance one frame every `frame_duration` seconds in `update()`.
#[derive(Default)]
pub struct MaterialCache {
    textures: FxHashMap<String, MaterialTexture>,
}

impl MaterialCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `name` unless it is already cached
    pub fn get_or_load(
        &mut self,
        device: &mut dyn GraphicsDevice,
        cache: &mut dyn SceneCache,
        name: &str,
        linear: bool,
    ) -> Result<()> {
        if self.textures.contains_key(name) {
            return Ok(());
        }
        let texture = cache.texture(device, name, linear)?;
        engine_debug!("scene3d::MaterialCache", "Loaded texture '{}' ({} frames)", name, texture.frames.len());
        self.textures.insert(name.to_string(), MaterialTexture { texture, frame: 0, elapsed: 0.0 });
        Ok(())
    }

    /// Current frame of a cached texture
    pub fn texture(&self, name: &str) -> Option<Arc<dyn Texture>> {
        let entry = self.textures.get(name)?;
        entry.texture.frames.get(entry.frame).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.textures.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Advance animated textures by `dt` seconds
    pub fn update(&mut self, dt: f32) {
        for entry in self.textures.values_mut() {
            if !entry.texture.is_animated() {
                continue;
            }
            entry.elapsed += dt;
            let duration = entry.texture.frame_duration;
            let steps = (entry.elapsed / duration) as usize;
            if steps > 0 {
                entry.elapsed -= steps as f32 * duration;
                entry.frame = (entry.frame + steps) % entry.texture.frames.len();
            }
        }
    }

    pub fn clear(&mut self) {
        self.textures.clear();
    }
}
