/// In-memory `SceneCache` for unit tests (no importer, no files)

use std::sync::Arc;
use glam::Vec3;
use rustc_hash::FxHashMap;

use crate::culling::AABB;
use crate::error::Result;
use crate::engine_bail;
use crate::graphics_device::{GraphicsDevice, TextureDesc, TextureFormat, TextureUsage};
use super::{
    CachedTexture, ModelData, ModelDataDrawRange, ModelDataLod, ModelDataMaterial,
    ModelDataMesh, ModelVertex, SceneCache,
};

pub struct TestSceneCache {
    pub models: FxHashMap<String, Arc<ModelData>>,
    pub texture_loads: usize,
    pub model_loads: usize,
    /// Frames per loaded texture (0 or 1 = static)
    pub animated_frames: usize,
}

impl TestSceneCache {
    pub fn new() -> Self {
        Self {
            models: FxHashMap::default(),
            texture_loads: 0,
            model_loads: 0,
            animated_frames: 0,
        }
    }

    pub fn with_model(mut self, data: ModelData) -> Self {
        self.models.insert(data.name.clone(), Arc::new(data));
        self
    }
}

impl SceneCache for TestSceneCache {
    fn model_data(&mut self, name: &str) -> Result<Arc<ModelData>> {
        self.model_loads += 1;
        match self.models.get(name) {
            Some(data) => Ok(data.clone()),
            None => engine_bail!(InvalidResource, "scene3d::TestSceneCache", "unknown model '{}'", name),
        }
    }

    fn texture(
        &mut self,
        device: &mut dyn GraphicsDevice,
        name: &str,
        linear: bool,
    ) -> Result<CachedTexture> {
        self.texture_loads += 1;
        let format = if linear { TextureFormat::R8G8B8A8_UNORM } else { TextureFormat::R8G8B8A8_SRGB };
        let mut frames = Vec::new();
        for _ in 0..self.animated_frames.max(1) {
            frames.push(device.create_texture(TextureDesc {
                name: name.to_string(),
                width: 4,
                height: 4,
                array_layers: 1,
                format,
                usage: TextureUsage::SAMPLED,
                data: None,
            })?);
        }
        Ok(CachedTexture { frames, frame_duration: 0.1 })
    }
}

/// Unit cube split into `ranges` material ranges, repeated for every mesh
/// and LOD. LOD `i` is used up to `10 * (i + 1)` from the eye.
pub fn cube_model(name: &str, lods: usize, meshes: usize, ranges: usize) -> ModelData {
    let corners = [
        Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, -1.0, -1.0),
        Vec3::new(1.0, 1.0, -1.0), Vec3::new(-1.0, 1.0, -1.0),
        Vec3::new(-1.0, -1.0, 1.0), Vec3::new(1.0, -1.0, 1.0),
        Vec3::new(1.0, 1.0, 1.0), Vec3::new(-1.0, 1.0, 1.0),
    ];
    let vertices: Vec<ModelVertex> = corners
        .iter()
        .map(|&c| ModelVertex::new(c, c.normalize(), [0.0, 0.0]))
        .collect();
    let indices: Vec<u32> = vec![
        0, 1, 2, 0, 2, 3, 4, 6, 5, 4, 7, 6,
        0, 4, 5, 0, 5, 1, 3, 2, 6, 3, 6, 7,
        0, 3, 7, 0, 7, 4, 1, 5, 6, 1, 6, 2,
    ];

    let ranges = ranges.max(1);
    let triangles_per_range = 12 / ranges as u32;
    let draw_ranges = (0..ranges)
        .map(|i| ModelDataDrawRange {
            material: i,
            start_index: i as u32 * triangles_per_range * 3,
            index_count: triangles_per_range * 3,
        })
        .collect();
    let mesh = ModelDataMesh { vertices, indices, draw_ranges };

    ModelData {
        name: name.to_string(),
        aabb: AABB::new(Vec3::splat(-1.0), Vec3::splat(1.0)),
        lods: (0..lods)
            .map(|i| ModelDataLod {
                max_distance: 10.0 * (i + 1) as f32,
                meshes: vec![mesh.clone(); meshes],
            })
            .collect(),
        materials: (0..ranges)
            .map(|i| ModelDataMaterial { name: format!("material{}", i), ..Default::default() })
            .collect(),
        bones: Vec::new(),
        animations: Vec::new(),
        lights: Vec::new(),
    }
}
