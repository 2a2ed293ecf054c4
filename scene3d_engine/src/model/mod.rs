/// Models: imported data, GPU meshes, instance consolidation and caches

pub mod timeline;
pub mod model_data;
pub mod model;
pub mod model_cache;
pub mod material_cache;
pub mod instances_buffer;
pub mod scene_cache;

use slotmap::new_key_type;

new_key_type! {
    /// Key of a loaded model in the scene's `ModelCache`
    pub struct ModelKey;
}

pub use timeline::{Interpolate, Timeline, Track};
pub use model_data::*;
pub use model::{AnimationState, MeshDraw, Model, ModelDrawConstants, ModelInstance, ModelMeshVisitor, BASE_VECTORS_PER_INSTANCE, VECTORS_PER_BONE, VECTORS_PER_MATERIAL};
pub use model_cache::ModelCache;
pub use material_cache::MaterialCache;
pub use instances_buffer::{InstancesBuffer, InstancesLock};
pub use scene_cache::{CachedTexture, SceneCache};

// In-memory scene cache and model builders for tests
#[cfg(test)]
pub mod test_scene_cache;
