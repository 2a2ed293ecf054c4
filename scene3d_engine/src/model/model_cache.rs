/// Models loaded by a scene, shared by every object using them

use slotmap::SlotMap;
use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::engine_info;
use crate::graphics_device::GraphicsDevice;
use super::{MaterialCache, Model, ModelKey, SceneCache};

#[derive(Default)]
pub struct ModelCache {
    models: SlotMap<ModelKey, Model>,
    by_name: FxHashMap<String, ModelKey>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key of the model called `name`, loading and uploading it on first use
    pub fn get_or_load(
        &mut self,
        device: &mut dyn GraphicsDevice,
        cache: &mut dyn SceneCache,
        materials: &mut MaterialCache,
        name: &str,
    ) -> Result<ModelKey> {
        if let Some(&key) = self.by_name.get(name) {
            return Ok(key);
        }

        let data = cache.model_data(name)?;
        let mut model = Model::new(device, data, materials, cache)?;
        let key = self.models.insert_with_key(|key| {
            model.set_key(key);
            model
        });
        self.by_name.insert(name.to_string(), key);
        engine_info!("scene3d::ModelCache", "Loaded model '{}'", name);
        Ok(key)
    }

    pub fn get(&self, key: ModelKey) -> Option<&Model> {
        self.models.get(key)
    }

    pub fn get_mut(&mut self, key: ModelKey) -> Option<&mut Model> {
        self.models.get_mut(key)
    }

    pub fn find(&self, name: &str) -> Option<ModelKey> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModelKey, &Model)> {
        self.models.iter()
    }
}
