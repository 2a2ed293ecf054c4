/// Scene world: entity arenas, the spatial index and visitation
///
/// Stages never touch entities directly. They visit the world through a
/// frustum: `visit` consolidates visible objects into one instanced draw
/// per model mesh range, while `visit_lights`, `visit_emitters` and
/// `visit_light_probes` hand out one entity at a time.
///
/// Visits are bracketed by `begin_visit` / `end_visit`, which stamp a new
/// epoch. Index queries are cached per render frame so several visits
/// through the same frustum cull once.

use std::sync::Arc;
use glam::{Mat4, Vec3};
use slotmap::SlotMap;

use crate::camera::Camera;
use crate::config::SceneConfig;
use crate::culling::{Cullable, Frustum, OctreeSceneIndex, SceneIndex};
use crate::error::Result;
use crate::graphics_device::{CommandList, GraphicsDevice, Rect2D};
use crate::model::{
    InstancesBuffer, MaterialCache, ModelCache, ModelData, ModelInstance, ModelKey,
    ModelMeshVisitor,
};
use super::{
    EmitterKey, EmitterMut, LightKey, LightMut, ObjectKey, ObjectMut, ProbeKey, ProbeMut,
    SceneLight, SceneLightProbe, SceneObject, SceneParticleEmitter,
};

// ===== FRAME CONTEXT =====

/// Device and command list of the frame being recorded
pub struct FrameContext<'a> {
    pub device: &'a mut dyn GraphicsDevice,
    pub commands: &'a mut dyn CommandList,
}

/// Matrices of one point of view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewParams {
    pub world_to_eye: Mat4,
    pub eye_to_projection: Mat4,
    pub frustum: Frustum,
    /// Eye position in world space
    pub eye: Vec3,
}

impl ViewParams {
    pub fn new(world_to_eye: Mat4, eye_to_projection: Mat4) -> Self {
        Self {
            world_to_eye,
            eye_to_projection,
            frustum: Frustum::from_view_projection(&(eye_to_projection * world_to_eye)),
            eye: world_to_eye.inverse().transform_point3(Vec3::ZERO),
        }
    }

    pub fn world_to_projection(&self) -> Mat4 {
        self.eye_to_projection * self.world_to_eye
    }
}

/// Counters of the last `render()`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneStats {
    /// Distinct objects drawn
    pub objects_drawn: u32,
    /// Distinct models drawn
    pub models_drawn: u32,
    pub draw_calls: u32,
    pub triangles: u64,
    /// Completed visits, all kinds
    pub visits: u32,
}

// ===== SCENE WORLD =====

pub struct SceneWorld {
    pub(crate) config: SceneConfig,
    pub(crate) index: Box<dyn SceneIndex>,
    pub(crate) objects: SlotMap<ObjectKey, SceneObject>,
    pub(crate) lights: SlotMap<LightKey, SceneLight>,
    pub(crate) emitters: SlotMap<EmitterKey, SceneParticleEmitter>,
    pub(crate) probes: SlotMap<ProbeKey, SceneLightProbe>,
    pub(crate) models: ModelCache,
    pub(crate) materials: MaterialCache,
    pub(crate) instances: InstancesBuffer,
    pub(crate) camera: Camera,
    pub(crate) viewport: Rect2D,
    render_frame: u64,
    visit_epoch: u64,
    in_visit: bool,
    stats: SceneStats,
    query_cache: Vec<(Frustum, Vec<Cullable>)>,
    draw_list: Vec<ModelKey>,
}

impl SceneWorld {
    pub fn new(config: SceneConfig) -> Self {
        let index = OctreeSceneIndex::new(config.world_bounds, config.octree_depth);
        Self {
            camera: Camera { field_of_view: config.field_of_view, ..Camera::default() },
            viewport: config.viewport,
            config,
            index: Box::new(index),
            objects: SlotMap::with_key(),
            lights: SlotMap::with_key(),
            emitters: SlotMap::with_key(),
            probes: SlotMap::with_key(),
            models: ModelCache::new(),
            materials: MaterialCache::new(),
            instances: InstancesBuffer::new(),
            render_frame: 0,
            visit_epoch: 0,
            in_visit: false,
            stats: SceneStats::default(),
            query_cache: Vec::new(),
            draw_list: Vec::new(),
        }
    }

    // ===== ACCESSORS =====

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn viewport(&self) -> Rect2D {
        self.viewport
    }

    pub fn stats(&self) -> &SceneStats {
        &self.stats
    }

    pub fn render_frame(&self) -> u64 {
        self.render_frame
    }

    pub fn visit_epoch(&self) -> u64 {
        self.visit_epoch
    }

    pub fn index(&self) -> &dyn SceneIndex {
        self.index.as_ref()
    }

    pub fn models(&self) -> &ModelCache {
        &self.models
    }

    pub fn materials(&self) -> &MaterialCache {
        &self.materials
    }

    pub fn instances(&self) -> &InstancesBuffer {
        &self.instances
    }

    /// Distinct frusta culled this render frame
    pub fn cached_queries(&self) -> usize {
        self.query_cache.len()
    }

    pub fn object(&self, key: ObjectKey) -> Option<&SceneObject> {
        self.objects.get(key)
    }

    pub fn light(&self, key: LightKey) -> Option<&SceneLight> {
        self.lights.get(key)
    }

    pub fn emitter(&self, key: EmitterKey) -> Option<&SceneParticleEmitter> {
        self.emitters.get(key)
    }

    pub fn probe(&self, key: ProbeKey) -> Option<&SceneLightProbe> {
        self.probes.get(key)
    }

    pub fn object_mut(&mut self, key: ObjectKey) -> Option<ObjectMut<'_>> {
        if !self.objects.contains_key(key) {
            return None;
        }
        Some(ObjectMut { world: self, key })
    }

    pub fn light_mut(&mut self, key: LightKey) -> Option<LightMut<'_>> {
        if !self.lights.contains_key(key) {
            return None;
        }
        Some(LightMut { world: self, key })
    }

    pub fn emitter_mut(&mut self, key: EmitterKey) -> Option<EmitterMut<'_>> {
        if !self.emitters.contains_key(key) {
            return None;
        }
        Some(EmitterMut { world: self, key })
    }

    pub fn probe_mut(&mut self, key: ProbeKey) -> Option<ProbeMut<'_>> {
        if !self.probes.contains_key(key) {
            return None;
        }
        Some(ProbeMut { world: self, key })
    }

    pub(crate) fn emitter_entry_mut(&mut self, key: EmitterKey) -> Option<&mut SceneParticleEmitter> {
        self.emitters.get_mut(key)
    }

    // ===== CAMERA =====

    /// Camera point of view with the configured near plane and `far`
    pub fn camera_view(&self, far: f32) -> ViewParams {
        let projection = self.camera.eye_to_projection(self.viewport.aspect(), self.config.near_plane, far);
        ViewParams::new(self.camera.world_to_eye(), projection)
    }

    // ===== FRAME & VISIT EPOCHS =====

    pub(crate) fn reset_stats(&mut self) {
        self.stats = SceneStats::default();
    }

    /// Start a render frame: instance regions and cached queries expire
    pub fn begin_frame(&mut self) {
        self.render_frame += 1;
        self.instances.begin_frame();
        self.query_cache.clear();
    }

    /// Open a visit and return its epoch
    pub fn begin_visit(&mut self) -> u64 {
        debug_assert!(!self.in_visit, "visits cannot nest");
        self.in_visit = true;
        self.visit_epoch += 1;
        self.visit_epoch
    }

    pub fn end_visit(&mut self) {
        debug_assert!(self.in_visit, "end_visit without begin_visit");
        self.in_visit = false;
        self.stats.visits += 1;
    }

    /// Slot of `frustum` in the query cache, querying the index on a miss
    fn cull(&mut self, frustum: &Frustum) -> usize {
        if let Some(slot) = self.query_cache.iter().position(|(cached, _)| cached == frustum) {
            return slot;
        }
        let mut results = Vec::new();
        self.index.query(frustum, &mut results);
        self.query_cache.push((*frustum, results));
        self.query_cache.len() - 1
    }

    fn visible(&mut self, frustum: &Frustum) -> Vec<Cullable> {
        let slot = self.cull(frustum);
        self.query_cache[slot].1.clone()
    }

    // ===== VISITS =====

    /// Draw every visible object through `visitor`, one instanced draw per
    /// (model, LOD, mesh, material range)
    pub fn visit(
        &mut self,
        ctx: &mut FrameContext,
        view: &ViewParams,
        visitor: &mut dyn ModelMeshVisitor,
    ) -> Result<()> {
        let epoch = self.begin_visit();
        let result = self.visit_models(ctx, view, visitor, epoch);
        self.end_visit();
        result
    }

    fn visit_models(
        &mut self,
        ctx: &mut FrameContext,
        view: &ViewParams,
        visitor: &mut dyn ModelMeshVisitor,
        epoch: u64,
    ) -> Result<()> {
        let frame = self.render_frame;
        let slot = self.cull(&view.frustum);

        // Group instances by model
        self.draw_list.clear();
        for proxy in &self.query_cache[slot].1 {
            let Cullable::Object(key) = *proxy else { continue };
            let Some(object) = self.objects.get_mut(key) else { continue };
            let Some(model) = self.models.get_mut(object.model) else { continue };

            let instance = ModelInstance::new(key, object.object_to_world(), object.animation);
            let distance = object.position.distance(view.eye);
            if model.register_instance(epoch, instance, distance) {
                self.draw_list.push(object.model);
            }
            if object.drawn_frame != Some(frame) {
                object.drawn_frame = Some(frame);
                self.stats.objects_drawn += 1;
            }
        }
        if self.draw_list.is_empty() {
            return Ok(());
        }

        // One region per model
        self.instances.clear();
        for &model_key in &self.draw_list {
            let Some(model) = self.models.get_mut(model_key) else { continue };
            model.prepare();
            let offset = self.instances.add(model.instances().len() * model.vectors_per_instance());
            model.set_vectors_offset(offset);
        }

        let mut lock = self.instances.lock();
        for &model_key in &self.draw_list {
            let Some(model) = self.models.get(model_key) else { continue };
            let len = model.instances().len() * model.vectors_per_instance();
            model.upload(
                lock.region_mut(model.vectors_offset(), len),
                &view.world_to_eye,
                &view.eye_to_projection,
            );
        }
        lock.unlock(&mut *ctx.device)?;

        let instance_buffer = self.instances.buffer();
        for &model_key in &self.draw_list {
            let Some(model) = self.models.get_mut(model_key) else { continue };
            if model.mark_drawn(frame) {
                self.stats.models_drawn += 1;
            }
            let stats = &mut self.stats;
            let commands = &mut *ctx.commands;
            model.for_each_draw(&self.materials, instance_buffer, |draw| {
                if visitor.render(&mut *commands, draw)? {
                    stats.draw_calls += 1;
                    stats.triangles += draw.triangle_count();
                }
                Ok(())
            })?;
        }
        Ok(())
    }

    /// Call `f` for every light whose range intersects `frustum`
    pub fn visit_lights<F>(&mut self, frustum: &Frustum, mut f: F) -> Result<()>
    where
        F: FnMut(LightKey, &SceneLight) -> Result<()>,
    {
        self.begin_visit();
        let visible = self.visible(frustum);
        let result = visible.iter().try_for_each(|proxy| match *proxy {
            Cullable::Light(key) => match self.lights.get(key) {
                Some(light) => f(key, light),
                None => Ok(()),
            },
            _ => Ok(()),
        });
        self.end_visit();
        result
    }

    /// Call `f` for every emitter whose particles can reach `frustum`
    pub fn visit_emitters<F>(&mut self, frustum: &Frustum, mut f: F) -> Result<()>
    where
        F: FnMut(EmitterKey, &SceneParticleEmitter) -> Result<()>,
    {
        self.begin_visit();
        let visible = self.visible(frustum);
        let result = visible.iter().try_for_each(|proxy| match *proxy {
            Cullable::Emitter(key) => match self.emitters.get(key) {
                Some(emitter) => f(key, emitter),
                None => Ok(()),
            },
            _ => Ok(()),
        });
        self.end_visit();
        result
    }

    /// Call `f` for every light probe intersecting `frustum`
    pub fn visit_light_probes<F>(&mut self, frustum: &Frustum, mut f: F) -> Result<()>
    where
        F: FnMut(ProbeKey, &SceneLightProbe) -> Result<()>,
    {
        self.begin_visit();
        let visible = self.visible(frustum);
        let result = visible.iter().try_for_each(|proxy| match *proxy {
            Cullable::Probe(key) => match self.probes.get(key) {
                Some(probe) => f(key, probe),
                None => Ok(()),
            },
            _ => Ok(()),
        });
        self.end_visit();
        result
    }

    // ===== ENTITIES =====

    pub(crate) fn insert_object(&mut self, object: SceneObject) -> ObjectKey {
        let aabb = object.aabb();
        let data = object.data.clone();
        let key = self.objects.insert(object);
        let handle = self.index.insert(Cullable::Object(key), &aabb);

        let mut lights = Vec::with_capacity(data.lights.len());
        for (index, model_light) in data.lights.iter().enumerate() {
            let light = SceneLight {
                kind: model_light.kind,
                rectangle_shape: model_light.rectangle_shape,
                casts_shadows: model_light.casts_shadows,
                owner: Some((key, index)),
                ..SceneLight::omni(Vec3::ZERO, Vec3::ONE, 0.0)
            };
            lights.push(self.insert_light(light));
        }

        if let Some(object) = self.objects.get_mut(key) {
            object.cull = handle;
            object.lights = lights;
        }
        self.sync_object_lights(key);
        self.query_cache.clear();
        key
    }

    pub(crate) fn insert_light(&mut self, light: SceneLight) -> LightKey {
        let aabb = light.aabb();
        let key = self.lights.insert(light);
        let handle = self.index.insert(Cullable::Light(key), &aabb);
        if let Some(light) = self.lights.get_mut(key) {
            light.cull = handle;
        }
        self.query_cache.clear();
        key
    }

    pub(crate) fn insert_emitter(&mut self, emitter: SceneParticleEmitter) -> EmitterKey {
        let aabb = emitter.aabb();
        let key = self.emitters.insert(emitter);
        let handle = self.index.insert(Cullable::Emitter(key), &aabb);
        if let Some(emitter) = self.emitters.get_mut(key) {
            emitter.cull = handle;
        }
        self.query_cache.clear();
        key
    }

    pub(crate) fn insert_probe(&mut self, probe: SceneLightProbe) -> ProbeKey {
        let aabb = probe.aabb();
        let key = self.probes.insert(probe);
        let handle = self.index.insert(Cullable::Probe(key), &aabb);
        if let Some(probe) = self.probes.get_mut(key) {
            probe.cull = handle;
        }
        self.query_cache.clear();
        key
    }

    /// Remove an object, its index entry and its lights
    pub(crate) fn remove_object(&mut self, key: ObjectKey) -> bool {
        let Some(object) = self.objects.remove(key) else { return false };
        self.index.remove(object.cull);
        for light in object.lights {
            self.remove_light(light);
        }
        self.query_cache.clear();
        true
    }

    pub(crate) fn remove_light(&mut self, key: LightKey) -> bool {
        let Some(light) = self.lights.remove(key) else { return false };
        self.index.remove(light.cull);
        self.query_cache.clear();
        true
    }

    pub(crate) fn remove_emitter(&mut self, key: EmitterKey) -> bool {
        let Some(emitter) = self.emitters.remove(key) else { return false };
        self.index.remove(emitter.cull);
        self.query_cache.clear();
        true
    }

    pub(crate) fn remove_probe(&mut self, key: ProbeKey) -> bool {
        let Some(probe) = self.probes.remove(key) else { return false };
        self.index.remove(probe.cull);
        self.query_cache.clear();
        true
    }

    // ===== RE-INDEXING =====

    pub(crate) fn reindex_object(&mut self, key: ObjectKey) {
        let Some(object) = self.objects.get(key) else { return };
        self.index.move_proxy(object.cull, &object.aabb());
        self.sync_object_lights(key);
        self.query_cache.clear();
    }

    pub(crate) fn reindex_light(&mut self, key: LightKey) {
        let Some(light) = self.lights.get(key) else { return };
        self.index.move_proxy(light.cull, &light.aabb());
        self.query_cache.clear();
    }

    pub(crate) fn reindex_emitter(&mut self, key: EmitterKey) {
        let Some(emitter) = self.emitters.get(key) else { return };
        self.index.move_proxy(emitter.cull, &emitter.aabb());
        self.query_cache.clear();
    }

    pub(crate) fn reindex_probe(&mut self, key: ProbeKey) {
        let Some(probe) = self.probes.get(key) else { return };
        self.index.move_proxy(probe.cull, &probe.aabb());
        self.query_cache.clear();
    }

    /// Place an object's lights from its model's animated light tracks
    fn sync_object_lights(&mut self, key: ObjectKey) {
        let Some(object) = self.objects.get(key) else { return };
        if object.lights.is_empty() {
            return;
        }
        let data: Arc<ModelData> = object.data.clone();
        let light_keys = object.lights.clone();
        let object_to_world = object.object_to_world();
        let animation = object.animation.animation;
        let time = object.animation.time;
        let bones = if data.lights.iter().any(|l| l.bone.is_some()) {
            data.bone_transforms(animation, time)
        } else {
            Vec::new()
        };

        for (model_light, light_key) in data.lights.iter().zip(light_keys) {
            let local = Mat4::from_rotation_translation(
                model_light.orientation.sample(animation, time),
                model_light.position.sample(animation, time),
            );
            let bone = model_light.bone.and_then(|b| bones.get(b)).copied().unwrap_or(Mat4::IDENTITY);
            let (_, orientation, position) = (object_to_world * bone * local).to_scale_rotation_translation();

            if let Some(light) = self.lights.get_mut(light_key) {
                light.position = position;
                light.orientation = orientation;
                light.color = model_light.color.sample(animation, time);
                light.attenuation_start = model_light.attenuation_start.sample(animation, time);
                light.attenuation_end = model_light.attenuation_end.sample(animation, time);
                light.falloff = model_light.falloff.sample(animation, time);
                light.hotspot = model_light.hotspot.sample(animation, time);
                light.ambient_illumination = model_light.ambient_illumination.sample(animation, time);
            }
            self.reindex_light(light_key);
        }
    }
}

#[cfg(test)]
#[path = "scene_world_tests.rs"]
mod tests;
