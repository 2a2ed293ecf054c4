/// Scene: the composition root
///
/// Owns the world (entities, spatial index, model and material caches), the
/// scene cache that supplies imported data, and the render pipeline. The
/// application drives it once per frame:
///
/// ```ignore
/// scene.set_camera(position, orientation, 60.0);
/// scene.update(&mut device, dt)?;
/// scene.render(&mut device)?;
/// ```

use glam::{Mat4, Quat, Vec2, Vec3};

use crate::camera::Camera;
use crate::config::SceneConfig;
use crate::error::Result;
use crate::{engine_err, engine_info, engine_trace};
use crate::graphics_device::{GpuTimerResult, GraphicsDevice, Rect2D};
use crate::model::SceneCache;
use crate::pipeline::RenderPipeline;
use super::{
    EmitterKey, EmitterMut, FrameContext, LightKey, LightMut, ObjectKey, ObjectMut, ProbeKey,
    ProbeMut, SceneLight, SceneLightProbe, SceneObject, SceneParticleEmitter, SceneStats,
    SceneWorld,
};

pub struct Scene {
    world: SceneWorld,
    cache: Box<dyn SceneCache>,
    pipeline: RenderPipeline,
    timer_results: Vec<GpuTimerResult>,
}

impl Scene {
    /// Create a scene and build its render pipeline
    ///
    /// # Arguments
    ///
    /// * `device` - Device the pipeline creates its programs on
    /// * `cache` - Source of model data and textures
    /// * `config` - Validated before anything is created
    pub fn new(device: &mut dyn GraphicsDevice, cache: Box<dyn SceneCache>, config: SceneConfig) -> Result<Self> {
        config.validate()?;
        let pipeline = RenderPipeline::new(device, &config)?;
        engine_info!("scene3d::Scene", "Scene created ({}x{})", config.viewport.width, config.viewport.height);

        Ok(Self {
            world: SceneWorld::new(config),
            cache,
            pipeline,
            timer_results: Vec::new(),
        })
    }

    // ===== CAMERA & VIEWPORT =====

    /// Set the output rectangle; a zero-sized one skips rendering
    pub fn set_viewport(&mut self, viewport: Rect2D) {
        self.world.viewport = viewport;
    }

    pub fn viewport(&self) -> Rect2D {
        self.world.viewport
    }

    /// Place the camera (field of view in degrees)
    pub fn set_camera(&mut self, position: Vec3, orientation: Quat, field_of_view: f32) {
        self.world.camera = Camera::new(position, orientation.normalize(), field_of_view);
    }

    pub fn camera(&self) -> &Camera {
        &self.world.camera
    }

    pub fn world_to_eye(&self) -> Mat4 {
        self.world.camera.world_to_eye()
    }

    pub fn eye_to_projection(&self) -> Mat4 {
        let config = &self.world.config;
        self.world.camera.eye_to_projection(self.world.viewport.aspect(), config.near_plane, config.far_plane)
    }

    pub fn world_to_projection(&self) -> Mat4 {
        self.eye_to_projection() * self.world_to_eye()
    }

    /// Picking ray through a viewport pixel: (start, direction)
    pub fn unproject(&self, screen: Vec2) -> (Vec3, Vec3) {
        self.world.camera.unproject(self.world.viewport, screen)
    }

    // ===== FRAME =====

    /// Record and submit one frame
    ///
    /// Statistics and timer results are reset first. A degenerate viewport
    /// records nothing and does not start a render frame. Allocation
    /// failures propagate; the device error state is checked once after
    /// submission.
    pub fn render(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        self.world.reset_stats();
        self.timer_results.clear();

        let viewport = self.world.viewport;
        let camera = self.world.camera;
        self.pipeline.publish(viewport, camera.field_of_view, camera.world_to_eye());
        if viewport.is_degenerate() {
            engine_trace!("scene3d::Scene", "Viewport {}x{} is empty, frame skipped", viewport.width, viewport.height);
            return Ok(());
        }
        self.world.begin_frame();

        let mut commands = device.create_command_list()?;
        let mut ctx = FrameContext { device: &mut *device, commands: commands.as_mut() };
        self.pipeline.run(&mut ctx, &mut self.world)?;

        device.submit(commands)?;
        self.timer_results = device.timer_results();
        device.check_error()
    }

    /// Advance animated materials and particle simulation by `dt` seconds
    ///
    /// Objects are advanced through `ObjectMut::update`.
    pub fn update(&mut self, device: &mut dyn GraphicsDevice, dt: f32) -> Result<()> {
        self.world.materials.update(dt);
        self.pipeline.update(device, &mut self.world, dt)
    }

    pub fn stats(&self) -> &SceneStats {
        self.world.stats()
    }

    /// GPU time of each stage during the last submitted frame
    pub fn timer_results(&self) -> &[GpuTimerResult] {
        &self.timer_results
    }

    pub fn world(&self) -> &SceneWorld {
        &self.world
    }

    pub fn pipeline(&self) -> &RenderPipeline {
        &self.pipeline
    }

    // ===== OBJECTS =====

    /// Place an instance of the model called `model_name`
    ///
    /// The model (and its textures) is loaded on first use. Lights of the
    /// model are spawned along with the object.
    pub fn create_object(
        &mut self,
        device: &mut dyn GraphicsDevice,
        model_name: &str,
        position: Vec3,
        orientation: Quat,
        scale: Vec3,
    ) -> Result<ObjectKey> {
        let world = &mut self.world;
        let model = world.models.get_or_load(device, self.cache.as_mut(), &mut world.materials, model_name)?;
        let data = world
            .models
            .get(model)
            .map(|model| model.data().clone())
            .ok_or_else(|| engine_err!(InvalidResource, "scene3d::Scene", "model '{}' vanished from the cache", model_name))?;

        let object = SceneObject::new(model, data, position, orientation.normalize(), scale);
        Ok(world.insert_object(object))
    }

    /// Remove an object and the lights it spawned
    pub fn destroy_object(&mut self, key: ObjectKey) -> bool {
        self.world.remove_object(key)
    }

    pub fn object(&self, key: ObjectKey) -> Option<&SceneObject> {
        self.world.object(key)
    }

    pub fn object_mut(&mut self, key: ObjectKey) -> Option<ObjectMut<'_>> {
        self.world.object_mut(key)
    }

    // ===== LIGHTS =====

    pub fn create_light(&mut self, light: SceneLight) -> LightKey {
        self.world.insert_light(light)
    }

    pub fn destroy_light(&mut self, key: LightKey) -> bool {
        self.world.remove_light(key)
    }

    pub fn light(&self, key: LightKey) -> Option<&SceneLight> {
        self.world.light(key)
    }

    pub fn light_mut(&mut self, key: LightKey) -> Option<LightMut<'_>> {
        self.world.light_mut(key)
    }

    // ===== PARTICLE EMITTERS =====

    /// Add an emitter, loading its particle and gradient textures
    pub fn create_emitter(
        &mut self,
        device: &mut dyn GraphicsDevice,
        emitter: SceneParticleEmitter,
    ) -> Result<EmitterKey> {
        let world = &mut self.world;
        if let Some(texture) = &emitter.texture {
            world.materials.get_or_load(device, self.cache.as_mut(), texture, false)?;
        }
        if let Some(gradient) = &emitter.gradient_texture {
            world.materials.get_or_load(device, self.cache.as_mut(), gradient, true)?;
        }
        Ok(world.insert_emitter(emitter))
    }

    pub fn destroy_emitter(&mut self, key: EmitterKey) -> bool {
        self.world.remove_emitter(key)
    }

    pub fn emitter(&self, key: EmitterKey) -> Option<&SceneParticleEmitter> {
        self.world.emitter(key)
    }

    pub fn emitter_mut(&mut self, key: EmitterKey) -> Option<EmitterMut<'_>> {
        self.world.emitter_mut(key)
    }

    // ===== LIGHT PROBES =====

    pub fn create_probe(&mut self, probe: SceneLightProbe) -> ProbeKey {
        self.world.insert_probe(probe)
    }

    pub fn destroy_probe(&mut self, key: ProbeKey) -> bool {
        self.world.remove_probe(key)
    }

    pub fn probe(&self, key: ProbeKey) -> Option<&SceneLightProbe> {
        self.world.probe(key)
    }

    pub fn probe_mut(&mut self, key: ProbeKey) -> Option<ProbeMut<'_>> {
        self.world.probe_mut(key)
    }
}

#[cfg(test)]
#[path = "scene_tests.rs"]
mod tests;
