/// Scene objects: instances of a model placed in the world

use std::sync::Arc;
use glam::{EulerRot, Mat4, Quat, Vec3};

use crate::culling::{CullHandle, AABB};
use crate::error::Result;
use crate::engine_bail;
use crate::model::{AnimationState, ModelData, ModelKey};
use super::{LightKey, ObjectKey, SceneWorld};

pub struct SceneObject {
    pub(crate) model: ModelKey,
    pub(crate) data: Arc<ModelData>,
    pub(crate) position: Vec3,
    pub(crate) orientation: Quat,
    pub(crate) scale: Vec3,
    pub(crate) animation: AnimationState,
    pub(crate) playing: bool,
    /// Lights spawned from the model's lights, in model order
    pub(crate) lights: Vec<LightKey>,
    pub(crate) cull: CullHandle,
    pub(crate) drawn_frame: Option<u64>,
}

impl SceneObject {
    pub(crate) fn new(model: ModelKey, data: Arc<ModelData>, position: Vec3, orientation: Quat, scale: Vec3) -> Self {
        Self {
            model,
            data,
            position,
            orientation,
            scale,
            animation: AnimationState::default(),
            playing: false,
            lights: Vec::new(),
            cull: CullHandle::default(),
            drawn_frame: None,
        }
    }

    pub fn model(&self) -> ModelKey {
        self.model
    }

    pub fn model_data(&self) -> &Arc<ModelData> {
        &self.data
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn orientation(&self) -> Quat {
        self.orientation
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn animation(&self) -> AnimationState {
        self.animation
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn lights(&self) -> &[LightKey] {
        &self.lights
    }

    pub fn cull_handle(&self) -> CullHandle {
        self.cull
    }

    /// Render frame in which the object was last drawn
    pub fn drawn_frame(&self) -> Option<u64> {
        self.drawn_frame
    }

    pub fn object_to_world(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.orientation, self.position)
    }

    pub fn aabb(&self) -> AABB {
        self.data.aabb.transformed(&self.object_to_world())
    }

    fn play(&mut self, name: &str) -> Result<()> {
        let Some(index) = self.data.animation_index(name) else {
            engine_bail!(InvalidResource, "scene3d::SceneObject",
                "model '{}' has no animation '{}'", self.data.name, name);
        };
        self.animation = AnimationState { animation: index, time: 0.0 };
        self.playing = true;
        Ok(())
    }

    /// Advance the current animation; returns true when the pose changed
    fn advance(&mut self, dt: f32) -> bool {
        if !self.playing {
            return false;
        }
        let Some(animation) = self.data.animations.get(self.animation.animation) else {
            self.playing = false;
            return false;
        };

        let mut time = self.animation.time + dt * animation.playback_speed;
        if animation.length <= 0.0 {
            time = 0.0;
        } else if animation.looping {
            time = time.rem_euclid(animation.length);
        } else if time >= animation.length {
            time = animation.length;
            self.playing = false;
        }
        self.animation.time = time;
        true
    }
}

/// Mutable view of an object; every transform change re-indexes the
/// object and its lights
pub struct ObjectMut<'a> {
    pub(super) world: &'a mut SceneWorld,
    pub(super) key: ObjectKey,
}

impl ObjectMut<'_> {
    pub fn key(&self) -> ObjectKey {
        self.key
    }

    pub fn get(&self) -> &SceneObject {
        &self.world.objects[self.key]
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.edit(|object| object.position = position);
    }

    pub fn set_orientation(&mut self, orientation: Quat) {
        self.edit(|object| object.orientation = orientation.normalize());
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.edit(|object| object.scale = scale);
    }

    pub fn move_by(&mut self, offset: Vec3) {
        self.edit(|object| object.position += offset);
    }

    /// Rotate about the object's own axes (radians)
    pub fn rotate(&mut self, yaw: f32, pitch: f32, roll: f32) {
        self.edit(|object| {
            let delta = Quat::from_euler(EulerRot::YXZ, yaw, pitch, roll);
            object.orientation = (object.orientation * delta).normalize();
        });
    }

    /// Start the model animation called `name` from its beginning
    pub fn play_animation(&mut self, name: &str) -> Result<()> {
        let object = &mut self.world.objects[self.key];
        object.play(name)?;
        self.world.reindex_object(self.key);
        Ok(())
    }

    pub fn stop_animation(&mut self) {
        self.world.objects[self.key].playing = false;
    }

    /// Advance the animation and the attached lights by `dt` seconds
    pub fn update(&mut self, dt: f32) {
        if self.world.objects[self.key].advance(dt) {
            self.world.reindex_object(self.key);
        }
    }

    fn edit(&mut self, f: impl FnOnce(&mut SceneObject)) {
        f(&mut self.world.objects[self.key]);
        self.world.reindex_object(self.key);
    }
}
