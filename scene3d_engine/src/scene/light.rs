/// Scene lights

use glam::{Quat, Vec3};

use crate::culling::{CullHandle, AABB};
use super::{LightKey, ObjectKey, SceneWorld};

/// Half-size of the bounds given to lights without a range
const UNBOUNDED_EXTENT: f32 = 1e30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightType {
    /// Point light with a spherical range
    Omni,
    /// Cone light along its +Z axis
    Spot,
    /// Directional light along its +Z axis, unbounded
    Sun,
    /// Uniform light, unbounded
    Ambient,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneLight {
    pub kind: LightType,
    pub position: Vec3,
    pub orientation: Quat,
    pub color: Vec3,
    /// Distance where the falloff starts
    pub attenuation_start: f32,
    /// Distance where the light reaches zero
    pub attenuation_end: f32,
    /// Outer cone angle in degrees (spot)
    pub falloff: f32,
    /// Inner cone angle in degrees (spot)
    pub hotspot: f32,
    pub ambient_illumination: f32,
    /// Spot with a rectangular cross-section
    pub rectangle_shape: bool,
    pub casts_shadows: bool,
    /// Lights the scene (lights with `false` only feed probes and particles)
    pub light_caster: bool,
    /// Object this light belongs to, with the index of the model light
    pub owner: Option<(ObjectKey, usize)>,
    pub(crate) cull: CullHandle,
}

impl SceneLight {
    fn base(kind: LightType, position: Vec3, color: Vec3, range: f32) -> Self {
        Self {
            kind,
            position,
            orientation: Quat::IDENTITY,
            color,
            attenuation_start: 0.0,
            attenuation_end: range,
            falloff: 45.0,
            hotspot: 30.0,
            ambient_illumination: 0.0,
            rectangle_shape: false,
            casts_shadows: false,
            light_caster: true,
            owner: None,
            cull: CullHandle::default(),
        }
    }

    pub fn omni(position: Vec3, color: Vec3, range: f32) -> Self {
        Self::base(LightType::Omni, position, color, range)
    }

    pub fn spot(position: Vec3, orientation: Quat, color: Vec3, range: f32, falloff: f32) -> Self {
        Self {
            orientation,
            falloff,
            hotspot: falloff * 0.75,
            ..Self::base(LightType::Spot, position, color, range)
        }
    }

    pub fn sun(orientation: Quat, color: Vec3) -> Self {
        Self { orientation, ..Self::base(LightType::Sun, Vec3::ZERO, color, 0.0) }
    }

    pub fn ambient(color: Vec3) -> Self {
        Self::base(LightType::Ambient, Vec3::ZERO, color, 0.0)
    }

    pub fn cull_handle(&self) -> CullHandle {
        self.cull
    }

    pub fn direction(&self) -> Vec3 {
        self.orientation * Vec3::Z
    }

    /// World bounds of the lit volume
    pub fn aabb(&self) -> AABB {
        match self.kind {
            LightType::Omni | LightType::Spot => {
                AABB::from_center_radius(self.position, self.attenuation_end)
            }
            LightType::Sun | LightType::Ambient => {
                AABB::from_center_radius(Vec3::ZERO, UNBOUNDED_EXTENT)
            }
        }
    }
}

/// Mutable view of a light; every transform change re-indexes it
pub struct LightMut<'a> {
    pub(super) world: &'a mut SceneWorld,
    pub(super) key: LightKey,
}

impl LightMut<'_> {
    pub fn key(&self) -> LightKey {
        self.key
    }

    pub fn get(&self) -> &SceneLight {
        &self.world.lights[self.key]
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.edit(|light| light.position = position);
    }

    pub fn set_orientation(&mut self, orientation: Quat) {
        self.edit(|light| light.orientation = orientation);
    }

    pub fn move_by(&mut self, offset: Vec3) {
        self.edit(|light| light.position += offset);
    }

    pub fn set_color(&mut self, color: Vec3) {
        self.edit(|light| light.color = color);
    }

    pub fn set_range(&mut self, attenuation_start: f32, attenuation_end: f32) {
        self.edit(|light| {
            light.attenuation_start = attenuation_start;
            light.attenuation_end = attenuation_end;
        });
    }

    pub fn set_casts_shadows(&mut self, casts_shadows: bool) {
        self.edit(|light| light.casts_shadows = casts_shadows);
    }

    /// Apply any change and re-index
    pub fn edit(&mut self, f: impl FnOnce(&mut SceneLight)) {
        if let Some(light) = self.world.lights.get_mut(self.key) {
            f(light);
        }
        self.world.reindex_light(self.key);
    }
}
