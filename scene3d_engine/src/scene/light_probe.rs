/// Light probes: spheres of baked ambient lighting

use glam::Vec3;

use crate::culling::{CullHandle, AABB};
use super::{ProbeKey, SceneWorld};

#[derive(Debug, Clone, PartialEq)]
pub struct SceneLightProbe {
    pub position: Vec3,
    pub radius: f32,
    pub color: Vec3,
    pub(crate) cull: CullHandle,
}

impl SceneLightProbe {
    pub fn new(position: Vec3, radius: f32, color: Vec3) -> Self {
        Self { position, radius, color, cull: CullHandle::default() }
    }

    pub fn cull_handle(&self) -> CullHandle {
        self.cull
    }

    pub fn aabb(&self) -> AABB {
        AABB::from_center_radius(self.position, self.radius)
    }
}

pub struct ProbeMut<'a> {
    pub(super) world: &'a mut SceneWorld,
    pub(super) key: ProbeKey,
}

impl ProbeMut<'_> {
    pub fn key(&self) -> ProbeKey {
        self.key
    }

    pub fn get(&self) -> &SceneLightProbe {
        &self.world.probes[self.key]
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.world.probes[self.key].position = position;
        self.world.reindex_probe(self.key);
    }

    pub fn set_radius(&mut self, radius: f32) {
        self.world.probes[self.key].radius = radius;
        self.world.reindex_probe(self.key);
    }

    pub fn set_color(&mut self, color: Vec3) {
        self.world.probes[self.key].color = color;
    }
}
