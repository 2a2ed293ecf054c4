/// Particle emitters and their simulation

use glam::{Quat, Vec3};
use rand::Rng;

use crate::culling::{CullHandle, AABB};
use super::{EmitterKey, SceneWorld};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Normalized age in [0, 1)
    pub life: f32,
}

#[derive(Debug, Clone)]
pub struct SceneParticleEmitter {
    pub position: Vec3,
    pub orientation: Quat,
    /// Half-size of the box particles spawn in
    pub size: Vec3,
    pub particles_per_second: f32,
    /// Seconds a particle lives
    pub life_span: f32,
    pub start_size: f32,
    pub end_size: f32,
    pub speed: f32,
    /// Half-angle in degrees of the emission cone around +Z (sign ignored, capped at 180)
    pub spread: f32,
    pub acceleration: Vec3,
    pub texture: Option<String>,
    pub gradient_texture: Option<String>,
    /// Spawns new particles while true
    pub emitting: bool,
    pub(crate) particles: Vec<Particle>,
    pub(crate) spawn_accumulator: f32,
    pub(crate) cull: CullHandle,
}

impl Default for SceneParticleEmitter {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            size: Vec3::ZERO,
            particles_per_second: 10.0,
            life_span: 1.0,
            start_size: 0.1,
            end_size: 0.1,
            speed: 1.0,
            spread: 15.0,
            acceleration: Vec3::ZERO,
            texture: None,
            gradient_texture: None,
            emitting: true,
            particles: Vec::new(),
            spawn_accumulator: 0.0,
            cull: CullHandle::default(),
        }
    }
}

impl SceneParticleEmitter {
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn cull_handle(&self) -> CullHandle {
        self.cull
    }

    pub fn particle_size(&self, life: f32) -> f32 {
        self.start_size + (self.end_size - self.start_size) * life
    }

    /// Bounds of every position a particle can reach during its life
    pub fn aabb(&self) -> AABB {
        let t = self.life_span.max(0.0);
        let reach = self.speed.abs() * t
            + 0.5 * self.acceleration.length() * t * t
            + self.start_size.max(self.end_size);
        let extent = self.size.abs() + Vec3::splat(reach);
        AABB::new(self.position - extent, self.position + extent)
    }

    /// Age, move and spawn particles
    pub fn simulate<R: Rng>(&mut self, dt: f32, rng: &mut R) {
        if self.life_span <= 0.0 {
            self.particles.clear();
            return;
        }

        let aging = dt / self.life_span;
        let acceleration = self.acceleration;
        self.particles.retain_mut(|particle| {
            particle.life += aging;
            particle.position += particle.velocity * dt + 0.5 * acceleration * dt * dt;
            particle.velocity += acceleration * dt;
            particle.life < 1.0
        });

        if !self.emitting {
            self.spawn_accumulator = 0.0;
            return;
        }
        self.spawn_accumulator += self.particles_per_second * dt;
        let spawn = self.spawn_accumulator.floor();
        self.spawn_accumulator -= spawn;

        let spread = self.spread.abs().min(180.0).to_radians();
        for _ in 0..spawn as usize {
            let offset = Vec3::new(
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
            ) * self.size;
            let cone = Quat::from_rotation_z(rng.gen_range(0.0..std::f32::consts::TAU))
                * Quat::from_rotation_x(rng.gen_range(0.0..=spread));
            self.particles.push(Particle {
                position: self.position + self.orientation * offset,
                velocity: self.orientation * (cone * Vec3::Z) * self.speed,
                life: 0.0,
            });
        }
    }
}

/// Mutable view of an emitter; every transform change re-indexes it
pub struct EmitterMut<'a> {
    pub(super) world: &'a mut SceneWorld,
    pub(super) key: EmitterKey,
}

impl EmitterMut<'_> {
    pub fn key(&self) -> EmitterKey {
        self.key
    }

    pub fn get(&self) -> &SceneParticleEmitter {
        &self.world.emitters[self.key]
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.edit(|emitter| emitter.position = position);
    }

    pub fn set_orientation(&mut self, orientation: Quat) {
        self.edit(|emitter| emitter.orientation = orientation);
    }

    pub fn move_by(&mut self, offset: Vec3) {
        self.edit(|emitter| emitter.position += offset);
    }

    pub fn set_emitting(&mut self, emitting: bool) {
        self.world.emitters[self.key].emitting = emitting;
    }

    pub fn edit(&mut self, f: impl FnOnce(&mut SceneParticleEmitter)) {
        f(&mut self.world.emitters[self.key]);
        self.world.reindex_emitter(self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_spawn_rate() {
        let mut emitter = SceneParticleEmitter { particles_per_second: 10.0, life_span: 10.0, ..Default::default() };
        let mut rng = StdRng::seed_from_u64(1);
        emitter.simulate(0.25, &mut rng);
        assert_eq!(emitter.particles().len(), 2);
        emitter.simulate(0.25, &mut rng);
        assert_eq!(emitter.particles().len(), 5);
    }

    #[test]
    fn test_particles_expire() {
        let mut emitter = SceneParticleEmitter { particles_per_second: 10.0, life_span: 1.0, ..Default::default() };
        let mut rng = StdRng::seed_from_u64(2);
        emitter.simulate(0.5, &mut rng);
        assert_eq!(emitter.particles().len(), 5);

        emitter.emitting = false;
        emitter.simulate(1.1, &mut rng);
        assert!(emitter.particles().is_empty());
    }

    #[test]
    fn test_particles_move_with_speed() {
        let mut emitter = SceneParticleEmitter {
            particles_per_second: 1.0,
            life_span: 10.0,
            speed: 2.0,
            spread: 0.0,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        emitter.simulate(1.0, &mut rng);
        emitter.emitting = false;
        emitter.simulate(1.0, &mut rng);

        let particle = emitter.particles()[0];
        assert!(particle.position.abs_diff_eq(Vec3::new(0.0, 0.0, 2.0), 1e-4));
        assert!((particle.life - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_negative_spread_mirrors_positive() {
        let mut emitter = SceneParticleEmitter {
            particles_per_second: 10.0,
            life_span: 10.0,
            spread: -10.0,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(4);
        emitter.simulate(1.0, &mut rng);

        assert_eq!(emitter.particles().len(), 10);
        let min_cos = 10.0f32.to_radians().cos() - 1e-4;
        for particle in emitter.particles() {
            assert!(particle.velocity.normalize().z >= min_cos);
        }
    }

    #[test]
    fn test_particle_size_interpolates() {
        let emitter = SceneParticleEmitter { start_size: 1.0, end_size: 3.0, ..Default::default() };
        assert_eq!(emitter.particle_size(0.5), 2.0);
    }

    #[test]
    fn test_aabb_covers_travel() {
        let emitter = SceneParticleEmitter { speed: 2.0, life_span: 3.0, start_size: 0.5, ..Default::default() };
        let aabb = emitter.aabb();
        assert_eq!(aabb.max, Vec3::splat(6.5));
    }
}
