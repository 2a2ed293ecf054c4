/// Particles stage: simulation of visible emitters and their billboards
///
/// Emitters join the active list when a render finds them inside the
/// particle cull distance and leave it after a render that does not.
/// `update` simulates the active emitters, sorts each one's particles back
/// to front and packs them into one instance texture; `run` issues one
/// instanced draw per active emitter.

use std::sync::Arc;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rdst::RadixSort;

use crate::binding::{BindingGraph, InputSlot, TextureRef};
use crate::config::SceneConfig;
use crate::engine_debug;
use crate::error::Result;
use crate::graphics_device::{
    BlendMode, DepthMode, FrameBuffer, GraphicsDevice, Program, ProgramDesc, Rect2D, Texture,
    TextureDesc, TextureFormat, TextureUsage,
};
use crate::scene::{EmitterKey, FrameContext, Particle, SceneWorld};
use super::render_stage::{create_frame_buffer, CameraInputs, RenderStage};
use super::slots;

const NAME: &str = "particles";

/// Texels per row of the instance texture
const INSTANCE_TEXTURE_WIDTH: u32 = 1024;

/// Instance texture texels per particle
const VECTORS_PER_PARTICLE: usize = 2;

const PARTICLE_SEED: u64 = 0x9a27_1c1e;

/// Back-to-front sort keys: inverted distance bits above the particle index
fn sort_keys(particles: &[Particle], eye: Vec3) -> Vec<u64> {
    particles
        .iter()
        .enumerate()
        .map(|(index, particle)| {
            let distance = particle.position.distance_squared(eye).to_bits();
            ((!distance as u64) << 32) | index as u64
        })
        .collect()
}

/// Indices of `particles`, farthest from `eye` first
pub(crate) fn back_to_front(particles: &[Particle], eye: Vec3) -> Vec<usize> {
    let mut keys = sort_keys(particles, eye);
    keys.radix_sort_unstable();
    keys.into_iter().map(|key| (key & 0xffff_ffff) as usize).collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ActiveEmitter {
    key: EmitterKey,
    last_seen: u64,
    first_particle: u32,
    particle_count: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct ParticleConstants {
    world_to_eye: Mat4,
    eye_to_projection: Mat4,
    /// First particle, instance texture width
    first: [u32; 4],
}

pub struct ParticlesStage {
    camera: CameraInputs,
    final_color: InputSlot<TextureRef>,
    z_buffer: InputSlot<TextureRef>,
    frame_buffer: Option<Arc<dyn FrameBuffer>>,
    program: Arc<dyn Program>,
    active: Vec<ActiveEmitter>,
    instances: Option<Arc<dyn Texture>>,
    instance_rows: u32,
    rng: StdRng,
    near_plane: f32,
    cull_distance: f32,
}

impl ParticlesStage {
    pub fn new(device: &mut dyn GraphicsDevice, graph: &mut BindingGraph, config: &SceneConfig) -> Result<Self> {
        Ok(Self {
            camera: CameraInputs::bind(graph, NAME)?,
            final_color: graph.input(NAME, slots::FINAL_COLOR)?,
            z_buffer: graph.input(NAME, slots::Z_BUFFER)?,
            frame_buffer: None,
            program: device.create_program(
                ProgramDesc::graphics("particles", &config.shader_path, "particles.vert", "particles.frag"),
            )?,
            active: Vec::new(),
            instances: None,
            instance_rows: 0,
            rng: StdRng::seed_from_u64(PARTICLE_SEED),
            near_plane: config.near_plane,
            cull_distance: config.particle_cull_distance,
        })
    }

    /// Upload `vectors`, growing the instance texture by powers of two
    fn upload(&mut self, device: &mut dyn GraphicsDevice, mut vectors: Vec<Vec4>) -> Result<()> {
        let rows = (vectors.len() as u32).div_ceil(INSTANCE_TEXTURE_WIDTH).max(1);
        if self.instances.is_none() || rows > self.instance_rows {
            let capacity = rows.next_power_of_two();
            engine_debug!("scene3d::ParticlesStage", "Growing particle instances to {} rows", capacity);
            self.instances = Some(device.create_texture(TextureDesc {
                name: "particle_instances".to_string(),
                width: INSTANCE_TEXTURE_WIDTH,
                height: capacity,
                array_layers: 1,
                format: TextureFormat::R32G32B32A32_SFLOAT,
                usage: TextureUsage::SAMPLED,
                data: None,
            })?);
            self.instance_rows = capacity;
        }
        let Some(texture) = &self.instances else { return Ok(()) };
        vectors.resize((self.instance_rows * INSTANCE_TEXTURE_WIDTH) as usize, Vec4::ZERO);
        texture.update(0, bytemuck::cast_slice(&vectors))
    }
}

impl RenderStage for ParticlesStage {
    fn name(&self) -> &str {
        NAME
    }

    fn update(&mut self, device: &mut dyn GraphicsDevice, world: &mut SceneWorld, dt: f32) -> Result<()> {
        let frame = world.render_frame();
        let eye = world.camera().position;

        self.active.retain(|entry| entry.last_seen == frame);
        let mut vectors = Vec::new();
        let mut kept = Vec::with_capacity(self.active.len());
        for mut entry in self.active.drain(..) {
            let Some(emitter) = world.emitter_entry_mut(entry.key) else { continue };
            emitter.simulate(dt, &mut self.rng);

            entry.first_particle = (vectors.len() / VECTORS_PER_PARTICLE) as u32;
            entry.particle_count = emitter.particles().len() as u32;
            for index in back_to_front(emitter.particles(), eye) {
                let particle = emitter.particles()[index];
                vectors.push(particle.position.extend(emitter.particle_size(particle.life)));
                vectors.push(Vec4::new(particle.life, 0.0, 0.0, 0.0));
            }
            kept.push(entry);
        }
        self.active = kept;

        if vectors.is_empty() {
            return Ok(());
        }
        self.upload(device, vectors)
    }

    fn run(&mut self, ctx: &mut FrameContext, world: &mut SceneWorld) -> Result<()> {
        if self.camera.viewport.get().is_degenerate() {
            return Ok(());
        }

        let frame = world.render_frame();
        let view = self.camera.view(self.near_plane, self.cull_distance);
        let active = &mut self.active;
        world.visit_emitters(&view.frustum, |key, _| {
            match active.iter_mut().find(|entry| entry.key == key) {
                Some(entry) => entry.last_seen = frame,
                None => active.push(ActiveEmitter { key, last_seen: frame, first_particle: 0, particle_count: 0 }),
            }
            Ok(())
        })?;

        let targets_changed = self.final_color.changed() | self.z_buffer.changed();
        if targets_changed || self.frame_buffer.is_none() {
            self.frame_buffer = create_frame_buffer(
                ctx.device,
                &[&self.final_color.get()],
                Some(&self.z_buffer.get()),
            )?;
        }
        let (Some(frame_buffer), Some(instances)) = (&self.frame_buffer, &self.instances) else {
            return Ok(());
        };

        let commands = &mut *ctx.commands;
        commands.set_frame_buffer(Some(frame_buffer))?;
        commands.set_viewport(Rect2D::from_size(frame_buffer.width(), frame_buffer.height()))?;
        commands.set_blend_mode(BlendMode::Alpha)?;
        commands.set_depth_mode(DepthMode::TestOnly)?;
        commands.bind_program(&self.program)?;
        commands.bind_texture(0, instances)?;

        for entry in &self.active {
            if entry.last_seen != frame || entry.particle_count == 0 {
                continue;
            }
            let Some(emitter) = world.emitter(entry.key) else { continue };
            for (slot, name) in [(1, &emitter.texture), (2, &emitter.gradient_texture)] {
                if let Some(texture) = name.as_deref().and_then(|name| world.materials().texture(name)) {
                    commands.bind_texture(slot, &texture)?;
                }
            }
            let constants = ParticleConstants {
                world_to_eye: view.world_to_eye,
                eye_to_projection: view.eye_to_projection,
                first: [entry.first_particle, INSTANCE_TEXTURE_WIDTH, 0, 0],
            };
            commands.push_constants(bytemuck::bytes_of(&constants))?;
            commands.draw_instanced(6, 0, entry.particle_count)?;
        }
        commands.set_blend_mode(BlendMode::Opaque)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn particle_at(z: f32) -> Particle {
        Particle { position: Vec3::new(0.0, 0.0, z), velocity: Vec3::ZERO, life: 0.0 }
    }

    #[test]
    fn test_back_to_front_orders_by_distance() {
        let particles = [particle_at(1.0), particle_at(5.0), particle_at(3.0), particle_at(-10.0)];
        assert_eq!(back_to_front(&particles, Vec3::ZERO), vec![3, 1, 2, 0]);
    }

    #[test]
    fn test_back_to_front_keeps_all_ties() {
        let particles = [particle_at(2.0), particle_at(-2.0), particle_at(2.0)];
        let mut order = back_to_front(&particles, Vec3::ZERO);
        order.sort();
        assert_eq!(order, vec![0, 1, 2]);
    }
}
