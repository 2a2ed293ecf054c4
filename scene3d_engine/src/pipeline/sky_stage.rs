/// Sky stage: star billboards and the cloud cube, drawn behind the scene

use std::sync::Arc;
use glam::{Mat4, Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::binding::{BindingGraph, InputSlot, TextureRef};
use crate::config::SceneConfig;
use crate::error::Result;
use crate::graphics_device::{
    BlendMode, Buffer, BufferDesc, BufferUsage, DepthMode, FrameBuffer, GraphicsDevice, Program,
    ProgramDesc, Rect2D,
};
use crate::scene::{FrameContext, SceneWorld};
use super::render_stage::{create_frame_buffer, CameraInputs, RenderStage};
use super::slots;

const NAME: &str = "sky";

/// Star directions on the unit sphere with brightness in w
pub(crate) fn generate_stars(count: u32, seed: u64) -> Vec<Vec4> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            // Uniform on the sphere: uniform z and angle
            let z: f32 = rng.gen_range(-1.0..=1.0);
            let angle: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
            let r = (1.0 - z * z).max(0.0).sqrt();
            let direction = Vec3::new(r * angle.cos(), r * angle.sin(), z);
            direction.extend(rng.gen_range(0.2..=1.0))
        })
        .collect()
}

pub struct SkyStage {
    camera: CameraInputs,
    z_buffer: InputSlot<TextureRef>,
    self_illumination: InputSlot<TextureRef>,
    frame_buffer: Option<Arc<dyn FrameBuffer>>,
    star_program: Arc<dyn Program>,
    cloud_program: Arc<dyn Program>,
    stars: Option<Arc<dyn Buffer>>,
    star_count: u32,
    star_seed: u64,
}

impl SkyStage {
    pub fn new(device: &mut dyn GraphicsDevice, graph: &mut BindingGraph, config: &SceneConfig) -> Result<Self> {
        Ok(Self {
            camera: CameraInputs::bind(graph, NAME)?,
            z_buffer: graph.input(NAME, slots::Z_BUFFER)?,
            self_illumination: graph.input(NAME, slots::SELF_ILLUMINATION)?,
            frame_buffer: None,
            star_program: device.create_program(
                ProgramDesc::graphics("sky_stars", &config.shader_path, "stars.vert", "stars.frag"),
            )?,
            cloud_program: device.create_program(
                ProgramDesc::graphics("sky_clouds", &config.shader_path, "clouds.vert", "clouds.frag"),
            )?,
            stars: None,
            star_count: config.star_count,
            star_seed: config.star_seed,
        })
    }

    fn upload_stars(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        let stars = generate_stars(self.star_count, self.star_seed);
        let bytes: &[u8] = bytemuck::cast_slice(&stars);
        let buffer = device.create_buffer(BufferDesc {
            name: "sky_stars".to_string(),
            size: bytes.len() as u64,
            usage: BufferUsage::Storage,
        })?;
        buffer.update(0, bytes)?;
        self.stars = Some(buffer);
        Ok(())
    }
}

impl RenderStage for SkyStage {
    fn name(&self) -> &str {
        NAME
    }

    fn run(&mut self, ctx: &mut FrameContext, _world: &mut SceneWorld) -> Result<()> {
        let viewport = self.camera.viewport.get();
        if viewport.is_degenerate() {
            return Ok(());
        }

        let targets_changed = self.z_buffer.changed() | self.self_illumination.changed();
        if targets_changed || self.frame_buffer.is_none() {
            self.frame_buffer = create_frame_buffer(
                ctx.device,
                &[&self.self_illumination.get()],
                Some(&self.z_buffer.get()),
            )?;
        }
        let Some(frame_buffer) = self.frame_buffer.clone() else { return Ok(()) };
        if self.stars.is_none() && self.star_count > 0 {
            self.upload_stars(ctx.device)?;
        }

        // Rotation only: the sky sits at infinity
        let view = self.camera.view(0.1, 10.0);
        let rotation = Mat4::from_mat3(glam::Mat3::from_mat4(view.world_to_eye));
        let sky_to_projection = view.eye_to_projection * rotation;

        let commands = &mut *ctx.commands;
        commands.set_frame_buffer(Some(&frame_buffer))?;
        commands.set_viewport(Rect2D::from_size(frame_buffer.width(), frame_buffer.height()))?;
        commands.set_depth_mode(DepthMode::TestOnly)?;
        commands.set_blend_mode(BlendMode::Additive)?;
        commands.push_constants(bytemuck::bytes_of(&sky_to_projection))?;

        if let Some(stars) = &self.stars {
            commands.bind_program(&self.star_program)?;
            commands.bind_buffer(0, stars)?;
            commands.draw_instanced(6, 0, self.star_count)?;
        }

        commands.bind_program(&self.cloud_program)?;
        commands.draw(36, 0)?;
        commands.set_blend_mode(BlendMode::Opaque)
    }
}
