/// Ambient occlusion stage: half resolution occlusion from NormalZ, blurred

use std::sync::Arc;
use bytemuck::{Pod, Zeroable};

use crate::binding::{BindingGraph, InputSlot, OutputSlot, TextureRef};
use crate::config::SceneConfig;
use crate::engine_debug;
use crate::error::Result;
use crate::graphics_device::{
    BlendMode, DepthMode, FrameBuffer, GraphicsDevice, Program, ProgramDesc, Rect2D, Texture,
    TextureFormat,
};
use crate::scene::{FrameContext, SceneWorld};
use super::gaussian_blur::{BlurScratch, GaussianBlur};
use super::render_stage::{create_frame_buffer, create_target, draw_fullscreen, CameraInputs, RenderStage};
use super::slots;

const NAME: &str = "ambient_occlusion";

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct OcclusionConstants {
    /// Inverse projection scale (tan(fov / 2) * aspect, tan(fov / 2))
    eye_scale: [f32; 2],
    /// Texel size of the occlusion target
    texel: [f32; 2],
}

struct OcclusionTargets {
    texture: Arc<dyn Texture>,
    frame_buffer: Arc<dyn FrameBuffer>,
    scratch: BlurScratch,
}

pub struct AmbientOcclusionStage {
    camera: CameraInputs,
    normal_z: InputSlot<TextureRef>,
    z_buffer: InputSlot<TextureRef>,
    occlusion: OutputSlot<TextureRef>,
    targets: Option<OcclusionTargets>,
    program: Arc<dyn Program>,
    blur: GaussianBlur,
}

impl AmbientOcclusionStage {
    pub fn new(device: &mut dyn GraphicsDevice, graph: &mut BindingGraph, config: &SceneConfig) -> Result<Self> {
        Ok(Self {
            camera: CameraInputs::bind(graph, NAME)?,
            normal_z: graph.input(NAME, slots::NORMAL_Z)?,
            z_buffer: graph.input(NAME, slots::Z_BUFFER)?,
            occlusion: graph.output(NAME, slots::AMBIENT_OCCLUSION, TextureRef::none())?,
            targets: None,
            program: device.create_program(
                ProgramDesc::graphics("ambient_occlusion", &config.shader_path, "fullscreen.vert", "ambient_occlusion.frag"),
            )?,
            blur: GaussianBlur::new(device, &config.shader_path, "ambient_occlusion_blur", 2)?,
        })
    }

    fn allocate(&mut self, device: &mut dyn GraphicsDevice, width: u32, height: u32) -> Result<()> {
        engine_debug!("scene3d::AmbientOcclusionStage", "Allocating occlusion {}x{}", width, height);

        let texture = create_target(device, "ambient_occlusion", width, height, TextureFormat::R8_UNORM)?;
        let occlusion = TextureRef::new(texture.clone());
        let Some(frame_buffer) = create_frame_buffer(device, &[&occlusion], None)? else { return Ok(()) };
        let scratch = BlurScratch::new(device, "ambient_occlusion_scratch", width, height, TextureFormat::R8_UNORM)?;

        self.occlusion.set(occlusion);
        self.targets = Some(OcclusionTargets { texture, frame_buffer, scratch });
        Ok(())
    }
}

impl RenderStage for AmbientOcclusionStage {
    fn name(&self) -> &str {
        NAME
    }

    fn run(&mut self, ctx: &mut FrameContext, _world: &mut SceneWorld) -> Result<()> {
        let viewport = self.camera.viewport.get();
        if viewport.is_degenerate() {
            return Ok(());
        }

        let source_changed = self.normal_z.changed() | self.z_buffer.changed();
        let normal_z = self.normal_z.get();
        let z_buffer = self.z_buffer.get();
        let (Some(normal_z_texture), Some(z_buffer_texture)) = (normal_z.get(), z_buffer.get()) else {
            return Ok(());
        };
        if self.targets.is_none() || source_changed {
            let (width, height) = normal_z.size();
            self.allocate(ctx.device, (width / 2).max(1), (height / 2).max(1))?;
        }
        let Some(targets) = &self.targets else { return Ok(()) };

        let half_fov = (self.camera.field_of_view.get().to_radians() * 0.5).tan();
        let constants = OcclusionConstants {
            eye_scale: [half_fov * viewport.aspect(), half_fov],
            texel: [
                1.0 / targets.frame_buffer.width() as f32,
                1.0 / targets.frame_buffer.height() as f32,
            ],
        };

        let commands = &mut *ctx.commands;
        commands.set_depth_mode(DepthMode::Disabled)?;
        commands.set_blend_mode(BlendMode::Opaque)?;
        commands.set_frame_buffer(Some(&targets.frame_buffer))?;
        commands.set_viewport(Rect2D::from_size(targets.frame_buffer.width(), targets.frame_buffer.height()))?;
        commands.push_constants(bytemuck::bytes_of(&constants))?;
        draw_fullscreen(commands, &self.program, &[normal_z_texture, z_buffer_texture])?;

        self.blur.blur(commands, &targets.texture, 0, &targets.scratch, &targets.frame_buffer)
    }
}
