/// GBuffer stage: opaque geometry into the material targets

use std::sync::Arc;

use crate::binding::{BindingGraph, OutputSlot, TextureRef};
use crate::config::SceneConfig;
use crate::error::Result;
use crate::engine_debug;
use crate::graphics_device::{
    BlendMode, ClearValue, CommandList, DepthMode, FrameBuffer, GraphicsDevice, Program,
    ProgramDesc, Rect2D, TextureFormat,
};
use crate::model::{MeshDraw, ModelMeshVisitor};
use crate::scene::{FrameContext, SceneWorld};
use super::render_stage::{create_frame_buffer, create_target, CameraInputs, RenderStage};
use super::slots;

const NAME: &str = "gbuffer";

/// Draws opaque material ranges; skinned models use the bone program
struct GBufferVisitor {
    program: Arc<dyn Program>,
    skinned_program: Arc<dyn Program>,
}

impl ModelMeshVisitor for GBufferVisitor {
    fn render(&mut self, commands: &mut dyn CommandList, draw: &MeshDraw) -> Result<bool> {
        if draw.material.transparent {
            return Ok(false);
        }
        let program = if draw.bone_count > 0 { &self.skinned_program } else { &self.program };
        commands.bind_program(program)?;
        draw.record(commands)?;
        Ok(true)
    }
}

pub struct GBufferStage {
    camera: CameraInputs,
    diffuse_color: OutputSlot<TextureRef>,
    specular_color: OutputSlot<TextureRef>,
    specular_level: OutputSlot<TextureRef>,
    self_illumination: OutputSlot<TextureRef>,
    normal_z: OutputSlot<TextureRef>,
    z_buffer: OutputSlot<TextureRef>,
    frame_buffer: Option<Arc<dyn FrameBuffer>>,
    size: (u32, u32),
    visitor: GBufferVisitor,
    near_plane: f32,
    far_plane: f32,
}

impl GBufferStage {
    pub fn new(device: &mut dyn GraphicsDevice, graph: &mut BindingGraph, config: &SceneConfig) -> Result<Self> {
        let visitor = GBufferVisitor {
            program: device.create_program(
                ProgramDesc::graphics("gbuffer", &config.shader_path, "gbuffer.vert", "gbuffer.frag"),
            )?,
            skinned_program: device.create_program(
                ProgramDesc::graphics("gbuffer_skinned", &config.shader_path, "gbuffer.vert", "gbuffer.frag")
                    .with_define("USE_BONES"),
            )?,
        };

        Ok(Self {
            camera: CameraInputs::bind(graph, NAME)?,
            diffuse_color: graph.output(NAME, slots::DIFFUSE_COLOR, TextureRef::none())?,
            specular_color: graph.output(NAME, slots::SPECULAR_COLOR, TextureRef::none())?,
            specular_level: graph.output(NAME, slots::SPECULAR_LEVEL, TextureRef::none())?,
            self_illumination: graph.output(NAME, slots::SELF_ILLUMINATION, TextureRef::none())?,
            normal_z: graph.output(NAME, slots::NORMAL_Z, TextureRef::none())?,
            z_buffer: graph.output(NAME, slots::Z_BUFFER, TextureRef::none())?,
            frame_buffer: None,
            size: (0, 0),
            visitor,
            near_plane: config.near_plane,
            far_plane: config.far_plane,
        })
    }

    fn allocate(&mut self, device: &mut dyn GraphicsDevice, width: u32, height: u32) -> Result<()> {
        engine_debug!("scene3d::GBufferStage", "Allocating gbuffer {}x{}", width, height);

        let targets = [
            (&mut self.diffuse_color, "gbuffer_diffuse", TextureFormat::R8G8B8A8_SRGB),
            (&mut self.specular_color, "gbuffer_specular", TextureFormat::R8G8B8A8_UNORM),
            (&mut self.specular_level, "gbuffer_specular_level", TextureFormat::R8G8B8A8_UNORM),
            (&mut self.self_illumination, "gbuffer_self_illumination", TextureFormat::R16G16B16A16_SFLOAT),
            (&mut self.normal_z, "gbuffer_normal_z", TextureFormat::R16G16B16A16_SFLOAT),
            (&mut self.z_buffer, "gbuffer_z_buffer", TextureFormat::D24_UNORM_S8_UINT),
        ];
        for (slot, name, format) in targets {
            slot.set(TextureRef::new(create_target(device, name, width, height, format)?));
        }

        let colors = [
            self.diffuse_color.get(),
            self.specular_color.get(),
            self.specular_level.get(),
            self.self_illumination.get(),
            self.normal_z.get(),
        ];
        let color_refs: Vec<&TextureRef> = colors.iter().collect();
        self.frame_buffer = create_frame_buffer(device, &color_refs, Some(&self.z_buffer.get()))?;
        self.size = (width, height);
        Ok(())
    }

    /// Size of the current targets, (0, 0) before the first allocation
    pub fn size(&self) -> (u32, u32) {
        self.size
    }
}

impl RenderStage for GBufferStage {
    fn name(&self) -> &str {
        NAME
    }

    fn run(&mut self, ctx: &mut FrameContext, world: &mut SceneWorld) -> Result<()> {
        let resized = self.camera.viewport.changed();
        let viewport = self.camera.viewport.get();
        if viewport.is_degenerate() {
            return Ok(());
        }
        let size = (viewport.width, viewport.height);
        if self.frame_buffer.is_none() || (resized && size != self.size) {
            self.allocate(ctx.device, size.0, size.1)?;
        }
        let Some(frame_buffer) = &self.frame_buffer else { return Ok(()) };

        let commands = &mut *ctx.commands;
        commands.set_frame_buffer(Some(frame_buffer))?;
        commands.set_viewport(Rect2D::from_size(size.0, size.1))?;
        commands.clear(&[
            ClearValue::Color([0.0; 4]),
            ClearValue::Color([0.0; 4]),
            ClearValue::Color([0.0; 4]),
            ClearValue::Color([0.0; 4]),
            ClearValue::Color([0.0, 0.0, 1.0, 0.0]),
            ClearValue::DepthStencil { depth: 1.0, stencil: 0 },
        ])?;
        commands.set_blend_mode(BlendMode::Opaque)?;
        commands.set_depth_mode(DepthMode::TestAndWrite)?;

        let view = self.camera.view(self.near_plane, self.far_plane);
        world.visit(ctx, &view, &mut self.visitor)
    }
}
