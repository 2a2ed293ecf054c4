/// Transparency stage: transparent material ranges blended over the lit scene

use std::sync::Arc;

use crate::binding::{BindingGraph, InputSlot, TextureRef};
use crate::config::SceneConfig;
use crate::error::Result;
use crate::graphics_device::{
    BlendMode, CommandList, DepthMode, FrameBuffer, GraphicsDevice, Program, ProgramDesc, Rect2D,
};
use crate::model::{MeshDraw, ModelMeshVisitor};
use crate::scene::{FrameContext, SceneWorld};
use super::render_stage::{create_frame_buffer, CameraInputs, RenderStage};
use super::slots;

const NAME: &str = "transparency";

struct TransparencyVisitor {
    program: Arc<dyn Program>,
    skinned_program: Arc<dyn Program>,
}

impl ModelMeshVisitor for TransparencyVisitor {
    fn render(&mut self, commands: &mut dyn CommandList, draw: &MeshDraw) -> Result<bool> {
        if !draw.material.transparent {
            return Ok(false);
        }
        let program = if draw.bone_count > 0 { &self.skinned_program } else { &self.program };
        commands.bind_program(program)?;
        draw.record(commands)?;
        Ok(true)
    }
}

pub struct TransparencyStage {
    camera: CameraInputs,
    final_color: InputSlot<TextureRef>,
    z_buffer: InputSlot<TextureRef>,
    frame_buffer: Option<Arc<dyn FrameBuffer>>,
    visitor: TransparencyVisitor,
    near_plane: f32,
    far_plane: f32,
}

impl TransparencyStage {
    pub fn new(device: &mut dyn GraphicsDevice, graph: &mut BindingGraph, config: &SceneConfig) -> Result<Self> {
        let visitor = TransparencyVisitor {
            program: device.create_program(
                ProgramDesc::graphics("transparency", &config.shader_path, "forward.vert", "forward.frag"),
            )?,
            skinned_program: device.create_program(
                ProgramDesc::graphics("transparency_skinned", &config.shader_path, "forward.vert", "forward.frag")
                    .with_define("USE_BONES"),
            )?,
        };
        Ok(Self {
            camera: CameraInputs::bind(graph, NAME)?,
            final_color: graph.input(NAME, slots::FINAL_COLOR)?,
            z_buffer: graph.input(NAME, slots::Z_BUFFER)?,
            frame_buffer: None,
            visitor,
            near_plane: config.near_plane,
            far_plane: config.far_plane,
        })
    }
}

impl RenderStage for TransparencyStage {
    fn name(&self) -> &str {
        NAME
    }

    fn run(&mut self, ctx: &mut FrameContext, world: &mut SceneWorld) -> Result<()> {
        if self.camera.viewport.get().is_degenerate() {
            return Ok(());
        }

        let targets_changed = self.final_color.changed() | self.z_buffer.changed();
        if targets_changed || self.frame_buffer.is_none() {
            self.frame_buffer = create_frame_buffer(
                ctx.device,
                &[&self.final_color.get()],
                Some(&self.z_buffer.get()),
            )?;
        }
        let Some(frame_buffer) = &self.frame_buffer else { return Ok(()) };

        let commands = &mut *ctx.commands;
        commands.set_frame_buffer(Some(frame_buffer))?;
        commands.set_viewport(Rect2D::from_size(frame_buffer.width(), frame_buffer.height()))?;
        commands.set_blend_mode(BlendMode::Alpha)?;
        commands.set_depth_mode(DepthMode::TestOnly)?;

        let view = self.camera.view(self.near_plane, self.far_plane);
        world.visit(ctx, &view, &mut self.visitor)?;
        ctx.commands.set_blend_mode(BlendMode::Opaque)
    }
}
