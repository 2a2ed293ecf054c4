/// Final stage: composites the lit scene and its bloom onto the default
/// frame buffer

use std::sync::Arc;

use crate::binding::{BindingGraph, InputSlot, TextureRef};
use crate::config::SceneConfig;
use crate::error::Result;
use crate::graphics_device::{BlendMode, DepthMode, GraphicsDevice, Program, ProgramDesc, Texture};
use crate::scene::{FrameContext, SceneWorld};
use super::render_stage::{draw_fullscreen, CameraInputs, RenderStage};
use super::slots;

const NAME: &str = "final";

pub struct FinalStage {
    camera: CameraInputs,
    final_color: InputSlot<TextureRef>,
    bloom: InputSlot<TextureRef>,
    /// Bound only when ambient occlusion is enabled
    occlusion: Option<InputSlot<TextureRef>>,
    program: Arc<dyn Program>,
    bloom_strength: f32,
}

impl FinalStage {
    pub fn new(device: &mut dyn GraphicsDevice, graph: &mut BindingGraph, config: &SceneConfig) -> Result<Self> {
        let occlusion = if config.ambient_occlusion {
            Some(graph.input(NAME, slots::AMBIENT_OCCLUSION)?)
        } else {
            None
        };
        let mut desc = ProgramDesc::graphics("final", &config.shader_path, "fullscreen.vert", "final.frag");
        if occlusion.is_some() {
            desc = desc.with_define("USE_AMBIENT_OCCLUSION");
        }
        Ok(Self {
            camera: CameraInputs::bind(graph, NAME)?,
            final_color: graph.input(NAME, slots::FINAL_COLOR)?,
            bloom: graph.input(NAME, slots::BLOOM_CONTRIBUTION)?,
            occlusion,
            program: device.create_program(desc)?,
            bloom_strength: config.bloom_strength,
        })
    }
}

impl RenderStage for FinalStage {
    fn name(&self) -> &str {
        NAME
    }

    fn run(&mut self, ctx: &mut FrameContext, _world: &mut SceneWorld) -> Result<()> {
        let viewport = self.camera.viewport.get();
        if viewport.is_degenerate() {
            return Ok(());
        }

        let inputs: Vec<TextureRef> = [Some(&self.final_color), Some(&self.bloom), self.occlusion.as_ref()]
            .into_iter()
            .flatten()
            .map(|input| input.get())
            .collect();
        let mut textures: Vec<&Arc<dyn Texture>> = Vec::with_capacity(inputs.len());
        for input in &inputs {
            match input.get() {
                Some(texture) => textures.push(texture),
                None => return Ok(()),
            }
        }

        let commands = &mut *ctx.commands;
        commands.set_frame_buffer(None)?;
        commands.set_viewport(viewport)?;
        commands.set_depth_mode(DepthMode::Disabled)?;
        commands.set_blend_mode(BlendMode::Opaque)?;
        commands.push_constants(bytemuck::bytes_of(&self.bloom_strength))?;
        draw_fullscreen(commands, &self.program, &textures)
    }
}
