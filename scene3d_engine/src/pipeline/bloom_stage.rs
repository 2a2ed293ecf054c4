/// Bloom stage: bright-pass extract at quarter resolution, then blurred

use std::sync::Arc;

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

const NAME: &str = "bloom";

/// Bloom target size for a source of `width` x `height`
pub(crate) fn bloom_size(width: u32, height: u32) -> (u32, u32) {
    ((width / 4).max(1), (height / 4).max(1))
}

struct BloomTargets {
    texture: Arc<dyn Texture>,
    frame_buffer: Arc<dyn FrameBuffer>,
    scratch: BlurScratch,
}

pub struct BloomStage {
    camera: CameraInputs,
    final_color: InputSlot<TextureRef>,
    bloom: OutputSlot<TextureRef>,
    targets: Option<BloomTargets>,
    extract_program: Arc<dyn Program>,
    blur: GaussianBlur,
    threshold: f32,
}

impl BloomStage {
    pub fn new(device: &mut dyn GraphicsDevice, graph: &mut BindingGraph, config: &SceneConfig) -> Result<Self> {
        Ok(Self {
            camera: CameraInputs::bind(graph, NAME)?,
            final_color: graph.input(NAME, slots::FINAL_COLOR)?,
            bloom: graph.output(NAME, slots::BLOOM_CONTRIBUTION, TextureRef::none())?,
            targets: None,
            extract_program: device.create_program(
                ProgramDesc::graphics("bloom_extract", &config.shader_path, "fullscreen.vert", "bloom_extract.frag"),
            )?,
            blur: GaussianBlur::new(device, &config.shader_path, "bloom_blur", config.bloom_radius)?,
            threshold: config.bloom_threshold,
        })
    }

    fn allocate(&mut self, device: &mut dyn GraphicsDevice, width: u32, height: u32) -> Result<()> {
        engine_debug!("scene3d::BloomStage", "Allocating bloom {}x{}", width, height);

        let texture = create_target(device, "bloom", width, height, TextureFormat::R16G16B16A16_SFLOAT)?;
        let bloom = TextureRef::new(texture.clone());
        let Some(frame_buffer) = create_frame_buffer(device, &[&bloom], None)? else { return Ok(()) };
        let scratch = BlurScratch::new(device, "bloom_scratch", width, height, TextureFormat::R16G16B16A16_SFLOAT)?;

        self.bloom.set(bloom);
        self.targets = Some(BloomTargets { texture, frame_buffer, scratch });
        Ok(())
    }
}

impl RenderStage for BloomStage {
    fn name(&self) -> &str {
        NAME
    }

    fn run(&mut self, ctx: &mut FrameContext, _world: &mut SceneWorld) -> Result<()> {
        if self.camera.viewport.get().is_degenerate() {
            return Ok(());
        }

        let source_changed = self.final_color.changed();
        let source = self.final_color.get();
        let Some(source_texture) = source.get() else { return Ok(()) };
        if self.targets.is_none() || source_changed {
            let (width, height) = source.size();
            let (width, height) = bloom_size(width, height);
            self.allocate(ctx.device, width, height)?;
        }
        let Some(targets) = &self.targets else { return Ok(()) };

        let commands = &mut *ctx.commands;
        commands.set_depth_mode(DepthMode::Disabled)?;
        commands.set_blend_mode(BlendMode::Opaque)?;
        commands.set_frame_buffer(Some(&targets.frame_buffer))?;
        commands.set_viewport(Rect2D::from_size(targets.frame_buffer.width(), targets.frame_buffer.height()))?;
        commands.push_constants(bytemuck::bytes_of(&self.threshold))?;
        draw_fullscreen(commands, &self.extract_program, &[source_texture])?;

        self.blur.blur(commands, &targets.texture, 0, &targets.scratch, &targets.frame_buffer)
    }
}
