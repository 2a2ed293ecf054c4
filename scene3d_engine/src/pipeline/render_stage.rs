/// Render stage trait and helpers shared by the stages

use std::sync::Arc;
use glam::Mat4;

use crate::binding::{BindingGraph, InputSlot, TextureRef};
use crate::error::Result;
use crate::graphics_device::{
    Attachment, CommandList, FrameBuffer, FrameBufferDesc, GraphicsDevice, Program, Rect2D,
    Texture, TextureDesc, TextureFormat,
};
use crate::scene::{FrameContext, SceneWorld, ViewParams};
use super::slots;

/// One step of the frame
///
/// Stages run in a fixed order. Each one reads its inputs from slots bound
/// at construction and publishes its render targets through output slots.
pub trait RenderStage {
    fn name(&self) -> &str;

    /// Record this stage's commands for the current frame
    fn run(&mut self, ctx: &mut FrameContext, world: &mut SceneWorld) -> Result<()>;

    /// Advance time-dependent state (called by `Scene::update`)
    fn update(&mut self, _device: &mut dyn GraphicsDevice, _world: &mut SceneWorld, _dt: f32) -> Result<()> {
        Ok(())
    }
}

/// Camera inputs every view-dependent stage consumes
pub(crate) struct CameraInputs {
    pub viewport: InputSlot<Rect2D>,
    pub field_of_view: InputSlot<f32>,
    pub world_to_eye: InputSlot<Mat4>,
}

impl CameraInputs {
    pub fn bind(graph: &mut BindingGraph, consumer: &str) -> Result<Self> {
        Ok(Self {
            viewport: graph.input(consumer, slots::VIEWPORT)?,
            field_of_view: graph.input(consumer, slots::FIELD_OF_VIEW)?,
            world_to_eye: graph.input(consumer, slots::WORLD_TO_EYE)?,
        })
    }

    /// Point of view built from the slot values
    pub fn view(&self, near: f32, far: f32) -> ViewParams {
        let viewport = self.viewport.get();
        let projection = Mat4::perspective_lh(
            self.field_of_view.get().to_radians(),
            viewport.aspect(),
            near,
            far,
        );
        ViewParams::new(self.world_to_eye.get(), projection)
    }
}

/// Allocate a render target named `name`
pub(crate) fn create_target(
    device: &mut dyn GraphicsDevice,
    name: &str,
    width: u32,
    height: u32,
    format: TextureFormat,
) -> Result<Arc<dyn Texture>> {
    device.create_texture(TextureDesc::render_target(name, width, height, format))
}

/// Frame buffer over the given targets (all must be present)
pub(crate) fn create_frame_buffer(
    device: &mut dyn GraphicsDevice,
    colors: &[&TextureRef],
    depth: Option<&TextureRef>,
) -> Result<Option<Arc<dyn FrameBuffer>>> {
    let mut desc = FrameBufferDesc::default();
    for color in colors {
        match color.get() {
            Some(texture) => desc.color_attachments.push(Attachment::new(texture)),
            None => return Ok(None),
        }
    }
    if let Some(depth) = depth {
        match depth.get() {
            Some(texture) => desc.depth_attachment = Some(Attachment::new(texture)),
            None => return Ok(None),
        }
    }
    device.create_frame_buffer(desc).map(Some)
}

/// Bind a program and the given textures, then draw a fullscreen triangle
pub(crate) fn draw_fullscreen(
    commands: &mut dyn CommandList,
    program: &Arc<dyn Program>,
    textures: &[&Arc<dyn Texture>],
) -> Result<()> {
    commands.bind_program(program)?;
    for (slot, texture) in textures.iter().enumerate() {
        commands.bind_texture(slot as u32, texture)?;
    }
    commands.draw(3, 0)
}
