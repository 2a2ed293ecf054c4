/// Separable gaussian blur used by the shadow map, bloom and ambient
/// occlusion stages

use std::sync::Arc;
use bytemuck::{Pod, Zeroable};

use crate::error::Result;
use crate::graphics_device::{
    Attachment, CommandList, FrameBuffer, FrameBufferDesc, GraphicsDevice, Program, ProgramDesc,
    Rect2D, Texture, TextureDesc, TextureFormat,
};

/// Intermediate target of the horizontal pass
pub struct BlurScratch {
    pub texture: Arc<dyn Texture>,
    pub frame_buffer: Arc<dyn FrameBuffer>,
}

impl BlurScratch {
    pub fn new(
        device: &mut dyn GraphicsDevice,
        name: &str,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Result<Self> {
        let texture = device.create_texture(TextureDesc::render_target(name, width, height, format))?;
        let frame_buffer = device.create_frame_buffer(FrameBufferDesc {
            color_attachments: vec![Attachment::new(&texture)],
            depth_attachment: None,
        })?;
        Ok(Self { texture, frame_buffer })
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct BlurConstants {
    direction: [f32; 2],
    radius: f32,
    layer: f32,
}

pub struct GaussianBlur {
    program: Arc<dyn Program>,
    radius: u32,
}

impl GaussianBlur {
    pub fn new(device: &mut dyn GraphicsDevice, shader_path: &str, name: &str, radius: u32) -> Result<Self> {
        let program = device.create_program(
            ProgramDesc::graphics(name, shader_path, "fullscreen.vert", "gaussian_blur.frag"),
        )?;
        Ok(Self { program, radius: radius.max(1) })
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    /// Blur layer `layer` of `source` into `target`
    ///
    /// The horizontal pass writes `scratch`, the vertical pass reads it
    /// back and writes `target`.
    pub fn blur(
        &self,
        commands: &mut dyn CommandList,
        source: &Arc<dyn Texture>,
        layer: u32,
        scratch: &BlurScratch,
        target: &Arc<dyn FrameBuffer>,
    ) -> Result<()> {
        let area = Rect2D::from_size(target.width(), target.height());
        commands.bind_program(&self.program)?;
        commands.set_viewport(area)?;

        commands.set_frame_buffer(Some(&scratch.frame_buffer))?;
        commands.bind_texture(0, source)?;
        self.push(commands, [1.0 / area.width.max(1) as f32, 0.0], layer as f32)?;
        commands.draw(3, 0)?;

        commands.set_frame_buffer(Some(target))?;
        commands.bind_texture(0, &scratch.texture)?;
        self.push(commands, [0.0, 1.0 / area.height.max(1) as f32], 0.0)?;
        commands.draw(3, 0)
    }

    fn push(&self, commands: &mut dyn CommandList, direction: [f32; 2], layer: f32) -> Result<()> {
        let constants = BlurConstants { direction, radius: self.radius as f32, layer };
        commands.push_constants(bytemuck::bytes_of(&constants))
    }
}
