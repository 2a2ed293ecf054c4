/// Shadow map stage: variance shadow maps for visible shadow-casting spots
///
/// Every map is a layer of one texture array. Layers are handed out by a
/// bounded allocator: a light keeps its layer while it stays visible and
/// gives it back once it leaves the light cull range.

use std::sync::Arc;
use glam::Mat4;

use crate::binding::{BindingGraph, OutputSlot, TextureRef};
use crate::config::SceneConfig;
use crate::error::Result;
use crate::{engine_debug, engine_warn};
use crate::graphics_device::{
    Attachment, BlendMode, ClearValue, CommandList, DepthMode, FrameBuffer, FrameBufferDesc,
    GraphicsDevice, Program, ProgramDesc, Rect2D, Texture, TextureDesc, TextureFormat,
    TextureUsage,
};
use crate::model::{MeshDraw, ModelMeshVisitor};
use crate::scene::{FrameContext, LightKey, LightType, SceneLight, SceneWorld, ViewParams};
use super::gaussian_blur::{BlurScratch, GaussianBlur};
use super::render_stage::{CameraInputs, RenderStage};
use super::slots;

const NAME: &str = "shadow_map";

/// Near plane of a light's shadow projection
const SHADOW_NEAR: f32 = 0.1;

/// A shadow map layer given to a light this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowAssignment {
    pub light: LightKey,
    pub layer: u32,
    pub world_to_shadow: Mat4,
}

/// Point of view of a spot light
pub fn spot_view(light: &SceneLight) -> ViewParams {
    let world_to_light = Mat4::from_quat(light.orientation.inverse()) * Mat4::from_translation(-light.position);
    let fov = light.falloff.clamp(1.0, 170.0).to_radians();
    let far = light.attenuation_end.max(SHADOW_NEAR * 2.0);
    ViewParams::new(world_to_light, Mat4::perspective_lh(fov, 1.0, SHADOW_NEAR, far))
}

/// Bounded layer allocator
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LayerAllocator {
    layers: Vec<Option<LightKey>>,
}

impl LayerAllocator {
    pub fn new(count: u32) -> Self {
        Self { layers: vec![None; count as usize] }
    }

    /// Keep the layers of `visible` lights, free the rest, then give free
    /// layers to newcomers in order. Returns (light, layer) pairs.
    pub fn assign(&mut self, visible: &[LightKey]) -> Vec<(LightKey, u32)> {
        for layer in &mut self.layers {
            if layer.is_some_and(|light| !visible.contains(&light)) {
                *layer = None;
            }
        }
        let mut assigned = Vec::new();
        for &light in visible {
            let existing = self.layers.iter().position(|l| *l == Some(light));
            let layer = existing.or_else(|| {
                let free = self.layers.iter().position(Option::is_none)?;
                self.layers[free] = Some(light);
                Some(free)
            });
            if let Some(layer) = layer {
                assigned.push((light, layer as u32));
            }
        }
        assigned
    }

    pub fn used(&self) -> usize {
        self.layers.iter().filter(|l| l.is_some()).count()
    }
}

struct ShadowVisitor {
    program: Arc<dyn Program>,
}

impl ModelMeshVisitor for ShadowVisitor {
    fn render(&mut self, commands: &mut dyn CommandList, draw: &MeshDraw) -> Result<bool> {
        if draw.material.transparent {
            return Ok(false);
        }
        commands.bind_program(&self.program)?;
        draw.record(commands)?;
        Ok(true)
    }
}

struct ShadowTargets {
    maps: Arc<dyn Texture>,
    layer_frame_buffers: Vec<Arc<dyn FrameBuffer>>,
    scratch: BlurScratch,
}

pub struct ShadowMapStage {
    camera: CameraInputs,
    shadow_maps: OutputSlot<TextureRef>,
    assignments: OutputSlot<Vec<ShadowAssignment>>,
    allocator: LayerAllocator,
    targets: Option<ShadowTargets>,
    visitor: ShadowVisitor,
    blur: GaussianBlur,
    map_size: u32,
    layer_count: u32,
    near_plane: f32,
    light_cull_distance: f32,
}

impl ShadowMapStage {
    pub fn new(device: &mut dyn GraphicsDevice, graph: &mut BindingGraph, config: &SceneConfig) -> Result<Self> {
        Ok(Self {
            camera: CameraInputs::bind(graph, NAME)?,
            shadow_maps: graph.output(NAME, slots::SHADOW_MAPS, TextureRef::none())?,
            assignments: graph.output(NAME, slots::SHADOW_ASSIGNMENTS, Vec::new())?,
            allocator: LayerAllocator::new(config.max_shadow_maps),
            targets: None,
            visitor: ShadowVisitor {
                program: device.create_program(
                    ProgramDesc::graphics("shadow_depth", &config.shader_path, "shadow.vert", "shadow.frag"),
                )?,
            },
            blur: GaussianBlur::new(device, &config.shader_path, "shadow_blur", 2)?,
            map_size: config.shadow_map_size,
            layer_count: config.max_shadow_maps,
            near_plane: config.near_plane,
            light_cull_distance: config.light_cull_distance,
        })
    }

    fn allocate(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        engine_debug!("scene3d::ShadowMapStage", "Allocating {} shadow maps of {}x{}",
            self.layer_count, self.map_size, self.map_size);

        let maps = device.create_texture(TextureDesc {
            name: "shadow_maps".to_string(),
            width: self.map_size,
            height: self.map_size,
            array_layers: self.layer_count,
            format: TextureFormat::R32G32_SFLOAT,
            usage: TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
            data: None,
        })?;
        let depth = device.create_texture(TextureDesc::render_target(
            "shadow_depth", self.map_size, self.map_size, TextureFormat::D32_FLOAT,
        ))?;

        let mut layer_frame_buffers = Vec::with_capacity(self.layer_count as usize);
        for layer in 0..self.layer_count {
            layer_frame_buffers.push(device.create_frame_buffer(FrameBufferDesc {
                color_attachments: vec![Attachment::layer(&maps, layer)],
                depth_attachment: Some(Attachment::new(&depth)),
            })?);
        }
        let scratch = BlurScratch::new(device, "shadow_blur_scratch", self.map_size, self.map_size, TextureFormat::R32G32_SFLOAT)?;

        self.shadow_maps.set(TextureRef::new(maps.clone()));
        self.targets = Some(ShadowTargets { maps, layer_frame_buffers, scratch });
        Ok(())
    }
}

impl RenderStage for ShadowMapStage {
    fn name(&self) -> &str {
        NAME
    }

    fn run(&mut self, ctx: &mut FrameContext, world: &mut SceneWorld) -> Result<()> {
        if self.camera.viewport.get().is_degenerate() {
            return Ok(());
        }

        // Visible shadow-casting spots, nearest first
        let camera = self.camera.view(self.near_plane, self.light_cull_distance);
        let mut casters: Vec<(LightKey, SceneLight, f32)> = Vec::new();
        world.visit_lights(&camera.frustum, |key, light| {
            if light.kind == LightType::Spot && light.casts_shadows && light.light_caster {
                casters.push((key, light.clone(), light.position.distance_squared(camera.eye)));
            }
            Ok(())
        })?;
        casters.sort_by(|a, b| a.2.total_cmp(&b.2));

        let visible: Vec<LightKey> = casters.iter().map(|(key, _, _)| *key).collect();
        let assigned = self.allocator.assign(&visible);
        if assigned.len() < casters.len() {
            engine_warn!("scene3d::ShadowMapStage", "{} shadow casters exceed {} shadow maps",
                casters.len(), self.layer_count);
        }
        if assigned.is_empty() {
            self.assignments.set(Vec::new());
            return Ok(());
        }
        if self.targets.is_none() {
            self.allocate(ctx.device)?;
        }
        let Some(targets) = &self.targets else { return Ok(()) };

        let mut assignments = Vec::with_capacity(assigned.len());
        for (light_key, layer) in assigned {
            let Some((_, light, _)) = casters.iter().find(|(key, _, _)| *key == light_key) else { continue };
            let view = spot_view(light);
            let frame_buffer = &targets.layer_frame_buffers[layer as usize];

            let commands = &mut *ctx.commands;
            commands.set_frame_buffer(Some(frame_buffer))?;
            commands.set_viewport(Rect2D::from_size(self.map_size, self.map_size))?;
            commands.clear(&[
                ClearValue::Color([1.0, 1.0, 0.0, 0.0]),
                ClearValue::DepthStencil { depth: 1.0, stencil: 0 },
            ])?;
            commands.set_blend_mode(BlendMode::Opaque)?;
            commands.set_depth_mode(DepthMode::TestAndWrite)?;
            world.visit(ctx, &view, &mut self.visitor)?;

            ctx.commands.set_depth_mode(DepthMode::Disabled)?;
            self.blur.blur(&mut *ctx.commands, &targets.maps, layer, &targets.scratch, frame_buffer)?;

            assignments.push(ShadowAssignment { light: light_key, layer, world_to_shadow: view.world_to_projection() });
        }
        self.assignments.set(assignments);
        Ok(())
    }
}
