/// Lighting stage: tiled deferred shading into the final color target
///
/// Visible omni and spot lights go to the GPU as one list ending with a
/// zeroed entry. Three compute passes follow: per-tile depth bounds, per-tile
/// light culling, then per-tile shading. Suns and ambient lights are not in
/// the list; they reach the shader through push constants.

use std::sync::Arc;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

use crate::binding::{BindingGraph, InputSlot, OutputSlot, TextureRef};
use crate::config::SceneConfig;
use crate::error::Result;
use crate::{engine_debug, engine_warn};
use crate::graphics_device::{
    Buffer, BufferDesc, BufferUsage, GraphicsDevice, Program, ProgramDesc, Texture, TextureDesc,
    TextureFormat, TextureUsage,
};
use crate::scene::{FrameContext, LightKey, LightType, SceneLight, SceneWorld};
use super::render_stage::{CameraInputs, RenderStage};
use super::shadow_map_stage::ShadowAssignment;
use super::slots;

const NAME: &str = "lighting";

/// Tiles handled by one workgroup of the tile culling pass
const CULL_GROUP_SIZE: u32 = 16;

/// Light indices a tile can hold
const TILE_LIGHT_CAPACITY: u64 = 256;

/// Smallest light buffer, in lights
const MIN_LIGHT_CAPACITY: usize = 64;

/// Light as laid out in the GPU light list
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuLight {
    /// Position in eye space, w = shadow map layer or -1
    pub position_in_eye: [f32; 4],
    /// Color, w = ambient illumination
    pub color: [f32; 4],
    /// Squared radius, attenuation start, 1 / attenuation span, (hotspot / falloff)^2
    pub range: [f32; 4],
    /// Rows x, y and w of the eye-to-shadow projection
    pub eye_to_shadow: [[f32; 4]; 3],
    /// Direction in eye space, w = 0 omni, 1 spot, 2 rectangular spot
    pub spot: [f32; 4],
}

impl GpuLight {
    fn new(light: &SceneLight, world_to_eye: &Mat4, shadow: Option<&ShadowAssignment>) -> Self {
        let eye_to_world = world_to_eye.inverse();
        let position = world_to_eye.transform_point3(light.position);
        let direction = world_to_eye.transform_vector3(light.direction()).normalize_or_zero();

        let mut radius = light.attenuation_end;
        if light.rectangle_shape {
            radius *= std::f32::consts::SQRT_2;
        }
        let span = light.attenuation_end - light.attenuation_start;
        let inverse_span = if span > 0.0 { 1.0 / span } else { 1e-6 };
        let cone = if light.falloff > 0.0 { light.hotspot / light.falloff } else { 1.0 };

        let kind = match (light.kind, light.rectangle_shape) {
            (LightType::Spot, true) => 2.0,
            (LightType::Spot, false) => 1.0,
            _ => 0.0,
        };

        let (layer, eye_to_shadow) = match shadow {
            Some(shadow) => {
                let m = shadow.world_to_shadow * eye_to_world;
                (shadow.layer as f32, [m.row(0).to_array(), m.row(1).to_array(), m.row(3).to_array()])
            }
            None => (-1.0, [[0.0; 4]; 3]),
        };

        Self {
            position_in_eye: position.extend(layer).to_array(),
            color: light.color.extend(light.ambient_illumination).to_array(),
            range: [radius * radius, light.attenuation_start, inverse_span, cone * cone],
            eye_to_shadow,
            spot: direction.extend(kind).to_array(),
        }
    }

    fn shadow_layer(&self) -> Option<u32> {
        (self.position_in_eye[3] >= 0.0).then_some(self.position_in_eye[3] as u32)
    }

    fn kind(&self) -> u32 {
        self.spot[3] as u32
    }
}

/// Build the GPU light list from the visible lights
///
/// Only omni and spot light casters are kept, at most `max_lights - 1`.
/// Unshadowed lights come first, then shadowed ones, each group ordered by
/// type. The list always ends with a zeroed entry.
pub fn build_light_list(
    lights: &[(LightKey, SceneLight)],
    world_to_eye: &Mat4,
    shadows: &[ShadowAssignment],
    max_lights: u32,
) -> Vec<GpuLight> {
    let capacity = max_lights.saturating_sub(1) as usize;
    let mut list: Vec<GpuLight> = lights
        .iter()
        .filter(|(_, light)| light.light_caster && matches!(light.kind, LightType::Omni | LightType::Spot))
        .take(capacity)
        .map(|(key, light)| {
            let shadow = shadows.iter().find(|s| s.light == *key);
            GpuLight::new(light, world_to_eye, shadow)
        })
        .collect();
    list.sort_by_key(|light| (light.shadow_layer().is_some(), light.kind()));
    list.push(GpuLight::zeroed());
    list
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct LightingConstants {
    /// Sun direction in eye space, w = 1 when a sun is present
    sun_direction: [f32; 4],
    sun_color: [f32; 4],
    ambient_color: [f32; 4],
    /// tiles x, tiles y, light count, tile size
    tiles: [u32; 4],
}

/// Tile grid covering `width` x `height`
fn tile_counts(width: u32, height: u32, tile_size: u32) -> (u32, u32) {
    (width.div_ceil(tile_size), height.div_ceil(tile_size))
}

struct LightingTargets {
    final_color: Arc<dyn Texture>,
    tile_depth: Arc<dyn Buffer>,
    tile_lights: Arc<dyn Buffer>,
    tiles: (u32, u32),
}

pub struct LightingStage {
    camera: CameraInputs,
    diffuse_color: InputSlot<TextureRef>,
    specular_color: InputSlot<TextureRef>,
    specular_level: InputSlot<TextureRef>,
    self_illumination: InputSlot<TextureRef>,
    normal_z: InputSlot<TextureRef>,
    z_buffer: InputSlot<TextureRef>,
    shadow_maps: InputSlot<TextureRef>,
    shadow_assignments: InputSlot<Vec<ShadowAssignment>>,
    final_color: OutputSlot<TextureRef>,
    targets: Option<LightingTargets>,
    lights: Option<Arc<dyn Buffer>>,
    light_capacity: usize,
    zminmax_program: Arc<dyn Program>,
    cull_program: Arc<dyn Program>,
    render_program: Arc<dyn Program>,
    near_plane: f32,
    light_cull_distance: f32,
    max_lights: u32,
    tile_size: u32,
}

impl LightingStage {
    pub fn new(device: &mut dyn GraphicsDevice, graph: &mut BindingGraph, config: &SceneConfig) -> Result<Self> {
        let shader_path = &config.shader_path;
        Ok(Self {
            camera: CameraInputs::bind(graph, NAME)?,
            diffuse_color: graph.input(NAME, slots::DIFFUSE_COLOR)?,
            specular_color: graph.input(NAME, slots::SPECULAR_COLOR)?,
            specular_level: graph.input(NAME, slots::SPECULAR_LEVEL)?,
            self_illumination: graph.input(NAME, slots::SELF_ILLUMINATION)?,
            normal_z: graph.input(NAME, slots::NORMAL_Z)?,
            z_buffer: graph.input(NAME, slots::Z_BUFFER)?,
            shadow_maps: graph.input(NAME, slots::SHADOW_MAPS)?,
            shadow_assignments: graph.input(NAME, slots::SHADOW_ASSIGNMENTS)?,
            final_color: graph.output(NAME, slots::FINAL_COLOR, TextureRef::none())?,
            targets: None,
            lights: None,
            light_capacity: 0,
            zminmax_program: device.create_program(
                ProgramDesc::compute("lighting_zminmax", shader_path, "tile_zminmax.comp"),
            )?,
            cull_program: device.create_program(
                ProgramDesc::compute("lighting_cull_tiles", shader_path, "tile_cull.comp"),
            )?,
            render_program: device.create_program(
                ProgramDesc::compute("lighting_render_tiles", shader_path, "tile_render.comp"),
            )?,
            near_plane: config.near_plane,
            light_cull_distance: config.light_cull_distance,
            max_lights: config.max_lights,
            tile_size: config.tile_size,
        })
    }

    fn allocate(&mut self, device: &mut dyn GraphicsDevice, width: u32, height: u32) -> Result<()> {
        engine_debug!("scene3d::LightingStage", "Allocating final color {}x{}", width, height);

        let mut desc = TextureDesc::render_target("final_color", width, height, TextureFormat::R32G32B32A32_SFLOAT);
        desc.usage |= TextureUsage::STORAGE;
        let final_color = device.create_texture(desc)?;

        let tiles = tile_counts(width, height, self.tile_size);
        let tile_count = tiles.0 as u64 * tiles.1 as u64;
        let tile_depth = device.create_buffer(BufferDesc {
            name: "lighting_tile_depth".to_string(),
            size: tile_count * 8,
            usage: BufferUsage::Storage,
        })?;
        let tile_lights = device.create_buffer(BufferDesc {
            name: "lighting_tile_lights".to_string(),
            size: tile_count * TILE_LIGHT_CAPACITY * 4,
            usage: BufferUsage::Storage,
        })?;

        self.final_color.set(TextureRef::new(final_color.clone()));
        self.targets = Some(LightingTargets { final_color, tile_depth, tile_lights, tiles });
        Ok(())
    }

    /// Upload `list`, growing the light buffer to the next power of two
    fn upload_lights(&mut self, device: &mut dyn GraphicsDevice, list: &[GpuLight]) -> Result<Arc<dyn Buffer>> {
        let buffer = match &self.lights {
            Some(buffer) if list.len() <= self.light_capacity => buffer.clone(),
            _ => {
                let capacity = list.len().next_power_of_two().max(MIN_LIGHT_CAPACITY);
                let buffer = device.create_buffer(BufferDesc {
                    name: "lights".to_string(),
                    size: (capacity * std::mem::size_of::<GpuLight>()) as u64,
                    usage: BufferUsage::Storage,
                })?;
                self.lights = Some(buffer.clone());
                self.light_capacity = capacity;
                buffer
            }
        };
        buffer.update(0, bytemuck::cast_slice(list))?;
        Ok(buffer)
    }
}

impl RenderStage for LightingStage {
    fn name(&self) -> &str {
        NAME
    }

    fn run(&mut self, ctx: &mut FrameContext, world: &mut SceneWorld) -> Result<()> {
        if self.camera.viewport.get().is_degenerate() {
            return Ok(());
        }

        let gbuffer_changed = self.diffuse_color.changed() | self.z_buffer.changed();
        let diffuse = self.diffuse_color.get();
        if diffuse.is_none() {
            return Ok(());
        }
        if self.targets.is_none() || gbuffer_changed {
            let (width, height) = diffuse.size();
            self.allocate(ctx.device, width, height)?;
        }

        // Gather lights
        let view = self.camera.view(self.near_plane, self.light_cull_distance);
        let mut visible: Vec<(LightKey, SceneLight)> = Vec::new();
        let mut sun: Option<(Vec3, Vec3)> = None;
        let mut ambient = Vec3::ZERO;
        world.visit_lights(&view.frustum, |key, light| {
            match light.kind {
                LightType::Omni | LightType::Spot => visible.push((key, light.clone())),
                LightType::Sun => {
                    if sun.is_none() {
                        sun = Some((light.direction(), light.color));
                    }
                    ambient += light.color * light.ambient_illumination;
                }
                LightType::Ambient => ambient += light.color,
            }
            Ok(())
        })?;

        let shadows = self.shadow_assignments.get();
        let list = build_light_list(&visible, &view.world_to_eye, &shadows, self.max_lights);
        if visible.len() + 1 > self.max_lights as usize {
            engine_warn!("scene3d::LightingStage", "{} visible lights, only {} are shaded",
                visible.len(), list.len() - 1);
        }
        let light_buffer = self.upload_lights(ctx.device, &list)?;

        let Some(targets) = &self.targets else { return Ok(()) };
        let (tiles_x, tiles_y) = targets.tiles;
        let (sun_direction, sun_color) = match sun {
            Some((direction, color)) => (
                view.world_to_eye.transform_vector3(direction).normalize_or_zero().extend(1.0),
                color.extend(1.0),
            ),
            None => (Vec4::ZERO, Vec4::ZERO),
        };
        let constants = LightingConstants {
            sun_direction: sun_direction.to_array(),
            sun_color: sun_color.to_array(),
            ambient_color: ambient.extend(1.0).to_array(),
            tiles: [tiles_x, tiles_y, (list.len() - 1) as u32, self.tile_size],
        };

        let inputs = [
            self.diffuse_color.get(),
            self.specular_color.get(),
            self.specular_level.get(),
            self.self_illumination.get(),
            self.normal_z.get(),
            self.z_buffer.get(),
            self.shadow_maps.get(),
        ];

        let commands = &mut *ctx.commands;
        commands.bind_buffer(0, &light_buffer)?;
        commands.bind_buffer(1, &targets.tile_depth)?;
        commands.bind_buffer(2, &targets.tile_lights)?;
        for (slot, input) in inputs.iter().enumerate() {
            if let Some(texture) = input.get() {
                commands.bind_texture(slot as u32, texture)?;
            }
        }
        commands.bind_texture(inputs.len() as u32, &targets.final_color)?;
        commands.push_constants(bytemuck::bytes_of(&constants))?;

        commands.bind_program(&self.zminmax_program)?;
        commands.dispatch(tiles_x, tiles_y, 1)?;

        commands.bind_program(&self.cull_program)?;
        commands.dispatch((tiles_x * tiles_y).div_ceil(CULL_GROUP_SIZE), 1, 1)?;

        commands.bind_program(&self.render_program)?;
        commands.dispatch(tiles_x, tiles_y, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;
    use slotmap::SlotMap;

    fn keyed(lights: Vec<SceneLight>) -> Vec<(LightKey, SceneLight)> {
        let mut arena: SlotMap<LightKey, ()> = SlotMap::with_key();
        lights.into_iter().map(|light| (arena.insert(()), light)).collect()
    }

    #[test]
    fn test_list_ends_with_terminator() {
        let lights = keyed(vec![SceneLight::omni(Vec3::ZERO, Vec3::ONE, 10.0)]);
        let list = build_light_list(&lights, &Mat4::IDENTITY, &[], 1024);
        assert_eq!(list.len(), 2);
        assert_eq!(list[1], GpuLight::zeroed());
        assert_eq!(list[0].range[0], 100.0);
    }

    #[test]
    fn test_list_is_capped() {
        let lights = keyed((0..10).map(|i| SceneLight::omni(Vec3::splat(i as f32), Vec3::ONE, 1.0)).collect());
        let list = build_light_list(&lights, &Mat4::IDENTITY, &[], 4);
        assert_eq!(list.len(), 4);
        assert_eq!(*list.last().unwrap(), GpuLight::zeroed());
    }

    #[test]
    fn test_list_skips_suns_and_non_casters() {
        let mut dark = SceneLight::omni(Vec3::ZERO, Vec3::ONE, 5.0);
        dark.light_caster = false;
        let lights = keyed(vec![
            SceneLight::sun(Quat::IDENTITY, Vec3::ONE),
            SceneLight::ambient(Vec3::ONE),
            dark,
        ]);
        let list = build_light_list(&lights, &Mat4::IDENTITY, &[], 16);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_shadowed_lights_sort_last_then_by_type() {
        let lights = keyed(vec![
            SceneLight::spot(Vec3::ZERO, Quat::IDENTITY, Vec3::ONE, 10.0, 40.0),
            SceneLight::spot(Vec3::X, Quat::IDENTITY, Vec3::ONE, 10.0, 40.0),
            SceneLight::omni(Vec3::Y, Vec3::ONE, 10.0),
        ]);
        let shadows = [ShadowAssignment { light: lights[0].0, layer: 3, world_to_shadow: Mat4::IDENTITY }];
        let list = build_light_list(&lights, &Mat4::IDENTITY, &shadows, 16);

        assert_eq!(list[0].kind(), 0);
        assert_eq!(list[1].kind(), 1);
        assert_eq!(list[1].shadow_layer(), None);
        assert_eq!(list[2].shadow_layer(), Some(3));
        assert_eq!(list[2].position_in_eye[..3], [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_rectangle_spot_extends_radius() {
        let mut light = SceneLight::spot(Vec3::ZERO, Quat::IDENTITY, Vec3::ONE, 2.0, 40.0);
        light.rectangle_shape = true;
        let list = build_light_list(&keyed(vec![light]), &Mat4::IDENTITY, &[], 16);
        assert_eq!(list[0].kind(), 2);
        assert!((list[0].range[0] - 8.0).abs() < 1e-4);
    }

    #[test]
    fn test_light_position_in_eye_space() {
        let world_to_eye = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        let lights = keyed(vec![SceneLight::omni(Vec3::new(0.0, 0.0, 10.0), Vec3::ONE, 1.0)]);
        let list = build_light_list(&lights, &world_to_eye, &[], 16);
        assert_eq!(list[0].position_in_eye, [0.0, 0.0, 5.0, -1.0]);
    }

    #[test]
    fn test_tile_counts_round_up() {
        assert_eq!(tile_counts(640, 480, 16), (40, 30));
        assert_eq!(tile_counts(641, 1, 16), (41, 1));
    }
}
