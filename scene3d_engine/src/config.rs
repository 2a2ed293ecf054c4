/// Scene configuration

use glam::Vec3;

use crate::culling::AABB;
use crate::error::Result;
use crate::engine_bail;
use crate::graphics_device::Rect2D;

/// Settings consumed by `Scene::new`
#[derive(Debug, Clone)]
pub struct SceneConfig {
    /// Initial viewport
    pub viewport: Rect2D,
    /// Initial vertical field of view in degrees
    pub field_of_view: f32,
    /// Directory the device loads shader sources from
    pub shader_path: String,
    /// Bounds of the octree; entities outside live in its overflow list
    pub world_bounds: AABB,
    pub octree_depth: u32,
    pub near_plane: f32,
    pub far_plane: f32,
    /// Far plane used when culling lights
    pub light_cull_distance: f32,
    /// Far plane used when culling particle emitters
    pub particle_cull_distance: f32,
    /// Side of one variance shadow map layer
    pub shadow_map_size: u32,
    /// Layers of the shadow map array
    pub max_shadow_maps: u32,
    /// Size of the GPU light list, terminator included
    pub max_lights: u32,
    /// Side of a light culling tile in pixels
    pub tile_size: u32,
    pub star_count: u32,
    pub star_seed: u64,
    /// Luminance above which pixels feed the bloom
    pub bloom_threshold: f32,
    pub bloom_strength: f32,
    /// Gaussian blur radius in quarter-resolution pixels
    pub bloom_radius: u32,
    /// Enables the ambient occlusion stage
    pub ambient_occlusion: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            viewport: Rect2D::from_size(640, 480),
            field_of_view: 60.0,
            shader_path: "shaders".to_string(),
            world_bounds: AABB::new(Vec3::splat(-10_000.0), Vec3::splat(10_000.0)),
            octree_depth: 6,
            near_plane: 0.1,
            far_plane: 1e10,
            light_cull_distance: 150.0,
            particle_cull_distance: 150.0,
            shadow_map_size: 512,
            max_shadow_maps: 8,
            max_lights: 1024,
            tile_size: 16,
            star_count: 2048,
            star_seed: 0x5ca1ab1e,
            bloom_threshold: 1.0,
            bloom_strength: 0.5,
            bloom_radius: 4,
            ambient_occlusion: false,
        }
    }
}

impl SceneConfig {
    /// Reject settings the renderer cannot work with
    pub fn validate(&self) -> Result<()> {
        const SOURCE: &str = "scene3d::SceneConfig";

        if self.viewport.is_degenerate() {
            engine_bail!(InvalidConfiguration, SOURCE,
                "viewport {}x{} has no area", self.viewport.width, self.viewport.height);
        }
        if !(self.field_of_view > 0.0 && self.field_of_view < 180.0) {
            engine_bail!(InvalidConfiguration, SOURCE,
                "field of view {} must be within (0, 180) degrees", self.field_of_view);
        }
        if !(self.near_plane > 0.0 && self.far_plane > self.near_plane) {
            engine_bail!(InvalidConfiguration, SOURCE,
                "clip planes near {} far {} are invalid", self.near_plane, self.far_plane);
        }
        if !(self.light_cull_distance > self.near_plane && self.particle_cull_distance > self.near_plane) {
            engine_bail!(InvalidConfiguration, SOURCE,
                "cull distances must lie beyond the near plane");
        }
        if self.world_bounds.extents().min_element() <= 0.0 {
            engine_bail!(InvalidConfiguration, SOURCE, "world bounds have no volume");
        }
        if self.shadow_map_size == 0 || !self.shadow_map_size.is_power_of_two() {
            engine_bail!(InvalidConfiguration, SOURCE,
                "shadow map size {} must be a power of two", self.shadow_map_size);
        }
        if self.max_shadow_maps == 0 {
            engine_bail!(InvalidConfiguration, SOURCE, "at least one shadow map layer is required");
        }
        if self.max_lights < 2 {
            engine_bail!(InvalidConfiguration, SOURCE,
                "max_lights {} leaves no room for the list terminator", self.max_lights);
        }
        if self.tile_size == 0 {
            engine_bail!(InvalidConfiguration, SOURCE, "tile size must be positive");
        }
        Ok(())
    }
}
