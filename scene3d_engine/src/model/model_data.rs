/// Imported model description
///
/// Arrives fully parsed from the application's asset importer (through
/// `SceneCache::model_data`). Shared between models via `Arc`.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3};

use crate::culling::AABB;
use crate::error::Result;
use crate::engine_bail;
use crate::scene::LightType;
use super::Track;

// ===== GEOMETRY =====

/// Interleaved vertex as uploaded to the GPU
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub uv: [f32; 2],
    pub bone_weights: [f32; 4],
    pub bone_indices: [u32; 4],
}

impl ModelVertex {
    /// Unskinned vertex
    pub fn new(position: Vec3, normal: Vec3, uv: [f32; 2]) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            tangent: [1.0, 0.0, 0.0],
            uv,
            bone_weights: [0.0; 4],
            bone_indices: [0; 4],
        }
    }
}

/// Index range of a mesh drawn with one material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelDataDrawRange {
    pub material: usize,
    pub start_index: u32,
    pub index_count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelDataMesh {
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    pub draw_ranges: Vec<ModelDataDrawRange>,
}

/// Meshes used up to `max_distance` from the eye
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDataLod {
    pub max_distance: f32,
    pub meshes: Vec<ModelDataMesh>,
}

// ===== MATERIALS =====

#[derive(Debug, Clone, PartialEq)]
pub struct ModelDataTextureMap {
    /// Texture name resolved through the scene cache
    pub texture: Option<String>,
    pub channel: u32,
    /// Texture coordinate transform
    pub uvw: Track<Mat4>,
    pub wrap_repeat: bool,
}

impl Default for ModelDataTextureMap {
    fn default() -> Self {
        Self {
            texture: None,
            channel: 0,
            uvw: Track::constant(Mat4::IDENTITY),
            wrap_repeat: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelDataMaterial {
    pub name: String,
    pub two_sided: bool,
    pub transparent: bool,
    pub alpha_test: bool,
    pub diffuse: Track<Vec3>,
    pub specular: Track<Vec3>,
    pub specular_level: Track<f32>,
    pub glossiness: Track<f32>,
    pub self_illumination: Track<Vec3>,
    pub self_illumination_amount: Track<f32>,
    pub diffuse_map: ModelDataTextureMap,
    pub specular_map: ModelDataTextureMap,
    pub bumpmap_map: ModelDataTextureMap,
    pub self_illumination_map: ModelDataTextureMap,
}

impl Default for ModelDataMaterial {
    fn default() -> Self {
        Self {
            name: String::new(),
            two_sided: false,
            transparent: false,
            alpha_test: false,
            diffuse: Track::constant(Vec3::ONE),
            specular: Track::constant(Vec3::ONE),
            specular_level: Track::constant(0.0),
            glossiness: Track::constant(0.0),
            self_illumination: Track::constant(Vec3::ZERO),
            self_illumination_amount: Track::constant(0.0),
            diffuse_map: ModelDataTextureMap::default(),
            specular_map: ModelDataTextureMap::default(),
            bumpmap_map: ModelDataTextureMap::default(),
            self_illumination_map: ModelDataTextureMap::default(),
        }
    }
}

impl ModelDataMaterial {
    /// The four texture maps in shader slot order
    pub fn maps(&self) -> [&ModelDataTextureMap; 4] {
        [&self.diffuse_map, &self.bumpmap_map, &self.self_illumination_map, &self.specular_map]
    }
}

// ===== SKELETON & ANIMATION =====

#[derive(Debug, Clone, PartialEq)]
pub struct ModelDataBone {
    /// Parent bone; must precede this bone in `ModelData::bones`
    pub parent: Option<usize>,
    pub pivot: Vec3,
    pub position: Track<Vec3>,
    pub orientation: Track<Quat>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelDataAnimation {
    pub name: String,
    /// Length in seconds
    pub length: f32,
    pub looping: bool,
    pub playback_speed: f32,
    /// Distance per second an object playing this animation travels
    pub moving_speed: f32,
    /// Higher values make this variant less likely to be picked
    pub rarity: u32,
}

// ===== LIGHTS =====

/// Light attached to a model; spawned as a scene light per object
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDataLight {
    pub kind: LightType,
    pub casts_shadows: bool,
    pub rectangle_shape: bool,
    pub bone: Option<usize>,
    pub position: Track<Vec3>,
    pub orientation: Track<Quat>,
    pub color: Track<Vec3>,
    pub attenuation_start: Track<f32>,
    pub attenuation_end: Track<f32>,
    /// Spot cone angles in degrees
    pub falloff: Track<f32>,
    pub hotspot: Track<f32>,
    pub ambient_illumination: Track<f32>,
}

// ===== MODEL DATA =====

#[derive(Debug, Clone, PartialEq)]
pub struct ModelData {
    pub name: String,
    /// Local-space bounds of all LODs
    pub aabb: AABB,
    /// Ordered by increasing `max_distance`
    pub lods: Vec<ModelDataLod>,
    pub materials: Vec<ModelDataMaterial>,
    pub bones: Vec<ModelDataBone>,
    pub animations: Vec<ModelDataAnimation>,
    pub lights: Vec<ModelDataLight>,
}

impl ModelData {
    /// Check internal references before anything is uploaded
    pub fn validate(&self) -> Result<()> {
        if self.lods.is_empty() {
            engine_bail!(InvalidResource, "scene3d::ModelData", "model '{}' has no LODs", self.name);
        }

        for (lod_index, lod) in self.lods.iter().enumerate() {
            for (mesh_index, mesh) in lod.meshes.iter().enumerate() {
                for range in &mesh.draw_ranges {
                    if range.material >= self.materials.len() {
                        engine_bail!(InvalidResource, "scene3d::ModelData",
                            "model '{}' lod {} mesh {}: material {} out of range",
                            self.name, lod_index, mesh_index, range.material);
                    }
                    let end = range.start_index as usize + range.index_count as usize;
                    if end > mesh.indices.len() {
                        engine_bail!(InvalidResource, "scene3d::ModelData",
                            "model '{}' lod {} mesh {}: index range ends at {} but mesh has {} indices",
                            self.name, lod_index, mesh_index, end, mesh.indices.len());
                    }
                }
                if let Some(&bad) = mesh.indices.iter().find(|&&i| i as usize >= mesh.vertices.len()) {
                    engine_bail!(InvalidResource, "scene3d::ModelData",
                        "model '{}' lod {} mesh {}: index {} out of range",
                        self.name, lod_index, mesh_index, bad);
                }
            }
        }

        for (bone_index, bone) in self.bones.iter().enumerate() {
            if let Some(parent) = bone.parent {
                if parent >= bone_index {
                    engine_bail!(InvalidResource, "scene3d::ModelData",
                        "model '{}': bone {} has parent {} that does not precede it",
                        self.name, bone_index, parent);
                }
            }
        }

        for light in &self.lights {
            if let Some(bone) = light.bone {
                if bone >= self.bones.len() {
                    engine_bail!(InvalidResource, "scene3d::ModelData",
                        "model '{}': light attached to missing bone {}", self.name, bone);
                }
            }
        }

        Ok(())
    }

    pub fn animation_index(&self, name: &str) -> Option<usize> {
        self.animations.iter().position(|a| a.name == name)
    }

    /// LOD used at `distance` from the eye (last LOD beyond every threshold)
    pub fn lod_for_distance(&self, distance: f32) -> usize {
        self.lods
            .iter()
            .position(|lod| distance <= lod.max_distance)
            .unwrap_or(self.lods.len().saturating_sub(1))
    }
}

// ===== SKINNING =====

impl ModelData {
    /// Object-space transform of every bone for one animation frame
    ///
    /// Bones rotate about their pivot; parents precede children so one
    /// forward pass resolves the hierarchy.
    pub fn bone_transforms(&self, animation: usize, time: f32) -> Vec<Mat4> {
        let mut transforms: Vec<Mat4> = Vec::with_capacity(self.bones.len());
        for bone in &self.bones {
            let position = bone.position.sample(animation, time);
            let orientation = bone.orientation.sample(animation, time);
            let local = Mat4::from_translation(bone.pivot + position)
                * Mat4::from_quat(orientation)
                * Mat4::from_translation(-bone.pivot);
            let world = match bone.parent.and_then(|p| transforms.get(p)) {
                Some(parent) => *parent * local,
                None => local,
            };
            transforms.push(world);
        }
        transforms
    }
}
