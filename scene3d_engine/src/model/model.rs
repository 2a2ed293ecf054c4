/// GPU-resident model and per-frame instance consolidation
///
/// A `Model` owns the vertex and index buffers of one `ModelData`. During a
/// visit every visible object using the model registers an instance; the
/// model then writes all instance vectors into its region of the shared
/// `InstancesBuffer` and emits one draw per (LOD, mesh, material range).

use std::sync::Arc;
use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec4};

use crate::error::Result;
use crate::engine_debug;
use crate::graphics_device::{
    Buffer, BufferDesc, BufferUsage, CommandList, GraphicsDevice, Texture,
};
use crate::scene::ObjectKey;
use super::{MaterialCache, ModelData, ModelDataMaterial, ModelKey, SceneCache};

/// Vectors written for every instance before bones and materials
/// (normal-to-eye 3, object-to-world 4, world-to-eye 4, eye-to-projection 4)
pub const BASE_VECTORS_PER_INSTANCE: usize = 15;

/// Bone transform as a 3x4 row-major matrix
pub const VECTORS_PER_BONE: usize = 3;

/// Self illumination, diffuse and four 3-row texture coordinate transforms
pub const VECTORS_PER_MATERIAL: usize = 14;

/// Animation being played by an object
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AnimationState {
    pub animation: usize,
    pub time: f32,
}

/// One object's contribution to a model's instance list
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelInstance {
    pub object: ObjectKey,
    pub object_to_world: Mat4,
    pub animation: AnimationState,
    /// Assigned by `Model::register_instance`
    pub lod: usize,
}

impl ModelInstance {
    pub fn new(object: ObjectKey, object_to_world: Mat4, animation: AnimationState) -> Self {
        Self { object, object_to_world, animation, lod: 0 }
    }
}

/// Push constants of an instanced model draw
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct ModelDrawConstants {
    /// First vector of instance 0 in the instance buffer
    pub vectors_offset: u32,
    pub vectors_per_instance: u32,
    /// Offset of this draw's material vectors inside an instance
    pub material_vectors: u32,
    pub first_instance: u32,
}

/// Everything needed to issue one instanced draw
pub struct MeshDraw<'a> {
    pub model: ModelKey,
    pub lod: usize,
    pub mesh: usize,
    pub material: &'a ModelDataMaterial,
    pub material_index: usize,
    /// Diffuse, bump, self illumination and specular maps
    pub textures: [Option<Arc<dyn Texture>>; 4],
    pub vertex_buffer: &'a Arc<dyn Buffer>,
    pub index_buffer: &'a Arc<dyn Buffer>,
    pub instance_buffer: Option<&'a Arc<dyn Buffer>>,
    pub first_index: u32,
    pub index_count: u32,
    pub vectors_offset: usize,
    pub vectors_per_instance: usize,
    pub bone_count: usize,
    pub first_instance: u32,
    pub instance_count: u32,
}

impl MeshDraw<'_> {
    pub fn constants(&self) -> ModelDrawConstants {
        ModelDrawConstants {
            vectors_offset: self.vectors_offset as u32,
            vectors_per_instance: self.vectors_per_instance as u32,
            material_vectors: (BASE_VECTORS_PER_INSTANCE
                + self.bone_count * VECTORS_PER_BONE
                + self.material_index * VECTORS_PER_MATERIAL) as u32,
            first_instance: self.first_instance,
        }
    }

    pub fn triangle_count(&self) -> u64 {
        (self.index_count / 3) as u64 * self.instance_count as u64
    }

    /// Bind the instance buffer and push constants, then draw
    pub fn record(&self, commands: &mut dyn CommandList) -> Result<()> {
        commands.bind_buffer(0, self.vertex_buffer)?;
        commands.bind_buffer(1, self.index_buffer)?;
        if let Some(instances) = self.instance_buffer {
            commands.bind_buffer(2, instances)?;
        }
        for (slot, texture) in self.textures.iter().enumerate() {
            if let Some(texture) = texture {
                commands.bind_texture(slot as u32, texture)?;
            }
        }
        let constants = self.constants();
        commands.push_constants(bytemuck::bytes_of(&constants))?;
        commands.draw_indexed_instanced(self.index_count, self.first_index, self.instance_count, self.first_instance)
    }
}

/// Receives the consolidated draws of a visit
pub trait ModelMeshVisitor {
    /// Record `draw`; return `false` when this visitor skips it (for
    /// instance, a depth pass skipping transparent materials)
    fn render(&mut self, commands: &mut dyn CommandList, draw: &MeshDraw) -> Result<bool>;
}

struct GpuMesh {
    vertex_buffer: Arc<dyn Buffer>,
    index_buffer: Arc<dyn Buffer>,
}

pub struct Model {
    key: ModelKey,
    data: Arc<ModelData>,
    lods: Vec<Vec<GpuMesh>>,
    instances: Vec<ModelInstance>,
    epoch: Option<u64>,
    /// Instance range of each LOD after `prepare()`
    lod_ranges: Vec<(usize, usize)>,
    vectors_offset: usize,
    drawn_frame: Option<u64>,
}

impl Model {
    /// Upload the meshes of `data` and load its material textures
    ///
    /// The key stays null until the model is inserted into a `ModelCache`.
    pub fn new(
        device: &mut dyn GraphicsDevice,
        data: Arc<ModelData>,
        materials: &mut MaterialCache,
        cache: &mut dyn SceneCache,
    ) -> Result<Self> {
        data.validate()?;

        let mut lods = Vec::with_capacity(data.lods.len());
        for (lod_index, lod) in data.lods.iter().enumerate() {
            let mut meshes = Vec::with_capacity(lod.meshes.len());
            for (mesh_index, mesh) in lod.meshes.iter().enumerate() {
                let vertex_bytes: &[u8] = bytemuck::cast_slice(&mesh.vertices);
                let vertex_buffer = device.create_buffer(BufferDesc {
                    name: format!("{}_lod{}_mesh{}_vertices", data.name, lod_index, mesh_index),
                    size: vertex_bytes.len() as u64,
                    usage: BufferUsage::Vertex,
                })?;
                vertex_buffer.update(0, vertex_bytes)?;

                let index_bytes: &[u8] = bytemuck::cast_slice(&mesh.indices);
                let index_buffer = device.create_buffer(BufferDesc {
                    name: format!("{}_lod{}_mesh{}_indices", data.name, lod_index, mesh_index),
                    size: index_bytes.len() as u64,
                    usage: BufferUsage::Index,
                })?;
                index_buffer.update(0, index_bytes)?;

                meshes.push(GpuMesh { vertex_buffer, index_buffer });
            }
            lods.push(meshes);
        }

        for material in &data.materials {
            for (slot, map) in material.maps().iter().enumerate() {
                if let Some(name) = &map.texture {
                    // Slot 1 holds normals
                    materials.get_or_load(device, cache, name, slot == 1)?;
                }
            }
        }

        engine_debug!("scene3d::Model", "Model '{}' uploaded ({} LODs, {} materials, {} bones)",
            data.name, data.lods.len(), data.materials.len(), data.bones.len());

        let lod_count = data.lods.len();
        Ok(Self {
            key: ModelKey::default(),
            data,
            lods,
            instances: Vec::new(),
            epoch: None,
            lod_ranges: vec![(0, 0); lod_count],
            vectors_offset: 0,
            drawn_frame: None,
        })
    }

    pub fn key(&self) -> ModelKey {
        self.key
    }

    pub(super) fn set_key(&mut self, key: ModelKey) {
        self.key = key;
    }

    pub fn data(&self) -> &Arc<ModelData> {
        &self.data
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// Vectors written per instance
    pub fn vectors_per_instance(&self) -> usize {
        BASE_VECTORS_PER_INSTANCE
            + self.data.bones.len() * VECTORS_PER_BONE
            + self.data.materials.len() * VECTORS_PER_MATERIAL
    }

    /// Add an instance for visit `epoch`
    ///
    /// The first registration of an epoch discards the previous epoch's
    /// instances and returns `true`: the caller appends the model to its
    /// draw list exactly then.
    pub fn register_instance(&mut self, epoch: u64, mut instance: ModelInstance, eye_distance: f32) -> bool {
        instance.lod = self.data.lod_for_distance(eye_distance);
        let first = self.epoch != Some(epoch);
        if first {
            self.instances.clear();
            self.epoch = Some(epoch);
        }
        self.instances.push(instance);
        first
    }

    /// Instances registered in the current epoch
    pub fn instances(&self) -> &[ModelInstance] {
        &self.instances
    }

    pub fn epoch(&self) -> Option<u64> {
        self.epoch
    }

    /// Record a draw in render `frame`; true the first time per frame
    pub fn mark_drawn(&mut self, frame: u64) -> bool {
        let first = self.drawn_frame != Some(frame);
        self.drawn_frame = Some(frame);
        first
    }

    /// Group instances by LOD so each LOD's instances are contiguous
    pub fn prepare(&mut self) {
        self.instances.sort_by_key(|instance| instance.lod);
        for range in &mut self.lod_ranges {
            *range = (0, 0);
        }
        let mut start = 0;
        for (lod, range) in self.lod_ranges.iter_mut().enumerate() {
            let count = self.instances[start..].iter().take_while(|i| i.lod == lod).count();
            *range = (start, count);
            start += count;
        }
        debug_assert_eq!(start, self.instances.len());
    }

    pub fn set_vectors_offset(&mut self, offset: usize) {
        self.vectors_offset = offset;
    }

    pub fn vectors_offset(&self) -> usize {
        self.vectors_offset
    }

    /// Instance range (first, count) of `lod` after `prepare()`
    pub fn lod_range(&self, lod: usize) -> (usize, usize) {
        self.lod_ranges.get(lod).copied().unwrap_or((0, 0))
    }

    /// Write every instance's vectors into `region`
    /// (`instances().len() * vectors_per_instance()` vectors)
    pub fn upload(&self, region: &mut [Vec4], world_to_eye: &Mat4, eye_to_projection: &Mat4) {
        let stride = self.vectors_per_instance();
        debug_assert!(region.len() >= self.instances.len() * stride);

        for (instance, out) in self.instances.iter().zip(region.chunks_exact_mut(stride)) {
            let object_to_eye = *world_to_eye * instance.object_to_world;
            let normal_to_eye = Mat3::from_mat4(object_to_eye).inverse().transpose();

            out[0] = normal_to_eye.x_axis.extend(0.0);
            out[1] = normal_to_eye.y_axis.extend(0.0);
            out[2] = normal_to_eye.z_axis.extend(0.0);
            write_mat4(&mut out[3..7], &instance.object_to_world);
            write_mat4(&mut out[7..11], world_to_eye);
            write_mat4(&mut out[11..15], eye_to_projection);

            let AnimationState { animation, time } = instance.animation;
            let mut cursor = BASE_VECTORS_PER_INSTANCE;

            for bone in self.data.bone_transforms(animation, time) {
                for row in 0..3 {
                    out[cursor + row] = bone.row(row);
                }
                cursor += VECTORS_PER_BONE;
            }

            for material in &self.data.materials {
                let self_illumination = material.self_illumination.sample(animation, time);
                let amount = material.self_illumination_amount.sample(animation, time);
                let diffuse = material.diffuse.sample(animation, time);
                let specular_level = material.specular_level.sample(animation, time);
                out[cursor] = self_illumination.extend(amount);
                out[cursor + 1] = diffuse.extend(specular_level);
                for (map_index, map) in material.maps().iter().enumerate() {
                    let uvw = map.uvw.sample(animation, time);
                    for row in 0..3 {
                        out[cursor + 2 + map_index * 3 + row] = uvw.row(row);
                    }
                }
                cursor += VECTORS_PER_MATERIAL;
            }
        }
    }

    /// Call `f` once per (LOD, mesh, material range) that has instances
    pub fn for_each_draw<F>(
        &self,
        materials: &MaterialCache,
        instance_buffer: Option<&Arc<dyn Buffer>>,
        mut f: F,
    ) -> Result<()>
    where
        F: FnMut(&MeshDraw) -> Result<()>,
    {
        let vectors_per_instance = self.vectors_per_instance();
        for (lod_index, lod) in self.data.lods.iter().enumerate() {
            let (first_instance, instance_count) = self.lod_range(lod_index);
            if instance_count == 0 {
                continue;
            }
            for (mesh_index, mesh) in lod.meshes.iter().enumerate() {
                let gpu = &self.lods[lod_index][mesh_index];
                for range in &mesh.draw_ranges {
                    let material = &self.data.materials[range.material];
                    let textures = material
                        .maps()
                        .map(|map| map.texture.as_deref().and_then(|name| materials.texture(name)));
                    let draw = MeshDraw {
                        model: self.key,
                        lod: lod_index,
                        mesh: mesh_index,
                        material,
                        material_index: range.material,
                        textures,
                        vertex_buffer: &gpu.vertex_buffer,
                        index_buffer: &gpu.index_buffer,
                        instance_buffer,
                        first_index: range.start_index,
                        index_count: range.index_count,
                        vectors_offset: self.vectors_offset,
                        vectors_per_instance,
                        bone_count: self.data.bones.len(),
                        first_instance: first_instance as u32,
                        instance_count: instance_count as u32,
                    };
                    f(&draw)?;
                }
            }
        }
        Ok(())
    }
}

fn write_mat4(out: &mut [Vec4], matrix: &Mat4) {
    out[0] = matrix.x_axis;
    out[1] = matrix.y_axis;
    out[2] = matrix.z_axis;
    out[3] = matrix.w_axis;
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
