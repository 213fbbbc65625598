//! Per-frame instance pools
//!
//! Two GPU-visible scratch buffers are shared by every mesh in the scene:
//! the transform pool (two 4x4 matrices per slot) and the material-index
//! pool (one index per slot). They are sized once at load from the largest
//! per-mesh instance count in the snapshot and rewritten in place every
//! frame; they are never reallocated mid-session. The batcher is the single
//! writer per frame.

use crate::backend::traits::*;
use crate::backend::types::{BufferDescriptor, BufferUsage, InstanceTransforms};
use crate::error::RenderResult;
use crate::scene::{Instance, MeshData};
use std::collections::HashMap;

/// Highest number of instances any single mesh has in the load-time
/// snapshot. Every mesh's per-frame writes must fit in this many slots.
pub fn compute_pool_capacity(meshes: &[MeshData], instances: &[Instance]) -> u32 {
    let mut counts: HashMap<_, u32> = HashMap::with_capacity(meshes.len());
    for mesh in meshes {
        counts.insert(mesh.id, 0);
    }

    for instance in instances {
        if let Some(count) = counts.get_mut(&instance.mesh) {
            *count += 1;
        }
    }

    counts.values().copied().max().unwrap_or(0)
}

/// The reusable per-frame scratch buffers.
pub struct InstancePools {
    pub transform_buffer: BufferHandle,
    pub material_index_buffer: BufferHandle,
    capacity: u32,
}

impl InstancePools {
    /// Allocate both pools for the given capacity. This happens exactly
    /// once per session; instance populations that outgrow the load-time
    /// snapshot are a documented limitation, not a trigger to reallocate.
    pub fn allocate<B: GraphicsBackend>(backend: &mut B, capacity: u32) -> RenderResult<Self> {
        // A capacity of zero still allocates one slot so the buffers can
        // always be bound.
        let slots = capacity.max(1) as u64;

        let transform_buffer = backend.create_buffer(&BufferDescriptor {
            label: Some("Instance Transform Pool".into()),
            size: slots * std::mem::size_of::<InstanceTransforms>() as u64,
            usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
        })?;

        let material_index_buffer = backend.create_buffer(&BufferDescriptor {
            label: Some("Instance Material Pool".into()),
            size: slots * std::mem::size_of::<i32>() as u64,
            usage: BufferUsage::STORAGE | BufferUsage::COPY_DST,
        })?;

        log::info!("instance pools sized for {} slots", capacity);

        Ok(Self {
            transform_buffer,
            material_index_buffer,
            capacity,
        })
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Overwrite the first `transforms.len()` slots of the transform pool
    /// and the matching prefix of the material-index pool. Only the live
    /// prefix is uploaded, bounding upload cost by instance count rather
    /// than capacity.
    pub fn write<B: GraphicsBackend>(
        &self,
        backend: &mut B,
        transforms: &[InstanceTransforms],
        material_indices: &[i32],
    ) {
        backend.write_buffer(self.transform_buffer, 0, bytemuck::cast_slice(transforms));
        backend.write_buffer(
            self.material_index_buffer,
            0,
            bytemuck::cast_slice(material_indices),
        );
    }

    /// Release both pools.
    pub fn destroy<B: GraphicsBackend>(&self, backend: &mut B) {
        backend.destroy_buffer(self.transform_buffer);
        backend.destroy_buffer(self.material_index_buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{MaterialId, MeshId};
    use glam::Mat4;

    fn instance(mesh: u32) -> Instance {
        Instance {
            mesh: MeshId(mesh),
            transform: Mat4::IDENTITY,
            material: MaterialId(0),
        }
    }

    #[test]
    fn capacity_is_the_largest_per_mesh_population() {
        let meshes = vec![
            MeshData::quad(MeshId(0)),
            MeshData::quad(MeshId(1)),
            MeshData::quad(MeshId(2)),
        ];
        let instances = vec![
            instance(0),
            instance(1),
            instance(1),
            instance(1),
            instance(2),
            instance(2),
        ];

        assert_eq!(compute_pool_capacity(&meshes, &instances), 3);
    }

    #[test]
    fn instances_of_unknown_meshes_do_not_affect_capacity() {
        let meshes = vec![MeshData::quad(MeshId(0))];
        let instances = vec![instance(0), instance(9), instance(9)];

        assert_eq!(compute_pool_capacity(&meshes, &instances), 1);
    }

    #[test]
    fn empty_scene_has_zero_capacity() {
        assert_eq!(compute_pool_capacity(&[], &[]), 0);
    }
}
