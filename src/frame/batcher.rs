//! Per-frame instance batching
//!
//! Each frame the live instances are regrouped by mesh, in the order the
//! scene supplied them, and turned into pool payloads: one transform pair
//! and one material table index per live instance. The renderer then issues
//! a single instanced draw per batch.

use crate::backend::types::InstanceTransforms;
use crate::geometry::MeshRange;
use crate::materials::MaterialTable;
use crate::scene::{Instance, MeshId};
use glam::Mat4;
use std::collections::HashMap;

/// The live instances of one mesh for the current frame.
pub struct MeshBatch<'a> {
    pub mesh: MeshId,
    pub range: MeshRange,
    pub instances: Vec<&'a Instance>,
}

/// Group the frame's instances by mesh. Meshes come out in load order;
/// instances within a mesh keep the order the scene produced them in, with
/// no re-sorting and no deduplication. Meshes with no live instances are
/// skipped entirely.
pub fn batch_instances<'a>(
    meshes: &[(MeshId, MeshRange)],
    instances: &'a [Instance],
) -> Vec<MeshBatch<'a>> {
    let slot_of: HashMap<MeshId, usize> = meshes
        .iter()
        .enumerate()
        .map(|(slot, (id, _))| (*id, slot))
        .collect();

    let mut grouped: Vec<Vec<&Instance>> = vec![Vec::new(); meshes.len()];
    for instance in instances {
        match slot_of.get(&instance.mesh) {
            Some(slot) => grouped[*slot].push(instance),
            None => log::debug!("instance references unknown mesh {:?}; skipping", instance.mesh),
        }
    }

    meshes
        .iter()
        .zip(grouped)
        .filter(|(_, group)| !group.is_empty())
        .map(|((id, range), group)| MeshBatch {
            mesh: *id,
            range: *range,
            instances: group,
        })
        .collect()
}

/// Compute the pool payload for one batch: per-slot transforms (model and
/// combined projection-view-model) and resolved material table indices.
///
/// The batch must fit the pool: capacity was computed from the load-time
/// snapshot and is not re-validated against the GPU every frame. Exceeding
/// it is a programming or data error: debug builds assert, release builds
/// clamp with an error log.
pub fn pool_payload(
    batch: &MeshBatch,
    materials: &MaterialTable,
    projection_view: Mat4,
    capacity: u32,
) -> (Vec<InstanceTransforms>, Vec<i32>) {
    let live = batch.instances.len();
    debug_assert!(
        live <= capacity as usize,
        "mesh {:?} has {} live instances but the pools hold {}",
        batch.mesh,
        live,
        capacity
    );

    let count = if live > capacity as usize {
        log::error!(
            "mesh {:?} has {} live instances but the pools hold {}; clamping",
            batch.mesh,
            live,
            capacity
        );
        capacity as usize
    } else {
        live
    };

    let mut transforms = Vec::with_capacity(count);
    let mut material_indices = Vec::with_capacity(count);

    for instance in &batch.instances[..count] {
        transforms.push(InstanceTransforms {
            model: instance.transform,
            pvm: projection_view * instance.transform,
        });
        material_indices.push(materials.resolve(instance.material));
    }

    (transforms, material_indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::HeadlessBackend;
    use crate::materials::TextureData;
    use crate::scene::{MaterialData, MaterialId};
    use glam::{Vec3, Vec4};

    fn ranges() -> Vec<(MeshId, MeshRange)> {
        vec![
            (
                MeshId(0),
                MeshRange {
                    vertex_offset: 0,
                    index_byte_offset: 0,
                    element_count: 6,
                },
            ),
            (
                MeshId(1),
                MeshRange {
                    vertex_offset: 4,
                    index_byte_offset: 24,
                    element_count: 36,
                },
            ),
        ]
    }

    fn instance(mesh: u32, x: f32) -> Instance {
        Instance {
            mesh: MeshId(mesh),
            transform: Mat4::from_translation(Vec3::new(x, 0.0, 0.0)),
            material: MaterialId(0),
        }
    }

    fn material_table(backend: &mut HeadlessBackend) -> MaterialTable {
        let materials = vec![MaterialData::untextured(
            MaterialId(0),
            Vec3::ONE,
            Vec3::ZERO,
            0.0,
        )];
        MaterialTable::build(backend, &materials, |_| Ok(TextureData::white())).unwrap()
    }

    #[test]
    fn batches_follow_load_order_and_keep_instance_order() {
        let instances = vec![
            instance(1, 1.0),
            instance(0, 2.0),
            instance(1, 3.0),
            instance(0, 4.0),
        ];

        let batches = batch_instances(&ranges(), &instances);
        assert_eq!(batches.len(), 2);

        assert_eq!(batches[0].mesh, MeshId(0));
        assert_eq!(batches[0].instances[0].transform.w_axis.x, 2.0);
        assert_eq!(batches[0].instances[1].transform.w_axis.x, 4.0);

        assert_eq!(batches[1].mesh, MeshId(1));
        assert_eq!(batches[1].instances[0].transform.w_axis.x, 1.0);
        assert_eq!(batches[1].instances[1].transform.w_axis.x, 3.0);
    }

    #[test]
    fn empty_meshes_produce_no_batch() {
        let instances = vec![instance(1, 1.0)];
        let batches = batch_instances(&ranges(), &instances);

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].mesh, MeshId(1));
    }

    #[test]
    fn payload_combines_the_projection_view_with_each_model() {
        let mut backend = HeadlessBackend::new(4, 4);
        let materials = material_table(&mut backend);

        let instances = vec![instance(0, 5.0)];
        let batches = batch_instances(&ranges(), &instances);

        let projection_view = Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0));
        let (transforms, indices) = pool_payload(&batches[0], &materials, projection_view, 4);

        assert_eq!(transforms.len(), 1);
        assert_eq!(indices, vec![0]);
        assert_eq!(transforms[0].model.w_axis, Vec4::new(5.0, 0.0, 0.0, 1.0));
        assert_eq!(transforms[0].pvm.w_axis, Vec4::new(5.0, 1.0, 0.0, 1.0));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "live instances but the pools hold")]
    fn exceeding_the_pool_capacity_asserts_in_debug() {
        let mut backend = HeadlessBackend::new(4, 4);
        let materials = material_table(&mut backend);

        let instances = vec![instance(0, 0.0), instance(0, 1.0), instance(0, 2.0)];
        let batches = batch_instances(&ranges(), &instances);

        let _ = pool_payload(&batches[0], &materials, Mat4::IDENTITY, 2);
    }
}
