//! Geometry packing
//!
//! Every mesh in the scene shares one interleaved vertex buffer and one
//! index buffer. The packer walks the meshes in input order, appending each
//! mesh's vertices and indices at running cursors and recording where each
//! mesh landed. Draws later address the shared buffers through those
//! recorded ranges, so per-mesh ranges must never overlap.

use crate::backend::traits::*;
use crate::backend::types::{BufferDescriptor, BufferUsage, Vertex};
use crate::error::{RenderError, RenderResult};
use crate::scene::{MeshData, MeshId};
use glam::Vec3;

/// Where one mesh lives inside the shared buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshRange {
    /// Index of the mesh's first vertex, in vertices rather than bytes;
    /// used as the base vertex of the draw.
    pub vertex_offset: u32,
    /// Byte offset of the mesh's first index in the shared index buffer.
    pub index_byte_offset: u64,
    /// Number of indices the mesh draws with.
    pub element_count: u32,
}

/// CPU-side result of laying the scene out, before any upload happens.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedLayout {
    pub vertices: Vec<Vertex>,
    /// One barycentric basis weight per vertex, feeding the wireframe
    /// overlay as a second vertex-rate stream.
    pub barycentrics: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub meshes: Vec<(MeshId, MeshRange)>,
}

impl PackedLayout {
    /// Assemble the interleaved vertex stream and the shared index array
    /// from the scene's attribute arrays. Pure; uploading is a separate
    /// step so the layout itself stays testable.
    pub fn assemble(meshes: &[MeshData]) -> RenderResult<Self> {
        let total_vertices: usize = meshes.iter().map(MeshData::vertex_count).sum();
        let total_indices: usize = meshes.iter().map(MeshData::index_count).sum();

        let mut vertices = Vec::with_capacity(total_vertices);
        let mut barycentrics = Vec::with_capacity(total_vertices);
        let mut indices = Vec::with_capacity(total_indices);
        let mut ranges = Vec::with_capacity(meshes.len());

        let mut vertex_cursor: u32 = 0;
        let mut index_byte_cursor: u64 = 0;

        const BASIS: [Vec3; 3] = [Vec3::X, Vec3::Y, Vec3::Z];

        for mesh in meshes {
            if mesh.normals.len() != mesh.positions.len()
                || mesh.tex_coords.len() != mesh.positions.len()
            {
                return Err(RenderError::MismatchedAttributes(mesh.id));
            }

            for i in 0..mesh.positions.len() {
                vertices.push(Vertex {
                    position: mesh.positions[i],
                    normal: mesh.normals[i],
                    uv: mesh.tex_coords[i],
                });
                barycentrics.push(BASIS[i % 3]);
            }
            indices.extend_from_slice(&mesh.indices);

            ranges.push((
                mesh.id,
                MeshRange {
                    vertex_offset: vertex_cursor,
                    index_byte_offset: index_byte_cursor,
                    element_count: mesh.indices.len() as u32,
                },
            ));

            // The vertex cursor advances in vertices, the index cursor in
            // bytes; mixing the two units up corrupts every later mesh.
            vertex_cursor += mesh.positions.len() as u32;
            index_byte_cursor += (mesh.indices.len() * std::mem::size_of::<u32>()) as u64;
        }

        Ok(Self {
            vertices,
            barycentrics,
            indices,
            meshes: ranges,
        })
    }
}

/// The shared geometry buffers on the GPU plus per-mesh addressing.
pub struct PackedGeometry {
    pub vertex_buffer: BufferHandle,
    pub barycentric_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    meshes: Vec<(MeshId, MeshRange)>,
    vertex_count: u32,
}

impl PackedGeometry {
    /// Lay out and upload the whole scene's geometry. Geometry is immutable
    /// scene content, so an allocation failure here aborts the load; there
    /// is no partial or retry path.
    pub fn pack<B: GraphicsBackend>(backend: &mut B, meshes: &[MeshData]) -> RenderResult<Self> {
        let layout = PackedLayout::assemble(meshes)?;

        log::info!(
            "packing {} meshes: {} vertices, {} indices",
            meshes.len(),
            layout.vertices.len(),
            layout.indices.len()
        );

        let vertex_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some("Scene Vertices".into()),
                size: std::mem::size_of_val(layout.vertices.as_slice()) as u64,
                usage: BufferUsage::VERTEX,
            },
            bytemuck::cast_slice(&layout.vertices),
        )?;

        let barycentric_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some("Scene Barycentrics".into()),
                size: std::mem::size_of_val(layout.barycentrics.as_slice()) as u64,
                usage: BufferUsage::VERTEX,
            },
            bytemuck::cast_slice(&layout.barycentrics),
        )?;

        let index_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some("Scene Indices".into()),
                size: std::mem::size_of_val(layout.indices.as_slice()) as u64,
                usage: BufferUsage::INDEX,
            },
            bytemuck::cast_slice(&layout.indices),
        )?;

        let vertex_count = layout.vertices.len() as u32;

        Ok(Self {
            vertex_buffer,
            barycentric_buffer,
            index_buffer,
            meshes: layout.meshes,
            vertex_count,
        })
    }

    /// Meshes in load order with their shared-buffer addressing.
    pub fn meshes(&self) -> &[(MeshId, MeshRange)] {
        &self.meshes
    }

    /// Logical length of the shared vertex buffer, in vertices.
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Release the shared buffers.
    pub fn destroy<B: GraphicsBackend>(&self, backend: &mut B) {
        backend.destroy_buffer(self.vertex_buffer);
        backend.destroy_buffer(self.barycentric_buffer);
        backend.destroy_buffer(self.index_buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::MeshData;

    fn sample_meshes() -> Vec<MeshData> {
        vec![
            MeshData::quad(MeshId(0)),
            MeshData::cube(MeshId(1)),
            MeshData::quad(MeshId(2)),
        ]
    }

    #[test]
    fn vertex_totals_add_up() {
        let meshes = sample_meshes();
        let layout = PackedLayout::assemble(&meshes).unwrap();

        let expected: usize = meshes.iter().map(MeshData::vertex_count).sum();
        assert_eq!(layout.vertices.len(), expected);
        assert_eq!(layout.barycentrics.len(), expected);
    }

    #[test]
    fn ranges_never_overlap_and_stay_in_input_order() {
        let meshes = sample_meshes();
        let layout = PackedLayout::assemble(&meshes).unwrap();

        let mut vertex_cursor = 0u32;
        let mut byte_cursor = 0u64;
        for (mesh, (id, range)) in meshes.iter().zip(&layout.meshes) {
            assert_eq!(*id, mesh.id);
            assert_eq!(range.vertex_offset, vertex_cursor);
            assert_eq!(range.index_byte_offset, byte_cursor);
            assert_eq!(range.element_count as usize, mesh.index_count());

            vertex_cursor += mesh.vertex_count() as u32;
            byte_cursor += (mesh.index_count() * 4) as u64;
        }
    }

    #[test]
    fn packing_is_idempotent() {
        let meshes = sample_meshes();
        let first = PackedLayout::assemble(&meshes).unwrap();
        let second = PackedLayout::assemble(&meshes).unwrap();

        assert_eq!(
            bytemuck::cast_slice::<_, u8>(&first.vertices),
            bytemuck::cast_slice::<_, u8>(&second.vertices)
        );
        assert_eq!(
            bytemuck::cast_slice::<_, u8>(&first.indices),
            bytemuck::cast_slice::<_, u8>(&second.indices)
        );
        assert_eq!(first.meshes, second.meshes);
    }

    #[test]
    fn mismatched_attribute_arrays_fail_the_load() {
        let mut mesh = MeshData::quad(MeshId(7));
        mesh.normals.pop();

        let err = PackedLayout::assemble(&[mesh]).unwrap_err();
        assert!(matches!(err, RenderError::MismatchedAttributes(MeshId(7))));
    }
}
