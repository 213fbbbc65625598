//! Scene data model
//!
//! Everything in this module is supplied by the host application: the
//! renderer reads these types but never owns or mutates the live scene.
//! Meshes and materials arrive once at load time; instances, lights and the
//! camera arrive fresh every frame.

mod camera;
mod light;

pub use camera::*;
pub use light::*;

use glam::{Mat4, Vec2, Vec3};

/// Identifier for a mesh, assigned by the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshId(pub u32);

/// Identifier for a material, assigned by the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialId(pub u32);

/// Source geometry for one mesh: parallel attribute arrays plus an index
/// array, exactly as the scene hands them over.
#[derive(Debug, Clone)]
pub struct MeshData {
    pub id: MeshId,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub tex_coords: Vec<Vec2>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// A unit quad in the XY plane: 4 vertices, 6 indices.
    pub fn quad(id: MeshId) -> Self {
        Self {
            id,
            positions: vec![
                Vec3::new(-0.5, -0.5, 0.0),
                Vec3::new(0.5, -0.5, 0.0),
                Vec3::new(0.5, 0.5, 0.0),
                Vec3::new(-0.5, 0.5, 0.0),
            ],
            normals: vec![Vec3::Z; 4],
            tex_coords: vec![
                Vec2::new(0.0, 1.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(0.0, 0.0),
            ],
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    /// A unit cube centered at the origin, one quad per face.
    pub fn cube(id: MeshId) -> Self {
        let faces = [
            (Vec3::Z, Vec3::X, Vec3::Y),
            (-Vec3::Z, -Vec3::X, Vec3::Y),
            (Vec3::X, -Vec3::Z, Vec3::Y),
            (-Vec3::X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, -Vec3::Z),
            (-Vec3::Y, Vec3::X, Vec3::Z),
        ];

        let mut positions = Vec::with_capacity(24);
        let mut normals = Vec::with_capacity(24);
        let mut tex_coords = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);

        for (face, (normal, right, up)) in faces.into_iter().enumerate() {
            let center = normal * 0.5;
            let corners = [
                center - right * 0.5 - up * 0.5,
                center + right * 0.5 - up * 0.5,
                center + right * 0.5 + up * 0.5,
                center - right * 0.5 + up * 0.5,
            ];
            let uvs = [
                Vec2::new(0.0, 1.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(0.0, 0.0),
            ];

            for (corner, uv) in corners.iter().zip(uvs) {
                positions.push(*corner);
                normals.push(normal);
                tex_coords.push(uv);
            }

            let base = (face * 4) as u32;
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self {
            id,
            positions,
            normals,
            tex_coords,
            indices,
        }
    }
}

/// Source description of one material.
#[derive(Debug, Clone)]
pub struct MaterialData {
    pub id: MaterialId,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
    /// Source identity of the texture to sample, usually a filename.
    /// `None` means shade with the diffuse color alone.
    pub texture: Option<String>,
}

impl MaterialData {
    pub fn untextured(id: MaterialId, diffuse: Vec3, specular: Vec3, shininess: f32) -> Self {
        Self {
            id,
            diffuse,
            specular,
            shininess,
            texture: None,
        }
    }
}

/// One placement of a mesh in the scene.
#[derive(Debug, Clone)]
pub struct Instance {
    pub mesh: MeshId,
    pub transform: Mat4,
    pub material: MaterialId,
}

/// Load-time snapshot of the scene: all meshes and materials, plus the
/// instance population used to size the per-frame pools.
#[derive(Debug, Clone, Default)]
pub struct SceneContent {
    pub meshes: Vec<MeshData>,
    pub materials: Vec<MaterialData>,
    pub instances: Vec<Instance>,
}

impl SceneContent {
    pub fn new(meshes: Vec<MeshData>, materials: Vec<MaterialData>, instances: Vec<Instance>) -> Self {
        Self {
            meshes,
            materials,
            instances,
        }
    }
}

/// Per-frame view of the live scene. Instance and light slices keep the
/// order the scene produced them in; the renderer never re-sorts them.
pub struct FrameScene<'a> {
    pub camera: &'a Camera,
    pub ambient: Vec3,
    pub lights: &'a [Light],
    pub instances: &'a [Instance],
}
