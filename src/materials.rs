//! Material table and texture resolution
//!
//! Materials are converted once at load time into fixed-size records the
//! fragment stage can fetch by integer index. Texture references are
//! resolved by source identity (filename) against a deduplicated list of
//! every distinct texture in the scene; the decoded images share one 2D
//! texture array and a record stores its layer index, with -1 meaning
//! "no texture, shade with the diffuse color alone".

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::RenderResult;
use crate::scene::{MaterialData, MaterialId};
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use image::GenericImageView;
use std::collections::HashMap;
use std::path::Path;

/// Decoded RGBA8 texture data.
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl TextureData {
    /// Load and decode a texture from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let img = image::open(path.as_ref()).map_err(|e| e.to_string())?;
        let (width, height) = img.dimensions();
        let data = img.to_rgba8().into_raw();

        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Decode a texture from an in-memory encoded image.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        let img = image::load_from_memory(bytes).map_err(|e| e.to_string())?;
        let (width, height) = img.dimensions();
        let data = img.to_rgba8().into_raw();

        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A one-pixel solid color texture.
    pub fn solid_color(color: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            data: color.to_vec(),
        }
    }

    pub fn white() -> Self {
        Self::solid_color([255, 255, 255, 255])
    }
}

/// Fixed-size GPU material record: two directly addressable 4-float groups.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialRecord {
    pub diffuse: Vec3,
    /// Layer index into the texture array; -1 means untextured.
    pub texture_index: f32,
    pub specular: Vec3,
    pub shininess: f32,
}

/// Sentinel layer index meaning "no texture".
pub const NO_TEXTURE: f32 = -1.0;

impl Default for MaterialRecord {
    fn default() -> Self {
        Self {
            diffuse: Vec3::ZERO,
            texture_index: NO_TEXTURE,
            specular: Vec3::ZERO,
            shininess: 0.0,
        }
    }
}

/// The load-time-built, id-indexed table of shading parameters plus the
/// scene's texture array.
pub struct MaterialTable {
    pub record_buffer: BufferHandle,
    pub texture_array: TextureHandle,
    pub texture_view: TextureViewHandle,
    pub sampler: SamplerHandle,

    records: Vec<MaterialRecord>,
    index_of: HashMap<MaterialId, i32>,
    default_index: i32,
}

impl MaterialTable {
    /// Build the table and upload it. `load_texture` is the external decode
    /// collaborator: it is asked once per distinct texture name; a failure
    /// is recoverable and the affected materials fall back to untextured.
    pub fn build<B, F>(
        backend: &mut B,
        materials: &[MaterialData],
        mut load_texture: F,
    ) -> RenderResult<Self>
    where
        B: GraphicsBackend,
        F: FnMut(&str) -> Result<TextureData, String>,
    {
        // Deduplicate texture names, keeping first-appearance order.
        let mut names: Vec<&str> = Vec::new();
        for material in materials {
            if let Some(name) = material.texture.as_deref() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }

        // Decode each distinct texture once. The first successful decode
        // fixes the array dimensions; later images that disagree are
        // dropped so the single texture array stays well-formed.
        let mut images: Vec<(&str, TextureData)> = Vec::new();
        let mut dimensions: Option<(u32, u32)> = None;
        for name in names {
            match load_texture(name) {
                Ok(texture) => {
                    let dims = (texture.width, texture.height);
                    match dimensions {
                        None => {
                            dimensions = Some(dims);
                            images.push((name, texture));
                        }
                        Some(expected) if expected == dims => images.push((name, texture)),
                        Some(expected) => {
                            log::warn!(
                                "texture '{}' is {}x{} but the scene's texture array is {}x{}; \
                                 falling back to untextured",
                                name,
                                dims.0,
                                dims.1,
                                expected.0,
                                expected.1
                            );
                        }
                    }
                }
                Err(err) => {
                    log::warn!("failed to decode texture '{}': {}; falling back to untextured", name, err);
                }
            }
        }

        // Build one record per material in input order, then a reserved
        // default record at the end for instances whose material id is
        // missing from the table.
        let mut records = Vec::with_capacity(materials.len() + 1);
        let mut index_of = HashMap::with_capacity(materials.len());

        for material in materials {
            let texture_index = material
                .texture
                .as_deref()
                .and_then(|name| images.iter().position(|(n, _)| *n == name))
                .map_or(NO_TEXTURE, |i| i as f32);

            index_of.insert(material.id, records.len() as i32);
            records.push(MaterialRecord {
                diffuse: material.diffuse,
                texture_index,
                specular: material.specular,
                shininess: material.shininess,
            });
        }

        let default_index = records.len() as i32;
        records.push(MaterialRecord::default());

        log::info!(
            "material table: {} materials, {} textures",
            materials.len(),
            images.len()
        );

        let record_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some("Material Table".into()),
                size: std::mem::size_of_val(records.as_slice()) as u64,
                usage: BufferUsage::STORAGE,
            },
            bytemuck::cast_slice(&records),
        )?;

        // The array always exists so the pipeline layout never changes; a
        // texture-less scene gets a single white layer.
        let (width, height) = dimensions.unwrap_or((1, 1));
        let layer_count = images.len().max(1) as u32;

        let texture_array = backend.create_texture(&TextureDescriptor {
            label: Some("Scene Textures".into()),
            width,
            height,
            array_layers: layer_count,
            mip_levels: 1,
            format: TextureFormat::Rgba8UnormSrgb,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
        })?;

        if images.is_empty() {
            let white = TextureData::white();
            backend.write_texture(texture_array, &white.data, 1, 1, 0);
        } else {
            for (layer, (_, texture)) in images.iter().enumerate() {
                backend.write_texture(texture_array, &texture.data, width, height, layer as u32);
            }
        }

        let texture_view = backend.create_texture_view(texture_array)?;
        let sampler = backend.create_sampler(&SamplerDescriptor {
            label: Some("Scene Texture Sampler".into()),
            ..Default::default()
        })?;

        Ok(Self {
            record_buffer,
            texture_array,
            texture_view,
            sampler,
            records,
            index_of,
            default_index,
        })
    }

    /// Record index for a material id. Unknown ids resolve to the reserved
    /// default record so one bad instance never takes the frame down.
    pub fn resolve(&self, id: MaterialId) -> i32 {
        match self.index_of.get(&id) {
            Some(index) => *index,
            None => {
                log::warn!("instance references unknown material {:?}; using default", id);
                self.default_index
            }
        }
    }

    /// Index of the reserved default record.
    pub fn default_index(&self) -> i32 {
        self.default_index
    }

    /// The records as uploaded, default record last.
    pub fn records(&self) -> &[MaterialRecord] {
        &self.records
    }

    /// Release the GPU resources owned by the table.
    pub fn destroy<B: GraphicsBackend>(&self, backend: &mut B) {
        backend.destroy_buffer(self.record_buffer);
        backend.destroy_texture(self.texture_array);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::HeadlessBackend;

    fn sample_materials() -> Vec<MaterialData> {
        vec![
            MaterialData {
                id: MaterialId(0),
                diffuse: Vec3::new(1.0, 0.0, 0.0),
                specular: Vec3::ONE,
                shininess: 32.0,
                texture: Some("bricks.png".into()),
            },
            MaterialData::untextured(MaterialId(1), Vec3::splat(0.5), Vec3::ZERO, 0.0),
            MaterialData {
                id: MaterialId(2),
                diffuse: Vec3::new(0.0, 1.0, 0.0),
                specular: Vec3::ZERO,
                shininess: 8.0,
                texture: Some("bricks.png".into()),
            },
        ]
    }

    #[test]
    fn shared_texture_names_resolve_to_one_layer() {
        let mut backend = HeadlessBackend::new(64, 64);
        let table = MaterialTable::build(&mut backend, &sample_materials(), |_| {
            Ok(TextureData::solid_color([10, 20, 30, 255]))
        })
        .unwrap();

        let records = table.records();
        assert_eq!(records[0].texture_index, 0.0);
        assert_eq!(records[1].texture_index, NO_TEXTURE);
        assert_eq!(records[2].texture_index, 0.0);
    }

    #[test]
    fn decode_failure_falls_back_to_untextured() {
        let mut backend = HeadlessBackend::new(64, 64);
        let table = MaterialTable::build(&mut backend, &sample_materials(), |_| {
            Err("corrupt file".into())
        })
        .unwrap();

        assert_eq!(table.records()[0].texture_index, NO_TEXTURE);
        assert_eq!(table.records()[2].texture_index, NO_TEXTURE);
    }

    #[test]
    fn mismatched_dimensions_drop_the_later_texture() {
        let mut materials = sample_materials();
        materials[1].texture = Some("big.png".into());

        let mut backend = HeadlessBackend::new(64, 64);
        let table = MaterialTable::build(&mut backend, &materials, |name| {
            if name == "big.png" {
                Ok(TextureData {
                    width: 8,
                    height: 8,
                    data: vec![0; 8 * 8 * 4],
                })
            } else {
                Ok(TextureData::solid_color([1, 2, 3, 255]))
            }
        })
        .unwrap();

        assert_eq!(table.records()[0].texture_index, 0.0);
        assert_eq!(table.records()[1].texture_index, NO_TEXTURE);
    }

    #[test]
    fn unknown_material_resolves_to_the_default_record() {
        let mut backend = HeadlessBackend::new(64, 64);
        let table = MaterialTable::build(&mut backend, &sample_materials(), |_| {
            Ok(TextureData::white())
        })
        .unwrap();

        let index = table.resolve(MaterialId(999));
        assert_eq!(index, table.default_index());

        let default = table.records()[index as usize];
        assert_eq!(default.diffuse, Vec3::ZERO);
        assert_eq!(default.texture_index, NO_TEXTURE);
    }

    #[test]
    fn building_twice_produces_identical_records() {
        let materials = sample_materials();

        let mut backend = HeadlessBackend::new(64, 64);
        let first = MaterialTable::build(&mut backend, &materials, |_| Ok(TextureData::white()))
            .unwrap();
        let second = MaterialTable::build(&mut backend, &materials, |_| Ok(TextureData::white()))
            .unwrap();

        assert_eq!(
            bytemuck::cast_slice::<_, u8>(first.records()),
            bytemuck::cast_slice::<_, u8>(second.records())
        );
    }

    #[test]
    fn record_is_exactly_two_vec4s() {
        assert_eq!(std::mem::size_of::<MaterialRecord>(), 32);
    }
}
