//! Scene/lighting uniform block
//!
//! One fixed-layout block carries everything the shading stage needs per
//! frame: camera matrices, ambient color and the light array. The block is
//! rebuilt and uploaded wholesale once per frame; nothing updates it
//! incrementally because nearly every field changes every frame.
//!
//! The layout is a binding contract. The scene half (matrices, camera
//! position, ambient) is padded out to 256 bytes so the lighting half can
//! be bound as a second range of the same buffer under the usual 256-byte
//! minimum offset alignment. Vector fields inside a light are 16-byte
//! aligned and the light stride is a multiple of 16. The tests at the
//! bottom pin every one of these offsets.

use crate::scene::{Light, LightKind};
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Capacity of the light array. Lights beyond this are silently dropped,
/// a documented limit rather than an error.
pub const MAX_LIGHTS: usize = 20;

/// One light as the shading stage reads it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuLight {
    pub position: Vec3,
    _pad0: f32,
    pub direction: Vec3,
    /// Light kind tag riding in the direction vector's padding slot:
    /// 0 = point, 1 = spot, 2 = directional.
    pub kind: f32,
    pub color: Vec3,
    _pad1: f32,
    /// Half-angle of the spot cone in degrees.
    pub cone_angle: f32,
    pub concentration: f32,
    pub attenuation_constant: f32,
    pub attenuation_linear: f32,
    pub attenuation_quadratic: f32,
    /// 1.0 when this light paints the wireframe overlay instead of
    /// standard shading.
    pub emit_wireframe: f32,
    _pad2: [f32; 2],
}

impl GpuLight {
    pub fn from_light(light: &Light) -> Self {
        let (cone_angle, concentration) = match light.kind {
            LightKind::Spot {
                cone_angle,
                concentration,
            } => (cone_angle, concentration),
            _ => (0.0, 0.0),
        };

        Self {
            position: light.position,
            _pad0: 0.0,
            direction: light.direction,
            kind: light.kind.gpu_tag(),
            color: light.color,
            _pad1: 0.0,
            cone_angle,
            concentration,
            attenuation_constant: light.attenuation.constant,
            attenuation_linear: light.attenuation.linear,
            attenuation_quadratic: light.attenuation.quadratic,
            emit_wireframe: if light.emit_wireframe { 1.0 } else { 0.0 },
            _pad2: [0.0; 2],
        }
    }
}

/// The whole per-frame data block.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SceneBlock {
    pub projection: Mat4,
    pub view: Mat4,
    pub camera_position: Vec3,
    _pad0: f32,
    pub ambient: Vec3,
    _pad1: f32,
    /// Pads the scene half out to a 256-byte boundary so the lighting half
    /// can be bound as a separate range of the same buffer.
    _reserved: [u32; 24],
    pub light_count: u32,
    _pad2: [u32; 3],
    pub lights: [GpuLight; MAX_LIGHTS],
}

impl SceneBlock {
    /// Byte offset of the scene sub-range within the block.
    pub const SCENE_OFFSET: u64 = 0;
    /// Byte size of the scene sub-range.
    pub const SCENE_SIZE: u64 = 256;
    /// Byte offset of the lighting sub-range; a multiple of 256 so it can
    /// be bound separately.
    pub const LIGHTING_OFFSET: u64 = 256;
    /// Byte size of the lighting sub-range.
    pub const LIGHTING_SIZE: u64 = (std::mem::size_of::<SceneBlock>() - 256) as u64;

    /// Populate a fresh block. Lights are copied in the order supplied up
    /// to [`MAX_LIGHTS`]; the tail beyond capacity is dropped.
    pub fn build<'a, I>(
        projection: Mat4,
        view: Mat4,
        camera_position: Vec3,
        ambient: Vec3,
        lights: I,
    ) -> Self
    where
        I: IntoIterator<Item = &'a Light>,
    {
        let mut block = Self::zeroed();
        block.projection = projection;
        block.view = view;
        block.camera_position = camera_position;
        block.ambient = ambient;

        let mut count = 0usize;
        for light in lights {
            if count == MAX_LIGHTS {
                log::debug!("light capacity {} reached, dropping the remainder", MAX_LIGHTS);
                break;
            }
            block.lights[count] = GpuLight::from_light(light);
            count += 1;
        }
        block.light_count = count as u32;

        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Attenuation;
    use std::mem::{offset_of, size_of};

    #[test]
    fn light_record_layout_is_byte_exact() {
        assert_eq!(size_of::<GpuLight>(), 80);
        assert_eq!(size_of::<GpuLight>() % 16, 0);

        assert_eq!(offset_of!(GpuLight, position), 0);
        assert_eq!(offset_of!(GpuLight, direction), 16);
        assert_eq!(offset_of!(GpuLight, color), 32);
        assert_eq!(offset_of!(GpuLight, cone_angle), 48);
        assert_eq!(offset_of!(GpuLight, concentration), 52);
        assert_eq!(offset_of!(GpuLight, attenuation_constant), 56);
        assert_eq!(offset_of!(GpuLight, attenuation_quadratic), 64);
        assert_eq!(offset_of!(GpuLight, emit_wireframe), 68);
    }

    #[test]
    fn block_layout_is_byte_exact() {
        assert_eq!(offset_of!(SceneBlock, projection), 0);
        assert_eq!(offset_of!(SceneBlock, view), 64);
        assert_eq!(offset_of!(SceneBlock, camera_position), 128);
        assert_eq!(offset_of!(SceneBlock, ambient), 144);
        assert_eq!(offset_of!(SceneBlock, light_count), 256);
        assert_eq!(offset_of!(SceneBlock, lights), 272);

        assert_eq!(
            size_of::<SceneBlock>(),
            272 + MAX_LIGHTS * size_of::<GpuLight>()
        );
    }

    #[test]
    fn sub_ranges_tile_the_block_and_respect_alignment() {
        assert_eq!(SceneBlock::SCENE_OFFSET, 0);
        assert_eq!(SceneBlock::LIGHTING_OFFSET % 256, 0);
        assert_eq!(
            SceneBlock::SCENE_SIZE + SceneBlock::LIGHTING_SIZE,
            size_of::<SceneBlock>() as u64
        );
    }

    #[test]
    fn excess_lights_are_clamped_in_order() {
        let lights: Vec<Light> = (0..MAX_LIGHTS + 5)
            .map(|i| {
                Light::point(
                    Vec3::new(i as f32, 0.0, 0.0),
                    Vec3::ONE,
                    Attenuation::default(),
                )
            })
            .collect();

        let block = SceneBlock::build(
            Mat4::IDENTITY,
            Mat4::IDENTITY,
            Vec3::ZERO,
            Vec3::ZERO,
            &lights,
        );

        assert_eq!(block.light_count, MAX_LIGHTS as u32);
        for i in 0..MAX_LIGHTS {
            assert_eq!(block.lights[i].position.x, i as f32);
        }
    }

    #[test]
    fn light_kinds_map_to_their_tags() {
        let point = Light::point(Vec3::ZERO, Vec3::ONE, Attenuation::default());
        let spot = Light::spot(Vec3::ZERO, -Vec3::Y, Vec3::ONE, 30.0, 2.0, Attenuation::default());
        let directional = Light::directional(-Vec3::Y, Vec3::ONE);

        assert_eq!(GpuLight::from_light(&point).kind, 0.0);
        assert_eq!(GpuLight::from_light(&spot).kind, 1.0);
        assert_eq!(GpuLight::from_light(&directional).kind, 2.0);

        let gpu_spot = GpuLight::from_light(&spot);
        assert_eq!(gpu_spot.cone_angle, 30.0);
        assert_eq!(gpu_spot.concentration, 2.0);
    }
}
