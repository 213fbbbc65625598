//! CPU reference of the per-fragment shading model
//!
//! The WGSL in [`super::SCENE_SHADER`] and these functions implement the
//! same formulas over the same uploaded data ([`GpuLight`],
//! [`MaterialRecord`]). Keeping a plain-Rust twin makes the lighting maths
//! unit-testable; any change here must be mirrored in the shader and vice
//! versa.

use crate::frame::uniforms::GpuLight;
use crate::materials::MaterialRecord;
use glam::Vec3;

/// Below this distance a light sits on the surface and its direction is
/// meaningless; the contribution clamps to zero instead of going NaN.
const MIN_LIGHT_DISTANCE: f32 = 1e-5;

/// Hermite interpolation, matching WGSL `smoothstep`.
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge0 >= edge1 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Mirror-reflect `incident` about `normal`, matching WGSL `reflect`.
fn reflect(incident: Vec3, normal: Vec3) -> Vec3 {
    incident - 2.0 * incident.dot(normal) * normal
}

/// Smooth cone falloff for a spot light: exactly zero for a surface
/// direction at the cone half-angle, rising to one on the axis.
/// `cos_to_axis` is `dot(-L, light direction)` for the unit surface-to-light
/// vector `L`.
pub fn cone_attenuation(cone_angle_degrees: f32, cos_to_axis: f32) -> f32 {
    let edge = cone_angle_degrees.to_radians().cos();
    // A zero-size cone contains no direction at all.
    if edge >= 1.0 {
        return 0.0;
    }
    smoothstep(edge, 1.0, cos_to_axis)
}

/// Wireframe overlay intensity from interpolated barycentric weights and
/// their screen-space derivatives: one exactly on a triangle edge, zero in
/// the interior. Pure geometry, independent of any light.
pub fn wireframe_overlay(barycentric: Vec3, derivative: Vec3, sharpness: f32) -> f32 {
    let edge = smoothstep(0.0, derivative.x * sharpness, barycentric.x)
        .min(smoothstep(0.0, derivative.y * sharpness, barycentric.y))
        .min(smoothstep(0.0, derivative.z * sharpness, barycentric.z));
    1.0 - edge
}

fn distance_attenuation(light: &GpuLight, distance: f32) -> f32 {
    let divisor = light.attenuation_constant
        + light.attenuation_linear * distance
        + light.attenuation_quadratic * distance * distance;
    if divisor <= 0.0 {
        0.0
    } else {
        1.0 / divisor
    }
}

/// Shaded contribution of a single light to one fragment.
///
/// `view_dir` is the unit surface-to-camera vector, `normal` the unit
/// world normal. `sampled_texture` is whatever the texture array produced
/// for this fragment; whether it participates is decided by the material's
/// texture index.
pub fn light_contribution(
    light: &GpuLight,
    material: &MaterialRecord,
    sampled_texture: Vec3,
    world_position: Vec3,
    normal: Vec3,
    view_dir: Vec3,
    overlay: f32,
) -> Vec3 {
    let directional = light.kind == 2.0;

    let (to_light, distance) = if directional {
        let direction = light.direction;
        if direction.length_squared() <= MIN_LIGHT_DISTANCE {
            return Vec3::ZERO;
        }
        (-direction.normalize(), 0.0)
    } else {
        let offset = light.position - world_position;
        let distance = offset.length();
        if distance <= MIN_LIGHT_DISTANCE {
            return Vec3::ZERO;
        }
        (offset / distance, distance)
    };

    // No diffuse or specular contribution is possible on a back-facing
    // surface, so the light is skipped outright.
    let lambertian = to_light.dot(normal).max(0.0);
    if lambertian <= 0.0 {
        return Vec3::ZERO;
    }

    let attenuation = if light.kind == 1.0 {
        let luminance = (-light.direction)
            .dot(to_light)
            .max(0.0)
            .powf(light.concentration)
            * distance_attenuation(light, distance);
        let cone = cone_attenuation(light.cone_angle, (-to_light).dot(light.direction));
        luminance * cone
    } else if directional {
        1.0
    } else {
        distance_attenuation(light, distance)
    };

    if attenuation <= 0.0 {
        return Vec3::ZERO;
    }

    if light.emit_wireframe != 0.0 {
        // Emissive wireframe: attenuated but unshadowed color, blended by
        // the overlay weight instead of diffuse/specular shading.
        return light.color * attenuation * overlay;
    }

    let textured = material.texture_index >= 0.0;
    let diffuse_tint = if textured { sampled_texture } else { Vec3::ONE };
    let diffuse = material.diffuse * diffuse_tint * lambertian;

    let specular = if material.shininess > 0.0 {
        let alignment = reflect(-to_light, normal).dot(view_dir).max(0.0);
        material.specular * alignment.powf(material.shininess)
    } else {
        Vec3::ZERO
    };

    light.color * attenuation * (diffuse + specular)
}

/// Full per-fragment shading: ambient term plus every light's
/// contribution. `lights` is the clamped prefix of the uploaded array.
#[allow(clippy::too_many_arguments)]
pub fn shade(
    material: &MaterialRecord,
    sampled_texture: Vec3,
    ambient: Vec3,
    lights: &[GpuLight],
    world_position: Vec3,
    normal: Vec3,
    camera_position: Vec3,
    overlay: f32,
) -> Vec3 {
    let normal = normal.normalize_or_zero();
    let view_dir = (camera_position - world_position).normalize_or_zero();

    let textured = material.texture_index >= 0.0;
    let base = if textured {
        sampled_texture
    } else {
        material.diffuse
    };

    let mut color = ambient * base;
    for light in lights {
        color += light_contribution(
            light,
            material,
            sampled_texture,
            world_position,
            normal,
            view_dir,
            overlay,
        );
    }

    color
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Attenuation, Light, LightKind};

    fn white_material() -> MaterialRecord {
        MaterialRecord {
            diffuse: Vec3::ONE,
            texture_index: -1.0,
            specular: Vec3::ZERO,
            shininess: 0.0,
        }
    }

    fn gpu(light: Light) -> GpuLight {
        GpuLight::from_light(&light)
    }

    #[test]
    fn cone_attenuation_is_zero_exactly_at_the_half_angle() {
        let half_angle = 30.0f32;
        let at_edge = half_angle.to_radians().cos();

        assert_eq!(cone_attenuation(half_angle, at_edge), 0.0);
        assert!(cone_attenuation(half_angle, (29.0f32).to_radians().cos()) > 0.0);
        assert!((cone_attenuation(half_angle, 1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn directional_lights_do_not_attenuate() {
        let light = gpu(Light::directional(-Vec3::Z, Vec3::ONE));
        let contribution = light_contribution(
            &light,
            &white_material(),
            Vec3::ONE,
            Vec3::new(0.0, 0.0, -1000.0),
            Vec3::Z,
            Vec3::Z,
            0.0,
        );

        // Fully lit regardless of how far away the fragment is.
        assert!((contribution - Vec3::ONE).length() < 1e-5);
    }

    #[test]
    fn back_facing_surfaces_receive_nothing() {
        let light = gpu(Light::point(
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::ONE,
            Attenuation::new(1.0, 0.0, 0.0),
        ));
        let contribution = light_contribution(
            &light,
            &white_material(),
            Vec3::ONE,
            Vec3::ZERO,
            Vec3::Z,
            Vec3::Z,
            0.0,
        );

        assert_eq!(contribution, Vec3::ZERO);
    }

    #[test]
    fn coincident_lights_clamp_to_zero_instead_of_nan() {
        let light = gpu(Light::point(
            Vec3::ZERO,
            Vec3::ONE,
            Attenuation::default(),
        ));
        let contribution = light_contribution(
            &light,
            &white_material(),
            Vec3::ONE,
            Vec3::ZERO,
            Vec3::Z,
            Vec3::Z,
            0.0,
        );

        assert_eq!(contribution, Vec3::ZERO);
    }

    #[test]
    fn negative_shininess_contributes_no_specular() {
        let mut material = white_material();
        material.specular = Vec3::ONE;
        material.shininess = -4.0;

        let light = gpu(Light::point(
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::ONE,
            Attenuation::new(1.0, 0.0, 0.0),
        ));
        let contribution = light_contribution(
            &light,
            &material,
            Vec3::ONE,
            Vec3::ZERO,
            Vec3::Z,
            Vec3::Z,
            0.0,
        );

        // Diffuse only: lambertian is 1 head-on.
        assert!((contribution - Vec3::ONE).length() < 1e-5);
        assert!(contribution.is_finite());
    }

    #[test]
    fn emissive_wireframe_blends_by_overlay_weight() {
        let mut wire = Light::point(
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.0, 1.0, 0.0),
            Attenuation::new(1.0, 0.0, 0.0),
        );
        wire.emit_wireframe = true;
        let light = gpu(wire);

        let on_edge = light_contribution(
            &light,
            &white_material(),
            Vec3::ONE,
            Vec3::ZERO,
            Vec3::Z,
            Vec3::Z,
            1.0,
        );
        let interior = light_contribution(
            &light,
            &white_material(),
            Vec3::ONE,
            Vec3::ZERO,
            Vec3::Z,
            Vec3::Z,
            0.0,
        );

        assert!((on_edge - Vec3::new(0.0, 1.0, 0.0)).length() < 1e-5);
        assert_eq!(interior, Vec3::ZERO);
    }

    #[test]
    fn overlay_peaks_on_edges_and_vanishes_in_the_interior() {
        let derivative = Vec3::splat(0.01);

        let on_edge = wireframe_overlay(Vec3::new(0.0, 0.5, 0.5), derivative, 1.5);
        let interior = wireframe_overlay(Vec3::splat(1.0 / 3.0), derivative, 1.5);

        assert_eq!(on_edge, 1.0);
        assert!(interior < 1e-6);
    }

    #[test]
    fn reference_scenario_matches_hand_computed_shading() {
        // Unit-quad scenario: white diffuse, no specular, ambient grey,
        // one point light 10 units away with attenuation 1/(1 + 0.01*d^2).
        let material = white_material();
        let light = gpu(Light::point(
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::ONE,
            Attenuation::new(1.0, 0.0, 0.01),
        ));

        let color = shade(
            &material,
            Vec3::ONE,
            Vec3::splat(0.1),
            &[light],
            Vec3::ZERO,
            Vec3::Z,
            Vec3::new(0.0, 0.0, 10.0),
            0.0,
        );

        // Ambient 0.1 plus diffuse attenuated by 1/(1 + 0.01 * 100) = 0.5.
        assert!((color - Vec3::splat(0.6)).length() < 1e-5);
    }

    #[test]
    fn spot_cone_tag_round_trips_through_the_gpu_record() {
        let light = gpu(Light::spot(
            Vec3::ZERO,
            -Vec3::Z,
            Vec3::ONE,
            45.0,
            2.0,
            Attenuation::default(),
        ));
        assert_eq!(light.kind, LightKind::Spot { cone_angle: 45.0, concentration: 2.0 }.gpu_tag());
    }
}
