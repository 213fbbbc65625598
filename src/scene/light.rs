//! Light types for the scene

use glam::Vec3;

/// Distance attenuation coefficients for the standard falloff formula
/// `1 / (constant + linear * d + quadratic * d^2)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attenuation {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Default for Attenuation {
    fn default() -> Self {
        Self {
            constant: 1.0,
            linear: 0.0,
            quadratic: 1.0,
        }
    }
}

impl Attenuation {
    pub fn new(constant: f32, linear: f32, quadratic: f32) -> Self {
        Self {
            constant,
            linear,
            quadratic,
        }
    }

    /// Falloff factor at the given distance. Degenerate coefficient sets
    /// that would divide by zero (or amplify instead of attenuate) clamp to
    /// zero contribution.
    pub fn factor(&self, distance: f32) -> f32 {
        let divisor = self.constant + self.linear * distance + self.quadratic * distance * distance;
        if divisor <= 0.0 {
            0.0
        } else {
            1.0 / divisor
        }
    }
}

/// What kind of light this is. Point, spot and directional lights differ
/// only in how their attenuation is computed, so the distinction is a tag
/// dispatched inside the per-light shading routine rather than a type
/// hierarchy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Point,
    Spot {
        /// Half-angle of the light cone in degrees.
        cone_angle: f32,
        /// Exponent shaping how sharply luminance concentrates on the axis.
        concentration: f32,
    },
    Directional,
}

impl LightKind {
    /// Numeric tag as stored in the GPU light record.
    pub fn gpu_tag(&self) -> f32 {
        match self {
            LightKind::Point => 0.0,
            LightKind::Spot { .. } => 1.0,
            LightKind::Directional => 2.0,
        }
    }
}

/// A dynamic light, supplied by the host each frame.
#[derive(Debug, Clone)]
pub struct Light {
    pub kind: LightKind,
    pub position: Vec3,
    pub direction: Vec3,
    pub color: Vec3,
    pub attenuation: Attenuation,
    /// Render this light's contribution as an emissive wireframe overlay
    /// instead of standard diffuse/specular shading.
    pub emit_wireframe: bool,
}

impl Light {
    pub fn point(position: Vec3, color: Vec3, attenuation: Attenuation) -> Self {
        Self {
            kind: LightKind::Point,
            position,
            direction: -Vec3::Y,
            color,
            attenuation,
            emit_wireframe: false,
        }
    }

    pub fn spot(
        position: Vec3,
        direction: Vec3,
        color: Vec3,
        cone_angle: f32,
        concentration: f32,
        attenuation: Attenuation,
    ) -> Self {
        Self {
            kind: LightKind::Spot {
                cone_angle,
                concentration,
            },
            position,
            direction: direction.normalize(),
            color,
            attenuation,
            emit_wireframe: false,
        }
    }

    pub fn directional(direction: Vec3, color: Vec3) -> Self {
        Self {
            kind: LightKind::Directional,
            position: Vec3::ZERO,
            direction: direction.normalize(),
            color,
            attenuation: Attenuation::new(1.0, 0.0, 0.0),
            emit_wireframe: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attenuation_at_zero_distance_is_the_constant_reciprocal() {
        let attenuation = Attenuation::new(2.0, 0.5, 0.1);
        assert!((attenuation.factor(0.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn attenuation_vanishes_at_large_distances() {
        let attenuation = Attenuation::new(1.0, 0.0, 0.01);
        assert!(attenuation.factor(1e6) < 1e-6);
    }

    #[test]
    fn degenerate_attenuation_clamps_to_zero() {
        let attenuation = Attenuation::new(0.0, 0.0, 0.0);
        assert_eq!(attenuation.factor(5.0), 0.0);
    }

    #[test]
    fn spot_constructor_normalizes_the_direction() {
        let light = Light::spot(
            Vec3::ZERO,
            Vec3::new(0.0, -3.0, 0.0),
            Vec3::ONE,
            45.0,
            2.0,
            Attenuation::default(),
        );
        assert!((light.direction.length() - 1.0).abs() < 1e-6);
    }
}
