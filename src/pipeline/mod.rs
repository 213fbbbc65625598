//! Render pipeline construction
//!
//! One pipeline draws the whole scene: every mesh shares it, with
//! per-instance data arriving through the instance pools and per-material
//! data through the material table. The WGSL below and
//! [`phong`] implement the same shading model; keep them in step.

pub mod phong;

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::RenderResult;

/// Depth buffer format used by the scene pass.
pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

/// How aggressively the wireframe overlay hugs triangle edges, in units of
/// the barycentric screen-space derivative. Mirrored by `WIRE_SHARPNESS`
/// in the shader.
pub const WIREFRAME_EDGE_SHARPNESS: f32 = 1.5;

/// The scene pipeline and the bind group layouts it was built from. The
/// layouts are kept so the renderer can create matching bind groups once
/// its buffers exist.
pub struct ScenePipeline {
    pub pipeline: RenderPipelineHandle,
    pub scene_layout: BindGroupLayoutHandle,
    pub material_layout: BindGroupLayoutHandle,
}

/// Build the scene pipeline for the given swapchain format. Shader
/// compilation is the backend's problem; a failure here is load-fatal.
pub fn build<B: GraphicsBackend>(
    backend: &mut B,
    color_format: TextureFormat,
) -> RenderResult<ScenePipeline> {
    let scene_layout = backend.create_bind_group_layout(&[
        // Scene half of the frame block: matrices, camera, ambient.
        BindGroupLayoutEntry {
            binding: 0,
            visibility: ShaderStageFlags::VERTEX_FRAGMENT,
            ty: BindingType::UniformBuffer,
        },
        // Lighting half: light count plus the light array.
        BindGroupLayoutEntry {
            binding: 1,
            visibility: ShaderStageFlags::FRAGMENT,
            ty: BindingType::UniformBuffer,
        },
    ])?;

    let material_layout = backend.create_bind_group_layout(&[
        // Material table, fetched by record index.
        BindGroupLayoutEntry {
            binding: 0,
            visibility: ShaderStageFlags::FRAGMENT,
            ty: BindingType::StorageBuffer { read_only: true },
        },
        // Per-instance material indices; read in the vertex stage by
        // instance index and passed to the fragment stage flat.
        BindGroupLayoutEntry {
            binding: 1,
            visibility: ShaderStageFlags::VERTEX,
            ty: BindingType::StorageBuffer { read_only: true },
        },
        BindGroupLayoutEntry {
            binding: 2,
            visibility: ShaderStageFlags::FRAGMENT,
            ty: BindingType::Texture {
                sample_type: TextureSampleType::Float { filterable: true },
                dimension: TextureViewDimension::D2Array,
            },
        },
        BindGroupLayoutEntry {
            binding: 3,
            visibility: ShaderStageFlags::FRAGMENT,
            ty: BindingType::Sampler { comparison: false },
        },
    ])?;

    let pipeline = backend.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some("Scene Pipeline".into()),
        shader_source: SCENE_SHADER.into(),
        vertex_layouts: vec![
            Vertex::layout(),
            Vertex::barycentric_layout(),
            InstanceTransforms::layout(),
        ],
        bind_group_layouts: vec![scene_layout, material_layout],
        primitive_topology: PrimitiveTopology::TriangleList,
        front_face: FrontFace::Ccw,
        cull_mode: CullMode::Back,
        depth_stencil: Some(DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: CompareFunction::Less,
        }),
        color_format,
    })?;

    Ok(ScenePipeline {
        pipeline,
        scene_layout,
        material_layout,
    })
}

/// Scene shader: instanced vertex transform plus per-fragment Phong
/// shading with the emissive wireframe overlay.
pub const SCENE_SHADER: &str = r#"
struct SceneUniforms {
    projection: mat4x4<f32>,
    view: mat4x4<f32>,
    camera_position: vec4<f32>,
    ambient: vec4<f32>,
}

struct SceneLight {
    // xyz = world position
    position: vec4<f32>,
    // xyz = direction, w = kind (0 = point, 1 = spot, 2 = directional)
    direction: vec4<f32>,
    // xyz = unattenuated color
    color: vec4<f32>,
    // x = cone half-angle (degrees), y = concentration,
    // z = constant attenuation, w = linear attenuation
    params: vec4<f32>,
    // x = quadratic attenuation, y = wireframe flag
    extra: vec4<f32>,
}

struct LightingUniforms {
    light_count: u32,
    lights: array<SceneLight, 20>,
}

struct Material {
    // xyz = diffuse color, w = texture layer (-1 = none)
    diffuse: vec4<f32>,
    // xyz = specular color, w = shininess
    specular: vec4<f32>,
}

@group(0) @binding(0) var<uniform> scene: SceneUniforms;
@group(0) @binding(1) var<uniform> lighting: LightingUniforms;

@group(1) @binding(0) var<storage, read> materials: array<Material>;
@group(1) @binding(1) var<storage, read> material_indices: array<i32>;
@group(1) @binding(2) var textures: texture_2d_array<f32>;
@group(1) @binding(3) var texture_sampler: sampler;

const WIRE_SHARPNESS: f32 = 1.5;
const MIN_LIGHT_DISTANCE: f32 = 1e-5;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) barycentric: vec3<f32>,
    @location(4) model_0: vec4<f32>,
    @location(5) model_1: vec4<f32>,
    @location(6) model_2: vec4<f32>,
    @location(7) model_3: vec4<f32>,
    @location(8) pvm_0: vec4<f32>,
    @location(9) pvm_1: vec4<f32>,
    @location(10) pvm_2: vec4<f32>,
    @location(11) pvm_3: vec4<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) barycentric: vec3<f32>,
    @location(4) @interpolate(flat) material_index: i32,
}

@vertex
fn vs_main(
    input: VertexInput,
    @builtin(instance_index) instance_index: u32,
) -> VertexOutput {
    let model = mat4x4<f32>(input.model_0, input.model_1, input.model_2, input.model_3);
    let pvm = mat4x4<f32>(input.pvm_0, input.pvm_1, input.pvm_2, input.pvm_3);

    var output: VertexOutput;
    let world_pos = model * vec4<f32>(input.position, 1.0);
    output.world_position = world_pos.xyz;
    output.clip_position = pvm * vec4<f32>(input.position, 1.0);
    output.world_normal = normalize((model * vec4<f32>(input.normal, 0.0)).xyz);
    output.uv = input.uv;
    output.barycentric = input.barycentric;
    output.material_index = material_indices[instance_index];
    return output;
}

fn distance_attenuation(light: SceneLight, distance: f32) -> f32 {
    let divisor = light.params.z + light.params.w * distance + light.extra.x * distance * distance;
    if divisor <= 0.0 {
        return 0.0;
    }
    return 1.0 / divisor;
}

fn cone_attenuation(cone_angle_degrees: f32, cos_to_axis: f32) -> f32 {
    let edge = cos(radians(cone_angle_degrees));
    // A zero-size cone contains no direction at all.
    if edge >= 1.0 {
        return 0.0;
    }
    return smoothstep(edge, 1.0, cos_to_axis);
}

fn wireframe_overlay(barycentric: vec3<f32>) -> f32 {
    let derivative = fwidth(barycentric);
    let smoothed = smoothstep(vec3<f32>(0.0), derivative * WIRE_SHARPNESS, barycentric);
    let edge = min(smoothed.x, min(smoothed.y, smoothed.z));
    return 1.0 - edge;
}

fn light_contribution(
    light: SceneLight,
    material: Material,
    sampled: vec3<f32>,
    textured: bool,
    world_position: vec3<f32>,
    normal: vec3<f32>,
    view_dir: vec3<f32>,
    overlay: f32,
) -> vec3<f32> {
    let kind = light.direction.w;

    var to_light: vec3<f32>;
    var distance = 0.0;
    if kind == 2.0 {
        let direction = light.direction.xyz;
        if dot(direction, direction) <= MIN_LIGHT_DISTANCE {
            return vec3<f32>(0.0);
        }
        to_light = normalize(-direction);
    } else {
        let offset = light.position.xyz - world_position;
        distance = length(offset);
        if distance <= MIN_LIGHT_DISTANCE {
            return vec3<f32>(0.0);
        }
        to_light = offset / distance;
    }

    // A back-facing surface can receive neither diffuse nor specular.
    let lambertian = max(dot(to_light, normal), 0.0);
    if lambertian <= 0.0 {
        return vec3<f32>(0.0);
    }

    var attenuation = 1.0;
    if kind == 0.0 {
        attenuation = distance_attenuation(light, distance);
    } else if kind == 1.0 {
        let luminance = pow(max(dot(-light.direction.xyz, to_light), 0.0), light.params.y)
            * distance_attenuation(light, distance);
        attenuation = luminance * cone_attenuation(light.params.x, dot(-to_light, light.direction.xyz));
    }
    if attenuation <= 0.0 {
        return vec3<f32>(0.0);
    }

    if light.extra.y != 0.0 {
        // Emissive wireframe: attenuated but unshadowed color, weighted by
        // proximity to a triangle edge.
        return light.color.xyz * attenuation * overlay;
    }

    let tint = select(vec3<f32>(1.0), sampled, textured);
    let diffuse = material.diffuse.xyz * tint * lambertian;

    var specular = vec3<f32>(0.0);
    if material.specular.w > 0.0 {
        let alignment = max(dot(reflect(-to_light, normal), view_dir), 0.0);
        specular = material.specular.xyz * pow(alignment, material.specular.w);
    }

    return light.color.xyz * attenuation * (diffuse + specular);
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let normal = normalize(input.world_normal);
    let view_dir = normalize(scene.camera_position.xyz - input.world_position);
    let material = materials[input.material_index];

    let layer = i32(max(material.diffuse.w, 0.0));
    let sampled = textureSample(textures, texture_sampler, input.uv, layer).rgb;
    let textured = material.diffuse.w >= 0.0;

    let base = select(material.diffuse.xyz, sampled, textured);
    let overlay = wireframe_overlay(input.barycentric);

    var color = scene.ambient.xyz * base;

    let count = min(lighting.light_count, 20u);
    for (var i = 0u; i < count; i = i + 1u) {
        color = color + light_contribution(
            lighting.lights[i],
            material,
            sampled,
            textured,
            input.world_position,
            normal,
            view_dir,
            overlay,
        );
    }

    return vec4<f32>(color, 1.0);
}
"#;
