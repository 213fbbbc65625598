//! Integration tests driving a full load + frame against the headless
//! backend, asserting on the recorded draws and the exact bytes the
//! renderer uploaded.

use glam::{Mat4, Vec3};
use instanced_scene::backend::headless::HeadlessBackend;
use instanced_scene::backend::types::InstanceTransforms;
use instanced_scene::frame::uniforms::SceneBlock;
use instanced_scene::materials::TextureData;
use instanced_scene::pipeline::phong;
use instanced_scene::scene::{
    Attenuation, Camera, FrameScene, Instance, Light, MaterialData, MaterialId, MeshData, MeshId,
    SceneContent,
};
use instanced_scene::{Renderer, RendererConfig, MAX_LIGHTS};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn white_loader(_: &str) -> Result<TextureData, String> {
    Ok(TextureData::white())
}

fn quad_scene() -> SceneContent {
    let instances = vec![
        Instance {
            mesh: MeshId(0),
            transform: Mat4::IDENTITY,
            material: MaterialId(0),
        },
        Instance {
            mesh: MeshId(0),
            transform: Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)),
            material: MaterialId(0),
        },
    ];

    SceneContent::new(
        vec![MeshData::quad(MeshId(0))],
        vec![MaterialData::untextured(
            MaterialId(0),
            Vec3::ONE,
            Vec3::ZERO,
            0.0,
        )],
        instances,
    )
}

fn facing_camera() -> Camera {
    let mut camera = Camera::new(Vec3::new(0.0, 0.0, 10.0), -Vec3::Z);
    camera.look_at(Vec3::ZERO);
    camera
}

fn read_transforms(backend: &HeadlessBackend, renderer: &Renderer, count: usize) -> Vec<InstanceTransforms> {
    let bytes = backend
        .buffer_data(renderer.pools().transform_buffer)
        .expect("transform pool exists");

    let stride = std::mem::size_of::<InstanceTransforms>();
    (0..count)
        .map(|i| bytemuck::pod_read_unaligned(&bytes[i * stride..(i + 1) * stride]))
        .collect()
}

fn read_scene_block(backend: &HeadlessBackend, renderer: &Renderer) -> SceneBlock {
    let bytes = backend
        .buffer_data(renderer.scene_buffer())
        .expect("scene block exists");
    bytemuck::pod_read_unaligned(bytes)
}

#[test]
fn end_to_end_quad_scenario() {
    init_logs();
    let mut backend = HeadlessBackend::new(800, 600);
    let content = quad_scene();
    let mut renderer = Renderer::load(
        &mut backend,
        &content,
        RendererConfig::default(),
        white_loader,
    )
    .unwrap();

    let camera = facing_camera();
    let lights = [Light::point(
        Vec3::new(0.0, 0.0, 10.0),
        Vec3::ONE,
        Attenuation::new(1.0, 0.0, 0.01),
    )];

    renderer
        .render_frame(
            &mut backend,
            &FrameScene {
                camera: &camera,
                ambient: Vec3::splat(0.1),
                lights: &lights,
                instances: &content.instances,
            },
        )
        .unwrap();

    // Exactly one draw, instanced twice, covering the quad's six indices.
    let draws = backend.recorded_draws();
    assert_eq!(draws.len(), 1);
    let draw = draws[0];
    assert_eq!(draw.indices, 0..6);
    assert_eq!(draw.base_vertex, 0);
    assert_eq!(draw.instances, 0..2);

    // Pool slot 0 holds the identity pair, slot 1 the translated one.
    let transforms = read_transforms(&backend, &renderer, 2);
    let projection_view =
        camera.projection_matrix(800.0 / 600.0) * camera.view_matrix();

    assert_eq!(transforms[0].model, Mat4::IDENTITY);
    assert!((transforms[0].pvm.to_cols_array()
        .iter()
        .zip(projection_view.to_cols_array().iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0f32, f32::max))
        < 1e-5);

    let translated = Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0));
    assert_eq!(transforms[1].model, translated);

    // The uploaded block drives the reference shading model to the
    // expected fragment color: ambient 0.1 plus diffuse attenuated by
    // 1 / (1 + 0.01 * 10^2) = 0.5 at distance 10.
    let block = read_scene_block(&backend, &renderer);
    assert_eq!(block.light_count, 1);

    let material = renderer.materials().records()[0];
    let color = phong::shade(
        &material,
        Vec3::ONE,
        block.ambient,
        &block.lights[..block.light_count as usize],
        Vec3::ZERO,
        Vec3::Z,
        block.camera_position,
        0.0,
    );
    assert!((color - Vec3::splat(0.6)).length() < 1e-4);
}

#[test]
fn meshes_draw_in_load_order_with_shared_buffer_addressing() {
    init_logs();
    let mut backend = HeadlessBackend::new(640, 480);

    let meshes = vec![
        MeshData::quad(MeshId(10)),
        MeshData::cube(MeshId(11)),
        MeshData::quad(MeshId(12)),
    ];
    let materials = vec![MaterialData::untextured(
        MaterialId(0),
        Vec3::ONE,
        Vec3::ZERO,
        0.0,
    )];
    // The cube gets two instances, the second quad one; the first quad has
    // none and must not be drawn at all.
    let instances = vec![
        Instance {
            mesh: MeshId(12),
            transform: Mat4::IDENTITY,
            material: MaterialId(0),
        },
        Instance {
            mesh: MeshId(11),
            transform: Mat4::IDENTITY,
            material: MaterialId(0),
        },
        Instance {
            mesh: MeshId(11),
            transform: Mat4::from_translation(Vec3::X),
            material: MaterialId(0),
        },
    ];

    let content = SceneContent::new(meshes, materials, instances);
    let mut renderer = Renderer::load(
        &mut backend,
        &content,
        RendererConfig::default(),
        white_loader,
    )
    .unwrap();

    assert_eq!(renderer.pools().capacity(), 2);

    let camera = facing_camera();
    renderer
        .render_frame(
            &mut backend,
            &FrameScene {
                camera: &camera,
                ambient: Vec3::ZERO,
                lights: &[],
                instances: &content.instances,
            },
        )
        .unwrap();

    let draws = backend.recorded_draws();
    assert_eq!(draws.len(), 2);

    // Load order: the cube (mesh 11) precedes the second quad (mesh 12)
    // even though the frame listed the quad's instance first.
    let cube = draws[0];
    assert_eq!(cube.indices, 0..36);
    assert_eq!(cube.base_vertex, 4);
    assert_eq!(cube.instances, 0..2);
    assert_eq!(cube.index_buffer.unwrap().1, 24);

    let quad = draws[1];
    assert_eq!(quad.indices, 0..6);
    assert_eq!(quad.base_vertex, 4 + 24);
    assert_eq!(quad.instances, 0..1);
    assert_eq!(quad.index_buffer.unwrap().1, 24 + 144);
}

#[test]
fn excess_lights_are_truncated_in_the_uploaded_block() {
    init_logs();
    let mut backend = HeadlessBackend::new(320, 240);
    let content = quad_scene();
    let mut renderer = Renderer::load(
        &mut backend,
        &content,
        RendererConfig::default(),
        white_loader,
    )
    .unwrap();

    let lights: Vec<Light> = (0..MAX_LIGHTS + 5)
        .map(|i| {
            Light::point(
                Vec3::new(i as f32, 0.0, 0.0),
                Vec3::ONE,
                Attenuation::default(),
            )
        })
        .collect();

    let camera = facing_camera();
    renderer
        .render_frame(
            &mut backend,
            &FrameScene {
                camera: &camera,
                ambient: Vec3::ZERO,
                lights: &lights,
                instances: &content.instances,
            },
        )
        .unwrap();

    let block = read_scene_block(&backend, &renderer);
    assert_eq!(block.light_count, MAX_LIGHTS as u32);
    for i in 0..MAX_LIGHTS {
        assert_eq!(block.lights[i].position.x, i as f32);
    }
}

#[test]
fn wireframe_mode_appends_a_camera_anchored_light() {
    init_logs();
    let mut backend = HeadlessBackend::new(320, 240);
    let content = quad_scene();
    let mut renderer = Renderer::load(
        &mut backend,
        &content,
        RendererConfig::default(),
        white_loader,
    )
    .unwrap();

    let camera = facing_camera();
    let lights = [Light::point(Vec3::ZERO, Vec3::ONE, Attenuation::default())];

    renderer.toggle_wireframe_mode();
    renderer
        .render_frame(
            &mut backend,
            &FrameScene {
                camera: &camera,
                ambient: Vec3::ZERO,
                lights: &lights,
                instances: &content.instances,
            },
        )
        .unwrap();

    let block = read_scene_block(&backend, &renderer);
    assert_eq!(block.light_count, 2);

    let wire = block.lights[1];
    assert_eq!(wire.emit_wireframe, 1.0);
    assert_eq!(wire.kind, 0.0);
    assert!((wire.position - camera.position).length() < 1e-6);
    assert_eq!(wire.attenuation_linear, 0.3);

    // Cycling switches the synthesized light to its spot form.
    renderer.cycle_wireframe_kind();
    renderer
        .render_frame(
            &mut backend,
            &FrameScene {
                camera: &camera,
                ambient: Vec3::ZERO,
                lights: &lights,
                instances: &content.instances,
            },
        )
        .unwrap();

    let block = read_scene_block(&backend, &renderer);
    assert_eq!(block.lights[1].kind, 1.0);
    assert_eq!(block.lights[1].cone_angle, 30.0);

    // Toggling off removes it again.
    renderer.toggle_wireframe_mode();
    renderer
        .render_frame(
            &mut backend,
            &FrameScene {
                camera: &camera,
                ambient: Vec3::ZERO,
                lights: &lights,
                instances: &content.instances,
            },
        )
        .unwrap();

    let block = read_scene_block(&backend, &renderer);
    assert_eq!(block.light_count, 1);
}

#[test]
fn unknown_material_ids_fall_back_to_the_default_record() {
    init_logs();
    let mut backend = HeadlessBackend::new(320, 240);

    let mut content = quad_scene();
    content.instances[1].material = MaterialId(42);

    let mut renderer = Renderer::load(
        &mut backend,
        &content,
        RendererConfig::default(),
        white_loader,
    )
    .unwrap();

    let camera = facing_camera();
    renderer
        .render_frame(
            &mut backend,
            &FrameScene {
                camera: &camera,
                ambient: Vec3::ZERO,
                lights: &[],
                instances: &content.instances,
            },
        )
        .unwrap();

    // The frame still produced its draw.
    assert_eq!(backend.recorded_draws().len(), 1);

    // Slot 1 of the material-index pool points at the default record.
    let bytes = backend
        .buffer_data(renderer.pools().material_index_buffer)
        .unwrap();
    let indices: [i32; 2] = [
        bytemuck::pod_read_unaligned(&bytes[0..4]),
        bytemuck::pod_read_unaligned(&bytes[4..8]),
    ];
    assert_eq!(indices[0], 0);
    assert_eq!(indices[1], renderer.materials().default_index());

    let default = renderer.materials().records()[indices[1] as usize];
    assert_eq!(default.diffuse, Vec3::ZERO);
}

#[test]
fn empty_frames_still_clear_the_screen() {
    init_logs();
    let mut backend = HeadlessBackend::new(320, 240);
    let content = quad_scene();
    let mut renderer = Renderer::load(
        &mut backend,
        &content,
        RendererConfig::default(),
        white_loader,
    )
    .unwrap();

    let camera = facing_camera();
    renderer
        .render_frame(
            &mut backend,
            &FrameScene {
                camera: &camera,
                ambient: Vec3::ZERO,
                lights: &[],
                instances: &[],
            },
        )
        .unwrap();

    let passes = backend.recorded_passes();
    assert_eq!(passes.len(), 1);
    assert_eq!(passes[0].label.as_deref(), Some("Clear Pass"));
    assert!(passes[0].draws.is_empty());
}

#[test]
fn unloading_releases_the_shared_buffers() {
    init_logs();
    let mut backend = HeadlessBackend::new(320, 240);
    let content = quad_scene();
    let renderer = Renderer::load(
        &mut backend,
        &content,
        RendererConfig::default(),
        white_loader,
    )
    .unwrap();

    let vertex_buffer = renderer.geometry().vertex_buffer;
    assert!(backend.buffer_data(vertex_buffer).is_some());

    renderer.unload(&mut backend);
    assert!(backend.buffer_data(vertex_buffer).is_none());
    assert!(backend.buffer_data(renderer.scene_buffer()).is_none());
}
