//! Scene renderer
//!
//! Ties the load-time pieces (geometry packer, material table, pool
//! sizing, pipeline) to the per-frame loop (scene block refresh, instance
//! batching, one instanced draw per mesh). All GPU resources created here
//! are singly owned by the renderer and touched only from the frame
//! producer; ordering is plain program order, write before draw.

use crate::backend::traits::*;
use crate::backend::types::{BufferDescriptor, BufferUsage, TextureDescriptor, TextureUsage};
use crate::error::RenderResult;
use crate::frame::{batch_instances, compute_pool_capacity, pool_payload, InstancePools, SceneBlock};
use crate::geometry::PackedGeometry;
use crate::materials::{MaterialTable, TextureData};
use crate::pipeline::{self, ScenePipeline, DEPTH_FORMAT};
use crate::scene::{Attenuation, Camera, FrameScene, Light, LightKind, SceneContent};
use glam::Vec3;

/// Renderer configuration.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Clear color for the scene pass.
    pub clear_color: [f32; 4],
    /// Distance attenuation of the synthesized camera-attached wireframe
    /// light.
    pub wireframe_light_attenuation: Attenuation,
    /// Cone half-angle in degrees used when the wireframe light cycles to
    /// its spot form.
    pub wireframe_cone_angle: f32,
    /// Beam concentration used by the spot form of the wireframe light.
    pub wireframe_concentration: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.1, 0.0, 1.0],
            wireframe_light_attenuation: Attenuation::new(1.0, 0.3, 0.0),
            wireframe_cone_angle: 30.0,
            wireframe_concentration: 2.0,
        }
    }
}

/// The scene renderer.
pub struct Renderer {
    config: RendererConfig,

    geometry: PackedGeometry,
    materials: MaterialTable,
    pools: InstancePools,
    pipeline: ScenePipeline,

    scene_buffer: BufferHandle,
    scene_bind_group: BindGroupHandle,
    material_bind_group: BindGroupHandle,

    depth_texture: TextureHandle,
    depth_view: TextureViewHandle,

    aspect_ratio: f32,
    wireframe_mode: bool,
    wireframe_kind: u32,
}

impl Renderer {
    /// Load a scene. Everything immutable is packed and uploaded here:
    /// shared geometry, the material table, the sized-once instance pools
    /// and the pipeline. `texture_loader` is the external decode
    /// collaborator handed through to the material table;
    /// [`TextureData::from_file`] is the usual choice.
    pub fn load<B, F>(
        backend: &mut B,
        content: &SceneContent,
        config: RendererConfig,
        texture_loader: F,
    ) -> RenderResult<Self>
    where
        B: GraphicsBackend,
        F: FnMut(&str) -> Result<TextureData, String>,
    {
        let geometry = PackedGeometry::pack(backend, &content.meshes)?;
        let materials = MaterialTable::build(backend, &content.materials, texture_loader)?;

        let capacity = compute_pool_capacity(&content.meshes, &content.instances);
        let pools = InstancePools::allocate(backend, capacity)?;

        let scene_buffer = backend.create_buffer(&BufferDescriptor {
            label: Some("Scene Block".into()),
            size: std::mem::size_of::<SceneBlock>() as u64,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        })?;

        let pipeline = pipeline::build(backend, backend.swapchain_format())?;
        let (scene_bind_group, material_bind_group) =
            Self::create_bind_groups(backend, &pipeline, scene_buffer, &materials, &pools)?;

        let (width, height) = backend.surface_size();
        let (depth_texture, depth_view) = Self::create_depth_buffer(backend, width, height)?;

        log::info!("scene loaded: pool capacity {}", capacity);

        Ok(Self {
            config,
            geometry,
            materials,
            pools,
            pipeline,
            scene_buffer,
            scene_bind_group,
            material_bind_group,
            depth_texture,
            depth_view,
            aspect_ratio: width as f32 / height as f32,
            wireframe_mode: false,
            wireframe_kind: 0,
        })
    }

    fn create_bind_groups<B: GraphicsBackend>(
        backend: &mut B,
        pipeline: &ScenePipeline,
        scene_buffer: BufferHandle,
        materials: &MaterialTable,
        pools: &InstancePools,
    ) -> RenderResult<(BindGroupHandle, BindGroupHandle)> {
        // The scene block is one buffer bound as two ranges: scene fields
        // first, the light array from the 256-byte mark.
        let scene_bind_group = backend.create_bind_group(
            pipeline.scene_layout,
            &[
                (
                    0,
                    BindGroupEntry::Buffer {
                        buffer: scene_buffer,
                        offset: SceneBlock::SCENE_OFFSET,
                        size: Some(SceneBlock::SCENE_SIZE),
                    },
                ),
                (
                    1,
                    BindGroupEntry::Buffer {
                        buffer: scene_buffer,
                        offset: SceneBlock::LIGHTING_OFFSET,
                        size: Some(SceneBlock::LIGHTING_SIZE),
                    },
                ),
            ],
        )?;

        let material_bind_group = backend.create_bind_group(
            pipeline.material_layout,
            &[
                (
                    0,
                    BindGroupEntry::Buffer {
                        buffer: materials.record_buffer,
                        offset: 0,
                        size: None,
                    },
                ),
                (
                    1,
                    BindGroupEntry::Buffer {
                        buffer: pools.material_index_buffer,
                        offset: 0,
                        size: None,
                    },
                ),
                (2, BindGroupEntry::Texture(materials.texture_view)),
                (3, BindGroupEntry::Sampler(materials.sampler)),
            ],
        )?;

        Ok((scene_bind_group, material_bind_group))
    }

    fn create_depth_buffer<B: GraphicsBackend>(
        backend: &mut B,
        width: u32,
        height: u32,
    ) -> RenderResult<(TextureHandle, TextureViewHandle)> {
        let texture = backend.create_texture(&TextureDescriptor {
            label: Some("Depth Buffer".into()),
            width,
            height,
            array_layers: 1,
            mip_levels: 1,
            format: DEPTH_FORMAT,
            usage: TextureUsage::RENDER_ATTACHMENT,
        })?;
        let view = backend.create_texture_view(texture)?;

        Ok((texture, view))
    }

    /// Render one frame of the live scene.
    pub fn render_frame<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        scene: &FrameScene,
    ) -> RenderResult<()> {
        let frame = backend.begin_frame()?;

        let projection = scene.camera.projection_matrix(self.aspect_ratio);
        let view = scene.camera.view_matrix();
        let projection_view = projection * view;

        // Refresh the scene/lighting block in one write, before any draw.
        let wireframe_light = if self.wireframe_mode {
            Some(self.wireframe_light(scene.camera))
        } else {
            None
        };
        let block = SceneBlock::build(
            projection,
            view,
            scene.camera.position,
            scene.ambient,
            scene.lights.iter().chain(wireframe_light.as_ref()),
        );
        backend.write_buffer(self.scene_buffer, 0, bytemuck::bytes_of(&block));

        let batches = batch_instances(self.geometry.meshes(), scene.instances);

        let mut cleared = false;
        for batch in &batches {
            let (transforms, material_indices) = pool_payload(
                batch,
                &self.materials,
                projection_view,
                self.pools.capacity(),
            );
            if transforms.is_empty() {
                continue;
            }

            // Rewrite the shared pools for this mesh, then draw it. Each
            // batch gets its own pass so the pool rewrite stays ordered
            // between the previous draw and this one.
            self.pools.write(backend, &transforms, &material_indices);

            self.encode_batch_pass(
                backend,
                &frame,
                !cleared,
                batch.range.index_byte_offset,
                batch.range.element_count,
                batch.range.vertex_offset as i32,
                transforms.len() as u32,
            );
            cleared = true;
        }

        // An empty frame still clears the screen.
        if !cleared {
            backend.begin_render_pass(&RenderPassDescriptor {
                label: Some("Clear Pass".into()),
                color_attachments: vec![ColorAttachment {
                    view: frame.swapchain_view,
                    load_op: LoadOp::Clear(self.config.clear_color),
                    store_op: StoreOp::Store,
                }],
                depth_stencil_attachment: Some(DepthStencilAttachment {
                    view: self.depth_view,
                    depth_load_op: LoadOp::Clear([1.0, 0.0, 0.0, 0.0]),
                    depth_store_op: StoreOp::Store,
                    depth_clear_value: 1.0,
                }),
            });
            backend.end_render_pass();
        }

        Ok(backend.end_frame()?)
    }

    #[allow(clippy::too_many_arguments)]
    fn encode_batch_pass<B: GraphicsBackend>(
        &self,
        backend: &mut B,
        frame: &FrameContext,
        clear: bool,
        index_byte_offset: u64,
        element_count: u32,
        base_vertex: i32,
        instance_count: u32,
    ) {
        let (color_load, depth_load) = if clear {
            (
                LoadOp::Clear(self.config.clear_color),
                LoadOp::Clear([1.0, 0.0, 0.0, 0.0]),
            )
        } else {
            (LoadOp::Load, LoadOp::Load)
        };

        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Scene Pass".into()),
            color_attachments: vec![ColorAttachment {
                view: frame.swapchain_view,
                load_op: color_load,
                store_op: StoreOp::Store,
            }],
            depth_stencil_attachment: Some(DepthStencilAttachment {
                view: self.depth_view,
                depth_load_op: depth_load,
                depth_store_op: StoreOp::Store,
                depth_clear_value: 1.0,
            }),
        });

        backend.set_viewport(0.0, 0.0, frame.width as f32, frame.height as f32, 0.0, 1.0);
        backend.set_render_pipeline(self.pipeline.pipeline);
        backend.set_bind_group(0, self.scene_bind_group);
        backend.set_bind_group(1, self.material_bind_group);
        backend.set_vertex_buffer(0, self.geometry.vertex_buffer, 0);
        backend.set_vertex_buffer(1, self.geometry.barycentric_buffer, 0);
        backend.set_vertex_buffer(2, self.pools.transform_buffer, 0);
        backend.set_index_buffer(
            self.geometry.index_buffer,
            index_byte_offset,
            IndexFormat::Uint32,
        );
        backend.draw_indexed(0..element_count, base_vertex, 0..instance_count);
        backend.end_render_pass();
    }

    /// The camera-attached light that paints the wireframe overlay when
    /// wireframe mode is on.
    fn wireframe_light(&self, camera: &Camera) -> Light {
        let kind = match self.wireframe_kind {
            0 => LightKind::Point,
            1 => LightKind::Spot {
                cone_angle: self.config.wireframe_cone_angle,
                concentration: self.config.wireframe_concentration,
            },
            _ => LightKind::Directional,
        };

        Light {
            kind,
            position: camera.position,
            direction: camera.direction,
            color: Vec3::ONE,
            attenuation: self.config.wireframe_light_attenuation,
            emit_wireframe: true,
        }
    }

    /// Enable or disable the wireframe overlay near the camera.
    pub fn toggle_wireframe_mode(&mut self) {
        self.wireframe_mode = !self.wireframe_mode;
    }

    pub fn wireframe_mode(&self) -> bool {
        self.wireframe_mode
    }

    /// Cycle the wireframe light through point, spot and directional.
    pub fn cycle_wireframe_kind(&mut self) {
        self.wireframe_kind = (self.wireframe_kind + 1) % 3;
    }

    /// Rebuild the render pipeline, e.g. after editing the shader during
    /// development. On failure the previous pipeline stays in place.
    pub fn rebuild_pipeline<B: GraphicsBackend>(&mut self, backend: &mut B) -> RenderResult<()> {
        let pipeline = pipeline::build(backend, backend.swapchain_format())?;
        let (scene_bind_group, material_bind_group) = Self::create_bind_groups(
            backend,
            &pipeline,
            self.scene_buffer,
            &self.materials,
            &self.pools,
        )?;

        self.pipeline = pipeline;
        self.scene_bind_group = scene_bind_group;
        self.material_bind_group = material_bind_group;

        Ok(())
    }

    /// Handle a window resize: reconfigure the surface, recompute the
    /// aspect ratio and rebuild the depth buffer.
    pub fn resize<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        width: u32,
        height: u32,
    ) -> RenderResult<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }

        backend.resize(width, height);

        // The surface may clamp to device limits, so read the size back.
        let (actual_width, actual_height) = backend.surface_size();
        self.aspect_ratio = actual_width as f32 / actual_height as f32;

        backend.destroy_texture(self.depth_texture);
        let (depth_texture, depth_view) =
            Self::create_depth_buffer(backend, actual_width, actual_height)?;
        self.depth_texture = depth_texture;
        self.depth_view = depth_view;

        Ok(())
    }

    /// Release every GPU resource the renderer owns.
    pub fn unload<B: GraphicsBackend>(&self, backend: &mut B) {
        self.geometry.destroy(backend);
        self.materials.destroy(backend);
        self.pools.destroy(backend);
        backend.destroy_buffer(self.scene_buffer);
        backend.destroy_texture(self.depth_texture);
    }

    pub fn geometry(&self) -> &PackedGeometry {
        &self.geometry
    }

    pub fn materials(&self) -> &MaterialTable {
        &self.materials
    }

    pub fn pools(&self) -> &InstancePools {
        &self.pools
    }

    pub fn scene_buffer(&self) -> BufferHandle {
        self.scene_buffer
    }
}
