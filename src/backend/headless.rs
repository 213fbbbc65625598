//! Headless backend for testing and development.
//!
//! No GPU work happens here: buffer writes land in plain memory and every
//! draw is recorded with the binding state that was current when it was
//! issued. Tests load a scene, render a frame and then assert on the
//! recorded submissions and the exact bytes the renderer uploaded.

use crate::backend::traits::*;
use crate::backend::types::*;
use std::collections::HashMap;

/// In-memory stand-in for a GPU buffer.
struct HeadlessBuffer {
    data: Vec<u8>,
    usage: BufferUsage,
}

/// One recorded indexed draw together with the state bound at submission.
#[derive(Debug, Clone)]
pub struct RecordedDraw {
    pub pipeline: Option<RenderPipelineHandle>,
    pub bind_groups: Vec<(u32, BindGroupHandle)>,
    pub vertex_buffers: Vec<(u32, BufferHandle, u64)>,
    pub index_buffer: Option<(BufferHandle, u64, IndexFormat)>,
    pub indices: std::ops::Range<u32>,
    pub base_vertex: i32,
    pub instances: std::ops::Range<u32>,
}

/// A finished render pass and the draws it contained.
#[derive(Debug, Clone)]
pub struct RecordedPass {
    pub label: Option<String>,
    pub draws: Vec<RecordedDraw>,
}

/// Binding state tracked while a pass is open.
#[derive(Default)]
struct PassState {
    pipeline: Option<RenderPipelineHandle>,
    bind_groups: HashMap<u32, BindGroupHandle>,
    vertex_buffers: HashMap<u32, (BufferHandle, u64)>,
    index_buffer: Option<(BufferHandle, u64, IndexFormat)>,
}

/// Headless backend.
pub struct HeadlessBackend {
    width: u32,
    height: u32,

    buffers: HashMap<u64, HeadlessBuffer>,
    texture_descs: HashMap<u64, TextureDescriptor>,
    texture_views: HashMap<u64, TextureHandle>,

    next_id: u64,

    current_pass: Option<(Option<String>, PassState, Vec<RecordedDraw>)>,
    passes: Vec<RecordedPass>,

    in_frame: bool,
    swapchain_view: TextureViewHandle,
}

impl HeadlessBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            buffers: HashMap::new(),
            texture_descs: HashMap::new(),
            texture_views: HashMap::new(),
            next_id: 1,
            current_pass: None,
            passes: Vec::new(),
            in_frame: false,
            swapchain_view: TextureViewHandle(0),
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Bytes currently stored in a buffer.
    pub fn buffer_data(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer.0).map(|b| b.data.as_slice())
    }

    /// Declared size of a buffer in bytes.
    pub fn buffer_size(&self, buffer: BufferHandle) -> Option<u64> {
        self.buffers.get(&buffer.0).map(|b| b.data.len() as u64)
    }

    /// All passes recorded so far, oldest first.
    pub fn recorded_passes(&self) -> &[RecordedPass] {
        &self.passes
    }

    /// Every draw across all recorded passes, in submission order.
    pub fn recorded_draws(&self) -> Vec<&RecordedDraw> {
        self.passes.iter().flat_map(|p| p.draws.iter()).collect()
    }

    /// Forget recorded passes, keeping resources alive. Useful between
    /// frames when a test only cares about the most recent one.
    pub fn clear_recording(&mut self) {
        self.passes.clear();
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.width = width;
            self.height = height;
        }
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn begin_frame(&mut self) -> BackendResult<FrameContext> {
        let id = self.next_id();
        self.swapchain_view = TextureViewHandle(id);
        self.in_frame = true;

        Ok(FrameContext {
            swapchain_view: self.swapchain_view,
            width: self.width,
            height: self.height,
        })
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        self.in_frame = false;
        Ok(())
    }

    fn swapchain_format(&self) -> TextureFormat {
        TextureFormat::Bgra8UnormSrgb
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        log::trace!(
            "headless: creating buffer {:?} (size: {})",
            desc.label,
            desc.size
        );

        let id = self.next_id();
        self.buffers.insert(
            id,
            HeadlessBuffer {
                data: vec![0u8; desc.size as usize],
                usage: desc.usage,
            },
        );

        Ok(BufferHandle(id))
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        log::trace!(
            "headless: creating buffer {:?} with {} initial bytes",
            desc.label,
            data.len()
        );

        let id = self.next_id();
        self.buffers.insert(
            id,
            HeadlessBuffer {
                data: data.to_vec(),
                usage: desc.usage,
            },
        );

        Ok(BufferHandle(id))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        let Some(buf) = self.buffers.get_mut(&buffer.0) else {
            return;
        };

        if !buf.usage.contains(BufferUsage::COPY_DST) {
            log::warn!("headless: write to buffer created without COPY_DST");
        }

        let start = offset as usize;
        let end = start + data.len();
        if end > buf.data.len() {
            log::warn!(
                "headless: write of {} bytes at offset {} exceeds buffer size {}",
                data.len(),
                offset,
                buf.data.len()
            );
            return;
        }

        buf.data[start..end].copy_from_slice(data);
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        log::trace!(
            "headless: creating texture {:?} ({}x{}x{})",
            desc.label,
            desc.width,
            desc.height,
            desc.array_layers
        );

        let id = self.next_id();
        self.texture_descs.insert(id, desc.clone());

        Ok(TextureHandle(id))
    }

    fn create_texture_view(&mut self, texture: TextureHandle) -> BackendResult<TextureViewHandle> {
        if !self.texture_descs.contains_key(&texture.0) {
            return Err(BackendError::TextureCreationFailed(
                "Texture not found".into(),
            ));
        }

        let id = self.next_id();
        self.texture_views.insert(id, texture);

        Ok(TextureViewHandle(id))
    }

    fn write_texture(&mut self, texture: TextureHandle, data: &[u8], width: u32, height: u32, layer: u32) {
        log::trace!(
            "headless: write_texture {:?} ({}x{}) layer {} len={}",
            texture,
            width,
            height,
            layer,
            data.len()
        );
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        log::trace!("headless: creating sampler {:?}", desc.label);
        let id = self.next_id();
        Ok(SamplerHandle(id))
    }

    fn create_bind_group_layout(
        &mut self,
        _entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle> {
        let id = self.next_id();
        Ok(BindGroupLayoutHandle(id))
    }

    fn create_bind_group(
        &mut self,
        _layout: BindGroupLayoutHandle,
        _entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle> {
        let id = self.next_id();
        Ok(BindGroupHandle(id))
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle> {
        log::trace!("headless: creating render pipeline {:?}", desc.label);
        let id = self.next_id();
        Ok(RenderPipelineHandle(id))
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) {
        self.current_pass = Some((desc.label.clone(), PassState::default(), Vec::new()));
    }

    fn end_render_pass(&mut self) {
        if let Some((label, _, draws)) = self.current_pass.take() {
            self.passes.push(RecordedPass { label, draws });
        }
    }

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        if let Some((_, state, _)) = self.current_pass.as_mut() {
            state.pipeline = Some(pipeline);
        }
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle) {
        if let Some((_, state, _)) = self.current_pass.as_mut() {
            state.bind_groups.insert(index, bind_group);
        }
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle, offset: u64) {
        if let Some((_, state, _)) = self.current_pass.as_mut() {
            state.vertex_buffers.insert(slot, (buffer, offset));
        }
    }

    fn set_index_buffer(&mut self, buffer: BufferHandle, offset: u64, format: IndexFormat) {
        if let Some((_, state, _)) = self.current_pass.as_mut() {
            state.index_buffer = Some((buffer, offset, format));
        }
    }

    fn set_viewport(&mut self, _x: f32, _y: f32, _width: f32, _height: f32, _min_depth: f32, _max_depth: f32) {}

    fn draw_indexed(
        &mut self,
        indices: std::ops::Range<u32>,
        base_vertex: i32,
        instances: std::ops::Range<u32>,
    ) {
        let Some((_, state, draws)) = self.current_pass.as_mut() else {
            return;
        };

        let mut bind_groups: Vec<(u32, BindGroupHandle)> =
            state.bind_groups.iter().map(|(i, bg)| (*i, *bg)).collect();
        bind_groups.sort_by_key(|(i, _)| *i);

        let mut vertex_buffers: Vec<(u32, BufferHandle, u64)> = state
            .vertex_buffers
            .iter()
            .map(|(slot, (buffer, offset))| (*slot, *buffer, *offset))
            .collect();
        vertex_buffers.sort_by_key(|(slot, _, _)| *slot);

        draws.push(RecordedDraw {
            pipeline: state.pipeline,
            bind_groups,
            vertex_buffers,
            index_buffer: state.index_buffer,
            indices,
            base_vertex,
            instances,
        });
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer.0);
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.texture_descs.remove(&texture.0);
        self.texture_views.retain(|_, tex| tex.0 != texture.0);
    }
}
