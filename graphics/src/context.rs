//! Explicit binding context.
//!
//! Binding a shader, uniform data or a texture changes what the next draw
//! sees. Instead of hiding that in global state, every `bind` call takes a
//! `&mut BindContext` owned by the render thread. The context forwards each
//! call to the backend, tracks what is currently bound and journals the
//! commands so tools and tests can inspect exactly what was uploaded.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::backend::{GpuBackend, GpuBuffer, GpuProgram, GpuTexture};
use crate::shader::reflection::UniformBlock;
use crate::types::{BufferId, InstanceId, MaterialId, ShaderId, TextureId};

/// Which object's CPU storage a uniform upload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadOrigin {
    /// A material's base storage.
    Material(MaterialId),
    /// A material instance's own storage.
    Instance(InstanceId),
    /// Data passed straight to the shader.
    Direct,
}

/// A recorded bind operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindCommand {
    BindProgram {
        shader: ShaderId,
    },
    UploadUniformBlock {
        shader: ShaderId,
        block: String,
        origin: UploadOrigin,
        data: Vec<u8>,
    },
    BindTexture {
        slot: u32,
        texture: TextureId,
    },
    BindVertexBuffer {
        buffer: BufferId,
    },
    BindIndexBuffer {
        buffer: BufferId,
    },
}

/// What is bound right now.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindState {
    /// Current program.
    pub program: Option<ShaderId>,
    /// Textures by slot.
    pub textures: BTreeMap<u32, TextureId>,
    /// Current vertex buffer.
    pub vertex_buffer: Option<BufferId>,
    /// Current index buffer.
    pub index_buffer: Option<BufferId>,
}

/// Render-thread binding context.
pub struct BindContext {
    backend: Arc<dyn GpuBackend>,
    state: BindState,
    commands: Vec<BindCommand>,
    journaling: bool,
}

impl BindContext {
    /// Create a context that binds through `backend`.
    pub fn new(backend: Arc<dyn GpuBackend>) -> Self {
        Self {
            backend,
            state: BindState::default(),
            commands: Vec::new(),
            journaling: true,
        }
    }

    /// Enable or disable the command journal.
    pub fn with_journaling(mut self, journaling: bool) -> Self {
        self.journaling = journaling;
        self
    }

    /// The backend bind calls are forwarded to.
    pub fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.backend
    }

    /// Current binding state.
    pub fn state(&self) -> &BindState {
        &self.state
    }

    /// Currently bound program.
    pub fn bound_program(&self) -> Option<ShaderId> {
        self.state.program
    }

    /// Texture bound to `slot`.
    pub fn bound_texture(&self, slot: u32) -> Option<TextureId> {
        self.state.textures.get(&slot).copied()
    }

    /// Commands recorded since the last reset.
    pub fn commands(&self) -> &[BindCommand] {
        &self.commands
    }

    /// Take the journal, leaving it empty.
    pub fn take_commands(&mut self) -> Vec<BindCommand> {
        std::mem::take(&mut self.commands)
    }

    /// The last uniform upload recorded for `block`.
    pub fn last_upload(&self, block: &str) -> Option<(UploadOrigin, &[u8])> {
        self.commands.iter().rev().find_map(|command| match command {
            BindCommand::UploadUniformBlock {
                block: name,
                origin,
                data,
                ..
            } if name == block => Some((*origin, data.as_slice())),
            _ => None,
        })
    }

    /// Forget the bound state and the journal, typically at a frame boundary.
    pub fn reset(&mut self) {
        self.state = BindState::default();
        self.commands.clear();
    }

    fn record(&mut self, command: BindCommand) {
        if self.journaling {
            self.commands.push(command);
        }
    }

    pub(crate) fn bind_program(&mut self, shader: ShaderId, program: &GpuProgram) {
        self.backend.bind_program(program);
        self.state.program = Some(shader);
        self.record(BindCommand::BindProgram { shader });
    }

    pub(crate) fn upload_uniform_block(
        &mut self,
        shader: ShaderId,
        program: &GpuProgram,
        block: &UniformBlock,
        data: &[u8],
        origin: UploadOrigin,
    ) {
        self.backend.write_uniform_block(program, block, data);
        if self.journaling {
            self.commands.push(BindCommand::UploadUniformBlock {
                shader,
                block: block.name().to_string(),
                origin,
                data: data.to_vec(),
            });
        }
    }

    pub(crate) fn bind_texture(&mut self, slot: u32, texture: TextureId, gpu: &GpuTexture) {
        self.backend.bind_texture(gpu, slot);
        self.state.textures.insert(slot, texture);
        self.record(BindCommand::BindTexture { slot, texture });
    }

    pub(crate) fn bind_vertex_buffer(&mut self, buffer: BufferId, gpu: &GpuBuffer) {
        self.backend.bind_vertex_buffer(gpu);
        self.state.vertex_buffer = Some(buffer);
        self.record(BindCommand::BindVertexBuffer { buffer });
    }

    pub(crate) fn bind_index_buffer(&mut self, buffer: BufferId, gpu: &GpuBuffer) {
        self.backend.bind_index_buffer(gpu);
        self.state.index_buffer = Some(buffer);
        self.record(BindCommand::BindIndexBuffer { buffer });
    }
}

impl std::fmt::Debug for BindContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindContext")
            .field("backend", &self.backend.name())
            .field("state", &self.state)
            .field("commands", &self.commands.len())
            .finish()
    }
}
