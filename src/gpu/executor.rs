//! Resource table and command execution shared by the software devices.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use fast_image_resize::Resizer;
use tracing::trace;

use super::command::{Command, CommandList};
use super::{
    BufferDesc, BufferId, DeviceStats, PipelineId, ShaderVariant, TextureDesc, TextureId, kernels,
};
use crate::error::{PipelineError, PipelineResult};

/// Upper bound for a single allocation, in bytes.
pub const MAX_ALLOCATION_BYTES: usize = 1 << 30;

#[derive(Debug)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

struct Tables {
    textures: HashMap<TextureId, Texture>,
    buffers: HashMap<BufferId, Vec<i32>>,
    pipelines: HashMap<PipelineId, ShaderVariant>,
    resizer: Resizer,
    scratch: Vec<u8>,
}

/// Everything a software device owns, behind one lock.
pub struct Executor {
    tables: Mutex<Tables>,
    next_id: AtomicU64,
    submissions: AtomicU64,
    dispatches: AtomicU64,
    presents: AtomicU64,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables {
                textures: HashMap::new(),
                buffers: HashMap::new(),
                pipelines: HashMap::new(),
                resizer: Resizer::new(),
                scratch: Vec::new(),
            }),
            next_id: AtomicU64::new(1),
            submissions: AtomicU64::new(0),
            dispatches: AtomicU64::new(0),
            presents: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn create_texture(&self, desc: TextureDesc) -> PipelineResult<TextureId> {
        let bytes = desc.width as usize * desc.height as usize * 4;
        if bytes == 0 || bytes > MAX_ALLOCATION_BYTES {
            return Err(PipelineError::resource(
                "texture",
                format!("cannot allocate {}x{} RGBA8", desc.width, desc.height),
            ));
        }
        let id = TextureId(self.next());
        self.lock().textures.insert(
            id,
            Texture {
                width: desc.width,
                height: desc.height,
                rgba: vec![0; bytes],
            },
        );
        Ok(id)
    }

    pub fn create_buffer(&self, desc: BufferDesc) -> PipelineResult<BufferId> {
        let bytes = desc.len.saturating_mul(4);
        if desc.len == 0 || bytes > MAX_ALLOCATION_BYTES {
            return Err(PipelineError::resource(
                "buffer",
                format!("cannot allocate {} coefficients ({:?})", desc.len, desc.usage),
            ));
        }
        let id = BufferId(self.next());
        self.lock().buffers.insert(id, vec![0; desc.len]);
        Ok(id)
    }

    pub fn create_pipeline(&self, variant: ShaderVariant) -> PipelineId {
        let id = PipelineId(self.next());
        self.lock().pipelines.insert(id, variant);
        id
    }

    pub fn write_texture(&self, texture: TextureId, rgba: &[u8]) -> PipelineResult<()> {
        let mut tables = self.lock();
        let t = tables
            .textures
            .get_mut(&texture)
            .ok_or_else(|| missing("texture", texture.0))?;
        if t.rgba.len() != rgba.len() {
            return Err(PipelineError::contract(
                "texture upload bytes",
                t.rgba.len(),
                rgba.len(),
            ));
        }
        t.rgba.copy_from_slice(rgba);
        Ok(())
    }

    pub fn read_buffer(&self, buffer: BufferId, out: &mut Vec<i32>) -> PipelineResult<()> {
        let tables = self.lock();
        let b = tables
            .buffers
            .get(&buffer)
            .ok_or_else(|| missing("buffer", buffer.0))?;
        out.clear();
        out.extend_from_slice(b);
        Ok(())
    }

    pub fn destroy_texture(&self, texture: TextureId) {
        self.lock().textures.remove(&texture);
    }

    pub fn destroy_buffer(&self, buffer: BufferId) {
        self.lock().buffers.remove(&buffer);
    }

    pub fn destroy_pipeline(&self, pipeline: PipelineId) {
        self.lock().pipelines.remove(&pipeline);
    }

    pub fn stats(&self) -> DeviceStats {
        let tables = self.lock();
        DeviceStats {
            submissions: self.submissions.load(Ordering::Relaxed),
            dispatches: self.dispatches.load(Ordering::Relaxed),
            presents: self.presents.load(Ordering::Relaxed),
            live_textures: tables.textures.len(),
            live_buffers: tables.buffers.len(),
            live_pipelines: tables.pipelines.len(),
        }
    }

    /// Run every command of `list` in order; stops at the first failure.
    pub fn execute(&self, list: &CommandList) -> PipelineResult<()> {
        self.submissions.fetch_add(1, Ordering::Relaxed);
        trace!(label = list.label, commands = list.len(), "executing command list");
        let mut tables = self.lock();
        for command in &list.commands {
            self.execute_one(&mut tables, command)
                .map_err(|e| e.with_operation(list.label))?;
        }
        Ok(())
    }

    fn execute_one(&self, tables: &mut Tables, command: &Command) -> PipelineResult<()> {
        let Tables {
            textures,
            buffers,
            pipelines,
            resizer,
            scratch,
        } = tables;

        match command {
            Command::Resample { src, dst, plan } => {
                let mut target = textures.remove(dst).ok_or_else(|| missing("texture", dst.0))?;
                let result = match textures.get(src) {
                    Some(source) => {
                        if (source.width, source.height) != (plan.input.w, plan.input.h)
                            || (target.width, target.height) != (plan.out.w, plan.out.h)
                        {
                            Err(PipelineError::contract(
                                "resample extents",
                                plan.out.area(),
                                target.width as usize * target.height as usize,
                            ))
                        } else {
                            surface_scale::cpu::apply_plan(
                                resizer,
                                &source.rgba,
                                plan,
                                scratch,
                                &mut target.rgba,
                            )
                            .map_err(PipelineError::from)
                        }
                    }
                    None => Err(missing("texture", src.0)),
                };
                textures.insert(*dst, target);
                result
            }
            Command::Dispatch {
                pipeline,
                source,
                output,
                constants,
                groups,
            } => {
                let variant = *pipelines
                    .get(pipeline)
                    .ok_or_else(|| missing("pipeline", pipeline.0))?;
                let texture = textures.get(source).ok_or_else(|| missing("texture", source.0))?;
                let out = buffers.get_mut(output).ok_or_else(|| missing("buffer", output.0))?;
                kernels::encode_component(variant, &texture.rgba, constants, *groups, out)?;
                self.dispatches.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Command::CopyBuffer { src, dst } => {
                let data = buffers.get(src).ok_or_else(|| missing("buffer", src.0))?;
                let data = data.clone();
                let target = buffers.get_mut(dst).ok_or_else(|| missing("buffer", dst.0))?;
                if target.len() < data.len() {
                    return Err(PipelineError::contract(
                        "copy destination length",
                        data.len(),
                        target.len(),
                    ));
                }
                target[..data.len()].copy_from_slice(&data);
                Ok(())
            }
            Command::CopyTexture { src, dst } => {
                let source = textures.get(src).ok_or_else(|| missing("texture", src.0))?;
                let (w, h) = (source.width, source.height);
                let pixels = source.rgba.clone();
                let target = textures.get_mut(dst).ok_or_else(|| missing("texture", dst.0))?;
                // Whole-resource copies need identical extents.
                if (target.width, target.height) != (w, h) {
                    return Err(PipelineError::contract(
                        "copy_texture extent",
                        w as usize * h as usize,
                        target.width as usize * target.height as usize,
                    )
                    .with_context(format!(
                        "{}x{} into {}x{}",
                        w, h, target.width, target.height
                    )));
                }
                target.rgba = pixels;
                Ok(())
            }
            Command::Present { texture } => {
                if !textures.contains_key(texture) {
                    return Err(missing("texture", texture.0));
                }
                self.presents.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        }
    }
}

fn missing(kind: &str, id: u64) -> PipelineError {
    PipelineError::dispatch("execute", format!("{} {} does not exist", kind, id))
        .with_recovery_suggestion("Do not destroy resources referenced by in-flight command lists")
}
