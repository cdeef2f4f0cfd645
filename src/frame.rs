//! # Frame Sources
//!
//! A [`Frame`] is the opaque image the pipeline encodes: a device texture plus
//! its pixel size. The rendering side owns it; the encoder only reads it.
//!
//! [`FrameSource`] stands in for that rendering side. Implementations:
//!
//! - [`SyntheticScene`]: animated test pattern, re-uploaded every frame
//! - [`StillImage`]: fixed pixels uploaded once (file, solid color, checkerboard)

use std::path::Path;

use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::gpu::{GpuDevice, TextureDesc, TextureId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub texture: TextureId,
    pub width: u32,
    pub height: u32,
}

pub trait FrameSource: Send {
    /// Make frame `frame_index` available as a texture on `device`.
    fn acquire(&mut self, device: &dyn GpuDevice, frame_index: u64) -> PipelineResult<Frame>;

    /// Destroy any texture this source created. Idempotent.
    fn release(&mut self, device: &dyn GpuDevice);

    fn size(&self) -> (u32, u32);
}

/// Lazily creates one texture of a fixed size.
#[derive(Debug, Default)]
struct SourceTexture {
    id: Option<TextureId>,
}

impl SourceTexture {
    fn get_or_create(
        &mut self,
        device: &dyn GpuDevice,
        width: u32,
        height: u32,
    ) -> PipelineResult<(TextureId, bool)> {
        if let Some(id) = self.id {
            return Ok((id, false));
        }
        let id = device.create_texture(TextureDesc { width, height })?;
        self.id = Some(id);
        Ok((id, true))
    }

    fn release(&mut self, device: &dyn GpuDevice) {
        if let Some(id) = self.id.take() {
            device.destroy_texture(id);
        }
    }
}

/// Tightly packed RGBA8 pixels uploaded once.
#[derive(Debug)]
pub struct StillImage {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
    texture: SourceTexture,
}

impl StillImage {
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> PipelineResult<Self> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || rgba.len() != expected {
            return Err(PipelineError::validation(
                "still_image",
                format!("{}x{} RGBA8 needs {} bytes", width, height, expected),
                rgba.len().to_string(),
            ));
        }
        Ok(Self {
            width,
            height,
            rgba,
            texture: SourceTexture::default(),
        })
    }

    /// Decode any format the `image` crate understands.
    pub fn open(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let decoded = image::open(path)
            .map_err(|e| {
                PipelineError::from(e).with_context(format!("decoding {}", path.display()))
            })?
            .to_rgba8();
        let (width, height) = decoded.dimensions();
        debug!(path = %path.display(), width, height, "loaded still image");
        Self::from_rgba(width, height, decoded.into_raw())
    }

    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> PipelineResult<Self> {
        let rgba = (0..width as usize * height as usize)
            .flat_map(|_| [rgb[0], rgb[1], rgb[2], 255])
            .collect();
        Self::from_rgba(width, height, rgba)
    }

    /// Black/white squares of `cell` pixels, white in the top-left corner.
    pub fn checkerboard(width: u32, height: u32, cell: u32) -> PipelineResult<Self> {
        let cell = cell.max(1);
        let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height {
            for x in 0..width {
                let v = if (x / cell + y / cell) % 2 == 0 { 255 } else { 0 };
                rgba.extend_from_slice(&[v, v, v, 255]);
            }
        }
        Self::from_rgba(width, height, rgba)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.rgba
    }
}

impl FrameSource for StillImage {
    fn acquire(&mut self, device: &dyn GpuDevice, _frame_index: u64) -> PipelineResult<Frame> {
        let (texture, created) = self.texture.get_or_create(device, self.width, self.height)?;
        if created {
            device.write_texture(texture, &self.rgba)?;
        }
        Ok(Frame {
            texture,
            width: self.width,
            height: self.height,
        })
    }

    fn release(&mut self, device: &dyn GpuDevice) {
        self.texture.release(device);
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Animated gradient with a moving bar, redrawn on the CPU every frame.
#[derive(Debug)]
pub struct SyntheticScene {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    texture: SourceTexture,
}

impl SyntheticScene {
    pub fn new(width: u32, height: u32) -> PipelineResult<Self> {
        if width == 0 || height == 0 {
            return Err(PipelineError::validation(
                "synthetic_scene",
                "non-zero size",
                format!("{}x{}", width, height),
            ));
        }
        Ok(Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
            texture: SourceTexture::default(),
        })
    }

    fn draw(&mut self, frame_index: u64) {
        let (w, h) = (self.width as u64, self.height as u64);
        let bar_x = (frame_index * 7) % w;
        let bar_w = (w / 10).max(1);
        for (i, px) in self.pixels.chunks_exact_mut(4).enumerate() {
            let x = i as u64 % w;
            let y = i as u64 / w;
            let r = (x * 255 / w.max(1)) as u8;
            let g = (y * 255 / h.max(1)) as u8;
            let b = ((frame_index * 3 + x + y) % 256) as u8;
            let on_bar = x >= bar_x && x < bar_x + bar_w;
            if on_bar {
                px.copy_from_slice(&[255, 255, 255, 255]);
            } else {
                px.copy_from_slice(&[r, g, b, 255]);
            }
        }
    }
}

impl FrameSource for SyntheticScene {
    fn acquire(&mut self, device: &dyn GpuDevice, frame_index: u64) -> PipelineResult<Frame> {
        let (texture, _) = self.texture.get_or_create(device, self.width, self.height)?;
        self.draw(frame_index);
        device.write_texture(texture, &self.pixels)?;
        Ok(Frame {
            texture,
            width: self.width,
            height: self.height,
        })
    }

    fn release(&mut self, device: &dyn GpuDevice) {
        self.texture.release(device);
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
