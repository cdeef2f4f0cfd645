use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use gpujpeg_stream::frame::{FrameSource, StillImage, SyntheticScene};
use gpujpeg_stream::gpu::open_device;
use gpujpeg_stream::{
    BackendKind, DeviceKind, EncodeResult, EncoderConfig, OverlappedBackend, ParamsHandle,
    Subsampling, SyncBackend,
};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Encode frames to baseline JPEG through the GPU compute pipeline:
/// - sync: one submission per frame on this thread
/// - overlapped: background loop with separate compute and direct queues
#[derive(Parser, Debug)]
#[command(name = "gpujpeg")]
#[command(about = "📸 Encode frames to JPEG with a GPU compute + CPU entropy pipeline")]
struct Args {
    /// Image to encode; the animated test scene is used when omitted
    input: Option<PathBuf>,

    #[arg(short, long, default_value_t = 85, help = "JPEG quality, 1 (smallest) to 100 (best)")]
    quality: u8,

    #[arg(short, long, default_value_t = 1.0, help = "Output scale in (0, 1]")]
    scale: f32,

    #[arg(long, default_value = "420", help = "Chroma subsampling: 444, 422 or 420")]
    subsampling: Subsampling,

    #[arg(short, long, default_value = "sync", help = "Backend: sync or overlapped")]
    backend: BackendKind,

    #[arg(long, default_value = "queued", help = "Device: immediate or queued")]
    device: DeviceKind,

    #[arg(short = 'n', long, default_value_t = 1, help = "Number of frames to encode")]
    frames: u32,

    #[arg(short, long, help = "Write numbered 001.jpg, 002.jpg, ... into this directory")]
    output_dir: Option<PathBuf>,

    /// Width of the synthetic scene
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Height of the synthetic scene
    #[arg(long, default_value_t = 360)]
    height: u32,

    #[arg(long, help = "Print the summary as JSON")]
    json: bool,
}

/// Numbered still-image writer.
struct Saver<'a> {
    dir: Option<&'a Path>,
    count: u32,
}

impl Saver<'_> {
    fn save(&mut self, result: &EncodeResult) -> Result<Option<PathBuf>> {
        let Some(dir) = self.dir else {
            return Ok(None);
        };
        self.count += 1;
        let path = dir.join(format!("{:03}.jpg", self.count));
        result
            .save_jpeg(&path)
            .with_context(|| format!("saving frame {}", result.frame_index))?;
        Ok(Some(path))
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = EncoderConfig {
        quality: args.quality,
        output_scale: args.scale,
        subsampling: args.subsampling,
        backend: args.backend,
        device: args.device,
        frames: args.frames,
        output_dir: args.output_dir.clone(),
    };
    config.validate().context("invalid configuration")?;

    if let Some(dir) = &config.output_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
    }

    let device = open_device(config.device).context("opening device")?;
    let source: Box<dyn FrameSource> = match &args.input {
        Some(path) => Box::new(
            StillImage::open(path).with_context(|| format!("loading {}", path.display()))?,
        ),
        None => Box::new(SyntheticScene::new(args.width, args.height)?),
    };
    let (src_w, src_h) = source.size();
    info!(
        backend = %config.backend,
        device = device.name(),
        width = src_w,
        height = src_h,
        "starting"
    );

    let mut saver = Saver {
        dir: config.output_dir.as_deref(),
        count: 0,
    };
    let started = Instant::now();

    let (results, stats) = match config.backend {
        BackendKind::Sync => {
            let mut backend = SyncBackend::new(device, source)?;
            let params = config.to_params();
            let mut results = Vec::new();
            for _ in 0..config.frames {
                match backend.encode_next(&params) {
                    Ok(result) => {
                        let path = saver.save(&result)?;
                        results.push((result, path));
                    }
                    Err(e) if gpujpeg_stream::error::classify::is_transient(&e) => {
                        warn!(error = %e, "frame skipped");
                    }
                    Err(e) => return Err(e).context("encoding failed"),
                }
            }
            let stats = backend.stats();
            backend.shutdown()?;
            (results, stats)
        }
        BackendKind::Overlapped => {
            let params = ParamsHandle::new(config.to_params());
            let backend =
                OverlappedBackend::start_bounded(device, source, params, config.frames as u64)?;
            let mut results = Vec::new();
            let mut last_seen = None;
            loop {
                let running = backend.is_running();
                let index = backend.with_latest(|r| r.map(|r| r.frame_index));
                if index.is_some() && index != last_seen {
                    if let Some(result) = backend.latest() {
                        last_seen = Some(result.frame_index);
                        let path = saver.save(&result)?;
                        results.push((result, path));
                    }
                }
                if !running {
                    break;
                }
                thread::sleep(Duration::from_millis(1));
            }
            let stats = backend.stats();
            backend.shutdown().context("overlapped backend failed")?;
            (results, stats)
        }
    };
    let elapsed = started.elapsed();

    if args.json {
        let frames: Vec<_> = results
            .iter()
            .map(|(r, path)| {
                let mut v = r.summary();
                v["path"] = json!(path.as_ref().map(|p| p.display().to_string()));
                v
            })
            .collect();
        let summary = json!({
            "backend": config.backend.to_string(),
            "device": config.device.to_string(),
            "quality": config.quality,
            "subsampling": config.subsampling.label(),
            "output_scale": config.output_scale,
            "elapsed_ms": elapsed.as_secs_f64() * 1000.0,
            "stats": stats.to_json(),
            "frames": frames,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("GPU JPEG Encode Summary");
    println!("═══════════════════════════════════");
    println!(
        "Backend: {} on {} device, quality {}, {}",
        config.backend, config.device, config.quality, config.subsampling
    );
    println!();
    for (result, path) in &results {
        let target = path
            .as_ref()
            .map(|p| format!(" → {}", p.display()))
            .unwrap_or_default();
        println!(
            "  frame {:>4}: {}x{}, {} bytes ({} header + {} data){}",
            result.frame_index,
            result.width,
            result.height,
            result.bits.len(),
            result.header_size,
            result.data_size,
            target
        );
    }
    println!();
    println!(
        "Encoded {} frames ({} dropped) in {:.1} ms",
        stats.frames_encoded,
        stats.frames_dropped,
        elapsed.as_secs_f64() * 1000.0
    );
    if results.len() < stats.frames_encoded as usize {
        println!(
            "Kept {} of them; the rest were overwritten before they could be read",
            results.len()
        );
    }

    Ok(())
}
