use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{Receiver, Sender};
use stageconfig::StageConfig;
use tracing_subscriber::EnvFilter;
use yuvshade::{packed_frame_len, CpuFrame, RgbFrame, TransformStats, YuvTransform};

use crate::bindings::transform_config;
use crate::cli::Args;

/// Frames buffered between the GPU loop and the PNG writer.
const WRITER_QUEUE_DEPTH: usize = 4;

pub fn run(args: Args) -> Result<()> {
    initialise_tracing();

    let file_config = match args.config.as_deref() {
        Some(path) => {
            let config = StageConfig::from_path(path)?;
            tracing::debug!(path = %path.display(), "loaded stage configuration");
            config
        }
        None => StageConfig::default(),
    };
    let config = transform_config(&file_config, &args);
    let frame_len = packed_frame_len(args.format, args.size)?;

    fs::create_dir_all(&args.output).with_context(|| {
        format!("failed to create output directory {}", args.output.display())
    })?;
    let mut reader = open_input(&args.input)?;

    let mut transform = YuvTransform::new(config);
    transform
        .initialize()
        .context("failed to initialise GPU transform")?;
    if let Some(profile) = transform.adapter_profile() {
        tracing::info!(
            adapter = %profile.name,
            backend = %profile.backend,
            software = profile.is_software(),
            input = %args.input.display(),
            size = %args.size,
            format = %args.format,
            "converting raw video"
        );
    }

    let (mut sender, receiver): (Sender<RgbFrame>, Receiver<RgbFrame>) =
        crossbeam_channel::bounded(WRITER_QUEUE_DEPTH);
    let writer = spawn_writer(receiver, args.output.clone())?;

    let mut buffer = vec![0u8; frame_len];
    let mut index = 0u64;
    while args.frames.map_or(true, |limit| index < limit) {
        let filled = read_frame(&mut reader, &mut buffer)?;
        if filled == 0 {
            break;
        }
        if filled < frame_len {
            tracing::warn!(
                bytes = filled,
                expected = frame_len,
                "ignoring truncated trailing frame"
            );
            break;
        }

        let timestamp = frame_timestamp(index, args.fps);
        let mut frame = CpuFrame::from_packed(args.format, args.size, timestamp, &buffer)?;
        if args.unset_format {
            frame = frame.with_format(None);
        }
        transform.transform(frame, &mut sender);
        index += 1;
    }

    let stats = transform.stats();
    transform.destroy();
    drop(sender);

    let written = writer
        .join()
        .map_err(|_| anyhow!("frame writer thread panicked"))??;
    tracing::info!(
        read = index,
        written,
        dropped = stats.frames_dropped(),
        output = %args.output.display(),
        "conversion finished"
    );

    if let Some(path) = args.stats_json.as_deref() {
        write_stats(path, &stats)?;
    }

    Ok(())
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(io::stdin().lock()));
    }
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Fills `buffer` from `reader`, returning fewer bytes only at end of input.
fn read_frame(reader: &mut impl Read, buffer: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(read) => filled += read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err).context("failed to read input frame"),
        }
    }
    Ok(filled)
}

/// Presentation timestamp in microseconds of frame `index` at `fps`.
fn frame_timestamp(index: u64, fps: f64) -> i64 {
    (index as f64 * 1_000_000.0 / fps).round() as i64
}

fn spawn_writer(receiver: Receiver<RgbFrame>, output: PathBuf) -> Result<JoinHandle<Result<u64>>> {
    thread::Builder::new()
        .name("png-writer".into())
        .spawn(move || -> Result<u64> {
            let mut written = 0u64;
            for frame in receiver {
                let path = output.join(format!("frame_{written:06}.png"));
                frame
                    .to_rgba_image()?
                    .save(&path)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                tracing::trace!(path = %path.display(), timestamp = frame.timestamp, "wrote frame");
                written += 1;
            }
            Ok(written)
        })
        .context("failed to spawn frame writer thread")
}

fn write_stats(path: &Path, stats: &TransformStats) -> Result<()> {
    let json = serde_json::to_string_pretty(stats)?;
    fs::write(path, json).with_context(|| format!("failed to write stats to {}", path.display()))?;
    tracing::debug!(path = %path.display(), "wrote conversion stats");
    Ok(())
}
