//! Decode a single frame and write it as PNG.

use std::fs::File;
use std::io::BufWriter;

use anyhow::Context;
use zenframes::{AnimDecoder, CodecChoice, DecoderConfig, Frame, PixelMode, Upsampling};

use crate::ExtractArgs;
use crate::inputs;

/// Run the `extract` subcommand.
pub fn run(args: ExtractArgs) -> anyhow::Result<()> {
    inputs::check_writable(&args.output, args.force)?;

    let codec: CodecChoice = args.codec.parse()?;
    let upsampling: Upsampling = args.upsampling.parse()?;
    let config = DecoderConfig::new()
        .with_codec(codec)
        .with_upsampling(upsampling);

    let data = std::fs::read(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let mut decoder = AnimDecoder::new(data, &config)
        .with_context(|| format!("decoding {}", args.file.display()))?;
    let frame = decoder
        .frame(args.frame)
        .with_context(|| format!("decoding frame {} of {}", args.frame, args.file.display()))?;

    write_png(&args.output, &frame)?;

    tracing::info!(
        frame = args.frame,
        pts_ms = frame.timestamp_ms(),
        duration_ms = frame.duration_ms(),
        "wrote {}",
        args.output.display()
    );
    println!(
        "{} -> {} ({}x{} {}, {} ms at {} ms)",
        args.file.display(),
        args.output.display(),
        frame.width,
        frame.height,
        frame.mode,
        frame.duration_ms(),
        frame.timestamp_ms()
    );
    Ok(())
}

fn write_png(path: &std::path::Path, frame: &Frame) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), frame.width, frame.height);
    encoder.set_color(match frame.mode {
        PixelMode::Rgb => png::ColorType::Rgb,
        PixelMode::Rgba => png::ColorType::Rgba,
    });
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder
        .write_header()
        .with_context(|| format!("writing {}", path.display()))?;
    writer
        .write_image_data(&frame.pixels)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
