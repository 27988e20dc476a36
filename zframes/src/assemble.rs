//! Encode a PNG sequence into an animation.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, bail};
use zenframes::{
    AnimEncoder, CodecChoice, EncoderConfig, PixelMode, RgbImage, Subsampling, YuvRange,
};

use crate::AssembleArgs;
use crate::inputs;

/// Run the `assemble` subcommand.
pub fn run(args: AssembleArgs) -> anyhow::Result<()> {
    inputs::check_writable(&args.output, args.force)?;

    let files = inputs::expand_inputs(&args.files, &["png"])?;
    if files.is_empty() {
        bail!("no PNG frames found");
    }
    let durations = frame_durations(&args.duration, files.len())?;
    let config = encoder_config(&args)?;

    let first = read_png(&files[0])?;
    let mut encoder = AnimEncoder::new(first.width, first.height, &config)?;
    tracing::debug!(
        codec = encoder.codec_name(),
        width = first.width,
        height = first.height,
        frames = files.len(),
        "assembling"
    );

    let single = files.len() == 1;
    add(&mut encoder, &files[0], &first, durations[0], single)?;
    for (path, &duration) in files.iter().zip(&durations).skip(1) {
        let png = read_png(path)?;
        add(&mut encoder, path, &png, duration, false)?;
    }

    let bytes = encoder.finish()?;
    std::fs::write(&args.output, &bytes)
        .with_context(|| format!("writing {}", args.output.display()))?;

    println!(
        "{} frames -> {} ({})",
        files.len(),
        args.output.display(),
        inputs::format_size(bytes.len() as u64)
    );
    Ok(())
}

fn add(
    encoder: &mut AnimEncoder,
    path: &Path,
    png: &PngFrame,
    duration: u64,
    single: bool,
) -> anyhow::Result<()> {
    let image = RgbImage::new(&png.pixels, png.width, png.height, png.mode);
    encoder
        .add_frame(&image, duration, single)
        .with_context(|| format!("adding {}", path.display()))
}

/// One duration for every frame, or exactly one per frame.
fn frame_durations(durations: &[u64], frames: usize) -> anyhow::Result<Vec<u64>> {
    match durations {
        [] => bail!("no frame duration given"),
        [d] => Ok(vec![*d; frames]),
        many if many.len() == frames => Ok(many.to_vec()),
        many => bail!("{} durations given for {} frames", many.len(), frames),
    }
}

fn encoder_config(args: &AssembleArgs) -> anyhow::Result<EncoderConfig> {
    let subsampling: Subsampling = args.subsampling.parse()?;
    let codec: CodecChoice = args.codec.parse()?;

    let mut config = EncoderConfig::new()
        .with_quantizers(args.qmin, args.qmax)
        .with_speed(args.speed)
        .with_subsampling(subsampling)
        .with_codec(codec)
        .with_loop_count(args.loop_count);
    if let Some(range) = &args.range {
        config = config.with_range(range.parse::<YuvRange>()?);
    }
    if let Some(quality) = args.quality {
        config = config.with_quality(quality);
    }
    if let Some(path) = &args.icc {
        config = config.with_icc_profile(read_blob(path)?);
    }
    if let Some(path) = &args.exif {
        config = config.with_exif(read_blob(path)?);
    }
    if let Some(path) = &args.xmp {
        config = config.with_xmp(read_blob(path)?);
    }
    Ok(config)
}

fn read_blob(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

struct PngFrame {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    mode: PixelMode,
}

/// Read a PNG as 8-bit RGB or RGBA.
fn read_png(path: &Path) -> anyhow::Result<PngFrame> {
    let file = File::open(path).with_context(|| format!("reading {}", path.display()))?;
    let mut decoder = png::Decoder::new(BufReader::new(file));
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder
        .read_info()
        .with_context(|| format!("decoding {}", path.display()))?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .with_context(|| format!("decoding {}", path.display()))?;
    buf.truncate(info.buffer_size());

    let (pixels, mode) = match info.color_type {
        png::ColorType::Rgb => (buf, PixelMode::Rgb),
        png::ColorType::Rgba => (buf, PixelMode::Rgba),
        png::ColorType::Grayscale => (
            buf.iter().flat_map(|&g| [g, g, g]).collect(),
            PixelMode::Rgb,
        ),
        png::ColorType::GrayscaleAlpha => (
            buf.chunks_exact(2)
                .flat_map(|ga| [ga[0], ga[0], ga[0], ga[1]])
                .collect(),
            PixelMode::Rgba,
        ),
        other => bail!("{}: unsupported PNG color type {:?}", path.display(), other),
    };

    Ok(PngFrame {
        pixels,
        width: info.width,
        height: info.height,
        mode,
    })
}
