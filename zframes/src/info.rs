//! Container inspection: parse and display metadata without decoding frames.

use std::path::Path;

use rayon::prelude::*;
use serde::Serialize;
use zenframes::{AnimDecoder, CodecChoice, DecoderConfig};

use crate::InfoArgs;
use crate::inputs;

/// Run the `info` subcommand.
pub fn run(args: InfoArgs) -> anyhow::Result<()> {
    let files = inputs::expand_inputs(&args.files, &["webp"])?;

    if files.is_empty() {
        anyhow::bail!("no image files found");
    }

    let codec: CodecChoice = args.codec.parse()?;
    let config = DecoderConfig::new().with_codec(codec);

    // Sessions are independent; parse in parallel, print in input order.
    let results: Vec<_> = files
        .par_iter()
        .map(|path| inspect_file(path, &config))
        .collect();

    let multi = files.len() > 1;
    for (i, (path, result)) in files.iter().zip(results).enumerate() {
        if multi && !args.json {
            if i > 0 {
                println!();
            }
            println!("{}:", path.display());
        }

        match result {
            Ok(info) => {
                if args.json {
                    println!("{}", serde_json::to_string_pretty(&info)?);
                } else {
                    print_info(&info);
                }
            }
            Err(e) => {
                eprintln!("  error: {e}");
            }
        }
    }

    Ok(())
}

/// Parse a single file and return structured info.
fn inspect_file(path: &Path, config: &DecoderConfig) -> anyhow::Result<ImageInfoDisplay> {
    let data = std::fs::read(path)?;
    let file_size = data.len() as u64;

    let decoder = AnimDecoder::new(data, config)?;
    let info = decoder.info();

    Ok(ImageInfoDisplay {
        path: path.display().to_string(),
        codec: decoder.codec_name().to_string(),
        width: info.width,
        height: info.height,
        frame_count: info.frame_count,
        mode: info.mode.to_string(),
        animated: info.is_animated(),
        loop_count: info.loop_count,
        icc_profile_size: info.icc_profile().map(<[u8]>::len),
        exif_size: info.exif().map(<[u8]>::len),
        xmp_size: info.xmp().map(<[u8]>::len),
        file_size,
    })
}

#[derive(Debug, Serialize)]
struct ImageInfoDisplay {
    path: String,
    codec: String,
    width: u32,
    height: u32,
    frame_count: u32,
    mode: String,
    animated: bool,
    loop_count: u32,
    icc_profile_size: Option<usize>,
    exif_size: Option<usize>,
    xmp_size: Option<usize>,
    file_size: u64,
}

fn print_info(info: &ImageInfoDisplay) {
    println!("  Codec:        {}", info.codec);
    println!("  Dimensions:   {}x{}", info.width, info.height);
    println!("  Mode:         {}", info.mode);
    if info.animated {
        let loops = match info.loop_count {
            0 => "forever".to_string(),
            n => format!("{n} times"),
        };
        println!("  Animation:    {} frames, loops {}", info.frame_count, loops);
    } else {
        println!("  Frames:       {}", info.frame_count);
    }

    let has_meta =
        info.icc_profile_size.is_some() || info.exif_size.is_some() || info.xmp_size.is_some();

    if has_meta {
        println!("  Metadata:");
        if let Some(size) = info.icc_profile_size {
            println!("    ICC profile: {} bytes", size);
        }
        if let Some(size) = info.exif_size {
            println!("    EXIF:        {} bytes", size);
        }
        if let Some(size) = info.xmp_size {
            println!("    XMP:         {} bytes", size);
        }
    }

    println!("  File size:    {}", inputs::format_size(info.file_size));
}
