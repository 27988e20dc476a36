//! zframes: animated image tool.
//!
//! Inspect containers, extract single frames to PNG, and assemble PNG
//! sequences into animations through zenframes sessions.

mod assemble;
mod codecs;
mod extract;
mod info;
mod inputs;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "zframes", version, about = "Animated image tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse containers and display their metadata.
    Info(InfoArgs),

    /// Decode one frame to PNG.
    Extract(ExtractArgs),

    /// Encode PNG frames into an animation.
    Assemble(Box<AssembleArgs>),

    /// List available codecs and versions.
    Codecs,
}

/// Arguments for the `info` subcommand.
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Input files or glob patterns.
    #[arg(required = true)]
    pub files: Vec<String>,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,

    /// Decoder codec name, or "auto".
    #[arg(long, default_value = "auto")]
    pub codec: String,
}

/// Arguments for the `extract` subcommand.
#[derive(Parser, Debug)]
pub struct ExtractArgs {
    /// Input animation.
    pub file: PathBuf,

    /// Frame index, starting at 0.
    #[arg(short = 'n', long, default_value_t = 0)]
    pub frame: u32,

    /// Output PNG path.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Decoder codec name, or "auto".
    #[arg(long, default_value = "auto")]
    pub codec: String,

    /// Chroma upsampling: auto, fastest, best, nearest, bilinear (codec permitting).
    #[arg(long, default_value = "auto")]
    pub upsampling: String,

    /// Allow overwriting an existing output file.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `assemble` subcommand.
#[derive(Parser, Debug)]
pub struct AssembleArgs {
    /// Input PNG frames or glob patterns, in display order.
    #[arg(required = true)]
    pub files: Vec<String>,

    /// Output animation path.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Frame duration in milliseconds: one value for all frames, or one per frame.
    #[arg(short, long, value_delimiter = ',', default_value = "100")]
    pub duration: Vec<u64>,

    /// Quality (0-100). Overrides --qmin/--qmax.
    #[arg(short, long)]
    pub quality: Option<i32>,

    /// Best allowed quantizer (0-63).
    #[arg(long, default_value_t = 0)]
    pub qmin: i32,

    /// Worst allowed quantizer (0-63).
    #[arg(long, default_value_t = 10)]
    pub qmax: i32,

    /// Encoder speed, higher is faster.
    #[arg(long, default_value_t = 8)]
    pub speed: i32,

    /// Chroma subsampling: 4:0:0, 4:2:0, 4:2:2, 4:4:4 (codec permitting).
    #[arg(long, default_value = "4:2:0")]
    pub subsampling: String,

    /// Sample range: full or limited. Defaults to the codec's native range.
    #[arg(long)]
    pub range: Option<String>,

    /// Encoder codec name, or "auto".
    #[arg(long, default_value = "auto")]
    pub codec: String,

    /// Loop count, 0 loops forever.
    #[arg(long, default_value_t = 0)]
    pub loop_count: u32,

    /// ICC profile to embed.
    #[arg(long)]
    pub icc: Option<PathBuf>,

    /// EXIF payload to embed.
    #[arg(long)]
    pub exif: Option<PathBuf>,

    /// XMP packet to embed.
    #[arg(long)]
    pub xmp: Option<PathBuf>,

    /// Allow overwriting an existing output file.
    #[arg(long)]
    pub force: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Info(args) => info::run(args),
        Command::Extract(args) => extract::run(args),
        Command::Assemble(args) => assemble::run(*args),
        Command::Codecs => codecs::run(),
    }
}
