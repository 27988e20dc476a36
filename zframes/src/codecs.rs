//! List compiled-in codecs.

use zenframes::CodecRegistry;
use zenframes::threads;

/// Run the `codecs` subcommand.
pub fn run() -> anyhow::Result<()> {
    let registry = CodecRegistry::all();

    println!("Codecs:");
    for codec in registry.codecs() {
        let caps = codec.capabilities();
        let q = codec.quantizer_range();
        let s = codec.speed_range();
        println!(
            "  {:<10} {:<8} {:<8} quantizer {}-{}, speed {}-{}  {}",
            codec.name(),
            if caps.decode { "decode" } else { "" },
            if caps.encode { "encode" } else { "" },
            q.start(),
            q.end(),
            s.start(),
            s.end(),
            codec.version()
        );
        let formats: Vec<String> = codec
            .encodable_formats()
            .iter()
            .map(|(subsampling, range)| format!("{subsampling} {range}"))
            .collect();
        let upsamplings: Vec<&str> = codec.upsamplings().iter().map(|u| u.as_str()).collect();
        println!("             formats: {}", formats.join(", "));
        println!("             upsampling: {}", upsamplings.join(", "));
    }
    if registry.codecs().next().is_none() {
        println!("  (none compiled in)");
    }

    println!();
    println!("Worker threads: {}", threads::max_threads());
    Ok(())
}
