mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use fvz::codec::header::{Header, HEADER_SIZE};
use fvz::{Encoder, EncoderConfig, QuantizeLevel, ZstdCodec};

use cli::{Cli, Command};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Encode {
            input,
            output,
            config,
            bars,
            fps,
            fft,
            mapping,
            smoothness,
            quantize,
            no_zstd,
            no_quantize,
            no_delta,
        } => encode(
            &input, &output, config.as_deref(), bars, fps, fft, mapping, smoothness, quantize,
            no_zstd, no_quantize, no_delta,
        ),
        Command::Decode { input, dump_json } => decode(&input, dump_json.as_deref()),
        Command::Probe { input } => probe(&input),
    }
}

#[allow(clippy::too_many_arguments)]
fn encode(
    input: &Path,
    output: &Path,
    config_path: Option<&Path>,
    bars: Option<u16>,
    fps: Option<u16>,
    fft: Option<u32>,
    mapping: Option<String>,
    smoothness: Option<u32>,
    quantize: Option<String>,
    no_zstd: bool,
    no_quantize: bool,
    no_delta: bool,
) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    let mut config = match config_path {
        Some(path) => fvz::load_config(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => EncoderConfig::default(),
    };

    // CLI flags take precedence over the config file.
    if let Some(bars) = bars {
        config.bar_count = bars;
    }
    if let Some(fps) = fps {
        config.frame_rate = fps;
    }
    if let Some(fft) = fft {
        config.fft_resolution = fft;
    }
    if let Some(mapping) = mapping {
        config.mapping = mapping.parse()?;
    }
    if let Some(smoothness) = smoothness {
        config.smoothness = smoothness;
    }
    if let Some(quantize) = quantize {
        config.quantize_level = match quantize.as_str() {
            "8" => QuantizeLevel::Bit8,
            _ => QuantizeLevel::Bit16,
        };
    }
    if no_zstd {
        config.compression.zstd = false;
    }
    if no_quantize {
        config.compression.quantize = false;
    }
    if no_delta {
        config.compression.delta = false;
    }

    log::info!("Input: {}", input.display());
    log::info!(
        "Settings: {} bars @ {} fps, fft {}, mapping {:?}, flags {:#05b}",
        config.bar_count,
        config.frame_rate,
        config.fft_resolution,
        config.mapping,
        config.compression.bits()
    );

    let mut encoder = Encoder::new(config)?;

    log::info!("Decoding audio...");
    encoder.load_audio(input)?;

    let total = encoder.planned_frame_count().unwrap_or(0);
    log::info!("Generating {} frames...", total);

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta} remaining)")
            .context("bad progress template")?
            .progress_chars("=>-"),
    );

    let progress = |_frame: usize, _total: usize| pb.inc(1);
    encoder.generate_frames(Some(&progress))?;
    pb.finish_and_clear();

    let written = encoder.save_to_file(output)?;
    log::info!("Done! Output: {}", written.display());
    Ok(())
}

fn decode(input: &Path, dump_json: Option<&Path>) -> Result<()> {
    let visualization = fvz::read_path(input, Some(&ZstdCodec))
        .with_context(|| format!("Failed to decode {}", input.display()))?;

    let header = &visualization.header;
    println!("{}", input.display());
    print_header(header);

    let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
    for v in visualization.frames.iter().flatten() {
        lo = lo.min(*v);
        hi = hi.max(*v);
    }
    if visualization.frames.is_empty() {
        println!("  payload:        empty");
    } else {
        println!("  value range:    [{lo:.6}, {hi:.6}]");
        println!("  duration:       {:.1}s", visualization.duration_ms() / 1000.0);
    }

    if let Some(path) = dump_json {
        let json = serde_json::to_string(&visualization.frames)
            .context("Failed to serialize frames")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Dumped {} frames to {}", visualization.frames.len(), path.display());
    }

    Ok(())
}

fn probe(input: &Path) -> Result<()> {
    use std::io::Read;
    let file = std::fs::File::open(input)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    let mut prefix = Vec::with_capacity(HEADER_SIZE);
    file.take(HEADER_SIZE as u64).read_to_end(&mut prefix)?;
    let header = Header::from_bytes(&prefix)?;

    println!("{}", input.display());
    print_header(&header);
    Ok(())
}

fn print_header(header: &Header) {
    println!("  version:        2");
    println!("  fft resolution: {}", header.fft_resolution);
    println!("  bands:          {}", header.num_bands);
    println!("  frame rate:     {} fps", header.frame_rate);
    println!("  total frames:   {}", header.total_frames);
    println!("  max amplitude:  {:.4}", header.max_amplitude);
    println!(
        "  transforms:     zstd={} quantize={} delta={}",
        header.flags.zstd, header.flags.quantize, header.flags.delta
    );
    if header.flags.quantize {
        let bits = match header.quantize_level {
            QuantizeLevel::Bit16 => 16,
            QuantizeLevel::Bit8 => 8,
        };
        println!("  quantizer:      {bits}-bit");
    }
}
