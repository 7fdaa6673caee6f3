use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fvz", about = "Encode audio into .fvz spectrogram visualizations and back")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render an audio file (WAV, MP3, FLAC, OGG) into a .fvz file
    Encode {
        /// Input audio file
        input: PathBuf,

        /// Output .fvz file (extension appended if missing)
        #[arg(short, long, default_value = "output.fvz")]
        output: PathBuf,

        /// Encoder settings TOML file; flags below override its values
        #[arg(long)]
        config: Option<PathBuf>,

        /// Bars per frame
        #[arg(long)]
        bars: Option<u16>,

        /// Frames per second
        #[arg(long)]
        fps: Option<u16>,

        /// FFT window size (power of two, 1024-32768)
        #[arg(long)]
        fft: Option<u32>,

        /// Frequency-to-bar mapping
        #[arg(long, value_parser = ["normalized", "log10", "mel"])]
        mapping: Option<String>,

        /// Box smoothing half-width in bars
        #[arg(long)]
        smoothness: Option<u32>,

        /// Quantizer width in bits
        #[arg(long, value_parser = ["16", "8"])]
        quantize: Option<String>,

        /// Disable Zstd compression
        #[arg(long)]
        no_zstd: bool,

        /// Disable quantization (store raw doubles)
        #[arg(long)]
        no_quantize: bool,

        /// Disable inter-frame delta encoding
        #[arg(long)]
        no_delta: bool,
    },

    /// Decode a .fvz file and print a summary of its contents
    Decode {
        /// Input .fvz file
        input: PathBuf,

        /// Write the decoded frames as JSON
        #[arg(long)]
        dump_json: Option<PathBuf>,
    },

    /// Print the header of a .fvz file without decoding the payload
    Probe {
        /// Input .fvz file
        input: PathBuf,
    },
}
