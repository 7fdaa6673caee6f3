use std::path::{Path, PathBuf};

use crate::audio::{self, AudioData};
use crate::codec::compress::ZstdCodec;
use crate::codec::header::Header;
use crate::codec::transform;
use crate::codec::Visualization;
use crate::config::EncoderConfig;
use crate::error::{FvzError, Result};

/// One encode session: construct with configuration, load audio once,
/// generate frames once, then serialize any number of times.
pub struct Encoder {
    config: EncoderConfig,
    audio: Option<AudioData>,
    frames: Option<Vec<Vec<f64>>>,
    max_amplitude: f32,
}

impl Encoder {
    pub fn new(config: EncoderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, audio: None, frames: None, max_amplitude: 0.0 })
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Decodes an audio file into mono PCM. Any previously generated frames
    /// are discarded.
    pub fn load_audio(&mut self, path: &Path) -> Result<()> {
        let audio = audio::decode_audio(path)?;
        self.load_samples(audio.sample_rate, audio.samples)
    }

    /// Accepts mono PCM from an external provider directly.
    pub fn load_samples(&mut self, sample_rate: u32, samples: Vec<f32>) -> Result<()> {
        if sample_rate == 0 {
            return Err(FvzError::InvalidConfig("sample rate must be nonzero".into()));
        }
        self.audio = Some(AudioData { samples, sample_rate });
        self.frames = None;
        self.max_amplitude = 0.0;
        Ok(())
    }

    /// Number of frames this session will produce, once audio is loaded.
    pub fn planned_frame_count(&self) -> Option<usize> {
        self.audio
            .as_ref()
            .map(|a| audio::total_frame_count(a.samples.len(), a.sample_rate, &self.config))
    }

    /// Runs the frame pipeline over the loaded signal. The progress sink, if
    /// any, is called once per completed frame from worker threads.
    pub fn generate_frames(
        &mut self,
        progress: Option<&(dyn Fn(usize, usize) + Sync)>,
    ) -> Result<()> {
        let audio = self
            .audio
            .as_ref()
            .ok_or(FvzError::EncoderPrecondition("no audio loaded"))?;

        if audio.samples.len() < self.config.fft_resolution as usize {
            log::warn!(
                "signal ({} samples) is shorter than one FFT window ({}); output is zero-padded",
                audio.samples.len(),
                self.config.fft_resolution
            );
        }

        let (frames, max_amplitude) =
            audio::generate_frames(&audio.samples, audio.sample_rate, &self.config, progress);

        log::info!(
            "Generated {} frames ({} bars at {} fps), peak amplitude {:.4}",
            frames.len(),
            self.config.bar_count,
            self.config.frame_rate,
            max_amplitude
        );

        self.frames = Some(frames);
        self.max_amplitude = max_amplitude;
        Ok(())
    }

    fn generated_frames(&self) -> Result<&[Vec<f64>]> {
        self.frames
            .as_deref()
            .ok_or(FvzError::EncoderPrecondition("frames not generated"))
    }

    fn header(&self, total_frames: u32) -> Header {
        Header {
            fft_resolution: self.config.fft_resolution,
            num_bands: self.config.bar_count,
            frame_rate: self.config.frame_rate,
            total_frames,
            max_amplitude: self.max_amplitude,
            flags: self.config.compression,
            quantize_level: self.config.quantize_level,
        }
    }

    /// Serializes the session into a `.fvz` byte stream.
    pub fn save_to_memory(&self) -> Result<Vec<u8>> {
        let frames = self.generated_frames()?;
        write_container(&self.header(frames.len() as u32), frames)
    }

    /// Writes the container to disk, appending the `.fvz` extension when the
    /// name lacks one. The bytes land in a temporary sibling first and are
    /// renamed into place, so a failed encode leaves no partial file.
    pub fn save_to_file(&self, name: &Path) -> Result<PathBuf> {
        let bytes = self.save_to_memory()?;

        let path = match name.extension() {
            Some(ext) if ext.eq_ignore_ascii_case("fvz") => name.to_path_buf(),
            _ => {
                let mut with_ext = name.as_os_str().to_owned();
                with_ext.push(".fvz");
                PathBuf::from(with_ext)
            }
        };

        let tmp = path.with_extension("fvz.tmp");
        std::fs::write(&tmp, &bytes)?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }

        log::info!("Wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    /// The in-memory `{header, frames}` bundle for this session.
    pub fn visualization(&self) -> Result<Visualization> {
        let frames = self.generated_frames()?;
        Ok(Visualization {
            header: self.header(frames.len() as u32),
            frames: frames.to_vec(),
        })
    }
}

/// Serializes a header and frame set through the transform cascade. Shared by
/// the file and in-memory paths so both produce identical bytes.
pub fn write_container(header: &Header, frames: &[Vec<f64>]) -> Result<Vec<u8>> {
    let payload = transform::encode_payload(
        frames,
        header.flags.quantize,
        header.flags.delta,
        header.quantize_level,
    );

    let mut out = Vec::with_capacity(crate::codec::header::HEADER_SIZE + payload.len());
    out.extend_from_slice(&header.to_bytes());

    if header.flags.zstd {
        let compressed = ZstdCodec::compress(&payload)?;
        out.extend_from_slice(&(compressed.len() as i32).to_le_bytes());
        out.extend_from_slice(&compressed);
    } else {
        out.extend_from_slice(&payload);
    }

    Ok(out)
}
