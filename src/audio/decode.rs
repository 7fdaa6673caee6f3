use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{FvzError, Result};

/// Mono PCM handed to the frame pipeline: the codec's audio provider contract.
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioData {
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decodes an audio file into the mono stream the frame pipeline consumes.
pub fn decode_audio(path: &Path) -> Result<AudioData> {
    let audio = PcmReader::open(path)?.collect_mono()?;

    log::info!(
        "Loaded {}: {} mono samples at {} Hz ({:.1}s)",
        path.display(),
        audio.samples.len(),
        audio.sample_rate,
        audio.duration_seconds()
    );

    Ok(audio)
}

/// Decoded-packet source for the first decodable audio track of a container.
///
/// Opening probes the container and resolves the track's geometry (rate,
/// channel count, length hint); draining folds every packet into one mono
/// buffer. The split keeps the symphonia plumbing out of the fold loop.
struct PcmReader {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    channels: usize,
    sample_rate: u32,
    length_hint: usize,
}

impl PcmReader {
    fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let stream = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, stream, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| FvzError::AudioDecode(format!("{}: {e}", path.display())))?;
        let format = probed.format;

        let (track_id, params) = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .map(|t| (t.id, t.codec_params.clone()))
            .ok_or_else(|| {
                FvzError::AudioDecode(format!("no decodable audio track in {}", path.display()))
            })?;

        let sample_rate = params
            .sample_rate
            .filter(|&rate| rate > 0)
            .ok_or_else(|| FvzError::AudioDecode("track reports no sample rate".into()))?;
        let channels = params.channels.map_or(1, |c| c.count());
        let length_hint = params.n_frames.unwrap_or(0) as usize;

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| FvzError::AudioDecode(format!("no decoder for track: {e}")))?;

        Ok(Self { format, decoder, track_id, channels, sample_rate, length_hint })
    }

    /// Drains the container, averaging interleaved channels down to mono.
    fn collect_mono(mut self) -> Result<AudioData> {
        let mut samples = Vec::with_capacity(self.length_hint);

        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => return Err(FvzError::AudioDecode(e.to_string())),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(d) => d,
                // A damaged packet drops out of the stream; the file still decodes.
                Err(SymphoniaError::DecodeError(_)) => continue,
                Err(e) => return Err(FvzError::AudioDecode(e.to_string())),
            };

            let spec = *decoded.spec();
            let mut buffer = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
            buffer.copy_interleaved_ref(decoded);
            downmix_into(&mut samples, buffer.samples(), self.channels);
        }

        Ok(AudioData { samples, sample_rate: self.sample_rate })
    }
}

/// Equal-weight channel average over interleaved PCM; mono passes through.
/// A trailing partial frame (fewer samples than channels) is dropped.
fn downmix_into(out: &mut Vec<f32>, interleaved: &[f32], channels: usize) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    let gain = 1.0 / channels as f32;
    for frame in interleaved.chunks_exact(channels) {
        out.push(frame.iter().sum::<f32>() * gain);
    }
}
