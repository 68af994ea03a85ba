use std::io::Cursor;
use std::path::Path;

use symphonia::core::{
    audio::SampleBuffer,
    codecs::{CODEC_TYPE_NULL, DecoderOptions},
    errors::Error,
    formats::FormatOptions,
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};
use tracing::debug;

use super::{AudioSample, DecodeError};

/// Decode an audio file into a mono [`AudioSample`].
pub fn decode_file(path: &Path) -> Result<AudioSample, DecodeError> {
    let bytes = std::fs::read(path).map_err(|source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let extension = path.extension().and_then(|ext| ext.to_str());
    decode_bytes(bytes, extension)
}

/// Decode an in-memory audio stream.
///
/// `extension` is a container hint such as `"wav"` or `"mp3"`; RIFF/WAVE
/// content is detected from its header regardless of the hint.
pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<AudioSample, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    if looks_like_wav(&bytes) {
        return decode_wav(bytes);
    }
    decode_with_symphonia(bytes, extension)
}

fn looks_like_wav(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

fn decode_wav(bytes: Vec<u8>) -> Result<AudioSample, DecodeError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 * scale))
                .collect::<Result<_, _>>()?
        }
    };
    debug!(
        "Decoded WAV: {} Hz, {} channel(s), {} samples",
        spec.sample_rate,
        spec.channels,
        interleaved.len()
    );
    AudioSample::from_interleaved(&interleaved, spec.channels, spec.sample_rate)
}

fn decode_with_symphonia(
    bytes: Vec<u8>,
    extension: Option<&str>,
) -> Result<AudioSample, DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }
    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::MissingTrack)?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map(|layout| layout.count() as u16)
        .unwrap_or(0);
    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(_)) | Err(Error::ResetRequired) => break,
            Err(err) => return Err(err.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let audio_buf = match decoder.decode(&packet) {
            Ok(audio_buf) => audio_buf,
            Err(Error::DecodeError(reason)) => {
                debug!("Skipping corrupt packet: {reason}");
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        let spec = *audio_buf.spec();
        sample_rate = spec.rate;
        channels = spec.channels.count() as u16;
        let mut sample_buf = SampleBuffer::<f32>::new(audio_buf.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(audio_buf);
        samples.extend_from_slice(sample_buf.samples());
    }

    if samples.is_empty() {
        return Err(DecodeError::Empty);
    }
    debug!(
        "Decoded {} Hz, {} channel(s), {} samples",
        sample_rate,
        channels,
        samples.len()
    );
    AudioSample::from_interleaved(&samples, channels, sample_rate)
}
