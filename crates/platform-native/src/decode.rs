//! Raster image decoding with `image` and audio decoding with `symphonia`.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use lapse_common::error::{LapseError, LapseResult};
use lapse_media_core::audio::{AudioBuffer, AudioDecoder};
use lapse_media_core::fetch::{Blob, ImageDecoder};
use lapse_media_core::surface::DecodedImage;

/// Decode encoded image bytes to RGBA8, sniffing the format from content.
///
/// Falls back to `hint` when the content is not recognised.
pub fn decode_with_hint(bytes: &[u8], hint: Option<image::ImageFormat>) -> LapseResult<DecodedImage> {
    let decoded = match (image::load_from_memory(bytes), hint) {
        (Ok(img), _) => img,
        (Err(_), Some(format)) => image::load_from_memory_with_format(bytes, format)
            .map_err(|e| LapseError::decode(format!("decode {format:?} image: {e}")))?,
        (Err(e), None) => return Err(LapseError::decode(format!("decode image: {e}"))),
    };
    Ok(DecodedImage::new(decoded.to_rgba8()))
}

/// Image decoder for PNG, JPEG, WebP, GIF and BMP frames.
#[derive(Debug, Clone, Default)]
pub struct RasterDecoder;

#[async_trait::async_trait]
impl ImageDecoder for RasterDecoder {
    async fn decode(&self, blob: Blob) -> LapseResult<DecodedImage> {
        let hint = blob
            .content_type()
            .and_then(image::ImageFormat::from_mime_type);
        tokio::task::spawn_blocking(move || decode_with_hint(blob.bytes(), hint))
            .await
            .map_err(|e| LapseError::decode(format!("Decode task failed: {e}")))?
    }
}

/// Decode a whole audio file into interleaved `f32` PCM.
pub fn decode_pcm(bytes: Vec<u8>) -> LapseResult<AudioBuffer> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| LapseError::audio(format!("Unrecognized audio container: {e}")))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| LapseError::audio("No decodable audio track"))?;
    let track_id = track.id;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| LapseError::audio(format!("Unsupported audio codec: {e}")))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_rate = 0u32;
    let mut channels = 0u16;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(LapseError::audio(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count() as u16;
                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::debug!(error = e, "Skipping undecodable audio packet");
            }
            Err(e) => return Err(LapseError::audio(e.to_string())),
        }
    }

    if samples.is_empty() || channels == 0 {
        return Err(LapseError::audio("Audio stream contained no samples"));
    }
    Ok(AudioBuffer::new(samples, sample_rate, channels))
}

/// Audio decoder for MP3, AAC/MP4, and the formats symphonia enables by
/// default.
#[derive(Debug, Clone, Default)]
pub struct SymphoniaDecoder;

#[async_trait::async_trait]
impl AudioDecoder for SymphoniaDecoder {
    async fn decode_audio(&self, bytes: Vec<u8>) -> LapseResult<AudioBuffer> {
        let buffer = tokio::task::spawn_blocking(move || decode_pcm(bytes))
            .await
            .map_err(|e| LapseError::audio(format!("Decode task failed: {e}")))??;
        tracing::debug!(
            sample_rate = buffer.sample_rate,
            channels = buffer.channels,
            frames = buffer.frames(),
            "Audio decoded"
        );
        Ok(buffer)
    }
}
