//! Mapping recorder mime types to GStreamer encoder elements.

use lapse_media_core::recorder::parse_mime_type;

/// Encoder and muxer elements for one container/codec combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderElements {
    pub video: &'static str,
    pub audio: &'static str,
    pub muxer: &'static str,
}

fn video_element(codec: &str) -> Option<&'static str> {
    match codec {
        "vp9" | "vp09" => Some("vp9enc"),
        "vp8" | "vp08" => Some("vp8enc"),
        _ => None,
    }
}

fn audio_element(codec: &str) -> Option<&'static str> {
    match codec {
        "opus" => Some("opusenc"),
        "vorbis" => Some("vorbisenc"),
        _ => None,
    }
}

/// Elements for `mime_type`, or `None` if the container or a codec is
/// unknown. Unspecified codecs default to VP8 video and Opus audio.
pub fn encoder_elements(mime_type: &str) -> Option<EncoderElements> {
    let (container, codecs) = parse_mime_type(mime_type);
    if container != "video/webm" {
        return None;
    }

    let mut video = None;
    let mut audio = None;
    for codec in &codecs {
        if let Some(v) = video_element(codec) {
            video = Some(v);
        } else if let Some(a) = audio_element(codec) {
            audio = Some(a);
        } else {
            return None;
        }
    }

    Some(EncoderElements {
        video: video.unwrap_or("vp8enc"),
        audio: audio.unwrap_or("opusenc"),
        muxer: "webmmux",
    })
}

/// Mime type describing what a pipeline for `mime_type` actually muxes.
///
/// Without an audio input the container carries no audio track, so audio
/// codecs are dropped from the codec list.
pub fn produced_mime_type(mime_type: &str, has_audio: bool) -> String {
    if has_audio {
        return mime_type.to_string();
    }
    let (container, codecs) = parse_mime_type(mime_type);
    let video: Vec<String> = codecs
        .into_iter()
        .filter(|c| audio_element(c).is_none())
        .collect();
    if video.is_empty() {
        container
    } else {
        format!("{container};codecs={}", video.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paired_codecs_map_to_elements() {
        let e = encoder_elements("video/webm;codecs=vp9,opus").unwrap();
        assert_eq!((e.video, e.audio, e.muxer), ("vp9enc", "opusenc", "webmmux"));
    }

    #[test]
    fn bare_container_uses_defaults() {
        let e = encoder_elements("video/webm").unwrap();
        assert_eq!((e.video, e.audio), ("vp8enc", "opusenc"));
        assert_eq!(encoder_elements("video/webm;codecs=vp9").unwrap().audio, "opusenc");
    }

    #[test]
    fn unknown_container_or_codec_is_unsupported() {
        assert!(encoder_elements("video/mp4;codecs=avc1").is_none());
        assert!(encoder_elements("video/webm;codecs=av1,opus").is_none());
    }

    #[test]
    fn video_only_streams_drop_the_audio_codec() {
        assert_eq!(
            produced_mime_type("video/webm;codecs=vp9,opus", false),
            "video/webm;codecs=vp9"
        );
        assert_eq!(
            produced_mime_type("video/webm;codecs=vp9,opus", true),
            "video/webm;codecs=vp9,opus"
        );
        assert_eq!(produced_mime_type("video/webm", false), "video/webm");
    }
}
