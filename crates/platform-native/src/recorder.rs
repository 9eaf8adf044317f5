//! Streaming WebM recorder backed by a GStreamer pipeline.
//!
//! ```text
//! appsrc(video, RGBA) → videoconvert → vp9enc/vp8enc ─┐
//!                                                     ├→ webmmux → appsink → DataAvailable
//! appsrc(audio, F32) → audioconvert → opusenc ────────┘
//! ```
//!
//! Video buffers carry the capture timestamps of their frames. Audio is
//! pulled from the mixed track in step with the video timeline, so both
//! streams start at zero.

use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use gst::prelude::*;
use gstreamer as gst;
use gstreamer_app as gst_app;
use tokio::sync::mpsc;

use lapse_common::error::{LapseError, LapseResult};
use lapse_media_core::recorder::{
    Recorder, RecorderEvent, RecorderFactory, RecorderOptions, RecorderState,
};
use lapse_media_core::stream::{AudioTrack, MediaStream, TrackHandle, VideoTrack};

use crate::codecs::{encoder_elements, produced_mime_type, EncoderElements};

/// Elements every pipeline needs regardless of codec.
const BASE_ELEMENTS: [&str; 6] = [
    "appsrc",
    "appsink",
    "queue",
    "videoconvert",
    "audioconvert",
    "audioresample",
];

fn init_gstreamer() -> LapseResult<()> {
    static GST_INIT: OnceLock<Result<(), String>> = OnceLock::new();
    match GST_INIT.get_or_init(|| gst::init().map_err(|e| e.to_string())) {
        Ok(()) => Ok(()),
        Err(e) => Err(LapseError::unsupported(
            format!("GStreamer failed to initialize: {e}"),
            vec!["recorder".into()],
        )),
    }
}

fn element_available(name: &str) -> bool {
    gst::ElementFactory::find(name).is_some()
}

/// Builds [`GstRecorder`]s; support is probed from installed element
/// factories.
#[derive(Debug)]
pub struct GstRecorderFactory {
    _private: (),
}

impl GstRecorderFactory {
    /// Initialize GStreamer and check the base elements are installed.
    pub fn new() -> LapseResult<Self> {
        init_gstreamer()?;
        let missing: Vec<String> = BASE_ELEMENTS
            .iter()
            .filter(|name| !element_available(name))
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(LapseError::unsupported(
                format!("missing GStreamer elements: {}", missing.join(", ")),
                vec!["recorder".into()],
            ));
        }
        Ok(Self { _private: () })
    }
}

impl RecorderFactory for GstRecorderFactory {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        encoder_elements(mime_type)
            .map(|e| [e.video, e.audio, e.muxer].into_iter().all(element_available))
            .unwrap_or(false)
    }

    fn create(
        &self,
        stream: MediaStream,
        options: RecorderOptions,
    ) -> LapseResult<Box<dyn Recorder>> {
        let elements = encoder_elements(&options.mime_type).ok_or_else(|| {
            LapseError::invalid_input(format!("Unsupported mime type {}", options.mime_type))
        })?;
        Ok(Box::new(GstRecorder::new(stream, options, elements)?))
    }
}

fn launch_description(stream: &MediaStream, options: &RecorderOptions, e: EncoderElements) -> String {
    let video = stream.video();
    let fps = options.frame_rate.max(1);
    let keyint = fps.saturating_mul(2).max(2);
    let mut launch = format!(
        "appsrc name=video format=time caps=\"video/x-raw,format=RGBA,width={w},height={h},framerate={fps}/1\" \
         ! queue ! videoconvert ! {enc} deadline=1 target-bitrate={vbps} keyframe-max-dist={keyint} \
         ! queue ! {mux} name=mux streamable=true ! appsink name=sink sync=false",
        w = video.width(),
        h = video.height(),
        enc = e.video,
        vbps = options.video_bits_per_second,
        mux = e.muxer,
    );
    if let Some(audio) = stream.audio() {
        launch.push_str(&format!(
            " appsrc name=audio format=time \
             caps=\"audio/x-raw,format=F32LE,layout=interleaved,rate={rate},channels={ch}\" \
             ! queue ! audioconvert ! audioresample ! {enc} bitrate={abps} ! queue ! mux.",
            rate = audio.sample_rate(),
            ch = audio.channels(),
            enc = e.audio,
            abps = options.audio_bits_per_second,
        ));
    }
    launch
}

fn pipeline_error(msg: impl std::fmt::Display) -> LapseError {
    LapseError::invalid_input(format!("GStreamer pipeline: {msg}"))
}

fn app_element<T: IsA<gst::Element>>(pipeline: &gst::Pipeline, name: &str) -> LapseResult<T> {
    pipeline
        .by_name(name)
        .ok_or_else(|| pipeline_error(format!("element {name} not found")))?
        .dynamic_cast::<T>()
        .map_err(|_| pipeline_error(format!("element {name} has the wrong type")))
}

/// A running WebM encode of one [`MediaStream`].
pub struct GstRecorder {
    pipeline: gst::Pipeline,
    video_src: gst_app::AppSrc,
    audio_src: Option<gst_app::AppSrc>,
    sink: gst_app::AppSink,
    stream: Option<MediaStream>,
    tracks: Vec<TrackHandle>,
    mime_type: String,
    options: RecorderOptions,
    state: Arc<Mutex<RecorderState>>,
}

impl GstRecorder {
    fn new(stream: MediaStream, options: RecorderOptions, elements: EncoderElements) -> LapseResult<Self> {
        init_gstreamer()?;
        let launch = launch_description(&stream, &options, elements);
        tracing::debug!(%launch, "Building recorder pipeline");

        let pipeline = gst::parse::launch(&launch)
            .map_err(pipeline_error)?
            .dynamic_cast::<gst::Pipeline>()
            .map_err(|_| pipeline_error("launch string did not produce a pipeline"))?;
        let video_src = app_element::<gst_app::AppSrc>(&pipeline, "video")?;
        let audio_src = if stream.has_audio() {
            Some(app_element::<gst_app::AppSrc>(&pipeline, "audio")?)
        } else {
            None
        };
        let sink = app_element::<gst_app::AppSink>(&pipeline, "sink")?;

        Ok(Self {
            pipeline,
            video_src,
            audio_src,
            sink,
            tracks: stream.track_handles(),
            mime_type: produced_mime_type(&options.mime_type, stream.has_audio()),
            stream: Some(stream),
            options,
            state: Arc::new(Mutex::new(RecorderState::Inactive)),
        })
    }

    fn set_state(&self, state: RecorderState) {
        set_shared(&self.state, state);
    }
}

fn set_shared(shared: &Mutex<RecorderState>, state: RecorderState) {
    *shared.lock().unwrap_or_else(|p| p.into_inner()) = state;
}

fn get_shared(shared: &Mutex<RecorderState>) -> RecorderState {
    *shared.lock().unwrap_or_else(|p| p.into_inner())
}

impl Recorder for GstRecorder {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn start(&mut self) -> LapseResult<mpsc::UnboundedReceiver<RecorderEvent>> {
        let stream = self
            .stream
            .take()
            .ok_or_else(|| pipeline_error("recorder already started"))?;
        let (video, audio) = stream.into_parts();

        self.pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| pipeline_error(format!("failed to start: {e:?}")))?;
        self.set_state(RecorderState::Recording);

        let (tx, rx) = mpsc::unbounded_channel();
        let frame_interval = Duration::from_nanos(1_000_000_000 / u64::from(self.options.frame_rate.max(1)));

        tokio::spawn(feed(
            self.video_src.clone(),
            self.audio_src.clone(),
            video,
            audio,
            frame_interval,
        ));

        let sink = self.sink.clone();
        let pipeline = self.pipeline.clone();
        let state = self.state.clone();
        let data_tx = tx.clone();
        tokio::task::spawn_blocking(move || drain_sink(sink, pipeline, state, data_tx));

        if let Some(bus) = self.pipeline.bus() {
            let state = self.state.clone();
            tokio::task::spawn_blocking(move || watch_bus(bus, state, tx));
        }

        tracing::info!(mime_type = %self.mime_type, "GStreamer recorder started");
        Ok(rx)
    }

    fn stop(&mut self) {
        if get_shared(&self.state) != RecorderState::Recording {
            return;
        }
        self.set_state(RecorderState::Stopping);
        // Ending the tracks lets the feeder push end-of-stream once drained.
        for track in &self.tracks {
            track.stop();
        }
    }

    fn state(&self) -> RecorderState {
        get_shared(&self.state)
    }
}

impl Drop for GstRecorder {
    fn drop(&mut self) {
        for track in &self.tracks {
            track.stop();
        }
        self.set_state(RecorderState::Stopped);
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            tracing::warn!(error = ?e, "Failed to shut down recorder pipeline");
        }
    }
}

fn clock_time(d: Duration) -> gst::ClockTime {
    gst::ClockTime::from_nseconds(d.as_nanos() as u64)
}

fn timed_buffer(bytes: Vec<u8>, pts: Duration, duration: Duration) -> gst::Buffer {
    let mut buffer = gst::Buffer::from_mut_slice(bytes);
    {
        let buffer = buffer.make_mut();
        buffer.set_pts(clock_time(pts));
        buffer.set_duration(clock_time(duration));
    }
    buffer
}

/// Push frames (and the matching stretch of audio) until the video track
/// ends, then signal end-of-stream.
async fn feed(
    video_src: gst_app::AppSrc,
    audio_src: Option<gst_app::AppSrc>,
    mut video: VideoTrack,
    audio: Option<AudioTrack>,
    frame_interval: Duration,
) {
    let mut audio_frames_sent: u64 = 0;
    let mut frames = 0u64;

    while let Some(frame) = video.next_frame().await {
        let raw = frame.image.as_raw().clone();
        if let Err(e) = video_src.push_buffer(timed_buffer(raw, frame.timestamp, frame_interval)) {
            tracing::warn!(error = ?e, "Video appsrc rejected buffer");
            break;
        }
        frames += 1;

        if let (Some(src), Some(track)) = (&audio_src, &audio) {
            let rate = u64::from(track.sample_rate());
            let end = frame.timestamp + frame_interval;
            let target = (end.as_secs_f64() * rate as f64).round() as u64;
            let count = target.saturating_sub(audio_frames_sent);
            if count > 0 {
                let block = track.pull(count as usize);
                let bytes: Vec<u8> = block.samples.iter().flat_map(|s| s.to_le_bytes()).collect();
                let pts = Duration::from_secs_f64(audio_frames_sent as f64 / rate as f64);
                let duration = Duration::from_secs_f64(count as f64 / rate as f64);
                if let Err(e) = src.push_buffer(timed_buffer(bytes, pts, duration)) {
                    tracing::warn!(error = ?e, "Audio appsrc rejected buffer");
                }
                audio_frames_sent = target;
            }
        }
    }

    tracing::debug!(frames, audio_frames = audio_frames_sent, "Recorder input drained");
    let _ = video_src.end_of_stream();
    if let Some(src) = audio_src {
        let _ = src.end_of_stream();
    }
}

/// Forward muxed chunks until end-of-stream.
fn drain_sink(
    sink: gst_app::AppSink,
    pipeline: gst::Pipeline,
    state: Arc<Mutex<RecorderState>>,
    tx: mpsc::UnboundedSender<RecorderEvent>,
) {
    loop {
        match sink.pull_sample() {
            Ok(sample) => {
                let Some(buffer) = sample.buffer() else {
                    continue;
                };
                match buffer.map_readable() {
                    Ok(map) => {
                        let _ = tx.send(RecorderEvent::DataAvailable(map.as_slice().to_vec()));
                    }
                    Err(e) => tracing::warn!(error = %e, "Unreadable output buffer"),
                }
            }
            Err(_) => {
                if sink.is_eos() {
                    set_shared(&state, RecorderState::Stopped);
                    let _ = pipeline.set_state(gst::State::Null);
                    let _ = tx.send(RecorderEvent::Stopped);
                    tracing::debug!("Recorder output drained");
                }
                break;
            }
        }
    }
}

/// Report pipeline errors until the recorder stops.
fn watch_bus(bus: gst::Bus, state: Arc<Mutex<RecorderState>>, tx: mpsc::UnboundedSender<RecorderEvent>) {
    while get_shared(&state) != RecorderState::Stopped && !tx.is_closed() {
        let Some(msg) = bus.timed_pop_filtered(
            gst::ClockTime::from_mseconds(100),
            &[gst::MessageType::Error],
        ) else {
            continue;
        };
        if let gst::MessageView::Error(err) = msg.view() {
            let message = match err.debug() {
                Some(debug) => format!("{} ({debug})", err.error()),
                None => err.error().to_string(),
            };
            tracing::error!(%message, "Recorder pipeline error");
            set_shared(&state, RecorderState::Stopped);
            let _ = tx.send(RecorderEvent::Error(message));
            break;
        }
    }
}
