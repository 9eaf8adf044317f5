//! In-memory test doubles for every platform capability.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use lapse_common::clock::VirtualTimer;
use lapse_common::error::{LapseError, LapseResult};
use lapse_media_core::audio::{AudioBuffer, AudioDecoder};
use lapse_media_core::capture::CanvasCapturer;
use lapse_media_core::fetch::{
    AssetFetcher, Blob, CrossOrigin, DirectImageLoader, FetchOptions, ImageDecoder,
    MemoryObjectUrls,
};
use lapse_media_core::platform::Platform;
use lapse_media_core::recorder::{
    Recorder, RecorderEvent, RecorderFactory, RecorderOptions, RecorderState,
};
use lapse_media_core::stream::{MediaStream, TrackHandle, TrackKind};
use lapse_media_core::surface::{DecodedImage, RasterSurfaces, Rgba, RgbaImage};
use lapse_synth_engine::CODEC_CHAIN;

pub const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
pub const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
pub const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Encodes a solid image as `img:WxH:R,G,B`, understood by [`FakeImageDecoder`].
pub fn image_bytes(width: u32, height: u32, color: Rgba<u8>) -> Vec<u8> {
    let [r, g, b, _] = color.0;
    format!("img:{width}x{height}:{r},{g},{b}").into_bytes()
}

fn parse_image(bytes: &[u8]) -> Option<DecodedImage> {
    let text = std::str::from_utf8(bytes).ok()?;
    let rest = text.strip_prefix("img:")?;
    let (dims, rgb) = rest.split_once(':')?;
    let (w, h) = dims.split_once('x')?;
    let channels: Vec<u8> = rgb.split(',').map(|c| c.parse().ok()).collect::<Option<_>>()?;
    let [r, g, b] = channels.as_slice() else {
        return None;
    };
    Some(DecodedImage::solid(
        w.parse().ok()?,
        h.parse().ok()?,
        Rgba([*r, *g, *b, 255]),
    ))
}

/// Serves canned responses and counts requests.
#[derive(Debug, Default)]
pub struct FakeFetcher {
    routes: Mutex<HashMap<String, Vec<u8>>>,
    calls: AtomicUsize,
    options: Mutex<Vec<FetchOptions>>,
}

impl FakeFetcher {
    pub fn serve(&self, url: &str, bytes: Vec<u8>) {
        self.routes.lock().unwrap().insert(url.to_string(), bytes);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn options_seen(&self) -> Vec<FetchOptions> {
        self.options.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AssetFetcher for FakeFetcher {
    async fn fetch(&self, url: &str, options: FetchOptions) -> LapseResult<Blob> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.options.lock().unwrap().push(options);
        tokio::task::yield_now().await;
        match self.routes.lock().unwrap().get(url) {
            Some(bytes) => Ok(Blob::new(bytes.clone(), None)),
            None => Err(LapseError::fetch(url, "404 Not Found")),
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeImageDecoder;

#[async_trait::async_trait]
impl ImageDecoder for FakeImageDecoder {
    async fn decode(&self, blob: Blob) -> LapseResult<DecodedImage> {
        parse_image(blob.bytes()).ok_or_else(|| LapseError::decode("unrecognized image data"))
    }
}

/// Direct-tag loader that only knows the URLs it was given.
#[derive(Debug, Default)]
pub struct FakeDirectLoader {
    images: Mutex<HashMap<String, DecodedImage>>,
    calls: AtomicUsize,
}

impl FakeDirectLoader {
    pub fn serve(&self, url: &str, image: DecodedImage) {
        self.images.lock().unwrap().insert(url.to_string(), image);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DirectImageLoader for FakeDirectLoader {
    async fn load(&self, url: &str, cross_origin: CrossOrigin) -> LapseResult<DecodedImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(cross_origin, CrossOrigin::Anonymous);
        self.images
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| LapseError::decode(format!("image element failed to load {url}")))
    }
}

/// Decodes `pcm:N` into N mono frames of a 0.8 amplitude tone at 8 kHz.
#[derive(Debug, Default)]
pub struct FakeAudioDecoder;

pub const TEST_SAMPLE_RATE: u32 = 8000;

#[async_trait::async_trait]
impl AudioDecoder for FakeAudioDecoder {
    async fn decode_audio(&self, bytes: Vec<u8>) -> LapseResult<AudioBuffer> {
        let frames: usize = std::str::from_utf8(&bytes)
            .ok()
            .and_then(|t| t.strip_prefix("pcm:"))
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| LapseError::audio("not audio"))?;
        Ok(AudioBuffer::new(vec![0.8; frames], TEST_SAMPLE_RATE, 1))
    }
}

/// What a fake recorder observed.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub timestamp: Duration,
    pub image: Arc<RgbaImage>,
}

#[derive(Debug, Default)]
pub struct RecorderLog {
    pub created: Vec<RecorderOptions>,
    pub frames: Vec<CapturedFrame>,
    pub had_audio: bool,
    pub audio_samples: Vec<f32>,
    pub stop_requests: usize,
    /// Handles of every track on each stream handed to `create`.
    pub tracks: Vec<TrackHandle>,
}

/// Recorder factory with a configurable supported-codec list.
#[derive(Debug)]
pub struct FakeRecorderFactory {
    supported: Mutex<Vec<String>>,
    pub log: Arc<Mutex<RecorderLog>>,
    fail_create: Mutex<Option<String>>,
    fail_after_frames: Mutex<Option<usize>>,
}

impl Default for FakeRecorderFactory {
    fn default() -> Self {
        Self {
            supported: Mutex::new(CODEC_CHAIN.iter().map(|s| s.to_string()).collect()),
            log: Arc::default(),
            fail_create: Mutex::new(None),
            fail_after_frames: Mutex::new(None),
        }
    }
}

impl FakeRecorderFactory {
    pub fn support_only(&self, mime_types: &[&str]) {
        *self.supported.lock().unwrap() = mime_types.iter().map(|s| s.to_string()).collect();
    }

    pub fn fail_construction(&self, message: &str) {
        *self.fail_create.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_after_frames(&self, frames: usize) {
        *self.fail_after_frames.lock().unwrap() = Some(frames);
    }
}

impl RecorderFactory for FakeRecorderFactory {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.supported.lock().unwrap().iter().any(|m| m == mime_type)
    }

    fn create(
        &self,
        stream: MediaStream,
        options: RecorderOptions,
    ) -> LapseResult<Box<dyn Recorder>> {
        self.log.lock().unwrap().tracks.extend(stream.track_handles());
        if let Some(message) = self.fail_create.lock().unwrap().clone() {
            return Err(LapseError::invalid_input(message));
        }
        self.log.lock().unwrap().created.push(options.clone());
        Ok(Box::new(FakeRecorder {
            stream: Some(stream),
            options,
            state: RecorderState::Inactive,
            log: self.log.clone(),
            fail_after_frames: *self.fail_after_frames.lock().unwrap(),
        }))
    }
}

/// Emits one chunk per captured frame, `F<ms>;`, after a header chunk.
pub struct FakeRecorder {
    stream: Option<MediaStream>,
    options: RecorderOptions,
    state: RecorderState,
    log: Arc<Mutex<RecorderLog>>,
    fail_after_frames: Option<usize>,
}

impl Recorder for FakeRecorder {
    fn mime_type(&self) -> &str {
        &self.options.mime_type
    }

    fn start(&mut self) -> LapseResult<mpsc::UnboundedReceiver<RecorderEvent>> {
        let stream = self
            .stream
            .take()
            .ok_or_else(|| LapseError::invalid_input("recorder already started"))?;
        let (tx, rx) = mpsc::unbounded_channel();
        let (mut video, audio) = stream.into_parts();
        let log = self.log.clone();
        let fail_after = self.fail_after_frames;
        let header = format!("HDR {};", self.options.mime_type).into_bytes();
        log.lock().unwrap().had_audio = audio.is_some();
        self.state = RecorderState::Recording;

        tokio::spawn(async move {
            let _ = tx.send(RecorderEvent::DataAvailable(header));
            let mut count = 0usize;
            while let Some(frame) = video.next_frame().await {
                if fail_after == Some(count) {
                    let _ = tx.send(RecorderEvent::Error("encoder crashed".into()));
                    return;
                }
                count += 1;
                if let Some(audio) = &audio {
                    let per_frame = (audio.sample_rate() / video.frame_rate()) as usize;
                    let block = audio.pull(per_frame);
                    log.lock().unwrap().audio_samples.extend(block.samples);
                }
                let chunk = format!("F{};", frame.timestamp.as_millis()).into_bytes();
                log.lock().unwrap().frames.push(CapturedFrame {
                    timestamp: frame.timestamp,
                    image: frame.image,
                });
                let _ = tx.send(RecorderEvent::DataAvailable(chunk));
            }
            let _ = tx.send(RecorderEvent::DataAvailable(Vec::new()));
            let _ = tx.send(RecorderEvent::Stopped);
        });
        Ok(rx)
    }

    fn stop(&mut self) {
        self.log.lock().unwrap().stop_requests += 1;
        self.state = RecorderState::Stopping;
    }

    fn state(&self) -> RecorderState {
        self.state
    }
}

/// A platform built from fakes, with handles to inspect each one.
pub struct Harness {
    pub fetcher: Arc<FakeFetcher>,
    pub object_urls: Arc<MemoryObjectUrls>,
    pub direct: Arc<FakeDirectLoader>,
    pub recorders: Arc<FakeRecorderFactory>,
    pub timer: Arc<VirtualTimer>,
}

impl Harness {
    pub fn new() -> Self {
        lapse_common::logging::init_default_logging();
        Self {
            fetcher: Arc::default(),
            object_urls: Arc::new(MemoryObjectUrls::new()),
            direct: Arc::default(),
            recorders: Arc::default(),
            timer: Arc::new(VirtualTimer::new()),
        }
    }

    pub fn platform(&self) -> Platform {
        Platform {
            fetcher: self.fetcher.clone(),
            object_urls: self.object_urls.clone(),
            image_decoder: Arc::new(FakeImageDecoder),
            direct_loader: self.direct.clone(),
            audio_decoder: Some(Arc::new(FakeAudioDecoder)),
            capturer: Some(Arc::new(CanvasCapturer)),
            recorder: Some(self.recorders.clone()),
            surfaces: Some(Arc::new(RasterSurfaces::default())),
            timer: self.timer.clone(),
        }
    }

    /// Serve `count` solid frames of the given size and return their URLs.
    pub fn serve_frames(&self, count: usize, width: u32, height: u32) -> Vec<String> {
        let palette = [RED, GREEN, BLUE];
        (0..count)
            .map(|i| {
                let url = format!("https://cdn.example/frames/{i}.png");
                self.fetcher
                    .serve(&url, image_bytes(width, height, palette[i % palette.len()]));
                url
            })
            .collect()
    }

    pub fn serve_music(&self, url: &str, frames: usize) {
        self.fetcher.serve(url, format!("pcm:{frames}").into_bytes());
    }

    pub fn log(&self) -> std::sync::MutexGuard<'_, RecorderLog> {
        self.recorders.log.lock().unwrap()
    }

    /// Assert the recorded stream carried `expected` tracks and that every
    /// one of them has been stopped.
    pub fn assert_tracks_stopped(&self, expected: &[TrackKind]) {
        let log = self.log();
        let kinds: Vec<TrackKind> = log.tracks.iter().map(|t| t.kind()).collect();
        assert_eq!(kinds, expected);
        for track in &log.tracks {
            assert!(!track.is_live(), "track {} still live", track.id());
        }
    }
}
