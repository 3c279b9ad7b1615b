//! FFmpeg-backed media element.
//!
//! Each element owns one worker thread that opens the (proxied) URL, reports
//! metadata, decodes a first frame and then services seek commands. The most
//! recently decoded frame is kept as RGBA8 for capture.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use crossbeam::channel;
use ffmpeg_next as ffmpeg;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::core::time::{self, MediaTime};
use crate::media::element::{MediaBackend, MediaElement, MediaError, MediaEvent};

/// Decoded video frame (RGBA8, tightly packed)
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: MediaTime,
}

/// Command sent to the decode worker
#[derive(Debug, Clone, Copy)]
enum WorkerCommand {
    Seek(MediaTime),
}

/// State shared between the element and its worker
#[derive(Debug, Default)]
struct SharedState {
    current_time: MediaTime,
    width: u32,
    height: u32,
    frame: Option<VideoFrame>,
}

/// Creates FFmpeg media elements
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegBackend;

impl MediaBackend for FfmpegBackend {
    fn create_element(&self) -> Box<dyn MediaElement> {
        Box::new(FfmpegElement::new())
    }
}

/// Media element that decodes with FFmpeg on a dedicated thread
pub struct FfmpegElement {
    state: Arc<Mutex<SharedState>>,
    aborted: Arc<AtomicBool>,
    command_tx: Option<channel::Sender<WorkerCommand>>,
}

impl FfmpegElement {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SharedState::default())),
            aborted: Arc::new(AtomicBool::new(false)),
            command_tx: None,
        }
    }

    fn state(&self) -> MutexGuard<'_, SharedState> {
        lock(&self.state)
    }
}

impl Default for FfmpegElement {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaElement for FfmpegElement {
    fn load(&mut self, src: &str) -> mpsc::UnboundedReceiver<MediaEvent> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = channel::unbounded();
        self.command_tx = Some(command_tx);

        let src = src.to_string();
        let state = Arc::clone(&self.state);
        let aborted = Arc::clone(&self.aborted);

        // The worker is detached; it exits once the command channel closes
        thread::spawn(move || {
            let worker = DecodeWorker {
                state,
                aborted,
                events: event_tx.clone(),
            };
            if let Err(e) = worker.run(&src, command_rx) {
                debug!(src = %src, error = %e, "Media worker failed");
                let _ = event_tx.send(MediaEvent::Error(e.to_string()));
            }
        });

        event_rx
    }

    fn seek(&mut self, position: MediaTime) {
        if let Some(tx) = &self.command_tx {
            let _ = tx.send(WorkerCommand::Seek(position));
        }
    }

    fn current_time(&self) -> MediaTime {
        self.state().current_time
    }

    fn video_size(&self) -> (u32, u32) {
        let state = self.state();
        (state.width, state.height)
    }

    fn capture(&mut self, width: u32, height: u32) -> Result<RgbaImage, MediaError> {
        if width == 0 || height == 0 {
            return Err(MediaError::InvalidSize { width, height });
        }

        let frame = self.state().frame.clone().ok_or(MediaError::NoFrame)?;
        let (frame_width, frame_height) = (frame.width, frame.height);
        let source = RgbaImage::from_raw(frame_width, frame_height, frame.data).ok_or(
            MediaError::BadFrameBuffer {
                width: frame_width,
                height: frame_height,
            },
        )?;

        Ok(imageops::resize(&source, width, height, FilterType::Triangle))
    }

    fn abort(&mut self) {
        self.aborted.store(true, Ordering::Release);
        self.command_tx = None;
    }
}

impl Drop for FfmpegElement {
    fn drop(&mut self) {
        self.abort();
    }
}

fn lock(state: &Mutex<SharedState>) -> MutexGuard<'_, SharedState> {
    // A panicked worker leaves plain data behind; keep using it
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Everything the decode thread needs besides the FFmpeg contexts
struct DecodeWorker {
    state: Arc<Mutex<SharedState>>,
    aborted: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<MediaEvent>,
}

/// Open FFmpeg contexts for the selected video stream
struct VideoInput {
    input: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    stream_index: usize,
    timebase: (i32, i32),
    /// Timestamp of the first frame; positions are reported relative to it
    origin: MediaTime,
}

impl DecodeWorker {
    fn run(
        &self,
        src: &str,
        commands: channel::Receiver<WorkerCommand>,
    ) -> Result<(), MediaError> {
        ffmpeg::init()?;

        // Blocking network reads return as soon as the element is aborted
        let aborted = Arc::clone(&self.aborted);
        let input = ffmpeg::format::input_with_interrupt(&src, move || {
            aborted.load(Ordering::Acquire)
        })?;
        let duration = container_duration(&input);
        let mut video = VideoInput::open(input)?;
        let (width, height) = (video.decoder.width(), video.decoder.height());

        {
            let mut state = lock(&self.state);
            state.width = width;
            state.height = height;
        }
        self.emit(MediaEvent::LoadedMetadata {
            duration,
            width,
            height,
        });

        if let Some(frame) = video.decode_from(0.0, &self.aborted)? {
            self.store(frame);
        }
        self.emit(MediaEvent::CanPlay);

        while let Ok(command) = commands.recv() {
            if self.aborted.load(Ordering::Acquire) {
                break;
            }
            match command {
                WorkerCommand::Seek(target) => {
                    let current_time = match video.seek(target) {
                        Ok(()) => match video.decode_from(target, &self.aborted)? {
                            Some(frame) => self.store(frame),
                            None => lock(&self.state).current_time,
                        },
                        Err(e) => {
                            // Unseekable media stays where it was
                            warn!(position = target, error = %e, "Seek failed");
                            lock(&self.state).current_time
                        }
                    };
                    self.emit(MediaEvent::Seeked { current_time });
                }
            }
        }

        Ok(())
    }

    /// Keep `frame` as the current frame and return its position
    fn store(&self, frame: VideoFrame) -> MediaTime {
        let timestamp = frame.timestamp;
        let mut state = lock(&self.state);
        state.current_time = timestamp;
        state.frame = Some(frame);
        timestamp
    }

    fn emit(&self, event: MediaEvent) {
        // A closed channel means the extractor has gone away; stop quietly
        if self.events.send(event).is_err() {
            self.aborted.store(true, Ordering::Release);
        }
    }
}

impl VideoInput {
    fn open(input: ffmpeg::format::context::Input) -> Result<Self, MediaError> {
        let (stream_index, timebase, origin, parameters) = {
            let stream = input
                .streams()
                .best(ffmpeg::media::Type::Video)
                .ok_or(MediaError::NoVideoStream)?;
            let tb = stream.time_base();
            let timebase = (tb.numerator(), tb.denominator());
            (
                stream.index(),
                timebase,
                stream_origin(stream.start_time(), timebase),
                stream.parameters(),
            )
        };

        let decoder = ffmpeg::codec::context::Context::from_parameters(parameters)?
            .decoder()
            .video()?;

        let scaler = ffmpeg::software::scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::format::Pixel::RGBA,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::Flags::BILINEAR,
        )?;

        Ok(Self {
            input,
            decoder,
            scaler,
            stream_index,
            timebase,
            origin,
        })
    }

    /// Seek to the nearest keyframe at or before `target`
    fn seek(&mut self, target: MediaTime) -> Result<(), MediaError> {
        let position = seek_position(target, self.origin);
        self.input.seek(position, ..position)?;
        self.decoder.flush();
        Ok(())
    }

    /// Decode forward until a frame at or after `target`.
    /// At end of stream the last decoded frame is returned instead.
    fn decode_from(
        &mut self,
        target: MediaTime,
        aborted: &AtomicBool,
    ) -> Result<Option<VideoFrame>, MediaError> {
        let mut decoded = ffmpeg::frame::Video::empty();
        let mut last = None;

        loop {
            if aborted.load(Ordering::Acquire) {
                return Ok(None);
            }

            let mut packet = ffmpeg::Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {}
                Err(ffmpeg::Error::Eof) => break,
                Err(_) if aborted.load(Ordering::Acquire) => return Ok(None),
                Err(e) => {
                    debug!(error = %e, "Read failed, treating as end of stream");
                    break;
                }
            }
            if packet.stream() != self.stream_index {
                continue;
            }
            if let Err(e) = self.decoder.send_packet(&packet) {
                debug!(error = %e, "Skipping undecodable packet");
                continue;
            }

            while self.decoder.receive_frame(&mut decoded).is_ok() {
                let frame = to_rgba(&mut self.scaler, &decoded, self.timebase, self.origin)?;
                if frame.timestamp >= target {
                    return Ok(Some(frame));
                }
                last = Some(frame);
            }
        }

        // Drain frames still buffered in the decoder
        let _ = self.decoder.send_eof();
        while self.decoder.receive_frame(&mut decoded).is_ok() {
            let frame = to_rgba(&mut self.scaler, &decoded, self.timebase, self.origin)?;
            if frame.timestamp >= target {
                return Ok(Some(frame));
            }
            last = Some(frame);
        }

        Ok(last)
    }
}

/// Convert a decoded frame to tightly packed RGBA8
fn to_rgba(
    scaler: &mut ffmpeg::software::scaling::Context,
    decoded: &ffmpeg::frame::Video,
    timebase: (i32, i32),
    origin: MediaTime,
) -> Result<VideoFrame, MediaError> {
    let mut rgba = ffmpeg::frame::Video::empty();
    scaler.run(decoded, &mut rgba)?;

    let width = rgba.width();
    let height = rgba.height();
    let stride = rgba.stride(0);
    let row_bytes = width as usize * 4;
    let plane = rgba.data(0);

    // Rows may be padded; copy only the visible pixels
    let mut data = Vec::with_capacity(row_bytes * height as usize);
    for y in 0..height as usize {
        let start = y * stride;
        data.extend_from_slice(&plane[start..start + row_bytes]);
    }

    let pts = decoded.timestamp().or(decoded.pts()).unwrap_or(0);
    let timestamp = time::pts_to_media_seconds(pts, timebase.0, timebase.1) - origin;

    Ok(VideoFrame {
        data,
        width,
        height,
        timestamp,
    })
}

/// First timestamp of a stream in seconds, zero when the stream doesn't say.
/// MPEG-TS and HLS streams commonly start well after 0.
fn stream_origin(start_pts: i64, timebase: (i32, i32)) -> MediaTime {
    if start_pts == ffmpeg::ffi::AV_NOPTS_VALUE {
        return 0.0;
    }
    time::pts_to_media_seconds(start_pts, timebase.0, timebase.1)
}

/// Container seek position (AV_TIME_BASE units) for a position relative to `origin`
fn seek_position(target: MediaTime, origin: MediaTime) -> i64 {
    ((target.max(0.0) + origin) * f64::from(ffmpeg::ffi::AV_TIME_BASE)) as i64
}

/// Container duration in seconds, zero when unknown (live streams)
fn container_duration(input: &ffmpeg::format::context::Input) -> MediaTime {
    let duration = input.duration();
    if duration <= 0 {
        return 0.0;
    }
    duration as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE)
}
