//! Scripted media backend for driving the extractor in tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use image::{Rgba, RgbaImage};
use tokio::sync::mpsc;

use crate::core::time::MediaTime;
use crate::media::element::{MediaBackend, MediaElement, MediaError, MediaEvent};

/// How the fake answers seek requests
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekBehavior {
    /// Lands exactly on the requested position
    Land,
    /// Always reports position 0
    StuckAtZero,
    /// Reports 0 for the first seek, then lands
    StuckOnce,
    /// Never reports completion
    Silent,
}

/// What a fake element does and what it has been asked to do
#[derive(Debug)]
pub struct Script {
    pub events: Vec<MediaEvent>,
    pub seek_behavior: SeekBehavior,
    pub video_size: (u32, u32),
    pub capture_fails: bool,
    pub loaded: Mutex<Vec<String>>,
    pub seeks: Mutex<Vec<MediaTime>>,
    pub captures: Mutex<Vec<(u32, u32)>>,
    pub aborts: AtomicUsize,
}

impl Script {
    /// A well-behaved 60s 1280x720 video
    pub fn healthy() -> Self {
        Self {
            events: vec![
                MediaEvent::LoadedMetadata {
                    duration: 60.0,
                    width: 1280,
                    height: 720,
                },
                MediaEvent::CanPlay,
            ],
            seek_behavior: SeekBehavior::Land,
            video_size: (1280, 720),
            capture_fails: false,
            loaded: Mutex::new(Vec::new()),
            seeks: Mutex::new(Vec::new()),
            captures: Mutex::new(Vec::new()),
            aborts: AtomicUsize::new(0),
        }
    }

    pub fn with_events(mut self, events: Vec<MediaEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn with_seek_behavior(mut self, behavior: SeekBehavior) -> Self {
        self.seek_behavior = behavior;
        self
    }

    pub fn with_video_size(mut self, width: u32, height: u32) -> Self {
        self.video_size = (width, height);
        self
    }

    pub fn with_failing_capture(mut self) -> Self {
        self.capture_fails = true;
        self
    }

    pub fn seeks(&self) -> Vec<MediaTime> {
        self.seeks.lock().unwrap().clone()
    }

    pub fn loaded(&self) -> Vec<String> {
        self.loaded.lock().unwrap().clone()
    }

    pub fn captures(&self) -> Vec<(u32, u32)> {
        self.captures.lock().unwrap().clone()
    }

    pub fn aborts(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }
}

/// Backend handing out elements that follow one shared script
#[derive(Debug, Clone)]
pub struct FakeBackend {
    pub script: Arc<Script>,
    pub created: Arc<AtomicUsize>,
}

impl FakeBackend {
    pub fn new(script: Script) -> Self {
        Self {
            script: Arc::new(script),
            created: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl MediaBackend for FakeBackend {
    fn create_element(&self) -> Box<dyn MediaElement> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Box::new(FakeElement {
            script: Arc::clone(&self.script),
            events: None,
            current_time: 0.0,
            seek_count: 0,
        })
    }
}

struct FakeElement {
    script: Arc<Script>,
    events: Option<mpsc::UnboundedSender<MediaEvent>>,
    current_time: MediaTime,
    seek_count: usize,
}

impl MediaElement for FakeElement {
    fn load(&mut self, src: &str) -> mpsc::UnboundedReceiver<MediaEvent> {
        self.script.loaded.lock().unwrap().push(src.to_string());
        let (tx, rx) = mpsc::unbounded_channel();
        for event in &self.script.events {
            let _ = tx.send(event.clone());
        }
        self.events = Some(tx);
        rx
    }

    fn seek(&mut self, position: MediaTime) {
        self.script.seeks.lock().unwrap().push(position);
        self.seek_count += 1;

        let landed = match self.script.seek_behavior {
            SeekBehavior::Land => Some(position),
            SeekBehavior::StuckAtZero => Some(0.0),
            SeekBehavior::StuckOnce if self.seek_count == 1 => Some(0.0),
            SeekBehavior::StuckOnce => Some(position),
            SeekBehavior::Silent => None,
        };

        if let (Some(current_time), Some(tx)) = (landed, &self.events) {
            self.current_time = current_time;
            let _ = tx.send(MediaEvent::Seeked { current_time });
        }
    }

    fn current_time(&self) -> MediaTime {
        self.current_time
    }

    fn video_size(&self) -> (u32, u32) {
        self.script.video_size
    }

    fn capture(&mut self, width: u32, height: u32) -> Result<RgbaImage, MediaError> {
        self.script.captures.lock().unwrap().push((width, height));
        if self.script.capture_fails {
            return Err(MediaError::NoFrame);
        }
        Ok(RgbaImage::from_pixel(width, height, Rgba([30, 60, 90, 255])))
    }

    fn abort(&mut self) {
        self.script.aborts.fetch_add(1, Ordering::SeqCst);
        self.events = None;
    }
}
