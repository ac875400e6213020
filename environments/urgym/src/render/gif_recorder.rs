//! Episode frames to animated GIF.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use gif::{Encoder, Frame as GifFrame, Repeat};

use crate::env::Frame;
use crate::error::{EnvError, EnvResult};

const DEFAULT_MAX_FRAMES: usize = 1000;

fn gif_err(e: impl std::fmt::Display) -> EnvError {
    EnvError::Render(e.to_string())
}

/// Collects same-sized RGB frames of one episode.
pub struct GifRecorder {
    width: u16,
    height: u16,
    /// Centiseconds between frames.
    delay: u16,
    max_frames: usize,
    frames: Vec<Vec<u8>>,
}

impl GifRecorder {
    pub fn new(width: u16, height: u16, fps: u16) -> Self {
        Self {
            width,
            height,
            delay: (100 / fps.max(1)).max(1),
            max_frames: DEFAULT_MAX_FRAMES,
            frames: Vec::new(),
        }
    }

    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = max_frames;
        self
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Append a frame; `Ok(false)` once the recorder is full.
    pub fn add_frame(&mut self, frame: &Frame) -> EnvResult<bool> {
        if (frame.width, frame.height) != (self.width as u32, self.height as u32) {
            return Err(EnvError::Render(format!(
                "frame is {}x{}, recorder expects {}x{}",
                frame.width, frame.height, self.width, self.height
            )));
        }
        if self.frames.len() >= self.max_frames {
            return Ok(false);
        }
        self.frames.push(frame.rgb.clone());
        Ok(true)
    }

    /// Encode all frames, looping forever.
    pub fn save(&self, path: impl AsRef<Path>) -> EnvResult<()> {
        if self.frames.is_empty() {
            return Err(EnvError::Render("no frames recorded".to_string()));
        }

        let writer = BufWriter::new(File::create(path.as_ref())?);
        let mut encoder = Encoder::new(writer, self.width, self.height, &[]).map_err(gif_err)?;
        encoder.set_repeat(Repeat::Infinite).map_err(gif_err)?;

        for rgb in &self.frames {
            let mut frame = GifFrame::from_rgb_speed(self.width, self.height, rgb, 10);
            frame.delay = self.delay;
            encoder.write_frame(&frame).map_err(gif_err)?;
        }
        Ok(())
    }
}
