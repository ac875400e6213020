//! Desktop window for `RenderMode::Human`.

use std::time::{Duration, Instant};

use minifb::{Key, ScaleMode, Window, WindowOptions};

use crate::env::Frame;
use crate::error::{EnvError, EnvResult};

/// Shows the latest frame, redrawing at most `max_fps` times a second.
/// Escape or the close button ends the display.
pub struct RealtimeWindow {
    window: Window,
    pixels: Vec<u32>,
    min_interval: Duration,
    last_shown: Option<Instant>,
}

impl RealtimeWindow {
    pub fn new(title: &str, width: usize, height: usize, max_fps: u32) -> EnvResult<Self> {
        let options = WindowOptions {
            resize: true,
            scale_mode: ScaleMode::AspectRatioStretch,
            ..WindowOptions::default()
        };
        let window = Window::new(title, width, height, options)
            .map_err(|e| EnvError::RenderUnavailable(e.to_string()))?;

        Ok(Self {
            window,
            pixels: Vec::with_capacity(width * height),
            min_interval: Duration::from_secs_f64(1.0 / f64::from(max_fps.max(1))),
            last_shown: None,
        })
    }

    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(Key::Escape)
    }

    /// Display `frame` unless the previous one is too recent. `Ok(false)`
    /// once the window is gone.
    pub fn show(&mut self, frame: &Frame) -> EnvResult<bool> {
        if !self.is_open() {
            return Ok(false);
        }
        let now = Instant::now();
        if self.last_shown.is_some_and(|t| now - t < self.min_interval) {
            return Ok(true);
        }
        self.last_shown = Some(now);

        self.pixels.clear();
        self.pixels.extend(pack_pixels(&frame.rgb));
        self.window
            .update_with_buffer(&self.pixels, frame.width as usize, frame.height as usize)
            .map_err(|e| EnvError::Render(e.to_string()))?;
        Ok(true)
    }
}

/// RGB bytes as minifb's `0xAARRGGBB` words.
fn pack_pixels(rgb: &[u8]) -> impl Iterator<Item = u32> + '_ {
    rgb.chunks_exact(3)
        .map(|px| 0xFF00_0000 | u32::from(px[0]) << 16 | u32::from(px[1]) << 8 | u32::from(px[2]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_pixels() {
        let packed: Vec<u32> = pack_pixels(&[255, 0, 0, 0, 0, 255, 7]).collect();
        assert_eq!(packed, vec![0xFFFF_0000, 0xFF00_00FF]);
    }
}
