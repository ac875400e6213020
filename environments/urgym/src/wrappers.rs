//! Environment wrappers.
//!
//! Each wrapper owns an inner environment and forwards the `Env` contract,
//! adding one concern: episode time limits, episode statistics, frame
//! production, or video recording.

#[cfg(feature = "render-gif")]
use std::path::PathBuf;

use crate::env::{Env, EpisodeStats, Frame, RenderMode, Scene, Step};
use crate::error::EnvResult;
use crate::space::BoxSpace;

macro_rules! forward_env {
    () => {
        fn id(&self) -> &str {
            self.inner.id()
        }

        fn observation_space(&self) -> BoxSpace {
            self.inner.observation_space()
        }

        fn action_space(&self) -> BoxSpace {
            self.inner.action_space()
        }

        fn scene(&self) -> Scene {
            self.inner.scene()
        }
    };
}

// ============================================================================
// TimeLimit
// ============================================================================

/// Truncates episodes after `max_episode_steps` steps.
pub struct TimeLimit<E> {
    inner: E,
    max_episode_steps: usize,
    elapsed: usize,
}

impl<E: Env> TimeLimit<E> {
    pub fn new(inner: E, max_episode_steps: usize) -> Self {
        Self {
            inner,
            max_episode_steps,
            elapsed: 0,
        }
    }

    pub fn max_episode_steps(&self) -> usize {
        self.max_episode_steps
    }
}

impl<E: Env> Env for TimeLimit<E> {
    forward_env!();

    fn reset(&mut self, seed: Option<u64>) -> Vec<f32> {
        self.elapsed = 0;
        self.inner.reset(seed)
    }

    fn step(&mut self, action: &[f32]) -> EnvResult<Step> {
        let mut step = self.inner.step(action)?;
        self.elapsed += 1;
        if self.elapsed >= self.max_episode_steps && !step.terminated {
            step.truncated = true;
        }
        Ok(step)
    }

    fn render(&mut self) -> EnvResult<Option<Frame>> {
        self.inner.render()
    }

    fn render_mode(&self) -> RenderMode {
        self.inner.render_mode()
    }

    fn close(&mut self) {
        self.inner.close()
    }
}

// ============================================================================
// Monitor
// ============================================================================

/// Tracks episode return and length, attaching them to the final step's info.
pub struct Monitor<E> {
    inner: E,
    episode_reward: f32,
    episode_length: usize,
    completed: Vec<EpisodeStats>,
}

impl<E: Env> Monitor<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            episode_reward: 0.0,
            episode_length: 0,
            completed: Vec::new(),
        }
    }

    /// Statistics of every finished episode, oldest first.
    pub fn episodes(&self) -> &[EpisodeStats] {
        &self.completed
    }
}

impl<E: Env> Env for Monitor<E> {
    forward_env!();

    fn reset(&mut self, seed: Option<u64>) -> Vec<f32> {
        self.episode_reward = 0.0;
        self.episode_length = 0;
        self.inner.reset(seed)
    }

    fn step(&mut self, action: &[f32]) -> EnvResult<Step> {
        let mut step = self.inner.step(action)?;
        self.episode_reward += step.reward;
        self.episode_length += 1;
        if step.done() {
            let stats = EpisodeStats {
                reward: self.episode_reward,
                length: self.episode_length,
            };
            self.completed.push(stats);
            step.info.episode = Some(stats);
        }
        Ok(step)
    }

    fn render(&mut self) -> EnvResult<Option<Frame>> {
        self.inner.render()
    }

    fn render_mode(&self) -> RenderMode {
        self.inner.render_mode()
    }

    fn close(&mut self) {
        self.inner.close()
    }
}

// ============================================================================
// Rendered
// ============================================================================

/// Adds frame production to an environment according to its render mode.
///
/// `RgbArray` makes `render()` return frames; `Human` additionally pushes a
/// frame to a desktop window after every reset and step (requires the
/// `render-realtime` feature; without it the mode degrades to `RgbArray`).
pub struct Rendered<E> {
    inner: E,
    mode: RenderMode,
    #[cfg(feature = "render-realtime")]
    window: Option<crate::render::RealtimeWindow>,
}

impl<E: Env> Rendered<E> {
    pub fn new(inner: E, mode: RenderMode) -> Self {
        #[cfg(feature = "render-realtime")]
        let window = if mode == RenderMode::Human {
            match crate::render::RealtimeWindow::new(inner.id(), 320, 320, 30) {
                Ok(window) => Some(window),
                Err(e) => {
                    log::warn!("Human rendering disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };

        #[cfg(not(feature = "render-realtime"))]
        if mode == RenderMode::Human {
            log::warn!(
                "Human rendering for {} needs the render-realtime feature; frames are produced but not shown",
                inner.id()
            );
        }

        Self {
            inner,
            mode,
            #[cfg(feature = "render-realtime")]
            window,
        }
    }

    fn draw(&self) -> EnvResult<Frame> {
        #[cfg(feature = "render")]
        {
            crate::render::rasterize(&self.inner.scene())
        }
        #[cfg(not(feature = "render"))]
        {
            Err(crate::EnvError::RenderUnavailable(
                "built without the render feature".to_string(),
            ))
        }
    }

    #[cfg(feature = "render-realtime")]
    fn show(&mut self) {
        if self.window.is_none() {
            return;
        }
        match self.draw() {
            Ok(frame) => {
                if let Some(window) = self.window.as_mut() {
                    match window.show(&frame) {
                        Ok(true) => {}
                        Ok(false) => self.window = None,
                        Err(e) => log::warn!("Failed to update window: {}", e),
                    }
                }
            }
            Err(e) => log::warn!("Failed to draw frame: {}", e),
        }
    }

    #[cfg(not(feature = "render-realtime"))]
    fn show(&mut self) {}
}

impl<E: Env> Env for Rendered<E> {
    forward_env!();

    fn reset(&mut self, seed: Option<u64>) -> Vec<f32> {
        let obs = self.inner.reset(seed);
        self.show();
        obs
    }

    fn step(&mut self, action: &[f32]) -> EnvResult<Step> {
        let step = self.inner.step(action)?;
        self.show();
        Ok(step)
    }

    fn render(&mut self) -> EnvResult<Option<Frame>> {
        match self.mode {
            RenderMode::None => Ok(None),
            RenderMode::RgbArray | RenderMode::Human => self.draw().map(Some),
        }
    }

    fn render_mode(&self) -> RenderMode {
        self.mode
    }

    fn close(&mut self) {
        #[cfg(feature = "render-realtime")]
        {
            self.window = None;
        }
        self.inner.close()
    }
}

// ============================================================================
// RecordVideo
// ============================================================================

/// Default episode trigger: perfect cubes below 1000, then every 1000th episode.
pub fn capped_cubic_video_schedule(episode: usize) -> bool {
    if episode < 1000 {
        let root = (episode as f64).cbrt().round() as usize;
        root * root * root == episode
    } else {
        episode % 1000 == 0
    }
}

/// Records selected episodes to `<dir>/<prefix>-episode-<n>.gif`.
///
/// The inner environment must produce frames (`RgbArray` or `Human` mode).
#[cfg(feature = "render-gif")]
pub struct RecordVideo<E> {
    inner: E,
    dir: PathBuf,
    prefix: String,
    trigger: fn(usize) -> bool,
    episode: usize,
    started: bool,
    recording: bool,
    recorder: Option<crate::render::GifRecorder>,
    saved: Vec<PathBuf>,
}

#[cfg(feature = "render-gif")]
impl<E: Env> RecordVideo<E> {
    pub fn new(inner: E, dir: impl Into<PathBuf>, prefix: impl Into<String>) -> EnvResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        if inner.render_mode() == RenderMode::None {
            log::warn!("RecordVideo wraps {} without a render mode; no frames will be captured", inner.id());
        }
        Ok(Self {
            inner,
            dir,
            prefix: prefix.into(),
            trigger: capped_cubic_video_schedule,
            episode: 0,
            started: false,
            recording: false,
            recorder: None,
            saved: Vec::new(),
        })
    }

    /// Replace the episode trigger.
    pub fn with_trigger(mut self, trigger: fn(usize) -> bool) -> Self {
        self.trigger = trigger;
        self
    }

    /// Paths of the videos written so far.
    pub fn saved(&self) -> &[PathBuf] {
        &self.saved
    }

    fn capture(&mut self) -> EnvResult<()> {
        if !self.recording {
            return Ok(());
        }
        if let Some(frame) = self.inner.render()? {
            let recorder = self.recorder.get_or_insert_with(|| {
                crate::render::GifRecorder::new(frame.width as u16, frame.height as u16, 20)
            });
            recorder.add_frame(&frame)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> EnvResult<()> {
        self.recording = false;
        if let Some(recorder) = self.recorder.take() {
            if recorder.frame_count() > 0 {
                let path = self
                    .dir
                    .join(format!("{}-episode-{}.gif", self.prefix, self.episode));
                recorder.save(&path)?;
                log::info!("Saved video {}", path.display());
                self.saved.push(path);
            }
        }
        Ok(())
    }
}

#[cfg(feature = "render-gif")]
impl<E: Env> Env for RecordVideo<E> {
    forward_env!();

    fn reset(&mut self, seed: Option<u64>) -> Vec<f32> {
        if let Err(e) = self.flush() {
            log::warn!("Failed to save video: {}", e);
        }
        if self.started {
            self.episode += 1;
        }
        self.started = true;

        let obs = self.inner.reset(seed);
        self.recording = (self.trigger)(self.episode);
        if let Err(e) = self.capture() {
            log::warn!("Failed to capture frame: {}", e);
        }
        obs
    }

    fn step(&mut self, action: &[f32]) -> EnvResult<Step> {
        let step = self.inner.step(action)?;
        self.capture()?;
        Ok(step)
    }

    fn render(&mut self) -> EnvResult<Option<Frame>> {
        self.inner.render()
    }

    fn render_mode(&self) -> RenderMode {
        self.inner.render_mode()
    }

    fn close(&mut self) {
        if let Err(e) = self.flush() {
            log::warn!("Failed to save video: {}", e);
        }
        self.inner.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envs::pendulum::Pendulum;

    #[test]
    fn test_time_limit_truncates() {
        let mut env = TimeLimit::new(Pendulum::new(), 5);
        env.reset(Some(0));
        for i in 0..5 {
            let step = env.step(&[0.0]).unwrap();
            assert_eq!(step.truncated, i == 4);
        }
        env.reset(None);
        assert!(!env.step(&[0.0]).unwrap().truncated);
    }

    #[test]
    fn test_monitor_reports_episode() {
        let mut env = Monitor::new(TimeLimit::new(Pendulum::new(), 3));
        env.reset(Some(0));
        let mut total = 0.0;
        let mut last = None;
        for _ in 0..3 {
            let step = env.step(&[1.0]).unwrap();
            total += step.reward;
            last = Some(step);
        }
        let stats = last.unwrap().info.episode.unwrap();
        assert_eq!(stats.length, 3);
        assert!((stats.reward - total).abs() < 1e-5);
        assert_eq!(env.episodes().len(), 1);
    }

    #[test]
    fn test_capped_cubic_schedule() {
        let triggered: Vec<usize> = (0..130).filter(|&e| capped_cubic_video_schedule(e)).collect();
        assert_eq!(triggered, vec![0, 1, 8, 27, 64, 125]);
        assert!(capped_cubic_video_schedule(2000));
        assert!(!capped_cubic_video_schedule(2001));
    }

    #[cfg(feature = "render")]
    #[test]
    fn test_rendered_rgb_array() {
        let mut env = Rendered::new(Pendulum::new(), RenderMode::RgbArray);
        env.reset(Some(0));
        let frame = env.render().unwrap().unwrap();
        assert_eq!(frame.rgb.len(), (frame.width * frame.height * 3) as usize);

        let mut silent = Rendered::new(Pendulum::new(), RenderMode::None);
        silent.reset(Some(0));
        assert!(silent.render().unwrap().is_none());
    }

    #[cfg(feature = "render-gif")]
    #[test]
    fn test_record_video_writes_triggered_episodes() {
        let dir = tempfile::tempdir().unwrap();
        let env = TimeLimit::new(Rendered::new(Pendulum::new(), RenderMode::RgbArray), 3);
        let mut env = RecordVideo::new(env, dir.path(), "test").unwrap();

        for _ in 0..3 {
            env.reset(Some(0));
            loop {
                if env.step(&[0.5]).unwrap().done() {
                    break;
                }
            }
        }
        env.close();

        // Episodes 0 and 1 are perfect cubes; episode 2 is skipped.
        assert_eq!(env.saved().len(), 2);
        assert!(env.saved().iter().all(|p| p.exists()));
    }
}
