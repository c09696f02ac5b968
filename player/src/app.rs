//! Window and event loop driving a [`SyncSession`]
//!
//! winit delivers both wake kinds: `RedrawRequested` stands in for the
//! display refresh and `ControlFlow::WaitUntil` for the timer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, error, info};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};

use framesync_core::{CpalHost, FrameSink, SyncSession, TickScheduler, Wake};

use crate::pattern::{HEIGHT, TestPattern, WIDTH};

const WINDOW_SCALE: u32 = 3;

/// Settings for one player run
pub struct PlayerConfig {
    pub session: SyncSession,
    /// Skip opening an audio device
    pub mute: bool,
}

/// Records what the pacer asked for until the event loop acts on it
#[derive(Default)]
struct LoopScheduler {
    deadline: Option<Instant>,
    redraw: bool,
}

impl TickScheduler for LoopScheduler {
    fn next_refresh(&mut self) {
        self.redraw = true;
    }

    fn after(&mut self, delay: Duration) {
        self.deadline = Some(Instant::now() + delay);
    }
}

/// Keeps the most recent frame and counts presentations
#[derive(Default)]
struct FrameStore {
    pixels: Vec<u8>,
    presented: u64,
}

impl FrameSink for FrameStore {
    fn present(&mut self, pixels: &[u8]) {
        self.pixels.clear();
        self.pixels.extend_from_slice(pixels);
        self.presented += 1;
    }
}

struct PlayerApp {
    session: SyncSession,
    host: Option<CpalHost>,
    emulator: TestPattern,
    frames: FrameStore,
    scheduler: LoopScheduler,
    window: Option<Arc<Window>>,
    last_title: u64,
}

impl PlayerApp {
    fn new(config: PlayerConfig) -> Self {
        let frequency = config.session.pacer().frequency();
        let sample_rate = config.session.audio().frequency();
        let channels = config.session.audio().settings().channels;
        Self {
            session: config.session,
            host: (!config.mute).then(CpalHost::new),
            emulator: TestPattern::new(sample_rate, frequency, channels),
            frames: FrameStore::default(),
            scheduler: LoopScheduler::default(),
            window: None,
            last_title: 0,
        }
    }

    fn wake(&mut self, wake: Wake) {
        let ticked = self.session.wake(
            wake,
            &mut self.scheduler,
            &mut self.emulator,
            &mut self.frames,
        );
        if ticked {
            self.update_title();
        }
        self.request_redraw();
    }

    fn request_redraw(&mut self) {
        if std::mem::take(&mut self.scheduler.redraw)
            && let Some(window) = &self.window
        {
            window.request_redraw();
        }
    }

    fn fire_due_timer(&mut self) {
        if let Some(deadline) = self.scheduler.deadline
            && Instant::now() >= deadline
        {
            self.scheduler.deadline = None;
            self.wake(Wake::Timer);
        }
    }

    /// Once a second of emulated frames, show progress in the title
    fn update_title(&mut self) {
        let frequency = u64::from(self.session.pacer().frequency());
        if self.frames.presented - self.last_title < frequency {
            return;
        }
        self.last_title = self.frames.presented;

        let Some(window) = &self.window else {
            return;
        };
        let stats = self.session.audio().stats();
        window.set_title(&format!(
            "Framesync - frame {} - {} samples buffered - {} underruns",
            self.emulator.frame(),
            self.session.audio().buffered(),
            stats.underruns
        ));
    }
}

impl ApplicationHandler for PlayerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = Window::default_attributes()
            .with_title("Framesync")
            .with_inner_size(LogicalSize::new(
                WIDTH as u32 * WINDOW_SCALE,
                HEIGHT as u32 * WINDOW_SCALE,
            ));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };
        self.window = Some(window);

        if let Some(host) = self.host.as_mut() {
            self.session.attach_audio(host);
        }
        self.emulator
            .set_sample_rate(self.session.audio().frequency());
        self.session.start(&mut self.scheduler);
        self.request_redraw();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => self.wake(Wake::Refresh),
            WindowEvent::Occluded(hidden) => {
                self.session.set_hidden(hidden);
                if !hidden && let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key,
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                if logical_key == Key::Named(NamedKey::Escape) {
                    event_loop.exit();
                    return;
                }
                self.session.audio_mut().ensure_running();
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                ..
            } => self.session.audio_mut().ensure_running(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        self.fire_due_timer();

        match self.scheduler.deadline {
            Some(deadline) => event_loop.set_control_flow(ControlFlow::WaitUntil(deadline)),
            None => event_loop.set_control_flow(ControlFlow::Wait),
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        debug!(
            "Exiting after {} frames ({} byte frame buffer), audio {:?}",
            self.frames.presented,
            self.frames.pixels.len(),
            self.session.audio().stats()
        );
    }
}

/// Open the window and run until it closes
pub fn run(config: PlayerConfig) -> Result<()> {
    let event_loop = EventLoop::new()?;
    let mut app = PlayerApp::new(config);
    event_loop.run_app(&mut app)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_records_requests() {
        let mut scheduler = LoopScheduler::default();
        let before = Instant::now();
        scheduler.after(Duration::from_millis(16));
        scheduler.next_refresh();

        assert!(scheduler.redraw);
        let deadline = scheduler.deadline.unwrap();
        assert!(deadline >= before + Duration::from_millis(16));
    }

    #[test]
    fn test_frame_store_keeps_latest_frame() {
        let mut frames = FrameStore::default();
        frames.present(&[1, 2, 3]);
        frames.present(&[4, 5]);
        assert_eq!(frames.pixels, vec![4, 5]);
        assert_eq!(frames.presented, 2);
    }
}
