use std::time::Instant;

use anyhow::Result;
use coinop_common::app::App;
use coinop_common::color::Color;
use coinop_common::key::Key;

use crate::machine::InvadersMachine;
use crate::{SCREEN_HEIGHT, SCREEN_SCALE, SCREEN_WIDTH};

/// Frontend-facing wrapper around the Space Invaders machine.
///
/// Implements the shared `App` trait so the SDL2 host can drive the
/// emulator: one `update` call per presented frame, key events forwarded
/// to the input latches, and core faults propagated out to the driver.
pub struct InvadersApp {
    should_exit: bool,
    paused: bool,
    pub machine: InvadersMachine,
    stats: FrameStats,
}

impl Default for InvadersApp {
    fn default() -> Self {
        Self {
            should_exit: false,
            paused: false,
            machine: InvadersMachine::default(),
            stats: FrameStats::new(),
        }
    }
}

impl App for InvadersApp {
    fn init(&mut self) {
        log::info!("Space Invaders init");
    }

    fn update(&mut self, screen_state: &mut [u8]) -> Result<()> {
        if !self.paused {
            let cycles = self.machine.step_frame()?;
            self.stats.record(cycles);
        }

        render_video(self.machine.video_ram(), screen_state);

        if self.paused {
            overlay_pause_banner(screen_state);
        }

        Ok(())
    }

    fn handle_key_event(&mut self, key: Key, is_pressed: bool) {
        if is_pressed {
            match key {
                Key::Escape => {
                    self.should_exit = true;
                    return;
                }
                Key::P => {
                    self.paused = !self.paused;
                    return;
                }
                // Any other key resumes a paused game.
                _ if self.paused => {
                    self.paused = false;
                }
                _ => {}
            }
        }

        self.machine.handle_key(key, is_pressed);
    }

    fn should_exit(&self) -> bool {
        self.should_exit
    }

    fn exit(&mut self) {
        log::info!("Space Invaders exit");
    }

    fn width(&self) -> u32 {
        SCREEN_WIDTH as u32
    }

    fn height(&self) -> u32 {
        SCREEN_HEIGHT as u32
    }

    fn scale(&self) -> u32 {
        SCREEN_SCALE
    }

    fn title(&self) -> String {
        "Coin-Op Space Invaders".to_string()
    }
}

/// Per-second frame and cycle counters, reported through the log facade.
///
/// Useful for confirming the emulation holds 60 frames and ~2 million
/// cycles per second.
struct FrameStats {
    window_start: Instant,
    frames: u32,
    cycles: u64,
}

impl FrameStats {
    fn new() -> Self {
        Self {
            window_start: Instant::now(),
            frames: 0,
            cycles: 0,
        }
    }

    fn record(&mut self, cycles: u32) {
        self.frames += 1;
        self.cycles += u64::from(cycles);

        let elapsed = self.window_start.elapsed();
        if elapsed.as_secs() >= 1 {
            log::debug!(
                "{} frames, {} cycles in the last {:.2}s",
                self.frames,
                self.cycles,
                elapsed.as_secs_f64()
            );
            self.window_start = Instant::now();
            self.frames = 0;
            self.cycles = 0;
        }
    }
}

/// Rasterize the 1-bit column-major video RAM into an RGB24 buffer.
///
/// Each byte holds 8 vertical pixels of one column in the rotated arcade
/// orientation; the first byte of a column is the bottom of the screen.
/// The tinted bands approximate the cellophane overlay of the original
/// cabinet: red for the UFO strip, green for the player strip.
fn render_video(vram: &[u8], screen_state: &mut [u8]) {
    let width = SCREEN_WIDTH;
    let height = SCREEN_HEIGHT;

    debug_assert_eq!(vram.len(), 0x1c00);
    debug_assert_eq!(screen_state.len(), width * height * 3);

    let mut i = 0usize;
    for x in 0..width {
        for iy in (0..height).step_by(8) {
            let mut byte = vram[i];
            i += 1;
            for b in 0..8 {
                let pixel_on = (byte & 1) != 0;
                byte >>= 1;

                let screen_y = height - (iy + b) - 1;
                let idx = (screen_y * width + x) * 3;
                let color = if !pixel_on {
                    Color::BLACK
                } else if iy > 200 && iy < 220 {
                    Color::RED
                } else if iy < 80 {
                    Color::GREEN
                } else {
                    Color::WHITE
                };

                screen_state[idx] = color.r;
                screen_state[idx + 1] = color.g;
                screen_state[idx + 2] = color.b;
            }
        }
    }
}

/// Draw a striped band at the top of the screen so a paused game is
/// visually obvious.
fn overlay_pause_banner(screen_state: &mut [u8]) {
    let width = SCREEN_WIDTH;
    let height = SCREEN_HEIGHT;
    debug_assert_eq!(screen_state.len(), width * height * 3);

    let banner_height = 12usize.min(height);

    for y in 0..banner_height {
        for x in 0..width {
            let idx = (y * width + x) * 3;
            let color = if y % 2 == 0 {
                Color::WHITE
            } else {
                Color::BLACK
            };
            screen_state[idx] = color.r;
            screen_state[idx + 1] = color.g;
            screen_state[idx + 2] = color.b;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_lights_the_expected_pixel() {
        let mut vram = vec![0u8; 0x1c00];
        // Bit 0 of the first byte of column 0 is the bottom-left pixel.
        vram[0] = 0x01;

        let mut screen = vec![0u8; SCREEN_WIDTH * SCREEN_HEIGHT * 3];
        render_video(&vram, &mut screen);

        let idx = ((SCREEN_HEIGHT - 1) * SCREEN_WIDTH) * 3;
        assert_ne!(&screen[idx..idx + 3], &[0, 0, 0]);

        // Everything else in the bottom row stays black.
        let idx2 = ((SCREEN_HEIGHT - 1) * SCREEN_WIDTH + 1) * 3;
        assert_eq!(&screen[idx2..idx2 + 3], &[0, 0, 0]);
    }

    #[test]
    fn escape_requests_exit() {
        let mut app = InvadersApp::default();
        assert!(!app.should_exit());

        app.handle_key_event(Key::Escape, true);
        assert!(app.should_exit());
    }

    #[test]
    fn pause_toggles_and_any_key_resumes() {
        let mut app = InvadersApp::default();

        app.handle_key_event(Key::P, true);
        assert!(app.paused);

        app.handle_key_event(Key::Space, true);
        assert!(!app.paused);
    }
}
