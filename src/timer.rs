//! Frame rate and performance measurement.

use std::{
    fmt, mem,
    sync::Mutex,
    time::{Duration, Instant},
};

use itertools::Itertools;

use crate::filter::{
    ema::{Ema, EmaState},
    Filter,
};

const EMA_ALPHA: f32 = 0.3;

/// Computes the instantaneous frame rate from consecutive frame timestamps.
///
/// This is what the demos display on screen: `1 / (now - previous)`, recomputed every frame with
/// no averaging. The first frame, and any frame whose timestamp does not advance past the previous
/// one, reports 0.
#[derive(Debug, Default)]
pub struct FrameRate {
    prev: Option<Instant>,
}

impl FrameRate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a frame at the current time and returns the resulting FPS.
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    /// Records a frame at `now` and returns the resulting FPS.
    pub fn tick_at(&mut self, now: Instant) -> f32 {
        let fps = match self.prev {
            Some(prev) if now > prev => 1.0 / (now - prev).as_secs_f32(),
            _ => 0.0,
        };
        self.prev = Some(now);
        fps
    }
}

/// A timer that measures and averages the time an operation takes.
///
/// Collected timings are averaged and reset when the timer is displayed using `{}`
/// ([`std::fmt::Display`]).
pub struct Timer {
    name: &'static str,
    ema: Ema,
    state: Mutex<State>,
}

struct State {
    ema_state: EmaState,
    /// The current average time in seconds.
    avg: f32,
    /// The number of measurements that contributed to `avg`.
    count: usize,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            ema: Ema::new(EMA_ALPHA),
            state: Mutex::new(State {
                ema_state: EmaState::default(),
                avg: 0.0,
                count: 0,
            }),
        }
    }

    /// Invokes a closure, measuring and recording the time it takes.
    pub fn time<T>(&self, timee: impl FnOnce() -> T) -> T {
        let _guard = self.start();
        timee()
    }

    /// Starts timing an operation. The time is recorded when the returned guard is dropped.
    pub fn start(&self) -> TimerGuard<'_> {
        TimerGuard {
            start: Instant::now(),
            timer: self,
        }
    }

    fn stop(&self, start: Instant) {
        let secs = start.elapsed().as_secs_f32();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let state = &mut *state;
        state.avg = self.ema.filter(&mut state.ema_state, secs);
        state.count += 1;
    }
}

/// Displays the average recorded time and resets it.
impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.ema_state = EmaState::default();

        let avg = mem::replace(&mut state.avg, 0.0);
        let len = mem::replace(&mut state.count, 0);
        let avg_ms = avg * 1000.0;

        write!(f, "{}: {len}x{avg_ms:.01}ms", self.name)
    }
}

/// Cloning a timer resets its collected timings.
impl Clone for Timer {
    fn clone(&self) -> Self {
        Self::new(self.name)
    }
}

/// Guard returned by [`Timer::start`].
pub struct TimerGuard<'a> {
    start: Instant,
    timer: &'a Timer,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.stop(self.start);
    }
}

/// Logs frames per second once per second, with optional extra data such as [`Timer`]s.
pub struct FpsCounter {
    name: String,
    frames: u32,
    start: Instant,
}

impl FpsCounter {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            frames: 0,
            start: Instant::now(),
        }
    }

    /// Advances the frame counter by 1 and logs FPS if one second has passed.
    pub fn tick(&mut self) {
        self.tick_with(std::iter::empty::<&Timer>());
    }

    /// Advances the frame counter by 1 and logs FPS and `extra` if one second has passed.
    pub fn tick_with<D: fmt::Display, I: IntoIterator<Item = D>>(&mut self, extra: I) {
        self.frames += 1;
        if self.start.elapsed() > Duration::from_secs(1) {
            let mut extra = extra.into_iter().peekable();
            if extra.peek().is_some() {
                log::debug!(
                    "{}: {} FPS ({})",
                    self.name,
                    self.frames,
                    extra.format(", ")
                );
            } else {
                log::debug!("{}: {} FPS", self.name, self.frames);
            }

            self.frames = 0;
            self.start = Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_has_no_rate() {
        let mut fps = FrameRate::new();
        assert_eq!(fps.tick_at(Instant::now()), 0.0);
    }

    #[test]
    fn rate_from_delta() {
        let start = Instant::now();
        let mut fps = FrameRate::new();
        fps.tick_at(start);
        let rate = fps.tick_at(start + Duration::from_millis(40));
        assert!((rate - 25.0).abs() < 0.01, "{rate}");
        let rate = fps.tick_at(start + Duration::from_millis(140));
        assert!((rate - 10.0).abs() < 0.01, "{rate}");
    }

    #[test]
    fn non_advancing_clock() {
        let start = Instant::now();
        let mut fps = FrameRate::new();
        fps.tick_at(start);
        assert_eq!(fps.tick_at(start), 0.0);
    }

    #[test]
    fn fps_counter_restarts_each_second() {
        let timer = Timer::new("decode");
        let mut fps = FpsCounter::new("demo");
        fps.tick_with([&timer]);
        assert_eq!(fps.frames, 1);

        fps.start -= Duration::from_secs(2);
        fps.tick_with([&timer]);
        assert_eq!(fps.frames, 0);
        assert!(fps.start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn timer_display_resets() {
        let timer = Timer::new("work");
        timer.time(|| {});
        timer.time(|| {});
        assert!(timer.to_string().starts_with("work: 2x"));
        assert_eq!(timer.to_string(), "work: 0x0.0ms");
    }
}
