use std::time::{Duration, Instant};

/// Monotonic frame clock; the first sample yields a zero delta.
#[derive(Debug, Default, Clone)]
pub struct FrameClock {
    last: Option<Instant>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self { last: None }
    }

    /// Seconds since the previous call.
    pub fn delta(&mut self, now: Instant) -> f32 {
        let delta = match self.last {
            Some(last) => now.saturating_duration_since(last),
            None => Duration::ZERO,
        };
        self.last = Some(now);
        delta.as_secs_f32()
    }
}

/// Window title with frames per second, refreshed twice a second.
pub struct FpsCounter {
    last_frame_time: Option<Instant>,
    last_fps_time: Option<Instant>,
    frame_count: u32,
    frame_ms: f32,
    render_ms: f32,
    base_title: String,
}

impl FpsCounter {
    pub fn new(base_title: String) -> Self {
        Self {
            last_frame_time: None,
            last_fps_time: None,
            frame_count: 0,
            frame_ms: 0.0,
            render_ms: 0.0,
            base_title,
        }
    }

    pub fn set_render_ms(&mut self, render_ms: f32) {
        self.render_ms = render_ms;
    }

    /// Records a frame; returns a new title when it is time to refresh it.
    pub fn frame(&mut self, now: Instant) -> Option<String> {
        if let Some(last) = self.last_frame_time {
            self.frame_ms = now.saturating_duration_since(last).as_secs_f32() * 1000.0;
        }
        self.last_frame_time = Some(now);

        let since = *self.last_fps_time.get_or_insert(now);
        self.frame_count = self.frame_count.saturating_add(1);
        let elapsed = now.saturating_duration_since(since).as_secs_f32();
        if elapsed < 0.5 {
            return None;
        }
        let fps = self.frame_count as f32 / elapsed;
        self.frame_count = 0;
        self.last_fps_time = Some(now);
        Some(format!(
            "{} - {:.1} fps (cadence {:.2} ms, render {:.2} ms)",
            self.base_title, fps, self.frame_ms, self.render_ms
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::{FpsCounter, FrameClock};
    use std::time::{Duration, Instant};

    #[test]
    fn first_delta_is_zero() {
        let start = Instant::now();
        let mut clock = FrameClock::new();
        assert_eq!(clock.delta(start), 0.0);
        let delta = clock.delta(start + Duration::from_millis(250));
        assert!((delta - 0.25).abs() < 1e-6);
    }

    #[test]
    fn clock_never_goes_backwards() {
        let start = Instant::now();
        let mut clock = FrameClock::new();
        clock.delta(start + Duration::from_secs(1));
        assert_eq!(clock.delta(start), 0.0);
    }

    #[test]
    fn title_refreshes_every_half_second() {
        let start = Instant::now();
        let mut fps = FpsCounter::new("twinview".to_string());
        let mut titles = Vec::new();
        for frame in 0..=60u64 {
            if let Some(title) = fps.frame(start + Duration::from_millis(frame * 1000 / 60)) {
                titles.push(title);
            }
        }
        assert_eq!(titles.len(), 2);
        assert!(titles[0].starts_with("twinview - 6"));
    }
}
