//! Frame timing statistics and periodic reporting.

use web_time::{Duration, Instant};

/// Frame statistics gathered over one report interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// Frames per second averaged over the interval.
    pub fps: f32,
    /// Smoothed frame time in milliseconds.
    pub frame_ms: f32,
}

/// Frame pacing and periodic FPS reporting for the viewer loop.
pub struct FrameTiming {
    /// Minimum frame duration (zero = unlimited)
    min_frame_duration: Duration,
    last_frame: Instant,
    /// Exponential moving average of the frame time, in seconds
    smoothed_frame_time: f32,
    report_interval: Duration,
    last_report: Instant,
    frames_since_report: u32,
}

impl FrameTiming {
    /// Smoothing weight of the newest sample.
    const SMOOTHING: f32 = 0.05;

    /// A timer capped at `target_fps` (0 = unlimited) that reports every
    /// `report_interval`.
    pub fn new(target_fps: u32, report_interval: Duration) -> Self {
        let min_frame_duration = if target_fps > 0 {
            Duration::from_secs_f64(1.0 / f64::from(target_fps))
        } else {
            Duration::ZERO
        };
        let now = Instant::now();
        Self {
            min_frame_duration,
            last_frame: now,
            smoothed_frame_time: 1.0 / 60.0,
            report_interval,
            last_report: now,
            frames_since_report: 0,
        }
    }

    /// Whether enough time has passed since the last frame to render.
    pub fn should_render(&self) -> bool {
        self.last_frame.elapsed() >= self.min_frame_duration
    }

    /// Record a finished frame. Returns a report once per interval.
    pub fn end_frame(&mut self) -> Option<FrameReport> {
        let now = Instant::now();
        let frame_time = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.smoothed_frame_time = self.smoothed_frame_time
            * (1.0 - Self::SMOOTHING)
            + frame_time * Self::SMOOTHING;
        self.frames_since_report += 1;

        let since_report = now.duration_since(self.last_report);
        if since_report < self.report_interval {
            return None;
        }
        let seconds = since_report.as_secs_f32().max(f32::EPSILON);
        let report = FrameReport {
            fps: self.frames_since_report as f32 / seconds,
            frame_ms: self.smoothed_frame_time * 1000.0,
        };
        self.last_report = now;
        self.frames_since_report = 0;
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_timer_always_renders() {
        let timing = FrameTiming::new(0, Duration::from_secs(1));
        assert!(timing.should_render());
    }

    #[test]
    fn reports_once_per_interval() {
        let mut timing = FrameTiming::new(0, Duration::from_secs(3600));
        assert!(timing.end_frame().is_none());

        let mut timing = FrameTiming::new(0, Duration::ZERO);
        let report = timing.end_frame().unwrap();
        assert!(report.fps > 0.0);
        assert!(report.frame_ms > 0.0);
        assert_eq!(timing.frames_since_report, 0);
    }
}
