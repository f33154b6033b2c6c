//! Debug information shared between the machine and external tooling.

use std::collections::BTreeSet;

/// Where one frame's wall-clock time went, in clock-source counts and
/// milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameTimings {
    pub cpu_counts: u64,
    pub render_counts: u64,
    /// Frame time not spent in the CPU or rendering.
    pub utility_counts: u64,
    pub frame_counts: u64,
    pub cpu_ms: f64,
    pub render_ms: f64,
    pub utility_ms: f64,
    pub frame_ms: f64,
}

impl FrameTimings {
    /// Derive the utility share and millisecond values from raw counts.
    #[must_use]
    pub fn from_counts(cpu: u64, render: u64, frame: u64, frequency: u64) -> Self {
        let utility = frame.saturating_sub(cpu + render);
        let to_ms = |counts: u64| {
            if frequency == 0 {
                0.0
            } else {
                counts as f64 / frequency as f64 * 1000.0
            }
        };
        Self {
            cpu_counts: cpu,
            render_counts: render,
            utility_counts: utility,
            frame_counts: frame,
            cpu_ms: to_ms(cpu),
            render_ms: to_ms(render),
            utility_ms: to_ms(utility),
            frame_ms: to_ms(frame),
        }
    }
}

/// Breakpoints and timing telemetry for a debugging front end.
///
/// An inactive provider never causes a debug stop.
pub trait DebugInfoProvider {
    fn is_active(&self) -> bool;

    fn breakpoints(&self) -> &BTreeSet<u16>;

    fn breakpoints_mut(&mut self) -> &mut BTreeSet<u16>;

    fn on_frame_timings(&mut self, timings: &FrameTimings) {
        let _ = timings;
    }
}

/// Default provider: no breakpoints, no stops.
#[derive(Debug, Default)]
pub struct NoopDebugInfoProvider {
    breakpoints: BTreeSet<u16>,
}

impl DebugInfoProvider for NoopDebugInfoProvider {
    fn is_active(&self) -> bool {
        false
    }

    fn breakpoints(&self) -> &BTreeSet<u16> {
        &self.breakpoints
    }

    fn breakpoints_mut(&mut self) -> &mut BTreeSet<u16> {
        &mut self.breakpoints
    }
}

/// Active provider holding user breakpoints and the last frame's timings.
#[derive(Debug, Default)]
pub struct BreakpointDebugInfo {
    breakpoints: BTreeSet<u16>,
    last_timings: Option<FrameTimings>,
}

impl BreakpointDebugInfo {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_breakpoints(addresses: impl IntoIterator<Item = u16>) -> Self {
        Self {
            breakpoints: addresses.into_iter().collect(),
            last_timings: None,
        }
    }

    #[must_use]
    pub fn last_timings(&self) -> Option<&FrameTimings> {
        self.last_timings.as_ref()
    }
}

impl DebugInfoProvider for BreakpointDebugInfo {
    fn is_active(&self) -> bool {
        true
    }

    fn breakpoints(&self) -> &BTreeSet<u16> {
        &self.breakpoints
    }

    fn breakpoints_mut(&mut self) -> &mut BTreeSet<u16> {
        &mut self.breakpoints
    }

    fn on_frame_timings(&mut self, timings: &FrameTimings) {
        self.last_timings = Some(*timings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timings_split_frame() {
        let t = FrameTimings::from_counts(6_000, 2_000, 20_000, 1_000_000);
        assert_eq!(t.utility_counts, 12_000);
        assert!((t.cpu_ms - 6.0).abs() < 1e-9);
        assert!((t.render_ms - 2.0).abs() < 1e-9);
        assert!((t.utility_ms - 12.0).abs() < 1e-9);
        assert!((t.frame_ms - 20.0).abs() < 1e-9);
    }

    #[test]
    fn utility_never_negative() {
        let t = FrameTimings::from_counts(10, 10, 5, 1_000);
        assert_eq!(t.utility_counts, 0);
    }

    #[test]
    fn breakpoint_provider_records_timings() {
        let mut info = BreakpointDebugInfo::with_breakpoints([0x8000, 0x8003]);
        assert!(info.is_active());
        assert!(info.breakpoints().contains(&0x8003));
        info.breakpoints_mut().remove(&0x8003);
        assert_eq!(info.breakpoints().len(), 1);

        assert!(info.last_timings().is_none());
        info.on_frame_timings(&FrameTimings::default());
        assert!(info.last_timings().is_some());
    }

    #[test]
    fn noop_provider_is_inactive() {
        let info = NoopDebugInfoProvider::default();
        assert!(!info.is_active());
        assert!(info.breakpoints().is_empty());
    }
}
