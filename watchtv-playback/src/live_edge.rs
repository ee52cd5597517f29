//! Live-edge repositioning
//!
//! When a live stream resumes, playback jumps back to the live position.
//! Three sources are tried in order: the manifest engine's live hint, the end
//! of the buffered range, the end of a finite duration.

use serde::Serialize;

use crate::config::LiveEdgeConfig;
use crate::sink::SinkTiming;

/// Which data the target was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveEdgeTier {
    EngineHint,
    BufferedEnd,
    Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LiveEdgeTarget {
    pub tier: LiveEdgeTier,
    pub position: f64,
}

/// Pick the live-edge seek target, or `None` when nothing is known yet.
pub fn live_edge_target(
    engine_hint: Option<f64>,
    timing: &SinkTiming,
    config: &LiveEdgeConfig,
) -> Option<LiveEdgeTarget> {
    if let Some(hint) = engine_hint.filter(|h| h.is_finite() && *h > 0.0) {
        return Some(LiveEdgeTarget {
            tier: LiveEdgeTier::EngineHint,
            position: hint,
        });
    }

    if let Some(end) = timing.buffered_end.filter(|e| e.is_finite()) {
        return Some(LiveEdgeTarget {
            tier: LiveEdgeTier::BufferedEnd,
            position: (end - config.buffer_safety_offset).max(0.0),
        });
    }

    if let Some(duration) = timing.duration.filter(|d| d.is_finite() && *d > 0.0) {
        return Some(LiveEdgeTarget {
            tier: LiveEdgeTier::Duration,
            position: (duration - config.duration_safety_offset).max(0.0),
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing(buffered_end: Option<f64>, duration: Option<f64>) -> SinkTiming {
        SinkTiming {
            position: 3.0,
            duration,
            buffered_end,
        }
    }

    #[test]
    fn test_engine_hint_wins() {
        let config = LiveEdgeConfig::default();
        let target = live_edge_target(Some(120.0), &timing(Some(118.0), Some(200.0)), &config).unwrap();
        assert_eq!(target.tier, LiveEdgeTier::EngineHint);
        assert_eq!(target.position, 120.0);
    }

    #[test]
    fn test_zero_hint_falls_back_to_buffer() {
        let config = LiveEdgeConfig::default();
        let target = live_edge_target(Some(0.0), &timing(Some(50.0), Some(200.0)), &config).unwrap();
        assert_eq!(target.tier, LiveEdgeTier::BufferedEnd);
        assert_eq!(target.position, 49.0);
    }

    #[test]
    fn test_buffer_without_hint() {
        let config = LiveEdgeConfig::default();
        let target = live_edge_target(None, &timing(Some(0.4), None), &config).unwrap();
        assert_eq!(target.tier, LiveEdgeTier::BufferedEnd);
        assert_eq!(target.position, 0.0);
    }

    #[test]
    fn test_duration_last() {
        let config = LiveEdgeConfig::default();
        let target = live_edge_target(None, &timing(None, Some(90.0)), &config).unwrap();
        assert_eq!(target.tier, LiveEdgeTier::Duration);
        assert_eq!(target.position, 89.5);
    }

    #[test]
    fn test_nothing_known() {
        let config = LiveEdgeConfig::default();
        assert!(live_edge_target(None, &timing(None, None), &config).is_none());
        assert!(live_edge_target(Some(-1.0), &timing(None, Some(f64::INFINITY)), &config).is_none());
    }
}
