use std::time::Instant;

/// Snapshot of a hit, handed to callbacks on every announced transition.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HitEvent {
    /// Highest smoothed confidence seen during the hit.
    pub peak_confidence: f32,
    /// Smoothed confidence on the frame of the transition.
    pub smoothed_confidence: f32,
    /// Frames the threshold has been met, up to the transition.
    pub duration_frames: u32,
    /// Frame index (since the last reset) at which the threshold was first met.
    pub start_frame: u64,
    /// Wall-clock time the threshold was first met.
    pub timestamp: Option<Instant>,
    /// True for a hit start, false for a hit end.
    pub is_active: bool,
}
