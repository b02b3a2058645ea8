/// User-facing toggles the engine observes. Unit mode lives on the
/// session since changing it alters the accumulation algorithm.
#[derive(Debug, Clone, Copy)]
pub struct Toggles {
    /// Haptic cues on GPS acquisition and marker crossings.
    pub haptics: bool,
    /// High precision requests best accuracy with a 1 m distance
    /// filter from the provider; low asks for nearest-ten-meters with
    /// a 10 m filter.
    pub precise: bool,
}

impl Default for Toggles {
    fn default() -> Self {
        Self {
            haptics: true,
            precise: true,
        }
    }
}
