use std::time::Duration;

use crate::story::SceneId;

/// Settings for one play-through.
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Entry point override. `None` uses the story's own start scene.
    pub start: Option<SceneId>,
    /// Seed for reproducible rolls.
    pub seed: Option<u64>,
    /// Pause while the die "rolls" before the result is shown.
    pub roll_delay: Duration,
    /// Pause after the result before the next scene appears.
    pub reveal_delay: Duration,
    pub show_images: bool,
}

impl PlayerConfig {
    /// No pauses between a roll and its result.
    pub fn fast(mut self) -> Self {
        self.roll_delay = Duration::ZERO;
        self.reveal_delay = Duration::ZERO;
        self
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            start: None,
            seed: None,
            roll_delay: Duration::from_millis(600),
            reveal_delay: Duration::from_millis(1500),
            show_images: true,
        }
    }
}
