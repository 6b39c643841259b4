use crate::config::BotConfig;

use serde::{Deserialize, Serialize};

/// Coarse progress of the game, from our point of view.
///
/// # JSON
/// Phases are serialized in snake_case.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// The first few turns, while we still have plenty of wagons.
    Early,
    /// The default phase.
    Middle,
    /// Wagons start running low.
    Late,
    /// The last turns of the game.
    Final,
}

impl GamePhase {
    /// Derives the phase from the number of turns we played and the wagons we have left.
    ///
    /// # Example
    /// ```
    /// use ticket_to_ride_ai::config::BotConfig;
    /// use ticket_to_ride_ai::game_phase::GamePhase;
    ///
    /// let config = BotConfig::default();
    /// assert_eq!(GamePhase::from_progress(2, 45, false, &config), GamePhase::Early);
    /// assert_eq!(GamePhase::from_progress(9, 30, false, &config), GamePhase::Middle);
    /// assert_eq!(GamePhase::from_progress(9, 30, true, &config), GamePhase::Final);
    /// ```
    pub fn from_progress(
        turns_played: u32,
        wagons_left: u8,
        last_turn: bool,
        config: &BotConfig,
    ) -> Self {
        if last_turn || wagons_left < config.final_max_wagons {
            GamePhase::Final
        } else if wagons_left < config.late_max_wagons {
            GamePhase::Late
        } else if turns_played < config.early_max_turns || wagons_left > config.early_min_wagons {
            GamePhase::Early
        } else {
            GamePhase::Middle
        }
    }
}
