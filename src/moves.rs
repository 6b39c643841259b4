//! Messages exchanged with the transport.

use crate::card::{Objective, TrainColor, NUM_DRAWN_OBJECTIVES, NUM_OPEN_TRAIN_CARDS};
use crate::city::City;

use serde::{Deserialize, Serialize};

/// An action we request.
///
/// # JSON
/// Variants are serialized in snake_case, externally tagged.
/// ```
/// use ticket_to_ride_ai::card::TrainColor;
/// use ticket_to_ride_ai::moves::MoveData;
///
/// let claim = MoveData::ClaimRoute { from: 0, to: 1, color: TrainColor::Red, wild_cards: 2 };
/// assert_eq!(
///     serde_json::to_string(&claim).unwrap(),
///     r#"{"claim_route":{"from":0,"to":1,"color":"red","wild_cards":2}}"#
/// );
/// ```
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveData {
    /// Claims the route between two cities, paying with `color` cards and `wild_cards` wild cards.
    ClaimRoute {
        from: City,
        to: City,
        color: TrainColor,
        wild_cards: u8,
    },
    DrawVisibleCard(TrainColor),
    DrawBlindCard,
    DrawObjectives,
    /// Which of the offered objectives to keep.
    ChooseObjectives([bool; NUM_DRAWN_OBJECTIVES]),
}

impl MoveData {
    #[inline]
    pub fn is_claim(&self) -> bool {
        matches!(self, MoveData::ClaimRoute { .. })
    }
}

/// An action taken by the opponent.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpponentMoveData {
    ClaimRoute {
        from: City,
        to: City,
        color: TrainColor,
    },
    DrawVisibleCard(TrainColor),
    DrawBlindCard,
    DrawObjectives,
    ChooseObjectives([bool; NUM_DRAWN_OBJECTIVES]),
}

/// Outcome of one of our actions, as reported by the server.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct MoveResult {
    /// The card we drew, if any.
    pub card: Option<TrainColor>,
    /// Whether we may draw a second card.
    pub replay: bool,
    /// The objectives offered after an objective draw.
    pub objectives: Vec<Objective>,
    /// Set when the game is over.
    pub message: Option<String>,
}

/// The face-up cards, refreshed each turn. An empty slot is `None`.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct BoardState {
    pub visible_cards: [Option<TrainColor>; NUM_OPEN_TRAIN_CARDS],
}
