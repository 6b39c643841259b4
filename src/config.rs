//! Tunable thresholds and weights of the decision core.
//!
//! The defaults hold the canonical policy. Individual fields can be tweaked with the
//! `with_*` builder methods, or loaded from a (partial) JSON document.

use crate::pathfinding::SmartPathLimits;

use serde::{Deserialize, Serialize};

/// Configuration of the decision core.
///
/// # Example
///
/// ```
/// use ticket_to_ride_ai::config::BotConfig;
///
/// let config = BotConfig::default()
///     .with_max_non_claim_turns(3)
///     .with_keep_threshold(1.0);
///
/// assert_eq!(config.max_non_claim_turns, 3);
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct BotConfig {
    // Game phases.
    /// The game is in its early phase for this many of our turns.
    pub early_max_turns: u32,
    /// The game is in its early phase while we have more wagons than this.
    pub early_min_wagons: u8,
    /// The game is in its late phase once we have fewer wagons than this.
    pub late_max_wagons: u8,
    /// The game is in its final phase once we have fewer wagons than this.
    pub final_max_wagons: u8,

    // Priority arbiter.
    /// In the early phase, draw cards while holding fewer cards than this.
    pub early_draw_hand_size: u8,
    /// Build the network once holding at least this many cards.
    pub large_hand_size: u8,
    /// Build the network once holding at least this many cards of a single color.
    pub color_glut: u8,
    /// Objectives worth at least this many points are worth focusing on from the middle phase.
    pub high_value_objective: u8,
    /// After this many consecutive turns without claiming a route, a claim is forced.
    pub max_non_claim_turns: u32,
    /// With every objective complete, keep drawing cards while holding fewer cards than this.
    pub all_complete_draw_hand_size: u8,
    /// With every objective complete, draw new objectives while we have at least this many wagons.
    pub redraw_objectives_min_wagons: u8,
    /// Maximum number of objective draws over a game, the initial one included.
    pub max_objective_draws: u32,
    /// Endgame override once we have at most this many wagons.
    pub endgame_wagons: u8,
    /// Endgame override once the opponent has at most this many wagons.
    pub endgame_opponent_wagons: u8,
    /// Number of times the arbiter may re-evaluate within a turn before the emergency fallback.
    pub max_reevaluations: usize,

    // Paths.
    /// A network-biased path may be at most this many times longer than the shortest path.
    pub max_detour_ratio: f64,
    /// A network-biased path requires this share of its segments to be owned already.
    pub min_owned_share: f64,

    // Route utility.
    /// Bonus per objective point when a route lies on the path of an incomplete objective.
    pub objective_path_weight: f64,
    /// Bonus when a route connects to a hub city.
    pub hub_bonus: f64,
    /// Routes are penalized once we have fewer wagons than this.
    pub scarcity_wagons: u8,
    /// Penalty per wagon of a route, once wagons are scarce.
    pub scarcity_penalty: f64,
    /// Bonus for denying a city the opponent is interested in.
    pub interest_bonus: f64,
    /// Interest from which a city is considered high-interest, between 0 and 1.
    pub high_interest: f64,
    /// Bonus for routes touching our network when building it.
    pub network_bonus: f64,
    /// Minimum utility of a blocking route.
    pub min_block_score: f64,

    // Objective keep score.
    /// Bonus for the share of an objective's path already owned.
    pub progress_weight: f64,
    /// Penalty when the natural path of an objective is cut by the opponent.
    pub blocked_segment_penalty: f64,
    /// Penalty for objectives that cannot be completed.
    pub unreachable_penalty: f64,
    /// Penalty per segment beyond `difficulty_free_segments`.
    pub difficulty_weight: f64,
    /// Number of segments an objective path can have without penalty.
    pub difficulty_free_segments: usize,
    /// Bonus for sharing a city with an objective already held.
    pub synergy_endpoint_bonus: f64,
    /// Bonus per route shared with the path of an objective already held.
    pub synergy_route_bonus: f64,
    /// Penalty per unit of opponent interest along an objective's path.
    pub objective_risk_weight: f64,
    /// Objectives beyond the mandatory ones are kept if they score at least this much.
    pub keep_threshold: f64,
    /// Extra objectives are only kept while their combined remaining length fits within
    /// this share of our wagons.
    pub objective_wagon_budget: f64,

    // Critical routes.
    /// Priority per objective point of a critical route.
    pub critical_priority: f64,
    /// Multiplier when a critical route is the last gap of its objective.
    pub single_gap_multiplier: f64,
    /// Divisor when we cannot pay for a critical route yet.
    pub insufficient_cards_divisor: f64,

    // Opponent model.
    /// The likely-objective matrix is ranked every this many observed opponent claims.
    pub opponent_refresh_interval: u32,
    /// A city visited this many times is a likely objective endpoint.
    pub likely_endpoint_visits: u32,
    /// Score added between two likely objective endpoints.
    pub endpoint_pair_weight: f64,
    /// Cities at least this far from a frontier city get projected interest.
    pub projection_min_distance: u32,
    /// Cities at most this far from a frontier city get projected interest.
    pub projection_max_distance: u32,
    /// Score added by a forward projection.
    pub projection_weight: f64,
    /// Score from which an inferred opponent objective is worth blocking.
    pub confident_objective_score: f64,
}

impl Default for BotConfig {
    fn default() -> Self {
        BotConfig {
            early_max_turns: 5,
            early_min_wagons: 35,
            late_max_wagons: 25,
            final_max_wagons: 12,

            early_draw_hand_size: 8,
            large_hand_size: 12,
            color_glut: 6,
            high_value_objective: 10,
            max_non_claim_turns: 4,
            all_complete_draw_hand_size: 10,
            redraw_objectives_min_wagons: 25,
            max_objective_draws: 3,
            endgame_wagons: 3,
            endgame_opponent_wagons: 2,
            max_reevaluations: 3,

            max_detour_ratio: 1.5,
            min_owned_share: 0.6,

            objective_path_weight: 0.5,
            hub_bonus: 3.0,
            scarcity_wagons: 15,
            scarcity_penalty: 1.0,
            interest_bonus: 5.0,
            high_interest: 0.5,
            network_bonus: 2.0,
            min_block_score: 4.0,

            progress_weight: 5.0,
            blocked_segment_penalty: 25.0,
            unreachable_penalty: 100.0,
            difficulty_weight: 0.5,
            difficulty_free_segments: 3,
            synergy_endpoint_bonus: 2.0,
            synergy_route_bonus: 1.0,
            objective_risk_weight: 2.0,
            keep_threshold: 0.5,
            objective_wagon_budget: 0.8,

            critical_priority: 10.0,
            single_gap_multiplier: 3.0,
            insufficient_cards_divisor: 4.0,

            opponent_refresh_interval: 3,
            likely_endpoint_visits: 2,
            endpoint_pair_weight: 2.0,
            projection_min_distance: 2,
            projection_max_distance: 8,
            projection_weight: 1.0,
            confident_objective_score: 4.0,
        }
    }
}

impl BotConfig {
    /// Parses a JSON document. Missing fields keep their default value.
    ///
    /// # Example
    ///
    /// ```
    /// use ticket_to_ride_ai::config::BotConfig;
    ///
    /// let config = BotConfig::from_json(r#"{"large_hand_size": 10}"#).unwrap();
    /// assert_eq!(config.large_hand_size, 10);
    /// assert_eq!(config.color_glut, BotConfig::default().color_glut);
    /// ```
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Limits of the network-biased path search.
    pub fn path_limits(&self) -> SmartPathLimits {
        SmartPathLimits {
            max_detour_ratio: self.max_detour_ratio,
            min_owned_share: self.min_owned_share,
        }
    }

    /// Sets the number of turns without a claim after which a claim is forced.
    pub fn with_max_non_claim_turns(mut self, turns: u32) -> Self {
        self.max_non_claim_turns = turns;
        self
    }

    /// Sets the score from which optional objectives are kept.
    pub fn with_keep_threshold(mut self, threshold: f64) -> Self {
        self.keep_threshold = threshold;
        self
    }

    /// Sets how often the opponent model ranks its likely objectives.
    pub fn with_opponent_refresh_interval(mut self, interval: u32) -> Self {
        self.opponent_refresh_interval = interval.max(1);
        self
    }

    /// Sets the limits of the network-biased path search.
    pub fn with_path_limits(mut self, limits: SmartPathLimits) -> Self {
        self.max_detour_ratio = limits.max_detour_ratio;
        self.min_owned_share = limits.min_owned_share;
        self
    }

    /// Sets the maximum number of objective draws over a game.
    pub fn with_max_objective_draws(mut self, draws: u32) -> Self {
        self.max_objective_draws = draws;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = BotConfig::default();

        assert_eq!(config.early_max_turns, 5);
        assert_eq!(config.early_min_wagons, 35);
        assert_eq!(config.late_max_wagons, 25);
        assert_eq!(config.final_max_wagons, 12);
        assert_eq!(config.max_non_claim_turns, 4);
        assert!((config.min_owned_share - 0.6).abs() < 1e-9);
    }

    #[test]
    fn builder_methods() {
        let config = BotConfig::default()
            .with_max_non_claim_turns(2)
            .with_keep_threshold(3.5)
            .with_opponent_refresh_interval(0)
            .with_max_objective_draws(1)
            .with_path_limits(SmartPathLimits {
                max_detour_ratio: 2.0,
                min_owned_share: 0.75,
            });

        assert_eq!(config.max_non_claim_turns, 2);
        assert_eq!(config.keep_threshold, 3.5);
        assert_eq!(config.opponent_refresh_interval, 1);
        assert_eq!(config.max_objective_draws, 1);
        assert_eq!(
            config.path_limits(),
            SmartPathLimits {
                max_detour_ratio: 2.0,
                min_owned_share: 0.75,
            }
        );
    }

    #[test]
    fn partial_json() -> serde_json::Result<()> {
        let config = BotConfig::from_json(r#"{"color_glut": 5, "hub_bonus": 1.5}"#)?;

        assert_eq!(config.color_glut, 5);
        assert_eq!(config.hub_bonus, 1.5);
        assert_eq!(config.large_hand_size, BotConfig::default().large_hand_size);
        Ok(())
    }

    #[test]
    fn json_round_trip() -> serde_json::Result<()> {
        let config = BotConfig::default().with_max_non_claim_turns(6);
        let json = serde_json::to_string(&config)?;

        assert_eq!(BotConfig::from_json(&json)?, config);
        Ok(())
    }

    #[test]
    fn invalid_json() {
        assert!(BotConfig::from_json(r#"{"color_glut": "many"}"#).is_err());
    }
}
