//! Chooses the strategic priority of a turn.

use crate::card::{Payment, TrainColor};
use crate::config::BotConfig;
use crate::critical::{CriticalRoute, ObjectiveProgress};
use crate::game_phase::GamePhase;
use crate::game_state::GameState;
use crate::map::RouteId;
use crate::opponent::OpponentModel;

use log::info;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// What a turn is trying to achieve.
///
/// # JSON
/// Priorities are serialized in snake_case.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    CompleteObjectives,
    BlockOpponent,
    BuildNetwork,
    DrawCards,
    /// Not a strategy of its own: requests new objectives.
    DrawObjectives,
}

/// The rule which produced a plan.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Rule {
    /// We hold no objective yet.
    MandatoryObjectives,
    /// Wagons run low: claim whatever is claimable, last gaps first.
    Endgame,
    /// A critical route can be claimed right now.
    ReadyCriticalRoute,
    /// Too many turns went by without a claim.
    Liveness,
    /// Early in the game, with few cards.
    EarlyDraw,
    /// Many cards in hand, or many cards of one color.
    LargeHand,
    /// A valuable objective is incomplete.
    HighValueObjective,
    /// Every objective is complete.
    AllObjectivesComplete,
    /// Nothing else applied.
    PhaseDefault,
}

/// The chosen priority of a turn.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Plan {
    pub priority: Priority,
    /// Route to claim if possible.
    pub preferred_route: Option<RouteId>,
    pub rule: Rule,
}

impl Plan {
    fn new(priority: Priority, rule: Rule) -> Self {
        Self {
            priority,
            preferred_route: None,
            rule,
        }
    }

    fn with_route(priority: Priority, route_id: RouteId, rule: Rule) -> Self {
        Self {
            priority,
            preferred_route: Some(route_id),
            rule,
        }
    }
}

/// Everything a turn's decision reads. Nothing is mutated while deciding.
pub struct TurnContext<'a> {
    pub state: &'a GameState,
    pub opponent: &'a OpponentModel,
    pub config: &'a BotConfig,
    pub progress: &'a [ObjectiveProgress],
    /// Sorted by priority, without the excluded routes.
    pub critical_routes: &'a [CriticalRoute],
    /// Routes which must not be claimed this turn.
    pub excluded_routes: &'a [RouteId],
    /// Set once the server refused a blind draw this turn.
    pub blind_draw_refused: bool,
    /// Face-up colors the server refused to hand over this turn.
    pub refused_visible_cards: &'a [TrainColor],
}

impl<'a> TurnContext<'a> {
    /// Routes we can claim right now, excluded ones aside.
    pub fn claimable_routes(&self) -> Vec<(RouteId, Payment)> {
        let mut claimable_routes = self.state.claimable_routes();
        claimable_routes.retain(|(route_id, _)| !self.excluded_routes.contains(route_id));
        claimable_routes
    }

    /// Whether a face-up card of that color can be asked for.
    pub fn can_take_visible(&self, color: TrainColor) -> bool {
        self.state.is_card_visible(color) && !self.refused_visible_cards.contains(&color)
    }

    /// Whether some incomplete objective can still be completed.
    pub fn has_reachable_objective(&self) -> bool {
        self.progress
            .iter()
            .any(|progress| !progress.completed && progress.path.is_some())
    }

    fn ready_critical_route(&self) -> Option<&CriticalRoute> {
        self.critical_routes
            .iter()
            .find(|critical_route| critical_route.ready)
    }
}

/// Applies the rules in order, the first match wins. Priorities in `disallowed` were already
/// tried this turn without success, and are skipped.
///
/// Returns `None` if every applicable priority is disallowed.
pub fn plan(ctx: &TurnContext, disallowed: &[Priority]) -> Option<Plan> {
    let plan = evaluate_rules(ctx, disallowed);
    if let Some(plan) = &plan {
        info!(
            "Turn {}: {:?} ({:?}), preferred route {:?}.",
            ctx.state.turns_played() + 1,
            plan.priority,
            plan.rule,
            plan.preferred_route
        );
    }

    plan
}

fn evaluate_rules(ctx: &TurnContext, disallowed: &[Priority]) -> Option<Plan> {
    use Priority::*;

    let state = ctx.state;
    let config = ctx.config;
    let hand = state.hand();
    let phase = state.phase(config);
    let allowed = |priority: Priority| !disallowed.contains(&priority);
    let can_claim = !ctx.claimable_routes().is_empty();

    if state.objectives().is_empty() && allowed(DrawObjectives) {
        return Some(Plan::new(DrawObjectives, Rule::MandatoryObjectives));
    }

    let endgame = state.is_last_turn()
        || state.wagons_left() <= config.endgame_wagons
        || state.opponent_wagons_left() <= config.endgame_opponent_wagons;
    if endgame {
        let last_gap = ctx
            .critical_routes
            .iter()
            .find(|critical_route| critical_route.ready && critical_route.single_gap);

        if let (Some(last_gap), true) = (last_gap, allowed(CompleteObjectives)) {
            return Some(Plan::with_route(
                CompleteObjectives,
                last_gap.route_id,
                Rule::Endgame,
            ));
        }
        if let (Some(ready), true) = (ctx.ready_critical_route(), allowed(CompleteObjectives)) {
            return Some(Plan::with_route(
                CompleteObjectives,
                ready.route_id,
                Rule::Endgame,
            ));
        }
        if can_claim && allowed(BuildNetwork) {
            return Some(Plan::new(BuildNetwork, Rule::Endgame));
        }
    }

    if let (Some(ready), true) = (ctx.ready_critical_route(), allowed(CompleteObjectives)) {
        return Some(Plan::with_route(
            CompleteObjectives,
            ready.route_id,
            Rule::ReadyCriticalRoute,
        ));
    }

    // Evaluated before the card-related rules, so that we never draw forever.
    if state.non_claim_turns() >= config.max_non_claim_turns && can_claim && allowed(BuildNetwork) {
        return Some(Plan::new(BuildNetwork, Rule::Liveness));
    }

    if phase == GamePhase::Early && hand.total() < config.early_draw_hand_size && allowed(DrawCards)
    {
        return Some(Plan::new(DrawCards, Rule::EarlyDraw));
    }

    if (hand.total() >= config.large_hand_size || hand.largest_color_count() >= config.color_glut)
        && allowed(BuildNetwork)
    {
        return Some(Plan::new(BuildNetwork, Rule::LargeHand));
    }

    if phase >= GamePhase::Middle && allowed(CompleteObjectives) {
        let high_value = ctx.progress.iter().any(|progress| {
            !progress.completed
                && progress.path.is_some()
                && progress.objective.points >= config.high_value_objective
        });
        if high_value {
            return Some(Plan::new(CompleteObjectives, Rule::HighValueObjective));
        }
    }

    if state.all_objectives_completed() {
        if state.objective_draws() < config.max_objective_draws
            && state.wagons_left() >= config.redraw_objectives_min_wagons
            && allowed(DrawObjectives)
        {
            return Some(Plan::new(DrawObjectives, Rule::AllObjectivesComplete));
        }
        if hand.total() < config.all_complete_draw_hand_size && allowed(DrawCards) {
            return Some(Plan::new(DrawCards, Rule::AllObjectivesComplete));
        }
        if allowed(BuildNetwork) {
            return Some(Plan::new(BuildNetwork, Rule::AllObjectivesComplete));
        }
    }

    let confident_target = ctx.opponent.has_confident_target(config);
    let reachable_objective = ctx.has_reachable_objective();
    let mut defaults: SmallVec<[Priority; 4]> = SmallVec::new();
    match phase {
        GamePhase::Early => defaults.extend([DrawCards, BuildNetwork]),
        GamePhase::Middle => {
            if confident_target {
                defaults.push(BlockOpponent);
            }
            if reachable_objective {
                defaults.push(CompleteObjectives);
            }
            defaults.extend([BuildNetwork, DrawCards]);
        }
        GamePhase::Late => {
            if reachable_objective {
                defaults.push(CompleteObjectives);
            }
            if confident_target {
                defaults.push(BlockOpponent);
            }
            defaults.extend([BuildNetwork, DrawCards]);
        }
        GamePhase::Final => defaults.extend([BuildNetwork, DrawCards]),
    }

    defaults
        .into_iter()
        .find(|priority| allowed(*priority))
        .map(|priority| Plan::new(priority, Rule::PhaseDefault))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::TrainColor::{self, *};
    use crate::critical::{identify_critical_routes, objective_progress};
    use crate::map::{Map, Route};
    use crate::objective;
    use crate::pathfinding::PathCache;
    use crate::test_utils::sample_map;
    use pretty_assertions::assert_eq;

    fn plan_with(
        state: &GameState,
        opponent: &OpponentModel,
        config: &BotConfig,
        disallowed: &[Priority],
    ) -> Option<Plan> {
        let progress = objective_progress(state, &mut PathCache::new(), &config.path_limits());
        let critical_routes = identify_critical_routes(state, &progress, config, &[]);
        let ctx = TurnContext {
            state,
            opponent,
            config,
            progress: &progress,
            critical_routes: &critical_routes,
            excluded_routes: &[],
            blind_draw_refused: false,
            refused_visible_cards: &[],
        };

        plan(&ctx, disallowed)
    }

    fn plan_for(state: &GameState) -> Option<Plan> {
        plan_with(state, &OpponentModel::new(8), &BotConfig::default(), &[])
    }

    fn pay(state: &mut GameState, route_id: RouteId, color: TrainColor, length: u8) {
        state
            .claim_for_self(
                route_id,
                &Payment {
                    color,
                    colored_cards: length,
                    wild_cards: 0,
                },
            )
            .unwrap();
    }

    /// 32 wagons left after claiming 6-7, 4-5 and 0-4, and five turns played.
    fn middle_game_state(cards: &[TrainColor]) -> GameState {
        let mut hand = vec![Black; 5];
        hand.extend([Orange; 4]);
        hand.extend([White; 4]);
        hand.extend_from_slice(cards);

        let mut state = GameState::new(sample_map(), &hand);
        pay(&mut state, 8, Black, 5);
        pay(&mut state, 6, Orange, 4);
        pay(&mut state, 3, White, 4);
        for _ in 0..5 {
            state.end_turn(true);
        }
        state
    }

    #[test]
    fn priority_to_json() -> serde_json::Result<()> {
        assert_eq!(
            serde_json::to_string(&Priority::BlockOpponent)?,
            r#""block_opponent""#
        );
        assert_eq!(
            serde_json::from_str::<Priority>(r#""draw_cards""#)?,
            Priority::DrawCards
        );
        Ok(())
    }

    #[test]
    fn objectives_are_mandatory() {
        let state = GameState::new(sample_map(), &[Red; 12]);

        assert_eq!(
            plan_for(&state),
            Some(Plan::new(Priority::DrawObjectives, Rule::MandatoryObjectives))
        );
    }

    #[test]
    fn ready_critical_route_comes_first() {
        let mut state = GameState::new(sample_map(), &[Red, Red]);
        state.add_objectives(&[objective!(0, 2, 8)]);

        assert_eq!(
            plan_for(&state),
            Some(Plan::with_route(
                Priority::CompleteObjectives,
                0,
                Rule::ReadyCriticalRoute
            ))
        );
    }

    #[test]
    fn early_game_draws_cards() {
        let mut state = GameState::new(sample_map(), &[Pink, Pink]);
        state.add_objectives(&[objective!(0, 7, 12)]);
        for _ in 0..3 {
            state.end_turn(false);
        }

        assert_eq!(
            plan_for(&state),
            Some(Plan::new(Priority::DrawCards, Rule::EarlyDraw))
        );
    }

    #[test]
    fn liveness_forces_a_claim() {
        let mut state = GameState::new(sample_map(), &[Pink, Pink]);
        state.add_objectives(&[objective!(0, 7, 12)]);
        for _ in 0..4 {
            state.end_turn(false);
        }

        assert_eq!(
            plan_for(&state),
            Some(Plan::new(Priority::BuildNetwork, Rule::Liveness))
        );
    }

    #[test]
    fn liveness_needs_a_claimable_route() {
        let mut state = GameState::new(sample_map(), &[Pink]);
        state.add_objectives(&[objective!(0, 7, 12)]);
        for _ in 0..6 {
            state.end_turn(false);
        }

        assert_eq!(
            plan_for(&state),
            Some(Plan::new(Priority::DrawCards, Rule::EarlyDraw))
        );
    }

    #[test]
    fn color_glut_builds_network() {
        let mut cards = vec![Black; 6];
        cards.extend([White, White]);
        let mut state = GameState::new(sample_map(), &cards);
        state.add_objectives(&[objective!(0, 2, 8)]);

        assert_eq!(
            plan_for(&state),
            Some(Plan::new(Priority::BuildNetwork, Rule::LargeHand))
        );

        // Building is not possible: fall back to the phase default.
        assert_eq!(
            plan_with(
                &state,
                &OpponentModel::new(8),
                &BotConfig::default(),
                &[Priority::BuildNetwork]
            ),
            Some(Plan::new(Priority::DrawCards, Rule::PhaseDefault))
        );
    }

    #[test]
    fn high_value_objective_in_middle_game() {
        let mut state = middle_game_state(&[]);
        state.add_objectives(&[objective!(0, 2, 10)]);

        assert_eq!(state.phase(&BotConfig::default()), GamePhase::Middle);
        assert_eq!(
            plan_for(&state),
            Some(Plan::new(
                Priority::CompleteObjectives,
                Rule::HighValueObjective
            ))
        );
    }

    #[test]
    fn middle_game_default() {
        let mut state = middle_game_state(&[]);
        state.add_objectives(&[objective!(0, 2, 8)]);

        assert_eq!(
            plan_for(&state),
            Some(Plan::new(Priority::CompleteObjectives, Rule::PhaseDefault))
        );
    }

    #[test]
    fn all_objectives_complete() {
        let mut state = GameState::new(
            sample_map(),
            &[Red, Red, Blue, Blue, Green, Green, Yellow, Yellow, Pink, Pink],
        );
        state.add_objectives(&[objective!(0, 1, 2)]);
        pay(&mut state, 0, Red, 2);

        assert_eq!(
            plan_for(&state),
            Some(Plan::new(
                Priority::DrawObjectives,
                Rule::AllObjectivesComplete
            ))
        );

        let config = BotConfig::default().with_max_objective_draws(1);
        assert_eq!(
            plan_with(&state, &OpponentModel::new(8), &config, &[]),
            Some(Plan::new(Priority::DrawCards, Rule::AllObjectivesComplete))
        );
    }

    #[test]
    fn endgame_prefers_last_gap() {
        // A chain of seven routes of 6 to exhaust our wagons, then two objectives:
        // 9-10 lacks a single route, 11-13 lacks two routes but is worth much more.
        let mut routes: Vec<Route> = (0..7)
            .map(|city| Route::new(city, city + 1, 6, Red, None))
            .collect();
        routes.push(Route::new(9, 10, 2, Red, None));
        routes.push(Route::new(11, 12, 1, Blue, None));
        routes.push(Route::new(12, 13, 1, Blue, None));

        let mut cards = vec![Red; 44];
        cards.extend([Blue, Blue]);
        let mut state = GameState::new(Map::new(14, routes).unwrap(), &cards);
        for route_id in 0..7 {
            pay(&mut state, route_id, Red, 6);
        }
        state.add_objectives(&[objective!(9, 10, 4), objective!(11, 13, 20)]);
        assert_eq!(state.wagons_left(), 3);

        let config = BotConfig::default();
        let progress = objective_progress(&state, &mut PathCache::new(), &config.path_limits());
        let critical_routes = identify_critical_routes(&state, &progress, &config, &[]);
        assert_ne!(critical_routes[0].route_id, 7);

        assert_eq!(
            plan_for(&state),
            Some(Plan::with_route(Priority::CompleteObjectives, 7, Rule::Endgame))
        );
    }

    #[test]
    fn nothing_allowed() {
        let mut state = GameState::new(sample_map(), &[]);
        state.add_objectives(&[objective!(0, 2, 8)]);

        let everything = [
            Priority::CompleteObjectives,
            Priority::BlockOpponent,
            Priority::BuildNetwork,
            Priority::DrawCards,
            Priority::DrawObjectives,
        ];
        assert_eq!(
            plan_with(
                &state,
                &OpponentModel::new(8),
                &BotConfig::default(),
                &everything
            ),
            None
        );
    }
}
