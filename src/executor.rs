//! Turns a plan into a single legal move.

use crate::arbiter::{Plan, Priority, TurnContext};
use crate::card::{Payment, TrainColor};
use crate::critical::nearest_to_completion;
use crate::evaluator::route_utility;
use crate::map::{Route, RouteId};
use crate::moves::MoveData;

use log::{debug, warn};
use std::cmp::Ordering;

/// A move, along with the route and payment it commits to when it is a claim.
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedMove {
    pub move_data: MoveData,
    pub claim: Option<(RouteId, Payment)>,
}

impl PlannedMove {
    fn claim(route_id: RouteId, route: &Route, payment: Payment) -> Self {
        Self {
            move_data: MoveData::ClaimRoute {
                from: route.from,
                to: route.to,
                color: payment.color,
                wild_cards: payment.wild_cards,
            },
            claim: Some((route_id, payment)),
        }
    }
}

impl From<MoveData> for PlannedMove {
    fn from(move_data: MoveData) -> Self {
        Self {
            move_data,
            claim: None,
        }
    }
}

/// Produces the move for a plan, or `None` if the plan cannot be acted upon,
/// in which case another priority should be considered.
pub fn execute(ctx: &TurnContext, plan: &Plan) -> Option<PlannedMove> {
    match plan.priority {
        Priority::DrawObjectives => Some(MoveData::DrawObjectives.into()),
        Priority::CompleteObjectives => complete_objectives(ctx, plan.preferred_route),
        Priority::BlockOpponent => block_opponent(ctx),
        Priority::BuildNetwork => build_network(ctx),
        Priority::DrawCards => Some(draw_cards(ctx, true).into()),
    }
}

/// Checks a claim one last time before emitting it.
///
/// A claim which would be refused becomes a draw.
pub fn validated_claim(ctx: &TurnContext, route_id: RouteId, payment: &Payment) -> PlannedMove {
    match ctx.state.validate_claim(route_id, payment) {
        Ok(route) => PlannedMove::claim(route_id, route, *payment),
        Err(error) => {
            warn!("Not claiming route {}, drawing instead: {}", route_id, error);
            fallback_draw(ctx, true).into()
        }
    }
}

/// Highest scoring candidate; ties go to the lowest route id.
fn best_candidate(candidates: Vec<(RouteId, Payment, f64)>) -> Option<(RouteId, Payment, f64)> {
    candidates.into_iter().max_by(|a, b| {
        a.2.partial_cmp(&b.2)
            .unwrap_or(Ordering::Equal)
            .then(b.0.cmp(&a.0))
    })
}

fn complete_objectives(ctx: &TurnContext, preferred_route: Option<RouteId>) -> Option<PlannedMove> {
    let preferred = preferred_route.and_then(|route_id| {
        ctx.critical_routes
            .iter()
            .find(|critical_route| critical_route.route_id == route_id && critical_route.ready)
    });
    let ready = preferred.or_else(|| {
        ctx.critical_routes
            .iter()
            .find(|critical_route| critical_route.ready)
    });

    if let Some(critical_route) = ready {
        if let Some(payment) = &critical_route.payment {
            debug!(
                "Claiming route {} for objective {}.",
                critical_route.route_id, critical_route.objective_index
            );
            return Some(validated_claim(ctx, critical_route.route_id, payment));
        }
    }

    // Nothing to claim yet: collect cards for the objective closest to completion.
    let map = ctx.state.map();
    let hand = ctx.state.hand();
    let nearest = nearest_to_completion(ctx.progress, map)?;
    let target = nearest
        .missing
        .iter()
        .filter(|route_id| !ctx.excluded_routes.contains(route_id))
        .filter_map(|route_id| map.route(*route_id))
        .filter(|route| hand.deficit(route) > 0)
        .min_by_key(|route| hand.deficit(route));

    if let Some(route) = target {
        let color = hand.preferred_color(route);
        if ctx.can_take_visible(color) {
            debug!(
                "Drawing {} for the objective between {} and {}.",
                color, nearest.objective.from, nearest.objective.to
            );
            return Some(MoveData::DrawVisibleCard(color).into());
        }
    }

    Some(draw_cards(ctx, true).into())
}

fn block_opponent(ctx: &TurnContext) -> Option<PlannedMove> {
    let map = ctx.state.map();
    let blocking_weight = ctx.opponent.profile().blocking_weight();

    let candidates = ctx
        .claimable_routes()
        .into_iter()
        .filter_map(|(route_id, payment)| {
            let cut_score = ctx.opponent.bottleneck_score(map, route_id, ctx.config)?;
            let score = route_utility(ctx.state, ctx.opponent, ctx.progress, ctx.config, route_id)
                + cut_score * blocking_weight;
            Some((route_id, payment, score))
        })
        .collect();

    match best_candidate(candidates) {
        Some((route_id, payment, score)) if score >= ctx.config.min_block_score => {
            debug!("Blocking route {} (score {:.2}).", route_id, score);
            Some(validated_claim(ctx, route_id, &payment))
        }
        _ => build_network(ctx),
    }
}

/// On the last turn, routes are ranked by how much they raise our projected score instead.
fn build_network(ctx: &TurnContext) -> Option<PlannedMove> {
    let map = ctx.state.map();
    let connectivity = ctx.state.connectivity();
    let last_turn = ctx.state.is_last_turn();
    let current_score = if last_turn {
        ctx.state.projected_score()
    } else {
        0
    };

    let candidates = ctx
        .claimable_routes()
        .into_iter()
        .filter_map(|(route_id, payment)| {
            let route = map.route(route_id)?;
            if last_turn {
                let gain = ctx.state.projected_score_with(route_id, &payment)? - current_score;
                return Some((route_id, payment, gain as f64));
            }

            let mut score =
                route_utility(ctx.state, ctx.opponent, ctx.progress, ctx.config, route_id);
            if connectivity.is_in_network(route.from) || connectivity.is_in_network(route.to) {
                score += ctx.config.network_bonus;
            }
            Some((route_id, payment, score))
        })
        .collect();

    best_candidate(candidates)
        .map(|(route_id, payment, _)| validated_claim(ctx, route_id, &payment))
}

/// Draws a train card: a visible wild card if allowed, otherwise the visible color reducing the
/// largest deficit of the routes we need, otherwise whatever [`fallback_draw`] gives.
pub fn draw_cards(ctx: &TurnContext, allow_wild: bool) -> MoveData {
    let state = ctx.state;
    if allow_wild && ctx.can_take_visible(TrainColor::Wild) {
        return MoveData::DrawVisibleCard(TrainColor::Wild);
    }

    let map = state.map();
    let hand = state.hand();
    let mut best: Option<(TrainColor, u8)> = None;

    for progress in ctx.progress.iter().filter(|p| !p.completed) {
        for route in progress
            .missing
            .iter()
            .filter(|route_id| !ctx.excluded_routes.contains(route_id))
            .filter_map(|route_id| map.route(*route_id))
        {
            let deficit = hand.deficit(route);
            let color = hand.preferred_color(route);
            if deficit == 0 || color.is_wild() || !ctx.can_take_visible(color) {
                continue;
            }

            if best.map_or(true, |(_, best_deficit)| deficit > best_deficit) {
                best = Some((color, deficit));
            }
        }
    }

    match best {
        Some((color, _)) => MoveData::DrawVisibleCard(color),
        None => fallback_draw(ctx, allow_wild),
    }
}

/// The second card of a turn. A visible wild card cannot be taken at that point.
#[inline]
pub fn second_draw(ctx: &TurnContext) -> MoveData {
    draw_cards(ctx, false)
}

/// A blind card, unless the server refused one this turn: then a face-up card, wild ones last.
pub fn fallback_draw(ctx: &TurnContext, allow_wild: bool) -> MoveData {
    if !ctx.blind_draw_refused {
        return MoveData::DrawBlindCard;
    }

    let face_up = |wild: bool| {
        ctx.state
            .visible_cards()
            .iter()
            .flatten()
            .copied()
            .find(|color| color.is_wild() == wild && ctx.can_take_visible(*color))
    };

    match face_up(false).or_else(|| face_up(true).filter(|_| allow_wild)) {
        Some(color) => MoveData::DrawVisibleCard(color),
        None => {
            warn!("No face-up card left to take, trying a blind card again.");
            MoveData::DrawBlindCard
        }
    }
}

/// Always produces a move: the longest claimable route, or else a draw.
pub fn emergency_move(ctx: &TurnContext) -> PlannedMove {
    let map = ctx.state.map();
    let longest = ctx
        .claimable_routes()
        .into_iter()
        .filter_map(|(route_id, payment)| {
            map.route(route_id)
                .map(|route| (route_id, payment, route.length))
        })
        .max_by(|a, b| a.2.cmp(&b.2).then(b.0.cmp(&a.0)));

    match longest {
        Some((route_id, payment, _)) => {
            warn!("Emergency move: claiming route {}.", route_id);
            validated_claim(ctx, route_id, &payment)
        }
        None => {
            warn!("Emergency move: nothing to claim, drawing.");
            fallback_draw(ctx, true).into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbiter::Rule;
    use crate::card::TrainColor::*;
    use crate::config::BotConfig;
    use crate::critical::{identify_critical_routes, objective_progress, ObjectiveProgress};
    use crate::game_state::GameState;
    use crate::map::{Map, Route};
    use crate::objective;
    use crate::opponent::OpponentModel;
    use crate::pathfinding::PathCache;
    use crate::test_utils::{line_map, sample_map};
    use pretty_assertions::assert_eq;

    fn with_context<T>(
        state: &GameState,
        opponent: &OpponentModel,
        config: &BotConfig,
        act: impl FnOnce(&TurnContext) -> T,
    ) -> T {
        with_refusals(state, opponent, config, false, &[], act)
    }

    fn with_refusals<T>(
        state: &GameState,
        opponent: &OpponentModel,
        config: &BotConfig,
        blind_draw_refused: bool,
        refused_visible_cards: &[TrainColor],
        act: impl FnOnce(&TurnContext) -> T,
    ) -> T {
        let progress: Vec<ObjectiveProgress> =
            objective_progress(state, &mut PathCache::new(), &config.path_limits());
        let critical_routes = identify_critical_routes(state, &progress, config, &[]);
        let ctx = TurnContext {
            state,
            opponent,
            config,
            progress: &progress,
            critical_routes: &critical_routes,
            excluded_routes: &[],
            blind_draw_refused,
            refused_visible_cards,
        };

        act(&ctx)
    }

    fn claim_of(state: &GameState, route_id: RouteId, payment: &Payment) -> MoveData {
        with_context(state, &OpponentModel::new(8), &BotConfig::default(), |ctx| {
            validated_claim(ctx, route_id, payment).move_data
        })
    }

    fn plan_of(priority: Priority) -> Plan {
        Plan {
            priority,
            preferred_route: None,
            rule: Rule::PhaseDefault,
        }
    }

    fn run_plan(state: &GameState, priority: Priority) -> Option<MoveData> {
        with_context(state, &OpponentModel::new(8), &BotConfig::default(), |ctx| {
            execute(ctx, &plan_of(priority)).map(|planned| planned.move_data)
        })
    }

    #[test]
    fn claim_uses_wild_cards() {
        let state = GameState::new(line_map(2), &[Red, Red, Red, Wild, Wild]);
        let payment = Payment {
            color: Red,
            colored_cards: 2,
            wild_cards: 2,
        };

        // Gray route of length 1 only takes one card.
        assert_eq!(claim_of(&state, 0, &payment), MoveData::DrawBlindCard);
        assert_eq!(
            claim_of(
                &state,
                0,
                &Payment {
                    color: Red,
                    colored_cards: 0,
                    wild_cards: 1
                }
            ),
            MoveData::ClaimRoute {
                from: 0,
                to: 1,
                color: Red,
                wild_cards: 1
            }
        );
    }

    #[test]
    fn invalid_claims_become_blind_draws() {
        let mut state = GameState::new(sample_map(), &[Red, Red]);
        let payment = Payment {
            color: Red,
            colored_cards: 2,
            wild_cards: 0,
        };

        let (opponent, config) = (OpponentModel::new(8), BotConfig::default());
        let planned = with_context(&state, &opponent, &config, |ctx| {
            validated_claim(ctx, 0, &payment)
        });
        assert!(planned.move_data.is_claim());
        assert_eq!(planned.claim, Some((0, payment)));
        assert_eq!(claim_of(&state, 42, &payment), MoveData::DrawBlindCard);
        // Yellow route.
        assert_eq!(claim_of(&state, 4, &payment), MoveData::DrawBlindCard);

        state.record_opponent_claim(0).unwrap();
        assert_eq!(claim_of(&state, 0, &payment), MoveData::DrawBlindCard);
    }

    #[test]
    fn complete_objectives_claims_critical_route() {
        let mut state = GameState::new(sample_map(), &[Red, Red]);
        state.add_objectives(&[objective!(0, 2, 8)]);

        assert_eq!(
            run_plan(&state, Priority::CompleteObjectives),
            Some(MoveData::ClaimRoute {
                from: 0,
                to: 1,
                color: Red,
                wild_cards: 0
            })
        );
    }

    #[test]
    fn complete_objectives_draws_needed_color() {
        let mut state = GameState::new(sample_map(), &[Red]);
        state.add_objectives(&[objective!(0, 2, 8)]);
        state.set_visible_cards([Some(Green), Some(Red), Some(Blue), None, None]);

        // 0-1 lacks a single red card, the shortest deficit.
        assert_eq!(
            run_plan(&state, Priority::CompleteObjectives),
            Some(MoveData::DrawVisibleCard(Red))
        );

        state.set_visible_cards([Some(Green), Some(Green), None, None, Some(Wild)]);
        assert_eq!(
            run_plan(&state, Priority::CompleteObjectives),
            Some(MoveData::DrawVisibleCard(Wild))
        );
    }

    #[test]
    fn complete_objectives_without_objectives() {
        let state = GameState::new(sample_map(), &[Red, Red]);
        assert_eq!(run_plan(&state, Priority::CompleteObjectives), None);
    }

    #[test]
    fn build_network_prefers_connected_routes() {
        let mut state = GameState::new(sample_map(), &[Red, Red, Yellow, Yellow, Pink, Pink]);
        state
            .claim_for_self(
                0,
                &Payment {
                    color: Red,
                    colored_cards: 2,
                    wild_cards: 0,
                },
            )
            .unwrap();

        // 1-5 and 5-6 are both worth 2 points, but only 1-5 touches our network.
        assert_eq!(
            run_plan(&state, Priority::BuildNetwork),
            Some(MoveData::ClaimRoute {
                from: 1,
                to: 5,
                color: Yellow,
                wild_cards: 0
            })
        );
    }

    #[test]
    fn build_network_with_nothing_claimable() {
        let state = GameState::new(sample_map(), &[Red]);
        assert_eq!(run_plan(&state, Priority::BuildNetwork), None);
    }

    #[test]
    fn block_opponent_claims_bottleneck() {
        let config = BotConfig {
            confident_objective_score: 0.5,
            ..BotConfig::default()
        }
        .with_opponent_refresh_interval(1);
        let mut state = GameState::new(line_map(5), &[Red]);
        let mut opponent = OpponentModel::new(5);
        for (route_id, cities) in [(0, (0, 1)), (1, (1, 2))] {
            state.record_opponent_claim(route_id).unwrap();
            opponent.on_claim(state.map(), cities, 1, false, &config);
        }

        let result = with_context(&state, &opponent, &config, |ctx| {
            execute(ctx, &plan_of(Priority::BlockOpponent)).map(|planned| planned.move_data)
        });

        // City 2 is the one the opponent cares about most.
        assert_eq!(
            result,
            Some(MoveData::ClaimRoute {
                from: 2,
                to: 3,
                color: Red,
                wild_cards: 0
            })
        );
    }

    #[test]
    fn block_opponent_falls_back_to_build_network() {
        let state = GameState::new(sample_map(), &[Pink, Pink]);

        assert_eq!(
            run_plan(&state, Priority::BlockOpponent),
            Some(MoveData::ClaimRoute {
                from: 5,
                to: 6,
                color: Pink,
                wild_cards: 0
            })
        );
    }

    #[test]
    fn draw_cards_prefers_wild_then_deficit() {
        let mut state = GameState::new(sample_map(), &[]);
        state.add_objectives(&[objective!(0, 2, 8)]);
        state.set_visible_cards([Some(Red), Some(Blue), Some(Wild), None, None]);
        let config = BotConfig::default();
        let opponent = OpponentModel::new(8);

        assert_eq!(
            with_context(&state, &opponent, &config, |ctx| draw_cards(ctx, true)),
            MoveData::DrawVisibleCard(Wild)
        );
        // Blue has the largest deficit: 3 cards for 1-2.
        assert_eq!(
            with_context(&state, &opponent, &config, second_draw),
            MoveData::DrawVisibleCard(Blue)
        );

        state.set_visible_cards([Some(Wild), Some(Wild), Some(Green), None, None]);
        assert_eq!(
            with_context(&state, &opponent, &config, second_draw),
            MoveData::DrawBlindCard
        );
    }

    #[test]
    fn emergency_move_claims_longest_route() {
        let state = GameState::new(sample_map(), &[Pink, Pink, Orange, Orange, Orange, Orange]);
        let planned =
            with_context(&state, &OpponentModel::new(8), &BotConfig::default(), emergency_move);
        assert_eq!(planned.claim.map(|(route_id, _)| route_id), Some(6));
        assert_eq!(
            planned.move_data,
            MoveData::ClaimRoute {
                from: 4,
                to: 5,
                color: Orange,
                wild_cards: 0
            }
        );

        let mut state = GameState::new(sample_map(), &[Pink, Pink]);
        state.record_opponent_claim(7).unwrap();
        assert_eq!(
            with_context(&state, &OpponentModel::new(8), &BotConfig::default(), emergency_move),
            PlannedMove::from(MoveData::DrawBlindCard)
        );
    }

    #[test]
    fn refused_blind_draw_falls_back_to_face_up_cards() {
        let mut state = GameState::new(sample_map(), &[]);
        state.set_visible_cards([Some(Wild), Some(Green), None, Some(Pink), None]);
        let opponent = OpponentModel::new(8);
        let config = BotConfig::default();

        assert_eq!(
            with_refusals(&state, &opponent, &config, true, &[], |ctx| fallback_draw(ctx, true)),
            MoveData::DrawVisibleCard(Green)
        );
        assert_eq!(
            with_refusals(&state, &opponent, &config, true, &[Green], emergency_move),
            PlannedMove::from(MoveData::DrawVisibleCard(Pink))
        );
        assert_eq!(
            with_refusals(&state, &opponent, &config, true, &[Green, Pink], |ctx| {
                fallback_draw(ctx, true)
            }),
            MoveData::DrawVisibleCard(Wild)
        );
        // The second card of a turn cannot be a face-up wild.
        assert_eq!(
            with_refusals(&state, &opponent, &config, true, &[Green, Pink], second_draw),
            MoveData::DrawBlindCard
        );
        assert_eq!(
            with_refusals(&state, &opponent, &config, false, &[], emergency_move),
            PlannedMove::from(MoveData::DrawBlindCard)
        );
    }

    #[test]
    fn refused_colors_are_not_asked_for_again() {
        let mut state = GameState::new(sample_map(), &[]);
        state.add_objectives(&[objective!(0, 2, 8)]);
        state.set_visible_cards([Some(Red), Some(Blue), Some(Wild), None, None]);
        let opponent = OpponentModel::new(8);
        let config = BotConfig::default();

        assert_eq!(
            with_refusals(&state, &opponent, &config, false, &[Wild, Blue], |ctx| {
                draw_cards(ctx, true)
            }),
            MoveData::DrawVisibleCard(Red)
        );
    }

    #[test]
    fn last_turn_maximizes_projected_score() {
        // We own 0-1 (3 wagons), the opponent owns 5-6 (4 wagons).
        let map = Map::new(
            7,
            vec![
                Route::new(0, 1, 3, Green, None),
                Route::new(1, 2, 1, Red, None),
                Route::new(3, 4, 3, Blue, None),
                Route::new(5, 6, 4, Pink, None),
            ],
        )
        .unwrap();
        let mut state = GameState::new(map, &[Green, Green, Green, Red, Blue, Blue, Blue]);
        state
            .claim_for_self(
                0,
                &Payment {
                    color: Green,
                    colored_cards: 3,
                    wild_cards: 0,
                },
            )
            .unwrap();
        state.record_opponent_claim(3).unwrap();

        // 3-4 is worth more points on its own.
        assert_eq!(
            run_plan(&state, Priority::BuildNetwork),
            Some(MoveData::ClaimRoute {
                from: 3,
                to: 4,
                color: Blue,
                wild_cards: 0
            })
        );

        // 1-2 ties our longest path with the opponent's, which takes the bonus.
        state.set_last_turn();
        assert_eq!(
            run_plan(&state, Priority::BuildNetwork),
            Some(MoveData::ClaimRoute {
                from: 1,
                to: 2,
                color: Red,
                wild_cards: 0
            })
        );
    }
}
