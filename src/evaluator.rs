//! Scoring of routes and of offered objectives.

use crate::card::{Objective, NUM_DRAWN_OBJECTIVES};
use crate::config::BotConfig;
use crate::critical::ObjectiveProgress;
use crate::game_state::GameState;
use crate::map::{Map, RouteId};
use crate::opponent::OpponentModel;
use crate::pathfinding::{search, Path, PathCache};

use log::{debug, info, warn};
use std::cmp::Ordering;

/// How useful claiming a route would be for us.
///
/// Starts from the points of the route, with bonuses when it lies on the path of an incomplete
/// objective, when it connects to one of our hubs, or when it denies a city the opponent is
/// interested in. Routes are penalized by their length once wagons run low.
pub fn route_utility(
    state: &GameState,
    opponent: &OpponentModel,
    progress: &[ObjectiveProgress],
    config: &BotConfig,
    route_id: RouteId,
) -> f64 {
    let route = match state.map().route(route_id) {
        Some(route) => route,
        None => {
            warn!("Cannot evaluate unknown route {}.", route_id);
            return 0.0;
        }
    };

    let mut utility = Map::calculate_points_for_claimed_route(route.length) as f64;

    for objective_progress in progress.iter().filter(|p| !p.completed) {
        let on_path = objective_progress
            .path
            .as_ref()
            .map_or(false, |path| path.contains_route(route_id));
        if on_path {
            utility += objective_progress.objective.points as f64 * config.objective_path_weight;
        }
    }

    if state.num_owned_routes_at(route.from) >= 2 || state.num_owned_routes_at(route.to) >= 2 {
        utility += config.hub_bonus;
    }

    if state.wagons_left() < config.scarcity_wagons {
        utility -= config.scarcity_penalty * route.length as f64;
    }

    let interest = opponent.interest(route.from).max(opponent.interest(route.to));
    if interest >= config.high_interest {
        utility += config.interest_bonus * interest * opponent.profile().blocking_weight();
    }

    utility
}

/// Whether the opponent has cut the natural path between two cities, ignoring who owns what:
/// some segment of that path is theirs, and no parallel route is left for us.
fn natural_path_blocked(map: &Map, objective: &Objective) -> bool {
    let natural_path = match search(map, objective.from, objective.to, |_, route| {
        Some(route.length as u32)
    }) {
        Some(path) => path,
        None => return false,
    };

    natural_path.routes.iter().any(|route_id| {
        let route = match map.route(*route_id) {
            Some(route) => route,
            None => return false,
        };

        route.is_opponent()
            && map
                .routes_between(route.from, route.to)
                .all(|(_, parallel)| parallel.is_opponent())
    })
}

/// How worthwhile keeping an offered objective would be.
///
/// `held_paths` are the paths of the objectives we already hold, used for synergy.
pub fn objective_keep_score(
    state: &GameState,
    opponent: &OpponentModel,
    cache: &mut PathCache,
    config: &BotConfig,
    objective: &Objective,
    held_paths: &[Path],
) -> f64 {
    let map = state.map();
    let points = objective.points as f64;

    let path = match cache.shortest_path(map, objective.from, objective.to) {
        Some(path) => path,
        None => return -(config.unreachable_penalty + points),
    };

    let mut score = points / path.distance.max(1) as f64;
    score += config.progress_weight * path.owned_share(map);

    let remaining_length = path.distance - path.owned_length(map);
    if natural_path_blocked(map, objective) || remaining_length > state.wagons_left() as u32 {
        score -= config.blocked_segment_penalty;
    }

    let extra_segments = path
        .num_segments()
        .saturating_sub(config.difficulty_free_segments);
    score -= config.difficulty_weight * extra_segments as f64;

    for held in state.objectives() {
        if held.shares_endpoint_with(objective) {
            score += config.synergy_endpoint_bonus;
        }
    }
    for held_path in held_paths {
        let shared_routes = path
            .routes
            .iter()
            .filter(|route_id| held_path.contains_route(**route_id))
            .count();
        score += config.synergy_route_bonus * shared_routes as f64;
    }

    let risk: f64 = path.cities.iter().map(|city| opponent.interest(*city)).sum();
    score -= config.objective_risk_weight * opponent.profile().risk_weight() * risk;

    debug!(
        "Objective between {} and {} ({} points) scores {:.2}.",
        objective.from, objective.to, objective.points, score
    );
    score
}

/// Chooses which offered objectives to keep.
///
/// On the first draw of the game at least two objectives are kept, afterwards at least one,
/// even if they all score poorly. Other objectives are only kept if they score at least
/// the keep threshold, and if every kept objective still fits in our wagon budget.
pub fn select_objectives(
    state: &GameState,
    opponent: &OpponentModel,
    cache: &mut PathCache,
    config: &BotConfig,
    offered: &[Objective],
    first_draw: bool,
) -> [bool; NUM_DRAWN_OBJECTIVES] {
    let mut choices = [false; NUM_DRAWN_OBJECTIVES];
    let offered = &offered[..offered.len().min(NUM_DRAWN_OBJECTIVES)];
    if offered.is_empty() {
        warn!("No objective was offered.");
        return choices;
    }

    let held_paths: Vec<Path> = state
        .objectives()
        .iter()
        .filter(|held| !state.is_objective_completed(held))
        .filter_map(|held| cache.shortest_path(state.map(), held.from, held.to))
        .collect();

    let mut scored: Vec<(usize, f64, u32)> = offered
        .iter()
        .enumerate()
        .map(|(index, objective)| {
            let score = objective_keep_score(state, opponent, cache, config, objective, &held_paths);
            let remaining_length = cache
                .shortest_path(state.map(), objective.from, objective.to)
                .map_or(u32::MAX, |path| path.distance - path.owned_length(state.map()));
            (index, score, remaining_length)
        })
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });

    let min_kept = (if first_draw { 2 } else { 1 }).min(offered.len());
    let wagon_budget = config.objective_wagon_budget * state.wagons_left() as f64;
    let mut committed_length: u32 = 0;

    for (rank, (index, score, remaining_length)) in scored.iter().enumerate() {
        let fits = (committed_length as f64 + *remaining_length as f64) <= wagon_budget;
        if rank < min_kept || (*score >= config.keep_threshold && fits) {
            choices[*index] = true;
            committed_length = committed_length.saturating_add(*remaining_length);
        }
    }

    info!("Keeping objectives {:?} out of {:?}.", choices, offered);
    choices
}
