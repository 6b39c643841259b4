//! Progress of our objectives, and the routes still missing to complete them.

use crate::card::{Objective, Payment, TrainColor};
use crate::config::BotConfig;
use crate::game_state::GameState;
use crate::map::{Map, RouteId};
use crate::pathfinding::{Path, PathCache, SmartPathLimits};

use log::debug;
use smallvec::SmallVec;
use std::cmp::Ordering;

/// How far one of our objectives is from completion.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectiveProgress {
    /// Index of the objective in [`GameState::objectives`].
    pub index: usize,
    pub objective: Objective,
    pub completed: bool,
    /// Path we intend to follow. `None` if the objective cannot be completed anymore.
    pub path: Option<Path>,
    /// Unclaimed routes of the path, in path order.
    pub missing: SmallVec<[RouteId; 8]>,
}

impl ObjectiveProgress {
    /// Whether the objective can still be completed.
    #[inline]
    pub fn is_reachable(&self) -> bool {
        self.completed || self.path.is_some()
    }

    /// Whether a single route is missing to complete the objective.
    #[inline]
    pub fn is_single_gap(&self) -> bool {
        !self.completed && self.path.is_some() && self.missing.len() == 1
    }

    /// Number of wagons still needed to complete the objective.
    pub fn remaining_length(&self, map: &Map) -> u32 {
        self.missing
            .iter()
            .filter_map(|route_id| map.route(*route_id))
            .map(|route| route.length as u32)
            .sum()
    }
}

/// Computes the progress of every objective we hold.
///
/// Incomplete objectives follow their network-biased path when it is worth it, and their
/// shortest path otherwise.
pub fn objective_progress(
    state: &GameState,
    cache: &mut PathCache,
    limits: &SmartPathLimits,
) -> Vec<ObjectiveProgress> {
    state
        .objectives()
        .iter()
        .enumerate()
        .map(|(index, objective)| {
            if state.is_objective_completed(objective) {
                return ObjectiveProgress {
                    index,
                    objective: *objective,
                    completed: true,
                    path: None,
                    missing: SmallVec::new(),
                };
            }

            let path = cache.smart_path(state.map(), objective.from, objective.to, limits);
            let missing = path
                .as_ref()
                .map(|path| path.unclaimed_routes(state.map()).collect())
                .unwrap_or_default();

            ObjectiveProgress {
                index,
                objective: *objective,
                completed: false,
                path,
                missing,
            }
        })
        .collect()
}

/// An unclaimed route on the path of an incomplete objective.
#[derive(Clone, Debug, PartialEq)]
pub struct CriticalRoute {
    pub route_id: RouteId,
    /// The most valuable objective the route belongs to.
    pub objective_index: usize,
    /// How we would pay for it now, if we can.
    pub payment: Option<Payment>,
    /// The color worth collecting to claim it.
    pub color: TrainColor,
    /// Whether it can be claimed right now.
    pub ready: bool,
    /// Whether it is the last route missing for one of its objectives.
    pub single_gap: bool,
    pub priority: f64,
}

/// Lists every critical route, highest priority first.
///
/// A route shared by several objectives appears once, with the sum of their priorities.
/// Routes in `excluded` are skipped.
pub fn identify_critical_routes(
    state: &GameState,
    progress: &[ObjectiveProgress],
    config: &BotConfig,
    excluded: &[RouteId],
) -> Vec<CriticalRoute> {
    let map = state.map();
    let hand = state.hand();
    let wagons_left = state.wagons_left();
    let mut critical_routes: Vec<CriticalRoute> = Vec::new();
    // Largest single contribution to each critical route, in the same order.
    let mut best_contributions: Vec<f64> = Vec::new();

    for objective_progress in progress.iter().filter(|p| !p.completed) {
        let single_gap = objective_progress.is_single_gap();

        for route_id in &objective_progress.missing {
            if excluded.contains(route_id) {
                continue;
            }
            let route = match map.route(*route_id) {
                Some(route) => route,
                None => continue,
            };

            let payment = if route.length <= wagons_left {
                hand.payment_for(route)
            } else {
                None
            };
            let ready = payment.is_some();

            let mut priority = objective_progress.objective.points as f64 * config.critical_priority;
            if single_gap {
                priority *= config.single_gap_multiplier;
            }
            if !ready {
                priority /= config.insufficient_cards_divisor;
            }

            match critical_routes
                .iter()
                .position(|critical_route| critical_route.route_id == *route_id)
            {
                Some(position) => {
                    let critical_route = &mut critical_routes[position];
                    if priority > best_contributions[position] {
                        best_contributions[position] = priority;
                        critical_route.objective_index = objective_progress.index;
                    }
                    critical_route.priority += priority;
                    critical_route.single_gap |= single_gap;
                }
                None => {
                    best_contributions.push(priority);
                    critical_routes.push(CriticalRoute {
                        route_id: *route_id,
                        objective_index: objective_progress.index,
                        payment,
                        color: hand.preferred_color(route),
                        ready,
                        single_gap,
                        priority,
                    });
                }
            }
        }
    }

    critical_routes.sort_by(|a, b| {
        b.priority
            .partial_cmp(&a.priority)
            .unwrap_or(Ordering::Equal)
            .then(a.route_id.cmp(&b.route_id))
    });

    debug!(
        "Critical routes: {:?}",
        critical_routes
            .iter()
            .map(|critical_route| (critical_route.route_id, critical_route.priority))
            .collect::<Vec<_>>()
    );
    critical_routes
}

/// The incomplete objective needing the fewest wagons, among the ones we can still complete.
pub fn nearest_to_completion<'a>(
    progress: &'a [ObjectiveProgress],
    map: &Map,
) -> Option<&'a ObjectiveProgress> {
    progress
        .iter()
        .filter(|p| !p.completed && p.path.is_some())
        .min_by_key(|p| (p.remaining_length(map), p.index))
}
