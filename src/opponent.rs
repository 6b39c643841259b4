//! Inference of the opponent's objectives from the routes it claims.

use crate::city::{unordered, City, CityToCity, MAX_CITIES};
use crate::config::BotConfig;
use crate::map::{Map, RouteId};
use crate::pathfinding::{costs_from, opponent_cost, search};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::cmp::Ordering;

/// Number of probable opponent objectives kept after each refresh.
pub const NUM_LIKELY_OBJECTIVES: usize = 5;

/// Coarse behavior of the opponent, derived from aggregate statistics.
///
/// A profile only scales some weights, it never gates a decision on its own.
///
/// # JSON
/// Profiles are serialized in snake_case.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpponentProfile {
    /// Not enough observations yet.
    Unknown,
    /// Claims routes on most turns.
    Aggressive,
    /// Mostly draws cards.
    Hoarder,
    /// Draws objectives repeatedly.
    ObjectiveFocused,
    /// Keeps claiming routes next to our network.
    Blocker,
}

impl OpponentProfile {
    /// Multiplier of the bonus for denying cities the opponent is interested in.
    pub fn blocking_weight(&self) -> f64 {
        match self {
            OpponentProfile::Aggressive => 1.2,
            OpponentProfile::ObjectiveFocused => 1.5,
            OpponentProfile::Hoarder => 0.8,
            OpponentProfile::Blocker | OpponentProfile::Unknown => 1.0,
        }
    }

    /// Multiplier of the risk of pursuing an objective through contested cities.
    pub fn risk_weight(&self) -> f64 {
        match self {
            OpponentProfile::Blocker => 1.5,
            OpponentProfile::Aggressive => 1.2,
            OpponentProfile::Hoarder => 0.8,
            OpponentProfile::ObjectiveFocused | OpponentProfile::Unknown => 1.0,
        }
    }
}

/// Aggregate counters over every observed opponent move.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct OpponentStats {
    pub claims: u32,
    pub claimed_length: u32,
    pub card_draws: u32,
    pub objective_draws: u32,
    /// Claims touching a city of our network.
    pub claims_near_us: u32,
}

impl OpponentStats {
    /// Approximate number of turns played, knowing that cards are usually drawn in pairs.
    pub fn turns(&self) -> u32 {
        self.claims + self.objective_draws + (self.card_draws + 1) / 2
    }

    fn classify(&self) -> OpponentProfile {
        let turns = self.turns();
        if turns < 3 {
            OpponentProfile::Unknown
        } else if self.claims >= 3 && self.claims_near_us * 2 >= self.claims {
            OpponentProfile::Blocker
        } else if self.objective_draws >= 2 {
            OpponentProfile::ObjectiveFocused
        } else if self.claims * 2 >= turns {
            OpponentProfile::Aggressive
        } else if self.claims * 4 <= turns {
            OpponentProfile::Hoarder
        } else {
            OpponentProfile::Unknown
        }
    }
}

/// A pair of cities the opponent is probably trying to connect.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LikelyObjective {
    pub cities: CityToCity,
    pub score: f64,
}

/// What we infer about the opponent.
#[derive(Clone, Debug)]
pub struct OpponentModel {
    num_cities: usize,
    /// Number of opponent routes touching each city.
    visits: [u32; MAX_CITIES],
    last_claim: Option<CityToCity>,
    /// Number of consecutive claims forming a chain.
    run_length: u32,
    /// Tip of the current chain of claims.
    frontier: Option<City>,
    /// Symmetric "likely objective" score per pair of cities.
    scores: [[f64; MAX_CITIES]; MAX_CITIES],
    likely_objectives: SmallVec<[LikelyObjective; NUM_LIKELY_OBJECTIVES]>,
    /// Derived from the likely objectives, between 0 and 1.
    interest: [f64; MAX_CITIES],
    profile: OpponentProfile,
    stats: OpponentStats,
    turns_since_refresh: u32,
    /// The opponent took the first of two train cards.
    drawing_cards: bool,
}

impl OpponentModel {
    pub fn new(num_cities: usize) -> Self {
        Self {
            num_cities: num_cities.min(MAX_CITIES),
            visits: [0; MAX_CITIES],
            last_claim: None,
            run_length: 0,
            frontier: None,
            scores: [[0.0; MAX_CITIES]; MAX_CITIES],
            likely_objectives: SmallVec::new(),
            interest: [0.0; MAX_CITIES],
            profile: OpponentProfile::Unknown,
            stats: OpponentStats::default(),
            turns_since_refresh: 0,
            drawing_cards: false,
        }
    }

    #[inline]
    pub fn profile(&self) -> OpponentProfile {
        self.profile
    }

    #[inline]
    pub fn stats(&self) -> &OpponentStats {
        &self.stats
    }

    /// Probable opponent objectives, most likely first.
    #[inline]
    pub fn likely_objectives(&self) -> &[LikelyObjective] {
        &self.likely_objectives
    }

    pub fn visits(&self, city: City) -> u32 {
        self.visits.get(city).copied().unwrap_or(0)
    }

    /// How much the opponent seems to care about a city, between 0 and 1.
    pub fn interest(&self, city: City) -> f64 {
        if city < self.num_cities {
            self.interest[city]
        } else {
            0.0
        }
    }

    pub fn likely_objective_score(&self, start: City, end: City) -> f64 {
        if start < self.num_cities && end < self.num_cities {
            self.scores[start][end]
        } else {
            0.0
        }
    }

    /// Whether the most likely opponent objective is worth blocking.
    pub fn has_confident_target(&self, config: &BotConfig) -> bool {
        self.likely_objectives
            .first()
            .map_or(false, |likely| likely.score >= config.confident_objective_score)
    }

    fn add_score(&mut self, start: City, end: City, score: f64) {
        self.scores[start][end] += score;
        self.scores[end][start] += score;
    }

    /// A city visited often enough is likely an objective endpoint: pair it with every other one.
    fn mark_likely_endpoint(&mut self, city: City, config: &BotConfig) {
        for other in 0..self.num_cities {
            if other != city && self.visits[other] >= config.likely_endpoint_visits {
                self.add_score(city, other, config.endpoint_pair_weight);
            }
        }
    }

    /// Raises the score between the frontier of a chain of claims and the cities ahead of it.
    fn project_from(&mut self, map: &Map, frontier: City, config: &BotConfig) {
        let costs = costs_from(map, frontier, opponent_cost);
        let min_distance = config.projection_min_distance.max(1);

        for (city, cost) in costs.iter().enumerate().take(self.num_cities) {
            let distance = match cost {
                Some(distance) if city != frontier => *distance,
                _ => continue,
            };

            if distance >= min_distance && distance <= config.projection_max_distance {
                let score = config.projection_weight * min_distance as f64 / distance as f64;
                self.add_score(frontier, city, score);
            }
        }
    }

    /// Records a route claimed by the opponent.
    ///
    /// `near_our_network` tells whether the route touches a city of our network.
    pub fn on_claim(
        &mut self,
        map: &Map,
        (from, to): CityToCity,
        length: u8,
        near_our_network: bool,
        config: &BotConfig,
    ) {
        if from >= self.num_cities || to >= self.num_cities {
            warn!(
                "Ignoring opponent claim between {} and {}: outside of a board of {} cities.",
                from, to, self.num_cities
            );
            return;
        }

        self.stats.claims += 1;
        self.stats.claimed_length += length as u32;
        if near_our_network {
            self.stats.claims_near_us += 1;
        }

        for city in [from, to] {
            self.visits[city] += 1;
            if self.visits[city] == config.likely_endpoint_visits {
                self.mark_likely_endpoint(city, config);
            }
        }

        let shared_city = self.last_claim.and_then(|(previous_from, previous_to)| {
            if from == previous_from || from == previous_to {
                Some(from)
            } else if to == previous_from || to == previous_to {
                Some(to)
            } else {
                None
            }
        });

        match shared_city {
            Some(shared_city) => {
                self.run_length += 1;
                self.frontier = Some(if shared_city == from { to } else { from });
            }
            None => {
                self.run_length = 1;
                self.frontier = None;
            }
        }
        self.last_claim = Some((from, to));

        if self.run_length >= 2 {
            if let Some(frontier) = self.frontier {
                debug!(
                    "Opponent chained {} claims, projecting from city {}.",
                    self.run_length, frontier
                );
                self.project_from(map, frontier, config);
            }
        }

        self.profile = self.stats.classify();
        self.end_turn(map, config);
    }

    /// Records that the opponent drew a train card.
    ///
    /// A turn is two cards, or a single face-up wild card.
    pub fn on_card_draw(&mut self, map: &Map, face_up_wild: bool, config: &BotConfig) {
        self.stats.card_draws += 1;
        self.profile = self.stats.classify();

        if face_up_wild || self.drawing_cards {
            self.end_turn(map, config);
        } else {
            self.drawing_cards = true;
        }
    }

    /// Records that the opponent drew objectives.
    pub fn on_objective_draw(&mut self, map: &Map, config: &BotConfig) {
        self.stats.objective_draws += 1;
        self.profile = self.stats.classify();
        self.end_turn(map, config);
    }

    /// Likely objectives are ranked again every `opponent_refresh_interval` opponent turns.
    fn end_turn(&mut self, map: &Map, config: &BotConfig) {
        self.drawing_cards = false;
        self.turns_since_refresh += 1;
        if self.turns_since_refresh >= config.opponent_refresh_interval {
            self.refresh(map);
        }
    }

    /// Ranks the likely objectives, and derives the interest of each city from them.
    pub fn refresh(&mut self, map: &Map) {
        self.turns_since_refresh = 0;

        let mut ranked: Vec<LikelyObjective> = Vec::new();
        for start in 0..self.num_cities {
            for end in start + 1..self.num_cities {
                let score = self.scores[start][end];
                if score > 0.0 {
                    ranked.push(LikelyObjective {
                        cities: unordered((start, end)),
                        score,
                    });
                }
            }
        }

        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.cities.cmp(&b.cities))
        });
        ranked.truncate(NUM_LIKELY_OBJECTIVES);

        self.interest = [0.0; MAX_CITIES];
        for likely in &ranked {
            let (start, end) = likely.cities;
            self.interest[start] += likely.score;
            self.interest[end] += likely.score;

            // Cities along the way matter as well, to a lesser extent.
            if let Some(path) = search(map, start, end, opponent_cost) {
                for city in path.cities.iter().filter(|city| **city != start && **city != end) {
                    self.interest[*city] += likely.score / 2.0;
                }
            }
        }

        let max_interest = self.interest.iter().copied().fold(0.0, f64::max);
        if max_interest > 0.0 {
            for interest in self.interest.iter_mut() {
                *interest /= max_interest;
            }
        }

        debug!(
            "Likely opponent objectives: {:?}, profile {:?}.",
            ranked
                .iter()
                .map(|likely| likely.cities)
                .collect::<Vec<_>>(),
            self.profile
        );
        self.likely_objectives = ranked.into_iter().collect();
    }

    /// If claiming the route would cut a confident opponent objective with no alternate path,
    /// returns the score of that objective (the highest one, if several are cut).
    pub fn bottleneck_score(&self, map: &Map, route_id: RouteId, config: &BotConfig) -> Option<f64> {
        let route = map.route(route_id)?;
        if route.is_claimed() {
            return None;
        }

        let mut best: Option<f64> = None;
        for likely in &self.likely_objectives {
            if likely.score < config.confident_objective_score {
                continue;
            }

            let (start, end) = likely.cities;
            let uses_route = search(map, start, end, opponent_cost)
                .map_or(false, |path| path.contains_route(route_id));
            if !uses_route {
                continue;
            }

            let alternate = search(map, start, end, |other_id, other| {
                if other_id == route_id {
                    None
                } else {
                    opponent_cost(other_id, other)
                }
            });
            if alternate.is_none() {
                best = Some(best.map_or(likely.score, |best| best.max(likely.score)));
            }
        }

        best
    }

    /// Whether the route is a bottleneck of a confident opponent objective.
    #[inline]
    pub fn is_bottleneck(&self, map: &Map, route_id: RouteId, config: &BotConfig) -> bool {
        self.bottleneck_score(map, route_id, config).is_some()
    }
}
