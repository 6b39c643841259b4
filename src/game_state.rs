use crate::card::{Hand, Objective, Payment, TrainColor, NUM_OPEN_TRAIN_CARDS};
use crate::city::City;
use crate::config::BotConfig;
use crate::connectivity::ConnectivityMatrix;
use crate::game_phase::GamePhase;
use crate::map::{ClaimError, Map, Route, RouteId, RouteOwner};

use log::{debug, info, warn};

/// Every player starts the game with 45 wagons.
pub const NUM_WAGONS: u8 = 45;

/// Once a player has this many wagons or fewer, everyone has one turn left.
pub const LAST_TURN_WAGONS: u8 = 2;

/// Points granted to the player with the longest continuous path.
pub const LONGEST_ROUTE_BONUS: i32 = 10;

/// Everything our player knows about the game.
///
/// Wagon counts are derived from the routes claimed on the map, so that
/// `wagons_left == 45 - Σ(length of our routes)` holds at all times.
#[derive(Clone, Debug)]
pub struct GameState {
    map: Map,
    hand: Hand,
    objectives: Vec<Objective>,
    /// Our routes, in the order they were claimed.
    claimed_routes: Vec<RouteId>,
    connectivity: ConnectivityMatrix,
    visible_cards: [Option<TrainColor>; NUM_OPEN_TRAIN_CARDS],
    /// Number of our turns that are over.
    turns_played: u32,
    /// Number of our consecutive turns that ended without claiming a route.
    non_claim_turns: u32,
    /// Number of times we drew objectives, the initial draw included.
    objective_draws: u32,
    last_turn: bool,
}

impl GameState {
    /// Creates the state at the start of a game, from the board and our initial cards.
    pub fn new(map: Map, initial_cards: &[TrainColor]) -> Self {
        let connectivity = ConnectivityMatrix::from_map(&map);
        let mut game_state = Self {
            map,
            hand: Hand::from_cards(initial_cards),
            objectives: Vec::new(),
            claimed_routes: Vec::new(),
            connectivity,
            visible_cards: [None; NUM_OPEN_TRAIN_CARDS],
            turns_played: 0,
            non_claim_turns: 0,
            objective_draws: 0,
            last_turn: false,
        };

        // The board may come with routes already claimed.
        game_state.claimed_routes = game_state
            .map
            .routes_owned_by(RouteOwner::Mine)
            .map(|(route_id, _)| route_id)
            .collect();
        game_state.refresh_last_turn();
        game_state
    }

    #[inline]
    pub fn map(&self) -> &Map {
        &self.map
    }

    #[inline]
    pub fn hand(&self) -> &Hand {
        &self.hand
    }

    #[inline]
    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    #[inline]
    pub fn claimed_routes(&self) -> &[RouteId] {
        &self.claimed_routes
    }

    #[inline]
    pub fn connectivity(&self) -> &ConnectivityMatrix {
        &self.connectivity
    }

    #[inline]
    pub fn visible_cards(&self) -> &[Option<TrainColor>; NUM_OPEN_TRAIN_CARDS] {
        &self.visible_cards
    }

    #[inline]
    pub fn turns_played(&self) -> u32 {
        self.turns_played
    }

    #[inline]
    pub fn non_claim_turns(&self) -> u32 {
        self.non_claim_turns
    }

    #[inline]
    pub fn objective_draws(&self) -> u32 {
        self.objective_draws
    }

    #[inline]
    pub fn is_last_turn(&self) -> bool {
        self.last_turn
    }

    /// How many wagons we have left.
    pub fn wagons_left(&self) -> u8 {
        let used = self.map.total_length_owned_by(RouteOwner::Mine);
        NUM_WAGONS.saturating_sub(used.min(NUM_WAGONS as u16) as u8)
    }

    /// How many wagons the opponent has left.
    pub fn opponent_wagons_left(&self) -> u8 {
        let used = self.map.total_length_owned_by(RouteOwner::Opponent);
        NUM_WAGONS.saturating_sub(used.min(NUM_WAGONS as u16) as u8)
    }

    pub fn phase(&self, config: &BotConfig) -> GamePhase {
        GamePhase::from_progress(
            self.turns_played,
            self.wagons_left(),
            self.last_turn,
            config,
        )
    }

    /// Refreshes the face-up cards.
    pub fn set_visible_cards(&mut self, visible_cards: [Option<TrainColor>; NUM_OPEN_TRAIN_CARDS]) {
        self.visible_cards = visible_cards;
    }

    pub fn is_card_visible(&self, color: TrainColor) -> bool {
        self.visible_cards.contains(&Some(color))
    }

    /// Adds a drawn card to our hand.
    pub fn add_card(&mut self, card: TrainColor) {
        self.hand.add(card);
    }

    /// Adds the objectives we decided to keep after an objective draw.
    pub fn add_objectives(&mut self, objectives: &[Objective]) {
        self.objective_draws += 1;

        for objective in objectives {
            if !self.map.is_valid_city(objective.from) || !self.map.is_valid_city(objective.to) {
                warn!(
                    "Ignoring objective between {} and {}: outside of a board of {} cities.",
                    objective.from,
                    objective.to,
                    self.map.num_cities()
                );
                continue;
            }

            info!(
                "Keeping objective between {} and {} ({} points).",
                objective.from, objective.to, objective.points
            );
            self.objectives.push(*objective);
        }
    }

    /// Marks the end of one of our turns.
    pub fn end_turn(&mut self, claimed_route: bool) {
        self.turns_played += 1;
        if claimed_route {
            self.non_claim_turns = 0;
        } else {
            self.non_claim_turns += 1;
        }
    }

    /// Flags that everyone has one turn left.
    pub fn set_last_turn(&mut self) {
        self.last_turn = true;
    }

    fn refresh_last_turn(&mut self) {
        if self.wagons_left() <= LAST_TURN_WAGONS || self.opponent_wagons_left() <= LAST_TURN_WAGONS
        {
            if !self.last_turn {
                info!("Last turn: a player has {} wagons or fewer.", LAST_TURN_WAGONS);
            }
            self.last_turn = true;
        }
    }

    /// Verifies that we can claim a route with the given payment, without changing anything.
    pub fn validate_claim(&self, route_id: RouteId, payment: &Payment) -> Result<&Route, ClaimError> {
        let route = self
            .map
            .route(route_id)
            .ok_or(ClaimError::UnknownRoute(route_id))?;

        for city in [route.from, route.to] {
            if !self.map.is_valid_city(city) {
                return Err(ClaimError::CityOutOfRange {
                    city,
                    num_cities: self.map.num_cities(),
                });
            }
        }

        if route.is_claimed() {
            return Err(ClaimError::AlreadyClaimed(route.from, route.to));
        }

        if payment.total() != route.length {
            return Err(ClaimError::WrongNumberOfCards(
                route.from,
                route.to,
                route.length,
                payment.total(),
            ));
        }

        if !route.accepts(payment.color) || (payment.color.is_wild() && payment.colored_cards > 0)
        {
            return Err(ClaimError::ColorMismatch {
                route_color: route.color,
                color: payment.color,
            });
        }

        let wagons_left = self.wagons_left();
        if route.length > wagons_left {
            return Err(ClaimError::NotEnoughWagons {
                length: route.length,
                wagons_left,
            });
        }

        if self.hand.wild_cards() < payment.wild_cards {
            return Err(ClaimError::NotEnoughCards {
                color: TrainColor::Wild,
                needed: payment.wild_cards,
                available: self.hand.wild_cards(),
            });
        }

        if payment.colored_cards > 0 && self.hand.count(payment.color) < payment.colored_cards {
            return Err(ClaimError::NotEnoughCards {
                color: payment.color,
                needed: payment.colored_cards,
                available: self.hand.count(payment.color),
            });
        }

        Ok(route)
    }

    /// Claims a route for us.
    ///
    /// Everything is validated first. Then, in this order: the route's owner is set,
    /// the cards are spent, and connectivity is recomputed.
    /// The caller is in charge of invalidating any path cache afterwards.
    pub fn claim_for_self(&mut self, route_id: RouteId, payment: &Payment) -> Result<(), ClaimError> {
        self.validate_claim(route_id, payment)?;

        self.map.claim_route(route_id, RouteOwner::Mine)?;
        self.hand.spend(payment)?;
        self.connectivity.recompute(&self.map);
        self.claimed_routes.push(route_id);
        self.refresh_last_turn();

        debug!(
            "Claimed route {} with {} {} cards and {} wild cards, {} wagons left.",
            route_id,
            payment.colored_cards,
            payment.color,
            payment.wild_cards,
            self.wagons_left()
        );
        Ok(())
    }

    /// Records a route claimed by the opponent.
    pub fn record_opponent_claim(&mut self, route_id: RouteId) -> Result<&Route, ClaimError> {
        self.map.claim_route(route_id, RouteOwner::Opponent)?;
        self.refresh_last_turn();

        self.map
            .route(route_id)
            .ok_or(ClaimError::UnknownRoute(route_id))
    }

    /// Every unclaimed route we could claim right now, with how we would pay for it.
    pub fn claimable_routes(&self) -> Vec<(RouteId, Payment)> {
        let wagons_left = self.wagons_left();

        self.map
            .routes()
            .iter()
            .enumerate()
            .filter(|(_, route)| !route.is_claimed() && route.length <= wagons_left)
            .filter_map(|(route_id, route)| {
                self.hand
                    .payment_for(route)
                    .map(|payment| (route_id, payment))
            })
            .collect()
    }

    /// Whether the two cities of an objective are connected through our routes.
    #[inline]
    pub fn is_objective_completed(&self, objective: &Objective) -> bool {
        self.connectivity.is_connected(objective.from, objective.to)
    }

    /// Points an objective would bring if the game ended now: positive if completed,
    /// negative otherwise.
    pub fn objective_contribution(&self, objective: &Objective) -> i32 {
        if self.is_objective_completed(objective) {
            objective.points as i32
        } else {
            -(objective.points as i32)
        }
    }

    /// Whether every objective we hold is completed. Trivially true without objectives.
    pub fn all_objectives_completed(&self) -> bool {
        self.objectives
            .iter()
            .all(|objective| self.is_objective_completed(objective))
    }

    /// How many of our routes touch a city.
    pub fn num_owned_routes_at(&self, city: City) -> usize {
        self.map.num_routes_owned_at(city, RouteOwner::Mine)
    }

    /// Points earned from our routes alone.
    pub fn route_points(&self) -> i32 {
        self.map
            .routes_owned_by(RouteOwner::Mine)
            .map(|(_, route)| Map::calculate_points_for_claimed_route(route.length) as i32)
            .sum()
    }

    /// Our score if the game ended now: route points, objective contributions, and the
    /// longest path bonus if our longest path is at least as long as the opponent's.
    pub fn projected_score(&self) -> i32 {
        let objectives: i32 = self
            .objectives
            .iter()
            .map(|objective| self.objective_contribution(objective))
            .sum();

        let longest_route = self.map.get_longest_route(RouteOwner::Mine);
        let bonus = if longest_route > 0
            && longest_route >= self.map.get_longest_route(RouteOwner::Opponent)
        {
            LONGEST_ROUTE_BONUS
        } else {
            0
        };

        self.route_points() + objectives + bonus
    }

    /// What [`GameState::projected_score`] would be after claiming a route, or `None` if the
    /// claim is not possible.
    pub fn projected_score_with(&self, route_id: RouteId, payment: &Payment) -> Option<i32> {
        let mut state = self.clone();
        state.claim_for_self(route_id, payment).ok()?;
        Some(state.projected_score())
    }
}
