//! A game from our player's point of view: the state, the opponent model and the path cache,
//! and the loop deciding each move.

use crate::arbiter::{self, Priority, TurnContext};
use crate::card::{Objective, Payment, TrainColor, NUM_DRAWN_OBJECTIVES};
use crate::city::City;
use crate::config::BotConfig;
use crate::critical::{identify_critical_routes, objective_progress};
use crate::evaluator::select_objectives;
use crate::executor::{emergency_move, execute, second_draw, PlannedMove};
use crate::game_state::GameState;
use crate::map::{ClaimError, Map, RouteId};
use crate::moves::{BoardState, MoveData, MoveResult, OpponentMoveData};
use crate::opponent::OpponentModel;
use crate::pathfinding::PathCache;

use log::{debug, info, warn};
use smallvec::SmallVec;

/// One game in progress.
///
/// Every piece of mutable state lives here, so that independent games never interfere.
///
/// # Example
/// ```
/// use ticket_to_ride_ai::card::TrainColor;
/// use ticket_to_ride_ai::config::BotConfig;
/// use ticket_to_ride_ai::map::{Map, Route};
/// use ticket_to_ride_ai::moves::{MoveData, MoveResult};
/// use ticket_to_ride_ai::session::Session;
///
/// let map = Map::new(3, vec![
///     Route::new(0, 1, 2, TrainColor::Red, None),
///     Route::new(1, 2, 3, TrainColor::Blue, None),
/// ]).unwrap();
/// let mut session = Session::new(map, &[TrainColor::Red, TrainColor::Red], BotConfig::default());
///
/// // Without objectives, the first move is always to draw some.
/// assert_eq!(session.decide(), MoveData::DrawObjectives);
/// session.apply_move_result(Ok(MoveResult {
///     objectives: vec![ticket_to_ride_ai::objective!(0, 2, 10)],
///     ..MoveResult::default()
/// }));
/// assert_eq!(session.decide(), MoveData::ChooseObjectives([true, false, false]));
/// ```
#[derive(Clone, Debug)]
pub struct Session {
    config: BotConfig,
    state: GameState,
    opponent: OpponentModel,
    cache: PathCache,
    /// The move awaiting its result.
    last_move: Option<MoveData>,
    /// The route and payment behind `last_move`, when it is a claim.
    pending_claim: Option<(RouteId, Payment)>,
    /// Objectives offered to us, awaiting our choice.
    offered_objectives: Vec<Objective>,
    keep_all_offered: bool,
    awaiting_second_draw: bool,
    blind_draw_refused: bool,
    /// Face-up colors refused by the server during the current turn.
    refused_visible_cards: SmallVec<[TrainColor; 5]>,
    /// Routes refused by the server during the current turn.
    rejected_routes: Vec<RouteId>,
    /// Priorities whose move was refused by the server during the current turn.
    rejected_priorities: SmallVec<[Priority; 5]>,
    objectives_exhausted: bool,
    game_over: Option<String>,
}

impl Session {
    pub fn new(map: Map, initial_cards: &[TrainColor], config: BotConfig) -> Self {
        let opponent = OpponentModel::new(map.num_cities());

        Self {
            config,
            state: GameState::new(map, initial_cards),
            opponent,
            cache: PathCache::new(),
            last_move: None,
            pending_claim: None,
            offered_objectives: Vec::new(),
            keep_all_offered: false,
            awaiting_second_draw: false,
            blind_draw_refused: false,
            refused_visible_cards: SmallVec::new(),
            rejected_routes: Vec::new(),
            rejected_priorities: SmallVec::new(),
            objectives_exhausted: false,
            game_over: None,
        }
    }

    #[inline]
    pub fn state(&self) -> &GameState {
        &self.state
    }

    #[inline]
    pub fn opponent(&self) -> &OpponentModel {
        &self.opponent
    }

    #[inline]
    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    #[inline]
    pub fn cache(&self) -> &PathCache {
        &self.cache
    }

    #[inline]
    pub fn is_game_over(&self) -> bool {
        self.game_over.is_some()
    }

    /// The message received with the end of the game.
    pub fn game_over_message(&self) -> Option<&str> {
        self.game_over.as_deref()
    }

    /// Refreshes the face-up cards. Must be called at the start of each of our turns.
    pub fn update_board(&mut self, board_state: &BoardState) {
        self.state.set_visible_cards(board_state.visible_cards);
    }

    /// Objectives offered without us asking, such as at the very start of a game.
    pub fn offer_objectives(&mut self, objectives: Vec<Objective>) {
        self.offered_objectives = objectives;
        self.keep_all_offered = false;
    }

    /// Flags that everyone has one turn left.
    pub fn set_last_turn(&mut self) {
        self.state.set_last_turn();
    }

    /// Decides our next move.
    ///
    /// The move is remembered until its result is given to [`Session::apply_move_result`].
    pub fn decide(&mut self) -> MoveData {
        let PlannedMove { move_data, claim } = self.next_move();
        debug!("Next move: {:?}", move_data);

        self.last_move = Some(move_data.clone());
        self.pending_claim = claim;
        move_data
    }

    fn next_move(&mut self) -> PlannedMove {
        if self.game_over.is_some() {
            warn!("Asked for a move after the end of the game.");
            return MoveData::DrawBlindCard.into();
        }

        if !self.offered_objectives.is_empty() {
            return MoveData::ChooseObjectives(self.choose_offered_objectives()).into();
        }

        let progress = objective_progress(&self.state, &mut self.cache, &self.config.path_limits());
        let critical_routes =
            identify_critical_routes(&self.state, &progress, &self.config, &self.rejected_routes);
        let ctx = TurnContext {
            state: &self.state,
            opponent: &self.opponent,
            config: &self.config,
            progress: &progress,
            critical_routes: &critical_routes,
            excluded_routes: &self.rejected_routes,
            blind_draw_refused: self.blind_draw_refused,
            refused_visible_cards: &self.refused_visible_cards,
        };

        if self.awaiting_second_draw {
            return second_draw(&ctx).into();
        }

        let mut disallowed = self.rejected_priorities.clone();
        if self.objectives_exhausted {
            disallowed.push(Priority::DrawObjectives);
        }

        for _ in 0..=self.config.max_reevaluations {
            let plan = match arbiter::plan(&ctx, &disallowed) {
                Some(plan) => plan,
                None => break,
            };

            match execute(&ctx, &plan) {
                Some(next_move) => return next_move,
                None => {
                    debug!("{:?} cannot be acted upon, re-evaluating.", plan.priority);
                    disallowed.push(plan.priority);
                }
            }
        }

        emergency_move(&ctx)
    }

    fn choose_offered_objectives(&mut self) -> [bool; NUM_DRAWN_OBJECTIVES] {
        if self.keep_all_offered {
            let mut choices = [false; NUM_DRAWN_OBJECTIVES];
            for choice in choices.iter_mut().take(self.offered_objectives.len()) {
                *choice = true;
            }
            return choices;
        }

        let first_draw = self.state.objective_draws() == 0;
        select_objectives(
            &self.state,
            &self.opponent,
            &mut self.cache,
            &self.config,
            &self.offered_objectives,
            first_draw,
        )
    }

    /// The route the server would pick for a claim between two cities with a given color.
    fn claimed_route(
        &self,
        (from, to): (City, City),
        color: TrainColor,
    ) -> Result<RouteId, ClaimError> {
        self.state.map().find_claimable_route((from, to), color)
    }

    fn end_turn(&mut self, claimed_route: bool) {
        self.state.end_turn(claimed_route);
        self.awaiting_second_draw = false;
        self.blind_draw_refused = false;
        self.refused_visible_cards.clear();
        self.rejected_routes.clear();
        self.rejected_priorities.clear();
    }

    /// Applies the outcome of the last move returned by [`Session::decide`].
    ///
    /// A refused move (`Err`) does not end the turn: the next decision avoids it.
    pub fn apply_move_result(&mut self, result: Result<MoveResult, String>) {
        let pending_claim = self.pending_claim.take();
        let last_move = match self.last_move.take() {
            Some(last_move) => last_move,
            None => {
                warn!("Received a move result without any pending move.");
                return;
            }
        };

        let result = match result {
            Ok(result) => result,
            Err(message) => {
                self.on_rejected_move(&last_move, pending_claim, &message);
                return;
            }
        };

        match last_move {
            MoveData::ClaimRoute { from, to, .. } => self.commit_claim((from, to), pending_claim),
            MoveData::DrawVisibleCard(_) | MoveData::DrawBlindCard => {
                match result.card {
                    Some(card) => self.state.add_card(card),
                    None => warn!("No card was reported after a draw."),
                }

                if self.awaiting_second_draw || !result.replay {
                    self.end_turn(false);
                } else {
                    self.awaiting_second_draw = true;
                }
            }
            MoveData::DrawObjectives => {
                if result.objectives.is_empty() {
                    warn!("No objective left to draw.");
                    self.objectives_exhausted = true;
                    self.end_turn(false);
                } else {
                    self.offer_objectives(result.objectives);
                }
            }
            MoveData::ChooseObjectives(choices) => {
                let kept: Vec<Objective> = self
                    .offered_objectives
                    .iter()
                    .zip(choices.iter())
                    .filter(|(_, kept)| **kept)
                    .map(|(objective, _)| *objective)
                    .collect();

                self.state.add_objectives(&kept);
                self.offered_objectives.clear();
                self.keep_all_offered = false;
                self.end_turn(false);
            }
        }

        if let Some(message) = result.message {
            info!("Game over: {}", message);
            self.game_over = Some(message);
        }
    }

    fn commit_claim(&mut self, cities: (City, City), pending_claim: Option<(RouteId, Payment)>) {
        let (route_id, payment) = match pending_claim {
            Some(pending_claim) => pending_claim,
            None => {
                warn!(
                    "Our claim between {} and {} went through, but its route is unknown.",
                    cities.0, cities.1
                );
                self.end_turn(true);
                return;
            }
        };

        match self.state.claim_for_self(route_id, &payment) {
            Ok(()) => {
                self.cache.invalidate();
                info!(
                    "Claimed route {} between {} and {}, {} wagons left.",
                    route_id,
                    cities.0,
                    cities.1,
                    self.state.wagons_left()
                );
            }
            Err(error) => warn!("Our claim went through, but cannot be recorded: {}", error),
        }
        self.end_turn(true);
    }

    fn on_rejected_move(
        &mut self,
        last_move: &MoveData,
        pending_claim: Option<(RouteId, Payment)>,
        message: &str,
    ) {
        warn!("{:?} was refused: {}", last_move, message);

        match last_move {
            MoveData::ClaimRoute { .. } => match pending_claim {
                Some((route_id, _)) => self.rejected_routes.push(route_id),
                None => self.rejected_priorities.push(Priority::BuildNetwork),
            },
            MoveData::DrawVisibleCard(color) => self.refused_visible_cards.push(*color),
            MoveData::DrawBlindCard => {
                self.blind_draw_refused = true;
                self.rejected_priorities.push(Priority::DrawCards);
            }
            MoveData::DrawObjectives => {
                self.objectives_exhausted = true;
            }
            MoveData::ChooseObjectives(_) => self.keep_all_offered = true,
        }
    }

    /// Records a move of the opponent.
    pub fn observe_opponent(&mut self, opponent_move: &OpponentMoveData) {
        match opponent_move {
            OpponentMoveData::ClaimRoute { from, to, color } => {
                let route_id = match self.claimed_route((*from, *to), *color) {
                    Ok(route_id) => route_id,
                    Err(error) => {
                        warn!("Cannot record the opponent's claim: {}", error);
                        return;
                    }
                };

                let connectivity = self.state.connectivity();
                let near_our_network =
                    connectivity.is_in_network(*from) || connectivity.is_in_network(*to);

                let length = match self.state.record_opponent_claim(route_id) {
                    Ok(route) => route.length,
                    Err(error) => {
                        warn!("Cannot record the opponent's claim: {}", error);
                        return;
                    }
                };
                self.cache.invalidate();

                self.opponent.on_claim(
                    self.state.map(),
                    (*from, *to),
                    length,
                    near_our_network,
                    &self.config,
                );
            }
            OpponentMoveData::DrawVisibleCard(color) => {
                self.opponent
                    .on_card_draw(self.state.map(), color.is_wild(), &self.config)
            }
            OpponentMoveData::DrawBlindCard => {
                self.opponent
                    .on_card_draw(self.state.map(), false, &self.config)
            }
            OpponentMoveData::DrawObjectives => {
                self.opponent.on_objective_draw(self.state.map(), &self.config)
            }
            OpponentMoveData::ChooseObjectives(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::TrainColor::*;
    use crate::map::{Route, RouteOwner};
    use crate::objective;
    use crate::test_utils::{init_logger, sample_map};
    use pretty_assertions::assert_eq;

    fn session_with_objective(cards: &[TrainColor]) -> Session {
        let mut session = Session::new(sample_map(), cards, BotConfig::default());
        session.offer_objectives(vec![objective!(0, 2, 8)]);
        assert_eq!(session.decide(), MoveData::ChooseObjectives([true, false, false]));
        session.apply_move_result(Ok(MoveResult::default()));
        session
    }

    #[test]
    fn objective_draw_flow() {
        init_logger();
        let mut session = Session::new(sample_map(), &[], BotConfig::default());

        assert_eq!(session.decide(), MoveData::DrawObjectives);
        session.apply_move_result(Ok(MoveResult {
            objectives: vec![objective!(0, 2, 8), objective!(1, 5, 4), objective!(3, 7, 5)],
            ..MoveResult::default()
        }));

        let choices = match session.decide() {
            MoveData::ChooseObjectives(choices) => choices,
            other => panic!("Unexpected move {:?}", other),
        };
        assert!(choices.iter().filter(|kept| **kept).count() >= 2);

        session.apply_move_result(Ok(MoveResult::default()));
        assert_eq!(
            session.state().objectives().len(),
            choices.iter().filter(|kept| **kept).count()
        );
        assert_eq!(session.state().turns_played(), 1);
        assert_eq!(session.state().objective_draws(), 1);
    }

    #[test]
    fn claim_flow() {
        init_logger();
        let mut session = session_with_objective(&[Red, Red]);
        let version = session.cache().version();

        assert_eq!(
            session.decide(),
            MoveData::ClaimRoute {
                from: 0,
                to: 1,
                color: Red,
                wild_cards: 0
            }
        );
        session.apply_move_result(Ok(MoveResult::default()));

        assert_eq!(
            session.state().map().route(0).map(|route| route.owner()),
            Some(RouteOwner::Mine)
        );
        assert_eq!(session.state().hand().total(), 0);
        assert_eq!(session.state().non_claim_turns(), 0);
        assert!(session.cache().version() > version);
    }

    #[test]
    fn rejected_claim_is_not_repeated() {
        init_logger();
        let mut session = session_with_objective(&[Red, Red]);

        let first = session.decide();
        assert!(first.is_claim());
        session.apply_move_result(Err(String::from("Route already taken.")));

        let second = session.decide();
        assert_ne!(second, first);
        assert_eq!(session.state().turns_played(), 1);
    }

    #[test]
    fn second_draw_never_takes_wild() {
        init_logger();
        let mut session = session_with_objective(&[]);
        session.update_board(&BoardState {
            visible_cards: [Some(Wild), Some(Blue), None, None, None],
        });

        let first = session.decide();
        assert_eq!(first, MoveData::DrawVisibleCard(Wild));
        // Taking a visible wild card ends the turn.
        session.apply_move_result(Ok(MoveResult {
            card: Some(Wild),
            ..MoveResult::default()
        }));
        assert_eq!(session.state().turns_played(), 2);

        session.update_board(&BoardState {
            visible_cards: [Some(Wild), Some(Blue), None, None, None],
        });
        assert_eq!(session.decide(), MoveData::DrawVisibleCard(Wild));
        session.apply_move_result(Ok(MoveResult {
            card: Some(Wild),
            replay: true,
            ..MoveResult::default()
        }));

        assert_eq!(session.decide(), MoveData::DrawVisibleCard(Blue));
        session.apply_move_result(Ok(MoveResult {
            card: Some(Blue),
            replay: true,
            ..MoveResult::default()
        }));
        assert_eq!(session.state().turns_played(), 3);
        assert_eq!(session.state().hand().total(), 3);
    }

    #[test]
    fn rejected_visible_draw_becomes_blind() {
        let mut session = session_with_objective(&[]);
        session.update_board(&BoardState {
            visible_cards: [Some(Wild), None, None, None, None],
        });

        assert_eq!(session.decide(), MoveData::DrawVisibleCard(Wild));
        session.apply_move_result(Err(String::from("No such card.")));
        assert_eq!(session.decide(), MoveData::DrawBlindCard);
    }

    #[test]
    fn refused_blind_draw_takes_a_face_up_card() {
        init_logger();
        let mut session = session_with_objective(&[]);
        session.update_board(&BoardState {
            visible_cards: [None, Some(Green), None, Some(Pink), None],
        });

        // Neither red nor blue is face up.
        assert_eq!(session.decide(), MoveData::DrawBlindCard);
        session.apply_move_result(Err(String::from("The deck is empty.")));

        assert_eq!(session.decide(), MoveData::DrawVisibleCard(Green));
        session.apply_move_result(Err(String::from("No such card.")));
        assert_eq!(session.decide(), MoveData::DrawVisibleCard(Pink));
        session.apply_move_result(Ok(MoveResult {
            card: Some(Pink),
            replay: true,
            ..MoveResult::default()
        }));

        // The second card is taken face up as well.
        session.update_board(&BoardState {
            visible_cards: [Some(Wild), Some(Orange), None, None, None],
        });
        assert_eq!(session.decide(), MoveData::DrawVisibleCard(Orange));
        session.apply_move_result(Ok(MoveResult {
            card: Some(Orange),
            ..MoveResult::default()
        }));
        assert_eq!(session.state().turns_played(), 2);

        // Refusals only last for the turn.
        session.update_board(&BoardState {
            visible_cards: [None, Some(Green), None, Some(Pink), None],
        });
        assert_eq!(session.decide(), MoveData::DrawBlindCard);
    }

    fn parallel_routes_session() -> Session {
        let map = Map::new(
            2,
            vec![Route::new(0, 1, 2, Wild, None), Route::new(0, 1, 2, Red, None)],
        )
        .unwrap();
        let mut session = Session::new(map, &[Red, Red], BotConfig::default());
        session.offer_objectives(vec![objective!(0, 1, 5)]);
        session.decide();
        session.apply_move_result(Ok(MoveResult::default()));
        session
    }

    #[test]
    fn claims_commit_the_planned_parallel_route() {
        init_logger();
        let mut session = parallel_routes_session();

        let claim = MoveData::ClaimRoute {
            from: 0,
            to: 1,
            color: Red,
            wild_cards: 0,
        };
        assert_eq!(session.decide(), claim);
        session.apply_move_result(Ok(MoveResult::default()));

        // The gray route was planned, so the red one stays open.
        let owners: Vec<RouteOwner> = (0..2)
            .filter_map(|route_id| session.state().map().route(route_id))
            .map(|route| route.owner())
            .collect();
        assert_eq!(owners, vec![RouteOwner::Mine, RouteOwner::Unclaimed]);
        assert_eq!(session.state().hand().total(), 0);
    }

    #[test]
    fn refused_parallel_route_is_not_claimed_again() {
        init_logger();
        let mut session = parallel_routes_session();

        let first = session.decide();
        assert!(first.is_claim());
        session.apply_move_result(Err(String::from("Route already taken.")));
        assert_eq!(session.rejected_routes, vec![0]);

        let second = session.decide();
        assert_ne!(second, first);
        assert_eq!(session.state().turns_played(), 1);
    }

    #[test]
    fn opponent_claim_invalidates_cache() {
        init_logger();
        let mut session = session_with_objective(&[]);
        let version = session.cache().version();

        session.observe_opponent(&OpponentMoveData::ClaimRoute {
            from: 1,
            to: 0,
            color: Red,
        });

        assert_eq!(
            session.state().map().route(0).map(|route| route.owner()),
            Some(RouteOwner::Opponent)
        );
        assert!(session.cache().version() > version);
        assert_eq!(session.opponent().stats().claims, 1);
        assert_eq!(session.opponent().visits(0), 1);

        // Unknown route: ignored.
        session.observe_opponent(&OpponentMoveData::ClaimRoute {
            from: 0,
            to: 7,
            color: Red,
        });
        assert_eq!(session.opponent().stats().claims, 1);
    }

    #[test]
    fn opponent_draws_are_counted() {
        let mut session = Session::new(sample_map(), &[], BotConfig::default());
        session.observe_opponent(&OpponentMoveData::DrawBlindCard);
        session.observe_opponent(&OpponentMoveData::DrawVisibleCard(Wild));
        session.observe_opponent(&OpponentMoveData::DrawObjectives);
        session.observe_opponent(&OpponentMoveData::ChooseObjectives([true, true, false]));

        assert_eq!(session.opponent().stats().card_draws, 2);
        assert_eq!(session.opponent().stats().objective_draws, 1);
    }

    #[test]
    fn rejected_objective_choice_keeps_everything() {
        let mut session = Session::new(sample_map(), &[], BotConfig::default());
        session.offer_objectives(vec![objective!(0, 2, 8), objective!(0, 7, 20)]);

        assert!(matches!(session.decide(), MoveData::ChooseObjectives(_)));
        session.apply_move_result(Err(String::from("Invalid choice.")));
        assert_eq!(
            session.decide(),
            MoveData::ChooseObjectives([true, true, false])
        );
    }

    #[test]
    fn exhausted_objectives_are_not_drawn_again() {
        let mut session = Session::new(sample_map(), &[], BotConfig::default());

        assert_eq!(session.decide(), MoveData::DrawObjectives);
        session.apply_move_result(Err(String::from("No objective left.")));
        assert_ne!(session.decide(), MoveData::DrawObjectives);
    }

    #[test]
    fn game_over() {
        let mut session = session_with_objective(&[]);

        session.decide();
        session.apply_move_result(Ok(MoveResult {
            card: Some(Red),
            message: Some(String::from("We won!")),
            ..MoveResult::default()
        }));

        assert!(session.is_game_over());
        assert_eq!(session.game_over_message(), Some("We won!"));
        assert_eq!(session.decide(), MoveData::DrawBlindCard);
    }

    #[test]
    fn result_without_move_is_ignored() {
        let mut session = Session::new(sample_map(), &[], BotConfig::default());
        session.apply_move_result(Ok(MoveResult::default()));

        assert_eq!(session.state().turns_played(), 0);
    }
}
