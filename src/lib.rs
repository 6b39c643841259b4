//! Decision core of a Ticket to Ride player: tracks a two-player game from our side, models the
//! opponent, and picks a legal move every turn.
//!
//! A game is driven through [`session::Session`]: feed it the board and the opponent's moves,
//! ask it for a move with [`session::Session::decide`], and report the server's answer with
//! [`session::Session::apply_move_result`].

pub mod arbiter;
pub mod card;
pub mod city;
pub mod config;
pub mod connectivity;
pub mod critical;
pub mod evaluator;
pub mod executor;
pub mod game_phase;
pub mod game_state;
pub mod map;
pub mod moves;
pub mod opponent;
pub mod pathfinding;
pub mod session;

#[cfg(test)]
mod test_utils;

#[macro_use]
extern crate smallvec;
