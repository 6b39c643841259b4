use crate::card::TrainColor;
use crate::city::{City, CityToCity, MAX_CITIES};

use array_init::array_init;
use lazy_static::lazy_static;
use serde_repr::{Deserialize_repr, Serialize_repr};
use smallvec::SmallVec;
use std::cmp::max;
use std::collections::HashSet;
use std::sync::{mpsc, Arc, Mutex};
use threadpool::ThreadPool;

lazy_static! {
    static ref THREAD_POOL: Mutex<ThreadPool> = Mutex::new(ThreadPool::default());
}

/// Inline capacity of the per-city route lists. Cities with more neighbors spill to the heap.
const MAX_ROUTES_PER_CITY: usize = 8;

/// The longest a single route can be.
pub const MAX_ROUTE_LENGTH: u8 = 6;

/// Routes are identified by their index in the board table.
pub type RouteId = usize;

/// Who claimed a route.
///
/// # JSON
/// Owners are serialized as an 8-bit unsigned integer.
#[derive(Clone, Copy, Debug, Deserialize_repr, Eq, Hash, PartialEq, Serialize_repr)]
#[repr(u8)]
pub enum RouteOwner {
    Unclaimed = 0,
    Mine = 1,
    Opponent = 2,
}

/// Reasons for which a claim is refused.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ClaimError {
    #[error("No route exists with id {0}.")]
    UnknownRoute(RouteId),
    #[error("City {city} does not exist on a board of {num_cities} cities.")]
    CityOutOfRange { city: City, num_cities: usize },
    #[error("No unclaimed route between {0} and {1} accepts that color.")]
    NoMatchingRoute(City, City),
    #[error("The selected route between {0} and {1} is already claimed.")]
    AlreadyClaimed(City, City),
    #[error("A route cannot be claimed on behalf of nobody.")]
    InvalidOwner,
    #[error("Cannot claim a route of color {route_color} with {color} cards.")]
    ColorMismatch {
        route_color: TrainColor,
        color: TrainColor,
    },
    #[error("A route between {0} and {1} needs {2} cards, but {3} were provided.")]
    WrongNumberOfCards(City, City, u8, u8),
    #[error("Cannot claim a route using {needed} {color} cards, whilst having only {available} left.")]
    NotEnoughCards {
        color: TrainColor,
        needed: u8,
        available: u8,
    },
    #[error("Cannot claim a route of length {length}, whilst having only {wagons_left} wagons left.")]
    NotEnoughWagons { length: u8, wagons_left: u8 },
}

/// A route between two cities.
///
/// There can be multiple "parallel" routes between two cities; each has its own id.
#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    pub from: City,
    pub to: City,
    /// The distance between two cities. This is analogous to the number of train cards needed to claim the route.
    pub length: u8,
    /// The color of this specific route.
    /// The `Wild` color means that any color matches (a *gray* route).
    pub color: TrainColor,
    /// Some routes can be claimed with either of two colors.
    pub second_color: Option<TrainColor>,
    /// Write-once: a claimed route never goes back to `Unclaimed`.
    owner: RouteOwner,
}

impl Route {
    /// Returns an unclaimed `Route`.
    pub fn new(
        from: City,
        to: City,
        length: u8,
        color: TrainColor,
        second_color: Option<TrainColor>,
    ) -> Self {
        Self {
            from,
            to,
            length,
            color,
            second_color,
            owner: RouteOwner::Unclaimed,
        }
    }

    #[inline]
    pub fn owner(&self) -> RouteOwner {
        self.owner
    }

    #[inline]
    pub fn is_claimed(&self) -> bool {
        self.owner != RouteOwner::Unclaimed
    }

    #[inline]
    pub fn is_mine(&self) -> bool {
        self.owner == RouteOwner::Mine
    }

    #[inline]
    pub fn is_opponent(&self) -> bool {
        self.owner == RouteOwner::Opponent
    }

    #[inline]
    pub fn cities(&self) -> CityToCity {
        (self.from, self.to)
    }

    #[inline]
    pub fn touches(&self, city: City) -> bool {
        self.from == city || self.to == city
    }

    /// The city at the other end of the route, if `city` is one of its ends.
    #[inline]
    pub fn other_end(&self, city: City) -> Option<City> {
        if self.from == city {
            Some(self.to)
        } else if self.to == city {
            Some(self.from)
        } else {
            None
        }
    }

    #[inline]
    pub fn connects(&self, (start, end): CityToCity) -> bool {
        (self.from == start && self.to == end) || (self.from == end && self.to == start)
    }

    /// Whether cards of the given color can be used to claim this route.
    ///
    /// # Example
    /// ```
    /// use ticket_to_ride_ai::card::TrainColor;
    /// use ticket_to_ride_ai::map::Route;
    ///
    /// let route = Route::new(0, 1, 3, TrainColor::Red, Some(TrainColor::Blue));
    /// assert!(route.accepts(TrainColor::Blue));
    /// assert!(route.accepts(TrainColor::Wild));
    /// assert!(!route.accepts(TrainColor::Green));
    /// ```
    pub fn accepts(&self, color: TrainColor) -> bool {
        color.is_wild()
            || self.color.is_wild()
            || self.color == color
            || self.second_color == Some(color)
    }
}

/// The shared board of a game, as seen by our player.
/// This is mutated as players claim routes throughout the game.
#[derive(Clone, Debug)]
pub struct Map {
    num_cities: usize,
    routes: Vec<Route>,
    /// Maps each city to the routes touching it.
    routes_by_city: [SmallVec<[RouteId; MAX_ROUTES_PER_CITY]>; MAX_CITIES],
}

impl Map {
    /// Generates a `Map` from the board table.
    ///
    /// Fails if there are more than [`MAX_CITIES`] cities, or if a route is malformed
    /// (unknown city, loop, or length outside of `1..=6`).
    ///
    /// # Example
    /// ```
    /// use ticket_to_ride_ai::card::TrainColor;
    /// use ticket_to_ride_ai::map::{Map, Route};
    ///
    /// let map = Map::new(3, vec![Route::new(0, 1, 2, TrainColor::Red, None)]);
    /// assert!(map.is_ok());
    ///
    /// let map = Map::new(3, vec![Route::new(0, 3, 2, TrainColor::Red, None)]);
    /// assert!(map.is_err());
    /// ```
    pub fn new(num_cities: usize, routes: Vec<Route>) -> Result<Self, String> {
        if num_cities == 0 || num_cities > MAX_CITIES {
            return Err(format!(
                "Cannot create a board with {} cities: one must have at least one, and at most {} cities.",
                num_cities, MAX_CITIES
            ));
        }

        let mut routes_by_city: [SmallVec<[RouteId; MAX_ROUTES_PER_CITY]>; MAX_CITIES] =
            array_init(|_| SmallVec::new());

        for (route_id, route) in routes.iter().enumerate() {
            if route.from >= num_cities || route.to >= num_cities {
                return Err(format!(
                    "Route {} between {} and {} references a city outside of the board.",
                    route_id, route.from, route.to
                ));
            }

            if route.from == route.to {
                return Err(format!(
                    "Route {} starts and ends at the same city {}.",
                    route_id, route.from
                ));
            }

            if route.length == 0 || route.length > MAX_ROUTE_LENGTH {
                return Err(format!(
                    "Route {} between {} and {} has an invalid length of {}.",
                    route_id, route.from, route.to, route.length
                ));
            }

            routes_by_city[route.from].push(route_id);
            routes_by_city[route.to].push(route_id);
        }

        Ok(Self {
            num_cities,
            routes,
            routes_by_city,
        })
    }

    #[inline]
    pub fn num_cities(&self) -> usize {
        self.num_cities
    }

    #[inline]
    pub fn num_routes(&self) -> usize {
        self.routes.len()
    }

    #[inline]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    #[inline]
    pub fn route(&self, route_id: RouteId) -> Option<&Route> {
        self.routes.get(route_id)
    }

    #[inline]
    pub fn is_valid_city(&self, city: City) -> bool {
        city < self.num_cities
    }

    /// All routes touching a city, with their id.
    /// An unknown city has no routes.
    pub fn routes_from(&self, city: City) -> impl Iterator<Item = (RouteId, &Route)> + '_ {
        let route_ids: &[RouteId] = if city < self.num_cities {
            &self.routes_by_city[city]
        } else {
            &[]
        };

        route_ids
            .iter()
            .map(move |route_id| (*route_id, &self.routes[*route_id]))
    }

    /// The "parallel" routes between two adjacent cities.
    pub fn routes_between(
        &self,
        start: City,
        end: City,
    ) -> impl Iterator<Item = (RouteId, &Route)> + '_ {
        self.routes_from(start)
            .filter(move |(_, route)| route.other_end(start) == Some(end))
    }

    /// All routes claimed by `owner`, with their id.
    pub fn routes_owned_by(&self, owner: RouteOwner) -> impl Iterator<Item = (RouteId, &Route)> + '_ {
        self.routes
            .iter()
            .enumerate()
            .filter(move |(_, route)| route.owner == owner)
    }

    /// How many routes claimed by `owner` touch a city.
    pub fn num_routes_owned_at(&self, city: City, owner: RouteOwner) -> usize {
        self.routes_from(city)
            .filter(|(_, route)| route.owner == owner)
            .count()
    }

    /// Sum of the length of all routes claimed by `owner`.
    pub fn total_length_owned_by(&self, owner: RouteOwner) -> u16 {
        self.routes_owned_by(owner)
            .map(|(_, route)| route.length as u16)
            .sum()
    }

    /// Finds the unclaimed route between two cities which can be claimed with the given color.
    ///
    /// A route of exactly that color is preferred over a gray one.
    pub fn find_claimable_route(
        &self,
        (start, end): CityToCity,
        color: TrainColor,
    ) -> Result<RouteId, ClaimError> {
        for city in [start, end] {
            if !self.is_valid_city(city) {
                return Err(ClaimError::CityOutOfRange {
                    city,
                    num_cities: self.num_cities,
                });
            }
        }

        let mut candidates: SmallVec<[(RouteId, &Route); 2]> = self
            .routes_between(start, end)
            .filter(|(_, route)| !route.is_claimed() && route.accepts(color))
            .collect();

        // Exact color matches first, then secondary colors, then gray routes.
        candidates.sort_by_key(|(_, route)| {
            if route.color == color {
                0
            } else if route.second_color == Some(color) {
                1
            } else {
                2
            }
        });

        candidates
            .first()
            .map(|(route_id, _)| *route_id)
            .ok_or(ClaimError::NoMatchingRoute(start, end))
    }

    /// Marks a route as claimed by `owner`.
    ///
    /// An owner is write-once: claiming an already claimed route fails, and so does claiming
    /// on behalf of [`RouteOwner::Unclaimed`].
    ///
    /// # Example
    /// ```
    /// use ticket_to_ride_ai::card::TrainColor;
    /// use ticket_to_ride_ai::map::{ClaimError, Map, Route, RouteOwner};
    ///
    /// let mut map = Map::new(2, vec![Route::new(0, 1, 2, TrainColor::Red, None)]).unwrap();
    ///
    /// assert!(map.claim_route(0, RouteOwner::Mine).is_ok());
    /// assert_eq!(
    ///     map.claim_route(0, RouteOwner::Opponent),
    ///     Err(ClaimError::AlreadyClaimed(0, 1))
    /// );
    /// ```
    pub fn claim_route(&mut self, route_id: RouteId, owner: RouteOwner) -> Result<&Route, ClaimError> {
        if owner == RouteOwner::Unclaimed {
            return Err(ClaimError::InvalidOwner);
        }

        let route = self
            .routes
            .get_mut(route_id)
            .ok_or(ClaimError::UnknownRoute(route_id))?;

        if route.is_claimed() {
            return Err(ClaimError::AlreadyClaimed(route.from, route.to));
        }

        route.owner = owner;
        Ok(route)
    }

    /// Points granted for claiming a route of the given length.
    ///
    /// # Example
    /// ```
    /// use ticket_to_ride_ai::map::Map;
    ///
    /// assert_eq!(Map::calculate_points_for_claimed_route(3), 4);
    /// assert_eq!(Map::calculate_points_for_claimed_route(6), 15);
    /// ```
    pub fn calculate_points_for_claimed_route(length: u8) -> u8 {
        match length {
            1 => 1,
            2 => 2,
            3 => 4,
            4 => 7,
            5 => 10,
            6 => 15,
            _ => 0,
        }
    }

    /// Returns the longest continuous path spanned from the routes claimed by `owner`.
    ///
    /// Note that a continous path may visit a city multiple times, but may not go through
    /// the same route twice.
    ///
    /// # Example
    /// ```
    /// use ticket_to_ride_ai::card::TrainColor;
    /// use ticket_to_ride_ai::map::{Map, Route, RouteOwner};
    ///
    /// let mut map = Map::new(3, vec![
    ///     Route::new(0,1, 3, TrainColor::Red, None),
    ///     Route::new(1, 2, 5, TrainColor::Blue, None),
    /// ]).unwrap();
    /// map.claim_route(0, RouteOwner::Mine).unwrap();
    /// map.claim_route(1, RouteOwner::Mine).unwrap();
    ///
    /// assert_eq!(map.get_longest_route(RouteOwner::Mine), 8);
    /// ```
    pub fn get_longest_route(&self, owner: RouteOwner) -> u16 {
        let mut cities_to_visit = HashSet::new();

        // Maps each city to a list of adjacent cities, including the route connecting the two.
        let mut all_routes: [SmallVec<[(City, RouteId, u8); MAX_ROUTES_PER_CITY]>; MAX_CITIES] =
            array_init(|_| SmallVec::new());

        for (route_id, route) in self.routes_owned_by(owner) {
            cities_to_visit.insert(route.from);
            cities_to_visit.insert(route.to);

            all_routes[route.from].push((route.to, route_id, route.length));
            all_routes[route.to].push((route.from, route_id, route.length));
        }

        if cities_to_visit.is_empty() {
            return 0;
        }

        // Prepare multi-threading. Workers only read an immutable snapshot of the routes.
        let all_routes = Arc::new(all_routes);
        let (tx, rx) = mpsc::channel();
        let thread_pool = match THREAD_POOL.lock() {
            Ok(thread_pool) => thread_pool,
            Err(poisoned) => poisoned.into_inner(),
        };

        // Each city is explored by a separate job from the pool, computing the longest route
        // starting at that city.
        for city in cities_to_visit {
            let all_routes = all_routes.clone();
            let tx = tx.clone();

            thread_pool.execute(move || {
                let _ = tx.send(Self::get_longest_route_from_city(
                    city,
                    &all_routes,
                    HashSet::new(),
                    0,
                ));
            });
        }

        // Receiving ends once every job has dropped its sender.
        drop(tx);
        rx.iter().fold(0, max)
    }

    fn get_longest_route_from_city(
        start: City,
        all_routes: &[SmallVec<[(City, RouteId, u8); MAX_ROUTES_PER_CITY]>; MAX_CITIES],
        routes_visited: HashSet<RouteId>,
        current_length: u16,
    ) -> u16 {
        let mut longest_route_from_city = current_length;

        for (end, route_id, length) in &all_routes[start] {
            if routes_visited.contains(route_id) {
                continue;
            }

            let mut routes_visited = routes_visited.clone();
            routes_visited.insert(*route_id);

            longest_route_from_city = max(
                longest_route_from_city,
                Self::get_longest_route_from_city(
                    *end,
                    all_routes,
                    routes_visited,
                    current_length + *length as u16,
                ),
            );
        }

        longest_route_from_city
    }
}
