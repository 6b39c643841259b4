use crate::city::{City, MAX_CITIES};
use crate::map::{Map, RouteOwner};

use log::warn;

/// Which cities are connected to each other through our own routes.
///
/// The matrix is always symmetric and transitively closed. It is recomputed from scratch
/// after each of our claims, which is cheap for boards of at most [`MAX_CITIES`] cities.
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectivityMatrix {
    num_cities: usize,
    connected: [[bool; MAX_CITIES]; MAX_CITIES],
}

impl ConnectivityMatrix {
    /// A matrix where nothing is connected.
    pub fn new(num_cities: usize) -> Self {
        Self {
            num_cities: num_cities.min(MAX_CITIES),
            connected: [[false; MAX_CITIES]; MAX_CITIES],
        }
    }

    /// Builds the matrix for the routes we currently own on the map.
    pub fn from_map(map: &Map) -> Self {
        let mut matrix = Self::new(map.num_cities());
        matrix.recompute(map);
        matrix
    }

    /// Recomputes the transitive closure (Floyd-Warshall) seeded from our own routes.
    pub fn recompute(&mut self, map: &Map) {
        self.num_cities = map.num_cities().min(MAX_CITIES);
        self.connected = [[false; MAX_CITIES]; MAX_CITIES];

        for (route_id, route) in map.routes_owned_by(RouteOwner::Mine) {
            if route.from >= self.num_cities || route.to >= self.num_cities {
                warn!(
                    "Skipping route {} between {} and {}: outside of a board of {} cities.",
                    route_id, route.from, route.to, self.num_cities
                );
                continue;
            }

            self.connected[route.from][route.to] = true;
            self.connected[route.to][route.from] = true;
        }

        let n = self.num_cities;
        for k in 0..n {
            for i in 0..n {
                if !self.connected[i][k] {
                    continue;
                }

                for j in 0..n {
                    if self.connected[k][j] {
                        self.connected[i][j] = true;
                    }
                }
            }
        }
    }

    /// Whether two cities are connected through our own routes.
    ///
    /// A city is trivially connected to itself. Unknown cities are never connected.
    ///
    /// # Example
    /// ```
    /// use ticket_to_ride_ai::card::TrainColor;
    /// use ticket_to_ride_ai::connectivity::ConnectivityMatrix;
    /// use ticket_to_ride_ai::map::{Map, Route, RouteOwner};
    ///
    /// let mut map = Map::new(3, vec![
    ///     Route::new(0, 1, 2, TrainColor::Red, None),
    ///     Route::new(1, 2, 3, TrainColor::Blue, None),
    /// ]).unwrap();
    /// map.claim_route(0, RouteOwner::Mine).unwrap();
    /// map.claim_route(1, RouteOwner::Mine).unwrap();
    ///
    /// let matrix = ConnectivityMatrix::from_map(&map);
    /// assert!(matrix.is_connected(2, 0));
    /// assert!(!matrix.is_connected(0, 7));
    /// ```
    pub fn is_connected(&self, start: City, end: City) -> bool {
        if start >= self.num_cities || end >= self.num_cities {
            warn!(
                "Connectivity lookup between {} and {} outside of a board of {} cities.",
                start, end, self.num_cities
            );
            return false;
        }

        start == end || self.connected[start][end]
    }

    /// Whether a city is touched by at least one of our routes.
    pub fn is_in_network(&self, city: City) -> bool {
        city < self.num_cities && self.connected[city][city]
    }

    /// All cities connected to `city`, excluding itself.
    pub fn connected_cities(&self, city: City) -> impl Iterator<Item = City> + '_ {
        let row: &[bool] = if city < self.num_cities {
            &self.connected[city][..self.num_cities]
        } else {
            &[]
        };

        row.iter()
            .enumerate()
            .filter(move |(other, connected)| **connected && *other != city)
            .map(|(other, _)| other)
    }

    #[inline]
    pub fn num_cities(&self) -> usize {
        self.num_cities
    }
}
