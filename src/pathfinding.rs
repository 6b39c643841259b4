//! Shortest paths over the routes still usable by us, and their cache.
//!
//! Opponent routes are removed from the graph entirely. Paths are computed with an
//! array-based Dijkstra, which is `O(V²)` and trivial at the board sizes we support.

use crate::city::{unordered, City, CityToCity, MAX_CITIES};
use crate::map::{Map, Route, RouteId, RouteOwner};

use log::{debug, warn};
use smallvec::SmallVec;
use std::collections::HashMap;

/// Inline capacity of the cities and routes of a path.
const PATH_CAPACITY: usize = 16;

/// An ordered path between two cities.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Path {
    /// Sum of the length of every route on the path.
    pub distance: u32,
    /// Cities from start to end, both included.
    pub cities: SmallVec<[City; PATH_CAPACITY]>,
    /// Routes taken between consecutive cities. There is one fewer route than cities.
    pub routes: SmallVec<[RouteId; PATH_CAPACITY]>,
}

impl Path {
    fn trivial(city: City) -> Self {
        Self {
            distance: 0,
            cities: smallvec![city],
            routes: SmallVec::new(),
        }
    }

    pub fn start(&self) -> Option<City> {
        self.cities.first().copied()
    }

    #[inline]
    pub fn num_segments(&self) -> usize {
        self.routes.len()
    }

    #[inline]
    pub fn contains_route(&self, route_id: RouteId) -> bool {
        self.routes.contains(&route_id)
    }

    /// The same path, walked from the other end.
    pub fn reversed(&self) -> Self {
        Self {
            distance: self.distance,
            cities: self.cities.iter().rev().copied().collect(),
            routes: self.routes.iter().rev().copied().collect(),
        }
    }

    /// Routes of the path which are not claimed yet.
    pub fn unclaimed_routes<'a>(&'a self, map: &'a Map) -> impl Iterator<Item = RouteId> + 'a {
        self.routes.iter().copied().filter(move |route_id| {
            map.route(*route_id)
                .map_or(false, |route| route.owner() == RouteOwner::Unclaimed)
        })
    }

    /// Sum of the length of the routes of the path we already own.
    pub fn owned_length(&self, map: &Map) -> u32 {
        self.routes
            .iter()
            .filter_map(|route_id| map.route(*route_id))
            .filter(|route| route.is_mine())
            .map(|route| route.length as u32)
            .sum()
    }

    /// Share of the segments of the path we already own, between 0 and 1.
    pub fn owned_share(&self, map: &Map) -> f64 {
        if self.routes.is_empty() {
            return 1.0;
        }

        let owned = self
            .routes
            .iter()
            .filter_map(|route_id| map.route(*route_id))
            .filter(|route| route.is_mine())
            .count();
        owned as f64 / self.routes.len() as f64
    }
}

/// Result of a single-source Dijkstra run.
struct ShortestPathTree {
    cost: [Option<u32>; MAX_CITIES],
    previous: [Option<(City, RouteId)>; MAX_CITIES],
}

/// Array-based Dijkstra from `start`, stopping early once `target` is settled.
///
/// `cost` returns the weight of a route, or `None` if the route cannot be used.
/// Among equally cheap routes, one we own is preferred.
fn dijkstra<F>(map: &Map, start: City, target: Option<City>, cost: &F) -> ShortestPathTree
where
    F: Fn(RouteId, &Route) -> Option<u32>,
{
    let num_cities = map.num_cities().min(MAX_CITIES);
    let mut tree = ShortestPathTree {
        cost: [None; MAX_CITIES],
        previous: [None; MAX_CITIES],
    };
    let mut settled = [false; MAX_CITIES];

    if start >= num_cities {
        return tree;
    }
    tree.cost[start] = Some(0);

    loop {
        // Pick the cheapest city not settled yet.
        let mut current = None;
        for city in 0..num_cities {
            if settled[city] {
                continue;
            }
            if let Some(city_cost) = tree.cost[city] {
                let cheaper = match current {
                    Some((_, best_cost)) => city_cost < best_cost,
                    None => true,
                };
                if cheaper {
                    current = Some((city, city_cost));
                }
            }
        }

        let (city, city_cost) = match current {
            Some(current) => current,
            None => break,
        };
        settled[city] = true;

        if Some(city) == target {
            break;
        }

        for (route_id, route) in map.routes_from(city) {
            let next = match route.other_end(city) {
                Some(next) if next < num_cities && !settled[next] => next,
                _ => continue,
            };
            let route_cost = match cost(route_id, route) {
                Some(route_cost) => route_cost,
                None => continue,
            };

            let next_cost = city_cost + route_cost;
            let improves = match tree.cost[next] {
                None => true,
                Some(known_cost) if next_cost < known_cost => true,
                Some(known_cost) if next_cost == known_cost => {
                    route.is_mine()
                        && !tree.previous[next]
                            .and_then(|(_, previous_route)| map.route(previous_route))
                            .map_or(false, Route::is_mine)
                }
                _ => false,
            };

            if improves {
                tree.cost[next] = Some(next_cost);
                tree.previous[next] = Some((city, route_id));
            }
        }
    }

    tree
}

fn reconstruct_path(map: &Map, tree: &ShortestPathTree, start: City, end: City) -> Option<Path> {
    tree.cost.get(end).copied().flatten()?;

    let mut cities: SmallVec<[City; PATH_CAPACITY]> = smallvec![end];
    let mut routes: SmallVec<[RouteId; PATH_CAPACITY]> = SmallVec::new();
    let mut city = end;
    while city != start {
        let (previous_city, route_id) = tree.previous[city]?;
        cities.push(previous_city);
        routes.push(route_id);
        city = previous_city;
    }

    cities.reverse();
    routes.reverse();

    let distance = routes
        .iter()
        .filter_map(|route_id| map.route(*route_id))
        .map(|route| route.length as u32)
        .sum();

    Some(Path {
        distance,
        cities,
        routes,
    })
}

/// Finds the cheapest path according to an arbitrary route cost.
///
/// Returns `None` if the cities are not connected through usable routes, or are unknown.
pub fn search<F>(map: &Map, start: City, end: City, cost: F) -> Option<Path>
where
    F: Fn(RouteId, &Route) -> Option<u32>,
{
    if !map.is_valid_city(start) || !map.is_valid_city(end) {
        warn!(
            "Path search between {} and {} outside of a board of {} cities.",
            start,
            end,
            map.num_cities()
        );
        return None;
    }

    if start == end {
        return Some(Path::trivial(start));
    }

    let tree = dijkstra(map, start, Some(end), &cost);
    reconstruct_path(map, &tree, start, end)
}

/// Cost of each city from `start` according to an arbitrary route cost.
/// Unreachable (or unknown) cities are `None`.
pub fn costs_from<F>(map: &Map, start: City, cost: F) -> [Option<u32>; MAX_CITIES]
where
    F: Fn(RouteId, &Route) -> Option<u32>,
{
    dijkstra(map, start, None, &cost).cost
}

/// Route cost from our point of view: opponent routes are unusable.
pub fn own_cost(_: RouteId, route: &Route) -> Option<u32> {
    match route.owner() {
        RouteOwner::Opponent => None,
        _ => Some(route.length as u32),
    }
}

/// Route cost from our point of view, where routes we own are free.
pub fn network_cost(_: RouteId, route: &Route) -> Option<u32> {
    match route.owner() {
        RouteOwner::Opponent => None,
        RouteOwner::Mine => Some(0),
        RouteOwner::Unclaimed => Some(route.length as u32),
    }
}

/// Route cost from the opponent's point of view: our routes are unusable.
pub fn opponent_cost(_: RouteId, route: &Route) -> Option<u32> {
    match route.owner() {
        RouteOwner::Mine => None,
        _ => Some(route.length as u32),
    }
}

/// Minimum-length path using only our routes and unclaimed ones.
///
/// # Example
/// ```
/// use ticket_to_ride_ai::card::TrainColor;
/// use ticket_to_ride_ai::map::{Map, Route, RouteOwner};
/// use ticket_to_ride_ai::pathfinding::shortest_path;
///
/// let mut map = Map::new(3, vec![
///     Route::new(0, 2, 2, TrainColor::Red, None),
///     Route::new(0, 1, 2, TrainColor::Red, None),
///     Route::new(1, 2, 3, TrainColor::Blue, None),
/// ]).unwrap();
/// assert_eq!(shortest_path(&map, 0, 2).unwrap().distance, 2);
///
/// map.claim_route(0, RouteOwner::Opponent).unwrap();
/// assert_eq!(shortest_path(&map, 0, 2).unwrap().distance, 5);
/// ```
pub fn shortest_path(map: &Map, start: City, end: City) -> Option<Path> {
    search(map, start, end, own_cost)
}

/// Path preferring to reuse our routes, which are considered free.
pub fn network_biased_path(map: &Map, start: City, end: City) -> Option<Path> {
    search(map, start, end, network_cost)
}

/// Limits under which a network-biased path replaces the plain shortest one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SmartPathLimits {
    /// The biased path may be at most this many times longer than the shortest path.
    pub max_detour_ratio: f64,
    /// The share of segments of the biased path we must already own.
    pub min_owned_share: f64,
}

impl Default for SmartPathLimits {
    fn default() -> Self {
        Self {
            max_detour_ratio: 1.5,
            min_owned_share: 0.6,
        }
    }
}

#[derive(Clone, Debug)]
struct CacheEntry {
    path: Option<Path>,
    version: u64,
}

/// Caches shortest paths per unordered pair of cities.
///
/// Each entry is stamped with the version at the time it was computed, and is only served
/// while that version is current. Any change of route ownership must call
/// [`PathCache::invalidate`], which invalidates every entry at once: the validity of a path
/// depends on the whole board, not only on its ends.
#[derive(Clone, Debug, Default)]
pub struct PathCache {
    entries: HashMap<CityToCity, CacheEntry>,
    version: u64,
    hits: u64,
    misses: u64,
}

impl PathCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Invalidates every cached path.
    pub fn invalidate(&mut self) {
        self.version += 1;
    }

    /// Number of lookups served from the cache, and number of lookups computed.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    /// Shortest path between two cities, served from the cache when still valid.
    ///
    /// The returned path always goes from `start` to `end`.
    pub fn shortest_path(&mut self, map: &Map, start: City, end: City) -> Option<Path> {
        let key = unordered((start, end));

        let path = match self.entries.get(&key) {
            Some(entry) if entry.version == self.version => {
                self.hits += 1;
                entry.path.clone()
            }
            _ => {
                self.misses += 1;
                debug!(
                    "Computing path between {} and {} (cache version {}).",
                    key.0, key.1, self.version
                );

                let path = shortest_path(map, key.0, key.1);
                self.entries.insert(
                    key,
                    CacheEntry {
                        path: path.clone(),
                        version: self.version,
                    },
                );
                path
            }
        };

        path.map(|path| {
            if path.start() == Some(start) {
                path
            } else {
                path.reversed()
            }
        })
    }

    /// The "smartest" path between two cities.
    ///
    /// This is the network-biased path if it is not an excessive detour compared to the
    /// shortest path, and if we already own a large majority of its segments.
    /// Otherwise, this is the shortest path.
    pub fn smart_path(
        &mut self,
        map: &Map,
        start: City,
        end: City,
        limits: &SmartPathLimits,
    ) -> Option<Path> {
        let shortest = self.shortest_path(map, start, end)?;
        if shortest.num_segments() == 0 {
            return Some(shortest);
        }

        let biased = match network_biased_path(map, start, end) {
            Some(biased) => biased,
            None => return Some(shortest),
        };

        let max_distance = shortest.distance as f64 * limits.max_detour_ratio;
        if biased.routes != shortest.routes
            && biased.distance as f64 <= max_distance
            && biased.owned_share(map) >= limits.min_owned_share
        {
            Some(biased)
        } else {
            Some(shortest)
        }
    }
}
