//! Boards shared by the unit tests.

use crate::card::TrainColor::*;
use crate::map::{Map, Route};

/// Installs a logger printing through the test harness. Can be called from every test.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Cities `0..num_cities` along a line, linked by gray routes of length 1.
pub fn line_map(num_cities: usize) -> Map {
    let routes = (0..num_cities - 1)
        .map(|city| Route::new(city, city + 1, 1, Wild, None))
        .collect();
    Map::new(num_cities, routes).unwrap()
}

/// Two routes: 0 -> 1 (2, red) and 1 -> 2 (3, blue).
pub fn scenario_a_map() -> Map {
    Map::new(
        3,
        vec![Route::new(0, 1, 2, Red, None), Route::new(1, 2, 3, Blue, None)],
    )
    .unwrap()
}

// A board of 8 cities:
//
//   0 --2-- 1 ==3== 2 --1-- 3
//   |       |               |
//   4       2               3
//   |       |               |
//   4 --4-- 5 --2-- 6 --5-- 7
//
// Route ids:
//   0: 0-1 (2, red)       5: 3-7 (3, gray)
//   1: 1-2 (3, blue)      6: 4-5 (4, orange)
//   2: 2-3 (1, green)     7: 5-6 (2, pink)
//   3: 0-4 (4, white)     8: 6-7 (5, black)
//   4: 1-5 (2, yellow)    9: 1-2 (3, red)
pub fn sample_map() -> Map {
    Map::new(
        8,
        vec![
            Route::new(0, 1, 2, Red, None),
            Route::new(1, 2, 3, Blue, None),
            Route::new(2, 3, 1, Green, None),
            Route::new(0, 4, 4, White, None),
            Route::new(1, 5, 2, Yellow, None),
            Route::new(3, 7, 3, Wild, None),
            Route::new(4, 5, 4, Orange, None),
            Route::new(5, 6, 2, Pink, None),
            Route::new(6, 7, 5, Black, None),
            Route::new(1, 2, 3, Red, None),
        ],
    )
    .unwrap()
}
