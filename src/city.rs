/// Cities are identified by their index on the board, from `0` to `num_cities - 1`.
///
/// The board table is loaded by the caller, so there is no name attached to a city here.
pub type City = usize;

/// Top-level representation of a connection between two cities.
pub type CityToCity = (City, City);

/// The largest board supported.
pub const MAX_CITIES: usize = 50;

/// Orders a pair of cities, so that `(a, b)` and `(b, a)` map to the same key.
///
/// # Example
/// ```
/// use ticket_to_ride_ai::city::unordered;
///
/// assert_eq!(unordered((7, 2)), (2, 7));
/// assert_eq!(unordered((2, 7)), (2, 7));
/// ```
#[inline]
pub fn unordered((start, end): CityToCity) -> CityToCity {
    if start <= end {
        (start, end)
    } else {
        (end, start)
    }
}

/// Whether both cities of the pair are valid indices on a board of `num_cities` cities.
#[inline]
pub fn is_valid_pair((start, end): CityToCity, num_cities: usize) -> bool {
    start < num_cities && end < num_cities
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unordered_is_symmetric() {
        for (start, end) in [(0, 0), (3, 9), (49, 1)] {
            assert_eq!(unordered((start, end)), unordered((end, start)));
        }
    }

    #[test]
    fn valid_pair() {
        assert!(is_valid_pair((0, 4), 5));
        assert!(!is_valid_pair((0, 5), 5));
        assert!(!is_valid_pair((MAX_CITIES, 0), MAX_CITIES));
    }
}
