use crate::city::{City, CityToCity};
use crate::map::{ClaimError, Route};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumCount as EnumCountMacro, EnumIter};

/// Number of train card variants, including the wild card.
pub const NUM_TRAIN_COLORS: usize = 9;

/// Number of face-up train cards on the board.
pub const NUM_OPEN_TRAIN_CARDS: usize = 5;

/// Number of objectives offered on each objective draw.
pub const NUM_DRAWN_OBJECTIVES: usize = 3;

/// Represents the different variants of train cards.
///
/// A route whose color is `Wild` is a *gray* route: it can be claimed with any single color.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    EnumCountMacro,
    EnumIter,
    Eq,
    Hash,
    PartialEq,
    Serialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TrainColor {
    /// Also known as the *Hopper train*.
    Black,
    /// Also known as the *Tanker train*.
    Blue,
    /// Also known as the *Caboose train*.
    Green,
    /// Also known as the *Freight train*.
    Orange,
    /// Also known as the *Box train*.
    Pink,
    /// Also known as the *Coal train*.
    Red,
    /// Also known as the *Passenger train*.
    White,
    /// Also known as the *Locomotive*.
    /// This is a special train that matches with any color.
    Wild,
    /// Also known as the *Reefer train*.
    Yellow,
}

impl TrainColor {
    /// Whether the current color is wild, i.e. matches with any color.
    ///
    /// # Examples:
    /// ```
    /// use ticket_to_ride_ai::card::TrainColor;
    ///
    /// assert!(!TrainColor::Black.is_wild());
    /// assert!(TrainColor::Wild.is_wild());
    /// ```
    #[inline]
    pub fn is_wild(&self) -> bool {
        *self == TrainColor::Wild
    }

    /// The opposite of `is_wild`.
    #[inline]
    pub fn is_not_wild(&self) -> bool {
        !self.is_wild()
    }

    #[inline]
    fn index(&self) -> usize {
        *self as usize
    }

    /// All colors except the wild card.
    pub fn non_wild() -> impl Iterator<Item = TrainColor> {
        TrainColor::iter().filter(TrainColor::is_not_wild)
    }
}

/// How a route gets paid for: `colored_cards` cards of `color`, plus `wild_cards` wild cards.
///
/// When a gray route is paid for exclusively with wild cards, `color` is `Wild`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Payment {
    pub color: TrainColor,
    pub colored_cards: u8,
    pub wild_cards: u8,
}

impl Payment {
    /// Total number of cards spent.
    #[inline]
    pub fn total(&self) -> u8 {
        self.colored_cards + self.wild_cards
    }
}

/// The train cards currently held, counted per color.
///
/// It is guaranteed that the sum of all counts equals [`Hand::total`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Hand {
    cards: [u8; NUM_TRAIN_COLORS],
    total: u8,
}

impl Hand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a hand from a list of cards.
    ///
    /// # Example
    /// ```
    /// use ticket_to_ride_ai::card::{Hand, TrainColor};
    ///
    /// let hand = Hand::from_cards(&[TrainColor::Red, TrainColor::Red, TrainColor::Wild]);
    /// assert_eq!(hand.count(TrainColor::Red), 2);
    /// assert_eq!(hand.total(), 3);
    /// ```
    pub fn from_cards(cards: &[TrainColor]) -> Self {
        let mut hand = Self::new();
        for card in cards {
            hand.add(*card);
        }

        hand
    }

    pub fn add(&mut self, card: TrainColor) {
        self.cards[card.index()] += 1;
        self.total += 1;
    }

    #[inline]
    pub fn count(&self, color: TrainColor) -> u8 {
        self.cards[color.index()]
    }

    #[inline]
    pub fn total(&self) -> u8 {
        self.total
    }

    #[inline]
    pub fn wild_cards(&self) -> u8 {
        self.count(TrainColor::Wild)
    }

    /// The largest number of cards of a single non-wild color.
    pub fn largest_color_count(&self) -> u8 {
        TrainColor::non_wild()
            .map(|color| self.count(color))
            .max()
            .unwrap_or(0)
    }

    /// Removes the cards of a payment from the hand.
    ///
    /// Fails, leaving the hand untouched, if there are not enough cards.
    pub fn spend(&mut self, payment: &Payment) -> Result<(), ClaimError> {
        let available_wild_cards = self.wild_cards();
        if available_wild_cards < payment.wild_cards {
            return Err(ClaimError::NotEnoughCards {
                color: TrainColor::Wild,
                needed: payment.wild_cards,
                available: available_wild_cards,
            });
        }

        if payment.colored_cards > 0 {
            let available = self.count(payment.color);
            if payment.color.is_wild() || available < payment.colored_cards {
                return Err(ClaimError::NotEnoughCards {
                    color: payment.color,
                    needed: payment.colored_cards,
                    available,
                });
            }

            self.cards[payment.color.index()] -= payment.colored_cards;
        }

        self.cards[TrainColor::Wild.index()] -= payment.wild_cards;
        self.total -= payment.total();
        Ok(())
    }

    /// Colors that can pay for the given route, best first.
    ///
    /// For a colored route, the primary color comes before the secondary one.
    /// For a gray route, every non-wild color is eligible, the ones we hold the most of first.
    fn candidate_colors(&self, route: &Route) -> SmallVec<[TrainColor; NUM_TRAIN_COLORS]> {
        if route.color.is_wild() {
            let mut colors: SmallVec<[TrainColor; NUM_TRAIN_COLORS]> =
                TrainColor::non_wild().collect();
            // Stable sort: ties keep the enum order.
            colors.sort_by(|a, b| self.count(*b).cmp(&self.count(*a)));
            colors
        } else {
            let mut colors = smallvec![route.color];
            if let Some(second_color) = route.second_color {
                if second_color != route.color {
                    colors.push(second_color);
                }
            }
            colors
        }
    }

    /// Picks how to pay for a route with the cards currently held, if possible.
    ///
    /// A color that covers the whole route on its own is preferred, then the route's
    /// secondary color. Only if no single color is sufficient are wild cards committed:
    /// in that case the whole wild card stock (capped at the route length) is used,
    /// topped up with the best color.
    ///
    /// # Example
    /// ```
    /// use ticket_to_ride_ai::card::{Hand, TrainColor};
    /// use ticket_to_ride_ai::map::Route;
    ///
    /// let hand = Hand::from_cards(&[TrainColor::Red, TrainColor::Red, TrainColor::Red,
    ///                               TrainColor::Wild, TrainColor::Wild]);
    /// let route = Route::new(0, 1, 4, TrainColor::Red, None);
    ///
    /// let payment = hand.payment_for(&route).unwrap();
    /// assert_eq!(payment.wild_cards, 2);
    /// assert_eq!(payment.colored_cards, 2);
    /// ```
    pub fn payment_for(&self, route: &Route) -> Option<Payment> {
        let length = route.length;
        let candidate_colors = self.candidate_colors(route);

        if let Some(color) = candidate_colors
            .iter()
            .find(|color| self.count(**color) >= length)
        {
            return Some(Payment {
                color: *color,
                colored_cards: length,
                wild_cards: 0,
            });
        }

        let wild_cards = self.wild_cards().min(length);
        let colored_cards = length - wild_cards;
        if colored_cards == 0 {
            let color = if route.color.is_wild() {
                TrainColor::Wild
            } else {
                route.color
            };
            return Some(Payment {
                color,
                colored_cards,
                wild_cards,
            });
        }

        candidate_colors
            .iter()
            .filter(|color| self.count(**color) >= colored_cards)
            .max_by_key(|color| self.count(**color))
            .map(|color| Payment {
                color: *color,
                colored_cards,
                wild_cards,
            })
    }

    /// Whether the route could be paid for right now.
    #[inline]
    pub fn can_pay_for(&self, route: &Route) -> bool {
        self.payment_for(route).is_some()
    }

    /// The color worth collecting to eventually claim the given route.
    ///
    /// For a colored route, this is whichever of its colors we hold the most of.
    /// For a gray route, this is the non-wild color we hold the most of.
    pub fn preferred_color(&self, route: &Route) -> TrainColor {
        let candidate_colors = self.candidate_colors(route);
        let mut preferred_color = candidate_colors[0];
        for color in candidate_colors.iter().skip(1) {
            if self.count(*color) > self.count(preferred_color) {
                preferred_color = *color;
            }
        }

        preferred_color
    }

    /// How many more cards of [`Hand::preferred_color`] are needed to claim the route.
    pub fn deficit(&self, route: &Route) -> u8 {
        let preferred_color = self.preferred_color(route);
        route
            .length
            .saturating_sub(self.count(preferred_color) + self.wild_cards())
    }
}

/// Encapsulates information about an objective (also known as a *destination ticket*).
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Objective {
    /// One end of the objective.
    pub from: City,
    /// The other end of the objective.
    pub to: City,
    /// How many points are granted once the two cities are connected.
    /// If not fulfilled, the same amount is subtracted at the end of the game.
    pub points: u8,
}

impl Objective {
    pub fn new(from: City, to: City, points: u8) -> Self {
        Self { from, to, points }
    }

    #[inline]
    pub fn destination(&self) -> CityToCity {
        (self.from, self.to)
    }

    /// Whether both objectives share at least one city.
    pub fn shares_endpoint_with(&self, other: &Objective) -> bool {
        self.from == other.from
            || self.from == other.to
            || self.to == other.from
            || self.to == other.to
    }
}

/// Convenience macro to generate an objective.
#[macro_export]
macro_rules! objective {
    ($from:expr, $to:expr, $points:literal) => {
        $crate::card::Objective {
            from: $from,
            to: $to,
            points: $points,
        }
    };
}
