//! Rating aggregation for product reviews.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RatingSummary {
    /// Mean rating rounded to one decimal place, zero when unrated.
    pub average: Decimal,
    pub count: i64,
    /// Number of reviews per star, index 0 is one star.
    pub histogram: [i64; 5],
}

impl RatingSummary {
    /// Builds a summary from `(rating, count)` rows; ratings outside 1..=5 are ignored.
    pub fn from_counts(rows: &[(i32, i64)]) -> Self {
        let mut histogram = [0i64; 5];
        for (rating, count) in rows {
            if let Some(slot) = usize::try_from(*rating - 1).ok().and_then(|i| histogram.get_mut(i)) {
                *slot += count;
            }
        }
        let count: i64 = histogram.iter().sum();
        let weighted: i64 = histogram.iter().zip(1i64..).map(|(n, stars)| n * stars).sum();
        let mut average = if count == 0 {
            Decimal::ZERO
        } else {
            (Decimal::from(weighted) / Decimal::from(count)).round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
        };
        average.rescale(1);
        Self { average, count, histogram }
    }

    /// Summary from per-star counts, index 0 is one star.
    pub fn from_histogram(histogram: [i64; 5]) -> Self {
        let rows: Vec<(i32, i64)> = (1..=5).zip(histogram).collect();
        Self::from_counts(&rows)
    }
}
