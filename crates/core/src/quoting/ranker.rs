use rust_decimal::Decimal;
use serde::Serialize;

use crate::quoting::source::SourceResult;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RankedOffer {
    pub result: SourceResult,
    pub is_best: bool,
}

/// Results of one run with the best offer marked. Offers keep the order
/// they were given in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RankedOffers {
    pub offers: Vec<RankedOffer>,
    pub best_index: Option<usize>,
}

impl RankedOffers {
    pub fn best(&self) -> Option<&SourceResult> {
        self.best_index.and_then(|index| self.offers.get(index)).map(|offer| &offer.result)
    }

    pub fn best_price(&self) -> Option<Decimal> {
        self.best().and_then(SourceResult::price)
    }

    pub fn no_offers_available(&self) -> bool {
        self.best_index.is_none()
    }

    pub fn successes(&self) -> impl Iterator<Item = &SourceResult> {
        self.offers.iter().map(|offer| &offer.result).filter(|result| result.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &SourceResult> {
        self.offers.iter().map(|offer| &offer.result).filter(|result| !result.is_success())
    }
}

/// Marks the cheapest successful result as best. On equal prices the
/// earliest result wins.
pub fn rank_offers(results: Vec<SourceResult>) -> RankedOffers {
    let mut best: Option<(usize, Decimal)> = None;
    for (index, result) in results.iter().enumerate() {
        if let Some(price) = result.price() {
            if best.map_or(true, |(_, best_price)| price < best_price) {
                best = Some((index, price));
            }
        }
    }

    let best_index = best.map(|(index, _)| index);
    let offers = results
        .into_iter()
        .enumerate()
        .map(|(index, result)| RankedOffer { result, is_best: Some(index) == best_index })
        .collect();

    RankedOffers { offers, best_index }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::rank_offers;
    use crate::domain::quote::PolicyType;
    use crate::quoting::source::SourceResult;

    fn priced(company: &str, price: i64) -> SourceResult {
        SourceResult::Success {
            company: company.to_string(),
            price: Decimal::new(price, 0),
            policy_type: PolicyType::Kasko,
        }
    }

    #[test]
    fn cheapest_success_is_best() {
        let ranked = rank_offers(vec![priced("A", 1200), priced("B", 900), priced("C", 1500)]);

        assert_eq!(ranked.best_index, Some(1));
        assert_eq!(ranked.best_price(), Some(Decimal::new(900, 0)));
        assert_eq!(ranked.offers.iter().filter(|offer| offer.is_best).count(), 1);
    }

    #[test]
    fn failures_are_never_best() {
        let ranked = rank_offers(vec![
            SourceResult::failure("A", "timeout"),
            priced("B", 2000),
            SourceResult::failure("C", "declined"),
        ]);

        assert_eq!(ranked.best().map(SourceResult::company), Some("B"));
        assert_eq!(ranked.failures().count(), 2);
        assert_eq!(ranked.successes().count(), 1);
    }

    #[test]
    fn tie_goes_to_first_registered() {
        let ranked = rank_offers(vec![priced("A", 1000), priced("B", 900), priced("C", 900)]);
        assert_eq!(ranked.best().map(SourceResult::company), Some("B"));
    }

    #[test]
    fn all_failures_mean_no_offers() {
        let ranked = rank_offers(vec![
            SourceResult::failure("A", "down"),
            SourceResult::failure("B", "down"),
        ]);

        assert!(ranked.no_offers_available());
        assert_eq!(ranked.best(), None);
        assert!(ranked.offers.iter().all(|offer| !offer.is_best));
    }

    #[test]
    fn ranking_is_deterministic() {
        let input = vec![priced("A", 1300), priced("B", 1100), SourceResult::failure("C", "x")];
        assert_eq!(rank_offers(input.clone()), rank_offers(input));
    }
}
