use std::fmt::Display;

use serde::{Serialize, Serializer};

/// Words accepted as a unit directly after a numeric literal (`10m`, `5 cm`).
pub const KNOWN_UNITS: &[&str] = &["USD", "EUR", "GBP", "cm", "ml", "teaspoons", "days", "m"];

/// Spelling aliases for the target of an `in` conversion. Case-sensitive.
const TARGET_ALIASES: &[(&str, &str)] = &[("Euros", "EUR"), ("Euro", "EUR")];

/// Fixed rates into EUR. Every other currency pair is only relabelled.
const EUR_RATES: &[(Currency, f64)] = &[(Currency::Gbp, 1.15), (Currency::Usd, 0.92)];

const ML_PER_TEASPOON: f64 = 20.0 / 4.05;

const CM_PER_M: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
}

impl Currency {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "USD" => Some(Currency::Usd),
            "EUR" => Some(Currency::Eur),
            "GBP" => Some(Currency::Gbp),
            _ => None,
        }
    }

    /// Maps `$`, `€` and `£` to their currency.
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '$' => Some(Currency::Usd),
            '€' => Some(Currency::Eur),
            '£' => Some(Currency::Gbp),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
        }
    }
}

/// A tag attached to an amount.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Unit {
    Currency(Currency),
    Percent,
    /// The amount is a unix timestamp in seconds.
    Date,
    Days,
    /// Result of the ml -> teaspoons conversion, labelled `tsp`.
    Teaspoons,
    /// Lengths, volumes and any other label the conversion table does not know.
    Named(String),
}

impl Unit {
    pub fn from_label(label: &str) -> Self {
        if let Some(currency) = Currency::from_code(label) {
            return Unit::Currency(currency);
        }
        match label {
            "%" => Unit::Percent,
            "date" => Unit::Date,
            "days" => Unit::Days,
            other => Unit::Named(other.to_string()),
        }
    }

    /// The unit for a word written right after a number, if it is a known one.
    pub fn suffix(word: &str) -> Option<Self> {
        KNOWN_UNITS
            .contains(&word)
            .then(|| Unit::from_label(word))
    }

    /// The unit named after `in`, with aliases such as `Euros` resolved.
    pub fn conversion_target(word: &str) -> Self {
        let word = TARGET_ALIASES
            .iter()
            .find_map(|(alias, code)| (*alias == word).then_some(*code))
            .unwrap_or(word);
        Unit::from_label(word)
    }

    pub fn currency(&self) -> Option<Currency> {
        match self {
            Unit::Currency(currency) => Some(*currency),
            _ => None,
        }
    }

    pub fn is_currency(&self) -> bool {
        self.currency().is_some()
    }

    pub fn label(&self) -> &str {
        match self {
            Unit::Currency(currency) => currency.code(),
            Unit::Percent => "%",
            Unit::Date => "date",
            Unit::Days => "days",
            Unit::Teaspoons => "tsp",
            Unit::Named(label) => label,
        }
    }
}

impl Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Unit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Applies the conversion table to `amount`.
///
/// Only GBP/USD -> EUR, ml -> teaspoons and cm -> m change the number. Any
/// other pair keeps the amount and takes the target label.
pub fn convert(amount: f64, from: Option<&Unit>, to: &Unit) -> (f64, Unit) {
    if let Some(target) = to.currency() {
        let rate = from
            .and_then(Unit::currency)
            .filter(|_| target == Currency::Eur)
            .and_then(|source| {
                EUR_RATES
                    .iter()
                    .find_map(|(currency, rate)| (*currency == source).then_some(*rate))
            });
        return match rate {
            Some(rate) => (round2(amount * rate), Unit::Currency(Currency::Eur)),
            None => (amount, to.clone()),
        };
    }

    match (from.map(Unit::label), to.label()) {
        (Some("ml"), "teaspoons") => (round2(amount / ML_PER_TEASPOON), Unit::Teaspoons),
        (Some("cm"), "m") => (round2(amount / CM_PER_M), to.clone()),
        _ => (amount, to.clone()),
    }
}

pub(crate) fn round2(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(label: &str) -> Unit {
        Unit::Named(label.to_string())
    }

    #[test]
    fn suffix_only_accepts_known_units() {
        assert_eq!(Unit::suffix("USD"), Some(Unit::Currency(Currency::Usd)));
        assert_eq!(Unit::suffix("days"), Some(Unit::Days));
        assert_eq!(Unit::suffix("cm"), Some(named("cm")));
        assert_eq!(Unit::suffix("columns"), None);
        assert_eq!(Unit::suffix("usd"), None);
    }

    #[test]
    fn conversion_target_resolves_aliases() {
        assert_eq!(Unit::conversion_target("Euros"), Unit::Currency(Currency::Eur));
        assert_eq!(Unit::conversion_target("Euro"), Unit::Currency(Currency::Eur));
        assert_eq!(Unit::conversion_target("euros"), named("euros"));
        assert_eq!(Unit::conversion_target("inches"), named("inches"));
    }

    #[test]
    fn converts_into_eur_with_fixed_rates() {
        let gbp = Unit::Currency(Currency::Gbp);
        let usd = Unit::Currency(Currency::Usd);
        let eur = Unit::Currency(Currency::Eur);
        assert_eq!(convert(4.0, Some(&gbp), &eur), (4.6, eur.clone()));
        assert_eq!(convert(10.0, Some(&usd), &eur), (9.2, eur.clone()));
    }

    #[test]
    fn other_currency_pairs_only_relabel() {
        let eur = Unit::Currency(Currency::Eur);
        let usd = Unit::Currency(Currency::Usd);
        assert_eq!(convert(10.0, Some(&eur), &usd), (10.0, usd.clone()));
        assert_eq!(convert(10.0, None, &usd), (10.0, usd));
    }

    #[test]
    fn converts_lengths_and_volumes() {
        assert_eq!(
            convert(20.0, Some(&named("ml")), &named("teaspoons")),
            (4.05, Unit::Teaspoons)
        );
        assert_eq!(convert(157.5, Some(&named("cm")), &named("m")), (1.58, named("m")));
    }

    #[test]
    fn unknown_pairs_keep_the_amount() {
        assert_eq!(
            convert(50.0, Some(&named("cm")), &named("inches")),
            (50.0, named("inches"))
        );
        assert_eq!(convert(3.0, Some(&named("m")), &named("cm")), (3.0, named("cm")));
    }
}
