//! Price multipliers: payer, region and modifier
//!
//! `billed = reference_rate × payer × region × Π modifiers`, rounded to cents.

use billforge_domain::{round2, FacilityIdentity, PayerClass};

/// Added to the state factor for major-metro facilities
pub const METRO_BONUS: f64 = 0.15;

/// Payer multiplier forced by the price-gouging scenario
pub const GOUGING_MULTIPLIER: f64 = 5.5;

const STATE_FACTORS: &[(&str, f64)] = &[
    ("NY", 1.25),
    ("CA", 1.20),
    ("MA", 1.15),
    ("IL", 1.10),
    ("FL", 1.05),
    ("TX", 1.00),
];

const METRO_CITIES: &[&str] = &["new york", "los angeles", "chicago", "san francisco", "boston"];

const METRO_ZIP_PREFIXES: &[&str] = &["100", "900", "606", "941", "021"];

/// Where the service was rendered
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Location {
    /// City name
    pub city: String,
    /// State code
    pub region: String,
    /// Postal code
    pub postal_code: String,
}

impl Location {
    /// Create a location
    pub fn new(city: impl Into<String>, region: impl Into<String>, postal_code: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            region: region.into(),
            postal_code: postal_code.into(),
        }
    }

    /// The facility's location
    pub fn of(facility: &FacilityIdentity) -> Self {
        Self::new(&facility.city, &facility.region, &facility.postal_code)
    }

    /// Whether the city or postal prefix is in the metro list
    pub fn is_metro(&self) -> bool {
        let city = self.city.trim().to_lowercase();
        METRO_CITIES.contains(&city.as_str())
            || METRO_ZIP_PREFIXES
                .iter()
                .any(|prefix| self.postal_code.trim().starts_with(prefix))
    }
}

/// Which payer multiplier applies
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PayerFactor {
    /// The payer class table
    Class(PayerClass),
    /// A forced multiplier overriding the payer class
    Forced(f64),
}

impl PayerFactor {
    /// Multiplier value
    pub fn value(&self) -> f64 {
        match self {
            PayerFactor::Class(payer) => payer_factor(*payer),
            PayerFactor::Forced(multiplier) => *multiplier,
        }
    }
}

impl From<PayerClass> for PayerFactor {
    fn from(payer: PayerClass) -> Self {
        PayerFactor::Class(payer)
    }
}

/// Payer class multiplier
pub fn payer_factor(payer: PayerClass) -> f64 {
    match payer {
        PayerClass::Medicare => 1.0,
        PayerClass::Medicaid => 0.9,
        PayerClass::Commercial => 2.5,
        PayerClass::SelfPay => 3.0,
    }
}

/// State factor plus the metro bonus
pub fn region_factor(location: &Location) -> f64 {
    let state = location.region.trim().to_uppercase();
    let base = STATE_FACTORS
        .iter()
        .find(|(code, _)| *code == state)
        .map(|(_, factor)| *factor)
        .unwrap_or(1.0);

    if location.is_metro() {
        base + METRO_BONUS
    } else {
        base
    }
}

/// Multiplier for one modifier; unknown modifiers are no-ops
pub fn modifier_factor(modifier: &str) -> f64 {
    match modifier.trim().to_uppercase().as_str() {
        "TC" => 0.6,
        "26" => 0.4,
        "50" => 1.5,
        _ => 1.0,
    }
}

/// Reference rate adjusted for geography and modifiers, payer-neutral
///
/// This is the baseline a billed price is benchmarked against: a payer
/// multiplier at or below the audit sensitivity never crosses it.
pub fn locality_reference(reference_rate: f64, location: &Location, modifiers: &[String]) -> f64 {
    let modifiers: f64 = modifiers.iter().map(|m| modifier_factor(m)).product();
    reference_rate * region_factor(location) * modifiers
}

/// Billed price for a reference rate
pub fn billed_price(
    reference_rate: f64,
    payer: impl Into<PayerFactor>,
    location: &Location,
    modifiers: &[String],
) -> f64 {
    let modifiers: f64 = modifiers.iter().map(|m| modifier_factor(m)).product();
    round2(reference_rate * payer.into().value() * region_factor(location) * modifiers)
}
