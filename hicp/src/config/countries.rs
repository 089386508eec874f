//! EU member-state registry.
//!
//! The single place the country set is defined. Codes follow Eurostat
//! conventions (`EL` for Greece).

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

/// Membership as of the UK's withdrawal (1 February 2020).
pub const EU27_VERSION: &str = "2020-02";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Country {
    pub code: &'static str,
    pub name: &'static str,
    /// Other labels Eurostat exports use for the same member state.
    pub aliases: &'static [&'static str],
}

const fn country(code: &'static str, name: &'static str, aliases: &'static [&'static str]) -> Country {
    Country { code, name, aliases }
}

pub static EU27: [Country; 27] = [
    country("AT", "Austria", &[]),
    country("BE", "Belgium", &[]),
    country("BG", "Bulgaria", &[]),
    country("HR", "Croatia", &[]),
    country("CY", "Cyprus", &[]),
    country("CZ", "Czechia", &["Czech Republic"]),
    country("DK", "Denmark", &[]),
    country("EE", "Estonia", &[]),
    country("FI", "Finland", &[]),
    country("FR", "France", &[]),
    country(
        "DE",
        "Germany",
        &["Germany (until 1990 former territory of the FRG)"],
    ),
    country("EL", "Greece", &["GR"]),
    country("HU", "Hungary", &[]),
    country("IE", "Ireland", &[]),
    country("IT", "Italy", &[]),
    country("LV", "Latvia", &[]),
    country("LT", "Lithuania", &[]),
    country("LU", "Luxembourg", &[]),
    country("MT", "Malta", &[]),
    country("NL", "Netherlands", &[]),
    country("PL", "Poland", &[]),
    country("PT", "Portugal", &[]),
    country("RO", "Romania", &[]),
    country("SK", "Slovakia", &[]),
    country("SI", "Slovenia", &[]),
    country("ES", "Spain", &[]),
    country("SE", "Sweden", &[]),
];

static EU27_SET: Lazy<CountrySet> = Lazy::new(|| CountrySet::new(&EU27));

/// The EU27 registry.
pub fn eu27() -> &'static CountrySet {
    &EU27_SET
}

/// Lookup of countries by code, name or alias.
#[derive(Debug)]
pub struct CountrySet {
    countries: &'static [Country],
    by_key: HashMap<String, &'static Country>,
}

fn normalize(label: &str) -> String {
    label.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

impl CountrySet {
    pub fn new(countries: &'static [Country]) -> Self {
        let mut by_key = HashMap::new();
        for c in countries {
            by_key.insert(normalize(c.code), c);
            by_key.insert(normalize(c.name), c);
            for alias in c.aliases {
                by_key.insert(normalize(alias), c);
            }
        }
        Self { countries, by_key }
    }

    /// Resolve a sheet row label to a member state.
    pub fn resolve(&self, label: &str) -> Option<&'static Country> {
        self.by_key.get(&normalize(label)).copied()
    }

    pub fn contains_code(&self, code: &str) -> bool {
        self.countries.iter().any(|c| c.code == code)
    }

    pub fn codes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.countries.iter().map(|c| c.code)
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }
}
