//! Best-effort US address component parser
//!
//! Splits a free-form address into labelled components (house number,
//! street name, suffix, unit, city, state, zip, country). Parsing is lenient:
//! anything it cannot place is dropped, and input it cannot make sense of at
//! all yields an empty component map.

use ahash::AHashSet;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use thiserror::Error;

/// Labelled address component
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    AddressNumber,
    StreetName,
    StreetNamePostType,
    StreetNamePostDirectional,
    OccupancyType,
    OccupancyIdentifier,
    PlaceName,
    StateName,
    ZipCode,
    CountryName,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::AddressNumber => "AddressNumber",
            ComponentKind::StreetName => "StreetName",
            ComponentKind::StreetNamePostType => "StreetNamePostType",
            ComponentKind::StreetNamePostDirectional => "StreetNamePostDirectional",
            ComponentKind::OccupancyType => "OccupancyType",
            ComponentKind::OccupancyIdentifier => "OccupancyIdentifier",
            ComponentKind::PlaceName => "PlaceName",
            ComponentKind::StateName => "StateName",
            ComponentKind::ZipCode => "ZipCode",
            ComponentKind::CountryName => "CountryName",
        }
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Components that take part in address comparison
pub const COMPARED_COMPONENTS: [ComponentKind; 4] = [
    ComponentKind::AddressNumber,
    ComponentKind::StreetName,
    ComponentKind::StreetNamePostType,
    ComponentKind::PlaceName,
];

pub type AddressComponents = BTreeMap<ComponentKind, String>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AddressParseError {
    #[error("no street line in {0:?}")]
    MissingStreet(String),

    #[error("component {0} appears more than once")]
    RepeatedComponent(ComponentKind),
}

type Tokens<'a> = SmallVec<[&'a str; 8]>;

static STATE_ZIP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?P<state>[A-Za-z]{2})\s+)?(?P<zip>\d{5}(?:-\d{4})?)$")
        .expect("valid state/zip pattern")
});
static HOUSE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(?:-\d+)?[A-Za-z]?$").expect("valid house number pattern"));
static ZIP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{5}(?:-\d{4})?$").expect("valid zip pattern"));

static STREET_SUFFIXES: Lazy<AHashSet<&'static str>> = Lazy::new(|| {
    [
        "street", "st", "avenue", "ave", "road", "rd", "drive", "dr", "boulevard", "blvd",
        "lane", "ln", "court", "ct", "place", "pl", "circle", "cir", "way", "parkway", "pkwy",
        "terrace", "ter", "highway", "hwy", "trail", "trl", "square", "sq", "alley", "loop",
        "plaza", "row", "path", "pike",
    ]
    .into_iter()
    .collect()
});

static DIRECTIONALS: Lazy<AHashSet<&'static str>> = Lazy::new(|| {
    [
        "n", "s", "e", "w", "ne", "nw", "se", "sw", "north", "south", "east", "west",
        "northeast", "northwest", "southeast", "southwest",
    ]
    .into_iter()
    .collect()
});

static OCCUPANCY_TYPES: Lazy<AHashSet<&'static str>> = Lazy::new(|| {
    [
        "apt", "apartment", "suite", "ste", "unit", "#", "rm", "room", "fl", "floor", "bldg",
        "building",
    ]
    .into_iter()
    .collect()
});

static STATES: Lazy<AHashSet<&'static str>> = Lazy::new(|| {
    [
        "al", "ak", "az", "ar", "ca", "co", "ct", "de", "fl", "ga", "hi", "id", "il", "in", "ia",
        "ks", "ky", "la", "me", "md", "ma", "mi", "mn", "ms", "mo", "mt", "ne", "nv", "nh", "nj",
        "nm", "ny", "nc", "nd", "oh", "ok", "or", "pa", "ri", "sc", "sd", "tn", "tx", "ut", "vt",
        "va", "wa", "wv", "wi", "wy", "dc",
    ]
    .into_iter()
    .collect()
});

const COUNTRIES: &[&str] = &[
    "usa",
    "us",
    "u.s.",
    "u.s.a.",
    "united states",
    "united states of america",
];

/// Parse an address into components, logging and returning an empty map
/// when the address cannot be parsed
pub fn parse_address_components(address: &str) -> AddressComponents {
    match try_parse_address(address) {
        Ok(components) => components,
        Err(e) => {
            tracing::warn!("Failed to parse address {:?}: {}", address, e);
            AddressComponents::new()
        }
    }
}

/// Parse an address into components
///
/// Blank input parses to an empty map. Segments are separated by commas or
/// newlines; the first is the street line, trailing segments may carry the
/// country and `STATE ZIP`, and the segment after the street line is the
/// place name. A single-segment address takes the tokens after the street
/// suffix as the place name.
pub fn try_parse_address(address: &str) -> Result<AddressComponents, AddressParseError> {
    let mut components = AddressComponents::new();
    let mut segments: Vec<&str> = address
        .split([',', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if segments.is_empty() {
        return Ok(components);
    }

    if segments.len() > 1 {
        if let Some(&last) = segments.last() {
            if COUNTRIES.contains(&last.to_lowercase().as_str()) {
                components.insert(ComponentKind::CountryName, last.to_string());
                segments.pop();
            }
        }
    }

    if segments.len() > 1 {
        if let Some(&last) = segments.last() {
            if let Some(caps) = STATE_ZIP.captures(last) {
                if let Some(state) = caps.name("state") {
                    components.insert(ComponentKind::StateName, state.as_str().to_string());
                }
                components.insert(ComponentKind::ZipCode, caps["zip"].to_string());
                segments.pop();
            } else if is_state(last) {
                components.insert(ComponentKind::StateName, last.to_string());
                segments.pop();
            }
        }
    }

    let street_line = segments[0];
    let single_segment = segments.len() == 1;

    if let Some(place) = segments.get(1) {
        let mut tokens = tokenize(place);
        take_state_zip(&mut tokens, &mut components);
        if !tokens.is_empty() {
            components.insert(ComponentKind::PlaceName, tokens.join(" "));
        }
    }

    parse_street_line(street_line, single_segment, &mut components)?;
    Ok(components)
}

fn parse_street_line(
    line: &str,
    single_segment: bool,
    components: &mut AddressComponents,
) -> Result<(), AddressParseError> {
    let mut tokens = tokenize(line);
    if tokens.is_empty() {
        return Err(AddressParseError::MissingStreet(line.to_string()));
    }

    take_occupancy(&mut tokens, components)?;

    let mut rest: &[&str] = &tokens;
    if let Some((first, tail)) = rest.split_first() {
        if HOUSE_NUMBER.is_match(first) && !tail.is_empty() {
            components.insert(ComponentKind::AddressNumber, first.to_string());
            rest = tail;
        }
    }

    // Last suffix that still leaves a street name in front of it
    let suffix_at = rest
        .iter()
        .enumerate()
        .skip(1)
        .rev()
        .find(|(_, t)| STREET_SUFFIXES.contains(t.to_lowercase().as_str()))
        .map(|(i, _)| i);

    let Some(suffix_at) = suffix_at else {
        if rest.is_empty() {
            return Err(AddressParseError::MissingStreet(line.to_string()));
        }
        components.insert(ComponentKind::StreetName, rest.join(" "));
        return Ok(());
    };

    components.insert(ComponentKind::StreetName, rest[..suffix_at].join(" "));
    components.insert(ComponentKind::StreetNamePostType, rest[suffix_at].to_string());

    let mut trailing: Tokens = rest[suffix_at + 1..].iter().copied().collect();
    if let Some(first) = trailing.first() {
        if DIRECTIONALS.contains(first.to_lowercase().as_str()) {
            components.insert(ComponentKind::StreetNamePostDirectional, first.to_string());
            trailing.remove(0);
        }
    }

    if single_segment {
        take_state_zip(&mut trailing, components);
        if !trailing.is_empty() && !components.contains_key(&ComponentKind::PlaceName) {
            components.insert(ComponentKind::PlaceName, trailing.join(" "));
        }
    }

    Ok(())
}

/// Remove occupancy markers (`apt 4`, `suite 200`, `#12`) from the tokens
fn take_occupancy(
    tokens: &mut Tokens<'_>,
    components: &mut AddressComponents,
) -> Result<(), AddressParseError> {
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        let lowered = token.to_lowercase();

        let (kind, identifier, width) = if OCCUPANCY_TYPES.contains(lowered.as_str()) {
            match tokens.get(i + 1) {
                Some(id) => (token, id.trim_start_matches('#').to_string(), 2),
                None => {
                    i += 1;
                    continue;
                }
            }
        } else if let Some(id) = token.strip_prefix('#').filter(|id| !id.is_empty()) {
            ("#", id.to_string(), 1)
        } else {
            i += 1;
            continue;
        };

        if components.contains_key(&ComponentKind::OccupancyType) {
            return Err(AddressParseError::RepeatedComponent(
                ComponentKind::OccupancyType,
            ));
        }
        components.insert(ComponentKind::OccupancyType, kind.to_string());
        components.insert(ComponentKind::OccupancyIdentifier, identifier);
        tokens.drain(i..i + width);
    }
    Ok(())
}

/// Strip a trailing `[STATE] [ZIP]` run from the tokens
fn take_state_zip(tokens: &mut Tokens<'_>, components: &mut AddressComponents) {
    if let Some(&last) = tokens.last() {
        if ZIP.is_match(last) {
            components.insert(ComponentKind::ZipCode, last.to_string());
            tokens.pop();
        }
    }
    if tokens.len() > 1 {
        if let Some(&last) = tokens.last() {
            if is_state(last) {
                components.insert(ComponentKind::StateName, last.to_string());
                tokens.pop();
            }
        }
    }
}

fn is_state(token: &str) -> bool {
    token.len() == 2 && STATES.contains(token.to_lowercase().as_str())
}

fn tokenize(segment: &str) -> Tokens<'_> {
    segment
        .split_whitespace()
        .map(|t| t.trim_end_matches(['.', ';']))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Fraction of compared components that agree, case-insensitively
///
/// Only kinds present on at least one side count. Returns `None` when no
/// kind counted.
pub fn component_agreement(a: &AddressComponents, b: &AddressComponents) -> Option<f64> {
    let mut matches = 0usize;
    let mut total = 0usize;
    for kind in COMPARED_COMPONENTS {
        let value1 = a.get(&kind).map(String::as_str).unwrap_or("");
        let value2 = b.get(&kind).map(String::as_str).unwrap_or("");
        if value1.is_empty() && value2.is_empty() {
            continue;
        }
        total += 1;
        if value1.to_lowercase() == value2.to_lowercase() {
            matches += 1;
        }
    }
    (total > 0).then(|| matches as f64 / total as f64)
}
