//! Synthetic labelled record pairs for training
//!
//! Generates US-flavoured fake people and noisy variations of them. All
//! randomness comes from the injected generator, so a seeded `StdRng` gives
//! a reproducible dataset.

use idmatch_core::IdentityRecord;
use idmatch_similarity::{FeatureExtractor, FeatureVector};
use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const FIRST_NAMES: &[&str] = &[
    "James", "Mary", "Robert", "Patricia", "John", "Jennifer", "Michael", "Linda", "William",
    "Elizabeth", "David", "Barbara", "Richard", "Susan", "Joseph", "Jessica", "Thomas", "Sarah",
    "Charles", "Karen", "Christopher", "Nancy", "Daniel", "Lisa", "Matthew", "Betty", "Anthony",
    "Margaret", "Mark", "Sandra", "Donald", "Ashley", "Steven", "Kimberly", "Paul", "Emily",
    "Andrew", "Donna", "Joshua", "Michelle", "Kenneth", "Carol", "Kevin", "Amanda", "Brian",
    "Melissa", "George", "Deborah", "Timothy", "Stephanie", "Ronald", "Rebecca", "Jason",
    "Laura", "Edward", "Sharon", "Jeffrey", "Cynthia", "Ryan", "Kathleen", "Jacob", "Amy",
    "Gary", "Angela", "Nicholas", "Shirley", "Eric", "Anna", "Jonathan", "Brenda",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson", "Thomas", "Taylor",
    "Moore", "Jackson", "Martin", "Lee", "Perez", "Thompson", "White", "Harris", "Sanchez",
    "Clark", "Ramirez", "Lewis", "Robinson", "Walker", "Young", "Allen", "King", "Wright",
    "Scott", "Torres", "Nguyen", "Hill", "Flores", "Green", "Adams", "Nelson", "Baker", "Hall",
    "Rivera", "Campbell", "Mitchell", "Carter", "Roberts", "Gomez", "Phillips", "Evans",
    "Turner", "Diaz", "Parker", "Cruz", "Edwards", "Collins", "Reyes", "Stewart", "Morris",
];

const NAME_PREFIXES: &[&str] = &["Mr.", "Mrs.", "Ms.", "Dr."];
const NAME_SUFFIXES: &[&str] = &["Jr.", "Sr.", "II", "III", "MD", "PhD"];

const STREET_NAMES: &[&str] = &[
    "Main", "Oak", "Pine", "Maple", "Cedar", "Elm", "Washington", "Lake", "Hill", "Park",
    "Walnut", "Sunset", "Lincoln", "Jackson", "Church", "River", "Willow", "Highland", "Mill",
    "Spring", "Ridge", "Meadow", "Forest", "Jefferson", "Franklin", "Chestnut", "Birch",
    "Dogwood", "Madison", "Adams",
];

const STREET_SUFFIXES: &[&str] = &[
    "Street", "Avenue", "Road", "Lane", "Drive", "Court", "Boulevard", "Way", "Place", "Circle",
    "Terrace", "Trail",
];

const CITIES: &[&str] = &[
    "Springfield", "Riverside", "Franklin", "Greenville", "Bristol", "Clinton", "Fairview",
    "Salem", "Madison", "Georgetown", "Arlington", "Ashland", "Dover", "Oxford", "Jackson",
    "Burlington", "Manchester", "Milton", "Newport", "Auburn", "Dayton", "Lexington",
    "Milford", "Winchester", "Hudson", "Kingston", "Mount Vernon", "Lakewood", "Anytown",
];

const STATES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VA", "WA", "WV", "WI", "WY",
];

const EMAIL_DOMAINS: &[&str] = &[
    "gmail.com", "yahoo.com", "hotmail.com", "outlook.com", "example.com", "example.org",
    "example.net", "aol.com", "icloud.com", "proton.me",
];

/// `#` is replaced by a random digit
const PHONE_FORMATS: &[&str] = &[
    "###-###-####",
    "(###)###-####",
    "###.###.####",
    "###-###-####x###",
    "(###)###-####x####",
    "+1-###-###-####",
    "001-###-###-####x###",
    "##########",
];

const SECONDARY_UNITS: &[&str] = &["Apt.", "Suite"];

/// How a positive pair's second record is derived from the first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariationKind {
    Email,
    Name,
    Phone,
    Address,
    /// Two or three distinct single-field variations, composed
    Mixed,
}

impl VariationKind {
    pub const ALL: [VariationKind; 5] = [
        VariationKind::Email,
        VariationKind::Name,
        VariationKind::Phone,
        VariationKind::Address,
        VariationKind::Mixed,
    ];

    const SINGLE_FIELD: [VariationKind; 4] = [
        VariationKind::Email,
        VariationKind::Name,
        VariationKind::Phone,
        VariationKind::Address,
    ];
}

/// A generated pair with its ground-truth label
#[derive(Debug, Clone)]
pub struct LabeledPair {
    pub record1: IdentityRecord,
    pub record2: IdentityRecord,
    pub is_match: bool,
}

/// Feature vectors and labels, row-aligned
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub features: Vec<FeatureVector>,
    pub labels: Vec<bool>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|&&label| label).count()
    }
}

/// Fake identity generator over an injected random source
pub struct SyntheticDataGenerator<R: Rng> {
    rng: R,
}

impl SyntheticDataGenerator<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> SyntheticDataGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// A complete random person
    pub fn person(&mut self) -> IdentityRecord {
        IdentityRecord {
            name: Some(self.name()),
            email: Some(self.email()),
            phone: Some(self.phone()),
            address: Some(self.address()),
        }
    }

    pub fn first_name(&mut self) -> &'static str {
        self.pick(FIRST_NAMES)
    }

    pub fn last_name(&mut self) -> &'static str {
        self.pick(LAST_NAMES)
    }

    /// "First Last", occasionally with an honorific or suffix
    pub fn name(&mut self) -> String {
        let first = self.first_name();
        let last = self.last_name();
        match self.rng.random_range(0..20) {
            0 => format!("{} {} {}", self.pick(NAME_PREFIXES), first, last),
            1 => format!("{} {} {}", first, last, self.pick(NAME_SUFFIXES)),
            _ => format!("{} {}", first, last),
        }
    }

    pub fn email(&mut self) -> String {
        let first = self.first_name().to_lowercase();
        let last = self.last_name().to_lowercase();
        let user = match self.rng.random_range(0..5) {
            0 => format!("{}.{}", first, last),
            1 => format!("{}{}", first, last),
            2 => format!("{}{}", first, self.rng.random_range(1..100)),
            3 => format!("{}{}", &first[..1], last),
            _ => format!("{}_{}", last, first),
        };
        format!("{}@{}", user, self.pick(EMAIL_DOMAINS))
    }

    pub fn phone(&mut self) -> String {
        let format = self.pick(PHONE_FORMATS);
        format
            .chars()
            .map(|c| {
                if c == '#' {
                    char::from(b'0' + self.rng.random_range(0..10u8))
                } else {
                    c
                }
            })
            .collect()
    }

    /// "123 Oak Street[ Apt. 4], City, ST 12345"
    pub fn address(&mut self) -> String {
        let number = self.rng.random_range(1..10_000);
        let street = self.pick(STREET_NAMES);
        let suffix = self.pick(STREET_SUFFIXES);
        let unit = if self.rng.random_bool(0.2) {
            format!(" {} {}", self.pick(SECONDARY_UNITS), self.rng.random_range(1..1000))
        } else {
            String::new()
        };
        let city = self.pick(CITIES);
        let state = self.pick(STATES);
        let zip = self.rng.random_range(10_000..100_000);
        format!("{} {} {}{}, {}, {} {}", number, street, suffix, unit, city, state, zip)
    }

    /// Derive a noisy copy of `base` that still describes the same person
    pub fn variation(&mut self, base: &IdentityRecord, kind: VariationKind) -> IdentityRecord {
        let mut variant = base.clone();
        match kind {
            VariationKind::Email => variant.email = Some(self.vary_email(base.email_str())),
            VariationKind::Name => variant.name = Some(self.vary_name(base.name_str())),
            VariationKind::Phone => variant.phone = Some(self.vary_phone(base.phone_str())),
            VariationKind::Address => variant.address = Some(self.vary_address(base.address_str())),
            VariationKind::Mixed => {
                let count = self.rng.random_range(2..=3);
                let mut kinds = VariationKind::SINGLE_FIELD;
                kinds.shuffle(&mut self.rng);
                for kind in &kinds[..count] {
                    variant = self.variation(&variant, *kind);
                }
            }
        }
        variant
    }

    fn vary_email(&mut self, email: &str) -> String {
        let Some((user, domain)) = email.split_once('@') else {
            return self.email();
        };
        let domain = domain.split('@').next().unwrap_or(domain);
        let user = if self.rng.random::<f64>() < 0.5 {
            format!("{}{}", user, self.rng.random_range(1..=999))
        } else {
            user.replace(['.', '_'], "")
        };
        format!("{}@{}", user, domain)
    }

    fn vary_name(&mut self, name: &str) -> String {
        if name.is_empty() {
            return self.name();
        }
        let parts: Vec<&str> = name.split_whitespace().collect();
        if parts.len() >= 2 {
            if self.rng.random::<f64>() < 0.5 {
                let initial = char::from(b'A' + self.rng.random_range(0..26u8));
                format!("{} {}. {}", parts[0], initial, parts[1])
            } else {
                format!("{} {}", parts[1], parts[0])
            }
        } else {
            format!("{} {}", name, self.last_name())
        }
    }

    fn vary_phone(&mut self, phone: &str) -> String {
        if phone.is_empty() {
            return self.phone();
        }
        let digits: Vec<char> = phone.chars().filter(char::is_ascii_digit).collect();
        if digits.len() < 10 {
            return phone.to_string();
        }
        let last10: String = digits[digits.len() - 10..].iter().collect();
        format!("({}) {}-{}", &last10[..3], &last10[3..6], &last10[6..])
    }

    fn vary_address(&mut self, address: &str) -> String {
        if address.is_empty() {
            return self.address();
        }
        address.replace("Street", "St").replace("Avenue", "Ave")
    }

    /// A positive pair (same person, one variation) with probability 0.5,
    /// otherwise two independent people
    pub fn labeled_pair(&mut self) -> LabeledPair {
        let record1 = self.person();
        let is_match = self.rng.random::<f64>() < 0.5;
        let record2 = if is_match {
            let kind = *VariationKind::ALL
                .choose(&mut self.rng)
                .unwrap_or(&VariationKind::Mixed);
            self.variation(&record1, kind)
        } else {
            self.person()
        };
        LabeledPair {
            record1,
            record2,
            is_match,
        }
    }

    /// `n` labelled pairs turned into feature vectors
    pub fn dataset(&mut self, n: usize, extractor: &FeatureExtractor) -> Dataset {
        let mut dataset = Dataset {
            features: Vec::with_capacity(n),
            labels: Vec::with_capacity(n),
        };
        for _ in 0..n {
            let pair = self.labeled_pair();
            dataset
                .features
                .push(extractor.extract(&pair.record1, &pair.record2));
            dataset.labels.push(pair.is_match);
        }
        dataset
    }

    fn pick(&mut self, items: &[&'static str]) -> &'static str {
        items.choose(&mut self.rng).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idmatch_core::MatchConfig;

    fn is_paren_phone(s: &str) -> bool {
        s.len() == 14
            && s.chars().enumerate().all(|(i, c)| match i {
                0 => c == '(',
                4 => c == ')',
                5 => c == ' ',
                9 => c == '-',
                _ => c.is_ascii_digit(),
            })
    }

    fn base() -> IdentityRecord {
        IdentityRecord::new()
            .with_name("John Doe")
            .with_email("john.doe@gmail.com")
            .with_phone("555.123.4567x89")
            .with_address("123 Main Street, Anytown, CA 90210")
    }

    #[test]
    fn test_reproducible_for_seed() {
        let mut a = SyntheticDataGenerator::seeded(7);
        let mut b = SyntheticDataGenerator::seeded(7);
        for _ in 0..50 {
            let pa = a.labeled_pair();
            let pb = b.labeled_pair();
            assert_eq!(pa.record1, pb.record1);
            assert_eq!(pa.record2, pb.record2);
            assert_eq!(pa.is_match, pb.is_match);
        }
    }

    #[test]
    fn test_person_is_complete() {
        let mut generator = SyntheticDataGenerator::seeded(1);
        for _ in 0..100 {
            let person = generator.person();
            assert!(!person.name_str().is_empty());
            assert!(person.email_str().contains('@'));
            assert!(person.phone_str().chars().filter(char::is_ascii_digit).count() >= 10);
            assert!(person.address_str().contains(", "));
        }
    }

    #[test]
    fn test_email_variation() {
        let mut generator = SyntheticDataGenerator::seeded(3);
        for _ in 0..50 {
            let variant = generator.variation(&base(), VariationKind::Email);
            let email = variant.email_str();
            assert!(email.ends_with("@gmail.com"));
            let user = email.split('@').next().unwrap();
            let with_digits = user.starts_with("john.doe")
                && user["john.doe".len()..].chars().all(|c| c.is_ascii_digit());
            assert!(with_digits || user == "johndoe", "{}", email);
            assert_eq!(variant.name, base().name);
        }
    }

    #[test]
    fn test_email_variation_without_at() {
        let mut generator = SyntheticDataGenerator::seeded(3);
        let record = IdentityRecord::new().with_email("not-an-email");
        let variant = generator.variation(&record, VariationKind::Email);
        assert!(variant.email_str().contains('@'));
    }

    #[test]
    fn test_name_variation() {
        let mut generator = SyntheticDataGenerator::seeded(5);
        for _ in 0..50 {
            let name = generator.variation(&base(), VariationKind::Name).name.unwrap();
            let initial = name.starts_with("John ") && name.ends_with(". Doe") && name.len() == 11;
            assert!(initial || name == "Doe John", "{}", name);
        }

        let single = IdentityRecord::new().with_name("Cher");
        let name = generator.variation(&single, VariationKind::Name).name.unwrap();
        assert!(name.starts_with("Cher "));
    }

    #[test]
    fn test_phone_and_address_variation() {
        let mut generator = SyntheticDataGenerator::seeded(9);
        let phone = generator.variation(&base(), VariationKind::Phone).phone.unwrap();
        // Extension digits shift the last ten
        assert_eq!(phone, "(512) 345-6789");
        assert!(is_paren_phone(&phone));

        let short = IdentityRecord::new().with_phone("12345");
        assert_eq!(
            generator.variation(&short, VariationKind::Phone).phone.as_deref(),
            Some("12345")
        );

        let address = generator.variation(&base(), VariationKind::Address).address.unwrap();
        assert_eq!(address, "123 Main St, Anytown, CA 90210");
    }

    #[test]
    fn test_mixed_variation_changes_several_fields() {
        let mut generator = SyntheticDataGenerator::seeded(11);
        for _ in 0..30 {
            let variant = generator.variation(&base(), VariationKind::Mixed);
            let original = base();
            let changed = [
                variant.email != original.email,
                variant.name != original.name,
                variant.phone != original.phone,
                variant.address != original.address,
            ]
            .iter()
            .filter(|&&c| c)
            .count();
            assert!((2..=3).contains(&changed), "{:?}", variant);
        }
    }

    #[test]
    fn test_dataset_is_roughly_balanced() {
        let extractor = FeatureExtractor::new(&MatchConfig::default()).unwrap();
        let mut generator = SyntheticDataGenerator::seeded(42);
        let dataset = generator.dataset(1000, &extractor);

        assert_eq!(dataset.len(), 1000);
        assert_eq!(dataset.features.len(), 1000);
        let positives = dataset.positives();
        assert!((400..=600).contains(&positives), "{}", positives);
    }
}
