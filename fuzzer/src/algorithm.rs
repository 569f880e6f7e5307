use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// Detector families swept by the fuzzer, in processing order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive)]
#[repr(u8)]
pub enum Algorithm {
    #[strum(serialize = "AKAZE")]
    #[serde(rename = "AKAZE")]
    Akaze,
    #[strum(serialize = "AGAST")]
    #[serde(rename = "AGAST")]
    Agast,
    #[strum(serialize = "ORB")]
    #[serde(rename = "ORB")]
    Orb,
    #[strum(serialize = "STAR")]
    #[serde(rename = "STAR")]
    Star,
    #[strum(serialize = "SIFT")]
    #[serde(rename = "SIFT")]
    Sift,
}

impl Algorithm {
    pub fn name(self) -> &'static str {
        self.into()
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Specified algorithm '{0}' was not recognized")]
pub struct UnknownAlgorithm(pub String);

/// Bitset of enabled detector families.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AlgorithmSet(u8);

impl AlgorithmSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Algorithm::iter().collect()
    }

    pub fn insert(&mut self, algorithm: Algorithm) {
        self.0 |= algorithm.bit();
    }

    pub fn contains(&self, algorithm: Algorithm) -> bool {
        self.0 & algorithm.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Enabled algorithms in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = Algorithm> + '_ {
        Algorithm::iter().filter(|algorithm| self.contains(*algorithm))
    }
}

impl FromIterator<Algorithm> for AlgorithmSet {
    fn from_iter<I: IntoIterator<Item = Algorithm>>(iter: I) -> Self {
        let mut set = AlgorithmSet::empty();
        for algorithm in iter {
            set.insert(algorithm);
        }
        set
    }
}

/// Parses a comma separated list such as `"akaze, ORB"`.
impl FromStr for AlgorithmSet {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .map(|name| Algorithm::from_str(name).map_err(|_| UnknownAlgorithm(name.to_string())))
            .collect()
    }
}

/// Serialized as the comma separated list; an empty string is the empty set.
impl Serialize for AlgorithmSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AlgorithmSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        if value.trim().is_empty() {
            return Ok(AlgorithmSet::empty());
        }
        value.parse().map_err(de::Error::custom)
    }
}

impl fmt::Debug for AlgorithmSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for AlgorithmSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(Algorithm::name).collect();
        write!(f, "{}", names.join(","))
    }
}
