//! Request kinds and kind sets.
//!
//! Every service the engine dispatches is one `RequestKind`.  Behaviour that
//! differs between kinds lives in [`KindConfig`](crate::KindConfig) rows, not
//! in per-kind code paths.

use std::str::FromStr;

use crate::CoreError;

/// The service a request asks for.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RequestKind {
    /// Routine police patrol of a crime-prone site.
    Patrol,
    /// Police emergency (crime in progress, accident site).
    Emergency,
    /// Fire and rescue.
    Rescue,
    /// Garbage collection.
    Collection,
    /// Mail pickup and delivery.
    Delivery,
    /// Passengers waiting at a transit stop.
    Boarding,
}

impl RequestKind {
    pub const COUNT: usize = 6;

    pub const ALL: [RequestKind; RequestKind::COUNT] = [
        RequestKind::Patrol,
        RequestKind::Emergency,
        RequestKind::Rescue,
        RequestKind::Collection,
        RequestKind::Delivery,
        RequestKind::Boarding,
    ];

    /// Dense index for per-kind arrays.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Label used in CSV config rows and output columns.
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::Patrol     => "patrol",
            RequestKind::Emergency  => "emergency",
            RequestKind::Rescue     => "rescue",
            RequestKind::Collection => "collection",
            RequestKind::Delivery   => "delivery",
            RequestKind::Boarding   => "boarding",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::UnknownKind(s.to_owned()))
    }
}

// ── KindSet ───────────────────────────────────────────────────────────────────

/// Compact set of request kinds: a station's purpose mask or the kinds a
/// vehicle can serve.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KindSet(u8);

impl KindSet {
    pub const EMPTY: KindSet = KindSet(0);

    pub fn only(kind: RequestKind) -> Self {
        KindSet(1 << kind.index())
    }

    pub fn with(self, kind: RequestKind) -> Self {
        KindSet(self.0 | (1 << kind.index()))
    }

    #[inline]
    pub fn contains(self, kind: RequestKind) -> bool {
        self.0 & (1 << kind.index()) != 0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = RequestKind> {
        RequestKind::ALL.into_iter().filter(move |k| self.contains(*k))
    }
}

impl FromIterator<RequestKind> for KindSet {
    fn from_iter<I: IntoIterator<Item = RequestKind>>(iter: I) -> Self {
        iter.into_iter().fold(KindSet::EMPTY, KindSet::with)
    }
}

impl From<RequestKind> for KindSet {
    fn from(kind: RequestKind) -> Self {
        KindSet::only(kind)
    }
}
