//! Service targets: the sites requests are raised for.
//!
//! Producers own the incident models that raise `need`; the engine reads it
//! for validation and lowers it while servicing.  Each target also records,
//! per kind, which request currently claims it.

use std::collections::BTreeMap;

use sd_core::{DistrictId, EntityId, KindConfig, Position, RequestId, RequestKind};

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Target {
    pub id:       EntityId,
    pub position: Position,
    #[cfg_attr(feature = "serde", serde(default))]
    pub district: Option<DistrictId>,
    /// Site secured (crime detected, scene closed off).
    #[cfg_attr(feature = "serde", serde(default))]
    pub secured:  bool,
    needs:        [f32; RequestKind::COUNT],
    claims:       [Option<RequestId>; RequestKind::COUNT],
}

impl Target {
    pub fn new(id: EntityId, position: Position, district: Option<DistrictId>) -> Self {
        Self {
            id,
            position,
            district,
            secured: false,
            needs: [0.0; RequestKind::COUNT],
            claims: [None; RequestKind::COUNT],
        }
    }

    #[inline]
    pub fn need(&self, kind: RequestKind) -> f32 {
        self.needs[kind.index()]
    }

    pub fn set_need(&mut self, kind: RequestKind, need: f32) {
        self.needs[kind.index()] = need.max(0.0);
    }

    pub fn add_need(&mut self, kind: RequestKind, amount: f32) {
        let slot = &mut self.needs[kind.index()];
        *slot = (*slot + amount).max(0.0);
    }

    /// Lower need by up to `amount`; returns how much was actually removed.
    pub fn reduce_need(&mut self, kind: RequestKind, amount: f32) -> f32 {
        let slot = &mut self.needs[kind.index()];
        let removed = amount.clamp(0.0, *slot);
        *slot -= removed;
        removed
    }

    /// Need above the kind's threshold, unless securing the site settles it.
    pub fn needs_service(&self, kind: RequestKind, config: &KindConfig) -> bool {
        if config.clears_on_secure && self.secured {
            return false;
        }
        self.need(kind) > config.need_threshold
    }

    #[inline]
    pub fn claim(&self, kind: RequestKind) -> Option<RequestId> {
        self.claims[kind.index()]
    }

    pub fn set_claim(&mut self, kind: RequestKind, request: RequestId) {
        self.claims[kind.index()] = Some(request);
    }

    /// Release the claim only if `request` still holds it.
    pub fn release_claim(&mut self, kind: RequestKind, request: RequestId) -> bool {
        let slot = &mut self.claims[kind.index()];
        if *slot == Some(request) {
            *slot = None;
            true
        } else {
            false
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct TargetStore {
    targets: BTreeMap<EntityId, Target>,
}

impl TargetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, target: Target) -> Option<Target> {
        self.targets.insert(target.id, target)
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Target> {
        self.targets.remove(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Target> {
        self.targets.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Target> {
        self.targets.get_mut(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.targets.contains_key(&id)
    }

    /// Targets in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.targets.values()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// `true` if `id` exists and still needs `kind` under `config`.
    pub fn needs_service(&self, id: EntityId, kind: RequestKind, config: &KindConfig) -> bool {
        self.targets.get(&id).is_some_and(|t| t.needs_service(kind, config))
    }

    pub fn to_vec(&self) -> Vec<Target> {
        self.targets.values().cloned().collect()
    }
}

impl FromIterator<Target> for TargetStore {
    fn from_iter<I: IntoIterator<Item = Target>>(iter: I) -> Self {
        Self { targets: iter.into_iter().map(|t| (t.id, t)).collect() }
    }
}
