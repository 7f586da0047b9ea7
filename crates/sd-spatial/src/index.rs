//! Entity spatial index.
//!
//! The source finder asks "which sources lie near this target?" and the
//! reversed search asks "which targets lie near this source?".  Both go
//! through the [`SpatialIndex`] trait; [`EntityIndex`] answers them from an
//! R-tree rebuilt once per tick from current entity positions.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use sd_core::{EntityId, Position};

/// Radius/filter query over positioned entities.
pub trait SpatialIndex: Send + Sync {
    /// Entities within `radius` of `center` (unbounded when `None`) accepted
    /// by `filter`, ordered by ascending distance with ties broken by id.
    fn query(
        &self,
        center: Position,
        radius: Option<f32>,
        filter: &dyn Fn(EntityId) -> bool,
    ) -> Vec<EntityId>;
}

#[derive(Clone, Debug)]
struct EntityEntry {
    point: [f32; 2],
    id:    EntityId,
}

impl RTreeObject for EntityEntry {
    type Envelope = AABB<[f32; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for EntityEntry {
    fn distance_2(&self, point: &[f32; 2]) -> f32 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}

/// R-tree backed [`SpatialIndex`].
#[derive(Default)]
pub struct EntityIndex {
    tree: RTree<EntityEntry>,
}

impl EntityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-load from `(id, position)` pairs, replacing the current contents.
    pub fn rebuild<I>(&mut self, entities: I)
    where
        I: IntoIterator<Item = (EntityId, Position)>,
    {
        let entries = entities
            .into_iter()
            .map(|(id, pos)| EntityEntry { point: pos.as_array(), id })
            .collect();
        self.tree = RTree::bulk_load(entries);
    }

    pub fn from_entities<I>(entities: I) -> Self
    where
        I: IntoIterator<Item = (EntityId, Position)>,
    {
        let mut index = Self::new();
        index.rebuild(entities);
        index
    }

    pub fn insert(&mut self, id: EntityId, pos: Position) {
        self.tree.insert(EntityEntry { point: pos.as_array(), id });
    }

    /// Remove `id` previously inserted at `pos`.  Returns `false` if absent.
    pub fn remove(&mut self, id: EntityId, pos: Position) -> bool {
        self.tree
            .remove(&EntityEntry { point: pos.as_array(), id })
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

impl PartialEq for EntityEntry {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.point == other.point
    }
}

impl SpatialIndex for EntityIndex {
    fn query(
        &self,
        center: Position,
        radius: Option<f32>,
        filter: &dyn Fn(EntityId) -> bool,
    ) -> Vec<EntityId> {
        let point = center.as_array();
        let mut hits: Vec<(f32, EntityId)> = match radius {
            Some(r) => self
                .tree
                .locate_within_distance(point, r * r)
                .filter(|e| filter(e.id))
                .map(|e| (e.distance_2(&point), e.id))
                .collect(),
            None => self
                .tree
                .iter()
                .filter(|e| filter(e.id))
                .map(|e| (e.distance_2(&point), e.id))
                .collect(),
        };
        hits.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        hits.into_iter().map(|(_, id)| id).collect()
    }
}
