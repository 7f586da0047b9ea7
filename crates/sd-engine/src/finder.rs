//! Source finder: which entities could take a request, and the path cost
//! queries that will score them.

use sd_core::{EntityId, RequestId, RequestKind};
use sd_request::{Candidate, ServiceRequest};
use sd_spatial::{PathQuery, SpatialIndex};

use crate::world::MatchView;

/// A candidate waiting on its path cost.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CandidateQuery {
    pub candidate: Candidate,
    pub query:     PathQuery,
}

/// Candidates for a forward request.
///
/// Searches the target's district first and falls back to every district
/// when that finds nothing.  At most `group_size` nearest sources are kept.
pub(crate) fn find_sources(
    request: &ServiceRequest,
    view: &MatchView<'_>,
    sources: &dyn SpatialIndex,
) -> Vec<CandidateQuery> {
    let Some(target) = view.targets.get(request.target) else {
        return Vec::new();
    };
    let config = view.kinds.get(request.kind);
    let eligible = |id: EntityId| view.can_accept(id, request.kind, request.priority);

    let mut found = Vec::new();
    if let Some(district) = target.district {
        let in_district = |id: EntityId| view.source_district(id) == Some(district) && eligible(id);
        found = sources.query(target.position, config.search_radius, &in_district);
    }
    if found.is_empty() {
        found = sources.query(target.position, config.search_radius, &eligible);
    }
    found.truncate(request.group_size as usize);

    found
        .into_iter()
        .filter_map(|source| {
            let origin = view.source_position(source)?;
            Some(CandidateQuery {
                candidate: Candidate { source, request: request.id, tie_key: source, cost: 0.0, duration: 0 },
                query: PathQuery::new(origin, target.position, config.weights, config.max_speed),
            })
        })
        .collect()
}

/// Candidates for a reversed request: open forward requests of the same
/// kind near the advertiser.  Costs run target → advertiser.
pub(crate) fn find_requests(
    advert: &ServiceRequest,
    view: &MatchView<'_>,
    open: &dyn SpatialIndex,
) -> Vec<CandidateQuery> {
    let source = advert.target;
    let Some(home) = view.source_position(source) else {
        return Vec::new();
    };
    let config = view.kinds.get(advert.kind);
    let has_open = |target: EntityId| open_request(view, target, advert.kind).is_some();

    let mut found = open.query(home, config.search_radius, &has_open);
    found.truncate(advert.group_size as usize);

    found
        .into_iter()
        .filter_map(|target| {
            let request = open_request(view, target, advert.kind)?;
            let origin = view.targets.get(target)?.position;
            Some(CandidateQuery {
                candidate: Candidate { source, request, tie_key: target, cost: 0.0, duration: 0 },
                query: PathQuery::new(origin, home, config.weights, config.max_speed),
            })
        })
        .collect()
}

/// The unbound forward `kind` request on `target`, if any.
pub(crate) fn open_request(view: &MatchView<'_>, target: EntityId, kind: RequestKind) -> Option<RequestId> {
    let id = view.requests.find(target, kind, false)?;
    let request = view.requests.get(id)?;
    (!request.is_bound() && request.search.is_none()).then_some(id)
}
