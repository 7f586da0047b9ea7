//! The request pass: one read-only decision per live request.

use sd_request::{DropReason, ServiceRequest, Validation, validate};
use sd_spatial::EntityIndex;

use crate::finder::{CandidateQuery, find_requests, find_sources};
use crate::resolver::rank;
use crate::world::MatchView;

/// What the apply phase should do with one request.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Command {
    Drop(DropReason),
    /// Bound source is gone; unbind so matching retries.
    ClearBinding,
    /// Count one matching pass off the cooldown.
    CooldownTick,
    /// Issue these candidate path queries.
    Search(Vec<CandidateQuery>),
    /// No candidate was found or none scored.
    SearchFailed,
    /// Try these candidates in order.
    Commit(Vec<sd_request::Candidate>),
}

pub(crate) fn plan_request(
    request: &ServiceRequest,
    view: &MatchView<'_>,
    sources: &EntityIndex,
    open: &EntityIndex,
) -> Option<Command> {
    match validate(request, view, view.requests) {
        Validation::Drop(reason) => return Some(Command::Drop(reason)),
        Validation::ClearBinding => return Some(Command::ClearBinding),
        Validation::Valid => {}
    }
    if request.is_bound() {
        return None;
    }

    if let Some(search) = &request.search {
        if !search.is_complete() {
            return None;
        }
        return Some(if search.results.is_empty() {
            Command::SearchFailed
        } else {
            Command::Commit(rank(search.results.clone()))
        });
    }

    // Adverts are one-shot and already paced by their stride.
    let config = view.kinds.get(request.kind);
    if !request.reversed && !config.match_interval.fires(view.now) {
        return None;
    }
    if request.cooldown > 0 {
        return Some(Command::CooldownTick);
    }

    let queries = if request.reversed {
        find_requests(request, view, open)
    } else {
        find_sources(request, view, sources)
    };
    Some(if queries.is_empty() { Command::SearchFailed } else { Command::Search(queries) })
}
