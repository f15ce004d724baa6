//! Plans for reverse (point and radius) lookups.

use super::common::request_filter_clauses;
use super::plan::{BoolClause, Clause, RetrievalPlan, fields};
use super::request::ReverseRequest;
use crate::config::EngineConfig;

/// Compile a reverse request into a plan. Reverse plans have no lenient
/// variant.
pub fn plan_reverse(request: &ReverseRequest, config: &EngineConfig) -> RetrievalPlan {
    let mut query = BoolClause::new().filter(Clause::GeoDistance {
        field: fields::COORDINATE.to_string(),
        center: request.location,
        radius_km: request.effective_radius_km(config),
    });

    match &request.query {
        Some(text) => query = query.must(Clause::QueryString { query: text.clone() }),
        None if request.options.layers.is_empty() => query = query.must(Clause::MatchAll),
        None => {}
    }
    for clause in request_filter_clauses(&request.options) {
        query = query.filter(clause);
    }

    let plan = RetrievalPlan::new(query.build());
    if request.distance_sort {
        plan.sorted_by_distance(request.location)
    } else {
        plan
    }
}
