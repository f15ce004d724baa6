//! Scoring wrapper and request-level filters shared by the forward planners.

use super::category::{exclude_categories, include_categories};
use super::plan::{
    BoolClause, BoostMode, Clause, FunctionScoreClause, RetrievalPlan, ScoreFunction, ScoreMode,
    fields,
};
use super::request::{LocationBias, RequestOptions};
use super::tag_filter::build_tag_filter;
use crate::config::RelevanceParams;

/// Score of documents without an importance value.
const MISSING_IMPORTANCE: f64 = 0.00001;
const BIAS_DECAY: f64 = 0.8;

/// A core query with its score functions, wrapped in the outer filter
/// clause on [`ScoredQuery::into_plan`].
#[derive(Debug, Clone)]
pub(super) struct ScoredQuery {
    query: Clause,
    functions: Vec<ScoreFunction>,
    outer: BoolClause,
}

impl ScoredQuery {
    pub(super) fn new(query: Clause) -> Self {
        Self {
            query,
            functions: Vec::new(),
            outer: BoolClause::new(),
        }
    }

    pub(super) fn function(mut self, function: ScoreFunction) -> Self {
        self.functions.push(function);
        self
    }

    pub(super) fn importance(self, factor: f32) -> Self {
        self.function(ScoreFunction::FieldValueFactor {
            field: fields::IMPORTANCE.to_string(),
            factor,
            missing: MISSING_IMPORTANCE,
        })
    }

    pub(super) fn filter(mut self, clause: Clause) -> Self {
        self.outer = self.outer.filter(clause);
        self
    }

    pub(super) fn location_bias(self, bias: Option<&LocationBias>, params: &RelevanceParams) -> Self {
        let Some((bias, radius)) = bias.and_then(|b| b.radius_km().map(|r| (b, r))) else {
            return self;
        };
        let scale = bias.scale.clamp(0.0, 1.0);
        self.function(ScoreFunction::ExpDecay {
            field: fields::COORDINATE.to_string(),
            origin: bias.point,
            scale_km: radius,
            offset_km: radius / 10.0,
            decay: BIAS_DECAY,
            weight: params.location_bias_max_weight * (1.0 - scale) as f32,
        })
    }

    /// Tag, layer, category and bounding-box filters of a request.
    pub(super) fn request_filters(self, options: &RequestOptions) -> Self {
        let mut scored = self;
        for clause in request_filter_clauses(options) {
            scored = scored.filter(clause);
        }
        if let Some(bbox) = options.bbox {
            scored = scored.filter(Clause::GeoBoundingBox {
                field: fields::COORDINATE.to_string(),
                bbox,
            });
        }
        scored
    }

    pub(super) fn into_plan(self) -> RetrievalPlan {
        let scored = self
            .functions
            .into_iter()
            .fold(FunctionScoreClause::new(self.query), FunctionScoreClause::function)
            .score_mode(ScoreMode::Sum)
            .boost_mode(BoostMode::Sum)
            .build();
        RetrievalPlan::new(self.outer.must(scored).build())
    }
}

/// Tag, layer and category filters, in that order.
pub(super) fn request_filter_clauses(options: &RequestOptions) -> Vec<Clause> {
    let mut clauses = Vec::new();
    if let Some(tags) = build_tag_filter(&options.tag_filters) {
        clauses.push(tags);
    }
    if !options.layers.is_empty() {
        clauses.push(layer_filter(options));
    }
    clauses.extend(options.include_categories.iter().map(|list| include_categories(list)));
    clauses.extend(options.exclude_categories.iter().map(|list| exclude_categories(list)));
    clauses
}

pub(super) fn layer_filter(options: &RequestOptions) -> Clause {
    Clause::terms(fields::OBJECT_TYPE, options.layers.iter().map(|t| t.name()))
}
