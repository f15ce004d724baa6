//! Plans for free-text queries.

use once_cell::sync::Lazy;
use regex::Regex;

use super::common::ScoredQuery;
use super::plan::{
    BoolClause, BoostMode, Clause, FunctionScoreClause, Fuzziness, MatchClause,
    MinimumShouldMatch, Operator, RetrievalPlan, ScoreFunction, ScoreMode, fields,
};
use super::request::FreeTextRequest;
use crate::config::RelevanceParams;
use crate::document::ObjectType;

static SINGLE_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\p{Alphabetic}+$").expect("valid word pattern"));
static WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\p{Alphabetic} ]+$").expect("valid words pattern"));
static HOUSE_NUMBER_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ ,;]+").expect("valid separator pattern"));

const SHORT_QUERY_LEN: usize = 4;

/// Compile a free-text request into a plan.
///
/// Short or single-word queries get a prefix-oriented plan. Everything else
/// must match the n-gram collector and either a name or a house number
/// together with its street.
pub fn plan_free_text(request: &FreeTextRequest, params: &RelevanceParams, lenient: bool) -> RetrievalPlan {
    let scored = match request.query.as_deref() {
        None => ScoredQuery::new(Clause::MatchAll).importance(params.importance_factor_alphabetic),
        Some(query) if is_short(query) => short_query(query, params, lenient),
        Some(query) => full_query(query, params, lenient),
    };

    scored
        .location_bias(request.options.location_bias.as_ref(), params)
        .request_filters(&request.options)
        .into_plan()
}

fn is_short(query: &str) -> bool {
    query.chars().count() < SHORT_QUERY_LEN || SINGLE_WORD.is_match(query)
}

fn short_query(query: &str, params: &RelevanceParams, lenient: bool) -> ScoredQuery {
    let len = query.chars().count();

    let mut core = BoolClause::new()
        .should(MatchClause::new(fields::COLLECTOR_NAME_PREFIX, query).build())
        .should(
            MatchClause::new(fields::collector_field_full(fields::NAME), query)
                .fuzziness(if len < SHORT_QUERY_LEN { Fuzziness::Exact } else { Fuzziness::Auto })
                .prefix_length(if len <= 6 { 1 } else { 2 })
                .build(),
        );
    if lenient {
        core = core.should(
            MatchClause::new(fields::COLLECTOR_NAME, query)
                .fuzziness(Fuzziness::Auto)
                .prefix_length(2)
                .boost(0.2)
                .build(),
        );
    }

    ScoredQuery::new(core.build())
        .function(ScoreFunction::Weight {
            weight: params.short_query_demotion,
            filter: Some(Box::new(Clause::not(Clause::term(
                fields::OBJECT_TYPE,
                ObjectType::Other.name(),
            )))),
        })
        .importance(params.importance_factor_alphabetic)
}

fn full_query(query: &str, params: &RelevanceParams, lenient: bool) -> ScoredQuery {
    let alphabetic = WORDS.is_match(query);
    let fuzziness = Fuzziness::lenient(lenient);

    let mut ngram = MatchClause::new(fields::COLLECTOR_ALL_NGRAM, query).boost(params.weak_boost);
    ngram = if lenient {
        let msm = MinimumShouldMatch::parse(&params.lenient_minimum_should_match)
            .unwrap_or(MinimumShouldMatch::Percent(-34));
        ngram.minimum_should_match(msm).fuzziness(Fuzziness::Auto).prefix_length(2)
    } else {
        ngram.operator(Operator::And)
    };

    let name_match = MatchClause::new(fields::COLLECTOR_NAME, query)
        .fuzziness(fuzziness)
        .prefix_length(2)
        .boost(if alphabetic { 1.5 } else { 1.0 })
        .build();

    let exact_numbers: Vec<String> = HOUSE_NUMBER_SPLIT
        .split(&query.to_lowercase())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let house_number = FunctionScoreClause::new(
        MatchClause::new(fields::HOUSENUMBER, query)
            .boost(params.house_number_boost)
            .build(),
    )
    .function(ScoreFunction::Weight {
        weight: params.exact_house_number_weight,
        filter: Some(Box::new(Clause::Terms {
            field: fields::HOUSENUMBER_FULL.to_string(),
            values: exact_numbers,
            boost: 2.0,
        })),
    })
    .function(ScoreFunction::Weight {
        weight: 1.0,
        filter: None,
    })
    .score_mode(ScoreMode::Sum)
    .boost_mode(BoostMode::Multiply)
    .build();
    let address_match = BoolClause::new()
        .must(house_number)
        .must(
            MatchClause::new(fields::COLLECTOR_PARENT, query)
                .fuzziness(fuzziness)
                .prefix_length(2)
                .build(),
        )
        .build();

    let mut core = BoolClause::new()
        .must(ngram.build())
        .must(Clause::DisMax {
            queries: vec![name_match, address_match],
            boost: 0.2,
        })
        .should(MatchClause::new(fields::COLLECTOR_ALL, query).build());
    if !lenient && !query.contains(',') {
        core = core.should(
            MatchClause::new(fields::COLLECTOR_NAME_PREFIX, query)
                .boost(if alphabetic { params.weak_boost } else { params.weak_boost / 10.0 })
                .build(),
        );
    }

    let factor = if alphabetic {
        params.importance_factor_alphabetic
    } else {
        params.importance_factor_other
    };
    ScoredQuery::new(core.build()).importance(factor)
}
