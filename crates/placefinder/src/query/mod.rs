//! Request types and the planners that compile them into retrieval plans.
//!
//! Every planner is a pure function of its request, the engine
//! configuration and a `lenient` flag. Executing plans and retrying with a
//! relaxed plan is the searcher's job.

pub use error::QueryError;
pub(crate) use error::Result;

mod category;
mod common;
mod free_text;
pub mod plan;
mod request;
mod reverse;
mod structured;
mod tag_filter;

pub use category::{exclude_categories, include_categories};
pub use free_text::plan_free_text;
pub use plan::{Clause, RetrievalPlan};
pub use request::{
    FreeTextRequest, LocationBias, RequestOptions, ReverseRequest, StructuredAddress,
    StructuredRequest, parse_bbox, parse_layers,
};
pub use reverse::plan_reverse;
pub use structured::plan_structured;
pub use tag_filter::{TagFilter, TagFilterKind, build_tag_filter};

mod error {
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum QueryError {
        #[error("Bad request: {message}")]
        BadRequest { message: String },
    }

    impl QueryError {
        pub fn bad_request(message: impl Into<String>) -> Self {
            Self::BadRequest {
                message: message.into(),
            }
        }
    }

    pub type Result<T> = std::result::Result<T, QueryError>;
}
