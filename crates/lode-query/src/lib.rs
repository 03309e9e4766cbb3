mod eval;
mod filter;
mod parse_filter;
mod query;
mod schema;

pub use eval::Predicate;
pub use filter::{CompareOp, Envelope, Expr, Filter, Period, TemporalOp, like_prefix};
pub use parse_filter::{FilterParseError, parse_filter};
pub use query::{Query, QueryHints};
pub use schema::{AttributeDescriptor, AttributeType, Cardinality, FeatureSchema, SchemaError};
