//! Domain model shared by the whole query pipeline: labels and matchers,
//! samples and series, the series-set cursor handed to the engine, and the
//! error taxonomy that rides inside query results.

mod annotations;
mod error;
mod labels;
mod series;
mod series_set;

pub use annotations::Annotations;
pub use error::QueryError;
pub use labels::{Label, LabelSet, MatchOp, Matcher, selector_string};
pub use series::{GraviolaSeries, Sample};
pub use series_set::GraviolaSeriesSet;
