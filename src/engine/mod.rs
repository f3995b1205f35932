//! A small PromQL engine over the federated storage.
//!
//! The federation pipeline is the point of this crate; the engine is the
//! collaborator that drives it. It evaluates vector selectors, matrix
//! selectors and number literals, honoring the configured lookback delta,
//! sample budget and per-evaluation deadline, and rejects everything else
//! with an execution error. Aggregations, functions, native histograms and
//! exemplar queries are not supported.

pub mod tracker;

use std::{sync::Arc, time::Duration};

use promql_parser::{
    label::MatchOp as PromMatchOp,
    parser::{self, Expr, VectorSelector},
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::{
    model::{Annotations, GraviolaSeries, LabelSet, MatchOp, Matcher, Sample},
    querier::{SelectHints, storage::GraviolaStorage},
};
use tracker::{QueryTracker, TrackerError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid parameter \"query\": {0}")]
    Parse(String),

    #[error("unsupported expression: {0}")]
    Unsupported(String),

    #[error("{0}")]
    Execution(String),

    #[error("query processing would load too many samples into memory in query execution")]
    SampleLimit,

    #[error("query timed out in expression evaluation")]
    Timeout,

    #[error(transparent)]
    Admission(#[from] TrackerError),
}

#[derive(Debug, Clone)]
pub struct EngineOpts {
    pub timeout: Duration,
    pub max_samples: u64,
    pub lookback_delta: Duration,
}

/// One element of an instant-vector result.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSample {
    pub labels: LabelSet,
    pub sample: Sample,
}

#[derive(Debug)]
pub enum QueryValue {
    Vector(Vec<VectorSample>),
    Matrix(Vec<GraviolaSeries>),
    Scalar(Sample),
}

#[derive(Debug)]
pub struct EvalResult {
    pub value: QueryValue,
    pub warnings: Annotations,
}

pub struct Engine {
    storage: Arc<GraviolaStorage>,
    tracker: Arc<QueryTracker>,
    opts: EngineOpts,
}

impl Engine {
    pub fn new(storage: Arc<GraviolaStorage>, tracker: Arc<QueryTracker>, opts: EngineOpts) -> Self {
        Self {
            storage,
            tracker,
            opts,
        }
    }

    /// Evaluate `expr` at a single instant.
    pub async fn instant_query(&self, expr: &str, time_ms: i64) -> Result<EvalResult, EngineError> {
        let cancel = CancellationToken::new();
        let _slot = self.tracker.insert(&cancel, expr).await?;

        let parsed = parser::parse(expr).map_err(EngineError::Parse)?;

        tokio::time::timeout(self.opts.timeout, self.eval_instant(&parsed, time_ms))
            .await
            .map_err(|_| EngineError::Timeout)?
    }

    /// Evaluate `expr` over `[start, end]` with a fixed step.
    pub async fn range_query(
        &self,
        expr: &str,
        start_ms: i64,
        end_ms: i64,
        step_ms: i64,
    ) -> Result<EvalResult, EngineError> {
        let cancel = CancellationToken::new();
        let _slot = self.tracker.insert(&cancel, expr).await?;

        let parsed = parser::parse(expr).map_err(EngineError::Parse)?;

        tokio::time::timeout(
            self.opts.timeout,
            self.eval_range(&parsed, start_ms, end_ms, step_ms),
        )
        .await
        .map_err(|_| EngineError::Timeout)?
    }

    async fn eval_instant(&self, expr: &Expr, time_ms: i64) -> Result<EvalResult, EngineError> {
        let lookback_ms = self.opts.lookback_delta.as_millis() as i64;

        match peel_parens(expr) {
            Expr::NumberLiteral(literal) => Ok(EvalResult {
                value: QueryValue::Scalar(Sample::new(time_ms, literal.val)),
                warnings: Annotations::new(),
            }),
            Expr::VectorSelector(selector) => {
                let matchers = convert_selector(selector)?;
                let hints = SelectHints {
                    start_ms: time_ms - lookback_ms,
                    end_ms: time_ms,
                    step_ms: 0,
                };
                let set = self.expand_series(&hints, &matchers).await?;

                let mut samples = Vec::new();
                for series in set.series() {
                    if let Some(found) = series.latest_in_window(time_ms - lookback_ms, time_ms) {
                        samples.push(VectorSample {
                            labels: series.labels.clone(),
                            sample: Sample::new(time_ms, found.value),
                        });
                    }
                }

                Ok(EvalResult {
                    value: QueryValue::Vector(samples),
                    warnings: set.warnings().clone(),
                })
            }
            Expr::MatrixSelector(selector) => {
                let range_ms = selector.range.as_millis() as i64;
                let matchers = convert_selector(&selector.vs)?;
                let hints = SelectHints {
                    start_ms: time_ms - range_ms,
                    end_ms: time_ms,
                    step_ms: 0,
                };
                let set = self.expand_series(&hints, &matchers).await?;

                let series = set
                    .series()
                    .iter()
                    .map(|s| {
                        GraviolaSeries::new(
                            s.labels.clone(),
                            s.samples_in_window(time_ms - range_ms, time_ms).to_vec(),
                        )
                    })
                    .filter(|s| !s.samples.is_empty())
                    .collect();

                Ok(EvalResult {
                    value: QueryValue::Matrix(series),
                    warnings: set.warnings().clone(),
                })
            }
            other => Err(EngineError::Unsupported(describe(other).to_string())),
        }
    }

    async fn eval_range(
        &self,
        expr: &Expr,
        start_ms: i64,
        end_ms: i64,
        step_ms: i64,
    ) -> Result<EvalResult, EngineError> {
        let lookback_ms = self.opts.lookback_delta.as_millis() as i64;

        match peel_parens(expr) {
            Expr::NumberLiteral(literal) => {
                let samples = steps(start_ms, end_ms, step_ms)
                    .map(|t| Sample::new(t, literal.val))
                    .collect();
                Ok(EvalResult {
                    value: QueryValue::Matrix(vec![GraviolaSeries::new(
                        LabelSet::default(),
                        samples,
                    )]),
                    warnings: Annotations::new(),
                })
            }
            Expr::VectorSelector(selector) => {
                let matchers = convert_selector(selector)?;
                let hints = SelectHints {
                    start_ms: start_ms - lookback_ms,
                    end_ms,
                    step_ms,
                };
                let set = self.expand_series(&hints, &matchers).await?;

                let mut series_out = Vec::new();
                for series in set.series() {
                    let samples: Vec<Sample> = steps(start_ms, end_ms, step_ms)
                        .filter_map(|t| {
                            series
                                .latest_in_window(t - lookback_ms, t)
                                .map(|found| Sample::new(t, found.value))
                        })
                        .collect();
                    if !samples.is_empty() {
                        series_out.push(GraviolaSeries::new(series.labels.clone(), samples));
                    }
                }

                Ok(EvalResult {
                    value: QueryValue::Matrix(series_out),
                    warnings: set.warnings().clone(),
                })
            }
            other => Err(EngineError::Unsupported(describe(other).to_string())),
        }
    }

    /// Run a Select through the storage root and apply the engine-level
    /// checks: a fatal error aborts the evaluation, and the decoded sample
    /// count is charged against the per-query budget.
    async fn expand_series(
        &self,
        hints: &SelectHints,
        matchers: &[Matcher],
    ) -> Result<crate::model::GraviolaSeriesSet, EngineError> {
        let mut set = self
            .storage
            .querier(hints.start_ms, hints.end_ms)
            .select(true, hints, matchers)
            .await;

        if let Some(err) = set.clear_error() {
            return Err(EngineError::Execution(format!("expanding series: {err}")));
        }

        if set.total_samples() > self.opts.max_samples {
            return Err(EngineError::SampleLimit);
        }

        Ok(set)
    }
}

/// Parse a `match[]` series selector into pipeline matchers. Only plain
/// vector selectors qualify.
pub fn parse_selector(input: &str) -> Result<Vec<Matcher>, EngineError> {
    let parsed = parser::parse(input).map_err(EngineError::Parse)?;
    match peel_parens(&parsed) {
        Expr::VectorSelector(selector) => convert_selector(selector),
        _ => Err(EngineError::Parse(format!(
            "{input} is not a series selector"
        ))),
    }
}

fn steps(start_ms: i64, end_ms: i64, step_ms: i64) -> impl Iterator<Item = i64> {
    std::iter::successors(Some(start_ms), move |t| {
        let next = t + step_ms;
        (next <= end_ms).then_some(next)
    })
}

fn peel_parens(expr: &Expr) -> &Expr {
    let mut current = expr;
    while let Expr::Paren(paren) = current {
        current = paren.expr.as_ref();
    }
    current
}

fn convert_selector(selector: &VectorSelector) -> Result<Vec<Matcher>, EngineError> {
    if selector.offset.is_some() {
        return Err(EngineError::Unsupported("offset modifiers".into()));
    }
    if selector.at.is_some() {
        return Err(EngineError::Unsupported("@ modifiers".into()));
    }

    let mut matchers = Vec::new();
    if let Some(name) = &selector.name {
        matchers.push(Matcher::new(MatchOp::Equal, "__name__", name.clone()));
    }

    for matcher in &selector.matchers.matchers {
        let op = match &matcher.op {
            PromMatchOp::Equal => MatchOp::Equal,
            PromMatchOp::NotEqual => MatchOp::NotEqual,
            PromMatchOp::Re(_) => MatchOp::Regex,
            PromMatchOp::NotRe(_) => MatchOp::NotRegex,
        };
        matchers.push(Matcher::new(op, matcher.name.clone(), matcher.value.clone()));
    }

    Ok(matchers)
}

fn describe(expr: &Expr) -> &'static str {
    match expr {
        Expr::Aggregate(_) => "aggregation expressions",
        Expr::Call(_) => "function calls",
        Expr::Binary(_) => "binary expressions",
        Expr::Unary(_) => "unary expressions",
        Expr::Subquery(_) => "subqueries",
        Expr::StringLiteral(_) => "string literals",
        _ => "this expression type",
    }
}
