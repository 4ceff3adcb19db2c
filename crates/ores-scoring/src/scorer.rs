use std::marker::PhantomData;

use crate::error::ScoreError;
use crate::request::ScoreRequest;
use crate::types::{RevId, RootCache, Score};

/// The scoring computation performed inside a worker.
///
/// Implementations must not rely on state shared with the controlling
/// process: a process pool runs them in a different address space.
pub trait Scorer
where
    Self: Send + Sync + 'static,
{
    fn score(
        &self,
        request: &ScoreRequest,
        rev_id: RevId,
        model_name: &str,
        root_cache: &RootCache,
    ) -> Result<Score, ScoreError>;
}

/// Adapts a plain function or closure into a [`Scorer`].
pub struct ScoreFn<F>
where
    F: Fn(&ScoreRequest, RevId, &str, &RootCache) -> Result<Score, ScoreError>,
{
    op: F,
    _marker: PhantomData<fn() -> Score>,
}

impl<F> ScoreFn<F>
where
    F: Fn(&ScoreRequest, RevId, &str, &RootCache) -> Result<Score, ScoreError>,
{
    pub fn new(op: F) -> Self {
        Self {
            op,
            _marker: PhantomData,
        }
    }
}

impl<F> From<F> for ScoreFn<F>
where
    F: Fn(&ScoreRequest, RevId, &str, &RootCache) -> Result<Score, ScoreError>,
{
    fn from(op: F) -> Self {
        Self::new(op)
    }
}

impl<F> Scorer for ScoreFn<F>
where
    F: Fn(&ScoreRequest, RevId, &str, &RootCache) -> Result<Score, ScoreError>
        + Send
        + Sync
        + 'static,
{
    fn score(
        &self,
        request: &ScoreRequest,
        rev_id: RevId,
        model_name: &str,
        root_cache: &RootCache,
    ) -> Result<Score, ScoreError> {
        (self.op)(request, rev_id, model_name, root_cache)
    }
}

/// Looks scores up in the root cache under `scores.<model_name>`.
///
/// Useful when scores were computed ahead of time and shipped along with
/// the revision context, and as a stand-in scorer for tooling.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrecachedScorer;

impl Scorer for PrecachedScorer {
    fn score(
        &self,
        _request: &ScoreRequest,
        rev_id: RevId,
        model_name: &str,
        root_cache: &RootCache,
    ) -> Result<Score, ScoreError> {
        if let Some(error) = root_cache.get("error") {
            let kind = error
                .get("type")
                .and_then(|v| v.as_str())
                .unwrap_or("ScoreError");
            let message = error
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            return Err(ScoreError::new(kind, message));
        }

        root_cache
            .get("scores")
            .and_then(|scores| scores.get(model_name))
            .cloned()
            .ok_or_else(|| {
                ScoreError::new(
                    "ModelNotLoaded",
                    format!("No precached score for model {model_name} on revision {rev_id}"),
                )
            })
    }
}
