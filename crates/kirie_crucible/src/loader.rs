//! Module loader seam.

use crate::error::EvalResult;
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

/// Executes a JS/TS module from disk and hands back its default export.
///
/// Implementations await the export when it is a promise and call it when
/// it is a function (awaiting the result again). The returned value is
/// whatever that produced, serialized as JSON; shape checks happen in the
/// evaluator.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn load_default(&self, path: &Path) -> EvalResult<Value>;
}
