// src/transform/copy.rs

use std::future::Future;
use std::pin::Pin;

use crate::record::FileRecord;

use super::{Transform, TransformResult};

/// Identity transform: passes records through untouched.
///
/// Stages that only relocate files (fonts, static assets) use this as their
/// sole transform.
#[derive(Debug, Clone, Default)]
pub struct CopyTransform;

impl Transform for CopyTransform {
    fn name(&self) -> &str {
        "copy"
    }

    fn version(&self) -> &str {
        "1"
    }

    fn apply(
        &self,
        inputs: Vec<FileRecord>,
    ) -> Pin<Box<dyn Future<Output = TransformResult> + Send + '_>> {
        Box::pin(async move { Ok(inputs) })
    }
}
