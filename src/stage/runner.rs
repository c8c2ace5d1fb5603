// src/stage/runner.rs

use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::cache::{cache_key, Cache};
use crate::errors::{BuildpipeError, StageError};
use crate::fs::FileSystem;
use crate::glob;
use crate::record::FileRecord;
use crate::transform::TransformRegistry;

use super::Stage;

/// Execute one stage: resolve the source pattern, fold the transform chain
/// over the records, write the final records under the destination.
///
/// Each transform consults the shared cache first; a hit stands in for
/// re-running the transform. Store errors only ever degrade to a miss.
///
/// A transform failure aborts the stage and names the transform and file.
/// Writes already flushed to the destination are not rolled back; re-running
/// the stage converges on the same output.
pub async fn run_stage(
    stage: &Stage,
    root: &Path,
    fs: &Arc<dyn FileSystem>,
    registry: &TransformRegistry,
    cache: &Arc<Mutex<Box<dyn Cache>>>,
) -> std::result::Result<Vec<FileRecord>, StageError> {
    let stage_err = |e: BuildpipeError| StageError::new(stage.name.as_str(), e);

    let mut records = glob::resolve(&stage.pattern, fs.as_ref(), root).map_err(&stage_err)?;
    debug!(
        stage = %stage.name,
        matched = records.len(),
        include = %stage.pattern.include(),
        "resolved source pattern"
    );

    for transform_name in &stage.transforms {
        let transform = registry.get(transform_name).ok_or_else(|| {
            stage_err(BuildpipeError::ConfigError(format!(
                "unknown transform '{transform_name}'"
            )))
        })?;

        let key = cache_key(transform.name(), transform.version(), &records);

        let cached = match cache.lock() {
            Ok(store) => match store.get(&key) {
                Ok(hit) => hit,
                Err(err) => {
                    warn!(
                        stage = %stage.name,
                        transform = %transform_name,
                        error = %err,
                        "cache read failed; treating as miss"
                    );
                    None
                }
            },
            Err(_) => {
                warn!(stage = %stage.name, "cache mutex poisoned; treating as miss");
                None
            }
        };

        records = match cached {
            Some(outputs) => {
                info!(
                    stage = %stage.name,
                    transform = %transform_name,
                    "inputs unchanged; reusing memoized output"
                );
                outputs
            }
            None => {
                let outputs = transform
                    .apply(records)
                    .await
                    .map_err(|e| stage_err(e.into()))?;

                if let Ok(mut store) = cache.lock() {
                    if let Err(err) = store.put(&key, &outputs) {
                        warn!(
                            stage = %stage.name,
                            transform = %transform_name,
                            error = %err,
                            "cache write failed; continuing without memoization"
                        );
                    }
                }
                outputs
            }
        };
    }

    let dest_root = root.join(&stage.dest);
    for record in &records {
        let target = dest_root.join(record.path());
        fs.write(&target, record.content())
            .map_err(|e| stage_err(e.into()))?;
    }

    info!(
        stage = %stage.name,
        written = records.len(),
        dest = ?stage.dest,
        "stage output written"
    );

    Ok(records)
}
