// src/transform/mod.rs

//! Opaque file transforms.
//!
//! A transform is a named, versioned unit of work mapping input records to
//! output records. The pipeline assumes nothing about what happens inside
//! beyond this contract, so external tools (style compilers, minifiers, image
//! compressors) plug in behind it without the core knowing their details.
//!
//! Transforms must be referentially transparent for identical input content;
//! that is what makes cache memoization by content fingerprint sound.

use std::future::Future;
use std::pin::Pin;

pub mod command;
pub mod copy;
pub mod registry;

pub use command::CommandTransform;
pub use copy::CopyTransform;
pub use registry::TransformRegistry;

use crate::errors::TransformError;
use crate::record::FileRecord;

pub type TransformResult = std::result::Result<Vec<FileRecord>, TransformError>;

/// A pure, named unit of work over file records.
pub trait Transform: Send + Sync {
    fn name(&self) -> &str;

    /// Version participates in cache keys so changing a transform's
    /// definition invalidates its memoized outputs.
    fn version(&self) -> &str;

    fn apply(
        &self,
        inputs: Vec<FileRecord>,
    ) -> Pin<Box<dyn Future<Output = TransformResult> + Send + '_>>;
}
