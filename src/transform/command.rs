// src/transform/command.rs

//! Transform that pipes each record through an external program.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::config::model::TransformConfig;
use crate::errors::TransformError;
use crate::record::FileRecord;

use super::{Transform, TransformResult};

/// Runs a configured shell command once per input record, writing the record
/// content to the command's stdin and reading the transformed content from
/// its stdout. A non-zero exit fails the transform, naming the offending
/// file.
///
/// This is how external collaborators (style compilers, minifiers, image
/// compressors) are wired in: the pipeline sees only bytes in, bytes out.
#[derive(Debug, Clone)]
pub struct CommandTransform {
    name: String,
    version: String,
    cmd: String,
    output_ext: Option<String>,
}

impl CommandTransform {
    pub fn new(name: impl Into<String>, cfg: &TransformConfig) -> Self {
        Self {
            name: name.into(),
            version: cfg.version.clone(),
            cmd: cfg.cmd.clone(),
            output_ext: cfg.output_ext.clone(),
        }
    }

    fn err(&self, record: Option<&FileRecord>, reason: impl Into<String>) -> TransformError {
        TransformError::new(
            &self.name,
            record.map(|r| r.path().to_path_buf()),
            reason,
        )
    }

    async fn run_one(&self, record: &FileRecord) -> Result<FileRecord, TransformError> {
        debug!(transform = %self.name, path = %record.portable_path(), "piping record through command");

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        };

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| self.err(Some(record), format!("spawning '{}': {e}", self.cmd)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| self.err(Some(record), "child stdin unavailable"))?;
        stdin
            .write_all(record.content())
            .await
            .map_err(|e| self.err(Some(record), format!("writing stdin: {e}")))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| self.err(Some(record), format!("waiting for '{}': {e}", self.cmd)))?;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.err(
                Some(record),
                format!("exit code {code}: {}", stderr.trim()),
            ));
        }

        let out = record.with_content(output.stdout);
        Ok(match &self.output_ext {
            Some(ext) => out.with_extension(ext),
            None => out,
        })
    }
}

impl Transform for CommandTransform {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn apply(
        &self,
        inputs: Vec<FileRecord>,
    ) -> Pin<Box<dyn Future<Output = TransformResult> + Send + '_>> {
        Box::pin(async move {
            let mut outputs = Vec::with_capacity(inputs.len());
            // Records are processed in their resolved order so output is
            // deterministic.
            for record in &inputs {
                outputs.push(self.run_one(record).await?);
            }
            Ok(outputs)
        })
    }
}
