//! File and batch thumbnailing.
//!
//! Thin filesystem layer over [`make_thumbnail`]: open the source file, create
//! the destination, stream one through the other. A failed thumbnail never
//! leaves a partial output file behind.
//!
//! ## Output Naming
//!
//! Batch outputs are named after the input stem:
//!
//! ```text
//! photos/dawn.jpg       →  out/dawn-thumb.jpg
//! photos/dusk.jpeg      →  out/dusk-thumb.jpg
//! archive/dawn.jpg      →  out/dawn-thumb-2.jpg   # stem already taken
//! ```
//!
//! ## Parallel Processing
//!
//! Files are thumbnailed in parallel using [rayon](https://docs.rs/rayon). The
//! pool size comes from [`effective_threads`](crate::config::effective_threads)
//! and is installed by the binary. One failure does not stop the others; every
//! input gets a result in the [`BatchReport`].

use crate::imaging::{ThumbnailError, ThumbnailOutcome, ThumbnailParameters, make_thumbnail};
use log::debug;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{}: {source}", path.display())]
    Thumbnail {
        path: PathBuf,
        #[source]
        source: ThumbnailError,
    },
}

/// A thumbnail that was written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailRecord {
    pub input: PathBuf,
    pub output: PathBuf,
    pub outcome: ThumbnailOutcome,
    /// Size of the written file in bytes.
    pub bytes: u64,
}

/// Progress events emitted during batch processing.
///
/// Sent through an optional channel so the caller can display progress as
/// files complete, in completion order.
#[derive(Debug)]
pub enum ProcessEvent {
    Started { total: usize },
    Thumbnailed { index: usize, record: ThumbnailRecord },
    Failed { index: usize, input: PathBuf, message: String },
}

/// Result of a batch, in input order.
#[derive(Debug)]
pub struct BatchReport {
    pub results: Vec<Result<ThumbnailRecord, ProcessError>>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Thumbnail one file into another.
///
/// The output file is removed if any stage fails.
pub fn thumbnail_file(
    input: &Path,
    output: &Path,
    params: &ThumbnailParameters,
) -> Result<ThumbnailRecord, ProcessError> {
    let src = File::open(input)?;
    let dst = File::create(output)?;
    let outcome = match make_thumbnail(src, dst, params) {
        Ok(outcome) => outcome,
        Err(source) => {
            let _ = fs::remove_file(output);
            return Err(ProcessError::Thumbnail {
                path: input.to_path_buf(),
                source,
            });
        }
    };
    let bytes = fs::metadata(output)?.len();
    debug!(
        "{} -> {} ({} bytes)",
        input.display(),
        output.display(),
        bytes
    );
    Ok(ThumbnailRecord {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        outcome,
        bytes,
    })
}

/// Output path for each input: `<out_dir>/<stem>-thumb.jpg`, with a numeric
/// suffix when two inputs share a stem.
pub fn output_paths(inputs: &[PathBuf], out_dir: &Path) -> Vec<PathBuf> {
    let mut taken = HashSet::new();
    inputs
        .iter()
        .map(|input| {
            let stem = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image".to_string());
            let mut name = format!("{stem}-thumb.jpg");
            let mut n = 2;
            while !taken.insert(name.clone()) {
                name = format!("{stem}-thumb-{n}.jpg");
                n += 1;
            }
            out_dir.join(name)
        })
        .collect()
}

/// Thumbnail every input into `out_dir` in parallel.
///
/// Only failing to create `out_dir` is an error for the batch as a whole;
/// per-file failures are reported in the returned [`BatchReport`].
pub fn batch(
    inputs: &[PathBuf],
    out_dir: &Path,
    params: &ThumbnailParameters,
    progress: Option<Sender<ProcessEvent>>,
) -> Result<BatchReport, ProcessError> {
    fs::create_dir_all(out_dir)?;
    let outputs = output_paths(inputs, out_dir);

    if let Some(tx) = &progress {
        tx.send(ProcessEvent::Started {
            total: inputs.len(),
        })
        .ok();
    }

    let results = inputs
        .par_iter()
        .zip(outputs.par_iter())
        .enumerate()
        .map(|(index, (input, output))| {
            let result = thumbnail_file(input, output, params);
            if let Some(tx) = &progress {
                let event = match &result {
                    Ok(record) => ProcessEvent::Thumbnailed {
                        index,
                        record: record.clone(),
                    },
                    Err(err) => ProcessEvent::Failed {
                        index,
                        input: input.clone(),
                        message: err.to_string(),
                    },
                };
                tx.send(event).ok();
            }
            result
        })
        .collect();

    Ok(BatchReport { results })
}
