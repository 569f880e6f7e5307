//! Human-auditable CSV report.

use std::fs::File;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;

use crate::detection::DetectionResult;

pub const OUTPUT_FILE_NAME: &str = "fuzzer-output.csv";

pub const CSV_HEADER: [&str; 9] = [
    "InputFileName",
    "Algorithm",
    "Iteration",
    "Inlier Count",
    "Total Count",
    "Inlier/Outlier Ratio",
    "Execution (ms)",
    "OutputFileName",
    "Parameters",
];

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report row")]
    Csv(#[from] csv::Error),
    #[error("report I/O failed")]
    Io(#[from] std::io::Error),
    #[error("failed to write annotated image {path}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// CSV sink shared by every concurrent detection of a run.
///
/// Each row is flushed as soon as it is written so an interrupted run leaves
/// a usable partial report.
pub struct CsvReport {
    path: PathBuf,
    writer: Mutex<csv::Writer<File>>,
}

impl CsvReport {
    /// Creates `fuzzer-output.csv` in `output_dir`, replacing an existing one.
    pub fn create(output_dir: &Path) -> Result<Self, ReportError> {
        let path = output_dir.join(OUTPUT_FILE_NAME);
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(CSV_HEADER)?;
        writer.flush()?;

        Ok(Self {
            path,
            writer: Mutex::new(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(
        &self,
        result: &DetectionResult,
        iteration: usize,
        output_file_name: &str,
    ) -> Result<(), ReportError> {
        let row = [
            result.file_name.clone(),
            result.algorithm.to_string(),
            iteration.to_string(),
            result.inlier_count.to_string(),
            result.total_count.to_string(),
            result.inlier_outlier_ratio().to_string(),
            result.execution_ms().to_string(),
            output_file_name.to_string(),
            result.parameters.clone(),
        ];

        let mut writer = self.writer.lock();
        writer.write_record(&row)?;
        writer.flush()?;
        Ok(())
    }
}
