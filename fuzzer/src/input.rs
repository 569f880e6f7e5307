//! The list of images to fuzz and their regions of interest.

use std::path::{Path, PathBuf};

use common::{deserialize, FileExtensionError, SerdeFormat, SerdeFormatError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::region::RegionOfInterest;

pub const INPUT_FILE_NAME: &str = "fuzzer-input.json";

/// Checked in order when the JSON input is absent.
const FALLBACK_INPUT_FILE_NAMES: [&str; 2] = ["fuzzer-input.yaml", "fuzzer-input.yml"];

#[derive(Debug, Error)]
pub enum InputError {
    #[error("input list not found in {0}")]
    NotFound(PathBuf),
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: SerdeFormatError,
    },
    #[error(transparent)]
    Format(#[from] FileExtensionError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImageToProcess {
    pub file_name: String,
    pub region_of_interest: RegionOfInterest,
}

impl ImageToProcess {
    pub fn path_in(&self, input_dir: &Path) -> PathBuf {
        input_dir.join(&self.file_name)
    }
}

/// Locates the input list inside `input_dir`.
pub fn find_input_file(input_dir: &Path) -> Result<PathBuf, InputError> {
    std::iter::once(INPUT_FILE_NAME)
        .chain(FALLBACK_INPUT_FILE_NAMES)
        .map(|name| input_dir.join(name))
        .find(|path| path.is_file())
        .ok_or_else(|| InputError::NotFound(input_dir.to_path_buf()))
}

pub fn read_input_images(input_dir: &Path) -> Result<Vec<ImageToProcess>, InputError> {
    let path = find_input_file(input_dir)?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(INPUT_FILE_NAME);
    let format = SerdeFormat::from_file_name(file_name)?;

    let serialized = std::fs::read_to_string(&path).map_err(|source| InputError::Io {
        path: path.clone(),
        source,
    })?;
    let images: Vec<ImageToProcess> =
        deserialize(&serialized, format).map_err(|source| InputError::Parse {
            path: path.clone(),
            source,
        })?;

    debug!("Read {} images from {}", images.len(), path.display());
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::test_utils::fresh_test_output_dir;

    const JSON: &str = r#"[
        {"FileName": "a.jpg", "RegionOfInterest": {"X": 10, "Y": 10, "Width": 50, "Height": 50}},
        {"FileName": "b.png", "RegionOfInterest": {"X": 0, "Y": 5, "Width": 1, "Height": 2}}
    ]"#;

    #[test]
    fn reads_json_input_list() {
        let dir = fresh_test_output_dir("input_json");
        std::fs::write(dir.join(INPUT_FILE_NAME), JSON).unwrap();

        let images = read_input_images(&dir).unwrap();

        assert_eq!(images.len(), 2);
        assert_eq!(images[0].file_name, "a.jpg");
        assert_eq!(images[0].region_of_interest, RegionOfInterest::new(10, 10, 50, 50));
        assert_eq!(images[1].path_in(&dir), dir.join("b.png"));
    }

    #[test]
    fn falls_back_to_yaml() {
        let dir = fresh_test_output_dir("input_yaml");
        std::fs::write(
            dir.join("fuzzer-input.yml"),
            "- FileName: a.jpg\n  RegionOfInterest:\n    X: 1\n    Y: 2\n    Width: 3\n    Height: 4\n",
        )
        .unwrap();

        let images = read_input_images(&dir).unwrap();
        assert_eq!(images[0].region_of_interest, RegionOfInterest::new(1, 2, 3, 4));
    }

    #[test]
    fn json_wins_over_yaml() {
        let dir = fresh_test_output_dir("input_precedence");
        std::fs::write(dir.join(INPUT_FILE_NAME), JSON).unwrap();
        std::fs::write(dir.join("fuzzer-input.yaml"), "[]").unwrap();

        assert_eq!(read_input_images(&dir).unwrap().len(), 2);
    }

    #[test]
    fn missing_input_list_is_reported() {
        let dir = fresh_test_output_dir("input_missing");
        assert!(matches!(read_input_images(&dir), Err(InputError::NotFound(_))));
    }

    #[test]
    fn malformed_input_list_is_a_parse_error() {
        let dir = fresh_test_output_dir("input_malformed");
        std::fs::write(dir.join(INPUT_FILE_NAME), r#"[{"FileName": 3}]"#).unwrap();

        assert!(matches!(read_input_images(&dir), Err(InputError::Parse { .. })));
    }
}
