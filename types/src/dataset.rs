// SPDX-FileCopyrightText: 2024 German Human Genome-Phenome Archive (GHGA)
//
// SPDX-License-Identifier: Apache-2.0

//! The local read model of datasets, maintained from the metadata event
//! stream.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The type of work that a work package describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkType {
    Download,
    Upload,
}

impl Display for WorkType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkType::Download => write!(f, "download"),
            WorkType::Upload => write!(f, "upload"),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown work type")]
pub struct UnknownWorkType;

impl FromStr for WorkType {
    type Err = UnknownWorkType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "download" => Ok(WorkType::Download),
            "upload" => Ok(WorkType::Upload),
            _ => Err(UnknownWorkType),
        }
    }
}

/// A single file belonging to a dataset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetFile {
    /// The file accession.
    pub id: String,
    /// The file extension, including the leading dot.
    pub extension: String,
}

/// A dataset as projected from the metadata event stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    /// The stage the dataset is currently in.
    pub stage: WorkType,
    /// The files of the dataset, in the order announced by the upstream.
    pub files: Vec<DatasetFile>,
}

impl Dataset {
    /// Look up the extension of a file, if the file is part of the dataset.
    pub fn file_extension(&self, file_id: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|file| file.id == file_id)
            .map(|file| file.extension.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_type_serializes_to_lowercase() {
        assert_eq!(
            serde_json::to_string(&WorkType::Download).unwrap(),
            r#""download""#
        );
        assert_eq!(
            serde_json::from_str::<WorkType>(r#""upload""#).unwrap(),
            WorkType::Upload
        );
    }

    #[test]
    fn work_type_round_trips_through_strings() {
        for work_type in [WorkType::Download, WorkType::Upload] {
            assert_eq!(work_type.to_string().parse::<WorkType>().unwrap(), work_type);
        }
        assert!("downloads".parse::<WorkType>().is_err());
    }

    #[test]
    fn file_extension_lookup() {
        let dataset = Dataset {
            id: "DS001".into(),
            title: "Some dataset".into(),
            description: None,
            stage: WorkType::Download,
            files: vec![DatasetFile {
                id: "F001".into(),
                extension: ".csv".into(),
            }],
        };
        assert_eq!(dataset.file_extension("F001"), Some(".csv"));
        assert_eq!(dataset.file_extension("F002"), None);
    }
}
