use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use loadline_core::{Load, LoadId};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read load board file `{path}`: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("could not parse load board file `{path}`: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct LoadFilter {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub max_miles: Option<f64>,
}

impl LoadFilter {
    fn matches(&self, load: &Load) -> bool {
        if let Some(origin) = &self.origin {
            if !load.origin.to_lowercase().contains(&origin.to_lowercase()) {
                return false;
            }
        }
        if let Some(destination) = &self.destination {
            if !load.destination.to_lowercase().contains(&destination.to_lowercase()) {
                return false;
            }
        }
        if let Some(max_miles) = self.max_miles {
            if load.miles.is_some_and(|miles| miles > max_miles) {
                return false;
            }
        }
        true
    }
}

/// Load board access. The board is supplied as a static JSON file refreshed
/// per call, so there is no caching contract here.
pub trait LoadCatalog: Send + Sync {
    fn list(&self, filter: &LoadFilter) -> Result<Vec<Load>, CatalogError>;
    fn get(&self, load_id: &str) -> Result<Option<Load>, CatalogError>;
}

pub struct FileLoadCatalog {
    path: PathBuf,
}

impl FileLoadCatalog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_board(&self) -> Result<Vec<Load>, CatalogError> {
        // A missing board file is an empty board, matching an operator who
        // has not published loads yet. A malformed one is a real fault.
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)
            .map_err(|source| CatalogError::Read { path: self.path.clone(), source })?;
        serde_json::from_str(&raw)
            .map_err(|source| CatalogError::Parse { path: self.path.clone(), source })
    }
}

impl LoadCatalog for FileLoadCatalog {
    fn list(&self, filter: &LoadFilter) -> Result<Vec<Load>, CatalogError> {
        Ok(self.read_board()?.into_iter().filter(|load| filter.matches(load)).collect())
    }

    fn get(&self, load_id: &str) -> Result<Option<Load>, CatalogError> {
        Ok(self.read_board()?.into_iter().find(|load| load.load_id.matches(load_id)))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{CatalogError, FileLoadCatalog, LoadCatalog, LoadFilter};

    const BOARD: &str = r#"[
        {
            "load_id": "L1001",
            "origin": "Chicago, IL",
            "destination": "Dallas, TX",
            "pickup_datetime": "2026-09-01T08:00:00Z",
            "delivery_datetime": "2026-09-02T17:00:00Z",
            "equipment_type": "Dry Van",
            "loadboard_rate": 1000.0,
            "miles": 920
        },
        {
            "load_id": "L1002",
            "origin": "Atlanta, GA",
            "destination": "Miami, FL",
            "pickup_datetime": "2026-09-03T08:00:00Z",
            "delivery_datetime": "2026-09-04T12:00:00Z",
            "equipment_type": "Reefer",
            "loadboard_rate": 1450.0,
            "miles": 662
        }
    ]"#;

    fn catalog_with(contents: &str) -> (FileLoadCatalog, tempfile::NamedTempFile) {
        let mut file = tempfile::NamedTempFile::new().expect("temp board");
        write!(file, "{contents}").expect("write board");
        (FileLoadCatalog::new(file.path().to_path_buf()), file)
    }

    #[test]
    fn missing_board_file_is_an_empty_board() {
        let catalog = FileLoadCatalog::new("/nonexistent/loads.json".into());
        let loads = catalog.list(&LoadFilter::default()).expect("missing file tolerated");
        assert!(loads.is_empty());
    }

    #[test]
    fn malformed_board_file_is_a_fault() {
        let (catalog, _file) = catalog_with("{not json");
        assert!(matches!(
            catalog.list(&LoadFilter::default()),
            Err(CatalogError::Parse { .. })
        ));
    }

    #[test]
    fn origin_filter_is_a_case_insensitive_substring() {
        let (catalog, _file) = catalog_with(BOARD);
        let loads = catalog
            .list(&LoadFilter { origin: Some("chicago".to_string()), ..LoadFilter::default() })
            .expect("board reads");
        assert_eq!(loads.len(), 1);
        assert_eq!(loads[0].load_id.0, "L1001");
    }

    #[test]
    fn mileage_filter_drops_longer_lanes() {
        let (catalog, _file) = catalog_with(BOARD);
        let loads = catalog
            .list(&LoadFilter { max_miles: Some(700.0), ..LoadFilter::default() })
            .expect("board reads");
        assert_eq!(loads.len(), 1);
        assert_eq!(loads[0].load_id.0, "L1002");
    }

    #[test]
    fn lookup_trims_the_requested_id() {
        let (catalog, _file) = catalog_with(BOARD);
        assert!(catalog.get(" L1002 ").expect("board reads").is_some());
        assert!(catalog.get("L9999").expect("board reads").is_none());
    }
}
