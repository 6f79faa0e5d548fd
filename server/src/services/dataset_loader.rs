use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use border_traffic_shared::{Dashboard, DashboardError, RawRow};
use polars::frame::DataFrame;
use polars::io::SerReader;
use polars::prelude::{CsvReadOptions, DataType};
use tracing::{info, warn};

use crate::state::AppState;

/// Load the dataset once and install the outcome into the shared slot.
pub async fn run(state: AppState) {
    let path = state.dataset_path.clone();
    info!(path = %path.display(), "loading border crossing dataset");

    let loaded = tokio::task::spawn_blocking(move || load_dashboard(&path))
        .await
        .unwrap_or_else(|e| Err(DashboardError::DatasetLoadFailure(e.to_string())));

    match &loaded {
        Ok(dashboard) => {
            let stats = dashboard.ingest_stats();
            info!(
                records = stats.accepted,
                skipped_rows = stats.skipped_rows,
                malformed_values = stats.malformed_values,
                ports = dashboard.hierarchy().port_count(),
                "dataset ready"
            );
            if stats.malformed_values > 0 {
                warn!(
                    malformed_values = stats.malformed_values,
                    "unparsable values were recorded as zero"
                );
            }
        }
        Err(e) => warn!(error = %e, "dataset unavailable"),
    }

    state.install(loaded).await;
}

fn load_dashboard(path: &Path) -> Result<Dashboard, DashboardError> {
    let rows = read_dataset(path)
        .map_err(|e| DashboardError::DatasetLoadFailure(format!("{e:#}")))?;
    Dashboard::from_rows(&rows)
}

/// Read every cell of the CSV at `path` as text, keyed by header name.
pub(crate) fn read_dataset(path: &Path) -> Result<Vec<RawRow>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open dataset: {}", path.display()))?;
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(file)
        .finish()
        .with_context(|| format!("failed to parse dataset CSV: {}", path.display()))?;
    frame_to_rows(&df)
}

fn frame_to_rows(df: &DataFrame) -> Result<Vec<RawRow>> {
    let mut rows = vec![RawRow::new(); df.height()];
    for column in df.get_columns() {
        let name = column.name().to_string();
        let values = column
            .cast(&DataType::String)
            .with_context(|| format!("column {name} is not readable as text"))?;
        let values = values.str()?;
        for (row, value) in rows.iter_mut().zip(values.into_iter()) {
            if let Some(value) = value {
                row.insert(name.clone(), value.to_owned());
            }
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;
    use crate::state::DatasetSlot;

    const SAMPLE_CSV: &str = "\
Port Name,State,Port Code,Border,Date,Measure,Value,Latitude,Longitude
Blaine,Washington,3004,US-Canada Border,Jan 2020,Trucks,\"1,200\",49.0,-122.7
Blaine,Washington,3004,US-Canada Border,Feb 2020,Buses,oops,49.0,-122.7
Laredo,Texas,2304,US-Mexico Border,Jan 2020,Trucks,300,27.5,-99.5
,Texas,2304,US-Mexico Border,Jan 2020,Trucks,5,27.5,-99.5
";

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("create temp csv");
        file.write_all(contents.as_bytes()).expect("write temp csv");
        file.flush().expect("flush temp csv");
        file
    }

    fn state_for(path: PathBuf) -> AppState {
        AppState::new(path, PathBuf::from("public"), Duration::ZERO)
    }

    #[test]
    fn read_dataset_keys_cells_by_header() {
        let file = write_csv(SAMPLE_CSV);
        let rows = read_dataset(file.path()).expect("read csv");
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].get("Port Name").map(String::as_str), Some("Blaine"));
        assert_eq!(rows[0].get("Value").map(String::as_str), Some("1,200"));
        assert_eq!(rows[2].get("Port Code").map(String::as_str), Some("2304"));
        assert!(rows[3].get("Port Name").is_none_or(|port| port.is_empty()));
    }

    #[test]
    fn missing_file_is_a_load_failure() {
        let err = load_dashboard(Path::new("/nonexistent/border.csv")).expect_err("missing");
        assert!(matches!(err, DashboardError::DatasetLoadFailure(_)));
        assert!(err.to_string().starts_with("error loading data"));
    }

    #[test]
    fn header_only_file_is_an_empty_dataset() {
        let file = write_csv("Port Name,State,Date,Measure,Value\n");
        assert_eq!(
            load_dashboard(file.path()).expect_err("no rows"),
            DashboardError::EmptyDataset
        );
    }

    #[tokio::test]
    async fn run_installs_a_ready_dashboard() {
        let file = write_csv(SAMPLE_CSV);
        let state = state_for(file.path().to_path_buf());
        run(state.clone()).await;

        let slot = state.dataset.lock().await;
        let DatasetSlot::Ready { dashboard, .. } = &*slot else {
            panic!("expected ready slot, got {}", slot.status());
        };
        let stats = dashboard.ingest_stats();
        assert_eq!(stats.accepted, 3);
        assert_eq!(stats.skipped_rows, 1);
        assert_eq!(stats.malformed_values, 1);
        assert_eq!(dashboard.store().ports(), ["Blaine", "Laredo"]);
    }

    #[tokio::test]
    async fn run_records_a_failed_load() {
        let state = state_for(PathBuf::from("/nonexistent/border.csv"));
        run(state.clone()).await;
        assert_eq!(state.dataset.lock().await.status(), "error");
    }
}
