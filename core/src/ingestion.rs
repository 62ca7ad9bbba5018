//! Data Ingestion Stage
//!
//! Exports the source collection to a feature-store CSV, then writes a
//! seeded, shuffled train/test split.

use phishguard_databases::{Document, DocumentSource};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use tracing::info;

use crate::artifact::SplitArtifact;
use crate::config::{IngestionPaths, PipelineConfig, SourceConfig};
use crate::error::{PipelineError, Result};
use crate::table::DataTable;

/// Fetch the configured collection as a table
pub fn export_collection_as_table(
    source_config: &SourceConfig,
    source: &dyn DocumentSource,
) -> Result<DataTable> {
    let documents: Vec<Document> =
        source.fetch_all(&source_config.database, &source_config.collection)?;
    info!(
        "Fetched {} records from {}.{}",
        documents.len(),
        source_config.database,
        source_config.collection
    );

    if documents.is_empty() {
        return Err(PipelineError::EmptyDataset(format!(
            "collection {}.{} has no records",
            source_config.database, source_config.collection
        )));
    }

    DataTable::from_documents(&documents)
}

/// Shuffled (train, test) row indices.
///
/// The test share is `ceil(test_ratio * n_rows)`; both sides must be
/// non-empty. The same seed always yields the same split.
pub fn split_indices(n_rows: usize, test_ratio: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(PipelineError::Config(format!(
            "test_ratio must be in (0, 1), got {test_ratio}"
        )));
    }

    let n_test = (test_ratio * n_rows as f64).ceil() as usize;
    if n_test == 0 || n_test >= n_rows {
        return Err(PipelineError::EmptyDataset(format!(
            "{n_rows} rows cannot be split with test_ratio {test_ratio}"
        )));
    }

    let mut permutation: Vec<usize> = (0..n_rows).collect();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    permutation.shuffle(&mut rng);

    let train = permutation.split_off(n_test);
    Ok((train, permutation))
}

pub fn split_data_as_train_test(
    table: &DataTable,
    test_ratio: f64,
    seed: u64,
) -> Result<(DataTable, DataTable)> {
    let (train_rows, test_rows) = split_indices(table.n_rows(), test_ratio, seed)?;
    Ok((table.select_rows(&train_rows), table.select_rows(&test_rows)))
}

pub fn ingest(
    config: &PipelineConfig,
    paths: &IngestionPaths,
    source: &dyn DocumentSource,
) -> Result<SplitArtifact> {
    info!("Starting data ingestion");

    let table = export_collection_as_table(&config.source, source)?;
    table.write_csv(&paths.feature_store_file)?;
    info!(
        "Feature store written: {} rows x {} columns, {} missing cells",
        table.n_rows(),
        table.n_cols(),
        table.missing_count()
    );

    let (train, test) =
        split_data_as_train_test(&table, config.ingestion.test_ratio, config.ingestion.seed)?;
    train.write_csv(&paths.training_file)?;
    test.write_csv(&paths.testing_file)?;
    info!(
        "Train/test split completed: {} train rows, {} test rows",
        train.n_rows(),
        test.n_rows()
    );

    Ok(SplitArtifact {
        feature_store_file_path: paths.feature_store_file.clone(),
        training_file_path: paths.training_file.clone(),
        testing_file_path: paths.testing_file.clone(),
    })
}
