//! Command dispatch

use std::path::Path;
use tracing::info;

use phishguard_api::{ApiServer, PREDICTION_FILE};
use phishguard_core::{DataTable, NetworkModel, PipelineConfig, PipelineError, TrainingPipeline};
use phishguard_databases::{DocumentSource, SqliteDocumentStore, StoreError};

use crate::cli::{Cli, Command, Error, Result, EXIT_FAILURE, EXIT_SOURCE_ERROR, EXIT_SUCCESS};

/// Exit code wrapper for CLI operations
pub type ExitCode = i32;

/// Load configuration and run the selected command
pub fn run(cli: Cli) -> ExitCode {
    let outcome =
        PipelineConfig::load(cli.config.as_deref()).map_err(Error::from).and_then(|config| {
            match cli.command {
                Command::Train => train(config),
                Command::PushData { file } => push_data(&config, &file),
                Command::Predict { input, output } => predict(&config, &input, output.as_deref()),
                Command::Serve { host, port } => serve(config, host, port),
            }
        });

    match outcome {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            exit_code_for(&e)
        }
    }
}

fn exit_code_for(error: &Error) -> ExitCode {
    match error {
        Error::Store(StoreError::MalformedDocument { .. } | StoreError::Encoding(_)) => {
            EXIT_FAILURE
        }
        Error::Store(_) => EXIT_SOURCE_ERROR,
        Error::Pipeline(e) if matches!(e.root(), PipelineError::SourceUnavailable(_)) => {
            EXIT_SOURCE_ERROR
        }
        _ => EXIT_FAILURE,
    }
}

fn train(config: PipelineConfig) -> Result<()> {
    let artifact = TrainingPipeline::new(config)?.run_pipeline()?;
    println!("{}", serde_json::to_string_pretty(&artifact)?);
    Ok(())
}

/// Insert every CSV row as a document, empty cells becoming "na"
fn push_data(config: &PipelineConfig, file: &Path) -> Result<()> {
    let table = DataTable::read_csv(file)?;
    let documents = table.to_documents();

    let store = SqliteDocumentStore::create(&config.source.url)?;
    let inserted =
        store.insert_many(&config.source.database, &config.source.collection, &documents)?;

    info!(
        "Pushed {} records from {} into {}.{}",
        inserted,
        file.display(),
        config.source.database,
        config.source.collection
    );
    println!("{}", inserted);
    Ok(())
}

fn predict(config: &PipelineConfig, input: &Path, output: Option<&Path>) -> Result<()> {
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.serving.prediction_dir.join(PREDICTION_FILE));

    let table = DataTable::read_csv(input)?;
    let model = NetworkModel::load_from_dir(&config.final_model_dir)?;
    let scored = model.score_table(table, &config.target_column)?;
    scored.write_csv(&output)?;

    info!("Wrote {} predictions to {}", scored.n_rows(), output.display());
    println!("{}", output.display());
    Ok(())
}

fn serve(config: PipelineConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut server = ApiServer::new(config);
    if host.is_some() || port.is_some() {
        let host = host.unwrap_or_else(|| server.config().host.clone());
        let port = port.unwrap_or(server.config().port);
        server = server.with_address(host, port);
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime
        .block_on(server.start())
        .map_err(|e| Error::Server(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(root: &Path) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.source.url = format!("sqlite://{}", root.join("store.db").display());
        config.final_model_dir = root.join("final_models");
        config.serving.prediction_dir = root.join("prediction_output");
        config
    }

    #[test]
    fn test_push_data_inserts_rows_with_missing_as_sentinel() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let csv = temp_dir.path().join("data.csv");
        std::fs::write(&csv, "a,b,Result\n1,-1,1\n0,,-1\n-1,1,1\n").unwrap();
        let config = test_config(temp_dir.path());

        push_data(&config, &csv).unwrap();

        let store = SqliteDocumentStore::connect(&config.source.url).unwrap();
        let documents = store
            .fetch_all(&config.source.database, &config.source.collection)
            .unwrap();
        assert_eq!(documents.len(), 3);
        assert_eq!(documents[1]["b"], "na");
        assert_eq!(documents[2]["Result"], 1);
    }

    #[test]
    fn test_predict_without_published_model_fails() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let csv = temp_dir.path().join("input.csv");
        std::fs::write(&csv, "a,b\n1,0\n").unwrap();

        let error = predict(&test_config(temp_dir.path()), &csv, None).unwrap_err();
        assert!(matches!(
            error,
            Error::Pipeline(PipelineError::MissingArtifact(_))
        ));
        assert_eq!(exit_code_for(&error), EXIT_FAILURE);
    }

    #[test]
    fn test_unreadable_document_is_not_a_source_error() {
        let malformed = Error::Store(StoreError::MalformedDocument {
            collection: "Network_Data_Collection".to_string(),
            id: 1,
            reason: "not a JSON object".to_string(),
        });
        assert_eq!(exit_code_for(&malformed), EXIT_FAILURE);

        let through_pipeline = Error::from(PipelineError::from(StoreError::MalformedDocument {
            collection: "Network_Data_Collection".to_string(),
            id: 1,
            reason: "not a JSON object".to_string(),
        }));
        assert_eq!(exit_code_for(&through_pipeline), EXIT_FAILURE);
    }

    #[test]
    fn test_train_against_missing_store_is_source_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = test_config(temp_dir.path());
        config.artifact_dir = temp_dir.path().join("artifact");

        let error = train(config).unwrap_err();
        assert_eq!(exit_code_for(&error), EXIT_SOURCE_ERROR);
    }
}
