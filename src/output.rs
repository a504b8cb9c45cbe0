use std::path::{Path, PathBuf};

use crate::Result;
use crate::config::{OutputConfig, OutputFormat};
use crate::models::ProductRecord;

/// Writes the run's records in one go, creating the output directory if needed.
pub async fn write_records(config: &OutputConfig, records: &[ProductRecord]) -> Result<PathBuf> {
    let directory = Path::new(&config.directory);
    tokio::fs::create_dir_all(directory).await?;
    let path = directory.join(&config.file_name);

    let body = encode(config.format, records)?;
    tokio::fs::write(&path, body).await?;

    tracing::info!("Wrote {} records to {}", records.len(), path.display());
    Ok(path)
}

fn encode(format: OutputFormat, records: &[ProductRecord]) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Json => {
            let mut body = serde_json::to_vec_pretty(records)?;
            body.push(b'\n');
            Ok(body)
        }
        OutputFormat::Jsonl => {
            let mut body = Vec::new();
            for record in records {
                serde_json::to_writer(&mut body, record)?;
                body.push(b'\n');
            }
            Ok(body)
        }
    }
}
