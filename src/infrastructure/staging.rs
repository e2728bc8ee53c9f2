use crate::config::AppConfig;
use crate::services::staging::DiskStager;
use anyhow::Context;
use std::sync::Arc;
use tracing::info;

pub async fn setup_staging(config: &AppConfig) -> anyhow::Result<Arc<DiskStager>> {
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| {
            format!(
                "failed to create upload directory {}",
                config.upload_dir.display()
            )
        })?;

    info!(
        "📁 Staging directory ready: {} (max upload: {} KiB)",
        config.upload_dir.display(),
        config.max_file_size / 1024
    );

    Ok(Arc::new(DiskStager::new(
        config.upload_dir.clone(),
        config.max_file_size,
    )))
}
