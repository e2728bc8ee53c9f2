use crate::config::CloudinaryConfig;
use crate::services::transform::{CloudinaryClient, ImageTransformer};
use std::sync::Arc;
use tracing::info;

pub fn setup_transformer() -> anyhow::Result<Arc<dyn ImageTransformer>> {
    let config = CloudinaryConfig::from_env()?;

    info!(
        "☁️  Transformation provider: cloudinary (cloud: {})",
        config.cloud_name
    );

    Ok(Arc::new(CloudinaryClient::new(&config)?))
}
