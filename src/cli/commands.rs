use anyhow::Result;
use log::{error, info};

use crate::auth::{CredentialCache, ExecutionContext};
use crate::config::HarnessConfig;

pub async fn token_command(config: &HarnessConfig, context: Option<String>) -> Result<()> {
    info!("Executing token command");
    config.validate()?;

    let context = context
        .map(ExecutionContext::named)
        .unwrap_or_else(ExecutionContext::current_thread);
    let cache = CredentialCache::from_config(config)?;

    match cache.bearer_token(&context).await {
        Ok(bearer) => {
            println!("{}", bearer);
            Ok(())
        }
        Err(e) => {
            error!("Token request failed: {}", e);
            Err(e.into())
        }
    }
}

pub fn config_command(config: &HarnessConfig) -> Result<()> {
    info!("Executing config command");
    print!("{}", config.redacted().to_toml()?);
    Ok(())
}
