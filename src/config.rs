//! Facilities for reading runtime configuration values
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::trace;
use udfseed::udf::CANDIDATE_BLOCK_SIZES;

/// Seed generator configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Size of the generated image in bytes
    #[serde(default = "Config::default_total_size")]
    pub total_size: u64,

    /// Logical block size of the generated image
    #[serde(default = "Config::default_block_size")]
    pub block_size: u32,

    /// Blocks held back from the end of the media for the closing anchor
    #[serde(default = "Config::default_correction_blocks")]
    pub correction_blocks: u32,
}

impl Config {
    /// Constructs `Config` from a `toml` file and environment variables
    pub fn new() -> Result<Self, figment::Error> {
        let config: Self = Figment::new()
            .merge(Toml::file("udfseed.toml"))
            .merge(Env::prefixed("UDFSEED__"))
            .extract()?;
        if !CANDIDATE_BLOCK_SIZES.contains(&config.block_size) {
            return Err(figment::Error::from(format!(
                "block_size must be one of {CANDIDATE_BLOCK_SIZES:?}"
            )));
        }
        if config.total_size < u64::from(config.block_size) {
            return Err(figment::Error::from(
                "total_size must cover at least one block".to_string(),
            ));
        }
        trace!("final config: {config:#?}");
        Ok(config)
    }

    fn default_total_size() -> u64 {
        1024 * 1024
    }

    fn default_block_size() -> u32 {
        2048
    }

    fn default_correction_blocks() -> u32 {
        512
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config: Config = Figment::new().extract().expect("empty config must parse");
        assert_eq!(config.total_size, 1024 * 1024);
        assert_eq!(config.block_size, 2048);
        assert_eq!(config.correction_blocks, 512);
    }
}
