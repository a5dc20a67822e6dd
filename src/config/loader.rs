use tracing::debug;

use super::types::{Config, ConfigError};

impl Config {
    /// Parse configuration from a YAML string and validate it.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;

        debug!(
            chain = %config.chain,
            family = ?config.family,
            ttl_secs = config.ttl_secs,
            "configuration loaded"
        );

        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// The family is already constrained by its type; the only remaining
    /// check is a usable chain name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain.trim().is_empty() {
            return Err(ConfigError::EmptyChain);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Family;

    #[test]
    fn test_parse_minimal() {
        let config = Config::from_yaml("chain: INPUT").unwrap();
        assert_eq!(config.chain, "INPUT");
        assert_eq!(config.family, Family::V4);
        assert_eq!(config.ttl_secs, 300);
    }

    #[test]
    fn test_parse_full() {
        let yaml = "
chain: FORWARD
family: 6
tool_path: /usr/sbin/ip6tables
ttl_secs: 60
";
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.chain, "FORWARD");
        assert_eq!(config.family, Family::V6);
        assert_eq!(config.ttl_secs, 60);
    }

    #[test]
    fn test_parse_rejects_bad_family() {
        let result = Config::from_yaml("chain: INPUT\nfamily: 5");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_empty_chain() {
        let result = Config::from_yaml("chain: \"  \"");
        assert!(matches!(result, Err(ConfigError::EmptyChain)));
    }
}
