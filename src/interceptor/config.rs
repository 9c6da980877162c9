use crate::core::{HookError, Result};
use serde::{Deserialize, Serialize};

/// Interceptor configuration
///
/// Controls how listeners react to entities that fail validation while being
/// flushed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptorConfig {
    /// Raise a validation error instead of silently skipping the write
    pub fail_on_error: bool,

    /// Module paths whose entity types always fail on validation errors
    pub fail_on_error_packages: Vec<String>,
}

impl InterceptorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the global fail-on-error flag
    pub fn fail_on_error(mut self, enabled: bool) -> Self {
        self.fail_on_error = enabled;
        self
    }

    /// Add a module path below which validation failures are fatal
    pub fn fail_on_error_package(mut self, package: &str) -> Self {
        self.fail_on_error_packages.push(package.to_string());
        self
    }

    /// Parse from JSON
    ///
    /// # Examples
    ///
    /// ```
    /// use persist_hooks::InterceptorConfig;
    ///
    /// let config = InterceptorConfig::from_json(
    ///     r#"{ "fail_on_error": false, "fail_on_error_packages": ["shop::billing"] }"#,
    /// ).unwrap();
    /// assert_eq!(config.fail_on_error_packages, vec!["shop::billing"]);
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        for package in &self.fail_on_error_packages {
            let trimmed = package.trim_end_matches("::");
            if trimmed.is_empty() {
                return Err(HookError::Config(
                    "fail_on_error_packages cannot contain empty paths".to_string(),
                ));
            }

            if trimmed.contains(char::is_whitespace) {
                return Err(HookError::Config(format!(
                    "Invalid module path '{}' in fail_on_error_packages",
                    package
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = InterceptorConfig::new()
            .fail_on_error(true)
            .fail_on_error_package("shop::billing");
        assert!(config.fail_on_error);
        assert_eq!(config.fail_on_error_packages, vec!["shop::billing"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_defaults_missing_fields() {
        let config = InterceptorConfig::from_json("{}").unwrap();
        assert_eq!(config, InterceptorConfig::default());
    }

    #[test]
    fn test_from_json_rejects_bad_paths() {
        let err = InterceptorConfig::from_json(r#"{ "fail_on_error_packages": ["::"] }"#)
            .unwrap_err();
        assert!(matches!(err, HookError::Config(_)));

        let err = InterceptorConfig::from_json(r#"{ "fail_on_error_packages": ["a b"] }"#)
            .unwrap_err();
        assert!(matches!(err, HookError::Config(_)));
    }

    #[test]
    fn test_from_json_rejects_malformed_input() {
        assert!(InterceptorConfig::from_json("not json").is_err());
    }
}
