//! Configuration validation
//!
//! Rules:
//! - field ranges declared on the config types (`validator` derive)
//! - http endpoints need an absolute http(s) `url`; `batch_url` likewise
//! - delivery settings must build a `DeliveryPolicy`

use std::collections::BTreeMap;

use ::validator::{Validate, ValidationErrors, ValidationErrorsKind};
use contracts::{ContractError, DeliveryPolicy, EndpointConfig, EndpointKind, SyncerConfig};

/// Validate a parsed configuration.
///
/// Returns the first error found, or Ok(()).
pub fn validate(config: &SyncerConfig) -> Result<(), ContractError> {
    validate_ranges(config)?;
    validate_endpoint(&config.endpoint)?;
    DeliveryPolicy::try_from(&config.delivery)?;
    Ok(())
}

fn validate_ranges(config: &SyncerConfig) -> Result<(), ContractError> {
    let Err(errors) = config.validate() else {
        return Ok(());
    };

    let mut flat = BTreeMap::new();
    flatten(&errors, "", &mut flat);
    let (field, message) = flat
        .into_iter()
        .next()
        .unwrap_or_else(|| ("config".to_string(), errors.to_string()));
    Err(ContractError::config_validation(field, message))
}

/// Collect `path -> message` for every leaf error.
fn flatten(errors: &ValidationErrors, prefix: &str, out: &mut BTreeMap<String, String>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                let message = list
                    .iter()
                    .map(|e| match &e.message {
                        Some(message) => message.to_string(),
                        None => describe(e),
                    })
                    .collect::<Vec<_>>()
                    .join("; ");
                out.insert(path, message);
            }
            ValidationErrorsKind::Struct(nested) => flatten(nested, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    flatten(nested, &format!("{path}[{index}]"), out);
                }
            }
        }
    }
}

fn describe(error: &::validator::ValidationError) -> String {
    let mut params: Vec<String> = error
        .params
        .iter()
        .filter(|(key, _)| *key != "value")
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    params.sort();

    let actual = error
        .params
        .get("value")
        .map(|v| format!(", got {v}"))
        .unwrap_or_default();
    if params.is_empty() {
        format!("failed '{}' check{actual}", error.code)
    } else {
        format!("failed '{}' check ({}){actual}", error.code, params.join(", "))
    }
}

fn validate_endpoint(endpoint: &EndpointConfig) -> Result<(), ContractError> {
    if endpoint.kind != EndpointKind::Http {
        return Ok(());
    }

    match endpoint.url.as_deref() {
        None => Err(ContractError::config_validation(
            "endpoint.url",
            "url is required for http endpoints",
        )),
        Some(url) => check_http_url("endpoint.url", url),
    }?;

    if let Some(batch_url) = endpoint.batch_url.as_deref() {
        check_http_url("endpoint.batch_url", batch_url)?;
    }
    Ok(())
}

fn check_http_url(field: &str, url: &str) -> Result<(), ContractError> {
    let lower = url.trim().to_ascii_lowercase();
    let rest = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"));
    match rest {
        Some(host) if !host.is_empty() && !host.starts_with('/') => Ok(()),
        Some(_) => Err(ContractError::config_validation(
            field,
            format!("'{url}' has no host"),
        )),
        None => Err(ContractError::config_validation(
            field,
            format!("'{url}' must be an http:// or https:// URL"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::DeliveryPolicyConfig;

    fn http_config() -> SyncerConfig {
        SyncerConfig {
            version: Default::default(),
            endpoint: EndpointConfig::http("https://collector.example.com/customers"),
            delivery: DeliveryPolicyConfig::default(),
        }
    }

    fn field_of(err: ContractError) -> String {
        match err {
            ContractError::ConfigValidation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&http_config()).is_ok());

        let mut log = http_config();
        log.endpoint = EndpointConfig::log("dry-run");
        assert!(validate(&log).is_ok());
    }

    #[test]
    fn test_http_requires_url() {
        let mut config = http_config();
        config.endpoint.url = None;
        assert_eq!(field_of(validate(&config).unwrap_err()), "endpoint.url");
    }

    #[test]
    fn test_http_url_scheme() {
        let mut config = http_config();
        config.endpoint.url = Some("ftp://collector.example.com".into());
        assert_eq!(field_of(validate(&config).unwrap_err()), "endpoint.url");

        config.endpoint.url = Some("https://".into());
        assert_eq!(field_of(validate(&config).unwrap_err()), "endpoint.url");

        let mut config = http_config();
        config.endpoint.batch_url = Some("collector/batch".into());
        assert_eq!(field_of(validate(&config).unwrap_err()), "endpoint.batch_url");
    }

    #[test]
    fn test_range_errors_name_nested_field() {
        let mut config = http_config();
        config.delivery.max_concurrency = 0;
        assert_eq!(
            field_of(validate(&config).unwrap_err()),
            "delivery.max_concurrency"
        );

        let mut config = http_config();
        config.delivery.backoff_multiplier = 1.0;
        assert_eq!(
            field_of(validate(&config).unwrap_err()),
            "delivery.backoff_multiplier"
        );

        let mut config = http_config();
        config.endpoint.timeout_ms = 0;
        assert_eq!(field_of(validate(&config).unwrap_err()), "endpoint.timeout_ms");
    }

    #[test]
    fn test_zero_threshold_is_allowed() {
        let mut config = http_config();
        config.delivery.batch_fallback_threshold = 0;
        assert!(validate(&config).is_ok());
    }
}
