//! # Integration Tests
//!
//! Cross-crate and end-to-end tests.
//!
//! - wire-shape checks on the shared contracts
//! - document -> validator -> sync engine -> endpoint flows, against
//!   wiremock servers and the in-process mock endpoint

#[cfg(test)]
mod contract_tests {
    use std::time::Duration;

    use contracts::{DeliveryOutcome, FailureReason, RecordOutcome, SyncReport};
    use serde_json::json;

    #[test]
    fn test_report_wire_shape() {
        let report = SyncReport::from_outcomes(
            vec![
                RecordOutcome {
                    index: 0,
                    record_id: "a@example.com".into(),
                    outcome: DeliveryOutcome::Delivered {
                        attempts: 2,
                        via_batch: true,
                    },
                },
                RecordOutcome {
                    index: 1,
                    record_id: "b@example.com".into(),
                    outcome: DeliveryOutcome::failed(FailureReason::Cancelled, 0, "run cancelled"),
                },
            ],
            Duration::from_millis(1500),
            true,
            3,
            1,
        );

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["delivered"], 1);
        assert_eq!(value["failed"], 1);
        assert_eq!(value["duration"], 1500);
        assert_eq!(
            value["outcomes"][0]["outcome"],
            json!({ "state": "delivered", "attempts": 2, "via_batch": true })
        );
        assert_eq!(value["failures"][0]["reason"], "cancelled");

        let back: SyncReport = serde_json::from_value(value).unwrap();
        assert_eq!(back.outcomes, report.outcomes);
        assert_eq!(back.duration, report.duration);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{
        DeliveryError, DeliveryOutcome, DeliveryPolicy, EndpointConfig, RateLimit,
        RejectionReason, SubscriptionTier,
    };
    use dispatcher::{create_endpoint, HttpEndpoint};
    use ingestion::RecordValidator;
    use serde_json::json;
    use sync_engine::{MockEndpoint, SyncEngine, SyncError};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CUSTOMERS: &str = r#"{
        "customers": [
            { "Email": "  Ada@Example.COM ", "Full_Name": " Ada   Lovelace ", "plan": "premium", "join_date": "March 3rd, 2021" },
            { "email_address": "grace@example.com", "name": "Grace Hopper", "tier": "free", "signup_date": "2020-12-09" },
            { "email": "not-an-email", "name": "Broken" },
            { "name": "Nobody" },
            { "email": "linus@example.com", "signup_date": "someday" },
            { "email": "ken@example.com", "tier": "PRO" }
        ]
    }"#;

    fn fast_policy() -> contracts::DeliveryPolicyBuilder {
        DeliveryPolicy::builder()
            .base_backoff(Duration::from_millis(10))
            .backoff_multiplier(2.0)
            .rate_limit(RateLimit::new(1_000, Duration::from_secs(1)))
    }

    fn validated() -> ingestion::ValidationSummary {
        let raw = ingestion::load_records(CUSTOMERS).unwrap();
        RecordValidator::new().validate_all(&raw)
    }

    #[test]
    fn test_document_validation() {
        let summary = validated();
        assert_eq!(summary.total(), 6);
        assert_eq!(summary.accepted.len(), 3);

        let ada = &summary.accepted[0];
        assert_eq!(ada.id(), "ada@example.com");
        assert_eq!(ada.name(), Some("Ada Lovelace"));
        assert_eq!(ada.subscription_tier(), SubscriptionTier::Pro);
        assert_eq!(ada.signup_date().unwrap().to_string(), "2021-03-03");

        let reasons: Vec<(usize, RejectionReason)> = summary
            .rejected
            .iter()
            .map(|(index, rejection)| (*index, rejection.reason))
            .collect();
        assert_eq!(
            reasons,
            vec![
                (2, RejectionReason::InvalidEmail),
                (3, RejectionReason::MissingIdentity),
                (4, RejectionReason::InvalidDate),
            ]
        );
    }

    #[tokio::test]
    async fn test_e2e_http_delivery() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/customers"))
            .and(header("x-attempt-number", "1"))
            .respond_with(ResponseTemplate::new(202))
            .expect(3)
            .mount(&server)
            .await;

        let endpoint = Arc::new(
            HttpEndpoint::new(&EndpointConfig::http(format!("{}/customers", server.uri())))
                .unwrap(),
        );
        let engine = SyncEngine::new(Arc::clone(&endpoint), fast_policy().build().unwrap());

        let report = engine.deliver_all(validated().accepted).await.unwrap();

        assert!(report.is_complete());
        assert_eq!(report.delivered, 3);
        assert_eq!(endpoint.metrics().snapshot().submitted, 3);

        let mut bodies: Vec<serde_json::Value> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect();
        bodies.sort_by_key(|b| b["email"].as_str().unwrap_or_default().to_string());
        assert_eq!(
            bodies[0],
            json!({
                "customer_name": "Ada Lovelace",
                "email": "ada@example.com",
                "subscription_tier": "Pro",
                "signup_date": "2021-03-03"
            })
        );
        assert_eq!(bodies[1]["subscription_tier"], "Basic");
        assert_eq!(bodies[2]["signup_date"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_e2e_batch_fallback_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/customers"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/customers/batch"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = EndpointConfig::http(format!("{}/customers", server.uri()));
        config.batch_url = Some(format!("{}/customers/batch", server.uri()));
        let endpoint = Arc::new(create_endpoint(&config).unwrap());
        let policy = fast_policy()
            .max_concurrency(1)
            .max_retries(5)
            .batch_fallback_threshold(2)
            .build()
            .unwrap();
        let engine = SyncEngine::new(endpoint, policy);

        let report = engine.deliver_all(validated().accepted).await.unwrap();

        assert!(report.batch_fallback_engaged);
        assert!(report.is_complete());
        assert_eq!(report.batches_submitted, 1);
        assert!(report.outcomes.iter().all(|o| matches!(
            o.outcome,
            DeliveryOutcome::Delivered {
                via_batch: true,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn test_e2e_unreachable_endpoint() {
        let endpoint = Arc::new(
            create_endpoint(&EndpointConfig::http("http://127.0.0.1:1/customers")).unwrap(),
        );
        let policy = fast_policy()
            .max_retries(1)
            .batch_fallback_threshold(2)
            .build()
            .unwrap();
        let engine = SyncEngine::new(endpoint, policy);

        let err = engine.deliver_all(validated().accepted).await.unwrap_err();

        let SyncError::EndpointUnreachable { failed, report } = err else {
            panic!("expected EndpointUnreachable, got {err:?}");
        };
        assert_eq!(failed, 3);
        assert_eq!(report.delivered, 0);
        assert!(report.batch_fallback_engaged);
    }

    #[tokio::test(start_paused = true)]
    async fn test_e2e_mixed_failures_with_mock() {
        // one record is refused for good, the others recover after one retry
        let mock = MockEndpoint::accepting().on_submit(|record, attempt| {
            if record.id() == "grace@example.com" {
                Err(DeliveryError::non_retryable(Some(409), "duplicate"))
            } else if attempt == 1 {
                Err(DeliveryError::retryable(Some(502), "bad gateway"))
            } else {
                Ok(())
            }
        });
        let mock = Arc::new(mock);
        let policy = fast_policy().batch_fallback_threshold(0).build().unwrap();
        let engine = SyncEngine::new(Arc::clone(&mock), policy);

        let report = engine.deliver_all(validated().accepted).await.unwrap();

        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].record_id, "grace@example.com");
        assert_eq!(report.failures[0].attempts, 1);
        assert_eq!(report.total_attempts, 5);
        assert_eq!(mock.calls().len(), 5);
    }

    #[tokio::test]
    async fn test_e2e_config_to_dry_run() {
        let config = config_loader::ConfigLoader::load_from_str(
            r#"
[endpoint]
kind = "log"
name = "dry-run"

[delivery]
max_concurrency = 2
rate_limit_requests = 100
"#,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();

        let endpoint = Arc::new(create_endpoint(&config.endpoint).unwrap());
        let policy = config_loader::ConfigLoader::delivery_policy(&config).unwrap();
        let engine = SyncEngine::new(Arc::clone(&endpoint), policy);

        let report = engine.deliver_all(validated().accepted).await.unwrap();

        assert!(report.is_complete());
        assert_eq!(endpoint.metrics().snapshot().records_accepted, 3);

        let mut aggregator = observability::SyncMetricsAggregator::new();
        aggregator.record_report(&report);
        assert_eq!(aggregator.summary().records_delivered, 3);
    }
}
