#[cfg(test)]
mod integration_tests {
    use crate::capture_service::plan_presets;
    use crate::{
        validate_capture_url, CaptureConfig, CaptureRequest, CaptureService, RateLimiter,
        UrlSafetyError, WaitStrategy, PRESETS,
    };
    use std::time::Duration;
    use tokio_test::assert_ok;

    #[test]
    fn test_capture_request_defaults() {
        let request = CaptureRequest::default();
        assert!(request.url.is_empty());
        assert!(request.preset_keys.is_empty());
        assert_eq!(request.wait_strategy, WaitStrategy::NetworkIdle);
        assert!(request.wait_for_selector.is_none());
        assert_eq!(request.extra_wait, Duration::ZERO);
    }

    #[test]
    fn test_full_catalog_plans_in_pixel_area_order() {
        // Feed every key in reverse catalog order; the plan must come back
        // sorted by area regardless of request order.
        let mut keys: Vec<String> = PRESETS.iter().map(|p| p.key.to_string()).collect();
        keys.reverse();

        let planned = plan_presets(&keys).unwrap();
        assert_eq!(planned.len(), PRESETS.len());

        let areas: Vec<u64> = planned.iter().map(|p| p.pixel_area()).collect();
        assert!(areas.windows(2).all(|w| w[0] <= w[1]));

        // The largest render always comes last.
        assert_eq!(planned.last().unwrap().key, "16k");
    }

    #[tokio::test]
    async fn test_url_validation_surface() {
        assert!(matches!(
            validate_capture_url("file:///etc/passwd").await,
            Err(UrlSafetyError::DisallowedScheme(_))
        ));
        assert!(matches!(
            validate_capture_url("http://127.0.0.1/").await,
            Err(UrlSafetyError::PrivateAddress(_))
        ));
        assert!(matches!(
            validate_capture_url("http://localhost/").await,
            Err(UrlSafetyError::BlockedHostname(_))
        ));
        assert!(matches!(
            validate_capture_url("https://user:pw@example.com/").await,
            Err(UrlSafetyError::CredentialsInUrl)
        ));

        // Literal public IPs pass without any DNS lookup
        let url = tokio_test::assert_ok!(validate_capture_url("http://93.184.216.34/").await);
        assert_eq!(url.host_str(), Some("93.184.216.34"));
    }

    #[test]
    fn test_rate_limit_surface() {
        let limiter = RateLimiter::new();
        let window = Duration::from_secs(60);

        let first = limiter.consume("start:cli", 2, window);
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);

        let second = limiter.consume("start:cli", 2, window);
        assert!(second.allowed);
        assert_eq!(second.remaining, 0);

        let third = limiter.consume("start:cli", 2, window);
        assert!(!third.allowed);
        assert!(third.retry_after_ms > 0);

        // Other actions for the same caller are unaffected
        assert!(limiter.consume("analyze:cli", 2, window).allowed);
    }

    #[tokio::test]
    async fn test_live_capture() {
        let service = CaptureService::new(CaptureConfig::default()).unwrap();

        let request = CaptureRequest::new(
            "https://example.com",
            vec!["og-facebook".to_string(), "twitter".to_string()],
        );

        match service.capture(&request).await {
            Ok(results) if !results.is_empty() => {
                assert!(results.len() <= 2);
                for result in &results {
                    assert!(!result.image_bytes.is_empty());
                    assert_eq!(result.mime_type, "image/png");
                }
                println!("Live capture produced {} result(s)", results.len());
            }
            Ok(_) => {
                eprintln!("⚠️  Live capture returned no results (flaky network?)");
            }
            Err(e) => {
                // Expected in environments without Chrome or network access
                eprintln!("⚠️  Live capture skipped: {e}");
            }
        }

        service.shutdown().await;
    }
}
