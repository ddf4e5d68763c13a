/*!
 * Tests for error types and their request-level classification
 */

use mtgateway::errors::{AppError, ConfigError, EngineError, GatewayError, ModelLoadError, TranslationError};

/// Test that unknown pairs and models are client errors
#[test]
fn test_gateway_error_from_withUnsupportedPair_shouldBeNotFound() {
    let error = GatewayError::from(TranslationError::UnsupportedPair("en-xx".to_string()));
    assert!(error.is_client_error());
    assert_eq!(error.status_code(), 404);

    let error = GatewayError::from(TranslationError::UnknownModel("en-fr".to_string()));
    assert_eq!(error.status_code(), 404);
}

/// Test that engine failures are server errors
#[test]
fn test_gateway_error_from_withEngineFailure_shouldBeServerError() {
    let error = GatewayError::from(TranslationError::Engine {
        model: "en-fr".to_string(),
        source: EngineError::RequestFailed("connection refused".to_string()),
    });
    assert!(!error.is_client_error());
    assert_eq!(error.status_code(), 500);

    let error = GatewayError::from(TranslationError::PivotLengthMismatch {
        pivot: "es-en".to_string(),
        expected: 2,
        actual: 1,
    });
    assert_eq!(error.status_code(), 500);
}

/// Test error messages
#[test]
fn test_error_display_withVariants_shouldDescribeFailure() {
    assert_eq!(
        ModelLoadError::MissingField("model_type").to_string(),
        "`model_type` not specified for a model"
    );
    assert_eq!(
        ModelLoadError::UnsupportedModelType("marian".to_string()).to_string(),
        "`model_type` not recognized: marian"
    );
    assert_eq!(
        EngineError::LengthMismatch { expected: 3, actual: 2 }.to_string(),
        "Engine returned 2 segments for a batch of 3"
    );

    let app_error = AppError::from(ConfigError::MissingModels);
    assert!(app_error.to_string().contains("('models') not found"));
}

/// Test conversions into the application error
#[test]
fn test_app_error_from_withIoAndAnyhow_shouldWrap() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    assert!(matches!(AppError::from(io_error), AppError::File(_)));
    assert!(matches!(AppError::from(anyhow::anyhow!("boom")), AppError::Unknown(_)));
}
