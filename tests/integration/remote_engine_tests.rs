/*!
 * Integration tests for the remote inference engine adapter.
 *
 * A local mock server plays both the prediction and the management API.
 */

use anyhow::Result;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;

use mtgateway::app_config::{ModelType, Settings};
use mtgateway::engines::remote::{PredictionRequest, PredictionResponse};
use mtgateway::engines::{BuiltinStages, RemoteTranslator};
use mtgateway::errors::EngineError;
use mtgateway::gateway::{Gateway, TranslationRequest};
use mtgateway::registry::Registry;
use mtgateway::stages::Translator;

use crate::common::{self, mock_engine::spawn_engine};

/// Handler serving `opus-mt-en-fr`, which uppercases and tags every sentence
fn opus_engine(path: &str, body: &str) -> (u16, String) {
    match path {
        "/models" => (200, json!({"models": [{"modelName": "opus-mt-en-fr", "modelUrl": "opus-mt-en-fr.mar"}]}).to_string()),
        "/predictions/opus-mt-en-fr" => match serde_json::from_str::<PredictionRequest>(body) {
            Ok(request) => {
                let translation = request
                    .sample
                    .iter()
                    .map(|s| format!("{} ({}>{})", s.to_uppercase(), request.additional_info.src, request.additional_info.tgt))
                    .collect();
                (200, serde_json::to_string(&PredictionResponse { translation }).unwrap_or_default())
            }
            Err(e) => (400, json!({"error": e.to_string()}).to_string()),
        },
        _ => (404, json!({"error": "not found"}).to_string()),
    }
}

fn settings_for(url: &str) -> Settings {
    Settings {
        engine_url: url.to_string(),
        engine_management_url: url.to_string(),
        readiness_retries: 2,
        readiness_interval_ms: 10,
        engine_timeout_secs: 5,
        ..Default::default()
    }
}

/// Test a successful prediction round
#[tokio::test]
async fn test_remote_translate_withServedModel_shouldReturnTranslations() -> Result<()> {
    let server = spawn_engine(opus_engine).await?;
    let translator = RemoteTranslator::new(Client::new(), &server.url, "opus-mt-en-fr");

    let output = translator
        .translate(vec!["hello".to_string(), "world".to_string()], "en", "fr")
        .await?;

    assert_eq!(output, vec!["HELLO (en>fr)", "WORLD (en>fr)"]);
    Ok(())
}

/// Test that error statuses are reported with their body
#[tokio::test]
async fn test_remote_translate_withServerError_shouldReturnApiError() -> Result<()> {
    let server = spawn_engine(|_, _| (500, json!({"code": 500, "message": "worker died"}).to_string())).await?;
    let translator = RemoteTranslator::new(Client::new(), &server.url, "opus-mt-en-fr");

    let result = translator.translate(vec!["hello".to_string()], "en", "fr").await;

    match result {
        Err(EngineError::ApiError { status_code, message }) => {
            assert_eq!(status_code, 500);
            assert!(message.contains("worker died"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    Ok(())
}

/// Test that malformed bodies are parse errors
#[tokio::test]
async fn test_remote_translate_withMalformedBody_shouldReturnParseError() -> Result<()> {
    let server = spawn_engine(|_, _| (200, "{\"translated\": 3}".to_string())).await?;
    let translator = RemoteTranslator::new(Client::new(), &server.url, "opus-mt-en-fr");

    let result = translator.translate(vec!["hello".to_string()], "en", "fr").await;

    assert!(matches!(result, Err(EngineError::ParseError(_))));
    Ok(())
}

/// Test a registry built against a live engine, end to end through the gateway
#[tokio::test]
async fn test_builtin_stages_withServedModel_shouldTranslateThroughGateway() -> Result<()> {
    let server = spawn_engine(opus_engine).await?;
    let temp_dir = common::create_temp_dir()?;
    let document = common::document(vec![common::split_lower_recase("en", "fr", ModelType::Opus)]);

    let stages = BuiltinStages::new(settings_for(&server.url));
    let registry = Registry::build(&document, temp_dir.path(), &stages).await?;
    assert_eq!(registry.len(), 1);

    let gateway = Gateway::new(Arc::new(registry));
    let response = gateway
        .translate(&TranslationRequest {
            src: "en".to_string(),
            tgt: "fr".to_string(),
            alt: None,
            text: "Good MORNING. See you".to_string(),
        })
        .await?;

    assert_eq!(response.translation, "Good morning. (en>fr) See you (en>fr)");
    Ok(())
}

/// Test that models the engine does not serve are skipped with a warning
#[tokio::test]
async fn test_builtin_stages_withUnservedModel_shouldSkipModel() -> Result<()> {
    common::init_test_logger();
    let server = spawn_engine(opus_engine).await?;
    let temp_dir = common::create_temp_dir()?;
    let document = common::document(vec![
        common::translate_only("en", "fr", ModelType::Opus),
        common::translate_only("en", "de", ModelType::OpusBig),
    ]);

    let stages = BuiltinStages::new(settings_for(&server.url));
    let registry = Registry::build(&document, temp_dir.path(), &stages).await?;

    assert_eq!(registry.len(), 1);
    let skipped = common::warnings_containing(registry.warnings(), "opus-mt-tc-big-en-de");
    assert_eq!(skipped.len(), 1);
    assert!(skipped[0].contains("Skipping load of model en-de"));
    Ok(())
}
