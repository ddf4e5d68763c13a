/*!
 * Integration tests for the request gateway.
 *
 * Requests go through resolution and dispatch against registries built with
 * scripted engines.
 */

use anyhow::Result;
use serde_json::json;
use std::sync::Arc;

use mtgateway::app_config::{ModelSpec, ModelType, Settings};
use mtgateway::gateway::{BatchTranslationRequest, Gateway, HtmlTranslationRequest, TranslationRequest};
use mtgateway::registry::Registry;

use crate::common::{self, mock_stages::{MockEngine, MockStages}};

async fn gateway(specs: Vec<ModelSpec>, stages: &MockStages) -> Result<Gateway> {
    let temp_dir = common::create_temp_dir()?;
    let registry = Registry::build(&common::document(specs), temp_dir.path(), stages).await?;
    Ok(Gateway::new(Arc::new(registry)))
}

fn request(src: &str, tgt: &str, text: &str) -> TranslationRequest {
    TranslationRequest {
        src: src.to_string(),
        tgt: tgt.to_string(),
        alt: None,
        text: text.to_string(),
    }
}

/// Test a routed translation with region tags in the request
#[tokio::test]
async fn test_translate_withRegionTags_shouldRouteAndTranslate() -> Result<()> {
    let stages = MockStages::new().with_engine("en-fr", MockEngine::Uppercase);
    let gateway = gateway(vec![common::split_lower_recase("en", "fr", ModelType::Opus)], &stages).await?;

    let response = gateway.translate(&request("en_US", "fr", "Hello there. How are you?")).await?;

    // Recase lowercases everything after the first letter
    assert_eq!(response.translation, "Hello there. How are you?");
    assert_eq!(stages.call_count(), 1);
    Ok(())
}

/// Test that unsupported pairs fail before any engine call
#[tokio::test]
async fn test_translate_withUnsupportedPair_shouldBeNotFound() -> Result<()> {
    let stages = MockStages::new();
    let gateway = gateway(vec![common::translate_only("en", "fr", ModelType::Opus)], &stages).await?;

    let error = gateway.translate(&request("fr", "en", "Bonjour")).await.unwrap_err();
    assert_eq!(error.status_code(), 404);

    let error = gateway.translate(&request("xx", "fr", "Hello")).await.unwrap_err();
    assert!(error.is_client_error());

    assert_eq!(stages.call_count(), 0);
    Ok(())
}

/// Test that engine failures surface as server errors
#[tokio::test]
async fn test_translate_withFailingEngine_shouldBeServerError() -> Result<()> {
    let stages = MockStages::new().with_engine("en-fr", MockEngine::Failing);
    let gateway = gateway(vec![common::translate_only("en", "fr", ModelType::Opus)], &stages).await?;

    let error = gateway.translate(&request("en", "fr", "Hello")).await.unwrap_err();

    assert_eq!(error.status_code(), 500);
    assert!(error.to_string().contains("en-fr"));
    Ok(())
}

/// Test batch requests
#[tokio::test]
async fn test_translate_batch_withTwoTexts_shouldReturnBothInOrder() -> Result<()> {
    let stages = MockStages::new().with_engine("en-fr", MockEngine::Suffix("[fr]".to_string()));
    let gateway = gateway(vec![common::translate_only("en", "fr", ModelType::Opus)], &stages).await?;

    let response = gateway
        .translate_batch(&BatchTranslationRequest {
            src: "en".to_string(),
            tgt: "fr".to_string(),
            alt: None,
            texts: vec!["Hello, what is your name?".to_string(), "How are you doing?".to_string()],
        })
        .await?;

    assert_eq!(
        response.translation,
        vec!["Hello, what is your name? [fr]", "How are you doing? [fr]"]
    );
    Ok(())
}

/// Test that only paragraph text is translated and the markup survives
#[tokio::test]
async fn test_translate_html_withParagraphs_shouldKeepMarkup() -> Result<()> {
    let stages = MockStages::new().with_engine("en-fr", MockEngine::Uppercase);
    let gateway = gateway(vec![common::translate_only("en", "fr", ModelType::Opus)], &stages).await?;

    let response = gateway
        .translate_html(&HtmlTranslationRequest {
            src: "en".to_string(),
            tgt: "fr".to_string(),
            alt: None,
            html: r#"<div><h1>Title</h1><p class="intro">Hello <b>world</b></p><p>Fish & chips</p></div>"#.to_string(),
        })
        .await?;

    assert_eq!(
        response.translation,
        r#"<div><h1>Title</h1><p class="intro">HELLO WORLD</p><p>FISH &amp; CHIPS</p></div>"#
    );
    assert_eq!(stages.call_count(), 2);
    Ok(())
}

/// Test that the alt id reaches the multilingual fallback
#[tokio::test]
async fn test_translate_withAltRequest_shouldUseMatchingMultilingualModel() -> Result<()> {
    let stages = MockStages::new()
        .with_engine("MULTI-MULTI-m2m", MockEngine::Suffix("[m2m]".to_string()))
        .with_engine("MULTI-MULTI-nllb", MockEngine::Suffix("[nllb]".to_string()));
    let mut nllb = common::multilingual("nllb", &["en-de"]);
    nllb.model_type = Some(ModelType::Nllb);
    nllb.checkpoint_id = Some("nllb-200-distilled-600M".to_string());
    let gateway = gateway(vec![common::multilingual("m2m", &["en-de"]), nllb], &stages).await?;

    let mut alt_request = request("en", "de", "Hello");
    alt_request.alt = Some("nllb".to_string());

    assert_eq!(gateway.translate(&alt_request).await?.translation, "Hello [nllb]");
    assert_eq!(gateway.translate(&request("en", "de", "Hello")).await?.translation, "Hello [m2m]");
    Ok(())
}

/// Test the discovery payload
#[tokio::test]
async fn test_languages_withMixedModels_shouldListModelsPerPair() -> Result<()> {
    let stages = MockStages::new();
    let gateway = gateway(
        vec![
            common::translate_only("en", "fr", ModelType::Opus),
            common::multilingual("m2m", &["en-fr", "de-sw"]),
        ],
        &stages,
    )
    .await?;

    let value = serde_json::to_value(gateway.languages())?;

    assert_eq!(value["languages"]["en"], json!("English"));
    assert_eq!(value["models"]["en"]["fr"], json!(["MULTI:en-fr-m2m", "en-fr"]));
    assert_eq!(value["models"]["de"]["sw"], json!(["MULTI:de-sw-m2m"]));
    Ok(())
}

/// Test loading the registry from a configuration file
#[tokio::test]
async fn test_registry_from_settings_withConfigFile_shouldServeRequests() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let config = json!({
        "languages": {"en": "English", "sw": "Swahili"},
        "models": [
            {
                "src": "en",
                "tgt": "sw",
                "model_type": "dummy",
                "model_path": "en-sw",
                "pipeline": {"translate": true, "recase": true}
            },
            {"src": "sw", "tgt": "en", "model_type": "dummy", "load": false}
        ]
    });
    let config_path = common::create_test_file(temp_dir.path(), "config.json", &config.to_string())?;
    std::fs::create_dir_all(temp_dir.path().join("en-sw"))?;

    let settings = Settings {
        config_path,
        models_root: temp_dir.path().to_path_buf(),
        ..Default::default()
    };
    let registry = Registry::from_settings(&settings, &MockStages::new()).await?;
    assert_eq!(registry.len(), 1);
    assert!(registry.warnings().is_empty());

    let gateway = Gateway::new(Arc::new(registry));
    let response = gateway.translate(&request("en", "sw", "hello WORLD")).await?;
    assert_eq!(response.translation, "Hello world");
    Ok(())
}
