/*!
 * Tests for runtime settings and configuration document parsing
 */

use anyhow::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use mtgateway::app_config::{ConfigDocument, LogLevel, ModelType, SentenceSplit, Settings};
use mtgateway::errors::ConfigError;

use crate::common;

const SAMPLE_CONFIG: &str = r#"{
    "languages": {"en": "English", "fr": "French"},
    "models": [
        {
            "src": "en",
            "tgt": "fr",
            "model_type": "opus",
            "model_path": "en-fr",
            "sentence_split": "nltk",
            "pipeline": {"lowercase": true, "translate": true, "recase": true}
        },
        {
            "src": "fr",
            "tgt": "en",
            "alt": "custom",
            "model_type": "marian",
            "load": false,
            "sentence_split": [".", "!"]
        },
        {
            "model_type": "nllb",
            "multilingual": true,
            "supported_pairs": ["en-fr", "fr-en"],
            "checkpoint_id": "nllb-200-distilled-600M"
        }
    ]
}"#;

/// Test parsing a complete configuration document
#[test]
fn test_parse_withSampleDocument_shouldReadEveryField() -> Result<()> {
    let document = ConfigDocument::parse(SAMPLE_CONFIG, Path::new("config.json"))?;

    let languages = document.languages.as_ref().expect("languages should be present");
    assert_eq!(languages.get("fr").map(String::as_str), Some("French"));

    let models = document
        .model_specs()
        .expect("models should be present")
        .into_iter()
        .collect::<Result<Vec<_>, String>>()
        .map_err(anyhow::Error::msg)?;
    assert_eq!(models.len(), 3);

    let en_fr = &models[0];
    assert_eq!(en_fr.model_type, Some(ModelType::Opus));
    assert!(en_fr.load);
    assert!(en_fr.pipeline.lowercase && en_fr.pipeline.translate && en_fr.pipeline.recase);
    assert!(!en_fr.pipeline.tokenize && !en_fr.pipeline.bpe);
    assert_eq!(en_fr.sentence_split, Some(SentenceSplit::Named("nltk".to_string())));

    let fr_en = &models[1];
    assert!(!fr_en.load);
    assert_eq!(fr_en.model_type, Some(ModelType::Unknown("marian".to_string())));
    assert_eq!(
        fr_en.sentence_split,
        Some(SentenceSplit::Boundaries(vec![".".to_string(), "!".to_string()]))
    );

    let multi = &models[2];
    assert!(multi.multilingual);
    assert!(multi.src.is_none());
    assert_eq!(multi.supported_pairs, vec!["en-fr", "fr-en"]);
    Ok(())
}

/// Test that a mistyped model entry only fails its own slot
#[test]
fn test_parse_withMistypedModelEntry_shouldKeepDocument() -> Result<()> {
    let content = r#"{
        "models": [
            {"src": "en", "tgt": "fr", "model_type": "dummy", "pipeline": {"translate": true}},
            {"src": "en", "tgt": "de", "model_type": "dummy", "sentence_split": true},
            {"src": 5, "tgt": "fr", "model_type": "dummy"},
            {"model_type": "m2m100", "multilingual": true, "supported_pairs": "en-fr"}
        ]
    }"#;

    let document = ConfigDocument::parse(content, Path::new("config.json"))?;
    let entries = document.model_specs().expect("models should be present");

    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0].as_ref().ok().and_then(|spec| spec.tgt.clone()), Some("fr".to_string()));
    assert!(entries[1..].iter().all(|entry| entry.is_err()));
    Ok(())
}

/// Test that broken JSON is a fatal configuration error
#[test]
fn test_parse_withBrokenJson_shouldReturnMalformed() {
    let result = ConfigDocument::parse("{\"models\": [", Path::new("broken.json"));
    assert!(matches!(result, Err(ConfigError::Malformed { path, .. }) if path == PathBuf::from("broken.json")));
}

/// Test loading from disk
#[test]
fn test_load_withExistingAndMissingFiles_shouldBehaveCorrectly() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "config.json", SAMPLE_CONFIG)?;

    let document = ConfigDocument::load(&path)?;
    assert_eq!(document.models.as_ref().map(|m| m.len()), Some(3));

    let missing = ConfigDocument::load(&temp_dir.path().join("absent.json"));
    assert!(matches!(missing, Err(ConfigError::Unreadable { .. })));
    Ok(())
}

/// Test model type spelling round trip
#[test]
fn test_model_type_withConfigSpellings_shouldRoundTrip() {
    for spelling in ["opus", "opus-big", "ctranslator2", "dummy", "custom", "m2m100", "nllb"] {
        let model_type = ModelType::from(spelling.to_string());
        assert!(model_type.is_supported(), "{} should be supported", spelling);
        assert_eq!(model_type.as_str(), spelling);
    }
    assert!(!ModelType::from("fairseq".to_string()).is_supported());
    assert_eq!(ModelType::OpusBig.translate_label(), "opus-big-huggingface");
}

/// Test settings built from environment variables
#[test]
fn test_settings_from_lookup_withVariables_shouldOverrideDefaults() {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("MT_API_CONFIG", "/etc/mt/config.json"),
        ("MODELS_ROOT", "/models"),
        ("MT_API_ENGINE_URL", "http://engine:9000"),
        ("MT_API_READINESS_RETRIES", "5"),
        ("MT_API_ENGINE_TIMEOUT", "not-a-number"),
        ("MT_API_LOG_LEVEL", "debug"),
    ]);
    let settings = Settings::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

    assert_eq!(settings.config_path, PathBuf::from("/etc/mt/config.json"));
    assert_eq!(settings.models_root, PathBuf::from("/models"));
    assert_eq!(settings.engine_url, "http://engine:9000");
    assert_eq!(settings.engine_management_url, Settings::default().engine_management_url);
    assert_eq!(settings.readiness_retries, 5);
    assert_eq!(settings.engine_timeout_secs, 60);
    assert_eq!(settings.log_level, LogLevel::Debug);
    assert!(settings.validate().is_ok());
}

/// Test settings validation
#[test]
fn test_settings_validate_withInvalidValues_shouldFail() {
    assert!(Settings::default().validate().is_err());

    let settings = Settings {
        config_path: PathBuf::from("config.json"),
        engine_url: "not a url".to_string(),
        ..Settings::default()
    };
    assert!(settings.validate().is_err());

    let settings = Settings {
        config_path: PathBuf::from("config.json"),
        readiness_retries: 0,
        ..Settings::default()
    };
    assert!(settings.validate().is_err());
}

/// Test log level parsing
#[test]
fn test_log_level_from_str_withVariousCases_shouldParse() {
    assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warn);
    assert_eq!("trace".parse::<LogLevel>().unwrap(), LogLevel::Trace);
    assert!("verbose".parse::<LogLevel>().is_err());
    assert_eq!(LogLevel::Error.to_level_filter(), log::LevelFilter::Error);
}
