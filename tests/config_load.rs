// tests/config_load.rs
//
// File + env resolution for RelayConfig and SourceCatalog.
// Env vars are process-global, so every test here runs serially.

use std::io::Write;

use research_relay::catalog::ENV_CATALOG_PATH;
use research_relay::config::{ENV_CONFIG_PATH, ENV_DEFAULT_SOURCE, ENV_MAX_RETRIES};
use research_relay::{RelayConfig, SourceCatalog, SourceId};
use serial_test::serial;

fn clear_env() {
    for k in [
        ENV_CONFIG_PATH,
        ENV_MAX_RETRIES,
        ENV_DEFAULT_SOURCE,
        ENV_CATALOG_PATH,
    ] {
        std::env::remove_var(k);
    }
}

fn write_temp(suffix: &str, body: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("tempfile");
    f.write_all(body.as_bytes()).expect("write");
    f
}

#[test]
#[serial]
fn toml_config_is_loaded_from_env_path() {
    clear_env();
    let f = write_temp(
        ".toml",
        r#"
max_retries = 1
default_source = "Wikipedia"

[timeouts]
collect_secs = 5

[llm]
provider = "openrouter"
model = "small"
analysis_model = "big"
"#,
    );
    std::env::set_var(ENV_CONFIG_PATH, f.path());

    let cfg = RelayConfig::load_default().unwrap();
    assert_eq!(cfg.max_retries, 1);
    assert_eq!(cfg.default_source, "wikipedia");
    assert_eq!(cfg.timeouts.collect_secs, 5);
    assert_eq!(cfg.timeouts.classify_secs, 15);
    assert_eq!(cfg.llm.synthesis_model(), "big");
    clear_env();
}

#[test]
#[serial]
fn env_overrides_beat_the_file() {
    clear_env();
    let f = write_temp(".json", r#"{ "max_retries": 4, "default_source": "arxiv" }"#);
    std::env::set_var(ENV_CONFIG_PATH, f.path());
    std::env::set_var(ENV_MAX_RETRIES, "0");
    std::env::set_var(ENV_DEFAULT_SOURCE, "reddit");

    let cfg = RelayConfig::load_default().unwrap();
    assert_eq!(cfg.max_retries, 0);
    assert_eq!(cfg.default_source, "reddit");
    clear_env();
}

#[test]
#[serial]
fn invalid_retry_override_is_ignored() {
    clear_env();
    let f = write_temp(".toml", "max_retries = 3\n");
    std::env::set_var(ENV_CONFIG_PATH, f.path());
    std::env::set_var(ENV_MAX_RETRIES, "lots");

    let cfg = RelayConfig::load_default().unwrap();
    assert_eq!(cfg.max_retries, 3);
    clear_env();
}

#[test]
#[serial]
fn missing_config_path_is_an_error() {
    clear_env();
    std::env::set_var(ENV_CONFIG_PATH, "/definitely/not/here.toml");
    assert!(RelayConfig::load_default().is_err());
    clear_env();
}

#[test]
#[serial]
fn catalog_toml_and_json_are_equivalent() {
    clear_env();
    let toml = write_temp(
        ".toml",
        "[chains]\nnews = [\"wikipedia\", \"news\", \"wikipedia\"]\nwikipedia = []\n",
    );
    let json = write_temp(".json", r#"{ "news": ["wikipedia"], "wikipedia": [] }"#);

    std::env::set_var(ENV_CATALOG_PATH, toml.path());
    let a = SourceCatalog::load_default().unwrap();
    std::env::set_var(ENV_CATALOG_PATH, json.path());
    let b = SourceCatalog::load_default().unwrap();

    let news = SourceId::new("news");
    // self reference and duplicate dropped
    assert_eq!(a.fallbacks_for(&news), &[SourceId::new("wikipedia")]);
    assert_eq!(a.fallbacks_for(&news), b.fallbacks_for(&news));
    assert_eq!(a.known(), b.known());
    clear_env();
}

#[test]
#[serial]
fn catalog_without_file_uses_seed() {
    clear_env();
    let cat = SourceCatalog::load_default().unwrap();
    assert_eq!(
        cat.fallbacks_for(&SourceId::new("arxiv")),
        &[SourceId::new("github"), SourceId::new("news")]
    );
}

#[test]
#[serial]
fn bundled_examples_parse() {
    clear_env();
    let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config");

    let cfg = RelayConfig::load_from(&root.join("relay.example.toml")).unwrap();
    assert_eq!(cfg.max_retries, 2);
    assert_eq!(cfg.llm.provider, "ollama");

    let cat = SourceCatalog::load_from(&root.join("fallbacks.example.toml")).unwrap();
    let seed = SourceCatalog::default_seed();
    for id in seed.known() {
        assert_eq!(cat.fallbacks_for(id), seed.fallbacks_for(id), "chain for {id}");
    }
}
