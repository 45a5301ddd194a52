//! Layered config loading, canonical serialization, and the reproducibility
//! hash (§6.1, §6.4, §7, §8 Scenario F; generalized from
//! `mqk-config/src/lib.rs`'s `load_layered_yaml`/`deep_merge`/
//! `canonicalize_json` to load a validated [`RunConfig`] and a map of
//! [`InstrumentConfig`] instead of a generic JSON passthrough).

use std::collections::HashMap;
use std::fs;

use orb_types::{ConfigError, InstrumentConfig, RunConfig};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// The result of loading and merging one or more YAML layers: the parsed
/// value, its canonical (key-sorted, compact) JSON form, and a SHA-256 hash
/// of that canonical form.
///
/// §6.4: "any semantically equivalent configuration produces the same
/// hash" — two layer sets that merge to the same JSON object hash
/// identically regardless of key order or formatting in the source files.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub merged_json: Value,
    pub canonical_json: String,
    pub config_hash: String,
}

/// Merge one or more YAML files in order (later files override earlier
/// ones) into a single canonical JSON document and hash it.
pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig, ConfigError> {
    let mut merged = Value::Object(Default::default());
    for path in paths {
        let raw = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("read config {path}: {e}")))?;
        let yaml_val: serde_yaml::Value = serde_yaml::from_str(&raw)
            .map_err(|e| ConfigError::Parse(format!("parse yaml {path}: {e}")))?;
        let json_val = serde_json::to_value(yaml_val)
            .map_err(|e| ConfigError::Parse(format!("yaml->json {path}: {e}")))?;
        deep_merge(&mut merged, json_val);
    }
    let canonical = canonicalize_json(&merged);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let config_hash = hex::encode(hasher.finalize());
    Ok(LoadedConfig {
        merged_json: serde_json::from_str(&canonical)
            .map_err(|e| ConfigError::Parse(format!("canonical json reparse: {e}")))?,
        canonical_json: canonical,
        config_hash,
    })
}

/// Load, merge, and validate a run-level config from one or more layered
/// YAML files (§6.1: base config overlaid by an optional per-run override
/// layer).
pub fn load_run_config(paths: &[&str]) -> Result<(RunConfig, LoadedConfig), ConfigError> {
    let loaded = load_layered_yaml(paths)?;
    let run_config: RunConfig = serde_json::from_value(loaded.merged_json.clone())
        .map_err(|e| ConfigError::Parse(format!("run config shape: {e}")))?;
    run_config
        .rules
        .validate()
        .map_err(ConfigError::Invalid)?;
    if run_config.start_date > run_config.end_date {
        return Err(ConfigError::Invalid(
            "start_date must be <= end_date".into(),
        ));
    }
    if run_config.instruments.is_empty() {
        return Err(ConfigError::Invalid(
            "instruments list must not be empty".into(),
        ));
    }
    Ok((run_config, loaded))
}

/// Load, merge, and validate every instrument config file, keyed by
/// symbol. Each file is itself a (possibly layered) merge, so a single
/// per-instrument override file can sit on top of a shared defaults file.
pub fn load_instrument_configs(
    instruments: &[&str],
    layers_for: impl Fn(&str) -> Vec<String>,
) -> Result<HashMap<String, InstrumentConfig>, ConfigError> {
    let mut out = HashMap::with_capacity(instruments.len());
    for symbol in instruments {
        let layer_paths = layers_for(symbol);
        let path_refs: Vec<&str> = layer_paths.iter().map(String::as_str).collect();
        let loaded = load_layered_yaml(&path_refs)?;
        let cfg: InstrumentConfig = serde_json::from_value(loaded.merged_json)
            .map_err(|e| ConfigError::Parse(format!("{symbol}: instrument config shape: {e}")))?;
        cfg.validate().map_err(ConfigError::Invalid)?;
        out.insert(symbol.to_string(), cfg);
    }
    Ok(out)
}

/// Recursive merge: objects merge key-by-key, everything else (scalars,
/// arrays) is replaced wholesale by the later layer.
fn deep_merge(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(dst_map), Value::Object(src_map)) => {
            for (k, v) in src_map {
                deep_merge(dst_map.entry(k).or_insert(Value::Null), v);
            }
        }
        (dst_slot, src_val) => {
            *dst_slot = src_val;
        }
    }
}

/// Key-sorted, compact JSON serialization. Two JSON values that are
/// structurally equal but differ in key order or whitespace produce the
/// same string, which is what makes the §6.4 config hash stable.
fn canonicalize_json(v: &Value) -> String {
    serde_json::to_string(&sort_keys(v)).expect("canonical json is always serializable")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = serde_json::Map::new();
            for (k, val) in entries {
                sorted.insert(k.clone(), sort_keys(val));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}
