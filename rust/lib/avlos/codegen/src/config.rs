//! `avlos_config.yaml` and schema document loading.
//!
//! Output paths in the config are relative to the config file's directory.

use std::path::Path;

use anyhow::{Context, Result};
use avlos_codegen_lib::{CGeneratorConfig, RstGeneratorConfig};
use serde::{Deserialize, Serialize};

/// Top-level config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AvlosConfig {
    #[serde(default)]
    pub generators: GeneratorsConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GeneratorsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator_c: Option<CSection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator_rst: Option<RstSection>,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CSection {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,

    #[serde(flatten)]
    pub generator: CGeneratorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RstSection {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,

    pub paths: RstGeneratorConfig,
}

impl AvlosConfig {
    /// Read a config file and resolve its output paths.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: AvlosConfig = serde_yml::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(config.resolved(base))
    }

    /// Make every relative output path relative to `base`.
    pub fn resolved(mut self, base: &Path) -> Self {
        if let Some(c) = &mut self.generators.generator_c {
            let paths = &mut c.generator.paths;
            for p in [
                &mut paths.output_enums,
                &mut paths.output_header,
                &mut paths.output_impl,
            ] {
                *p = resolve(base, p);
            }
        }
        if let Some(rst) = &mut self.generators.generator_rst {
            rst.paths.output_file = resolve(base, &rst.paths.output_file);
        }
        self
    }
}

fn resolve(base: &Path, path: &str) -> String {
    let p = Path::new(path);
    if p.is_absolute() {
        path.to_string()
    } else {
        base.join(p).display().to_string()
    }
}

/// Load a schema document. `.json` files are read as JSON, everything else as YAML.
pub fn load_document(path: &Path) -> Result<serde_json::Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading schema {}", path.display()))?;
    let is_json = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let doc = if is_json {
        serde_json::from_str(&text).with_context(|| format!("parsing JSON {}", path.display()))?
    } else {
        serde_yml::from_str(&text).with_context(|| format!("parsing YAML {}", path.display()))?
    };
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
generators:
  generator_c:
    enabled: true
    paths:
      output_enums: out/tm_enums.h
      output_header: out/tm.h
      output_impl: /abs/tm.c
    header_includes:
      - src/common.h
    impl_includes:
      - '"src/common.h"'
  generator_rst:
    enabled: false
    paths:
      output_file: docs/api.rst
"#;

    #[test]
    fn parse_and_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("avlos_config.yaml");
        std::fs::write(&path, CONFIG).unwrap();

        let config = AvlosConfig::load(&path).unwrap();
        let c = config.generators.generator_c.unwrap();
        assert!(c.enabled);
        assert_eq!(
            c.generator.paths.output_enums,
            dir.path().join("out/tm_enums.h").display().to_string()
        );
        assert_eq!(c.generator.paths.output_impl, "/abs/tm.c");
        assert_eq!(c.generator.header_includes, vec!["src/common.h"]);
        assert_eq!(c.generator.impl_includes, vec!["\"src/common.h\""]);
        assert_eq!(c.generator.max_payload, 8);

        let rst = config.generators.generator_rst.unwrap();
        assert!(!rst.enabled);
        assert!(rst.paths.output_file.ends_with("docs/api.rst"));
    }

    #[test]
    fn empty_config() {
        let config: AvlosConfig = serde_yml::from_str("{}").unwrap();
        assert_eq!(config, AvlosConfig::default());
    }

    #[test]
    fn json_and_yaml_documents_agree() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("device.yaml");
        let json = dir.path().join("device.json");
        std::fs::write(&yaml, "name: tm\nremote_attributes:\n  - {name: x, dtype: float, getter_name: get_x}\n").unwrap();
        std::fs::write(
            &json,
            r#"{"name": "tm", "remote_attributes": [{"name": "x", "dtype": "float", "getter_name": "get_x"}]}"#,
        )
        .unwrap();
        assert_eq!(load_document(&yaml).unwrap(), load_document(&json).unwrap());
    }
}
