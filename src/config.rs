//! # Configuration Management Module
//!
//! Builds the single, immutable `Config` a run works with.
//!
//! ## Precedence (last wins):
//! 1. Built-in defaults (quality 70 everywhere, output `public`, no input)
//! 2. `.assetpressrc` in the working directory (JSON)
//! 3. Command line overrides
//!
//! ## Config file:
//! ```json
//! {
//!   "quality": { "jpg": 70, "png": 70, "gif": 70, "webp": 70 },
//!   "input": "src/img",
//!   "output": "dist/assets/img"
//! }
//! ```
//! `source` is still accepted as an alias of `input` for older files.
//!
//! ## Failure policy:
//! Resolution never fails. A missing file is silent; unreadable or malformed
//! files are logged and ignored. When the schema is active, any violation
//! discards the whole file. Without a schema, bad values are dropped one
//! field at a time. Callers must still reject an empty `input` before
//! touching the filesystem (`Config::require_input`).

use crate::error::{PipelineError, Result};
use crate::format::TargetFormat;
use crate::schema::ConfigSchema;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// Conventional config file name, looked up in the working directory
pub const CONFIG_FILE_NAME: &str = ".assetpressrc";
/// Destination used when neither the file nor the CLI names one
pub const DEFAULT_OUTPUT: &str = "public";
pub const DEFAULT_QUALITY: u8 = 70;

/// Per-format encoder quality (0-100)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quality {
    pub jpg: u8,
    pub png: u8,
    pub gif: u8,
    pub webp: u8,
}

impl Default for Quality {
    fn default() -> Self {
        Self {
            jpg: DEFAULT_QUALITY,
            png: DEFAULT_QUALITY,
            gif: DEFAULT_QUALITY,
            webp: DEFAULT_QUALITY,
        }
    }
}

impl Quality {
    /// Quality channel used when encoding to `format`
    pub fn for_format(&self, format: TargetFormat) -> u8 {
        match format {
            TargetFormat::Jpeg => self.jpg,
            TargetFormat::Png => self.png,
            TargetFormat::Gif => self.gif,
            TargetFormat::WebP => self.webp,
        }
    }
}

/// Resolved configuration for one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pub quality: Quality,
    /// Source root. Empty until resolved from the file or the CLI.
    pub input: PathBuf,
    /// Destination root
    pub output: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            input: PathBuf::new(),
            output: PathBuf::from(DEFAULT_OUTPUT),
        }
    }
}

impl Config {
    /// The input root, or `MissingInput` when none was configured
    pub fn require_input(&self) -> Result<&Path> {
        if self.input.as_os_str().is_empty() {
            Err(PipelineError::MissingInput)
        } else {
            Ok(&self.input)
        }
    }
}

/// Values taken from the command line. `None` (or an empty path) leaves the
/// resolved value alone.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub jpg_quality: Option<u8>,
    pub png_quality: Option<u8>,
    pub gif_quality: Option<u8>,
    pub webp_quality: Option<u8>,
}

/// Where the validation schema comes from
#[derive(Debug, Clone)]
pub enum SchemaSource {
    /// Schema compiled into the binary
    Bundled,
    /// Schema read from disk; if it cannot be loaded validation is skipped
    File(PathBuf),
    /// No validation, values are merged field by field
    Disabled,
}

/// Something that went wrong while resolving, reported to the operator
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigIssue {
    Unreadable(String),
    Malformed(String),
    SchemaUnavailable(String),
    SchemaViolations(Vec<String>),
    IgnoredValue { key: String, reason: String },
}

/// Result of resolution: the config plus everything that was ignored on the way
#[derive(Debug, Clone)]
pub struct Resolution {
    pub config: Config,
    pub issues: Vec<ConfigIssue>,
}

/// Loads, validates and merges the configuration
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    config_path: PathBuf,
    schema: SchemaSource,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self {
            config_path: PathBuf::from(CONFIG_FILE_NAME),
            schema: SchemaSource::Bundled,
        }
    }

    /// Read the config from `path` instead of `./.assetpressrc`
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = path.into();
        self
    }

    pub fn with_schema(mut self, schema: SchemaSource) -> Self {
        self.schema = schema;
        self
    }

    /// Resolve the configuration, logging anything that was ignored
    pub async fn resolve(&self, overrides: &CliOverrides) -> Config {
        self.resolve_with_issues(overrides).await.config
    }

    /// Like `resolve`, but also hands back the issues that were logged
    pub async fn resolve_with_issues(&self, overrides: &CliOverrides) -> Resolution {
        let mut issues = Vec::new();

        let mut config = match self.load_document(&mut issues).await {
            Some(document) => self.merge_document(document, &mut issues).await,
            None => Config::default(),
        };

        apply_overrides(&mut config, overrides);
        debug!("Resolved configuration: {:?}", config);

        Resolution { config, issues }
    }

    /// Reads and parses the config file. `None` when absent or unusable.
    async fn load_document(&self, issues: &mut Vec<ConfigIssue>) -> Option<Value> {
        let content = match tokio::fs::read_to_string(&self.config_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config file at {}", self.config_path.display());
                return None;
            }
            Err(e) => {
                warn!(
                    "Failed to read config file {}: {}. Using defaults.",
                    self.config_path.display(),
                    e
                );
                issues.push(ConfigIssue::Unreadable(e.to_string()));
                return None;
            }
        };

        let mut document: Value = match serde_json::from_str(&content) {
            Ok(document) => document,
            Err(e) => {
                warn!(
                    "Config file {} is not valid JSON: {}. Using defaults.",
                    self.config_path.display(),
                    e
                );
                issues.push(ConfigIssue::Malformed(e.to_string()));
                return None;
            }
        };

        apply_source_alias(&mut document);
        Some(document)
    }

    /// Validates (when a schema is available) and merges over the defaults
    async fn merge_document(&self, document: Value, issues: &mut Vec<ConfigIssue>) -> Config {
        let Some(schema) = self.load_schema(issues).await else {
            return merge_over_defaults(&document, issues);
        };

        let errors = schema.validate(&document);
        if errors.is_empty() {
            return merge_over_defaults(&document, issues);
        }

        error!(
            "Config file {} failed schema validation:",
            self.config_path.display()
        );
        for message in &errors {
            error!("  - {}", message);
        }
        warn!("Using default configuration.");
        issues.push(ConfigIssue::SchemaViolations(errors));
        Config::default()
    }

    async fn load_schema(&self, issues: &mut Vec<ConfigIssue>) -> Option<ConfigSchema> {
        let (label, compiled) = match &self.schema {
            SchemaSource::Disabled => return None,
            SchemaSource::Bundled => ("bundled schema".to_string(), ConfigSchema::bundled()),
            SchemaSource::File(path) => {
                let compiled = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| e.to_string())
                    .and_then(|content| {
                        serde_json::from_str::<Value>(&content).map_err(|e| e.to_string())
                    })
                    .and_then(|schema| ConfigSchema::compile(&schema));
                (format!("schema {}", path.display()), compiled)
            }
        };

        match compiled {
            Ok(schema) => Some(schema),
            Err(e) => {
                warn!("Failed to load {}: {}. Skipping validation.", label, e);
                issues.push(ConfigIssue::SchemaUnavailable(e));
                None
            }
        }
    }
}

/// Older config files used `source`; it only counts when `input` is unset
fn apply_source_alias(document: &mut Value) {
    let Some(object) = document.as_object_mut() else {
        return;
    };
    let input_set = object
        .get("input")
        .and_then(Value::as_str)
        .is_some_and(|input| !input.is_empty());
    if input_set {
        return;
    }
    if let Some(source) = object.get("source").filter(|s| is_non_empty_str(s)).cloned() {
        object.insert("input".to_string(), source);
    }
}

fn is_non_empty_str(value: &Value) -> bool {
    value.as_str().is_some_and(|s| !s.is_empty())
}

/// Field-by-field merge. Values of the wrong shape are dropped individually.
fn merge_over_defaults(document: &Value, issues: &mut Vec<ConfigIssue>) -> Config {
    let mut config = Config::default();

    match document.get("quality") {
        None => {}
        Some(Value::Object(quality)) => {
            let channels = [
                ("jpg", &mut config.quality.jpg),
                ("png", &mut config.quality.png),
                ("gif", &mut config.quality.gif),
                ("webp", &mut config.quality.webp),
            ];
            for (key, slot) in channels {
                let Some(value) = quality.get(key) else {
                    continue;
                };
                match quality_value(value) {
                    Some(q) => *slot = q,
                    None => ignore(issues, &format!("quality.{}", key), value, "expected an integer between 0 and 100"),
                }
            }
        }
        Some(other) => ignore(issues, "quality", other, "expected an object"),
    }

    if let Some(input) = path_value(document, "input", issues) {
        config.input = input;
    }
    if let Some(output) = path_value(document, "output", issues) {
        config.output = output;
    }

    config
}

fn quality_value(value: &Value) -> Option<u8> {
    let number = value.as_f64()?;
    if number.fract() != 0.0 || !(0.0..=100.0).contains(&number) {
        return None;
    }
    Some(number as u8)
}

fn path_value(document: &Value, key: &str, issues: &mut Vec<ConfigIssue>) -> Option<PathBuf> {
    match document.get(key)? {
        Value::String(s) if !s.is_empty() => Some(PathBuf::from(s)),
        Value::String(_) => None,
        other => {
            ignore(issues, key, other, "expected a string");
            None
        }
    }
}

fn ignore(issues: &mut Vec<ConfigIssue>, key: &str, value: &Value, reason: &str) {
    warn!("Ignoring config value {} = {}: {}", key, value, reason);
    issues.push(ConfigIssue::IgnoredValue {
        key: key.to_string(),
        reason: reason.to_string(),
    });
}

fn apply_overrides(config: &mut Config, overrides: &CliOverrides) {
    if let Some(input) = overrides.input.as_ref().filter(|p| !p.as_os_str().is_empty()) {
        config.input = input.clone();
    }
    if let Some(output) = overrides.output.as_ref().filter(|p| !p.as_os_str().is_empty()) {
        config.output = output.clone();
    }

    let channels = [
        (overrides.jpg_quality, &mut config.quality.jpg),
        (overrides.png_quality, &mut config.quality.png),
        (overrides.gif_quality, &mut config.quality.gif),
        (overrides.webp_quality, &mut config.quality.webp),
    ];
    for (value, slot) in channels {
        if let Some(q) = value {
            *slot = q.min(100);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn resolve_file(content: &str, schema: SchemaSource) -> Resolution {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        tokio::fs::write(&path, content).await.unwrap();
        ConfigResolver::new()
            .with_config_path(path)
            .with_schema(schema)
            .resolve_with_issues(&CliOverrides::default())
            .await
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.quality, Quality { jpg: 70, png: 70, gif: 70, webp: 70 });
        assert_eq!(config.output, PathBuf::from("public"));
        assert!(config.input.as_os_str().is_empty());
        assert!(matches!(config.require_input(), Err(PipelineError::MissingInput)));
    }

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let resolution = ConfigResolver::new()
            .with_config_path(temp_dir.path().join("absent.json"))
            .resolve_with_issues(&CliOverrides::default())
            .await;
        assert_eq!(resolution.config, Config::default());
        assert!(resolution.issues.is_empty());
    }

    #[tokio::test]
    async fn test_partial_quality_merges_per_channel() {
        let resolution = resolve_file(
            r#"{ "quality": { "jpg": 85 }, "input": "src/img", "output": "dist" }"#,
            SchemaSource::Bundled,
        )
        .await;
        let config = resolution.config;
        assert_eq!(config.quality.jpg, 85);
        assert_eq!(config.quality.png, 70);
        assert_eq!(config.quality.webp, 70);
        assert_eq!(config.input, PathBuf::from("src/img"));
        assert_eq!(config.output, PathBuf::from("dist"));
        assert!(resolution.issues.is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_quality_discards_whole_file() {
        let resolution = resolve_file(
            r#"{ "quality": { "jpg": 150, "png": 50 }, "input": "src", "output": "dist" }"#,
            SchemaSource::Bundled,
        )
        .await;
        assert_eq!(resolution.config, Config::default());
        assert!(matches!(
            resolution.issues.as_slice(),
            [ConfigIssue::SchemaViolations(errors)] if errors.len() == 1
        ));
    }

    #[tokio::test]
    async fn test_unknown_top_level_property_discards_whole_file() {
        let resolution = resolve_file(
            r#"{ "input": "src", "quality": { "jpg": 90 }, "compress": true }"#,
            SchemaSource::Bundled,
        )
        .await;
        assert_eq!(resolution.config, Config::default());
        match &resolution.issues[..] {
            [ConfigIssue::SchemaViolations(errors)] => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].contains("compress"));
            }
            other => panic!("unexpected issues: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_legacy_source_alias() {
        let config = resolve_file(r#"{ "source": "legacy/img" }"#, SchemaSource::Bundled)
            .await
            .config;
        assert_eq!(config.input, PathBuf::from("legacy/img"));

        let config = resolve_file(
            r#"{ "source": "legacy/img", "input": "new/img" }"#,
            SchemaSource::Bundled,
        )
        .await
        .config;
        assert_eq!(config.input, PathBuf::from("new/img"));
    }

    #[tokio::test]
    async fn test_malformed_json_is_not_fatal() {
        let resolution = resolve_file(r#"{ "quality": { "jpg": 80, "#, SchemaSource::Bundled).await;
        assert_eq!(resolution.config, Config::default());
        assert!(matches!(resolution.issues.as_slice(), [ConfigIssue::Malformed(_)]));
    }

    #[tokio::test]
    async fn test_schemaless_merge_drops_only_bad_fields() {
        let resolution = resolve_file(
            r#"{ "quality": { "jpg": 150, "png": 40 }, "input": "src", "extra": 1 }"#,
            SchemaSource::Disabled,
        )
        .await;
        assert_eq!(resolution.config.quality.jpg, 70);
        assert_eq!(resolution.config.quality.png, 40);
        assert_eq!(resolution.config.input, PathBuf::from("src"));
        assert_eq!(
            resolution.issues,
            vec![ConfigIssue::IgnoredValue {
                key: "quality.jpg".to_string(),
                reason: "expected an integer between 0 and 100".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_unloadable_schema_falls_back_to_plain_merge() {
        let resolution = resolve_file(
            r#"{ "quality": { "webp": 55 }, "unknown": true }"#,
            SchemaSource::File(PathBuf::from("/nonexistent/schema.json")),
        )
        .await;
        assert_eq!(resolution.config.quality.webp, 55);
        assert!(matches!(resolution.issues.as_slice(), [ConfigIssue::SchemaUnavailable(_)]));
    }

    #[tokio::test]
    async fn test_schema_file_with_boolean_required() {
        let temp_dir = TempDir::new().unwrap();
        let schema_path = temp_dir.path().join("schema.json");
        std::fs::write(
            &schema_path,
            r#"{
                "type": "object",
                "properties": {
                    "input": { "type": "string", "required": true },
                    "output": { "type": "string" }
                }
            }"#,
        )
        .unwrap();

        let resolution =
            resolve_file(r#"{ "output": "dist" }"#, SchemaSource::File(schema_path.clone())).await;
        assert_eq!(resolution.config, Config::default());
        assert_eq!(
            resolution.issues,
            vec![ConfigIssue::SchemaViolations(vec![
                "\"input\" is a required property".to_string()
            ])]
        );

        let resolution =
            resolve_file(r#"{ "input": "src", "extra": 1 }"#, SchemaSource::File(schema_path)).await;
        assert_eq!(resolution.config.input, PathBuf::from("src"));
        assert!(resolution.issues.is_empty());
    }

    #[tokio::test]
    async fn test_uncompilable_schema_falls_back_to_plain_merge() {
        let temp_dir = TempDir::new().unwrap();
        let schema_path = temp_dir.path().join("schema.json");
        std::fs::write(&schema_path, r#"{ "type": "not-a-type" }"#).unwrap();

        let resolution =
            resolve_file(r#"{ "input": "src" }"#, SchemaSource::File(schema_path)).await;

        assert_eq!(resolution.config.input, PathBuf::from("src"));
        assert!(matches!(resolution.issues.as_slice(), [ConfigIssue::SchemaUnavailable(_)]));
    }

    #[tokio::test]
    async fn test_empty_strings_keep_defaults() {
        let config = resolve_file(r#"{ "input": "", "output": "" }"#, SchemaSource::Bundled)
            .await
            .config;
        assert_eq!(config, Config::default());
    }

    #[tokio::test]
    async fn test_cli_overrides_win() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        tokio::fs::write(&path, r#"{ "input": "file/in", "output": "file/out", "quality": { "gif": 20 } }"#)
            .await
            .unwrap();

        let overrides = CliOverrides {
            input: Some(PathBuf::from("cli/in")),
            output: Some(PathBuf::new()),
            webp_quality: Some(90),
            ..Default::default()
        };
        let config = ConfigResolver::new().with_config_path(path).resolve(&overrides).await;

        assert_eq!(config.input, PathBuf::from("cli/in"));
        assert_eq!(config.output, PathBuf::from("file/out"));
        assert_eq!(config.quality.gif, 20);
        assert_eq!(config.quality.webp, 90);
        assert_eq!(config.require_input().unwrap(), Path::new("cli/in"));
    }

    #[test]
    fn test_quality_for_format() {
        let quality = Quality { jpg: 1, png: 2, gif: 3, webp: 4 };
        assert_eq!(quality.for_format(TargetFormat::Jpeg), 1);
        assert_eq!(quality.for_format(TargetFormat::Png), 2);
        assert_eq!(quality.for_format(TargetFormat::Gif), 3);
        assert_eq!(quality.for_format(TargetFormat::WebP), 4);
    }
}
