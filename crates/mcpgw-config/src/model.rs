use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::de::Error as DeError;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::ConfigError;

/// A child process the gateway spawns before dialing an SSE endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalLaunch {
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
}

/// How the gateway reaches one backend MCP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendTransport {
    /// A child process communicating over its stdin/stdout.
    Stdio {
        command: String,
        args: Vec<String>,
        env: HashMap<String, String>,
    },
    /// An SSE endpoint, optionally fronted by a locally spawned process.
    Sse {
        url: String,
        local_launch: Option<LocalLaunch>,
    },
}

impl BackendTransport {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Stdio { .. } => "stdio",
            Self::Sse { .. } => "sse",
        }
    }
}

/// One backend entry, keyed externally by its (unique, non-empty) name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub name: String,
    pub transport: BackendTransport,
}

/// The full set of backends the gateway should connect on startup.
///
/// Preserves the insertion order of the source JSON object so that
/// downstream startup/discovery ordering is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayConfig {
    pub backends: Vec<BackendConfig>,
}

impl GatewayConfig {
    /// Load and validate the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&raw).map_err(|err| match err {
            ConfigError::Parse { .. } | ConfigError::Invalid(_) => retag_path(err, path),
            other => other,
        })
    }

    /// Parse and validate a configuration document already held in memory.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
            path: "<in-memory>".into(),
            source,
        })?;

        let Value::Object(top) = value else {
            return Err(ConfigError::Invalid(
                "configuration file top level must be a JSON object".to_string(),
            ));
        };

        let mut backends = Vec::with_capacity(top.len());
        for (name, entry) in top {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                return Err(ConfigError::Invalid(
                    "backend name must be a non-empty string".to_string(),
                ));
            }
            let transport = parse_transport(trimmed, entry)?;
            backends.push(BackendConfig {
                name: trimmed.to_string(),
                transport,
            });
        }

        Ok(Self { backends })
    }

    /// Serialize back to the canonical JSON configuration document.
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: "<in-memory>".into(),
            source,
        })
    }
}

fn retag_path(err: ConfigError, path: &Path) -> ConfigError {
    match err {
        ConfigError::Parse { source, .. } => ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        },
        ConfigError::Invalid(msg) => ConfigError::Invalid(format!("{}: {msg}", path.display())),
        other => other,
    }
}

fn parse_transport(name: &str, entry: Value) -> Result<BackendTransport, ConfigError> {
    let Value::Object(fields) = entry else {
        return Err(ConfigError::Invalid(format!(
            "backend '{name}' must be a JSON object"
        )));
    };

    let server_type = fields
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ConfigError::Invalid(format!(
                "backend '{name}' is missing a 'type' field of \"stdio\" or \"sse\""
            ))
        })?;

    match server_type {
        "stdio" => {
            let command = non_empty_string(&fields, "command", name)?;
            let args = string_list(&fields, "args", name)?.unwrap_or_default();
            let env = string_map(&fields, "env", name)?.unwrap_or_default();
            Ok(BackendTransport::Stdio {
                command,
                args,
                env,
            })
        }
        "sse" => {
            let url = non_empty_string(&fields, "url", name)?;
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid(format!(
                    "backend '{name}': 'url' must begin with http:// or https://, got '{url}'"
                )));
            }

            let local_launch = if fields.contains_key("command") {
                let command = non_empty_string(&fields, "command", name)?;
                let args = string_list(&fields, "args", name)?.unwrap_or_default();
                let env = string_map(&fields, "env", name)?.unwrap_or_default();
                Some(LocalLaunch {
                    command,
                    args,
                    env,
                })
            } else {
                None
            };

            Ok(BackendTransport::Sse { url, local_launch })
        }
        other => Err(ConfigError::Invalid(format!(
            "backend '{name}': unknown type '{other}' (expected \"stdio\" or \"sse\")"
        ))),
    }
}

fn non_empty_string(
    fields: &serde_json::Map<String, Value>,
    field: &str,
    name: &str,
) -> Result<String, ConfigError> {
    match fields.get(field).and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(ConfigError::Invalid(format!(
            "backend '{name}': '{field}' must be a non-empty string"
        ))),
    }
}

fn string_list(
    fields: &serde_json::Map<String, Value>,
    field: &str,
    name: &str,
) -> Result<Option<Vec<String>>, ConfigError> {
    let Some(value) = fields.get(field) else {
        return Ok(None);
    };
    let Value::Array(items) = value else {
        return Err(ConfigError::Invalid(format!(
            "backend '{name}': '{field}' must be a list of strings"
        )));
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item.as_str() {
            Some(s) => out.push(s.to_string()),
            None => {
                return Err(ConfigError::Invalid(format!(
                    "backend '{name}': every element of '{field}' must be a string"
                )));
            }
        }
    }
    Ok(Some(out))
}

fn string_map(
    fields: &serde_json::Map<String, Value>,
    field: &str,
    name: &str,
) -> Result<Option<HashMap<String, String>>, ConfigError> {
    let Some(value) = fields.get(field) else {
        return Ok(None);
    };
    if value.is_null() {
        return Ok(None);
    }
    let Value::Object(map) = value else {
        return Err(ConfigError::Invalid(format!(
            "backend '{name}': '{field}' must be an object of string to string"
        )));
    };
    let mut out = HashMap::with_capacity(map.len());
    for (key, val) in map {
        match val.as_str() {
            Some(s) => {
                out.insert(key.clone(), s.to_string());
            }
            None => {
                return Err(ConfigError::Invalid(format!(
                    "backend '{name}': value of '{field}.{key}' must be a string"
                )));
            }
        }
    }
    Ok(Some(out))
}

impl Serialize for GatewayConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.backends.len()))?;
        for backend in &self.backends {
            map.serialize_entry(&backend.name, &backend.transport)?;
        }
        map.end()
    }
}

impl Serialize for BackendTransport {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Stdio { command, args, env } => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("type", "stdio")?;
                map.serialize_entry("command", command)?;
                if !args.is_empty() {
                    map.serialize_entry("args", args)?;
                }
                if !env.is_empty() {
                    map.serialize_entry("env", env)?;
                }
                map.end()
            }
            Self::Sse { url, local_launch } => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("type", "sse")?;
                map.serialize_entry("url", url)?;
                if let Some(launch) = local_launch {
                    map.serialize_entry("command", &launch.command)?;
                    if !launch.args.is_empty() {
                        map.serialize_entry("args", &launch.args)?;
                    }
                    if !launch.env.is_empty() {
                        map.serialize_entry("env", &launch.env)?;
                    }
                }
                map.end()
            }
        }
    }
}

/// Deserialize support for `GatewayConfig` (round-trip via `serde_json::Value`).
///
/// `parse` does its own validation pass with richer error messages; this impl
/// exists so a `GatewayConfig` can be deserialized directly where validation
/// has already happened (e.g. re-reading a document this crate produced).
impl<'de> Deserialize<'de> for GatewayConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let raw = serde_json::to_string(&value).map_err(DeError::custom)?;
        GatewayConfig::parse(&raw).map_err(DeError::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stdio_backend() {
        let cfg = GatewayConfig::parse(
            r#"{"alpha": {"type": "stdio", "command": "echo-server", "args": ["--x"]}}"#,
        )
        .unwrap();
        assert_eq!(cfg.backends.len(), 1);
        assert_eq!(cfg.backends[0].name, "alpha");
        match &cfg.backends[0].transport {
            BackendTransport::Stdio { command, args, env } => {
                assert_eq!(command, "echo-server");
                assert_eq!(args, &vec!["--x".to_string()]);
                assert!(env.is_empty());
            }
            other => panic!("expected Stdio, got {other:?}"),
        }
    }

    #[test]
    fn parses_sse_backend_with_local_launch() {
        let cfg = GatewayConfig::parse(
            r#"{"beta": {"type": "sse", "url": "http://127.0.0.1:9001/sse", "command": "beta-server"}}"#,
        )
        .unwrap();
        match &cfg.backends[0].transport {
            BackendTransport::Sse { url, local_launch } => {
                assert_eq!(url, "http://127.0.0.1:9001/sse");
                let launch = local_launch.as_ref().unwrap();
                assert_eq!(launch.command, "beta-server");
            }
            other => panic!("expected Sse, got {other:?}"),
        }
    }

    #[test]
    fn sse_without_local_launch_has_no_command() {
        let cfg =
            GatewayConfig::parse(r#"{"beta": {"type": "sse", "url": "https://example.com/sse"}}"#)
                .unwrap();
        match &cfg.backends[0].transport {
            BackendTransport::Sse { local_launch, .. } => assert!(local_launch.is_none()),
            other => panic!("expected Sse, got {other:?}"),
        }
    }

    #[test]
    fn rejects_non_http_sse_url() {
        let err = GatewayConfig::parse(r#"{"beta": {"type": "sse", "url": "ftp://x"}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_empty_backend_name() {
        let err =
            GatewayConfig::parse(r#"{"": {"type": "stdio", "command": "x"}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_missing_type() {
        let err = GatewayConfig::parse(r#"{"alpha": {"command": "x"}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_type() {
        let err =
            GatewayConfig::parse(r#"{"alpha": {"type": "websocket", "url": "x"}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_non_object_top_level() {
        let err = GatewayConfig::parse(r#"[1, 2, 3]"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = GatewayConfig::parse(r#"{"alpha": "#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn empty_configuration_is_valid() {
        let cfg = GatewayConfig::parse("{}").unwrap();
        assert!(cfg.backends.is_empty());
    }

    #[test]
    fn load_reports_not_found() {
        let missing = std::path::Path::new("/nonexistent/gateway-config-test.json");
        let err = GatewayConfig::load(missing).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn load_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.json");
        std::fs::write(
            &path,
            r#"{
                "alpha": {"type": "stdio", "command": "alpha-bin", "args": ["--verbose"], "env": {"FOO": "bar"}},
                "beta": {"type": "sse", "url": "https://example.com/sse"}
            }"#,
        )
        .unwrap();

        let loaded = GatewayConfig::load(&path).unwrap();
        assert_eq!(loaded.backends.len(), 2);

        let serialized = loaded.to_json_string().unwrap();
        let reparsed = GatewayConfig::parse(&serialized).unwrap();
        assert_eq!(reparsed, loaded);
    }
}
