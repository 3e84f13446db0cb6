use serde::Deserialize;

/// Logging and span export settings.
///
/// Logs always go to stderr. Setting `[telemetry.otlp]` additionally exports
/// the resolver, directory and queue spans to a collector.
///
/// ```toml
/// [telemetry]
/// level = "info,authtrail_core=debug"
///
/// [telemetry.otlp]
/// endpoint = "http://otel-collector:4317"
/// protocol = "grpc"
/// sample_ratio = 0.5
/// ```
#[derive(Debug, Deserialize)]
pub struct TelemetryConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub otlp: Option<OtlpConfig>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            otlp: None,
        }
    }
}

fn default_level() -> String {
    "info".to_owned()
}

#[derive(Debug, Deserialize)]
pub struct OtlpConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub protocol: OtlpProtocol,
    /// Fraction of batches traced, 0.0 to 1.0.
    #[serde(default = "default_sample_ratio")]
    pub sample_ratio: f64,
    #[serde(default = "default_export_timeout")]
    pub timeout_seconds: u64,
}

impl Default for OtlpConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            protocol: OtlpProtocol::default(),
            sample_ratio: default_sample_ratio(),
            timeout_seconds: default_export_timeout(),
        }
    }
}

/// OTLP transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtlpProtocol {
    #[default]
    Grpc,
    Http,
}

fn default_endpoint() -> String {
    "http://localhost:4317".to_owned()
}

fn default_sample_ratio() -> f64 {
    1.0
}

fn default_export_timeout() -> u64 {
    10
}
