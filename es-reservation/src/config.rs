use bon::Builder;
use serde::Deserialize;

/// 预留表配置
#[derive(Debug, Clone, Builder, Deserialize)]
pub struct RegistryConfig {
    #[builder(into)]
    pub table_name: String,
    #[builder(into, default = DEFAULT_REGION.to_string())]
    #[serde(default = "default_region")]
    pub region: String,
    #[builder(into)]
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

pub const DEFAULT_REGION: &str = "us-east-1";

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}
