//! 客户端配置与Provider信息 / Client configuration and provider info
//!
//! ClientConfig 是可变的客户端配置记录，凭证解析过程逐步填充；
//! ProviderInfo 是调用方传入的一次性描述，每次调用从JSON解析，不持久化。

use serde::{Deserialize, Serialize};

/// 对象存储客户端配置 / Object store client configuration
///
/// endpoint 始终存在。手动凭证构造时 access_key 与 secret_key 要么都有
/// 要么都没有；走外部凭证链构造时两者可以保持缺失。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// 端点主机名（不含scheme）/ endpoint hostname
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// 是否使用TLS，None表示由客户端自行推断 / None = client infers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_tls: Option<bool>,
    /// MinIO等需要路径风格寻址 / path-style addressing for MinIO-like stores
    #[serde(default)]
    pub force_path_style: bool,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// access_key 或 secret_key 缺失 / either credential half missing
    pub fn missing_credentials(&self) -> bool {
        self.access_key.is_none() || self.secret_key.is_none()
    }
}

/// 调用方传入的Provider描述 / caller-supplied provider descriptor
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderInfo {
    #[serde(rename = "Params")]
    pub params: ProviderParams,
}

/// Provider参数。JSON键为camelCase，disableSSL的SSL为全大写。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderParams {
    /// 三态："false"走密钥仓库取凭证，"true"或缺失整体忽略
    pub from_env: Option<String>,
    pub secret_name: Option<String>,
    pub access_key_key: Option<String>,
    pub secret_key_key: Option<String>,
    pub endpoint: Option<String>,
    pub region: Option<String>,
    #[serde(rename = "disableSSL")]
    pub disable_ssl: Option<String>,
}

impl ProviderParams {
    /// 只有 fromEnv 字面等于 "false" 才走手动凭证分支
    pub fn credentials_from_secret(&self) -> bool {
        self.from_env.as_deref() == Some("false")
    }
}

/// 解析Provider信息JSON；解析失败记录日志并按未提供处理
pub fn parse_provider_info(raw: &str) -> Option<ProviderInfo> {
    match serde_json::from_str::<ProviderInfo>(raw) {
        Ok(info) => Some(info),
        Err(e) => {
            tracing::warn!("Provider信息解析失败，按未提供处理: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_info_full() {
        let raw = r#"{
            "Params": {
                "fromEnv": "false",
                "secretName": "mlpipeline-minio-artifact",
                "accessKeyKey": "accesskey",
                "secretKeyKey": "secretkey",
                "endpoint": "https://minio.example.com:9000",
                "region": "us-west-2",
                "disableSSL": "false"
            }
        }"#;
        let info = parse_provider_info(raw).expect("应能解析");
        assert!(info.params.credentials_from_secret());
        assert_eq!(info.params.secret_name.as_deref(), Some("mlpipeline-minio-artifact"));
        assert_eq!(info.params.access_key_key.as_deref(), Some("accesskey"));
        assert_eq!(info.params.secret_key_key.as_deref(), Some("secretkey"));
        assert_eq!(info.params.endpoint.as_deref(), Some("https://minio.example.com:9000"));
        assert_eq!(info.params.disable_ssl.as_deref(), Some("false"));
    }

    #[test]
    fn test_parse_provider_info_from_env_true() {
        // fromEnv为"true"时不走密钥仓库
        let raw = r#"{"Params": {"fromEnv": "true"}}"#;
        let info = parse_provider_info(raw).unwrap();
        assert!(!info.params.credentials_from_secret());
    }

    #[test]
    fn test_parse_provider_info_from_env_absent() {
        let raw = r#"{"Params": {}}"#;
        let info = parse_provider_info(raw).unwrap();
        assert!(info.params.from_env.is_none());
        assert!(!info.params.credentials_from_secret());
    }

    #[test]
    fn test_parse_provider_info_malformed() {
        assert!(parse_provider_info("not json at all").is_none());
        assert!(parse_provider_info(r#"{"NoParams": {}}"#).is_none());
    }

    #[test]
    fn test_missing_credentials() {
        let mut config = ClientConfig::new("minio-service.kubeflow");
        assert!(config.missing_credentials());
        config.access_key = Some("minio".to_string());
        assert!(config.missing_credentials());
        config.secret_key = Some("minio123".to_string());
        assert!(!config.missing_credentials());
    }
}
