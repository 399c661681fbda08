//! 凭证相关的外部协作方接口 / injected credential collaborators
//!
//! 密钥仓库、AWS凭证链、实例元数据、端点分类都建模成可注入的trait，
//! 解析器只依赖接口，测试换成确定性的桩实现，不需要动环境变量。

use async_trait::async_trait;
use serde::Deserialize;

/// 凭证链解析结果 / credentials yielded by the provider chain
#[derive(Debug, Clone)]
pub struct ChainCredentials {
    pub access_key: String,
    pub secret_key: String,
    pub session_token: Option<String>,
}

/// 实例元数据返回的凭证，字段名与元数据服务响应一致（PascalCase）
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceProfileCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub token: Option<String>,
}

/// 密钥仓库 / secret store
///
/// 按 名称+键 取密钥材料，不缓存，每次解析需要时现取。
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get_secret(&self, secret_name: &str, secret_key: &str) -> anyhow::Result<String>;
}

/// 外部凭证链（环境变量、配置文件、SSO等，顺序由实现方决定）
#[async_trait]
pub trait CredentialProviderChain: Send + Sync {
    /// 链中无凭证返回 Ok(None)，失败返回 Err；两者调用方都按降级处理
    async fn resolve(&self) -> anyhow::Result<Option<ChainCredentials>>;
}

/// 实例元数据服务 / instance metadata service
#[async_trait]
pub trait InstanceMetadata: Send + Sync {
    /// 可用性探测，实现方内部吞掉探测错误
    async fn available(&self) -> bool;

    /// 元数据服务无凭证时返回 Ok(None)
    async fn credentials(&self) -> anyhow::Result<Option<InstanceProfileCredentials>>;
}

/// 端点分类：该endpoint是否为AWS S3端点
pub trait EndpointClassifier: Send + Sync {
    fn is_aws_s3_endpoint(&self, endpoint: &str) -> bool;
}
