//! AWS侧协作方的默认实现 / default AWS-side collaborators
//!
//! - 端点分类：正则判断是否AWS S3端点
//! - 实例元数据：169.254.169.254 的 security-credentials 接口
//! - 凭证链：委托 rust-s3 的凭证链（环境变量、profile、STS、实例元数据）
//!
//! 元数据base URL可注入，测试指向本地mock服务即可。

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::providers::{
    ChainCredentials, CredentialProviderChain, EndpointClassifier, InstanceMetadata,
    InstanceProfileCredentials,
};

/// AWS S3端点正则，大小写不敏感
static AWS_S3_ENDPOINT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)s3(\..*)?\.amazonaws\.com\.?.*$").expect("端点正则不合法"));

/// 实例元数据服务的凭证路径
const METADATA_URL: &str = "http://169.254.169.254/latest/meta-data/iam/security-credentials";

/// 元数据请求超时；探测失败要快速降级，不能拖住整个解析
const METADATA_TIMEOUT: Duration = Duration::from_secs(3);

/// 基于正则的AWS S3端点分类器
#[derive(Debug, Default, Clone)]
pub struct AwsEndpointClassifier;

impl EndpointClassifier for AwsEndpointClassifier {
    fn is_aws_s3_endpoint(&self, endpoint: &str) -> bool {
        AWS_S3_ENDPOINT_RE.is_match(endpoint)
    }
}

/// 实例元数据客户端 / instance metadata client
pub struct InstanceMetadataClient {
    http: reqwest::Client,
    base_url: String,
}

impl InstanceMetadataClient {
    pub fn new() -> Self {
        Self::with_base_url(METADATA_URL)
    }

    /// base URL可注入，测试用
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// 列出实例绑定的IAM角色名，没有角色返回None
    async fn profile_name(&self) -> Result<Option<String>> {
        let response = self
            .http
            .get(&self.base_url)
            .timeout(METADATA_TIMEOUT)
            .send()
            .await
            .context("实例元数据服务不可达")?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let body = response.text().await.context("读取角色列表失败")?;
        let name = body.lines().next().unwrap_or("").trim().to_string();
        Ok(if name.is_empty() { None } else { Some(name) })
    }
}

impl Default for InstanceMetadataClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InstanceMetadata for InstanceMetadataClient {
    async fn available(&self) -> bool {
        match self.profile_name().await {
            Ok(profile) => profile.is_some(),
            Err(e) => {
                tracing::debug!("实例元数据探测失败: {}", e);
                false
            }
        }
    }

    async fn credentials(&self) -> Result<Option<InstanceProfileCredentials>> {
        let profile = match self.profile_name().await? {
            Some(profile) => profile,
            None => return Ok(None),
        };

        let response = self
            .http
            .get(format!("{}/{}", self.base_url, profile))
            .timeout(METADATA_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("获取实例凭证失败: profile={}", profile))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "获取实例凭证失败: profile={}, HTTP {}",
                profile,
                response.status()
            ));
        }

        let creds = response
            .json::<InstanceProfileCredentials>()
            .await
            .context("实例凭证响应解析失败")?;
        Ok(Some(creds))
    }
}

/// 默认凭证链，委托rust-s3：环境变量 → profile → STS → 实例元数据
#[derive(Debug, Default, Clone)]
pub struct DefaultCredentialChain;

#[async_trait]
impl CredentialProviderChain for DefaultCredentialChain {
    async fn resolve(&self) -> Result<Option<ChainCredentials>> {
        // rust-s3的凭证链是阻塞实现，放到blocking线程跑
        let creds = tokio::task::spawn_blocking(|| s3::creds::Credentials::default())
            .await
            .map_err(|e| anyhow!("凭证链任务失败: {}", e))?
            .map_err(|e| anyhow!("凭证链无可用凭证: {}", e))?;

        match (creds.access_key, creds.secret_key) {
            (Some(access_key), Some(secret_key)) => Ok(Some(ChainCredentials {
                access_key,
                secret_key,
                session_token: creds.session_token.or(creds.security_token),
            })),
            _ => Ok(None),
        }
    }
}
