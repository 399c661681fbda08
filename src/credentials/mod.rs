//! 凭证解析 / Credential resolution
//!
//! 按固定优先级依次尝试几个互斥的策略，第一个成立的策略决定本次结果：
//! 1. Provider信息显式给出手动凭证（fromEnv=="false"）→ 从密钥仓库取
//! 2. AWS S3端点且缺凭证 → 外部凭证链
//! 3. 仍缺凭证 → 实例元数据凭证
//! 4. 兜底：用当前已有配置直接构造，认证问题留给第一次请求
//!
//! 凭证链与实例元数据的失败是预期内信号，记日志后降级到下一策略；
//! 其余错误原样抛出。每次解析独立，无缓存、无重试、无全局状态。

use std::sync::Arc;

use url::Url;

use crate::config::{parse_provider_info, ClientConfig, ProviderParams};
use crate::error::FetchError;
use crate::storage::s3::S3StoreFactory;
use crate::storage::{ObjectStore, ObjectStoreFactory};

pub mod aws;
pub mod providers;

use aws::{AwsEndpointClassifier, DefaultCredentialChain, InstanceMetadataClient};
use providers::{CredentialProviderChain, EndpointClassifier, InstanceMetadata, SecretStore};

/// 凭证解析器，持有全部可注入的协作方
pub struct CredentialResolver {
    secrets: Arc<dyn SecretStore>,
    chain: Arc<dyn CredentialProviderChain>,
    metadata: Arc<dyn InstanceMetadata>,
    classifier: Arc<dyn EndpointClassifier>,
    factory: Arc<dyn ObjectStoreFactory>,
}

impl CredentialResolver {
    pub fn new(
        secrets: Arc<dyn SecretStore>,
        chain: Arc<dyn CredentialProviderChain>,
        metadata: Arc<dyn InstanceMetadata>,
        classifier: Arc<dyn EndpointClassifier>,
        factory: Arc<dyn ObjectStoreFactory>,
    ) -> Self {
        Self {
            secrets,
            chain,
            metadata,
            classifier,
            factory,
        }
    }

    /// 除密钥仓库外全部使用默认生产实现
    pub fn with_default_aws(secrets: Arc<dyn SecretStore>) -> Self {
        Self::new(
            secrets,
            Arc::new(DefaultCredentialChain),
            Arc::new(InstanceMetadataClient::new()),
            Arc::new(AwsEndpointClassifier),
            Arc::new(S3StoreFactory),
        )
    }

    /// 解析配置并构造客户端 / resolve config and construct a client
    ///
    /// `provider_kind` 为 "s3" 时才会咨询凭证链与实例元数据；
    /// `provider_info_json` 解析失败按未提供处理。
    pub async fn resolve(
        &self,
        base: ClientConfig,
        provider_kind: &str,
        provider_info_json: Option<&str>,
    ) -> Result<Box<dyn ObjectStore>, FetchError> {
        let mut config = base;

        // 策略1：Provider信息显式手动凭证
        if let Some(raw) = provider_info_json {
            if let Some(info) = parse_provider_info(raw) {
                if info.params.credentials_from_secret() {
                    config = self.apply_provider_info(config, &info.params).await?;
                }
            }
        }

        if provider_kind == "s3" && config.missing_credentials() {
            // 策略2：AWS S3端点走外部凭证链
            if self.classifier.is_aws_s3_endpoint(&config.endpoint) {
                if let Some(store) = self.try_provider_chain(&config).await {
                    return Ok(store);
                }
            }
            // 策略3：仍缺凭证则尝试实例元数据
            if config.missing_credentials() {
                if let Some(store) = self.try_instance_profile(&config).await {
                    return Ok(store);
                }
            }
        }

        // 策略4：兜底构造，凭证可能仍缺失
        self.factory
            .construct(&config)
            .map_err(FetchError::ClientConstruction)
    }

    /// 按Provider信息补全配置：先取密钥材料，再解析端点/区域/端口/TLS
    async fn apply_provider_info(
        &self,
        mut config: ClientConfig,
        params: &ProviderParams,
    ) -> Result<ClientConfig, FetchError> {
        // 密钥引用信息必须齐全，且在任何密钥仓库调用之前校验
        let (secret_name, access_key_key, secret_key_key) = match (
            &params.secret_name,
            &params.access_key_key,
            &params.secret_key_key,
        ) {
            (Some(name), Some(access), Some(secret)) => (name, access, secret),
            _ => {
                return Err(FetchError::Config(
                    "fromEnv为false但密钥引用信息不完整".to_string(),
                ))
            }
        };

        config.access_key = Some(
            self.secrets
                .get_secret(secret_name, access_key_key)
                .await
                .map_err(FetchError::Secret)?,
        );
        config.secret_key = Some(
            self.secrets
                .get_secret(secret_name, secret_key_key)
                .await
                .map_err(FetchError::Secret)?,
        );

        let endpoint_is_aws = params
            .endpoint
            .as_deref()
            .map(|e| self.classifier.is_aws_s3_endpoint(e))
            .unwrap_or(false);

        if endpoint_is_aws {
            match params.endpoint.as_deref() {
                Some(endpoint) if endpoint.starts_with("https") => {
                    // 只保留主机名，丢弃scheme和路径
                    config.endpoint = parse_host(endpoint)?;
                }
                Some(endpoint) => {
                    config.endpoint = endpoint.to_string();
                }
                None => {
                    return Err(FetchError::Config("Provider信息缺少endpoint参数".to_string()))
                }
            }

            if let Some(region) = &params.region {
                config.region = Some(region.clone());
            }

            // AWS S3的端口与TLS按区域惯例由客户端自行推断，用户覆盖一律清掉
            config.port = None;
            config.use_tls = None;
        } else {
            if let Some(endpoint) = params.endpoint.as_deref() {
                let url = parse_url(endpoint)?;
                config.endpoint = host_of(&url)?;
                // URL里显式写的端口优先级最高
                config.port = url.port();
            }

            config.region = params.region.clone();
            config.use_tls = params
                .disable_ssl
                .as_deref()
                .map(|v| !v.eq_ignore_ascii_case("true"));
        }

        Ok(config)
    }

    /// 策略2：外部凭证链。失败或无凭证都降级，不抛错。
    async fn try_provider_chain(&self, config: &ClientConfig) -> Option<Box<dyn ObjectStore>> {
        match self.chain.resolve().await {
            Ok(Some(creds)) => {
                tracing::debug!("凭证链命中，使用链上凭证构造客户端");
                let mut with_creds = config.clone();
                with_creds.access_key = Some(creds.access_key);
                with_creds.secret_key = Some(creds.secret_key);
                with_creds.session_token = creds.session_token;
                match self.factory.construct(&with_creds) {
                    Ok(store) => Some(store),
                    Err(e) => {
                        tracing::warn!("凭证链凭证构造客户端失败: {}", e);
                        None
                    }
                }
            }
            Ok(None) => {
                tracing::warn!("凭证链未返回凭证");
                None
            }
            Err(e) => {
                tracing::warn!("凭证链解析失败: {}", e);
                None
            }
        }
    }

    /// 策略3：实例元数据凭证。先探测可用性，全部失败路径降级。
    async fn try_instance_profile(&self, config: &ClientConfig) -> Option<Box<dyn ObjectStore>> {
        if !self.metadata.available().await {
            tracing::debug!("实例元数据服务不可用，跳过实例凭证");
            return None;
        }

        match self.metadata.credentials().await {
            Ok(Some(creds)) => {
                let mut with_creds = config.clone();
                with_creds.access_key = Some(creds.access_key_id);
                with_creds.secret_key = Some(creds.secret_access_key);
                with_creds.session_token = creds.token;
                match self.factory.construct(&with_creds) {
                    Ok(store) => Some(store),
                    Err(e) => {
                        tracing::warn!("实例凭证构造客户端失败: {}", e);
                        None
                    }
                }
            }
            Ok(None) => {
                tracing::warn!("实例元数据服务未返回凭证");
                None
            }
            Err(e) => {
                tracing::warn!("获取实例凭证失败: {}", e);
                None
            }
        }
    }
}

fn parse_url(endpoint: &str) -> Result<Url, FetchError> {
    Url::parse(endpoint)
        .map_err(|e| FetchError::Config(format!("endpoint不是合法URL: {}: {}", endpoint, e)))
}

fn host_of(url: &Url) -> Result<String, FetchError> {
    url.host_str()
        .map(str::to_string)
        .ok_or_else(|| FetchError::Config(format!("endpoint缺少主机名: {}", url)))
}

fn parse_host(endpoint: &str) -> Result<String, FetchError> {
    host_of(&parse_url(endpoint)?)
}
