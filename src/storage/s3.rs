//! S3客户端实现 / S3-backed object store
//!
//! 基于 rust-s3。Bucket 按请求构造（只是填结构体，无网络开销），
//! endpoint URL 由主机名/端口/TLS开关拼出，Region 统一用 Custom。

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::Region;

use super::{ByteReader, ObjectStore, ObjectStoreFactory};
use crate::config::ClientConfig;
use crate::error::FetchError;

/// rust-s3 后端的对象存储客户端
pub struct S3ObjectStore {
    config: ClientConfig,
}

impl S3ObjectStore {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        // 提前构造一次凭证，配置问题在这里暴露而不是第一次请求时
        build_credentials(config)?;
        Ok(Self {
            config: config.clone(),
        })
    }

    /// 拼endpoint URL；未指定TLS按https处理
    fn endpoint_url(&self) -> String {
        let scheme = if self.config.use_tls.unwrap_or(true) {
            "https"
        } else {
            "http"
        };
        match self.config.port {
            Some(port) => format!("{}://{}:{}", scheme, self.config.endpoint, port),
            None => format!("{}://{}", scheme, self.config.endpoint),
        }
    }

    fn bucket(&self, name: &str) -> Result<Box<Bucket>> {
        let region = Region::Custom {
            region: self
                .config
                .region
                .clone()
                .unwrap_or_else(|| "us-east-1".to_string()),
            endpoint: self.endpoint_url(),
        };
        let credentials = build_credentials(&self.config)?;
        let bucket = Bucket::new(name, region, credentials)
            .map_err(|e| anyhow!("创建S3 Bucket失败: {}", e))?;

        Ok(if self.config.force_path_style {
            bucket.with_path_style()
        } else {
            bucket
        })
    }
}

/// 凭证齐全用静态凭证，缺失时匿名构造，认证失败推迟到第一次请求
fn build_credentials(config: &ClientConfig) -> Result<Credentials> {
    match (&config.access_key, &config.secret_key) {
        (Some(access_key), Some(secret_key)) => Credentials::new(
            Some(access_key),
            Some(secret_key),
            config.session_token.as_deref(),
            None,
            None,
        )
        .map_err(|e| anyhow!("创建S3凭证失败: {}", e)),
        _ => Credentials::anonymous().map_err(|e| anyhow!("创建S3匿名凭证失败: {}", e)),
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ByteReader, FetchError> {
        let not_found = || FetchError::ObjectNotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        };

        let b = self
            .bucket(bucket)
            .map_err(FetchError::Transport)?;

        let response = match b.get_object(key).await {
            Ok(response) => response,
            Err(S3Error::HttpFailWithBody(404, _)) => return Err(not_found()),
            Err(e) => {
                return Err(FetchError::Transport(anyhow!("获取S3对象失败: {}", e)));
            }
        };

        match response.status_code() {
            200..=299 => {}
            404 => return Err(not_found()),
            code => {
                return Err(FetchError::Transport(anyhow!(
                    "获取S3对象失败: HTTP {}",
                    code
                )));
            }
        }

        // rust-s3返回完整响应，封装为AsyncRead
        let data = response.bytes().to_vec();
        tracing::debug!("S3对象获取成功: bucket={}, key={}, size={}", bucket, key, data.len());
        Ok(Box::new(std::io::Cursor::new(data)))
    }
}

/// 默认工厂：构造rust-s3客户端
pub struct S3StoreFactory;

impl ObjectStoreFactory for S3StoreFactory {
    fn construct(&self, config: &ClientConfig) -> Result<Box<dyn ObjectStore>> {
        Ok(Box::new(S3ObjectStore::new(config)?))
    }
}
