//! 对象存储抽象 / Object store abstraction
//!
//! 只暴露本核心需要的两个原语：
//! - 按 bucket/key 获取对象的原始字节流
//! - 从已解析的配置构造客户端
//!
//! 具体网络实现在 s3 子模块，测试用桩实现这两个trait即可。

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::config::ClientConfig;
use crate::error::FetchError;

pub mod s3;

/// 流水线统一的字节流类型 / pipeline byte stream type
pub type ByteReader = Box<dyn AsyncRead + Send + Unpin>;

/// 对象存储客户端 / object store client
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// 获取对象原始字节流；错误分类由实现方确定
    /// （ObjectNotFound / Transport）
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ByteReader, FetchError>;
}

/// 客户端工厂 / client factory
///
/// 从配置构造客户端；配置不被构造方接受时返回错误，由调用方
/// 决定是吞掉降级还是映射为 ClientConstruction。
pub trait ObjectStoreFactory: Send + Sync {
    fn construct(&self, config: &ClientConfig) -> anyhow::Result<Box<dyn ObjectStore>>;
}
