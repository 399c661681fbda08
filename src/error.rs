//! 错误类型定义 / Error taxonomy
//!
//! 凭证解析与流式提取共用一套错误分类。流水线阶段内部发生的错误以
//! `io::Error` 形式沿字节流传递，source 中携带 [`FetchError`]，
//! 下游可用 [`FetchError::from_stream_error`] 取回分类。

use std::io;
use thiserror::Error;

/// 取件核心错误分类 / Fetch core error kinds
#[derive(Debug, Error)]
pub enum FetchError {
    /// Provider信息不完整或无法使用 / incomplete or unusable provider info
    #[error("Provider配置错误: {0}")]
    Config(String),

    /// 密钥材料获取失败 / secret store failure
    #[error("获取密钥材料失败: {0}")]
    Secret(#[source] anyhow::Error),

    /// 客户端构造失败 / client constructor rejected the configuration
    #[error("创建存储客户端失败: {0}")]
    ClientConstruction(#[source] anyhow::Error),

    /// 对象不存在 / object missing in the store
    #[error("对象不存在: {bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    /// 传输失败 / transport failure during fetch
    #[error("获取对象失败: {0}")]
    Transport(#[source] anyhow::Error),

    /// 压缩帧格式错误 / malformed compressed framing
    #[error("解压失败: {0}")]
    Decompression(#[source] io::Error),

    /// tar结构错误（魔数匹配之后）/ malformed tar structure after magic match
    #[error("解包tar失败: {0}")]
    Extraction(#[source] io::Error),
}

impl FetchError {
    /// 给解压阶段的io错误打上Decompression标签，再放回io::Error传递
    pub(crate) fn tag_decompression(err: io::Error) -> io::Error {
        let kind = err.kind();
        io::Error::new(kind, FetchError::Decompression(err))
    }

    /// 给tar解析错误打上Extraction标签
    pub(crate) fn tag_extraction(err: io::Error) -> io::Error {
        let kind = err.kind();
        io::Error::new(kind, FetchError::Extraction(err))
    }

    /// 从流式读取的io错误中取回分类
    pub fn from_stream_error(err: &io::Error) -> Option<&FetchError> {
        err.get_ref().and_then(|e| e.downcast_ref::<FetchError>())
    }
}
