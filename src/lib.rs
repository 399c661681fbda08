//! yaofetch - S3兼容对象存储的取件核心 / artifact fetch core
//!
//! 两个彼此独立的组件，调用方先后各调一次完成一次取件：
//! - 凭证解析（credentials）：按固定优先级尝试多种凭证来源，产出配置好的客户端
//! - 流式提取（extract）：对象字节流自动解压，未压缩tar包只保留第一条记录
//!
//! 组件之间没有共享状态；每次调用独立成链，取消即整链释放。

pub mod config;
pub mod credentials;
pub mod error;
pub mod extract;
pub mod storage;

pub use config::{parse_provider_info, ClientConfig, ProviderInfo, ProviderParams};
pub use credentials::CredentialResolver;
pub use error::FetchError;
pub use extract::{get_object_stream, is_tarball};
pub use storage::{ByteReader, ObjectStore, ObjectStoreFactory};
