//! 流式提取 / Streaming extraction pipeline
//!
//! 原始对象流 → （可选）自动解压 → tar嗅探 → 首记录提取或原样透传。
//! 每个阶段只做有限前瞻（2字节、264字节），对象从不整体驻留内存；
//! 分类在流的生命周期内只做一次，定了就不再变。

use std::pin::Pin;
use std::task::{Context, Poll};

use async_compression::tokio::bufread::{GzipDecoder, ZlibDecoder};
use tokio::io::{AsyncRead, BufReader, ReadBuf};

use crate::error::FetchError;
use crate::storage::{ByteReader, ObjectStore};

mod sniff;
mod tar;

pub use sniff::is_tarball;
use sniff::{detect_compression, peek, rejoin, Compression, TAR_SNIFF_LEN};

/// 获取对象并套上提取流水线 / fetch an object through the extraction pipeline
///
/// `try_extract` 为 false 时字节原样返回。否则自动解压gzip/deflate帧；
/// 解压后的内容若是未压缩tar包，则只保留第一条记录的内容。
/// 获取阶段的错误（ObjectNotFound/Transport）原样向上传递。
pub async fn get_object_stream(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    try_extract: bool,
) -> Result<ByteReader, FetchError> {
    let raw = store.get_object(bucket, key).await?;
    if !try_extract {
        return Ok(raw);
    }

    let decompressed = decompress_maybe(raw).await?;
    maybe_tarball(decompressed).await
}

/// 前瞻2字节识别压缩帧并选择解压器；识别不出就透传（包括空流）
async fn decompress_maybe(mut reader: ByteReader) -> Result<ByteReader, FetchError> {
    let head = peek(&mut reader, 2).await.map_err(stream_fetch_error)?;
    let compression = detect_compression(&head);
    let joined = rejoin(head, reader);

    Ok(match compression {
        Compression::Gzip => {
            tracing::debug!("检测到gzip帧，启用流式解压");
            Box::new(TagDecompression(GzipDecoder::new(BufReader::new(joined))))
        }
        Compression::Zlib => {
            tracing::debug!("检测到zlib/deflate帧，启用流式解压");
            Box::new(TagDecompression(ZlibDecoder::new(BufReader::new(joined))))
        }
        Compression::None => joined,
    })
}

/// 前瞻264字节嗅探tar魔数；命中换首记录提取器，未命中透传
async fn maybe_tarball(mut reader: ByteReader) -> Result<ByteReader, FetchError> {
    let head = peek(&mut reader, TAR_SNIFF_LEN)
        .await
        .map_err(stream_fetch_error)?;
    let tarball = is_tarball(&head);
    let joined = rejoin(head, reader);

    Ok(if tarball {
        tracing::debug!("检测到tar魔数，只提取第一条记录");
        tar::extract_first_record(joined)
    } else {
        joined
    })
}

/// 嗅探阶段读流出错时还原错误分类：
/// 已打标签的取回原分类，没有标签的算传输错误
fn stream_fetch_error(err: std::io::Error) -> FetchError {
    let kind = err.kind();
    match err.into_inner() {
        Some(inner) => match inner.downcast::<FetchError>() {
            Ok(tagged) => *tagged,
            Err(other) => FetchError::Transport(anyhow::anyhow!("读取对象流失败: {}", other)),
        },
        None => FetchError::Transport(anyhow::anyhow!("读取对象流失败: {:?}", kind)),
    }
}

/// 给解压器冒出的io错误打Decompression标签
struct TagDecompression<R>(R);

impl<R: AsyncRead + Unpin> AsyncRead for TagDecompression<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match Pin::new(&mut self.0).poll_read(cx, buf) {
            Poll::Ready(Err(e)) => Poll::Ready(Err(FetchError::tag_decompression(e))),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use flate2::Compression as Flate2Level;
    use std::collections::HashMap;
    use std::io::Write;
    use tokio::io::AsyncReadExt;

    /// 内存对象仓库 / in-memory object store
    #[derive(Default)]
    struct MemStore {
        objects: HashMap<(String, String), Vec<u8>>,
    }

    impl MemStore {
        fn with(bucket: &str, key: &str, data: Vec<u8>) -> Self {
            let mut store = Self::default();
            store
                .objects
                .insert((bucket.to_string(), key.to_string()), data);
            store
        }
    }

    #[async_trait]
    impl ObjectStore for MemStore {
        async fn get_object(&self, bucket: &str, key: &str) -> Result<ByteReader, FetchError> {
            match self.objects.get(&(bucket.to_string(), key.to_string())) {
                Some(data) => Ok(Box::new(std::io::Cursor::new(data.clone()))),
                None => Err(FetchError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }),
            }
        }
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Flate2Level::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Flate2Level::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn build_tar(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = ::tar::Builder::new(Vec::new());
        for (name, data) in entries {
            let mut header = ::tar::Header::new_ustar();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    /// 走完整流水线并读空输出；构造期与流中的错误统一还原成FetchError
    async fn run_pipeline(data: Vec<u8>, try_extract: bool) -> Result<Vec<u8>, FetchError> {
        let store = MemStore::with("mlpipeline", "artifact", data);
        let mut stream = get_object_stream(&store, "mlpipeline", "artifact", try_extract).await?;
        let mut out = Vec::new();
        stream
            .read_to_end(&mut out)
            .await
            .map_err(stream_fetch_error)?;
        Ok(out)
    }

    #[tokio::test]
    async fn test_try_extract_false_is_identity() {
        // 即使内容是gzip，也必须逐字节原样返回
        let data = gzip(b"do not touch me");
        let out = run_pipeline(data.clone(), false).await.unwrap();
        assert_eq!(out, data);
    }

    #[tokio::test]
    async fn test_plain_content_passes_through() {
        let data = b"just a plain text artifact".to_vec();
        let out = run_pipeline(data.clone(), true).await.unwrap();
        assert_eq!(out, data);
    }

    #[tokio::test]
    async fn test_empty_object_yields_empty_stream() {
        let out = run_pipeline(Vec::new(), true).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_long_plain_content_passes_through() {
        // 超过264字节的非tar内容，嗅探前缀必须原样接回
        let mut data: Vec<u8> = (0..4096).map(|i| (i % 256) as u8).collect();
        // 避免前两个字节撞上压缩魔数
        data[0] = b'A';
        data[1] = b'B';
        let out = run_pipeline(data.clone(), true).await.unwrap();
        assert_eq!(out, data);
    }

    #[tokio::test]
    async fn test_short_content_under_sniff_window() {
        let data = b"tiny".to_vec();
        let out = run_pipeline(data.clone(), true).await.unwrap();
        assert_eq!(out, data);
    }

    #[tokio::test]
    async fn test_gzip_roundtrip() {
        let original: Vec<u8> = (0..8192).map(|i| (i * 31 % 256) as u8).collect();
        let out = run_pipeline(gzip(&original), true).await.unwrap();
        assert_eq!(out, original);
    }

    #[tokio::test]
    async fn test_zlib_roundtrip() {
        let original = b"deflate framed artifact content".repeat(64);
        let out = run_pipeline(zlib(&original), true).await.unwrap();
        assert_eq!(out, original);
    }

    #[tokio::test]
    async fn test_corrupt_gzip_surfaces_decompression_error() {
        // gzip魔数之后全是垃圾
        let mut data = vec![0x1f, 0x8b];
        data.extend_from_slice(&[0xff; 128]);
        let err = run_pipeline(data, true).await.unwrap_err();
        assert!(matches!(err, FetchError::Decompression(_)), "got {}", err);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_tarball_yields_first_record_only() {
        let archive = build_tar(&[
            ("model.txt", b"record one body"),
            ("metadata.json", b"{\"dropped\": true}"),
            ("extra.bin", b"dropped as well"),
        ]);
        let out = run_pipeline(archive, true).await.unwrap();
        assert_eq!(out, b"record one body");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_targz_yields_first_record_only() {
        let archive = build_tar(&[
            ("first.log", b"compressed tar first record"),
            ("second.log", b"nope"),
        ]);
        let out = run_pipeline(gzip(&archive), true).await.unwrap();
        assert_eq!(out, b"compressed tar first record");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_magic_without_valid_structure_is_extraction_error() {
        let mut bogus = vec![b'A'; 1024];
        bogus[257..265].copy_from_slice(&[0x75, 0x73, 0x74, 0x61, 0x72, 0x00, 0x30, 0x30]);
        let err = run_pipeline(bogus, true).await.unwrap_err();
        assert!(matches!(err, FetchError::Extraction(_)), "got {}", err);
    }

    #[tokio::test]
    async fn test_missing_object_propagates_not_found() {
        let store = MemStore::default();
        let err = get_object_stream(&store, "mlpipeline", "nope", true)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, FetchError::ObjectNotFound { .. }));
    }
}
