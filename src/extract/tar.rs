//! tar首记录提取 / First-record extraction
//!
//! tar解析是同步实现，放到blocking线程上跑，异步侧通过
//! SyncIoBridge喂字节、通过有界channel收结果。第一条记录的内容
//! 全部送出后即收尾，归档里后续的记录不再解析，直接丢弃。

use std::io::Read;

use bytes::Bytes;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::{StreamReader, SyncIoBridge};

use crate::error::FetchError;
use crate::storage::ByteReader;

/// 单次读块大小
const CHUNK_SIZE: usize = 32 * 1024;
/// channel容量：下游不消费时，解包侧最多超前两块
const MAX_BUFFERED_CHUNKS: usize = 2;

/// 返回只含第一条tar记录内容的流
///
/// 魔数匹配之后的结构错误以Extraction分类从流中冒出。
/// 下游提前放弃读取时，解包任务在下一次发送时结束并释放底层流。
pub(crate) fn extract_first_record(reader: ByteReader) -> ByteReader {
    let (tx, rx) = tokio::sync::mpsc::channel::<std::io::Result<Bytes>>(MAX_BUFFERED_CHUNKS);

    tokio::task::spawn_blocking(move || {
        let bridge = SyncIoBridge::new(reader);
        let mut archive = tar::Archive::new(bridge);

        if let Err(e) = copy_first_entry(&mut archive, &tx) {
            let _ = tx.blocking_send(Err(FetchError::tag_extraction(e)));
        }
        // archive与底层流在这里一并释放
    });

    Box::new(StreamReader::new(ReceiverStream::new(rx)))
}

/// 把第一条记录的内容逐块送进channel；没有记录则直接结束
fn copy_first_entry<R: Read>(
    archive: &mut tar::Archive<R>,
    tx: &tokio::sync::mpsc::Sender<std::io::Result<Bytes>>,
) -> std::io::Result<()> {
    let mut entries = archive.entries()?;
    let mut entry = match entries.next() {
        Some(entry) => entry?,
        None => return Ok(()),
    };

    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = entry.read(&mut buf)?;
        if n == 0 {
            return Ok(());
        }
        if tx
            .blocking_send(Ok(Bytes::copy_from_slice(&buf[..n])))
            .is_err()
        {
            // 接收端已关闭（调用方取消），停止解包
            return Ok(());
        }
    }
}
