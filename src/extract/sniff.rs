//! 格式嗅探 / Format sniffing
//!
//! 有限前瞻：解压识别看前2字节，tar识别看前264字节。
//! 读出的前缀用 rejoin 接回剩余流，下游看到的字节序列不变。

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::storage::ByteReader;

/// tar魔数在文件中的偏移
pub const TAR_MAGIC_OFFSET: usize = 257;
/// tar识别需要的最小前瞻长度
pub const TAR_SNIFF_LEN: usize = 264;

/// POSIX ustar魔数: "ustar\0" + 版本"00"
const MAGIC_USTAR: [u8; 8] = [0x75, 0x73, 0x74, 0x61, 0x72, 0x00, 0x30, 0x30];
/// 旧GNU tar魔数: "ustar  \0"
const MAGIC_GNU: [u8; 8] = [0x75, 0x73, 0x74, 0x61, 0x72, 0x20, 0x20, 0x00];

/// 判断缓冲区是否是未压缩tar包；不足264字节一律不是
pub fn is_tarball(buf: &[u8]) -> bool {
    if buf.len() < TAR_SNIFF_LEN {
        return false;
    }
    let magic = &buf[TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + 8];
    magic == MAGIC_USTAR || magic == MAGIC_GNU
}

/// 压缩帧格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Compression {
    Gzip,
    Zlib,
    None,
}

/// 从前两个字节判断压缩帧格式
pub(crate) fn detect_compression(head: &[u8]) -> Compression {
    if head.len() < 2 {
        return Compression::None;
    }
    if head[0] == 0x1f && head[1] == 0x8b {
        return Compression::Gzip;
    }
    // zlib帧: CM==8 且 CMF/FLG 按大端拼成的16位数能被31整除
    let check = (u16::from(head[0]) << 8) | u16::from(head[1]);
    if head[0] & 0x0f == 0x08 && check % 31 == 0 {
        return Compression::Zlib;
    }
    Compression::None
}

/// 从流里读出最多n字节；不足n说明流提前结束，等待由底层read完成
pub(crate) async fn peek<R: AsyncRead + Unpin>(reader: &mut R, n: usize) -> std::io::Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    let mut filled = 0;
    while filled < n {
        let read = reader.read(&mut buf[filled..]).await?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    buf.truncate(filled);
    Ok(buf)
}

/// 把已读出的前缀接回剩余流
pub(crate) fn rejoin(head: Vec<u8>, rest: impl AsyncRead + Send + Unpin + 'static) -> ByteReader {
    Box::new(std::io::Cursor::new(head).chain(rest))
}
