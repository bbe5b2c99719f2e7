//! 签名的二进制格式
//!
//! 所有字段均为大端序，与主机字节序无关：
//!
//! ```text
//! version: i32 | avg: [f64; 3] | sig: [[i32; 40]; 3]
//! ```

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};
use crate::haar::{NUM_COEFS, SignatureData};

/// 当前唯一支持的格式版本
pub const VERSION: i32 = 1;

/// 序列化后的固定长度
pub const BLOB_SIZE: usize = 4 + 3 * 8 + 3 * NUM_COEFS * 4;

pub fn encode(data: &SignatureData) -> Vec<u8> {
    let mut buf = Vec::with_capacity(BLOB_SIZE);
    // 写入 Vec 不会失败
    buf.write_i32::<BigEndian>(VERSION).unwrap();
    for avg in data.avg {
        buf.write_f64::<BigEndian>(avg).unwrap();
    }
    for channel in &data.sig {
        for &x in channel {
            buf.write_i32::<BigEndian>(x).unwrap();
        }
    }
    buf
}

/// 解析签名，版本不符或数据不完整时返回错误，不会返回部分填充的签名
pub fn decode(bytes: &[u8]) -> Result<SignatureData> {
    if bytes.len() < 4 {
        return Err(Error::CorruptSignature(format!("长度过短: {} 字节", bytes.len())));
    }

    let mut cursor = Cursor::new(bytes);
    let version = cursor.read_i32::<BigEndian>()?;
    if version != VERSION {
        return Err(Error::UnsupportedSignatureVersion(version));
    }
    if bytes.len() != BLOB_SIZE {
        return Err(Error::CorruptSignature(format!(
            "长度错误: 期望 {} 字节，实际 {} 字节",
            BLOB_SIZE,
            bytes.len()
        )));
    }

    let mut avg = [0.0; 3];
    for v in &mut avg {
        *v = cursor.read_f64::<BigEndian>()?;
    }

    let mut sig = [[0; NUM_COEFS]; 3];
    for channel in &mut sig {
        for x in channel.iter_mut() {
            *x = cursor.read_i32::<BigEndian>()?;
        }
    }

    let data = SignatureData { avg, sig };
    data.check()?;
    Ok(data)
}

/// 签名的文本形式，即二进制格式的 base64 编码
pub fn to_base64(data: &SignatureData) -> String {
    STANDARD.encode(encode(data))
}

pub fn from_base64(text: &str) -> Result<SignatureData> {
    let bytes = STANDARD
        .decode(text.trim())
        .map_err(|e| Error::CorruptSignature(format!("base64 解码失败: {}", e)))?;
    decode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::haar::Idx;

    fn sample() -> SignatureData {
        let mut sig = [[0; NUM_COEFS]; 3];
        for (c, channel) in sig.iter_mut().enumerate() {
            for (i, x) in channel.iter_mut().enumerate() {
                let v = (i * 97 + c * 13 + 1) as Idx;
                *x = if i % 2 == 0 { v } else { -v };
            }
        }
        sig[2][NUM_COEFS - 1] = 0;
        SignatureData { avg: [0.75, -0.125, 3.5e-3], sig }
    }

    #[test]
    fn round_trip() {
        let data = sample();
        let bytes = encode(&data);
        assert_eq!(bytes.len(), BLOB_SIZE);
        assert_eq!(bytes.len(), 508);
        assert_eq!(decode(&bytes).unwrap(), data);
    }

    #[test]
    fn layout_is_big_endian() {
        let bytes = encode(&sample());
        assert_eq!(&bytes[..4], &[0, 0, 0, 1]);
        assert_eq!(&bytes[4..12], &0.75f64.to_be_bytes());
        assert_eq!(&bytes[28..32], &1i32.to_be_bytes());
    }

    #[test]
    fn unsupported_version() {
        let mut bytes = encode(&sample());
        bytes[..4].copy_from_slice(&99i32.to_be_bytes());
        assert!(matches!(decode(&bytes), Err(Error::UnsupportedSignatureVersion(99))));
    }

    #[test]
    fn truncated() {
        let bytes = encode(&sample());
        assert!(matches!(decode(&bytes[..100]), Err(Error::CorruptSignature(_))));
        assert!(matches!(decode(&bytes[..2]), Err(Error::CorruptSignature(_))));
        assert!(matches!(decode(&[]), Err(Error::CorruptSignature(_))));
    }

    #[test]
    fn trailing_bytes() {
        let mut bytes = encode(&sample());
        bytes.push(0);
        assert!(matches!(decode(&bytes), Err(Error::CorruptSignature(_))));
    }

    #[test]
    fn position_out_of_range() {
        let mut bytes = encode(&sample());
        bytes[28..32].copy_from_slice(&20000i32.to_be_bytes());
        assert!(matches!(decode(&bytes), Err(Error::CorruptSignature(_))));
    }

    #[test]
    fn base64() {
        let data = sample();
        let text = to_base64(&data);
        assert_eq!(from_base64(&text).unwrap(), data);
        assert_eq!(from_base64(&format!("{}\n", text)).unwrap(), data);
        assert!(matches!(from_base64("!!not base64!!"), Err(Error::CorruptSignature(_))));
    }
}
