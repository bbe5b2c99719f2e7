use std::path::PathBuf;

use thiserror::Error;

use crate::ImageId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// 检索引擎的错误类型
///
/// 各个变体可以区分开，调用方据此决定是重新索引、重试还是放弃
#[derive(Debug, Error)]
pub enum Error {
    /// 图片无法解码或缩放，换一个输入才可能成功
    #[error("图片解码失败: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 签名格式版本不受支持，需要重新索引
    #[error("不支持的签名版本: {0}")]
    UnsupportedSignatureVersion(i32),

    #[error("签名数据损坏: {0}")]
    CorruptSignature(String),

    /// 该图片还没有被索引
    #[error("未找到图片 {0} 的签名")]
    SignatureNotFound(ImageId),

    #[error("数据库中不存在图片: {}", .0.display())]
    ImageNotFound(PathBuf),

    #[error("数据库错误: {0}")]
    Store(#[from] heed::Error),

    #[error("数据库不可用: {0}")]
    StoreUnavailable(String),

    #[error("搜索已取消")]
    Cancelled,
}

impl Error {
    /// 该错误是否意味着需要重新索引对应的图片
    pub fn needs_reindex(&self) -> bool {
        matches!(self, Self::UnsupportedSignatureVersion(_) | Self::CorruptSignature(_))
    }
}
