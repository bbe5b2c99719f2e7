//! 签名的持久化存储
//!
//! 存储只负责按图片 ID 保存签名的二进制数据，不关心其内容

mod lmdb_store;
mod memory_store;

use std::borrow::Cow;

pub use lmdb_store::*;
pub use memory_store::*;
use serde::{Deserialize, Serialize};

use crate::ImageId;
use crate::error::Result;

pub trait SignatureStore {
    type Reader<'a>: SignatureReader
    where
        Self: 'a;

    /// 打开一个只读视图，整个扫描过程中看到的是同一份快照
    fn reader(&self) -> Result<Self::Reader<'_>>;

    /// 写入一条签名，已存在则整体替换
    fn put(&self, id: ImageId, blob: &[u8]) -> Result<()>;
}

pub trait SignatureReader {
    /// 读取指定图片的签名
    fn get(&self, id: ImageId) -> Result<Option<Cow<'_, [u8]>>>;

    /// 按 ID 升序遍历所有签名
    #[allow(clippy::type_complexity)]
    fn iter(&self) -> Result<Box<dyn Iterator<Item = Result<(ImageId, Cow<'_, [u8]>)>> + '_>>;

    /// 已保存的签名数量
    fn len(&self) -> Result<u64>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// 图片记录
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    /// 图片路径，作为图片的唯一标识
    pub path: String,
    /// 建立索引时文件内容的哈希
    pub hash: Vec<u8>,
}

/// 图片路径与图片 ID 之间的映射
pub trait IdentifierResolver {
    /// 查找路径对应的图片 ID
    fn resolve(&self, path: &str) -> Result<Option<ImageId>>;

    /// 登记一张图片，路径已存在时更新哈希并返回原有 ID
    fn register(&self, path: &str, hash: &[u8]) -> Result<ImageId>;

    /// 根据图片 ID 读取图片记录
    fn record(&self, id: ImageId) -> Result<Option<ImageRecord>>;
}
