use std::borrow::Cow;
use std::fs;
use std::path::Path;

use byteorder::BigEndian;
use heed::types::{Bytes, I64, SerdeBincode, Str};
use heed::{Database, Env, EnvOpenOptions, RoTxn, WithTls};
use log::{debug, info};

use super::{IdentifierResolver, ImageRecord, SignatureReader, SignatureStore};
use crate::ImageId;
use crate::error::{Error, Result};

// 此处直接分配 64GiB 的地址空间，lmdb 只会按需占用磁盘
const MAP_SIZE: usize = 1 << 36;

type SignatureDb = Database<I64<BigEndian>, Bytes>;

/// 基于 lmdb 的图片数据库
///
/// 三个子数据库：
/// - `signature`: 图片 ID => 签名
/// - `image`: 图片 ID => 图片记录
/// - `path`: 图片路径 => 图片 ID
///
/// 内部只保存句柄，克隆的代价很低，可以在多个线程间共享
#[derive(Clone)]
pub struct ImageDb {
    env: Env<WithTls>,
    db_signature: SignatureDb,
    db_image: Database<I64<BigEndian>, SerdeBincode<ImageRecord>>,
    db_path: Database<Str, I64<BigEndian>>,
}

impl ImageDb {
    /// 打开数据库，不存在时会自动创建
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("打开数据库: {}", path.display());
        fs::create_dir_all(path)?;

        let env = unsafe { EnvOpenOptions::new().map_size(MAP_SIZE).max_dbs(3).open(path)? };
        let mut txn = env.write_txn()?;
        let db_signature = env.create_database(&mut txn, Some("signature"))?;
        let db_image = env.create_database(&mut txn, Some("image"))?;
        let db_path = env.create_database(&mut txn, Some("path"))?;
        txn.commit()?;

        Ok(Self { env, db_signature, db_image, db_path })
    }

    /// 所有已登记图片的 ID
    pub fn image_ids(&self) -> Result<Vec<ImageId>> {
        let txn = self.env.read_txn()?;
        let mut ids = vec![];
        for item in self.db_image.iter(&txn)? {
            let (id, _) = item?;
            ids.push(id);
        }
        Ok(ids)
    }
}

impl SignatureStore for ImageDb {
    type Reader<'a>
        = ImageDbReader<'a>
    where
        Self: 'a;

    fn reader(&self) -> Result<Self::Reader<'_>> {
        let txn = self.env.read_txn()?;
        Ok(ImageDbReader { txn, db_signature: self.db_signature })
    }

    fn put(&self, id: ImageId, blob: &[u8]) -> Result<()> {
        let mut txn = self.env.write_txn()?;
        self.db_signature.put(&mut txn, &id, blob)?;
        txn.commit()?;
        Ok(())
    }
}

pub struct ImageDbReader<'a> {
    txn: RoTxn<'a, WithTls>,
    db_signature: SignatureDb,
}

impl SignatureReader for ImageDbReader<'_> {
    fn get(&self, id: ImageId) -> Result<Option<Cow<'_, [u8]>>> {
        Ok(self.db_signature.get(&self.txn, &id)?.map(Cow::Borrowed))
    }

    fn iter(&self) -> Result<Box<dyn Iterator<Item = Result<(ImageId, Cow<'_, [u8]>)>> + '_>> {
        let iter = self.db_signature.iter(&self.txn)?;
        Ok(Box::new(iter.map(|item| {
            let (id, blob) = item.map_err(Error::from)?;
            Ok((id, Cow::Borrowed(blob)))
        })))
    }

    fn len(&self) -> Result<u64> {
        Ok(self.db_signature.len(&self.txn)?)
    }
}

impl IdentifierResolver for ImageDb {
    fn resolve(&self, path: &str) -> Result<Option<ImageId>> {
        let txn = self.env.read_txn()?;
        Ok(self.db_path.get(&txn, path)?)
    }

    fn register(&self, path: &str, hash: &[u8]) -> Result<ImageId> {
        let mut txn = self.env.write_txn()?;
        let id = match self.db_path.get(&txn, path)? {
            Some(id) => id,
            None => {
                let id = self.db_image.last(&txn)?.map(|(id, _)| id + 1).unwrap_or(1);
                self.db_path.put(&mut txn, path, &id)?;
                debug!("登记图片 {}: {}", id, path);
                id
            }
        };
        let record = ImageRecord { path: path.to_owned(), hash: hash.to_vec() };
        self.db_image.put(&mut txn, &id, &record)?;
        txn.commit()?;
        Ok(id)
    }

    fn record(&self, id: ImageId) -> Result<Option<ImageRecord>> {
        let txn = self.env.read_txn()?;
        Ok(self.db_image.get(&txn, &id)?)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn signatures() {
        let dir = TempDir::new().unwrap();
        let db = ImageDb::open(dir.path().join("db")).unwrap();

        assert!(db.reader().unwrap().is_empty().unwrap());

        db.put(2, b"second").unwrap();
        db.put(1, b"first").unwrap();
        db.put(2, b"replaced").unwrap();

        let reader = db.reader().unwrap();
        assert_eq!(reader.len().unwrap(), 2);
        assert_eq!(reader.get(2).unwrap().as_deref(), Some(&b"replaced"[..]));
        assert_eq!(reader.get(3).unwrap(), None);

        let all = reader.iter().unwrap().collect::<Result<Vec<_>>>().unwrap();
        let ids = all.iter().map(|(id, _)| *id).collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn identifiers() {
        let dir = TempDir::new().unwrap();
        let db = ImageDb::open(dir.path()).unwrap();

        let a = db.register("/tmp/a.png", b"hash-a").unwrap();
        let b = db.register("/tmp/b.png", b"hash-b").unwrap();
        assert_ne!(a, b);
        assert_eq!(db.register("/tmp/a.png", b"hash-a2").unwrap(), a);

        assert_eq!(db.resolve("/tmp/b.png").unwrap(), Some(b));
        assert_eq!(db.resolve("/tmp/c.png").unwrap(), None);
        assert_eq!(db.record(a).unwrap().unwrap().hash, b"hash-a2".to_vec());
        assert_eq!(db.image_ids().unwrap(), vec![a, b]);
    }

    #[test]
    fn reopen() {
        let dir = TempDir::new().unwrap();
        {
            let db = ImageDb::open(dir.path()).unwrap();
            let id = db.register("x.jpg", b"h").unwrap();
            db.put(id, b"blob").unwrap();
        }
        let db = ImageDb::open(dir.path()).unwrap();
        let id = db.resolve("x.jpg").unwrap().unwrap();
        assert_eq!(db.reader().unwrap().get(id).unwrap().as_deref(), Some(&b"blob"[..]));
    }
}
