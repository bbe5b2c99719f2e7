use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard};

use super::{IdentifierResolver, ImageRecord, SignatureReader, SignatureStore};
use crate::ImageId;
use crate::error::{Error, Result};

/// 保存在内存中的签名存储，主要用于测试和临时计算
#[derive(Default)]
pub struct MemoryStore {
    signatures: RwLock<BTreeMap<ImageId, Vec<u8>>>,
    images: RwLock<Images>,
}

#[derive(Default)]
struct Images {
    records: BTreeMap<ImageId, ImageRecord>,
    paths: BTreeMap<String, ImageId>,
}

pub struct MemoryStoreReader<'a>(RwLockReadGuard<'a, BTreeMap<ImageId, Vec<u8>>>);

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> Error {
    Error::StoreUnavailable("内存存储的锁已损坏".to_string())
}

impl SignatureStore for MemoryStore {
    type Reader<'a>
        = MemoryStoreReader<'a>
    where
        Self: 'a;

    fn reader(&self) -> Result<Self::Reader<'_>> {
        Ok(MemoryStoreReader(self.signatures.read().map_err(poisoned)?))
    }

    fn put(&self, id: ImageId, blob: &[u8]) -> Result<()> {
        self.signatures.write().map_err(poisoned)?.insert(id, blob.to_vec());
        Ok(())
    }
}

impl SignatureReader for MemoryStoreReader<'_> {
    fn get(&self, id: ImageId) -> Result<Option<Cow<'_, [u8]>>> {
        Ok(self.0.get(&id).map(|blob| Cow::Borrowed(blob.as_slice())))
    }

    fn iter(&self) -> Result<Box<dyn Iterator<Item = Result<(ImageId, Cow<'_, [u8]>)>> + '_>> {
        Ok(Box::new(self.0.iter().map(|(&id, blob)| Ok((id, Cow::Borrowed(blob.as_slice()))))))
    }

    fn len(&self) -> Result<u64> {
        Ok(self.0.len() as u64)
    }
}

impl IdentifierResolver for MemoryStore {
    fn resolve(&self, path: &str) -> Result<Option<ImageId>> {
        Ok(self.images.read().map_err(poisoned)?.paths.get(path).copied())
    }

    fn register(&self, path: &str, hash: &[u8]) -> Result<ImageId> {
        let mut images = self.images.write().map_err(poisoned)?;
        let next = images.records.keys().next_back().map_or(1, |id| id + 1);
        let id = *images.paths.entry(path.to_owned()).or_insert(next);
        images.records.insert(id, ImageRecord { path: path.to_owned(), hash: hash.to_vec() });
        Ok(id)
    }

    fn record(&self, id: ImageId) -> Result<Option<ImageRecord>> {
        Ok(self.images.read().map_err(poisoned)?.records.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_and_iter() {
        let store = MemoryStore::new();
        store.put(3, &[3]).unwrap();
        store.put(1, &[1]).unwrap();
        store.put(3, &[4]).unwrap();

        let reader = store.reader().unwrap();
        assert_eq!(reader.len().unwrap(), 2);
        let all = reader
            .iter()
            .unwrap()
            .map(|item| item.map(|(id, blob)| (id, blob.into_owned())))
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(all, vec![(1, vec![1]), (3, vec![4])]);
    }

    #[test]
    fn register() {
        let store = MemoryStore::new();
        let a = store.register("a", b"1").unwrap();
        let b = store.register("b", b"2").unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(store.register("a", b"3").unwrap(), 1);
        assert_eq!(store.record(1).unwrap().unwrap().hash, b"3".to_vec());
        assert_eq!(store.resolve("b").unwrap(), Some(2));
    }
}
