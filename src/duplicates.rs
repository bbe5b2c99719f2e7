use std::collections::{HashMap, HashSet};

use log::{debug, warn};

use crate::ImageId;
use crate::error::{Error, Result};
use crate::haar::SketchType;
use crate::iface::HaarIface;
use crate::store::SignatureStore;

/// 判定为重复图片的默认相似度
pub const DUPLICATE_THRESHOLD: f64 = 0.9;

#[derive(Debug, Clone, Copy)]
pub struct DuplicateOptions {
    /// 最低相似度，范围 0 到 1
    pub threshold: f64,
    /// 查找重复时使用的权重
    pub sketch: SketchType,
}

impl Default for DuplicateOptions {
    fn default() -> Self {
        Self { threshold: DUPLICATE_THRESHOLD, sketch: SketchType::Scanned }
    }
}

/// 重复图片分组：代表图片 => 相似图片列表（包含代表图片本身）
pub type DuplicateGroups = HashMap<ImageId, Vec<ImageId>>;

impl<S: SignatureStore> HaarIface<S> {
    /// 在给定的图片中查找重复图片
    pub fn find_duplicates(&self, images: &[ImageId]) -> Result<DuplicateGroups> {
        self.find_duplicates_with(images, DuplicateOptions::default(), |_| ())
    }

    /// 在给定的图片中查找重复图片，每处理完一张图片调用一次 `progress`
    ///
    /// 先出现的图片成为代表；某张图片的匹配结果中只要有一张已经归入某个分组，
    /// 就不再为它新建分组，保证分组之间没有重叠
    pub fn find_duplicates_with(
        &self,
        images: &[ImageId],
        options: DuplicateOptions,
        mut progress: impl FnMut(ImageId),
    ) -> Result<DuplicateGroups> {
        let mut groups = DuplicateGroups::new();
        let mut grouped = HashSet::new();

        for &id in images {
            let matches = match self.best_matches_for_image_id_with_threshold(
                id,
                options.threshold,
                options.sketch,
            ) {
                Ok(matches) => matches,
                Err(e @ Error::SignatureNotFound(_)) => {
                    warn!("跳过图片 {}: {}", id, e);
                    progress(id);
                    continue;
                }
                Err(e) if e.needs_reindex() => {
                    warn!("跳过图片 {}，需要重新索引: {}", id, e);
                    progress(id);
                    continue;
                }
                Err(e) => return Err(e),
            };
            progress(id);

            // 通常只会找到图片自己
            if matches.is_empty() || (matches.len() == 1 && matches[0].id == id) {
                continue;
            }

            let list = matches.iter().map(|m| m.id).collect::<Vec<_>>();
            if list.iter().any(|x| grouped.contains(x)) {
                continue;
            }

            debug!("图片 {} 找到 {} 张相似图片", id, list.len());
            grouped.extend(list.iter().copied());
            groups.insert(id, list);
        }

        Ok(groups)
    }
}
