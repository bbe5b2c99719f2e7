use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use image::DynamicImage;
use log::{debug, warn};

use crate::error::{Error, Result};
use crate::haar::{self, ImageData, SignatureData, SignatureMap, SketchType, WeightBin, Weights};
use crate::ranking::{self, Match};
use crate::store::{IdentifierResolver, SignatureReader, SignatureStore};
use crate::{ImageId, blob, decode, metrics};

/// 一次全库扫描的打分结果，分数越低越相似
#[derive(Debug, Default)]
pub struct ScoreMap {
    pub scores: BTreeMap<ImageId, f64>,
    /// 因为损坏或版本不符而跳过的记录数量
    pub skipped: usize,
}

/// 取消标记，在扫描每条记录之前检查
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Haar 签名的索引与检索接口
///
/// 每个实例持有自己的像素缓冲区和分档表，第一次使用时才创建。
/// 实例不能在多个线程间共享，需要并发时请为每个线程创建独立的实例
pub struct HaarIface<S> {
    store: S,
    data: Option<Box<ImageData>>,
    bin: OnceCell<WeightBin>,
}

impl<S: SignatureStore> HaarIface<S> {
    pub fn new(store: S) -> Self {
        Self { store, data: None, bin: OnceCell::new() }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn weight_bin(&self) -> &WeightBin {
        self.bin.get_or_init(WeightBin::new)
    }

    /// 计算一张图片的签名
    pub fn compute_signature(&mut self, image: &DynamicImage) -> Result<SignatureData> {
        let data = self.data.get_or_insert_with(|| Box::new(ImageData::new()));
        data.fill_pixel_data(image)?;
        Ok(haar::compute_signature(data))
    }

    /// 计算签名并写入存储，已有的签名会被替换
    pub fn index_image(&mut self, id: ImageId, image: &DynamicImage) -> Result<()> {
        let sig = self.compute_signature(image)?;
        self.store.put(id, &blob::encode(&sig))
    }

    /// 返回图片签名的 base64 文本，可以在进程间传递
    pub fn signature_as_text(&mut self, image: &DynamicImage) -> Result<String> {
        let sig = self.compute_signature(image)?;
        Ok(blob::to_base64(&sig))
    }

    /// 从存储中读取已索引图片的签名
    pub fn retrieve_signature(&self, id: ImageId) -> Result<SignatureData> {
        let reader = self.store.reader()?;
        let bytes = reader.get(id)?.ok_or(Error::SignatureNotFound(id))?;
        blob::decode(&bytes)
    }

    pub fn best_matches_for_image(
        &mut self,
        image: &DynamicImage,
        count: usize,
        sketch: SketchType,
    ) -> Result<Vec<Match>> {
        let sig = self.compute_signature(image)?;
        self.best_matches(&sig, count, sketch)
    }

    pub fn best_matches_for_image_with_threshold(
        &mut self,
        image: &DynamicImage,
        fraction: f64,
        sketch: SketchType,
    ) -> Result<Vec<Match>> {
        let sig = self.compute_signature(image)?;
        self.best_matches_with_threshold(&sig, fraction, sketch)
    }

    pub fn best_matches_for_image_id(
        &self,
        id: ImageId,
        count: usize,
        sketch: SketchType,
    ) -> Result<Vec<Match>> {
        let sig = self.retrieve_signature(id)?;
        self.best_matches(&sig, count, sketch)
    }

    pub fn best_matches_for_image_id_with_threshold(
        &self,
        id: ImageId,
        fraction: f64,
        sketch: SketchType,
    ) -> Result<Vec<Match>> {
        let sig = self.retrieve_signature(id)?;
        self.best_matches_with_threshold(&sig, fraction, sketch)
    }

    /// 使用 [`HaarIface::signature_as_text`] 导出的文本进行搜索
    pub fn best_matches_for_signature(
        &self,
        text: &str,
        count: usize,
        sketch: SketchType,
    ) -> Result<Vec<Match>> {
        let sig = blob::from_base64(text)?;
        self.best_matches(&sig, count, sketch)
    }

    pub fn best_matches_for_signature_with_threshold(
        &self,
        text: &str,
        fraction: f64,
        sketch: SketchType,
    ) -> Result<Vec<Match>> {
        let sig = blob::from_base64(text)?;
        self.best_matches_with_threshold(&sig, fraction, sketch)
    }

    /// 返回分数最低的 `count` 个结果
    pub fn best_matches(
        &self,
        sig: &SignatureData,
        count: usize,
        sketch: SketchType,
    ) -> Result<Vec<Match>> {
        if count == 0 {
            return Ok(vec![]);
        }
        let scores = self.search_database(sig, sketch)?;
        Ok(ranking::best_k(scores.scores, count))
    }

    /// 返回相似度不低于 `fraction` 的所有结果，结果中的分数为 0 到 1 之间的相似度
    pub fn best_matches_with_threshold(
        &self,
        sig: &SignatureData,
        fraction: f64,
        sketch: SketchType,
    ) -> Result<Vec<Match>> {
        let scores = self.search_database(sig, sketch)?;
        let (best, worst) = self.best_and_worst_possible_score(sig, sketch);
        let matches = ranking::above_threshold(scores.scores, best, worst, fraction);
        if matches.len() > 1 {
            debug!("相似度不低于 {:.0}% 的图片:", fraction * 100.0);
            for m in &matches {
                debug!("{}\t{:.2}%", m.id, m.score * 100.0);
            }
        }
        Ok(matches)
    }

    /// 对存储中的每张图片打分
    pub fn search_database(&self, sig: &SignatureData, sketch: SketchType) -> Result<ScoreMap> {
        self.search_database_with_cancel(sig, sketch, &CancelToken::new())
    }

    /// 对存储中的每张图片打分，每条记录之前都会检查是否已被取消
    ///
    /// 查询签名中有越界的系数位置时返回 [`Error::CorruptSignature`]；
    /// 单条记录损坏时跳过并计数；存储本身出错时整个查询失败
    pub fn search_database_with_cancel(
        &self,
        sig: &SignatureData,
        sketch: SketchType,
        cancel: &CancelToken,
    ) -> Result<ScoreMap> {
        sig.check()?;
        let start = Instant::now();
        let weights = Weights::new(sketch);
        let bin = self.weight_bin();
        let query_maps: [SignatureMap; 3] = std::array::from_fn(|c| SignatureMap::from_sig(&sig.sig[c]));

        let mut result = ScoreMap::default();
        let reader = self.store.reader()?;

        for item in reader.iter()? {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let (id, bytes) = item?;
            let target = match blob::decode(&bytes) {
                Ok(target) => target,
                Err(e) => {
                    warn!("跳过图片 {} 的签名: {}", id, e);
                    result.skipped += 1;
                    continue;
                }
            };

            // 平均值的差异越大，分数越高
            let mut score = 0.0;
            for channel in 0..3 {
                score += weights.weight_for_average(channel) * (sig.avg[channel] - target.avg[channel]).abs();
            }

            // 查询与目标共有的显著系数会降低分数
            for (channel, query_map) in query_maps.iter().enumerate() {
                for &x in &target.sig[channel] {
                    if query_map.contains(x) {
                        score -= weights.weight(bin.bin_abs(x), channel);
                    }
                }
            }

            result.scores.insert(id, score);
        }

        let elapsed = start.elapsed().as_secs_f64();
        debug!(
            "扫描 {} 条签名，跳过 {} 条，耗时 {:.2}ms",
            result.scores.len(),
            result.skipped,
            elapsed * 1000.0
        );
        metrics::observe_search(sketch, elapsed, result.skipped);

        Ok(result)
    }

    /// 计算查询签名理论上的最好与最差分数，返回 `(best, worst)`
    ///
    /// 最好的情况是签名完全相同：平均值一项为 0，所有系数都能命中；
    /// 最差的情况按目标平均值为 0 且没有任何系数命中估算
    pub fn best_and_worst_possible_score(&self, sig: &SignatureData, sketch: SketchType) -> (f64, f64) {
        let weights = Weights::new(sketch);
        let bin = self.weight_bin();

        let mut worst = 0.0;
        for channel in 0..3 {
            worst += weights.weight_for_average(channel) * sig.avg[channel].abs();
        }

        let mut best = 0.0;
        for channel in 0..3 {
            for x in sig.coefficients(channel) {
                best -= weights.weight(bin.bin_abs(x), channel);
            }
        }

        (best, worst)
    }
}

/// 基于图片路径的便捷接口，需要存储同时提供路径到 ID 的映射
impl<S: SignatureStore + IdentifierResolver> HaarIface<S> {
    /// 路径对应的图片是否已经以相同内容建立过索引
    pub fn is_indexed(&self, path: &str, hash: &[u8]) -> Result<bool> {
        let Some(id) = self.store.resolve(path)? else {
            return Ok(false);
        };
        let same_hash = self.store.record(id)?.is_some_and(|record| record.hash == hash);
        Ok(same_hash && self.store.reader()?.get(id)?.is_some())
    }

    /// 登记图片并保存已经计算好的签名
    pub fn insert_signature(&self, path: &str, hash: &[u8], sig: &SignatureData) -> Result<ImageId> {
        sig.check()?;
        let id = self.store.register(path, hash)?;
        self.store.put(id, &blob::encode(sig))?;
        Ok(id)
    }

    /// 读取图片文件、计算签名并保存，返回图片 ID
    pub fn index_image_file(&mut self, path: impl AsRef<Path>) -> Result<ImageId> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let hash = blake3::hash(&bytes);
        let image = decode::decode_bytes(&bytes)?;
        let sig = self.compute_signature(&image)?;
        self.insert_signature(&path.to_string_lossy(), hash.as_bytes(), &sig)
    }

    /// 查找路径对应的图片 ID
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<ImageId> {
        let path = path.as_ref();
        self.store
            .resolve(&path.to_string_lossy())?
            .ok_or_else(|| Error::ImageNotFound(path.to_path_buf()))
    }

    pub fn best_matches_for_file(
        &mut self,
        path: impl AsRef<Path>,
        count: usize,
        sketch: SketchType,
    ) -> Result<Vec<Match>> {
        let image = decode::load_file(path)?;
        self.best_matches_for_image(&image, count, sketch)
    }

    pub fn best_matches_for_file_with_threshold(
        &mut self,
        path: impl AsRef<Path>,
        fraction: f64,
        sketch: SketchType,
    ) -> Result<Vec<Match>> {
        let image = decode::load_file(path)?;
        self.best_matches_for_image_with_threshold(&image, fraction, sketch)
    }
}
