use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::{Idx, NUM_PIXELS, NUM_PIXELS_SQUARED};

/// 查询图片的类型，决定使用哪一组权重
#[derive(ValueEnum, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SketchType {
    /// 扫描件或照片
    #[default]
    Scanned,
    /// 手绘草图
    HandDrawn,
}

impl SketchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scanned => "scanned",
            Self::HandDrawn => "hand-drawn",
        }
    }
}

/// 权重分档数量
pub const NUM_BINS: usize = 6;

// 每一行对应一个分档，三列分别为 Y、I、Q 通道
// 第 0 档同时作为平均值一项的权重
static WEIGHTS: [[[f64; 3]; NUM_BINS]; 2] = [
    [
        [5.00, 19.21, 34.37],
        [0.83, 1.26, 0.36],
        [1.01, 0.44, 0.45],
        [0.52, 0.53, 0.14],
        [0.47, 0.28, 0.18],
        [0.30, 0.14, 0.27],
    ],
    [
        [4.04, 15.14, 22.62],
        [0.78, 0.92, 0.40],
        [0.46, 0.53, 0.63],
        [0.42, 0.26, 0.25],
        [0.41, 0.14, 0.15],
        [0.32, 0.07, 0.38],
    ],
];

/// 某一种查询类型对应的权重表
#[derive(Debug, Clone, Copy)]
pub struct Weights {
    table: &'static [[f64; 3]; NUM_BINS],
}

impl Weights {
    pub fn new(sketch: SketchType) -> Self {
        let table = match sketch {
            SketchType::Scanned => &WEIGHTS[0],
            SketchType::HandDrawn => &WEIGHTS[1],
        };
        Self { table }
    }

    #[inline]
    pub fn weight(&self, bin: usize, channel: usize) -> f64 {
        self.table[bin][channel]
    }

    #[inline]
    pub fn weight_for_average(&self, channel: usize) -> f64 {
        self.table[0][channel]
    }
}

/// 系数位置到权重分档的映射
///
/// 位置 `row * 128 + col` 落在 `min(max(row, col), 5)` 档，越靠近高频的细节权重越低
pub struct WeightBin {
    bin: Box<[u8; NUM_PIXELS_SQUARED]>,
}

impl Default for WeightBin {
    fn default() -> Self {
        Self::new()
    }
}

impl WeightBin {
    pub fn new() -> Self {
        let mut bin = Box::new([0; NUM_PIXELS_SQUARED]);
        for i in 0..NUM_PIXELS {
            for j in 0..NUM_PIXELS {
                bin[i * NUM_PIXELS + j] = i.max(j).min(NUM_BINS - 1) as u8;
            }
        }
        Self { bin }
    }

    /// 带符号位置对应的分档，越界的位置归入最后一档
    #[inline]
    pub fn bin_abs(&self, idx: Idx) -> usize {
        self.bin.get(idx.unsigned_abs() as usize).map_or(NUM_BINS - 1, |&b| b as usize)
    }
}
