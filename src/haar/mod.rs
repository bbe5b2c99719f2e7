//! Haar 小波签名的计算
//!
//! 图片先被缩放到 128x128 并转换到 YIQ 色彩空间，然后对每个通道做二维 Haar 小波分解，
//! 记录每个通道的平均值以及绝对值最大的 [`NUM_COEFS`] 个系数的位置。

mod signature_map;
mod weights;

use image::DynamicImage;

pub use self::signature_map::*;
pub use self::weights::*;
use crate::decode;
use crate::error::{Error, Result};

/// 参与计算的图片边长
pub const NUM_PIXELS: usize = 128;
/// 参与计算的像素总数
pub const NUM_PIXELS_SQUARED: usize = NUM_PIXELS * NUM_PIXELS;
/// 每个通道保留的系数数量
pub const NUM_COEFS: usize = 40;

/// 系数位置，符号表示系数的正负，绝对值为展平后的下标
///
/// 0 是哨兵值，表示“没有更多显著系数”
pub type Idx = i32;

/// 一张图片的签名
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureData {
    /// Y、I、Q 三个通道的平均值
    pub avg: [f64; 3],
    /// 每个通道中最显著的系数位置，按系数绝对值从大到小排列
    pub sig: [[Idx; NUM_COEFS]; 3],
}

impl SignatureData {
    /// 指定通道中有效（非哨兵）的系数位置
    pub fn coefficients(&self, channel: usize) -> impl Iterator<Item = Idx> + '_ {
        self.sig[channel].iter().copied().filter(|&x| x != 0)
    }

    /// 检查所有系数位置都在 `-16383..=16383` 范围内
    pub fn check(&self) -> Result<()> {
        match self.sig.iter().flatten().find(|x| x.unsigned_abs() as usize >= NUM_PIXELS_SQUARED) {
            Some(x) => Err(Error::CorruptSignature(format!("系数位置越界: {}", x))),
            None => Ok(()),
        }
    }
}

/// 像素缓冲区，三个通道各 128x128 个值
///
/// 填充时为 RGB，经过 [`transform`] 后原地变为 YIQ 的小波系数
pub struct ImageData {
    pub data: [Vec<f64>; 3],
}

impl Default for ImageData {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageData {
    pub fn new() -> Self {
        Self { data: std::array::from_fn(|_| vec![0.0; NUM_PIXELS_SQUARED]) }
    }

    /// 用图片填充缓冲区，尺寸不符时会先拉伸到 128x128
    pub fn fill_pixel_data(&mut self, image: &DynamicImage) -> Result<()> {
        let rgb = decode::scaled_rgb(image)?;
        let [r, g, b] = &mut self.data;
        for (i, pixel) in rgb.pixels().enumerate() {
            r[i] = pixel[0] as f64;
            g[i] = pixel[1] as f64;
            b[i] = pixel[2] as f64;
        }
        Ok(())
    }
}

/// 将缓冲区从 RGB 转为 YIQ，并对每个通道做二维 Haar 分解
pub fn transform(data: &mut ImageData) {
    let [a, b, c] = &mut data.data;

    for i in 0..NUM_PIXELS_SQUARED {
        let (r, g, bl) = (a[i], b[i], c[i]);
        a[i] = 0.299 * r + 0.587 * g + 0.114 * bl;
        b[i] = 0.596 * r - 0.275 * g - 0.321 * bl;
        c[i] = 0.212 * r - 0.523 * g + 0.311 * bl;
    }

    for channel in &mut data.data {
        haar_2d(channel);
        // 补回分解中省略的缩放系数
        channel[0] /= 256.0 * 128.0;
    }
}

/// 原地二维 Haar 分解：先逐行，再逐列
#[allow(clippy::approx_constant)]
fn haar_2d(a: &mut [f64]) {
    let mut t = [0.0; NUM_PIXELS >> 1];

    for row in (0..NUM_PIXELS_SQUARED).step_by(NUM_PIXELS) {
        let mut c = 1.0;
        let mut h = NUM_PIXELS;
        while h > 1 {
            let h1 = h >> 1;
            c *= 0.7071;
            for k in 0..h1 {
                let j2 = row + 2 * k;
                t[k] = (a[j2] - a[j2 + 1]) * c;
                a[row + k] = a[j2] + a[j2 + 1];
            }
            a[row + h1..row + h].copy_from_slice(&t[..h1]);
            h = h1;
        }
        // 此时 c = 1/sqrt(NUM_PIXELS)
        a[row] *= c;
    }

    for col in 0..NUM_PIXELS {
        let mut c = 1.0;
        let mut h = NUM_PIXELS;
        while h > 1 {
            let h1 = h >> 1;
            c *= 0.7071;
            for k in 0..h1 {
                let j2 = col + 2 * k * NUM_PIXELS;
                let j21 = j2 + NUM_PIXELS;
                t[k] = (a[j2] - a[j21]) * c;
                a[col + k * NUM_PIXELS] = a[j2] + a[j21];
            }
            for k in 0..h1 {
                a[col + (h1 + k) * NUM_PIXELS] = t[k];
            }
            h = h1;
        }
        a[col] *= c;
    }
}

/// 从已经分解过的缓冲区中提取签名
pub fn calc_haar(data: &ImageData) -> SignatureData {
    SignatureData {
        avg: std::array::from_fn(|channel| data.data[channel][0]),
        sig: std::array::from_fn(|channel| largest_coefficients(&data.data[channel])),
    }
}

/// 计算签名，会覆盖缓冲区的内容
pub fn compute_signature(data: &mut ImageData) -> SignatureData {
    transform(data);
    calc_haar(data)
}

/// 找出绝对值最大的 NUM_COEFS 个系数，下标 0 是平均值，不参与
///
/// 绝对值相同时下标较小者优先；值为 0 的系数不具有区分度，记为哨兵 0
fn largest_coefficients(cdata: &[f64]) -> [Idx; NUM_COEFS] {
    let cmp = |a: &usize, b: &usize| cdata[*b].abs().total_cmp(&cdata[*a].abs()).then(a.cmp(b));

    let mut order = (1..NUM_PIXELS_SQUARED).collect::<Vec<_>>();
    order.select_nth_unstable_by(NUM_COEFS - 1, cmp);
    order.truncate(NUM_COEFS);
    order.sort_unstable_by(cmp);

    let mut sig = [0; NUM_COEFS];
    for (slot, &i) in sig.iter_mut().zip(&order) {
        let value = cdata[i];
        *slot = if value > 0.0 {
            i as Idx
        } else if value < 0.0 {
            -(i as Idx)
        } else {
            0
        };
    }
    sig
}
