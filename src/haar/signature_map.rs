use super::{Idx, NUM_COEFS, NUM_PIXELS_SQUARED};

/// 查询签名的快速查找表
///
/// 对 `-16384..=16384` 范围内的每个带符号位置记录一个布尔值，
/// 扫描目标签名时可以 O(1) 判断某个系数是否也出现在查询签名中
pub struct SignatureMap {
    indexes: Box<[bool]>,
}

impl Default for SignatureMap {
    fn default() -> Self {
        Self::new()
    }
}

impl SignatureMap {
    pub fn new() -> Self {
        Self { indexes: vec![false; 2 * NUM_PIXELS_SQUARED + 1].into_boxed_slice() }
    }

    /// 根据签名的一个通道构建查找表，哨兵 0 和越界的位置会被忽略
    pub fn fill(&mut self, sig: &[Idx; NUM_COEFS]) {
        self.indexes.fill(false);
        for &x in sig {
            if x == 0 {
                continue;
            }
            if let Some(slot) = self.indexes.get_mut(Self::offset(x)) {
                *slot = true;
            }
        }
    }

    pub fn from_sig(sig: &[Idx; NUM_COEFS]) -> Self {
        let mut map = Self::new();
        map.fill(sig);
        map
    }

    #[inline]
    pub fn contains(&self, x: Idx) -> bool {
        x != 0 && self.indexes.get(Self::offset(x)).copied().unwrap_or(false)
    }

    /// 越界时返回 `usize::MAX`
    #[inline]
    fn offset(x: Idx) -> usize {
        usize::try_from(x as isize + NUM_PIXELS_SQUARED as isize).unwrap_or(usize::MAX)
    }
}
