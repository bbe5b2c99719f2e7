//! 从打分结果中选出最终的匹配列表

use serde::Serialize;

use crate::ImageId;

/// 一条匹配结果
///
/// 对于 top-K 搜索，`score` 为原始分数（越低越相似）；
/// 对于阈值搜索，`score` 为 0 到 1 之间的相似度（越高越相似）
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub id: ImageId,
    pub score: f64,
}

/// 选出分数最低的 k 个结果，按分数升序排列
///
/// 分数与当前最差结果相同的候选，只有当它同时等于最好结果（即所有结果分数相同）时
/// 才会追加进来，此时结果数量可以超过 k
pub fn best_k(scores: impl IntoIterator<Item = (ImageId, f64)>, k: usize) -> Vec<Match> {
    if k == 0 {
        return vec![];
    }

    // 按分数升序的有序数组，分数相同的按访问顺序排列
    let mut best: Vec<Match> = Vec::with_capacity(k + 1);
    let insert = |best: &mut Vec<Match>, m: Match| {
        let pos = best.partition_point(|x| x.score <= m.score);
        best.insert(pos, m);
    };

    for (id, score) in scores {
        let m = Match { id, score };
        let Some(worst) = best.last().map(|x| x.score) else {
            best.push(m);
            continue;
        };
        if best.len() < k {
            insert(&mut best, m);
        } else if score < worst {
            best.pop();
            insert(&mut best, m);
        } else if score == worst && score == best[0].score {
            best.push(m);
        }
    }

    best
}

/// 保留相似度不低于 `fraction` 的结果，按相似度降序排列
///
/// `best` 和 `worst` 为该查询理论上的最好与最差分数，用于把分数线性映射到 [0, 1]
pub fn above_threshold(
    scores: impl IntoIterator<Item = (ImageId, f64)>,
    best: f64,
    worst: f64,
    fraction: f64,
) -> Vec<Match> {
    let fraction = fraction.clamp(0.0, 1.0);
    let range = worst - best;

    let mut matches = if range > 0.0 {
        let required = best + range * (1.0 - fraction);
        scores
            .into_iter()
            .filter(|&(_, score)| score <= required)
            .map(|(id, score)| Match { id, score: (1.0 - (score - best) / range).clamp(0.0, 1.0) })
            .collect::<Vec<_>>()
    } else {
        // 查询签名没有任何可区分的信息，只有与最好分数持平的才算匹配
        scores
            .into_iter()
            .filter(|&(_, score)| score <= best)
            .map(|(id, _)| Match { id, score: 1.0 })
            .collect::<Vec<_>>()
    };

    // 稳定排序，相似度相同的保持 ID 顺序
    matches.sort_by(|a, b| b.score.total_cmp(&a.score));
    matches
}
