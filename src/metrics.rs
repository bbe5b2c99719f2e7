use std::sync::LazyLock;

use prometheus::*;

use crate::haar::SketchType;

static METRIC_SEARCH_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!("haar_search_count", "count of the corpus scans", &["sketch"])
        .unwrap()
});

static METRIC_SEARCH_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "haar_search_duration",
        "duration of the per-query corpus scan in seconds",
        &["sketch"]
    )
    .unwrap()
});

static METRIC_SKIPPED_RECORDS: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "haar_skipped_records",
        "count of the unreadable signature records skipped during scans"
    )
    .unwrap()
});

/// 记录一次全库扫描
pub fn observe_search(sketch: SketchType, duration: f64, skipped: usize) {
    let sketch = sketch.as_str();
    METRIC_SEARCH_COUNT.with_label_values(&[sketch]).inc();
    METRIC_SEARCH_DURATION.with_label_values(&[sketch]).observe(duration);
    if skipped > 0 {
        METRIC_SKIPPED_RECORDS.inc_by(skipped as u64);
    }
}

/// 以文本格式导出所有指标
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    encoder.encode_to_string(&gather()).unwrap_or_default()
}
