use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum_typed_multipart::TypedMultipart;
use clap::ValueEnum;
use log::info;
use tokio::task::block_in_place;

use super::error::{AppError, Result};
use super::state::AppState;
use super::types::*;
use crate::config::check_fraction;
use crate::haar::SketchType;
use crate::store::IdentifierResolver;
use crate::{HaarIface, decode, metrics};

/// 搜索一张图片
#[utoipa::path(
    post,
    path = "/search",
    request_body(content = SearchForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = SearchResponse),
        (status = 400, description = "图片无法解码或参数无效"),
    )
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    data: TypedMultipart<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let sketch = match &data.sketch {
        Some(s) => SketchType::from_str(s, true)
            .map_err(|e| AppError::bad_request(format!("无效的 sketch 参数: {e}")))?,
        None => state.search.sketch,
    };
    let count = data.count.unwrap_or(state.search.count);
    let threshold = request_threshold(data.threshold, state.search.threshold)?;

    let start = Instant::now();
    info!("正在搜索上传图片");

    let result = block_in_place(|| {
        let image = decode::decode_bytes(&data.file)?;
        let mut iface = HaarIface::new(state.db.clone());
        match threshold {
            Some(t) => iface.best_matches_for_image_with_threshold(&image, t, sketch),
            None => iface.best_matches_for_image(&image, count, sketch),
        }
    })?;

    let result = result
        .into_iter()
        .map(|m| {
            let path = state.db.record(m.id)?.map(|r| r.path);
            Ok(MatchItem { id: m.id, score: m.score, path })
        })
        .collect::<crate::Result<Vec<_>>>()?;

    Ok(Json(SearchResponse { time: start.elapsed().as_millis() as u64, result }))
}

/// 请求中没有指定相似度时使用服务的默认值
fn request_threshold(requested: Option<f64>, default: Option<f64>) -> Result<Option<f64>> {
    requested
        .or(default)
        .map(check_fraction)
        .transpose()
        .map_err(AppError::bad_request)
}

/// 计算一张图片的签名
#[utoipa::path(
    post,
    path = "/signature",
    request_body(content = SignatureForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = SignatureResponse),
        (status = 400, description = "图片无法解码"),
    )
)]
pub async fn signature_handler(
    State(state): State<Arc<AppState>>,
    data: TypedMultipart<SignatureRequest>,
) -> Result<Json<SignatureResponse>> {
    if data.file.is_empty() {
        return Err(AppError::bad_request("上传的文件为空"));
    }
    let signature = block_in_place(|| {
        let image = decode::decode_bytes(&data.file)?;
        HaarIface::new(state.db.clone()).signature_as_text(&image)
    })?;
    Ok(Json(SignatureResponse { signature }))
}

/// 以 prometheus 文本格式导出指标
#[utoipa::path(get, path = "/metrics", responses((status = 200, body = String)))]
pub async fn metrics_handler() -> String {
    metrics::gather_text()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_from_request() {
        assert_eq!(request_threshold(None, None).ok(), Some(None));
        assert_eq!(request_threshold(None, Some(0.9)).ok(), Some(Some(0.9)));
        assert_eq!(request_threshold(Some(0.5), Some(0.9)).ok(), Some(Some(0.5)));
        assert!(request_threshold(Some(5.0), None).is_err());
        assert!(request_threshold(Some(-0.1), Some(0.9)).is_err());
        let Err(err) = request_threshold(Some(f64::NAN), None) else { panic!("NaN accepted") };
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
