//! # Gatewayエンドポイント
//!
//! - `POST /v1/put`, `POST /v1/presign/put`: アップロード用署名付きURL発行
//! - `POST /v1/presign/get`: ダウンロード用署名付きURL発行

pub mod get_object;
pub mod put_object;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use get_object::handle_presign_get;
pub use put_object::handle_put_object;

use axum::body::Bytes;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::GatewayError;

/// 成功レスポンスのContent-Type
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// リクエスト本文をJSONとしてデコードする。
///
/// axumの `Json` 抽出子は不正な本文に415/422を返すため、
/// 本文はバイト列で受け取りここでデコードする。
pub(crate) fn decode_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, GatewayError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::warn!(error = %e, "リクエストのデコードに失敗");
        GatewayError::Decode(e.to_string())
    })
}

/// 200 OK のJSONレスポンスを組み立てる。
pub(crate) fn json_response<T: Serialize>(value: &T) -> Result<Response, GatewayError> {
    let body = serde_json::to_vec(value)
        .map_err(|e| GatewayError::Internal(format!("レスポンスのシリアライズに失敗: {e}")))?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, JSON_CONTENT_TYPE)],
        body,
    )
        .into_response())
}
