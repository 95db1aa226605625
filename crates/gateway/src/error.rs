//! # Gateway エラー型
//!
//! HTTP境界で返す全エラーをまとめる。本文はエラーメッセージの平文で、
//! 構造化されたエラーコードは持たない。

use std::time::Duration;

use axum::http::StatusCode;
use bsync_types::Provider;

use crate::presign::PresignError;
use crate::validate::ValidationError;

/// Gatewayエラー型。
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// リクエスト本文のJSONデコードに失敗
    #[error("failed to decode request: {0}")]
    Decode(String),
    /// リクエストの意味的な検証に失敗
    #[error("failed to validate request: {0}")]
    Validation(#[from] ValidationError),
    /// 指定プロバイダの署名器が登録されていない
    #[error("provider not configured: {0}")]
    ProviderNotConfigured(Provider),
    /// プロバイダの署名処理が失敗
    #[error("presign failed for {provider}: {source}")]
    Presign {
        /// 失敗したターゲットのプロバイダ
        provider: Provider,
        /// 署名器が返したエラー
        source: PresignError,
    },
    /// リクエスト処理の期限切れ
    #[error("request timed out after {} ms", .0.as_millis())]
    Timeout(Duration),
    /// 内部エラー
    #[error("internal error: {0}")]
    Internal(String),
}

impl axum::response::IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            GatewayError::Decode(_)
            | GatewayError::Validation(_)
            | GatewayError::ProviderNotConfigured(_) => StatusCode::BAD_REQUEST,
            GatewayError::Presign { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
