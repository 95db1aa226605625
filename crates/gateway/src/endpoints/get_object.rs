//! # POST /v1/presign/get
//!
//! 単一ターゲットのダウンロード用署名付きURL発行。
//! `expires_ms` 未指定時は署名器のデフォルト有効期間（15分）。

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::Response;
use bsync_types::{GetObjectRequest, PresignedUrl};
use tracing::Instrument;

use crate::config::GatewayState;
use crate::endpoints::{decode_json, json_response};
use crate::error::GatewayError;
use crate::presign::Registry;
use crate::validate::{ttl_from_millis, validate_get_request};

/// POST /v1/presign/get: ダウンロード用署名付きURL発行。
pub async fn handle_presign_get(
    State(state): State<Arc<GatewayState>>,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("presign_get", %request_id);

    async move {
        let request: GetObjectRequest = decode_json(&body)?;

        let presigned = tokio::time::timeout(
            state.request_timeout,
            presign_get_object(&state.registry, &request),
        )
        .await
        .map_err(|_| {
            tracing::warn!(
                timeout_ms = state.request_timeout.as_millis() as u64,
                "リクエスト処理が期限を超過"
            );
            GatewayError::Timeout(state.request_timeout)
        })??;

        tracing::info!(provider = %presigned.target.provider, "ダウンロードURLを発行");
        json_response(&presigned)
    }
    .instrument(span)
    .await
}

async fn presign_get_object(
    registry: &Registry,
    request: &GetObjectRequest,
) -> Result<PresignedUrl, GatewayError> {
    validate_get_request(request).map_err(|e| {
        tracing::warn!(error = %e, "リクエストの検証に失敗");
        GatewayError::Validation(e)
    })?;

    let target = &request.target;
    let provider = &target.provider;
    let signer = registry.get(provider).ok_or_else(|| {
        tracing::warn!(provider = %provider, "署名器が登録されていないプロバイダ");
        GatewayError::ProviderNotConfigured(provider.clone())
    })?;

    signer
        .presign_get(
            &target.bucket,
            &target.key,
            request.expires_ms.map(ttl_from_millis),
        )
        .await
        .map_err(|source| {
            tracing::warn!(provider = %provider, error = %source, "署名に失敗");
            GatewayError::Presign {
                provider: provider.clone(),
                source,
            }
        })
}
