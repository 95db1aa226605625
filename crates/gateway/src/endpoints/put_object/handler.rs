use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::Response;
use bsync_types::{PutObjectRequest, PutObjectResponse};
use tracing::Instrument;

use crate::config::GatewayState;
use crate::endpoints::{decode_json, json_response};
use crate::error::GatewayError;
use crate::presign::{PutOptions, Registry};
use crate::validate::{ttl_from_millis, validate_put_request};

/// POST /v1/put: アップロード用署名付きURL発行。
///
/// 処理全体に `GatewayState::request_timeout` の期限を設け、
/// 超過した場合は残りのターゲットを処理せず504を返す。
pub async fn handle_put_object(
    State(state): State<Arc<GatewayState>>,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("put_object", %request_id);

    async move {
        let request: PutObjectRequest = decode_json(&body)?;

        let response = tokio::time::timeout(
            state.request_timeout,
            presign_put_object(&state.registry, &request),
        )
        .await
        .map_err(|_| {
            tracing::warn!(
                timeout_ms = state.request_timeout.as_millis() as u64,
                "リクエスト処理が期限を超過"
            );
            GatewayError::Timeout(state.request_timeout)
        })??;

        tracing::info!(targets = response.targets.len(), "署名付きURLを発行");
        json_response(&response)
    }
    .instrument(span)
    .await
}

/// 検証済みのリクエストを各ターゲットの署名器に振り分けて署名する。
///
/// ターゲットは入力順に逐次処理し、レスポンスも同じ順に並ぶ。
/// `replication_targets` が空の場合は空のレスポンスを返す。
pub async fn presign_put_object(
    registry: &Registry,
    request: &PutObjectRequest,
) -> Result<PutObjectResponse, GatewayError> {
    validate_put_request(request).map_err(|e| {
        tracing::warn!(error = %e, "リクエストの検証に失敗");
        GatewayError::Validation(e)
    })?;

    let ttl = ttl_from_millis(request.expires_ms);
    let mut targets = Vec::with_capacity(request.replication_targets.len());

    for target in &request.replication_targets {
        let provider = &target.provider;
        let signer = registry.get(provider).ok_or_else(|| {
            tracing::warn!(provider = %provider, "署名器が登録されていないプロバイダ");
            GatewayError::ProviderNotConfigured(provider.clone())
        })?;

        let options = PutOptions::new()
            .with_content_type(request.content_type.clone())
            .with_metadata(request.metadata.clone())
            .with_ttl(ttl)
            .with_encryption(target.encryption.clone());

        let presigned = signer
            .presign_put(&target.bucket, &target.key, &options)
            .await
            .map_err(|source| {
                tracing::warn!(
                    provider = %provider,
                    bucket = %target.bucket,
                    error = %source,
                    "署名に失敗"
                );
                GatewayError::Presign {
                    provider: provider.clone(),
                    source,
                }
            })?;

        tracing::debug!(
            provider = %provider,
            bucket = %target.bucket,
            key = %target.key,
            "ターゲットに署名"
        );
        targets.push(presigned);
    }

    Ok(PutObjectResponse { targets })
}
