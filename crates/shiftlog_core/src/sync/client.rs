//! Gatekeeper resolution, endpoint caching and upload.

use super::record::{
    flatten_block, GatekeeperRequest, GatekeeperResponse, UploadPayload, UploadResponse,
};
use super::transport::{SyncTransport, TransportResponse};
use super::{SyncError, SyncResult};
use crate::repo::settings_repo::{SettingsRepository, SYNC_CREDENTIAL_KEY, SYNC_ENDPOINT_KEY};
use crate::store::TimelineState;
use chrono::TimeZone;
use log::{info, warn};
use serde::de::DeserializeOwned;
use std::time::Instant;

/// Counts reported by the endpoint after a successful upload. A count the
/// endpoint leaves out stays `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub processed: Option<u64>,
    pub new_versions_created: Option<u64>,
    /// The cached endpoint was used without asking the gatekeeper.
    pub endpoint_cached: bool,
}

pub struct SyncClient {
    transport: Box<dyn SyncTransport>,
    gatekeeper_url: Option<String>,
}

impl SyncClient {
    pub fn new(transport: Box<dyn SyncTransport>, gatekeeper_url: Option<String>) -> Self {
        Self {
            transport,
            gatekeeper_url,
        }
    }

    /// Uploads all live blocks and tombstones.
    ///
    /// The endpoint is reused while the credential matches the one that
    /// resolved it. Gatekeeper rejection and HTTP 401/403/404 drop the cached
    /// endpoint so the next attempt resolves it again.
    pub fn upload<S, Tz>(
        &self,
        settings: &S,
        credential: &str,
        state: &TimelineState,
        tz: &Tz,
    ) -> SyncResult<SyncReport>
    where
        S: SettingsRepository + ?Sized,
        Tz: TimeZone,
    {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(SyncError::MissingCredential);
        }
        if state.is_empty() {
            return Err(SyncError::NothingToSend);
        }

        let started_at = Instant::now();
        info!(
            "event=sync_upload module=sync status=start blocks={} tombstones={}",
            state.blocks.len(),
            state.tombstones.len()
        );

        let result = self.resolve_and_send(settings, credential, state, tz);
        match &result {
            Ok(report) => info!(
                "event=sync_upload module=sync status=ok duration_ms={} processed={} new_versions={} cached={}",
                started_at.elapsed().as_millis(),
                count_field(report.processed),
                count_field(report.new_versions_created),
                report.endpoint_cached
            ),
            Err(err) => {
                warn!(
                    "event=sync_upload module=sync status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                if err.is_auth_failure() {
                    settings.remove_setting(SYNC_ENDPOINT_KEY)?;
                    info!("event=sync_endpoint module=sync status=invalidated");
                }
            }
        }
        result
    }

    fn resolve_and_send<S, Tz>(
        &self,
        settings: &S,
        credential: &str,
        state: &TimelineState,
        tz: &Tz,
    ) -> SyncResult<SyncReport>
    where
        S: SettingsRepository + ?Sized,
        Tz: TimeZone,
    {
        let (endpoint, endpoint_cached) = self.resolve_endpoint(settings, credential)?;

        let payload = UploadPayload {
            password: credential,
            data: state.blocks.iter().map(|block| flatten_block(block, tz)).collect(),
            deleted: state
                .tombstones
                .iter()
                .map(|block| flatten_block(block, tz))
                .collect(),
        };
        let body = serde_json::to_string(&payload)
            .map_err(|err| SyncError::InvalidResponse(err.to_string()))?;
        let response = self.post(&endpoint, &body)?;
        let parsed: UploadResponse = parse_body(&response)?;

        if parsed.result != "success" {
            let message = parsed
                .message
                .or(parsed.error)
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(SyncError::Rejected(message));
        }
        Ok(SyncReport {
            processed: parsed.processed,
            new_versions_created: parsed.new_versions_created,
            endpoint_cached,
        })
    }

    fn resolve_endpoint<S>(&self, settings: &S, credential: &str) -> SyncResult<(String, bool)>
    where
        S: SettingsRepository + ?Sized,
    {
        let cached = settings.get_setting(SYNC_ENDPOINT_KEY)?;
        let owner = settings.get_setting(SYNC_CREDENTIAL_KEY)?;
        if let Some(endpoint) = cached {
            if owner.as_deref() == Some(credential) {
                return Ok((endpoint, true));
            }
        }

        let gatekeeper = self
            .gatekeeper_url
            .as_deref()
            .ok_or(SyncError::NotConfigured)?;
        let body = serde_json::to_string(&GatekeeperRequest {
            password: credential,
        })
        .map_err(|err| SyncError::InvalidResponse(err.to_string()))?;
        let response = self.post(gatekeeper, &body)?;
        let parsed: GatekeeperResponse = parse_body(&response)?;
        if parsed.result != "success" {
            return Err(SyncError::CredentialRejected);
        }
        let endpoint = parsed
            .url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| SyncError::InvalidResponse("gatekeeper returned no url".to_string()))?;

        settings.set_setting(SYNC_ENDPOINT_KEY, &endpoint)?;
        settings.set_setting(SYNC_CREDENTIAL_KEY, credential)?;
        info!("event=sync_endpoint module=sync status=resolved");
        Ok((endpoint, false))
    }

    fn post(&self, url: &str, body: &str) -> SyncResult<TransportResponse> {
        let response = self.transport.post_json(url, body).map_err(SyncError::Http)?;
        if !response.is_success() {
            return Err(SyncError::Server {
                status: response.status,
            });
        }
        Ok(response)
    }
}

fn parse_body<T: DeserializeOwned>(response: &TransportResponse) -> SyncResult<T> {
    serde_json::from_str(&response.body).map_err(|err| SyncError::InvalidResponse(err.to_string()))
}

fn count_field(count: Option<u64>) -> String {
    count.map_or_else(|| "-".to_string(), |value| value.to_string())
}
