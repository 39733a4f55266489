use crate::connection::{response_body, ApiErrorDocument, CliConnection, ConnectionError};
use crate::types::{AppGuid, InstanceState, InstanceStatRecord};
use futures_util::{stream, StreamExt};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, instrument, warn};

const APP_STOPPED_ERROR_CODE: &str = "CF-AppStoppedStatsError";

/// Reasons a single application contributes nothing to the report
#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("Failed to fetch stats for app '{guid}'")]
    Fetch {
        guid: AppGuid,
        #[source]
        error: ConnectionError,
    },

    #[error("Malformed stats document for app '{guid}'")]
    Malformed {
        guid: AppGuid,
        #[source]
        error: serde_json::Error,
    },

    #[error("Stats document for app '{guid}' has a non-numeric instance index '{key}'")]
    InstanceIndex { guid: AppGuid, key: String },

    #[error("App '{guid}' is stopped: {description}")]
    Stopped { guid: AppGuid, description: String },

    #[error("Control API refused stats for app '{guid}' ({error_code}): {description}")]
    Api {
        guid: AppGuid,
        error_code: String,
        description: String,
    },
}

#[derive(Debug, Deserialize)]
struct InstanceEntry {
    state: String,
    #[serde(default)]
    stats: Option<InstanceStats>,
}

#[derive(Debug, Deserialize)]
struct InstanceStats {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    uris: Option<Vec<String>>,
    #[serde(default)]
    host: String,
    #[serde(default)]
    port: u16,
    #[serde(default)]
    uptime: u64,
    #[serde(default)]
    mem_quota: u64,
    #[serde(default)]
    disk_quota: u64,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Usage {
    mem: u64,
    disk: u64,
    cpu: f64,
}

/// Decode an application's stats document into one record per reporting
/// instance, ordered by instance index.
///
/// Instances without a `stats` object (DOWN instances, for example) have no
/// location and are skipped.
pub fn decode_stats(guid: &AppGuid, body: &str) -> Result<Vec<InstanceStatRecord>, StatsError> {
    let malformed = |error| StatsError::Malformed {
        guid: guid.clone(),
        error,
    };

    let doc: serde_json::Value = serde_json::from_str(body).map_err(malformed)?;
    if ApiErrorDocument::is_error_document(&doc) {
        let err: ApiErrorDocument = serde_json::from_value(doc).map_err(malformed)?;
        return Err(if err.error_code == APP_STOPPED_ERROR_CODE {
            StatsError::Stopped {
                guid: guid.clone(),
                description: err.description,
            }
        } else {
            StatsError::Api {
                guid: guid.clone(),
                error_code: err.error_code,
                description: err.description,
            }
        });
    }

    let entries: BTreeMap<String, InstanceEntry> =
        serde_json::from_value(doc).map_err(malformed)?;

    let mut indexed = Vec::with_capacity(entries.len());
    for (key, entry) in entries {
        let index = key
            .trim()
            .parse::<u32>()
            .map_err(|_| StatsError::InstanceIndex {
                guid: guid.clone(),
                key: key.clone(),
            })?;
        indexed.push((index, entry));
    }
    // String keys sort "10" before "2"
    indexed.sort_by_key(|(index, _)| *index);

    Ok(indexed
        .into_iter()
        .filter_map(|(index, entry)| {
            let stats = entry.stats?;
            Some(InstanceStatRecord {
                app_guid: guid.clone(),
                app_name: stats.name.unwrap_or_default(),
                instance_index: index,
                state: InstanceState::from(entry.state),
                host: stats.host,
                port: stats.port,
                mem_used: stats.usage.mem,
                mem_quota: stats.mem_quota,
                disk_used: stats.usage.disk,
                disk_quota: stats.disk_quota,
                cpu: stats.usage.cpu,
                uptime_secs: stats.uptime,
                uris: stats.uris.unwrap_or_default(),
                org_name: String::new(),
                space_name: String::new(),
            })
        })
        .collect())
}

/// Fetch and decode the stats of one application
#[instrument(skip(conn, guid), fields(guid = %guid))]
pub async fn app_instances<C: CliConnection>(
    conn: &C,
    guid: &AppGuid,
) -> Result<Vec<InstanceStatRecord>, StatsError> {
    let path = format!("/v2/apps/{guid}/stats");
    let lines = conn.curl(&path).await.map_err(|error| StatsError::Fetch {
        guid: guid.clone(),
        error,
    })?;
    decode_stats(guid, &response_body(&lines))
}

/// Collect the instances of every application, keeping at most
/// `max_concurrent` requests in flight.
///
/// An application whose stats can't be had is logged and left out. Records
/// come back in the order of `guids` whatever order the requests finish in.
pub async fn collect_instances<C: CliConnection>(
    conn: &C,
    guids: &[AppGuid],
    max_concurrent: usize,
) -> Vec<InstanceStatRecord> {
    let per_app: Vec<Vec<InstanceStatRecord>> = stream::iter(guids)
        .map(|guid| async move {
            match app_instances(conn, guid).await {
                Ok(records) => {
                    debug!(%guid, instances = records.len(), "collected app stats");
                    records
                }
                Err(err @ StatsError::Stopped { .. }) => {
                    debug!(%guid, "omitting app: {err}");
                    Vec::new()
                }
                Err(err) => {
                    warn!(%guid, "omitting app: {}", error_chain(&err));
                    Vec::new()
                }
            }
        })
        .buffered(max_concurrent.max(1))
        .collect()
        .await;

    per_app.into_iter().flatten().collect()
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}
