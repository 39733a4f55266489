//! Org and space names of the reported applications.
//!
//! The stats document doesn't say where an application lives, so it's looked
//! up by following the application's space and the space's organization. Each
//! distinct space and organization is fetched once per run.

use crate::connection::{response_body, CliConnection, ConnectionError};
use crate::types::{AppGuid, InstanceStatRecord};
use futures_util::{stream, StreamExt};
use itertools::Itertools;
use serde::{de::DeserializeOwned, Deserialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument, warn};

#[derive(Debug, thiserror::Error)]
pub enum PlacementError {
    #[error("Failed to fetch '{path}'")]
    Fetch {
        path: String,
        #[source]
        error: ConnectionError,
    },

    #[error("Malformed resource '{path}'")]
    Malformed {
        path: String,
        #[source]
        error: serde_json::Error,
    },
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Placement {
    pub org_name: String,
    pub space_name: String,
}

#[derive(Debug, Deserialize)]
struct Resource<E> {
    entity: E,
}

#[derive(Debug, Deserialize)]
struct AppEntity {
    space_url: String,
}

#[derive(Debug, Deserialize)]
struct SpaceEntity {
    name: String,
    organization_url: String,
}

#[derive(Debug, Deserialize)]
struct OrgEntity {
    name: String,
}

async fn fetch_entity<C: CliConnection, E: DeserializeOwned>(
    conn: &C,
    path: &str,
) -> Result<E, PlacementError> {
    let lines = conn
        .curl(path)
        .await
        .map_err(|error| PlacementError::Fetch {
            path: path.to_owned(),
            error,
        })?;
    let resource: Resource<E> =
        serde_json::from_str(&response_body(&lines)).map_err(|error| {
            PlacementError::Malformed {
                path: path.to_owned(),
                error,
            }
        })?;
    Ok(resource.entity)
}

/// Fetch every distinct key concurrently, dropping (and logging) the failures
async fn fetch_all<C, K, E>(
    conn: &C,
    keys: BTreeSet<K>,
    path_for: impl Fn(&K) -> String,
    max_concurrent: usize,
) -> BTreeMap<K, E>
where
    C: CliConnection,
    K: Ord + Clone,
    E: DeserializeOwned,
{
    stream::iter(keys)
        .map(|key| {
            let path = path_for(&key);
            async move {
                match fetch_entity::<C, E>(conn, &path).await {
                    Ok(entity) => Some((key, entity)),
                    Err(err) => {
                        warn!(%path, "org/space lookup failed: {err}");
                        None
                    }
                }
            }
        })
        .buffered(max_concurrent.max(1))
        .filter_map(|found| async move { found })
        .collect()
        .await
}

/// Find the org and space of each application.
///
/// Applications whose placement can't be resolved are absent from the result.
#[instrument(skip_all, fields(apps = guids.len()))]
pub async fn resolve_placements<C: CliConnection>(
    conn: &C,
    guids: &[AppGuid],
    max_concurrent: usize,
) -> BTreeMap<AppGuid, Placement> {
    let apps: BTreeMap<AppGuid, AppEntity> = fetch_all(
        conn,
        guids.iter().cloned().collect(),
        |guid| format!("/v2/apps/{guid}"),
        max_concurrent,
    )
    .await;

    let spaces: BTreeMap<String, SpaceEntity> = fetch_all(
        conn,
        apps.values().map(|app| app.space_url.clone()).collect(),
        String::clone,
        max_concurrent,
    )
    .await;

    let orgs: BTreeMap<String, OrgEntity> = fetch_all(
        conn,
        spaces
            .values()
            .map(|space| space.organization_url.clone())
            .collect(),
        String::clone,
        max_concurrent,
    )
    .await;

    debug!(
        spaces = spaces.len(),
        orgs = orgs.len(),
        "resolved placements"
    );

    apps.into_iter()
        .filter_map(|(guid, app)| {
            let space = spaces.get(&app.space_url)?;
            let org = orgs.get(&space.organization_url)?;
            Some((
                guid,
                Placement {
                    org_name: org.name.clone(),
                    space_name: space.name.clone(),
                },
            ))
        })
        .collect()
}

/// Fill in org and space names for the given records, leaving them empty
/// where the placement is unknown
pub async fn with_placements<C: CliConnection>(
    conn: &C,
    records: Vec<InstanceStatRecord>,
    max_concurrent: usize,
) -> Vec<InstanceStatRecord> {
    let guids: Vec<AppGuid> = records
        .iter()
        .map(|r| r.app_guid.clone())
        .unique()
        .collect();
    let placements = resolve_placements(conn, &guids, max_concurrent).await;

    records
        .into_iter()
        .map(|record| match placements.get(&record.app_guid) {
            Some(p) => InstanceStatRecord {
                org_name: p.org_name.clone(),
                space_name: p.space_name.clone(),
                ..record
            },
            None => record,
        })
        .collect()
}
