use crate::connection::{response_body, ApiErrorDocument, CliConnection, ConnectionError};
use crate::types::AppGuid;
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::{debug, instrument};

#[derive(Debug, thiserror::Error)]
pub enum EnumerationError {
    #[error("Failed to fetch application listing page '{path}'")]
    Fetch {
        path: String,
        #[source]
        error: ConnectionError,
    },

    #[error("Malformed application listing page '{path}'")]
    Malformed {
        path: String,
        #[source]
        error: serde_json::Error,
    },

    #[error("Control API refused application listing page '{path}' ({error_code}): {description}")]
    Api {
        path: String,
        error_code: String,
        description: String,
    },

    #[error("Application listing page '{0}' was already fetched, the listing does not terminate")]
    Cycle(String),
}

#[derive(Debug, Deserialize)]
struct ListingPage {
    resources: Vec<ListingResource>,
    #[serde(default)]
    next_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListingResource {
    metadata: ResourceMetadata,
}

#[derive(Debug, Deserialize)]
struct ResourceMetadata {
    guid: AppGuid,
}

/// Walk every page of the application listing starting at `path`, collecting
/// the application GUIDs in page order.
///
/// Any page failing to load or decode fails the whole enumeration, no
/// truncated listing is ever returned.
#[instrument(skip(conn))]
pub async fn app_guids<C: CliConnection>(
    conn: &C,
    path: &str,
) -> Result<Vec<AppGuid>, EnumerationError> {
    let mut guids = Vec::new();
    let mut fetched = BTreeSet::new();
    let mut next = Some(path.to_owned());

    while let Some(path) = next.take() {
        if !fetched.insert(path.clone()) {
            return Err(EnumerationError::Cycle(path));
        }

        let page = fetch_page(conn, &path).await?;
        debug!(%path, resources = page.resources.len(), "fetched listing page");
        guids.extend(page.resources.into_iter().map(|r| r.metadata.guid));
        next = page.next_url.filter(|url| !url.trim().is_empty());
    }

    Ok(guids)
}

async fn fetch_page<C: CliConnection>(
    conn: &C,
    path: &str,
) -> Result<ListingPage, EnumerationError> {
    let lines = conn
        .curl(path)
        .await
        .map_err(|error| EnumerationError::Fetch {
            path: path.to_owned(),
            error,
        })?;
    let malformed = |error| EnumerationError::Malformed {
        path: path.to_owned(),
        error,
    };

    let doc: serde_json::Value = serde_json::from_str(&response_body(&lines)).map_err(malformed)?;
    if ApiErrorDocument::is_error_document(&doc) {
        let err: ApiErrorDocument = serde_json::from_value(doc).map_err(malformed)?;
        return Err(EnumerationError::Api {
            path: path.to_owned(),
            error_code: err.error_code,
            description: err.description,
        });
    }
    serde_json::from_value(doc).map_err(malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::fake::FakeCliConnection;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    const PAGE_1: &str = include_str!("../../test_resources/fixtures/apps_page1.json");
    const PAGE_2: &str = include_str!("../../test_resources/fixtures/apps_page2.json");
    const PAGE_2_PATH: &str = "/v2/apps?order-direction=asc&page=2&results-per-page=2";

    fn guids(ids: &[&str]) -> Vec<AppGuid> {
        ids.iter().map(|id| AppGuid::new(id).unwrap()).collect()
    }

    #[tokio::test]
    async fn walks_every_page_in_order() {
        let conn = FakeCliConnection::new()
            .with_response("/v2/apps", PAGE_1)
            .with_response(PAGE_2_PATH, PAGE_2);

        let found = app_guids(&conn, "/v2/apps").await.unwrap();

        assert_eq!(
            found,
            guids(&[
                "6b2f1a7e-3c1d-4e55-9a0b-0c1d2e3f4a01",
                "9e8d7c6b-5a49-4382-9170-6f5e4d3c2b02",
                "0f1e2d3c-4b5a-4697-8877-665544332203",
            ])
        );
        assert_eq!(conn.calls(), vec!["/v2/apps".to_owned(), PAGE_2_PATH.to_owned()]);
    }

    #[tokio::test]
    async fn single_page_without_next_url() {
        let conn = FakeCliConnection::new().with_response(
            "/v2/apps",
            indoc! {r#"
                {"resources": [
                    {"metadata": {"guid": "xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx"}},
                    {"metadata": {"guid": "yyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyy"}}
                ]}
            "#},
        );

        let found = app_guids(&conn, "/v2/apps").await.unwrap();

        assert_eq!(
            found,
            guids(&[
                "xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx",
                "yyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyy",
            ])
        );
    }

    #[tokio::test]
    async fn empty_listing() {
        let conn = FakeCliConnection::new().with_response(
            "/v2/apps",
            r#"{"total_results": 0, "next_url": "", "resources": []}"#,
        );

        assert!(app_guids(&conn, "/v2/apps").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_late_page_fails_the_enumeration() {
        let conn = FakeCliConnection::new()
            .with_response("/v2/apps", PAGE_1)
            .with_response(PAGE_2_PATH, "<html>502 Bad Gateway</html>");

        let err = app_guids(&conn, "/v2/apps").await.unwrap_err();

        assert!(matches!(err, EnumerationError::Malformed { path, .. } if path == PAGE_2_PATH));
    }

    #[tokio::test]
    async fn unreachable_page_fails_the_enumeration() {
        let conn = FakeCliConnection::new().with_response("/v2/apps", PAGE_1);

        let err = app_guids(&conn, "/v2/apps").await.unwrap_err();

        assert!(matches!(err, EnumerationError::Fetch { .. }));
    }

    #[tokio::test]
    async fn repeated_next_url_is_a_cycle() {
        let conn = FakeCliConnection::new().with_response(
            "/v2/apps",
            r#"{"resources": [], "next_url": "/v2/apps"}"#,
        );

        let err = app_guids(&conn, "/v2/apps").await.unwrap_err();

        assert!(matches!(err, EnumerationError::Cycle(_)));
    }

    #[tokio::test]
    async fn rejected_request_fails_the_enumeration() {
        let conn = FakeCliConnection::new().with_response(
            "/v2/apps",
            indoc! {r#"
                {
                  "code": 1000,
                  "description": "Invalid Auth Token",
                  "error_code": "CF-InvalidAuthToken"
                }
            "#},
        );

        let err = app_guids(&conn, "/v2/apps").await.unwrap_err();

        match err {
            EnumerationError::Api {
                path,
                error_code,
                description,
            } => {
                assert_eq!(path, "/v2/apps");
                assert_eq!(error_code, "CF-InvalidAuthToken");
                assert_eq!(description, "Invalid Auth Token");
            }
            other => panic!("expected an API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejected_late_page_fails_the_enumeration() {
        let conn = FakeCliConnection::new()
            .with_response("/v2/apps", PAGE_1)
            .with_response(
                PAGE_2_PATH,
                r#"{"code": 10002, "error_code": "CF-NotAuthenticated"}"#,
            );

        let err = app_guids(&conn, "/v2/apps").await.unwrap_err();

        assert!(matches!(err, EnumerationError::Api { path, .. } if path == PAGE_2_PATH));
    }

    #[tokio::test]
    async fn page_without_resources_is_malformed() {
        for body in ["{}", "[]", r#"{"next_url": null}"#] {
            let conn = FakeCliConnection::new().with_response("/v2/apps", body);

            let err = app_guids(&conn, "/v2/apps").await.unwrap_err();

            assert!(
                matches!(err, EnumerationError::Malformed { .. }),
                "{body} gave {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn blank_guid_is_malformed() {
        let conn = FakeCliConnection::new().with_response(
            "/v2/apps",
            r#"{"resources": [{"metadata": {"guid": ""}}]}"#,
        );

        let err = app_guids(&conn, "/v2/apps").await.unwrap_err();

        assert!(matches!(err, EnumerationError::Malformed { .. }));
    }
}
