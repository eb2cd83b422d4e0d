//! Tests for DriveClient with mocked HTTP responses.

use std::sync::Arc;

use async_trait::async_trait;
use gdrive2sheet::{DriveClient, ListOptions, TokenProvider};
use mockito::{Matcher, Server};
use serde_json::json;

struct StaticToken;

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> gdrive2sheet::Result<String> {
        Ok("test-token".to_string())
    }
}

fn client(server: &Server) -> DriveClient {
    DriveClient::new(Arc::new(StaticToken)).with_base_url(server.url())
}

fn item(id: &str, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "mimeType": "application/pdf",
        "webViewLink": format!("https://drive.google.com/file/d/{}/view", id),
        "createdTime": "2021-03-01T08:00:00.000Z",
        "modifiedTime": "2021-03-02T08:00:00.000Z",
        "sharedWithMeTime": "2021-03-05T10:15:30.000Z",
        "owners": [{"displayName": "Ann", "emailAddress": "ann@example.com"}]
    })
}

mod pagination {
    use super::*;

    #[tokio::test]
    async fn test_follows_page_tokens() {
        let mut server = Server::new_async().await;

        let page_two = server
            .mock("GET", "/files")
            .match_query(Matcher::UrlEncoded("pageToken".into(), "page-2".into()))
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"files": [item("f3", "three")]}).to_string())
            .expect(1)
            .create_async()
            .await;

        let page_one = server
            .mock("GET", "/files")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "sharedWithMe".into()),
                Matcher::UrlEncoded("pageSize".into(), "2".into()),
                Matcher::UrlEncoded("orderBy".into(), "sharedWithMeTime desc".into()),
                Matcher::UrlEncoded("fields".into(), "nextPageToken, files(id, name)".into()),
            ]))
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "files": [item("f1", "one"), item("f2", "two")],
                    "nextPageToken": "page-2"
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let options = ListOptions {
            page_size: 2,
            fields: "id, name".to_string(),
            ..ListOptions::default()
        };
        let files = client(&server).list_shared_files(&options).await.unwrap();

        let ids: Vec<_> = files.iter().filter_map(|f| f.id.as_deref()).collect();
        assert_eq!(ids, vec!["f1", "f2", "f3"]);

        page_one.assert_async().await;
        page_two.assert_async().await;
    }

    #[tokio::test]
    async fn test_page_without_files_key_is_empty() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{}")
            .create_async()
            .await;

        let files = client(&server)
            .list_shared_files(&ListOptions::default())
            .await
            .unwrap();

        assert!(files.is_empty());
        mock.assert_async().await;
    }
}

mod normalization {
    use super::*;
    use gdrive2sheet::SyncError;

    #[tokio::test]
    async fn test_get_shared_files_normalizes_items() {
        let mut server = Server::new_async().await;
        let mut with_sharer = item("f2", "Café menu");
        with_sharer["sharingUser"] =
            json!({"displayName": "Bob", "emailAddress": "bob@example.com"});

        server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"files": [item("f1", "plain"), with_sharer]}).to_string())
            .create_async()
            .await;

        let files = client(&server)
            .get_shared_files(&ListOptions::default())
            .await
            .unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].sharing_user.email, "unknown");
        assert_eq!(files[0].sharing_user.name, "unknown");
        assert_eq!(files[1].name, "Cafe menu");
        assert_eq!(files[1].sharing_user.email, "bob@example.com");
        assert_eq!(files[1].owner_names(), "Ann");
    }

    #[tokio::test]
    async fn test_item_missing_required_field_fails() {
        let mut server = Server::new_async().await;
        let mut broken = item("f1", "one");
        broken.as_object_mut().unwrap().remove("mimeType");

        server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"files": [broken]}).to_string())
            .create_async()
            .await;

        let err = client(&server)
            .get_shared_files(&ListOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::MissingField { field: "mimeType", .. }));
    }
}

mod error_handling {
    use super::*;
    use gdrive2sheet::SyncError;

    #[tokio::test]
    async fn test_api_error_envelope() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"error": {"code": 403, "message": "Insufficient Permission"}}).to_string(),
            )
            .create_async()
            .await;

        let err = client(&server)
            .list_shared_files(&ListOptions::default())
            .await
            .unwrap_err();

        match err {
            SyncError::ApiError { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "Insufficient Permission");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_api_error_plain_body() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .with_status(502)
            .with_body("Bad Gateway")
            .create_async()
            .await;

        let err = client(&server)
            .list_shared_files(&ListOptions::default())
            .await
            .unwrap_err();

        let display = format!("{}", err);
        assert!(display.contains("502"));
        assert!(display.contains("Bad Gateway"));
    }
}
