//! End-to-end: fake mirror -> rebuild -> Dockerfile bump

mod helper;

use tempfile::TempDir;

use alpine_bump::dockerfile::{TargetError, UpdateError, UpdateOutcome};
use alpine_bump::index::StoreError;
use alpine_bump::update::{process_target, process_targets};
use helper::{create_test_store, fetcher_and_space, index_config, serve_index, write_dockerfile};

const CURL: &str = r#"FROM alpine:edge
LABEL name="curl"
LABEL version="8.4.0-r0"
RUN apk add --no-cache \
    ca-certificates \
    curl=8.4.0-r0
"#;

const HURL: &str = r#"FROM alpine:edge
LABEL name="hurl" version="4.0.0-r0"
RUN echo "https://dl-cdn.alpinelinux.org/alpine/edge/testing" >> /etc/apk/repositories \
 && apk add --no-cache hurl=4.0.0-r0
"#;

#[tokio::test]
async fn bumps_dockerfiles_from_rebuilt_store() {
    let mut server = mockito::Server::new_async().await;
    serve_index(
        &mut server,
        ("edge", "main", "x86_64"),
        &[("ca-certificates", "20240226-r0"), ("curl", "8.5.0-r0")],
        1,
    )
    .await;
    serve_index(&mut server, ("edge", "community", "x86_64"), &[("curl", "8.4.0-r0")], 1).await;
    serve_index(&mut server, ("edge", "testing", "x86_64"), &[("hurl", "4.1.0-r0")], 1).await;

    let config = index_config(
        &server.url(),
        &["edge"],
        &["main", "community", "testing"],
        &["x86_64"],
    );
    let (fetcher, space) = fetcher_and_space(&config);
    let temp_dir = TempDir::new().unwrap();
    let store = create_test_store(&temp_dir);
    store.rebuild(&fetcher, &space, None).await.unwrap();

    let curl_dir = TempDir::new().unwrap();
    write_dockerfile(curl_dir.path(), CURL);
    let hurl_dir = TempDir::new().unwrap();
    write_dockerfile(hurl_dir.path(), HURL);

    let results = process_targets(
        &[curl_dir.path().to_path_buf(), hurl_dir.path().to_path_buf()],
        &store,
        true,
    );

    let lines: Vec<String> = results
        .iter()
        .map(|(_, result)| result.as_ref().unwrap().to_string())
        .collect();
    assert_eq!(
        lines,
        vec![
            "YES curl 8.4.0-r0 -> 8.5.0-r0",
            "YES hurl 4.0.0-r0 -> 4.1.0-r0"
        ]
    );

    assert_eq!(
        std::fs::read_to_string(curl_dir.path().join("Dockerfile")).unwrap(),
        r#"FROM alpine:edge
LABEL name="curl"
LABEL version="8.5.0-r0"
RUN apk add --no-cache \
    ca-certificates \
    curl=8.5.0-r0
"#
    );
    assert!(
        std::fs::read_to_string(hurl_dir.path().join("Dockerfile"))
            .unwrap()
            .contains("apk add --no-cache hurl=4.1.0-r0")
    );

    let second = process_target(curl_dir.path(), &store, true).unwrap();
    assert_eq!(
        second.outcome,
        UpdateOutcome::AlreadyUpToDate {
            current: "8.5.0-r0".to_string(),
            candidate: Some("8.5.0-r0".to_string())
        }
    );
    assert!(!second.saved);
}

#[test]
fn unbuilt_store_fails_the_target() {
    let temp_dir = TempDir::new().unwrap();
    let store = create_test_store(&temp_dir);
    let dir = TempDir::new().unwrap();
    write_dockerfile(dir.path(), CURL);

    let result = process_target(dir.path(), &store, true);

    assert!(matches!(
        result,
        Err(TargetError::Update(UpdateError::Store(StoreError::NotInitialized)))
    ));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("Dockerfile")).unwrap(),
        CURL
    );
}

#[tokio::test]
async fn testing_repository_is_ignored_unless_referenced() {
    let mut server = mockito::Server::new_async().await;
    serve_index(&mut server, ("edge", "main", "x86_64"), &[("curl", "8.4.0-r0")], 1).await;
    serve_index(&mut server, ("edge", "testing", "x86_64"), &[("curl", "9.0.0-r0")], 1).await;

    let config = index_config(&server.url(), &["edge"], &["main", "testing"], &["x86_64"]);
    let (fetcher, space) = fetcher_and_space(&config);
    let temp_dir = TempDir::new().unwrap();
    let store = create_test_store(&temp_dir);
    store.rebuild(&fetcher, &space, None).await.unwrap();

    let dir = TempDir::new().unwrap();
    write_dockerfile(dir.path(), CURL);

    let summary = process_target(dir.path(), &store, false).unwrap();

    assert_eq!(summary.to_string(), "NO curl 8.4.0-r0 -> 8.4.0-r0");
}
