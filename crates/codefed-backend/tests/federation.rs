//! End-to-end tests for backends talking to a mocked trigram engine, plus
//! store consistency under concurrent refresh.

use std::sync::Arc;
use std::time::Duration;

use codefed_backend::{
    Backend, BackendError, BackendKind, BackendRegistry, ExitReason, IndexInfo, IndexUpdate,
    Query, SearchContext, Tree,
};
use codefed_config::{BackendConfig, FedConfig};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_list(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "repos": [{
                "repository": {
                    "name": "github.com/nginx/nginx",
                    "file_url_template":
                        "https://github.com/nginx/nginx/blob/{{.Version}}/{{.Path}}",
                    "line_fragment_template": "#L{{.LineNumber}}",
                    "branches": [{"name": "HEAD", "version": "deadbeef"}]
                },
                "index_metadata": {"index_time": "2024-05-01T12:00:00Z"}
            }]
        })))
        .mount(server)
        .await;
}

async fn wait_for_trees(backend: &Backend) {
    for _ in 0..100 {
        if !backend.info().trees().await.is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("backend '{}' never refreshed", backend.id());
}

#[tokio::test]
async fn test_trigram_backend_end_to_end() {
    let server = MockServer::start().await;
    mount_list(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/search"))
        .and(body_partial_json(json!({
            "opts": {"total_max_match_count": 2, "max_doc_display_count": 2, "num_context_lines": 1}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stats": {"duration_ms": 9, "flush_reason": "final_flush"},
            "files": [{
                "file_name": "src/core/nginx.c",
                "repository": "github.com/nginx/nginx",
                "version": "deadbeef",
                "line_matches": [
                    {"line": "#include <nginx.h>", "line_number": 10,
                     "line_fragments": [{"line_offset": 10, "match_length": 5}],
                     "before": "/* core */", "after": "#include <ngx_config.h>"},
                    {"line": "", "file_name": true,
                     "line_fragments": [{"line_offset": 9, "match_length": 5}]},
                    {"line": "static ngx_int_t nginx_x;", "line_number": 20},
                    {"line": "never returned", "line_number": 30}
                ]
            }]
        })))
        .mount(&server)
        .await;

    let backend = Backend::trigram("nginx", server.uri()).unwrap();
    backend.start().await;
    wait_for_trees(&backend).await;

    let snapshot = backend.snapshot().await;
    assert_eq!(snapshot.name, "nginx");
    assert_eq!(snapshot.trees[0].version, "deadbeef");
    assert_eq!(
        snapshot.trees[0].file_url("src/core/nginx.c", 10).as_deref(),
        Some("https://github.com/nginx/nginx/blob/deadbeef/src/core/nginx.c#L10")
    );

    let query = Query {
        context_lines: 1,
        max_matches: 2,
        ..Query::new("include nginx")
    };
    let result = backend.search(&query).await.unwrap();

    assert_eq!(result.results.len(), 2);
    assert_eq!(result.file_results.len(), 1);
    assert_eq!(result.results[0].context_before, vec!["/* core */"]);
    assert_eq!(result.results[0].bounds.left, 10);
    assert_eq!(result.results[0].bounds.right, 15);
    assert_eq!(result.file_results[0].path, "src/core/nginx.c");
    assert_eq!(result.stats.exit_reason, ExitReason::MatchLimit);
    assert_eq!(result.stats.total_time, 9);

    backend.shutdown().await;
}

#[tokio::test]
async fn test_trigram_refresh_failure_leaves_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/list"))
        .respond_with(ResponseTemplate::new(503).set_body_string("indexing"))
        .expect(1)
        .mount(&server)
        .await;

    let backend = Backend::trigram("z", server.uri()).unwrap();
    backend.start().await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let snapshot = backend.snapshot().await;
    assert_eq!(snapshot.name, "z");
    assert!(snapshot.trees.is_empty());
    assert_eq!(snapshot.index_time, None);
    backend.shutdown().await;
}

#[tokio::test]
async fn test_engine_error_reaches_caller() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/search"))
        .respond_with(ResponseTemplate::new(500).set_body_string("shard crashed"))
        .mount(&server)
        .await;

    let backend = Backend::trigram("z", server.uri()).unwrap();
    let err = backend.search(&Query::new("x")).await.unwrap_err();
    assert!(matches!(
        err,
        BackendError::RemoteServer { status: 500, ref message } if message == "shard crashed"
    ));
}

#[tokio::test]
async fn test_search_deadline_against_slow_engine() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"files": []}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let backend = Backend::trigram("z", server.uri()).unwrap();
    let ctx = SearchContext::with_timeout(Duration::from_millis(100));

    let err = backend
        .search_with(&ctx, &Query::new("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::DeadlineExceeded));
}

#[tokio::test]
async fn test_registry_from_config_with_mocked_engine() {
    let server = MockServer::start().await;
    mount_list(&server).await;

    let config = FedConfig {
        backends: vec![BackendConfig::new("nginx", server.uri(), BackendKind::Trigram)],
        ..Default::default()
    };
    let registry = BackendRegistry::from_config(&config).unwrap();
    registry.start_all().await;

    let backend = registry.default_backend().await.unwrap();
    wait_for_trees(&backend).await;

    let list = registry.list().await;
    assert_eq!(list[0].tree_count, 1);
    assert_eq!(
        list[0].index_time.map(|t| t.to_rfc3339()),
        Some("2024-05-01T12:00:00+00:00".to_string())
    );

    registry.shutdown_all().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_see_torn_snapshot() {
    let info = Arc::new(IndexInfo::new("b"));

    let writer = {
        let info = Arc::clone(&info);
        tokio::spawn(async move {
            for generation in 0..500 {
                let name = format!("gen-{generation}");
                let trees = (0..4)
                    .map(|i| Tree::new(format!("{name}/{i}"), name.clone(), ""))
                    .collect();
                info.apply(IndexUpdate {
                    name: Some(name),
                    trees: Some(trees),
                    index_time: None,
                })
                .await;
                tokio::task::yield_now().await;
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let info = Arc::clone(&info);
            tokio::spawn(async move {
                for _ in 0..500 {
                    let snapshot = info.snapshot().await;
                    for tree in snapshot.trees.iter() {
                        assert_eq!(tree.version, snapshot.name, "torn snapshot");
                    }
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
    assert_eq!(info.name().await, "gen-499");
}
