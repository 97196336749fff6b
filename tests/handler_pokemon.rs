mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use pokemon_gateway::domain::cache_key::CacheKey;
use pokemon_gateway::infrastructure::cache::ResultCache;
use serde_json::Value;

fn sorted_ids(json: &Value) -> Vec<i64> {
    let mut ids: Vec<i64> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_i64().unwrap())
        .collect();
    ids.sort_unstable();
    ids
}

#[tokio::test]
async fn test_page_is_cached_after_first_request() {
    let mut upstream = mockito::Server::new_async().await;
    let list = common::mock_list(&mut upstream, 2, &[1, 2]).await.expect(1);
    let first = common::mock_detail(&mut upstream, 1).await.expect(1);
    let second = common::mock_detail(&mut upstream, 2).await.expect(1);

    let (state, cache) = common::create_test_state(&upstream);
    let server = TestServer::new(common::test_router(state)).unwrap();

    let response = server.get("/pokemon").add_query_param("limit", 2).await;
    response.assert_status_ok();
    let json = response.json::<Value>();
    assert_eq!(sorted_ids(&json), vec![1, 2]);
    assert!(json[0]["name"].as_str().unwrap().starts_with("pokemon-"));
    assert!(json[0].get("abilities").is_none());

    assert!(cache.get(&CacheKey::entry(2, 1)).await.unwrap().is_some());
    assert!(cache.get(&CacheKey::entry(2, 2)).await.unwrap().is_some());

    let response = server.get("/pokemon").add_query_param("limit", 2).await;
    response.assert_status_ok();
    assert_eq!(sorted_ids(&response.json::<Value>()), vec![1, 2]);

    list.assert_async().await;
    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn test_list_path_uses_default_limit() {
    let mut upstream = mockito::Server::new_async().await;
    let list = common::mock_list(&mut upstream, 20, &[]).await.expect(1);

    let (state, _cache) = common::create_test_state(&upstream);
    let server = TestServer::new(common::test_router(state)).unwrap();

    let response = server.get("/api/list/pokemon").await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), serde_json::json!([]));
    list.assert_async().await;
}

#[tokio::test]
async fn test_failed_detail_is_omitted() {
    let mut upstream = mockito::Server::new_async().await;
    common::mock_list(&mut upstream, 3, &[1, 2, 3]).await;
    common::mock_detail(&mut upstream, 1).await;
    common::mock_detail(&mut upstream, 3).await;
    upstream
        .mock("GET", "/api/v2/pokemon/2")
        .with_status(404)
        .create_async()
        .await;

    let (state, cache) = common::create_test_state(&upstream);
    let server = TestServer::new(common::test_router(state)).unwrap();

    let response = server.get("/pokemon").add_query_param("limit", 3).await;

    response.assert_status_ok();
    assert_eq!(sorted_ids(&response.json::<Value>()), vec![1, 3]);
    assert!(cache.get(&CacheKey::entry(3, 2)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_every_detail_failing_is_degraded() {
    let mut upstream = mockito::Server::new_async().await;
    common::mock_list(&mut upstream, 2, &[1, 2]).await;
    for id in [1, 2] {
        upstream
            .mock("GET", format!("{}/{id}", common::COLLECTION_PATH).as_str())
            .with_status(503)
            .create_async()
            .await;
    }

    let (state, cache) = common::create_test_state(&upstream);
    let server = TestServer::new(common::test_router(state)).unwrap();

    let response = server
        .get("/pokemon")
        .add_query_param("limit", 2)
        .expect_failure()
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let json = response.json::<Vec<String>>();
    assert_eq!(json.len(), 1);
    assert!(json[0].starts_with("Service is currently unavailable due to: "));
    assert!(json[0].contains("503"));
    assert!(cache.get(&CacheKey::entry(2, 1)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_invalid_limit_is_rejected() {
    let mut upstream = mockito::Server::new_async().await;
    let list = upstream
        .mock("GET", common::COLLECTION_PATH)
        .match_query(mockito::Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let (state, _cache) = common::create_test_state(&upstream);
    let server = TestServer::new(common::test_router(state)).unwrap();

    for limit in ["0", "2001", "many", "-1"] {
        let response = server
            .get("/pokemon")
            .add_query_param("limit", limit)
            .expect_failure()
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let json = response.json::<Value>();
        assert_eq!(json["error"]["code"], "validation_error", "limit={limit}");
    }

    list.assert_async().await;
}

#[tokio::test]
async fn test_degraded_after_repeated_list_failures() {
    let mut upstream = mockito::Server::new_async().await;
    let list = upstream
        .mock("GET", common::COLLECTION_PATH)
        .match_query(mockito::Matcher::Any)
        .with_status(500)
        .expect(5)
        .create_async()
        .await;

    let (state, _cache) = common::create_test_state(&upstream);
    let server = TestServer::new(common::test_router(state)).unwrap();

    for _ in 0..5 {
        let response = server.get("/pokemon").expect_failure().await;
        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);

        let json = response.json::<Vec<String>>();
        assert_eq!(json.len(), 1);
        assert!(json[0].starts_with("Service is currently unavailable due to: "));
        assert!(json[0].contains("500"));
    }

    let response = server.get("/pokemon").expect_failure().await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let json = response.json::<Vec<String>>();
    assert_eq!(
        json,
        vec![
            "Service is currently unavailable due to: CircuitBreaker 'list_pokemon' is OPEN and does not permit further calls"
                .to_string()
        ]
    );

    list.assert_async().await;
}
