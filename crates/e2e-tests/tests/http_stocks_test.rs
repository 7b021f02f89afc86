//! HTTP contract tests for the stock endpoints: CRUD status codes and
//! projections, list filters, search parameter handling, bulk update and
//! bulk embedding, and explicit thesis extraction.

use std::sync::Arc;

use e2e_tests::{new_stock, stock_with_thesis, TestHarness};

use axum::http::StatusCode;
use axum_test::TestServer;
use desk_enrich::MockExtractor;
use desk_types::ThesisAnalysis;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn server(harness: &TestHarness) -> TestServer {
    TestServer::new(desk_server::build_router(harness.state())).unwrap()
}

#[tokio::test]
async fn test_health_reports_ok() {
    let harness = TestHarness::new(4);
    let server = server(&harness);

    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_stock_crud_round_trip() {
    let harness = TestHarness::new(4);
    let server = server(&harness);

    let response = server
        .post("/v1/stocks")
        .json(&json!({
            "name": "Energy Corp",
            "ticker": "enrg",
            "sector": "Energy",
            "price": 42.5,
            "market_cap": 1_500_000_000_u64
        }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let created: Value = response.json();
    let id = created["id"].as_i64().unwrap();
    assert_eq!(created["ticker"], "ENRG");
    assert_eq!(created["market_cap_formatted"], "$1.5B");
    // The create hook already embedded; the vector itself never leaves.
    assert_eq!(created["has_embedding"], true);
    assert!(created.get("embedding").is_none());

    let response = server.get(&format!("/v1/stocks/{id}")).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["name"], "Energy Corp");

    let response = server
        .patch(&format!("/v1/stocks/{id}"))
        .json(&json!({ "notes": "position opened" }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["notes"], "position opened");

    let response = server.delete(&format!("/v1/stocks/{id}")).await;
    response.assert_status(StatusCode::NO_CONTENT);

    server
        .get(&format!("/v1/stocks/{id}"))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_create_rejects_bad_input() {
    let harness = TestHarness::new(4);
    let server = server(&harness);

    let response = server
        .post("/v1/stocks")
        .json(&json!({ "name": "  ", "ticker": "ENRG" }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.json::<Value>()["error"].is_string());

    server
        .post("/v1/stocks")
        .json(&json!({ "name": "Energy Corp", "ticker": "ENRG" }))
        .await
        .assert_status(StatusCode::CREATED);

    // Tickers are unique case-insensitively; the second insert is rejected.
    let response = server
        .post("/v1/stocks")
        .json(&json!({ "name": "Other Corp", "ticker": "enrg" }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_list_stocks_applies_filters() {
    let harness = TestHarness::new(4);
    let mut seed = new_stock("Energy Corp", "ENRG");
    seed.sector = Some("Energy".to_string());
    harness.db.insert_stock(&seed).unwrap();
    let mut seed = new_stock("Chipworks", "CHIP");
    seed.sector = Some("Semiconductors".to_string());
    harness.db.insert_stock(&seed).unwrap();

    let server = server(&harness);

    let all: Value = server.get("/v1/stocks").await.json();
    assert_eq!(all.as_array().unwrap().len(), 2);

    let energy: Value = server.get("/v1/stocks?sector=Energy").await.json();
    let energy = energy.as_array().unwrap();
    assert_eq!(energy.len(), 1);
    assert_eq!(energy[0]["ticker"], "ENRG");

    let by_search: Value = server.get("/v1/stocks?search=chip").await.json();
    assert_eq!(by_search.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_stock_is_404_everywhere() {
    let harness = TestHarness::new(4);
    let server = server(&harness);

    server.get("/v1/stocks/999").await.assert_status_not_found();
    server
        .patch("/v1/stocks/999")
        .json(&json!({ "notes": "x" }))
        .await
        .assert_status_not_found();
    server
        .delete("/v1/stocks/999")
        .await
        .assert_status_not_found();
    server
        .post("/v1/stocks/999/extract-thesis")
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_search_parameter_validation() {
    let harness = TestHarness::new(4);
    let server = server(&harness);

    server
        .get("/v1/stocks/search")
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    server
        .get("/v1/stocks/search?q=%20%20")
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    server
        .get("/v1/stocks/search?q=energy&mode=fuzzy")
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_search_fails_loudly_when_provider_is_down() {
    let harness = TestHarness::failing(2);
    harness
        .db
        .insert_stock(&new_stock("Energy Corp", "ENRG"))
        .unwrap();
    let server = server(&harness);

    // Hybrid is the default mode and needs a query embedding; there is no
    // silent downgrade to keyword-only results.
    let response = server.get("/v1/stocks/search?q=energy").await;
    response.assert_status(StatusCode::BAD_GATEWAY);
    assert!(response.json::<Value>()["error"].is_string());

    // Asking for keyword explicitly still works.
    let response = server.get("/v1/stocks/search?q=energy&mode=keyword").await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_search_response_carries_mode_and_scores() {
    let harness = TestHarness::returning(vec![1.0, 0.0]);
    let energy = harness
        .db
        .insert_stock(&new_stock("Energy Corp", "ENRG"))
        .unwrap();
    let green = harness
        .db
        .insert_stock(&new_stock("Green Energy Partners", "GRNE"))
        .unwrap();
    harness.db.set_stock_embedding(energy.id, &[1.0, 0.0]).unwrap();

    let server = server(&harness);
    let body: Value = server.get("/v1/stocks/search?q=energy").await.json();

    assert_eq!(body["mode"], "hybrid");
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);

    assert_eq!(results[0]["id"].as_i64(), Some(energy.id));
    assert_eq!(results[0]["similarity"].as_f64(), Some(1.0));

    // Keyword tail: present, deduped, unscored.
    assert_eq!(results[1]["id"].as_i64(), Some(green.id));
    assert!(results[1].get("similarity").is_none());
    assert!(results[1].get("embedding").is_none());
}

#[tokio::test]
async fn test_bulk_update_reports_count_and_reembeds() {
    let harness = TestHarness::new(4);
    let a = harness.db.insert_stock(&new_stock("Alpha", "ALPH")).unwrap();
    let b = harness.db.insert_stock(&new_stock("Beta", "BETA")).unwrap();

    let server = server(&harness);
    let response = server
        .patch("/v1/stocks/bulk")
        .json(&json!({
            "stock_ids": [a.id, b.id],
            "updates": { "sector": "Industrials" }
        }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), json!({ "updated_count": 2 }));

    for id in [a.id, b.id] {
        let stock = harness.db.require_stock(id).unwrap();
        assert_eq!(stock.sector.as_deref(), Some("Industrials"));
        assert!(stock.has_embedding());
    }
}

#[tokio::test]
async fn test_bulk_update_rejects_unknown_ids_atomically() {
    let harness = TestHarness::new(4);
    let a = harness.db.insert_stock(&new_stock("Alpha", "ALPH")).unwrap();

    let server = server(&harness);
    let response = server
        .patch("/v1/stocks/bulk")
        .json(&json!({
            "stock_ids": [a.id, 999],
            "updates": { "sector": "Industrials" }
        }))
        .await;
    response.assert_status_not_found();

    // Nothing was applied to the stock that does exist.
    let stock = harness.db.require_stock(a.id).unwrap();
    assert_eq!(stock.sector, None);
}

#[tokio::test]
async fn test_bulk_embed_without_body_fills_gaps() {
    let harness = TestHarness::new(4);
    harness.db.insert_stock(&new_stock("Alpha", "ALPH")).unwrap();
    let b = harness.db.insert_stock(&new_stock("Beta", "BETA")).unwrap();
    harness.db.insert_stock(&new_stock("Gamma", "GAMM")).unwrap();
    harness
        .db
        .set_stock_embedding(b.id, &[0.1, 0.2, 0.3, 0.4])
        .unwrap();

    let server = server(&harness);
    let response = server.post("/v1/stocks/embeddings").await;
    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>(),
        json!({ "status": "complete", "processed": 2 })
    );
}

#[tokio::test]
async fn test_bulk_embed_with_ids_forces_refresh() {
    let harness = TestHarness::new(4);
    let stock = harness
        .db
        .insert_stock(&new_stock("Energy Corp", "ENRG"))
        .unwrap();
    harness
        .db
        .set_stock_embedding(stock.id, &[0.1, 0.2, 0.3, 0.4])
        .unwrap();

    let server = server(&harness);
    let response = server
        .post("/v1/stocks/embeddings")
        .json(&json!({ "stock_ids": [stock.id] }))
        .await;
    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>(),
        json!({ "status": "complete", "processed": 1 })
    );
    assert_eq!(harness.embedder.call_count(), 1);
}

#[tokio::test]
async fn test_extract_thesis_returns_updated_projection() {
    let extractor = Arc::new(MockExtractor::returning(ThesisAnalysis {
        catalyst: Some("new capacity online".to_string()),
        ..ThesisAnalysis::default()
    }));
    let harness = TestHarness::new(4).with_extractor(extractor);
    let stock = harness
        .db
        .insert_stock(&stock_with_thesis(
            "Energy Corp",
            "ENRG",
            "Storage demand outpaces supply",
        ))
        .unwrap();

    let server = server(&harness);
    let response = server
        .post(&format!("/v1/stocks/{}/extract-thesis", stock.id))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["thesis_analysis"]["catalyst"], "new capacity online");
    assert_eq!(
        body["thesis_analysis"]["extraction_model"],
        "mock-extractor"
    );
}

#[tokio::test]
async fn test_extract_thesis_error_paths() {
    // No thesis on the stock: the request itself is at fault.
    let harness =
        TestHarness::new(4).with_extractor(Arc::new(MockExtractor::returning(
            ThesisAnalysis::default(),
        )));
    let bare = harness
        .db
        .insert_stock(&new_stock("Energy Corp", "ENRG"))
        .unwrap();
    let server = server(&harness);
    server
        .post(&format!("/v1/stocks/{}/extract-thesis", bare.id))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    // Extractor configured but failing: upstream fault.
    let harness = TestHarness::new(4).with_extractor(Arc::new(MockExtractor::failing()));
    let stock = harness
        .db
        .insert_stock(&stock_with_thesis("Energy Corp", "ENRG", "A thesis"))
        .unwrap();
    let server = self::server(&harness);
    server
        .post(&format!("/v1/stocks/{}/extract-thesis", stock.id))
        .await
        .assert_status(StatusCode::BAD_GATEWAY);

    // No extractor configured at all.
    let harness = TestHarness::new(4);
    let stock = harness
        .db
        .insert_stock(&stock_with_thesis("Energy Corp", "ENRG", "A thesis"))
        .unwrap();
    let server = self::server(&harness);
    server
        .post(&format!("/v1/stocks/{}/extract-thesis", stock.id))
        .await
        .assert_status(StatusCode::BAD_GATEWAY);
}
