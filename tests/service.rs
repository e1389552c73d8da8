//! End-to-end behavior of the service contract against a mock publishing
//! site: the §8-style scenarios (summary-only bills, fiscal totals, unknown
//! bills), cache idempotence and invalidation, request deduplication, and
//! the "still processing" reply.

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use httpmock::prelude::*;
use serde_json::Value;

use billscope::service::BillAnalysisService;

const FISCAL_REPLY: &str = r#"{"fiscal_note_summary": "The program costs $762,500 in each of fiscal years 2026 and 2027, all from General Revenue, with two additional FTEs.", "total_fiscal_impact": -1525000.0}"#;

/// Mock the HEAD probe and GET download for a bill's primary candidate URL.
async fn mock_bill<'a>(server: &'a MockServer, canonical: &str, text: &str) -> httpmock::Mock<'a> {
    let path = format!("/89R/pdf/TX89R{canonical}FIL.pdf");
    let head_path = path.clone();
    server
        .mock_async(move |when, then| {
            when.method(HEAD).path(head_path);
            then.status(200);
        })
        .await;
    let body = common::minimal_pdf(text);
    server
        .mock_async(move |when, then| {
            when.method(GET).path(path);
            then.status(200).body(body);
        })
        .await
}

/// Mock the fiscal note at its primary candidate URL.
async fn mock_fiscal_note<'a>(
    server: &'a MockServer,
    canonical: &str,
    text: &str,
) -> httpmock::Mock<'a> {
    let path = format!("/89R/fnote/TX89R{canonical}FIL.pdf");
    let head_path = path.clone();
    server
        .mock_async(move |when, then| {
            when.method(HEAD).path(head_path);
            then.status(200);
        })
        .await;
    let body = common::minimal_pdf(text);
    server
        .mock_async(move |when, then| {
            when.method(GET).path(path);
            then.status(200).body(body);
        })
        .await
}

#[tokio::test]
async fn bill_without_fiscal_note_yields_summary_only() {
    let server = MockServer::start_async().await;
    // The text is fiscally relevant, so the note is chased; every fiscal
    // candidate answers 404 and the analysis continues without one.
    mock_bill(
        &server,
        "HB00179",
        "SECTION 1. The cost of program administration is borne by participants.",
    )
    .await;
    let model = common::scripted("Shifts administration costs to participants.", FISCAL_REPLY);
    let service =
        BillAnalysisService::new(common::test_config(&server), model.clone()).unwrap();

    let value = service.analyze_structured("HB 179").await;
    assert_eq!(value["success"], Value::Bool(true));
    assert!(!value["bill_summary"].as_str().unwrap().is_empty());
    assert_eq!(value["fiscal_note_summary"], Value::Null);
    assert_eq!(value["total_fiscal_impact"], Value::Null);
    assert_eq!(value["fiscal_note_url"], Value::Null);
    assert_eq!(value["has_fiscal_note"], Value::Bool(false));
    assert!(value["bill_url"].as_str().unwrap().contains("HB00179"));
    assert_eq!(model.fiscal_calls(), 0);

    service.shutdown().await;
}

#[tokio::test]
async fn bill_with_fiscal_note_extracts_total() {
    let server = MockServer::start_async().await;
    mock_bill(
        &server,
        "HB00103",
        "SECTION 1. An appropriation is made for the grant program established by this Act.",
    )
    .await;
    mock_fiscal_note(
        &server,
        "HB00103",
        "Estimated two-year net impact to General Revenue: a negative ($1,525,000).",
    )
    .await;
    let model = common::scripted("Establishes a grant program with state funding.", FISCAL_REPLY);
    let service = BillAnalysisService::new(common::test_config(&server), model).unwrap();

    let value = service.analyze_structured("HB 103").await;
    assert_eq!(value["success"], Value::Bool(true));
    assert!(!value["bill_summary"].as_str().unwrap().is_empty());
    assert!(!value["fiscal_note_summary"].as_str().unwrap().is_empty());
    let total = value["total_fiscal_impact"].as_f64().unwrap();
    assert!((total + 1_525_000.0).abs() < 1_000.0, "total was {total}");
    assert!(value["bill_url"].as_str().unwrap().contains("/pdf/"));
    assert!(value["fiscal_note_url"].as_str().unwrap().contains("/fnote/"));

    let reply = service.analyze("hb103").await;
    assert!(reply.success);
    assert!(reply.response.contains("Estimated total impact: -$1,525,000.00"));

    service.shutdown().await;
}

#[tokio::test]
async fn nonexistent_bill_is_reported_not_found() {
    let server = MockServer::start_async().await;
    // No mocks: every candidate probe answers 404.
    let model = common::scripted("unused", "unused");
    let service =
        BillAnalysisService::new(common::test_config(&server), model.clone()).unwrap();

    let reply = service.analyze("HB 99999").await;
    assert!(!reply.success);
    assert!(reply.response.contains("could not be found"));
    assert_eq!(model.calls(), 0);

    // The failure released the in-flight marker, so a retry goes through the
    // whole resolution again instead of hanging on a stale slot.
    assert_eq!(service.health().inflight, 0);
    let retry = service.analyze_structured("HB 99999").await;
    assert_eq!(retry["success"], Value::Bool(false));
    assert_eq!(retry["error_kind"], Value::String("bill_not_found".into()));

    service.shutdown().await;
}

#[tokio::test]
async fn invalid_references_fail_without_touching_the_network() {
    let server = MockServer::start_async().await;
    let model = common::scripted("unused", "unused");
    let service = BillAnalysisService::new(common::test_config(&server), model).unwrap();

    let value = service.analyze_structured("not a bill").await;
    assert_eq!(value["success"], Value::Bool(false));
    assert_eq!(
        value["error_kind"],
        Value::String("invalid_identifier".into())
    );
    assert!(value["error"].as_str().unwrap().contains("HB 150"));

    service.shutdown().await;
}

#[tokio::test]
async fn second_analysis_is_served_from_cache() {
    let server = MockServer::start_async().await;
    let download = mock_bill(
        &server,
        "HB00150",
        "SECTION 1. Relating to the regulation of community gardens.",
    )
    .await;
    let model = common::scripted("Regulates community gardens.", FISCAL_REPLY);
    let service =
        BillAnalysisService::new(common::test_config(&server), model.clone()).unwrap();

    let first = service.analyze_structured("HB 150").await;
    let hits_before = service.cache_stats().hits;

    // A differently spelled reference normalizes to the same entry.
    let second = service.analyze_structured("House Bill 150").await;
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap(),
        "cached payload must be byte-identical"
    );

    // No second fetch or model invocation took place.
    assert_eq!(download.hits(), 1);
    assert_eq!(model.calls(), 1);
    assert_eq!(service.cache_stats().hits, hits_before + 1);

    service.shutdown().await;
}

#[tokio::test]
async fn invalidation_forces_a_fresh_analysis() {
    let server = MockServer::start_async().await;
    let download = mock_bill(
        &server,
        "HB00150",
        "SECTION 1. Relating to the regulation of community gardens.",
    )
    .await;
    let model = common::scripted("Regulates community gardens.", FISCAL_REPLY);
    let service =
        BillAnalysisService::new(common::test_config(&server), model.clone()).unwrap();

    assert!(service.analyze("HB 150").await.success);
    assert_eq!(download.hits(), 1);

    assert!(service.cache_invalidate("hb 150").success);
    let misses_before = service.cache_stats().misses;

    assert!(service.analyze("HB 150").await.success);
    assert_eq!(download.hits(), 2, "invalidation must force a re-fetch");
    assert_eq!(model.calls(), 2);
    assert!(service.cache_stats().misses > misses_before);

    // Invalidating an entry that does not exist reports failure.
    assert!(!service.cache_invalidate("SB 9999").success);
    assert!(!service.cache_invalidate("gibberish").success);

    service.shutdown().await;
}

#[tokio::test]
async fn concurrent_requests_share_one_analysis() {
    let server = MockServer::start_async().await;
    let download = mock_bill(
        &server,
        "HB00777",
        "SECTION 1. Relating to the designation of an official state pastry.",
    )
    .await;
    let model = Arc::new(
        common::ScriptedModel::new("Designates a state pastry.", FISCAL_REPLY)
            .with_delay(Duration::from_millis(150)),
    );
    let service = Arc::new(
        BillAnalysisService::new(common::test_config(&server), model.clone()).unwrap(),
    );

    let replies = join_all((0..4).map(|_| {
        let service = Arc::clone(&service);
        async move { service.analyze("HB 777").await }
    }))
    .await;

    // Exactly one fetch and one model invocation served all four callers.
    assert_eq!(download.hits(), 1);
    assert_eq!(model.calls(), 1);
    for reply in &replies {
        assert!(reply.success);
        assert_eq!(reply.response, replies[0].response);
    }
    assert_eq!(service.health().inflight, 0);

    match Arc::try_unwrap(service) {
        Ok(service) => service.shutdown().await,
        Err(_) => panic!("service still shared"),
    }
}

#[tokio::test]
async fn slow_analysis_yields_a_still_processing_reply() {
    let server = MockServer::start_async().await;
    mock_bill(
        &server,
        "HB00888",
        "SECTION 1. Relating to the licensing of balloon artists.",
    )
    .await;
    let model = Arc::new(
        common::ScriptedModel::new("Licenses balloon artists.", FISCAL_REPLY)
            .with_delay(Duration::from_millis(400)),
    );
    let config = common::test_config(&server).with_sync_wait(Duration::from_millis(50));
    let service = Arc::new(BillAnalysisService::new(config, model).unwrap());

    let owner = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.analyze("HB 888").await })
    };
    // Let the owner claim the slot and get stuck in the model call.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let waiter = service.analyze_structured("HB 888").await;
    assert_eq!(waiter["success"], Value::Bool(false));
    assert_eq!(
        waiter["error_kind"],
        Value::String("analysis_pending".into())
    );
    assert!(waiter["error"].as_str().unwrap().contains("still running"));

    // Once the owner lands, a retry is served from cache.
    assert!(owner.await.unwrap().success);
    let retry = service.analyze_structured("HB 888").await;
    assert_eq!(retry["success"], Value::Bool(true));

    match Arc::try_unwrap(service) {
        Ok(service) => service.shutdown().await,
        Err(_) => panic!("service still shared"),
    }
}

#[tokio::test]
async fn oversized_documents_are_analyzed_by_a_background_worker() {
    let server = MockServer::start_async().await;
    let text = "SECTION 1. Relating to the biennial appropriation for state parks.";
    let body = common::minimal_pdf(text);
    // A HEAD response with a body advertises its Content-Length; the body
    // itself is suppressed on the wire.
    let head_body = body.clone();
    server
        .mock_async(move |when, then| {
            when.method(HEAD).path("/89R/pdf/TX89RHB00042FIL.pdf");
            then.status(200).body(head_body);
        })
        .await;
    server
        .mock_async(move |when, then| {
            when.method(GET).path("/89R/pdf/TX89RHB00042FIL.pdf");
            then.status(200).body(body);
        })
        .await;

    let model = common::scripted("Appropriates park funding.", FISCAL_REPLY);
    let config = common::test_config(&server).with_background_threshold(10);
    let service = BillAnalysisService::new(config, model).unwrap();

    let reply = service.analyze("HB 42").await;
    assert!(reply.success, "background path failed: {}", reply.response);
    assert_eq!(service.health().cache_entries, 1);

    service.shutdown().await;
}

#[tokio::test]
async fn health_reports_shared_state_and_model_configuration() {
    let server = MockServer::start_async().await;
    let model = common::scripted("unused", "unused");
    let service = BillAnalysisService::new(common::test_config(&server), model).unwrap();

    let report = service.health();
    assert!(report.ok);
    assert_eq!(report.cache_entries, 0);
    assert_eq!(report.inflight, 0);
    assert!(report.model_configured);

    service.shutdown().await;
}
