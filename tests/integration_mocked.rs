/// Integration tests with a mocked lead backend
/// Exercises the load, rescore, message and interaction flows end to end
use sales_lead_dashboard::config::{Config, FailurePolicy};
use sales_lead_dashboard::dashboard::LoadStatus;
use sales_lead_dashboard::errors::AppError;
use sales_lead_dashboard::gateway_client::{CallOptions, LeadApiClient};
use sales_lead_dashboard::lifecycle::{ActionOutcome, ActionState, EditorKind, LeadAction};
use sales_lead_dashboard::models::{Direction, InteractionDraft, NewLead, Stage, Weights};
use sales_lead_dashboard::session::DashboardSession;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper function to create test config
fn create_test_config(api_url: String, failure_policy: FailurePolicy) -> Config {
    Config {
        api_url,
        port: 3000,
        notification_ttl_ms: 3000,
        failure_policy,
    }
}

fn acme_leads() -> serde_json::Value {
    json!([
        {"id": 1, "name": "Acme", "company": "Acme Corp", "budget": "5000", "stage": "potential_lead"},
        {"id": 2, "name": "Globex", "company": "Globex Inc", "budget": 12000.0, "stage": "response_received", "score": 6.5}
    ])
}

/// Starts a backend serving `acme_leads` and a session that already loaded them.
async fn loaded_session(policy: FailurePolicy) -> (MockServer, DashboardSession) {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/leads"))
        .respond_with(ResponseTemplate::new(200).set_body_json(acme_leads()))
        .mount(&mock_server)
        .await;

    let session =
        DashboardSession::from_config(&create_test_config(mock_server.uri(), policy)).unwrap();
    session.reload().await.unwrap();

    (mock_server, session)
}

#[tokio::test]
async fn test_initial_load_populates_store() {
    let (_server, session) = loaded_session(FailurePolicy::default()).await;

    assert_eq!(session.status().await, LoadStatus::Ready);
    let store = session.store().read().await;
    assert_eq!(store.len(), 2);
    assert_eq!(store.get(1).unwrap().name, "Acme");
}

#[tokio::test]
async fn test_load_failure_then_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/leads"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let session = DashboardSession::from_config(&create_test_config(
        mock_server.uri(),
        FailurePolicy::default(),
    ))
    .unwrap();

    let err = session.reload().await.unwrap_err();
    assert!(err.is_transport_failure());
    assert_eq!(err.status(), Some(503));
    assert_eq!(
        session.status().await,
        LoadStatus::Failed {
            error: "HTTP error! status: 503".to_string()
        }
    );

    mock_server.reset().await;
    Mock::given(method("GET"))
        .and(path("/leads"))
        .respond_with(ResponseTemplate::new(200).set_body_json(acme_leads()))
        .mount(&mock_server)
        .await;

    assert_eq!(session.reload().await.unwrap(), 2);
    assert_eq!(session.status().await, LoadStatus::Ready);
}

#[tokio::test]
async fn test_unreachable_backend_is_transport_failure() {
    // Nothing listens on port 9 locally.
    let client = LeadApiClient::new("http://127.0.0.1:9").unwrap();
    let err = client.fetch_leads(None).await.unwrap_err();

    assert!(matches!(err, AppError::Transport(_)));
    assert!(err.is_transport_failure());
}

#[tokio::test]
async fn test_search_is_sent_as_query_param() {
    let (mock_server, session) = loaded_session(FailurePolicy::default()).await;

    // The catch-all `/leads` mock would also match a search request.
    mock_server.reset().await;
    Mock::given(method("GET"))
        .and(path("/leads"))
        .and(query_param("search", "acme corp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "name": "Acme", "company": "Acme Corp", "budget": "5000"}
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    assert_eq!(session.set_search("acme corp").await.unwrap(), 1);
    assert_eq!(session.search().await, "acme corp");
}

#[tokio::test]
async fn test_rescore_scenario_updates_only_score() {
    let (mock_server, session) = loaded_session(FailurePolicy::default()).await;
    let controller = session.controller();

    Mock::given(method("POST"))
        .and(path("/leads/1/score"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"weights": {"budget": 0.5}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "score": 7})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let before = session.store().read().await.get(1).cloned().unwrap();
    controller.open_editor(EditorKind::Rescore, 1);
    controller.update_weights(
        1,
        Weights {
            budget: Some(0.5),
            ..Default::default()
        },
    );

    let outcome = controller.submit_rescore(1).await.unwrap();
    assert_eq!(
        outcome,
        ActionOutcome::ScoreUpdated {
            lead_id: 1,
            score: 7.0
        }
    );

    let after = session.store().read().await.get(1).cloned().unwrap();
    assert_eq!(after.score, Some(7.0));
    assert_eq!(after.stage, Some(Stage::PotentialLead));

    let mut expected = before;
    expected.score = Some(7.0);
    assert_eq!(after, expected);

    assert_eq!(controller.pending_weights(1), Weights::default());
    assert!(!controller.is_busy(LeadAction::Rescore, 1));
    assert!(controller.open_editors().is_empty());
}

#[tokio::test]
async fn test_rescore_without_weights_sends_nothing() {
    let (mock_server, session) = loaded_session(FailurePolicy::default()).await;
    let controller = session.controller();

    Mock::given(method("POST"))
        .and(path("/leads/1/score"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"score": 9})))
        .expect(0)
        .mount(&mock_server)
        .await;

    controller.open_editor(EditorKind::Rescore, 1);
    let outcome = controller.submit_rescore(1).await.unwrap();

    assert!(matches!(outcome, ActionOutcome::Suppressed { lead_id: 1, .. }));
    assert_eq!(controller.open_editors().get(&EditorKind::Rescore), Some(&1));
}

#[tokio::test]
async fn test_rescore_with_only_zero_weights_sends_nothing() {
    let (mock_server, session) = loaded_session(FailurePolicy::default()).await;
    let controller = session.controller();

    Mock::given(method("POST"))
        .and(path("/leads/1/score"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"score": 3})))
        .expect(0)
        .mount(&mock_server)
        .await;

    controller.open_editor(EditorKind::Rescore, 1);
    controller.update_weights(
        1,
        Weights {
            budget: Some(0.0),
            ..Default::default()
        },
    );
    let before = session.store().read().await.snapshot();

    let outcome = controller.submit_rescore(1).await.unwrap();

    assert!(matches!(outcome, ActionOutcome::Suppressed { lead_id: 1, .. }));
    assert_eq!(controller.open_editors().get(&EditorKind::Rescore), Some(&1));
    assert_eq!(*session.store().read().await.snapshot(), *before);
}

#[tokio::test]
async fn test_failed_rescore_keeps_score_and_clears_busy() {
    let (mock_server, session) = loaded_session(FailurePolicy::default()).await;
    let controller = session.controller();

    Mock::given(method("POST"))
        .and(path("/leads/2/score"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let weights = Weights {
        industry: Some(0.3),
        needs: Some(0.7),
        ..Default::default()
    };
    controller.update_weights(2, weights);
    let before = session.store().read().await.snapshot();

    let outcome = controller.submit_rescore(2).await.unwrap();

    assert!(matches!(outcome, ActionOutcome::Failed { lead_id: 2, .. }));
    assert_eq!(*session.store().read().await.snapshot(), *before);
    assert_eq!(
        session.store().read().await.get(2).unwrap().score,
        Some(6.5)
    );
    assert!(!controller.is_busy(LeadAction::Rescore, 2));
    assert_eq!(
        controller.tracker(LeadAction::Rescore).state(2),
        ActionState::Idle
    );
    // Weights are only cleared on success.
    assert_eq!(controller.pending_weights(2), weights);
}

#[tokio::test]
async fn test_surface_policy_returns_error() {
    let (mock_server, session) = loaded_session(FailurePolicy::Surface).await;
    let controller = session.controller();

    Mock::given(method("POST"))
        .and(path("/leads/1/message"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&mock_server)
        .await;

    let err = controller.generate_message(1).await.unwrap_err();

    assert_eq!(err.status(), Some(502));
    assert!(matches!(
        controller.tracker(LeadAction::Message).state(1),
        ActionState::Failed { .. }
    ));
    assert_eq!(session.store().read().await.get(1).unwrap().last_message, None);
}

#[tokio::test]
async fn test_generate_message_overwrites_last_message() {
    let (mock_server, session) = loaded_session(FailurePolicy::default()).await;
    let controller = session.controller();

    Mock::given(method("POST"))
        .and(path("/leads/2/message"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Hi Globex, following up on your needs.",
            "evaluation": {
                "score": 50,
                "checks": {"personalization": true, "relevance": false},
                "recommendations": ["Incorporate lead's specific needs for relevance."]
            }
        })))
        .mount(&mock_server)
        .await;

    session.store().write().await.patch_message(2, "old message");

    let outcome = controller.generate_message(2).await.unwrap();

    match outcome {
        ActionOutcome::MessageUpdated {
            lead_id,
            message,
            evaluation,
        } => {
            assert_eq!(lead_id, 2);
            assert_eq!(message, "Hi Globex, following up on your needs.");
            let evaluation = evaluation.unwrap();
            assert_eq!(evaluation.score, 50.0);
            assert_eq!(evaluation.checks.get("personalization"), Some(&true));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    let lead = session.store().read().await.get(2).cloned().unwrap();
    assert_eq!(
        lead.last_message.as_deref(),
        Some("Hi Globex, following up on your needs.")
    );
    assert_eq!(lead.stage, Some(Stage::ResponseReceived));
}

#[tokio::test]
async fn test_inbound_interaction_moves_to_response_received() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/leads"))
        .respond_with(ResponseTemplate::new(200).set_body_json(acme_leads()))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/add_interaction/1"))
        .and(body_partial_json(json!({"message": "hello", "direction": "inbound"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(mock_server.uri(), FailurePolicy::default());
    config.notification_ttl_ms = 100;
    let session = DashboardSession::from_config(&config).unwrap();
    session.reload().await.unwrap();
    let controller = session.controller();

    controller.open_editor(EditorKind::Interaction, 1);
    controller.update_interaction(
        1,
        InteractionDraft {
            message: "hello".to_string(),
            direction: Some(Direction::Inbound),
        },
    );

    let outcome = controller.submit_interaction(1).await.unwrap();

    let (stage, notification) = match outcome {
        ActionOutcome::StageUpdated {
            stage,
            notification,
            ..
        } => (stage, notification),
        other => panic!("expected a stage update, got {:?}", other),
    };
    assert_eq!(stage, Stage::ResponseReceived);
    assert_eq!(
        notification.text,
        "Interaction added! Lead stage updated to Response Received"
    );
    assert_eq!(
        session.store().read().await.get(1).unwrap().stage,
        Some(Stage::ResponseReceived)
    );
    assert_eq!(controller.pending_interaction(1), InteractionDraft::default());
    assert!(controller.open_editors().is_empty());
    assert_eq!(controller.notifier().active().len(), 1);

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(controller.notifier().active().is_empty());
}

#[tokio::test]
async fn test_outbound_interaction_reverts_responded_lead() {
    let (mock_server, session) = loaded_session(FailurePolicy::default()).await;
    let controller = session.controller();

    Mock::given(method("POST"))
        .and(path("/add_interaction/2"))
        .and(body_partial_json(json!({"direction": "outbound"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
        .mount(&mock_server)
        .await;

    controller.update_interaction(
        2,
        InteractionDraft {
            message: "checking in".to_string(),
            direction: Some(Direction::Outbound),
        },
    );
    controller.submit_interaction(2).await.unwrap();

    assert_eq!(
        session.store().read().await.get(2).unwrap().stage,
        Some(Stage::ReachedOut)
    );
}

#[tokio::test]
async fn test_empty_interaction_never_hits_backend() {
    let (mock_server, session) = loaded_session(FailurePolicy::default()).await;
    let controller = session.controller();

    Mock::given(method("POST"))
        .and(path("/add_interaction/1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    controller.open_editor(EditorKind::Interaction, 1);
    controller.update_interaction(
        1,
        InteractionDraft {
            message: String::new(),
            direction: Some(Direction::Outbound),
        },
    );

    let outcome = controller.submit_interaction(1).await.unwrap();

    assert!(matches!(outcome, ActionOutcome::Suppressed { lead_id: 1, .. }));
    assert_eq!(
        session.store().read().await.get(1).unwrap().stage,
        Some(Stage::PotentialLead)
    );
    assert_eq!(controller.open_editors().get(&EditorKind::Interaction), Some(&1));
    assert!(controller.notifier().active().is_empty());
}

#[tokio::test]
async fn test_failed_interaction_dismisses_editor_without_notification() {
    let (mock_server, session) = loaded_session(FailurePolicy::default()).await;
    let controller = session.controller();

    Mock::given(method("POST"))
        .and(path("/add_interaction/1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    controller.open_editor(EditorKind::Interaction, 1);
    controller.update_interaction(
        1,
        InteractionDraft {
            message: "hello".to_string(),
            direction: Some(Direction::Inbound),
        },
    );

    let outcome = controller.submit_interaction(1).await.unwrap();

    assert!(matches!(outcome, ActionOutcome::Failed { lead_id: 1, .. }));
    assert!(controller.open_editors().is_empty());
    assert!(controller.notifier().active().is_empty());
    assert_eq!(
        session.store().read().await.get(1).unwrap().stage,
        Some(Stage::PotentialLead)
    );
    assert_eq!(controller.pending_interaction(1).message, "hello");
}

#[tokio::test]
async fn test_double_submit_on_same_lead_is_refused() {
    let (mock_server, session) = loaded_session(FailurePolicy::default()).await;
    let controller = session.controller();

    Mock::given(method("POST"))
        .and(path("/leads/1/score"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"score": 8}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    controller.update_weights(
        1,
        Weights {
            needs: Some(1.0),
            ..Default::default()
        },
    );

    let (first, second) = tokio::join!(controller.submit_rescore(1), controller.submit_rescore(1));

    assert_eq!(
        first.unwrap(),
        ActionOutcome::ScoreUpdated {
            lead_id: 1,
            score: 8.0
        }
    );
    assert_eq!(second.unwrap(), ActionOutcome::Busy { lead_id: 1 });
}

#[tokio::test]
async fn test_actions_on_different_leads_run_concurrently() {
    let (mock_server, session) = loaded_session(FailurePolicy::default()).await;
    let controller = session.controller();

    for id in [1, 2] {
        Mock::given(method("POST"))
            .and(path(format!("/leads/{}/message", id)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"message": format!("hello {}", id)}))
                    .set_delay(Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let (a, b) = tokio::join!(controller.generate_message(1), controller.generate_message(2));
    assert!(matches!(a.unwrap(), ActionOutcome::MessageUpdated { lead_id: 1, .. }));
    assert!(matches!(b.unwrap(), ActionOutcome::MessageUpdated { lead_id: 2, .. }));

    let store = session.store().read().await;
    assert_eq!(store.get(1).unwrap().last_message.as_deref(), Some("hello 1"));
    assert_eq!(store.get(2).unwrap().last_message.as_deref(), Some("hello 2"));
}

#[tokio::test]
async fn test_rescore_of_unknown_lead_leaves_store_unchanged() {
    let (mock_server, session) = loaded_session(FailurePolicy::default()).await;
    let controller = session.controller();

    Mock::given(method("POST"))
        .and(path("/leads/42/score"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"score": 3})))
        .mount(&mock_server)
        .await;

    let before = session.store().read().await.snapshot();
    controller.update_weights(
        42,
        Weights {
            budget: Some(0.2),
            ..Default::default()
        },
    );
    controller.submit_rescore(42).await.unwrap();

    let after = session.store().read().await.snapshot();
    assert_eq!(after.len(), 2);
    assert_eq!(*after, *before);
}

#[tokio::test]
async fn test_create_lead_reloads_collection() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/leads"))
        .and(body_json(json!({
            "name": "Initech",
            "company": "Initech LLC",
            "industry": "Software",
            "budget": 25000.0,
            "needs": "TPS report automation"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 3, "score": 8})))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/leads"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 3, "name": "Initech", "company": "Initech LLC", "budget": 25000.0, "score": 8, "stage": "potential_lead"}
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let session = DashboardSession::from_config(&create_test_config(
        mock_server.uri(),
        FailurePolicy::default(),
    ))
    .unwrap();

    let created = session
        .create_lead(NewLead {
            name: "Initech".to_string(),
            company: "Initech LLC".to_string(),
            industry: "Software".to_string(),
            budget: 25000.0,
            needs: "TPS report automation".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(created.id, 3);
    assert_eq!(created.score, Some(8.0));
    assert_eq!(session.store().read().await.len(), 1);
    assert_eq!(session.status().await, LoadStatus::Ready);
}

#[tokio::test]
async fn test_call_merges_caller_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .and(header("content-type", "application/json"))
        .and(header("x-request-source", "dashboard"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = LeadApiClient::new(mock_server.uri()).unwrap();
    let body = client
        .call(
            "/health",
            CallOptions::get().header("X-Request-Source", "dashboard"),
        )
        .await
        .unwrap();

    assert_eq!(body, json!({"status": "healthy"}));
}
