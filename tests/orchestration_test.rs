//! End-to-end orchestration tests against a stub gateway.

mod common;

use adforge::chat::ChatDirective;
use adforge::config::{Config, PollPolicyConfig};
use adforge::dispatcher::{AdDispatch, SectionDispatch};
use adforge::gateway::{DiscoveryRequest, GenerationGateway};
use adforge::orchestrator::Orchestrator;
use adforge::session::{
    AspectRatio, GenerationStatus, ProductDataPatch, Session, SessionAction, SessionPhase,
};
use common::{GenerationMode, StubGateway};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn test_config() -> Config {
    let mut config = Config::default();
    let fast = PollPolicyConfig {
        initial_delay_secs: 0,
        interval_secs: 0,
        max_attempts: 3,
    };
    config.poll.image = fast.clone();
    config.poll.video = fast;
    config
        .references
        .urls
        .push("https://cdn.example/ref/studio.jpg".to_string());
    config
}

fn orchestrator(stub: Arc<StubGateway>, config: Config) -> Orchestrator {
    let gateway: Arc<dyn GenerationGateway> = stub;
    Orchestrator::new(&config, gateway, Session::new(), None)
        .with_autopilot_cooldown(Duration::from_millis(1))
}

async fn advance_to_structure(orchestrator: &Orchestrator) {
    orchestrator
        .discover(DiscoveryRequest::from_url("https://example.com/p"))
        .await
        .unwrap();
    orchestrator.get_creative_recommendations().await.unwrap();
    orchestrator.generate_landing_proposal(0).await.unwrap();
}

#[tokio::test]
async fn discovery_to_structure_scenario() {
    let stub = Arc::new(StubGateway::new(GenerationMode::Immediate));
    let orch = orchestrator(stub, test_config());

    orch.discover(DiscoveryRequest::from_url("https://example.com/p"))
        .await
        .unwrap();
    let snapshot = orch.snapshot().await;
    assert_eq!(snapshot.phase(), SessionPhase::Discovered);
    assert_eq!(snapshot.product_data.as_ref().unwrap().name, "Aurora Mug");

    orch.get_creative_recommendations().await.unwrap();
    let snapshot = orch.snapshot().await;
    assert_eq!(snapshot.creative_paths.len(), 3);
    assert_eq!(snapshot.phase(), SessionPhase::PathsRecommended);

    orch.generate_landing_proposal(0).await.unwrap();
    let snapshot = orch.snapshot().await;
    assert_eq!(snapshot.phase(), SessionPhase::StructureProposed);
    let structure = snapshot.landing.proposed_structure.as_ref().unwrap();
    assert!(!structure.sections.is_empty());
}

#[tokio::test]
async fn autopilot_drains_queue_with_single_concurrency() {
    let stub = Arc::new(StubGateway::new(GenerationMode::Job {
        polls_until_done: 2,
    }));
    let orch = orchestrator(Arc::clone(&stub), test_config());
    advance_to_structure(&orch).await;
    orch.get_ad_concepts().await.unwrap();

    orch.start_auto_generation().await.unwrap();

    let snapshot = orch.snapshot().await;
    assert!(!snapshot.landing.auto_mode);
    assert!(snapshot.landing.auto_queue.is_empty());
    for section_id in ["hero", "offer", "testimonials"] {
        assert_eq!(
            snapshot.landing.generations[section_id].status,
            GenerationStatus::Completed,
            "section {} should be completed",
            section_id
        );
    }
    for concept_id in ["ad-1", "ad-2"] {
        assert_eq!(
            snapshot.landing.ad_generations[concept_id].status,
            GenerationStatus::Completed
        );
    }
    // The whole run never had two jobs in flight at once.
    assert_eq!(stub.max_in_flight.load(Ordering::SeqCst), 1);
    // Sections got a catalog reference; ads deliberately went out bare.
    let section_request = stub.last_section_request();
    assert_eq!(
        section_request.reference_url.as_deref(),
        Some("https://cdn.example/ref/studio.jpg")
    );
    let ad_requests = stub.ad_requests.lock().unwrap();
    assert!(ad_requests.iter().all(|r| r.reference_url.is_none()));
}

#[tokio::test]
async fn autopilot_ads_ignore_the_selected_reference() {
    let stub = Arc::new(StubGateway::new(GenerationMode::Immediate));
    let orch = orchestrator(Arc::clone(&stub), test_config());
    advance_to_structure(&orch).await;
    orch.get_ad_concepts().await.unwrap();
    orch.select_reference(Some("https://cdn.example/ref/selected.jpg".to_string()))
        .await
        .unwrap();

    orch.start_auto_generation().await.unwrap();

    // Sections honor the selection; ads still go out bare.
    let section_request = stub.last_section_request();
    assert_eq!(
        section_request.reference_url.as_deref(),
        Some("https://cdn.example/ref/selected.jpg")
    );
    let ad_requests = stub.ad_requests.lock().unwrap();
    assert!(!ad_requests.is_empty());
    assert!(ad_requests.iter().all(|r| r.reference_url.is_none()));
}

#[tokio::test]
async fn autopilot_waits_out_a_pending_manual_job() {
    let stub = Arc::new(StubGateway::new(GenerationMode::Immediate));
    let orch = Arc::new(orchestrator(Arc::clone(&stub), test_config()));
    advance_to_structure(&orch).await;
    orch.get_ad_concepts().await.unwrap();
    orch.select_reference(Some("https://cdn.example/ref/selected.jpg".to_string()))
        .await
        .unwrap();

    // A manual dispatch is still in flight when autopilot starts.
    let session = orch.session();
    session
        .write()
        .await
        .apply(SessionAction::StartSection {
            section_id: "hero".to_string(),
            aspect_ratio: AspectRatio::Landscape,
            placeholder_copy: false,
        })
        .unwrap();

    let runner = Arc::clone(&orch);
    let handle = tokio::spawn(async move { runner.start_auto_generation().await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(stub.section_requests.lock().unwrap().is_empty());
    assert!(stub.ad_requests.lock().unwrap().is_empty());

    session
        .write()
        .await
        .apply(SessionAction::SectionCompleted {
            section_id: "hero".to_string(),
            image_url: "https://img.example/manual.png".to_string(),
            copy: None,
        })
        .unwrap();

    handle.await.unwrap().unwrap();
    let snapshot = orch.snapshot().await;
    assert!(!snapshot.landing.auto_mode);
    for concept_id in ["ad-1", "ad-2"] {
        assert_eq!(
            snapshot.landing.ad_generations[concept_id].status,
            GenerationStatus::Completed
        );
    }
    assert_eq!(stub.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn continuity_resolves_to_nearest_completed_predecessor() {
    let stub = Arc::new(StubGateway::new(GenerationMode::Immediate));
    let orch = orchestrator(Arc::clone(&stub), test_config());
    advance_to_structure(&orch).await;
    orch.select_reference(Some("https://cdn.example/ref/selected.jpg".to_string()))
        .await
        .unwrap();

    orch.generate_section(SectionDispatch::fresh("hero")).await.unwrap();
    let hero_image = orch.snapshot().await.landing.generations["hero"]
        .image_url
        .clone()
        .unwrap();

    // Generate the third section while the second was never generated.
    orch.generate_section(SectionDispatch::fresh("testimonials"))
        .await
        .unwrap();
    let request = stub.last_section_request();
    assert_eq!(request.continuity_image.as_deref(), Some(hero_image.as_str()));
    assert_ne!(
        request.continuity_image.as_deref(),
        Some("https://img.example/base.png")
    );
}

#[tokio::test]
async fn first_section_continuity_falls_back_to_identity_anchor() {
    let stub = Arc::new(StubGateway::new(GenerationMode::Immediate));
    let orch = orchestrator(Arc::clone(&stub), test_config());
    advance_to_structure(&orch).await;
    orch.select_reference(Some("https://cdn.example/ref/selected.jpg".to_string()))
        .await
        .unwrap();

    orch.generate_section(SectionDispatch::fresh("hero")).await.unwrap();
    let request = stub.last_section_request();
    assert_eq!(
        request.continuity_image.as_deref(),
        Some("https://img.example/base.png")
    );
    assert_eq!(
        request.base_image_url.as_deref(),
        Some("https://img.example/base.png")
    );
}

#[tokio::test]
async fn correction_uses_current_output_over_selected_reference() {
    let stub = Arc::new(StubGateway::new(GenerationMode::Immediate));
    let orch = orchestrator(Arc::clone(&stub), test_config());
    advance_to_structure(&orch).await;
    orch.select_reference(Some("https://cdn.example/ref/selected.jpg".to_string()))
        .await
        .unwrap();

    orch.generate_section(SectionDispatch::fresh("hero")).await.unwrap();
    let hero_image = orch.snapshot().await.landing.generations["hero"]
        .image_url
        .clone()
        .unwrap();

    let correction = SectionDispatch {
        is_correction: true,
        extra_instructions: Some("More steam".to_string()),
        ..SectionDispatch::fresh("hero")
    };
    orch.generate_section(correction).await.unwrap();

    let request = stub.last_section_request();
    assert!(request.is_correction);
    assert_eq!(request.reference_url.as_deref(), Some(hero_image.as_str()));
    assert_eq!(request.previous_image_url.as_deref(), Some(hero_image.as_str()));
}

#[tokio::test]
async fn poll_timeout_marks_record_failed() {
    let stub = Arc::new(StubGateway::new(GenerationMode::NeverDone));
    let orch = orchestrator(stub, test_config());
    advance_to_structure(&orch).await;
    orch.select_reference(Some("https://cdn.example/ref/selected.jpg".to_string()))
        .await
        .unwrap();

    orch.generate_section(SectionDispatch::fresh("hero")).await.unwrap();

    let snapshot = orch.snapshot().await;
    assert_eq!(
        snapshot.landing.generations["hero"].status,
        GenerationStatus::Failed
    );
    assert!(snapshot
        .error
        .as_deref()
        .unwrap()
        .contains("longer than expected"));
}

#[tokio::test]
async fn gateway_reported_failure_surfaces_its_message() {
    let stub = Arc::new(StubGateway::new(GenerationMode::JobFails {
        message: "content policy rejection".to_string(),
    }));
    let orch = orchestrator(stub, test_config());
    advance_to_structure(&orch).await;
    orch.select_reference(Some("https://cdn.example/ref/selected.jpg".to_string()))
        .await
        .unwrap();

    orch.generate_section(SectionDispatch::fresh("hero")).await.unwrap();

    let snapshot = orch.snapshot().await;
    assert_eq!(
        snapshot.landing.generations["hero"].status,
        GenerationStatus::Failed
    );
    assert_eq!(
        snapshot.error.as_deref(),
        Some("content policy rejection")
    );
}

#[tokio::test]
async fn request_level_failure_marks_target_failed() {
    let stub = Arc::new(StubGateway::new(GenerationMode::RequestError {
        message: "out of credits".to_string(),
    }));
    let orch = orchestrator(stub, test_config());
    advance_to_structure(&orch).await;
    orch.select_reference(Some("https://cdn.example/ref/selected.jpg".to_string()))
        .await
        .unwrap();

    orch.generate_section(SectionDispatch::fresh("hero")).await.unwrap();

    let snapshot = orch.snapshot().await;
    assert_eq!(
        snapshot.landing.generations["hero"].status,
        GenerationStatus::Failed
    );
    assert!(snapshot.error.as_deref().unwrap().contains("out of credits"));
}

#[tokio::test]
async fn autopilot_is_a_noop_without_structure() {
    let stub = Arc::new(StubGateway::new(GenerationMode::Immediate));
    let orch = orchestrator(stub, test_config());
    orch.discover(DiscoveryRequest::from_url("https://example.com/p"))
        .await
        .unwrap();
    orch.get_creative_recommendations().await.unwrap();

    orch.start_auto_generation().await.unwrap();

    let snapshot = orch.snapshot().await;
    assert!(!snapshot.landing.auto_mode);
    assert!(snapshot.landing.generations.is_empty());
}

#[tokio::test]
async fn fresh_generation_without_reference_is_silently_skipped() {
    let stub = Arc::new(StubGateway::new(GenerationMode::Immediate));
    let orch = orchestrator(Arc::clone(&stub), test_config());
    advance_to_structure(&orch).await;
    // No reference selected, no explicit reference supplied.

    orch.generate_section(SectionDispatch::fresh("hero")).await.unwrap();

    let snapshot = orch.snapshot().await;
    assert!(snapshot.landing.generations.is_empty());
    assert!(snapshot.error.is_none());
    assert!(stub.section_requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn manual_ad_generation_completes() {
    let stub = Arc::new(StubGateway::new(GenerationMode::Immediate));
    let orch = orchestrator(Arc::clone(&stub), test_config());
    advance_to_structure(&orch).await;
    orch.get_ad_concepts().await.unwrap();

    orch.generate_ad_image(AdDispatch::fresh("ad-1")).await.unwrap();

    let snapshot = orch.snapshot().await;
    assert_eq!(snapshot.phase(), SessionPhase::AdsProposed);
    assert_eq!(
        snapshot.landing.ad_generations["ad-1"].status,
        GenerationStatus::Completed
    );
}

#[tokio::test]
async fn video_flow_completes_from_a_finished_section() {
    let stub = Arc::new(StubGateway::new(GenerationMode::Immediate));
    let orch = orchestrator(stub, test_config());
    advance_to_structure(&orch).await;
    orch.select_reference(Some("https://cdn.example/ref/selected.jpg".to_string()))
        .await
        .unwrap();
    orch.generate_section(SectionDispatch::fresh("hero")).await.unwrap();

    orch.generate_video("hero", None).await.unwrap();

    let snapshot = orch.snapshot().await;
    assert_eq!(
        snapshot.landing.video_generations["hero"].status,
        GenerationStatus::Completed
    );
    assert!(snapshot.landing.video_generations["hero"].video_url.is_some());
}

#[tokio::test]
async fn video_without_completed_section_is_skipped() {
    let stub = Arc::new(StubGateway::new(GenerationMode::Immediate));
    let orch = orchestrator(stub, test_config());
    advance_to_structure(&orch).await;

    orch.generate_video("hero", None).await.unwrap();

    let snapshot = orch.snapshot().await;
    assert!(snapshot.landing.video_generations.is_empty());
    assert!(snapshot.error.is_none());
}

#[tokio::test]
async fn completed_generation_refreshes_credit_balance() {
    let stub = Arc::new(StubGateway::new(GenerationMode::Immediate));
    let orch = orchestrator(stub, test_config());
    advance_to_structure(&orch).await;
    orch.select_reference(Some("https://cdn.example/ref/selected.jpg".to_string()))
        .await
        .unwrap();

    orch.generate_section(SectionDispatch::fresh("hero")).await.unwrap();
    // The refresh is fire-and-forget; give the spawned task a beat.
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(orch.snapshot().await.credits, Some(42));
}

#[tokio::test]
async fn chat_directive_updates_product_dna() {
    let stub = Arc::new(
        StubGateway::new(GenerationMode::Immediate).with_chat_reply(
            "Updated the angle for you.",
            Some(ChatDirective::UpdateDna(ProductDataPatch {
                angle: Some("Now with a steel core".to_string()),
                ..Default::default()
            })),
        ),
    );
    let orch = orchestrator(stub, test_config());
    orch.discover(DiscoveryRequest::from_url("https://example.com/p"))
        .await
        .unwrap();

    let reply = orch.chat("Change the angle".to_string()).await.unwrap();
    assert_eq!(reply.as_deref(), Some("Updated the angle for you."));
    assert_eq!(
        orch.snapshot().await.product_data.unwrap().angle,
        "Now with a steel core"
    );
}

#[tokio::test]
async fn chat_directive_attaches_section_instructions() {
    let stub = Arc::new(
        StubGateway::new(GenerationMode::Immediate).with_chat_reply(
            "Noted.",
            Some(ChatDirective::UpdateSection {
                section_id: "hero".to_string(),
                extra_instructions: "Less text, bigger product".to_string(),
            }),
        ),
    );
    let orch = orchestrator(stub, test_config());
    advance_to_structure(&orch).await;

    orch.chat("Tweak the hero".to_string()).await.unwrap();

    let snapshot = orch.snapshot().await;
    let structure = snapshot.landing.proposed_structure.as_ref().unwrap();
    assert_eq!(
        structure.section("hero").unwrap().extra_instructions.as_deref(),
        Some("Less text, bigger product")
    );
}

#[tokio::test]
async fn rediscovery_restarts_the_pipeline() {
    let stub = Arc::new(StubGateway::new(GenerationMode::Immediate));
    let orch = orchestrator(stub, test_config());
    advance_to_structure(&orch).await;

    orch.discover(DiscoveryRequest::from_url("https://example.com/other"))
        .await
        .unwrap();

    let snapshot = orch.snapshot().await;
    assert_eq!(snapshot.phase(), SessionPhase::Discovered);
    assert!(snapshot.creative_paths.is_empty());
    assert!(snapshot.landing.proposed_structure.is_none());
}
