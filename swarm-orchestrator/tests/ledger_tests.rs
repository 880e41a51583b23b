//! Tests for the artifact ledger's persistence.

use serde_json::json;
use swarm_orchestrator::{
    AgentRole, Artifact, ArtifactLedger, ArtifactType, IsolationContext, Manifest, NewArtifact,
};
use tempfile::TempDir;

async fn seeded(ledger: &ArtifactLedger) {
    ledger.initialize().await.unwrap();
    let schema = ledger
        .publish(
            NewArtifact::new(
                ArtifactType::Schema,
                "order.json",
                "{\"type\":\"object\"}",
                AgentRole::Data,
            )
            .with_metadata("version", json!(1))
            .consumed_by(AgentRole::Backend),
        )
        .await
        .unwrap();
    let endpoint = ledger
        .publish(
            NewArtifact::new(
                ArtifactType::Endpoint,
                "orders.http",
                "GET /orders",
                AgentRole::Backend,
            )
            .consumed_by(AgentRole::Frontend)
            .consumed_by(AgentRole::Qa),
        )
        .await
        .unwrap();
    ledger
        .create_handoff(
            AgentRole::Data,
            AgentRole::Backend,
            [schema.id.as_str()],
            Some("schema ready".to_string()),
        )
        .await
        .unwrap();
    ledger
        .create_handoff(
            AgentRole::Backend,
            AgentRole::Qa,
            [endpoint.id.as_str()],
            None,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_export_then_reload_is_identical() {
    let dir = TempDir::new().unwrap();
    let ledger = ArtifactLedger::at(dir.path().join("artifacts"));
    seeded(&ledger).await;

    let path = ledger.export_manifest().await.unwrap();
    assert_eq!(path, dir.path().join("artifacts").join("manifest.json"));

    let reloaded = ArtifactLedger::at(dir.path().join("artifacts"));
    assert_eq!(reloaded.load_from_workspace().await.unwrap(), 2);

    assert_eq!(reloaded.all_artifacts(), ledger.all_artifacts());
    assert_eq!(reloaded.handoffs(), ledger.handoffs());
    assert_eq!(
        reloaded.for_consumer(&AgentRole::Qa),
        ledger.for_consumer(&AgentRole::Qa)
    );
}

#[tokio::test]
async fn test_manifest_wire_format() {
    let dir = TempDir::new().unwrap();
    let ledger = ArtifactLedger::at(dir.path());
    seeded(&ledger).await;
    let path = ledger.export_manifest().await.unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["artifacts"].as_array().unwrap().len(), 2);
    assert_eq!(raw["artifacts"][0]["type"], "schema");
    assert_eq!(raw["artifacts"][0]["producedBy"], "data");
    assert_eq!(raw["handoffs"][0]["fromRole"], "data");
    assert_eq!(raw["handoffs"][0]["toRole"], "backend");
    assert_eq!(raw["handoffs"][0]["message"], "schema ready");

    let manifest: Manifest = serde_json::from_value(raw).unwrap();
    assert_eq!(manifest, ledger.manifest());
}

#[tokio::test]
async fn test_reload_twice_does_not_duplicate() {
    let dir = TempDir::new().unwrap();
    let ledger = ArtifactLedger::at(dir.path());
    seeded(&ledger).await;
    ledger.export_manifest().await.unwrap();

    let reloaded = ArtifactLedger::at(dir.path());
    reloaded.load_from_workspace().await.unwrap();
    reloaded.load_from_workspace().await.unwrap();
    assert_eq!(reloaded.all_artifacts().len(), 2);
    assert_eq!(reloaded.handoffs().len(), 2);
}

#[tokio::test]
async fn test_corrupt_manifest_is_an_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("manifest.json"), "{not json").unwrap();

    let ledger = ArtifactLedger::at(dir.path());
    assert!(ledger.load_from_workspace().await.is_err());
    assert!(ledger.all_artifacts().is_empty());
}

#[tokio::test]
async fn test_isolated_ledgers_do_not_share_state() {
    let dir = TempDir::new().unwrap();
    let a = ArtifactLedger::new(dir.path(), "b1", Some(&IsolationContext::new("u1", "p1", "b1")));
    let b = ArtifactLedger::new(dir.path(), "b1", Some(&IsolationContext::new("u2", "p1", "b1")));
    seeded(&a).await;
    a.export_manifest().await.unwrap();

    assert_eq!(b.load_from_workspace().await.unwrap(), 0);
    assert!(b.all_artifacts().is_empty());
    assert!(
        dir.path()
            .join("solutions/users/u1/projects/p1/builds/b1/artifacts/manifest.json")
            .is_file()
    );
}

#[tokio::test]
async fn test_artifacts_are_never_overwritten() {
    let dir = TempDir::new().unwrap();
    let ledger = ArtifactLedger::at(dir.path());
    let first = ledger
        .publish(NewArtifact::new(ArtifactType::Test, "smoke.rs", "v1", AgentRole::Qa))
        .await
        .unwrap();
    let second = ledger
        .publish(NewArtifact::new(ArtifactType::Test, "smoke.rs", "v2", AgentRole::Qa))
        .await
        .unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(ledger.get(&first.id).unwrap().content, "v1");
    assert_eq!(ledger.by_type(ArtifactType::Test).len(), 2);

    // each artifact keeps its own files on disk
    for (artifact, content) in [(&first, "v1"), (&second, "v2")] {
        let sidecar: Artifact =
            serde_json::from_str(&std::fs::read_to_string(ledger.sidecar_path(artifact)).unwrap())
                .unwrap();
        assert_eq!(&sidecar, artifact);
        let raw = ledger.content_path(artifact).unwrap();
        assert_eq!(std::fs::read_to_string(raw).unwrap(), content);
    }
    assert_eq!(std::fs::read_dir(dir.path().join("tests")).unwrap().count(), 4);
}

#[tokio::test]
async fn test_staging_builds_do_not_share_a_ledger() {
    let dir = TempDir::new().unwrap();
    let first = ArtifactLedger::new(dir.path(), "aaaa1111", None);
    let second = ArtifactLedger::new(dir.path(), "bbbb2222", None);
    seeded(&first).await;
    first.export_manifest().await.unwrap();
    second.export_manifest().await.unwrap();

    let reloaded = ArtifactLedger::new(dir.path(), "aaaa1111", None);
    assert_eq!(reloaded.load_from_workspace().await.unwrap(), 2);
    assert_ne!(first.manifest_path(), second.manifest_path());
}
