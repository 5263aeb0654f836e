use chrono::Utc;
use export_core::repository::ExportRepository;
use export_types::{Destination, ExportRecordPatch, ExportStatus};

fn repository() -> (tempfile::TempDir, ExportRepository) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let repo = ExportRepository::new(dir.path()).expect("Failed to create repository");
    (dir, repo)
}

#[test]
fn test_unexported_campaign_reads_all_null() {
    let (_dir, repo) = repository();

    let record = repo.get_record("cmp-1").unwrap();
    assert_eq!(record.campaign_id, "cmp-1");
    assert!(record.external_id.is_none());
    assert!(record.destination.is_none());
    assert!(record.exported_at.is_none());
    assert!(record.status.is_none());
    assert!(!record.is_exported());
}

#[test]
fn test_upsert_merges_only_provided_fields() {
    let (_dir, repo) = repository();

    repo.upsert(
        "cmp-1",
        ExportRecordPatch {
            external_id: Some("remote-9".to_string()),
            destination: Some(Destination::Instantly),
            ..Default::default()
        },
    )
    .unwrap();

    // A status-only patch must not clobber the identifier fields.
    let record = repo
        .upsert(
            "cmp-1",
            ExportRecordPatch {
                status: Some(ExportStatus::Success),
                exported_at: Some(Utc::now()),
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(record.external_id.as_deref(), Some("remote-9"));
    assert_eq!(record.destination, Some(Destination::Instantly));
    assert_eq!(record.status, Some(ExportStatus::Success));
    assert!(record.exported_at.is_some());
}

#[test]
fn test_clear_resets_all_four_fields() {
    let (_dir, repo) = repository();

    repo.upsert(
        "cmp-1",
        ExportRecordPatch {
            external_id: Some("remote-9".to_string()),
            destination: Some(Destination::Smartlead),
            exported_at: Some(Utc::now()),
            status: Some(ExportStatus::Success),
        },
    )
    .unwrap();

    repo.clear("cmp-1").unwrap();

    let record = repo.get_record("cmp-1").unwrap();
    assert!(record.external_id.is_none());
    assert!(record.destination.is_none());
    assert!(record.exported_at.is_none());
    assert!(record.status.is_none());
}

#[test]
fn test_external_id_requires_destination() {
    let (_dir, repo) = repository();

    let result = repo.upsert(
        "cmp-1",
        ExportRecordPatch {
            external_id: Some("remote-9".to_string()),
            ..Default::default()
        },
    );

    assert!(result.is_err());
    // The invalid write must not leave a partial record behind.
    let record = repo.get_record("cmp-1").unwrap();
    assert!(record.external_id.is_none());
}

#[test]
fn test_find_by_external_id_matches_destination() {
    let (_dir, repo) = repository();

    for (campaign, destination) in [
        ("cmp-1", Destination::Instantly),
        ("cmp-2", Destination::Instantly),
        ("cmp-3", Destination::Smartlead),
    ] {
        repo.upsert(
            campaign,
            ExportRecordPatch {
                external_id: Some("remote-9".to_string()),
                destination: Some(destination),
                ..Default::default()
            },
        )
        .unwrap();
    }

    let matches = repo
        .find_by_external_id("remote-9", Destination::Instantly)
        .unwrap();
    assert_eq!(matches, vec!["cmp-1".to_string(), "cmp-2".to_string()]);

    let none = repo
        .find_by_external_id("remote-0", Destination::Instantly)
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn test_malformed_campaign_id_is_rejected() {
    let (_dir, repo) = repository();

    assert!(repo.get_record("../outside").is_err());
    assert!(repo.clear("a b").is_err());
}
