//! Parallel migration of distinct files

use assetmig_core::{BatchSummary, MigrationDriver, MigrationError, MigrationOutcome};
use assetmig_test_utils::{foo_document, foo_registry, migrated_foo_document, AssetDir};
use pretty_assertions::assert_eq;

#[test]
fn batch_isolates_failures() {
    let dir = AssetDir::new();
    let outdated = dir.write("a.yaml", &foo_document(1));
    let current = dir.write("b.yaml", &migrated_foo_document());
    let newer = dir.write("c.yaml", &foo_document(3));
    let other = dir.write("d.txt", &foo_document(1));
    let paths = vec![
        outdated.clone(),
        current.clone(),
        newer.clone(),
        other.clone(),
        outdated.clone(),
    ];

    let entries = MigrationDriver::new(foo_registry()).migrate_batch(&paths);

    let order: Vec<_> = entries.iter().map(|e| e.path.clone()).collect();
    assert_eq!(order, [outdated.clone(), current, newer.clone(), other]);
    assert!(matches!(entries[0].result, Ok(MigrationOutcome::Migrated { from: 1, to: 2, .. })));
    assert!(matches!(entries[1].result, Ok(MigrationOutcome::UpToDate(_))));
    assert!(matches!(
        entries[2].result,
        Err(MigrationError::UnsupportedNewerVersion { .. })
    ));
    assert!(matches!(entries[3].result, Ok(MigrationOutcome::NotAnAsset)));

    assert_eq!(
        BatchSummary::from_entries(&entries),
        BatchSummary {
            migrated: 1,
            up_to_date: 1,
            skipped: 1,
            failed: 1,
        }
    );
    assert_eq!(dir.read(&outdated), migrated_foo_document());
    assert_eq!(dir.read(&newer), foo_document(3));
}

#[test]
fn many_files_in_parallel() {
    let dir = AssetDir::new();
    let paths: Vec<_> = (0..32)
        .map(|i| dir.write(&format!("asset-{i:02}.yaml"), &foo_document(i % 3)))
        .collect();

    let entries = MigrationDriver::new(foo_registry()).migrate_batch(&paths);
    let summary = BatchSummary::from_entries(&entries);

    // versions cycle 0, 1, 2: the first two migrate, the last is current
    assert_eq!(summary.migrated + summary.up_to_date, 32);
    assert_eq!(summary.up_to_date, 10);
    for path in &paths {
        assert_eq!(dir.read(path), migrated_foo_document());
    }
    assert_eq!(dir.file_names().len(), 32);
}

#[test]
fn empty_batch() {
    let paths: Vec<std::path::PathBuf> = Vec::new();
    assert!(MigrationDriver::new(foo_registry()).migrate_batch(&paths).is_empty());
}
