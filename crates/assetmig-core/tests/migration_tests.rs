//! End-to-end migrations of single documents on disk

use assetmig_core::{
    MigrationDriver, MigrationError, MigrationOutcome, SchemaRegistry, UpgraderDescriptor,
    VersionTag,
};
use assetmig_test_utils::{
    foo_document, foo_registry, foo_registry_with, migrated_foo_document, rename_descriptor,
    AssetDir, FailingUpgrader, StaleVersionUpgrader, FOO,
};
use pretty_assertions::assert_eq;

#[test]
fn foo_scenario_renames_field_and_bumps_version() {
    let dir = AssetDir::new();
    let path = dir.write("foo.yaml", &foo_document(1));
    let driver = MigrationDriver::new(foo_registry());

    assert!(driver.migrate(&path).unwrap());
    assert_eq!(dir.read(&path), migrated_foo_document());
}

#[test]
fn outcome_reports_versions() {
    let dir = AssetDir::new();
    let path = dir.write("foo.yaml", &foo_document(1));
    let driver = MigrationDriver::new(foo_registry());

    let outcome = driver.migrate_with_outcome(&path).unwrap();
    assert_eq!(
        outcome,
        MigrationOutcome::Migrated {
            asset_type: FOO.to_string(),
            from: 1,
            to: 2,
        }
    );
}

#[test]
fn second_migration_is_noop() {
    let dir = AssetDir::new();
    let path = dir.write("foo.yaml", &foo_document(1));
    let driver = MigrationDriver::new(foo_registry());

    assert!(driver.migrate(&path).unwrap());
    let after_first = dir.read(&path);
    assert!(!driver.migrate(&path).unwrap());
    assert_eq!(dir.read(&path), after_first);
}

#[test]
fn current_document_is_not_rewritten() {
    let text = "!Foo\nId: x   # keep this comment\nSerializedVersion: 2\nNewName:   hello\n";
    let dir = AssetDir::new();
    let path = dir.write("foo.yaml", text);
    let driver = MigrationDriver::new(foo_registry());

    let outcome = driver.migrate_with_outcome(&path).unwrap();
    assert_eq!(outcome, MigrationOutcome::UpToDate(VersionTag::new(FOO, 2)));
    assert_eq!(dir.read(&path), text);
}

#[test]
fn newer_document_is_refused() {
    let dir = AssetDir::new();
    let text = foo_document(3);
    let path = dir.write("foo.yaml", &text);
    let driver = MigrationDriver::new(foo_registry());

    let err = driver.migrate(&path).unwrap_err();
    assert!(err.is_version_skew());
    assert!(matches!(
        err,
        MigrationError::UnsupportedNewerVersion { declared: 3, expected: 2, .. }
    ));
    assert_eq!(
        err.to_string(),
        "asset of type Foo has been serialized with newer version 3, but only version 2 is supported"
    );
    assert_eq!(dir.read(&path), text);
}

#[test]
fn several_upgraders_are_ambiguous() {
    let dir = AssetDir::new();
    let text = foo_document(1);
    let path = dir.write("foo.yaml", &text);
    let registry = foo_registry_with([
        rename_descriptor(),
        UpgraderDescriptor::from_default::<StaleVersionUpgrader>(FOO, "stale"),
    ]);

    let err = MigrationDriver::new(registry).migrate(&path).unwrap_err();
    match err {
        MigrationError::AmbiguousMigrationPath {
            asset_type,
            declared,
            expected,
            candidates,
        } => {
            assert_eq!(asset_type, FOO);
            assert_eq!((declared, expected), (1, 2));
            assert_eq!(candidates, ["rename-old-name", "stale"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(dir.read(&path), text);
}

#[test]
fn missing_upgrader_has_no_path() {
    let dir = AssetDir::new();
    let text = foo_document(1);
    let path = dir.write("foo.yaml", &text);
    let registry = foo_registry_with(Vec::new());

    let err = MigrationDriver::new(registry).migrate(&path).unwrap_err();
    assert!(matches!(
        err,
        MigrationError::NoMigrationPath { declared: 1, expected: 2, .. }
    ));
    assert_eq!(dir.read(&path), text);
}

#[test]
fn stale_version_after_upgrade_leaves_file_untouched() {
    let dir = AssetDir::new();
    let text = foo_document(1);
    let path = dir.write("foo.yaml", &text);
    let registry = foo_registry_with([UpgraderDescriptor::from_default::<StaleVersionUpgrader>(
        FOO, "stale",
    )]);

    let err = MigrationDriver::new(registry).migrate(&path).unwrap_err();
    assert!(matches!(
        err,
        MigrationError::PostMigrationVersionMismatch {
            declared: 1,
            actual: 1,
            expected: 2,
            ..
        }
    ));
    assert_eq!(dir.read(&path), text);
    assert_eq!(dir.file_names(), ["foo.yaml"]);
}

#[test]
fn upgrader_failure_leaves_file_untouched() {
    let dir = AssetDir::new();
    let text = foo_document(1);
    let path = dir.write("foo.yaml", &text);
    let registry = foo_registry_with([UpgraderDescriptor::from_default::<FailingUpgrader>(
        FOO, "failing",
    )]);

    let err = MigrationDriver::new(registry).migrate(&path).unwrap_err();
    assert!(matches!(err, MigrationError::Upgrader { ref upgrader, .. } if upgrader == "failing"));
    assert_eq!(err.asset_type(), Some(FOO));
    assert_eq!(dir.read(&path), text);
    assert_eq!(dir.file_names(), ["foo.yaml"]);
}

#[test]
fn unresolvable_types() {
    let dir = AssetDir::new();
    let unknown = dir.write("bar.yaml", "!Bar\nSerializedVersion: 1\n");
    let untagged = dir.write("plain.yaml", "Id: x\nSerializedVersion: 1\n");
    let driver = MigrationDriver::new(foo_registry());

    assert!(matches!(
        driver.migrate(&unknown),
        Err(MigrationError::UnresolvableType { tag: Some(ref tag) }) if tag == "Bar"
    ));
    assert!(matches!(
        driver.migrate(&untagged),
        Err(MigrationError::UnresolvableType { tag: None })
    ));
}

#[test]
fn malformed_version_is_refused() {
    let dir = AssetDir::new();
    let path = dir.write("foo.yaml", "!Foo\nId: x\nSerializedVersion: two\nOldName: hello\n");

    let err = MigrationDriver::new(foo_registry()).migrate(&path).unwrap_err();
    assert!(matches!(
        err,
        MigrationError::MalformedVersionField { ref value } if value == "two"
    ));
}

#[test]
fn non_asset_paths_are_skipped_unread() {
    let dir = AssetDir::new();
    let text = foo_document(1);
    let path = dir.write("foo.txt", &text);
    let driver = MigrationDriver::new(foo_registry());

    assert_eq!(
        driver.migrate_with_outcome(&path).unwrap(),
        MigrationOutcome::NotAnAsset
    );
    assert!(!driver.migrate(dir.path().join("missing.bin")).unwrap());
    assert_eq!(dir.read(&path), text);
}

#[test]
fn missing_file_is_io_error() {
    let dir = AssetDir::new();
    let err = MigrationDriver::new(foo_registry())
        .migrate(dir.path().join("missing.yaml"))
        .unwrap_err();
    assert!(matches!(err, MigrationError::Io { .. }));
}

#[test]
fn legacy_tag_resolves_through_alias() {
    let mut registry = foo_registry();
    registry.register_tag_alias("LegacyFoo", FOO).unwrap();
    let dir = AssetDir::new();
    let path = dir.write(
        "foo.yml",
        "!LegacyFoo\nId: x\nSerializedVersion: 1\nOldName: hello\n",
    );

    assert!(MigrationDriver::new(registry).migrate(&path).unwrap());
    assert_eq!(
        dir.read(&path),
        "!LegacyFoo\nId: x\nSerializedVersion: 2\nNewName: hello\n"
    );
}

#[test]
fn untouched_nested_content_survives() {
    let before = "\
!Foo
Id: x
SerializedVersion: 1
OldName: hello
Layers:
    -   Name: base
        Blend: 0.5
    - !Overlay
        Name: top
Settings:
    Enabled: true
    Label: 'true'
";
    let after = "\
!Foo
Id: x
SerializedVersion: 2
NewName: hello
Layers:
    -   Name: base
        Blend: 0.5
    - !Overlay
        Name: top
Settings:
    Enabled: true
    Label: 'true'
";
    let dir = AssetDir::new();
    let path = dir.write("foo.yaml", before);

    assert!(MigrationDriver::new(foo_registry()).migrate(&path).unwrap());
    assert_eq!(dir.read(&path), after);
}

#[test]
fn untouched_values_keep_their_source_text() {
    let before = "\
!Foo
# asset identity
Id: x
SerializedVersion: 1
OldName: hello
Rev: 1.10
Color: 0xFF
Empty:
Nothing: ~
Hash: 123456789012345678901234567890
Quoted: 'it''s'
Notes: |-
  line one
    line two
";
    let after = before
        .replace("SerializedVersion: 1", "SerializedVersion: 2")
        .replace("OldName", "NewName");
    let dir = AssetDir::new();
    let path = dir.write("foo.yaml", before);

    assert!(MigrationDriver::new(foo_registry()).migrate(&path).unwrap());
    assert_eq!(dir.read(&path), after);
}

#[test]
fn anchors_and_aliases_are_not_expanded() {
    let before = "\
!Foo
Id: x
SerializedVersion: 1
OldName: hello
Base: &base
  Size: 1
Copy: *base
Point: &p {X: 1, Y: 2}
Points: [*p, *p]
";
    let after = before
        .replace("SerializedVersion: 1", "SerializedVersion: 2")
        .replace("OldName", "NewName");
    let dir = AssetDir::new();
    let path = dir.write("foo.yaml", before);

    assert!(MigrationDriver::new(foo_registry()).migrate(&path).unwrap());
    assert_eq!(dir.read(&path), after);
}

#[test]
fn two_space_sequences_keep_their_layout() {
    let before = "\
!Foo
Id: x
SerializedVersion: 1
OldName: hello
Items:
  # first item
  - Name: a
    Value: 1
  - - nested
    - list
";
    let after = before
        .replace("SerializedVersion: 1", "SerializedVersion: 2")
        .replace("OldName", "NewName");
    let dir = AssetDir::new();
    let path = dir.write("foo.yaml", before);

    assert!(MigrationDriver::new(foo_registry()).migrate(&path).unwrap());
    assert_eq!(dir.read(&path), after);
}

#[test]
fn shared_registry_across_drivers() {
    let registry = std::sync::Arc::new(foo_registry());
    let first = MigrationDriver::new(registry.clone());
    let second = MigrationDriver::new(registry);
    assert_eq!(first.registry().type_names(), second.registry().type_names());

    let empty = MigrationDriver::new(SchemaRegistry::new());
    assert!(empty.registry().is_empty());
}
