//! Property tests for write-back quoting and version handling

use assetmig_core::tree::{parse_document, render_document};
use assetmig_core::{
    probe_version, Document, MappingNode, MigrationDriver, MigrationError, Node, ScalarNode,
    SchemaRegistry, UpgradeContext, UpgradeError, UpgraderDescriptor,
};
use proptest::prelude::*;

fn stamp_version(ctx: &UpgradeContext<'_>, root: &mut MappingNode) -> Result<(), UpgradeError> {
    root.insert("SerializedVersion", ctx.to_version());
    Ok(())
}

fn stamping_driver(expected: u32) -> MigrationDriver {
    let mut registry = SchemaRegistry::new();
    registry.register_type("Foo", expected).unwrap();
    registry
        .register_upgrader(UpgraderDescriptor::from_fn("Foo", "stamp", stamp_version))
        .unwrap();
    MigrationDriver::new(registry)
}

proptest! {
    #[test]
    fn text_scalars_read_back_unchanged(value in "[ -~]{0,24}", indent in 1usize..=8) {
        let root = MappingNode::new()
            .with_tag("Foo")
            .with_entry("Value", ScalarNode::text(value.clone()));
        let text = render_document(&Document::new(root), indent);

        let reparsed = parse_document(&text).unwrap();
        let scalar = reparsed.root().get("Value").and_then(Node::as_scalar).unwrap();
        prop_assert_eq!(scalar.value(), value.as_str());
    }

    #[test]
    fn migration_lands_on_expected_version(declared in 0u32..12, expected in 0u32..12) {
        let driver = stamping_driver(expected);
        let text = format!("!Foo\nId: x\nSerializedVersion: {declared}\nName: keep\n");

        match driver.migrate_text("foo.yaml", &text) {
            Ok(None) => prop_assert_eq!(declared, expected),
            Ok(Some(migrated)) => {
                prop_assert!(declared < expected);
                let probed = probe_version(&migrated).unwrap();
                prop_assert_eq!(probed.version, expected);
                prop_assert!(migrated.contains("Id: x\n"));
                prop_assert!(migrated.contains("Name: keep\n"));
                prop_assert!(driver.migrate_text("foo.yaml", &migrated).unwrap().is_none());
            }
            Err(MigrationError::UnsupportedNewerVersion { declared: d, expected: e, .. }) => {
                prop_assert!(declared > expected);
                prop_assert_eq!((d, e), (declared, expected));
            }
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }
}
