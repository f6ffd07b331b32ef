//! Requirement graph construction: sibling demotion, maven-resolved
//! requirements, cycles and duplicate manifest ids.

mod common;

use tempfile::TempDir;

use common::{file_channel, write_manifest, MemoryFactory};
use maven_channels::{
    ChannelManifest, ChannelSession, Error, ManifestCoordinate, ManifestRequirement, Stream,
};

fn requirement(id: &str) -> ManifestRequirement {
    ManifestRequirement {
        id: id.to_string(),
        maven: None,
    }
}

fn maven_requirement(id: &str, group_id: &str, artifact_id: &str) -> ManifestRequirement {
    ManifestRequirement {
        id: id.to_string(),
        maven: Some(ManifestCoordinate {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version: None,
        }),
    }
}

#[test]
fn required_sibling_is_demoted_from_the_roots() {
    let dir = TempDir::new().expect("tempdir");
    let factory = MemoryFactory::new();
    let base = write_manifest(
        dir.path(),
        "base.yaml",
        &ChannelManifest::new(vec![Stream::fixed("com.x", "lib", "1.0.0").expect("stream")])
            .expect("manifest")
            .with_id("base")
            .with_requires(vec![requirement("extra")]),
    );
    // The demoted sibling also has a stream for the same coordinate with a
    // greater version; if it were still a root, arbitration would pick it.
    let extra = write_manifest(
        dir.path(),
        "extra.yaml",
        &ChannelManifest::new(vec![
            Stream::fixed("com.x", "lib", "2.0.0").expect("stream"),
            Stream::fixed("org.y", "tool", "0.7.0").expect("stream"),
        ])
        .expect("manifest")
        .with_id("extra"),
    );
    let mut session = ChannelSession::new(
        vec![file_channel("r1", base), file_channel("r2", extra)],
        &factory,
    )
    .expect("session");

    let artifact = session
        .resolve_maven_artifact("com.x", "lib", None, None, None)
        .expect("resolves");
    assert_eq!(artifact.version, "1.0.0");

    // Streams only the demoted sibling defines are still reachable through
    // the requiring root, fetched from the sibling's own repositories.
    let artifact = session
        .resolve_maven_artifact("org.y", "tool", None, None, None)
        .expect("resolves");
    assert_eq!(artifact.version, "0.7.0");
    assert_eq!(
        factory.calls_matching("resolve_artifact org.y"),
        vec!["[r2] resolve_artifact org.y:tool:::0.7.0".to_string()]
    );
}

#[test]
fn children_are_consulted_depth_first_in_declared_order() {
    let dir = TempDir::new().expect("tempdir");
    let factory = MemoryFactory::new();
    let base = write_manifest(
        dir.path(),
        "base.yaml",
        &ChannelManifest::new(vec![])
            .expect("manifest")
            .with_id("base")
            .with_requires(vec![requirement("first"), requirement("second")]),
    );
    let first = write_manifest(
        dir.path(),
        "first.yaml",
        &ChannelManifest::new(vec![Stream::fixed("com.x", "lib", "1.0.0").expect("stream")])
            .expect("manifest")
            .with_id("first"),
    );
    // Declared later, so never reached for this coordinate even though its
    // version is greater.
    let second = write_manifest(
        dir.path(),
        "second.yaml",
        &ChannelManifest::new(vec![Stream::fixed("com.x", "lib", "9.0.0").expect("stream")])
            .expect("manifest")
            .with_id("second"),
    );
    let mut session = ChannelSession::new(
        vec![
            file_channel("r1", base),
            file_channel("r2", first),
            file_channel("r3", second),
        ],
        &factory,
    )
    .expect("session");

    let artifact = session
        .resolve_maven_artifact("com.x", "lib", None, None, None)
        .expect("resolves");
    assert_eq!(artifact.version, "1.0.0");
}

#[test]
fn maven_requirement_spawns_a_private_child() {
    let dir = TempDir::new().expect("tempdir");
    let factory = MemoryFactory::new();
    let child = ChannelManifest::new(vec![Stream::fixed("com.x", "lib", "1.0.0").expect("stream")])
        .expect("manifest");
    let child_url = write_manifest(dir.path(), "child.yaml", &child);
    factory.publish_manifest("org.example", "child-manifest", child_url);

    let base = write_manifest(
        dir.path(),
        "base.yaml",
        &ChannelManifest::new(vec![])
            .expect("manifest")
            .with_id("base")
            .with_requires(vec![maven_requirement(
                "child",
                "org.example",
                "child-manifest",
            )]),
    );
    let mut session =
        ChannelSession::new(vec![file_channel("r1", base)], &factory).expect("session");

    let artifact = session
        .resolve_maven_artifact("com.x", "lib", None, None, None)
        .expect("resolves");
    assert_eq!(artifact.version, "1.0.0");
    // The child inherited the requiring channel's repositories.
    assert_eq!(
        factory.calls_matching("resolve_artifact"),
        vec!["[r1] resolve_artifact com.x:lib:::1.0.0".to_string()]
    );
}

#[test]
fn maven_requirement_does_not_demote_a_sibling_with_the_same_id() {
    let dir = TempDir::new().expect("tempdir");
    let factory = MemoryFactory::new();
    let child = ChannelManifest::new(vec![Stream::fixed("com.x", "lib", "1.0.0").expect("stream")])
        .expect("manifest");
    let child_url = write_manifest(dir.path(), "child.yaml", &child);
    factory.publish_manifest("org.example", "child-manifest", child_url);

    let base = write_manifest(
        dir.path(),
        "base.yaml",
        &ChannelManifest::new(vec![])
            .expect("manifest")
            .with_id("base")
            .with_requires(vec![maven_requirement(
                "shared",
                "org.example",
                "child-manifest",
            )]),
    );
    let sibling = write_manifest(
        dir.path(),
        "sibling.yaml",
        &ChannelManifest::new(vec![Stream::fixed("com.x", "lib", "3.0.0").expect("stream")])
            .expect("manifest")
            .with_id("shared"),
    );
    let mut session = ChannelSession::new(
        vec![file_channel("r1", base), file_channel("r2", sibling)],
        &factory,
    )
    .expect("session");

    // The sibling stayed a root, so arbitration sees its 3.0.0 alongside
    // the private child's 1.0.0.
    let artifact = session
        .resolve_maven_artifact("com.x", "lib", None, None, None)
        .expect("resolves");
    assert_eq!(artifact.version, "3.0.0");
}

#[test]
fn unresolvable_requirement_fails_session_construction() {
    let dir = TempDir::new().expect("tempdir");
    let factory = MemoryFactory::new();
    let base = write_manifest(
        dir.path(),
        "base.yaml",
        &ChannelManifest::new(vec![])
            .expect("manifest")
            .with_id("base")
            .with_requires(vec![requirement("nowhere")]),
    );
    let err = ChannelSession::new(vec![file_channel("r1", base)], &factory).unwrap_err();
    match err {
        Error::UnresolvedRequiredManifest { id } => assert_eq!(id, "nowhere"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn requirement_cycle_fails_session_construction() {
    let dir = TempDir::new().expect("tempdir");
    let factory = MemoryFactory::new();
    let m1 = write_manifest(
        dir.path(),
        "m1.yaml",
        &ChannelManifest::new(vec![])
            .expect("manifest")
            .with_id("m1")
            .with_requires(vec![requirement("m2")]),
    );
    let m2 = write_manifest(
        dir.path(),
        "m2.yaml",
        &ChannelManifest::new(vec![])
            .expect("manifest")
            .with_id("m2")
            .with_requires(vec![requirement("m1")]),
    );
    let err = ChannelSession::new(
        vec![file_channel("r1", m1), file_channel("r2", m2)],
        &factory,
    )
    .unwrap_err();
    match err {
        Error::CyclicDependency { cycle } => {
            assert_eq!(cycle, vec!["m1", "m2", "m1"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn self_requirement_is_a_cycle() {
    let dir = TempDir::new().expect("tempdir");
    let factory = MemoryFactory::new();
    let m1 = write_manifest(
        dir.path(),
        "m1.yaml",
        &ChannelManifest::new(vec![])
            .expect("manifest")
            .with_id("m1")
            .with_requires(vec![requirement("m1")]),
    );
    let err = ChannelSession::new(vec![file_channel("r1", m1)], &factory).unwrap_err();
    assert!(matches!(err, Error::CyclicDependency { .. }));
}

#[test]
fn duplicate_root_manifest_ids_are_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let factory = MemoryFactory::new();
    let a = write_manifest(
        dir.path(),
        "a.yaml",
        &ChannelManifest::new(vec![]).expect("manifest").with_id("dup"),
    );
    let b = write_manifest(
        dir.path(),
        "b.yaml",
        &ChannelManifest::new(vec![]).expect("manifest").with_id("dup"),
    );
    let err = ChannelSession::new(
        vec![file_channel("r1", a), file_channel("r2", b)],
        &factory,
    )
    .unwrap_err();
    match err {
        Error::DuplicateManifestId { id } => assert_eq!(id, "dup"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn anonymous_root_manifests_may_repeat() {
    let dir = TempDir::new().expect("tempdir");
    let factory = MemoryFactory::new();
    let a = write_manifest(
        dir.path(),
        "a.yaml",
        &ChannelManifest::new(vec![]).expect("manifest"),
    );
    let b = write_manifest(
        dir.path(),
        "b.yaml",
        &ChannelManifest::new(vec![]).expect("manifest"),
    );
    assert!(ChannelSession::new(
        vec![file_channel("r1", a), file_channel("r2", b)],
        &factory,
    )
    .is_ok());
}

#[test]
fn demoted_sibling_does_not_count_toward_duplicate_ids() {
    let dir = TempDir::new().expect("tempdir");
    let factory = MemoryFactory::new();
    let base = write_manifest(
        dir.path(),
        "base.yaml",
        &ChannelManifest::new(vec![])
            .expect("manifest")
            .with_id("base")
            .with_requires(vec![requirement("dup")]),
    );
    let demoted = write_manifest(
        dir.path(),
        "demoted.yaml",
        &ChannelManifest::new(vec![]).expect("manifest").with_id("dup"),
    );
    let other = write_manifest(
        dir.path(),
        "other.yaml",
        &ChannelManifest::new(vec![]).expect("manifest").with_id("dup"),
    );
    // "dup" appears twice, but the first holder is demoted to a dependency
    // of `base`, so the roots carry each id at most once.
    assert!(ChannelSession::new(
        vec![
            file_channel("r1", base),
            file_channel("r2", demoted),
            file_channel("r3", other),
        ],
        &factory,
    )
    .is_ok());
}
