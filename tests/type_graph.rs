mod common;

use apisurface::core::{SiteKind, TypeGraph, UseKind, UseSite};
use apisurface::parsers::parse_class;
use common::*;

fn ingest(graph: &mut TypeGraph, class: &ClassFileBuilder, primary: bool, seed: bool) {
    let facts = parse_class(&class.build()).unwrap();
    for reported in facts.reported_uses() {
        if reported.used_type.starts_with("java.") {
            continue;
        }
        graph.record_use(&facts.binary_name, &reported.used_type, reported.site);
    }
    graph.commit_class(&facts, "test.jar", primary, seed);
}

fn is_api(graph: &TypeGraph, name: &str) -> bool {
    graph.find(name).is_some_and(|r| r.is_api_type())
}

#[test]
fn closure_follows_signature_chain_but_not_annotations() {
    let mut graph = TypeGraph::new();
    ingest(
        &mut graph,
        &ClassFileBuilder::new("A").field(ACC_PUBLIC, "b", "LB;"),
        true,
        true,
    );
    ingest(
        &mut graph,
        &ClassFileBuilder::new("B").method(ACC_PUBLIC, "c", "()LC;"),
        true,
        false,
    );
    ingest(
        &mut graph,
        &ClassFileBuilder::new("C")
            .method_spec(MemberSpec::new(ACC_PUBLIC, "run", "()V").throws("D")),
        true,
        false,
    );
    ingest(&mut graph, &ClassFileBuilder::new("D").annotated("E"), true, false);

    for name in ["A", "B", "C", "D"] {
        assert!(is_api(&graph, name), "{name} should be API");
    }
    assert!(!is_api(&graph, "E"));
    assert!(!graph.find("A").unwrap().is_api_through_use());
    assert!(graph.find("B").unwrap().is_api_through_use());
    assert!(graph.find("D").unwrap().is_api_through_use());

    // E is referenced but never seen; it is pending without being a missing API type.
    assert!(graph.has_unresolved());
    assert!(graph.unresolved().is_empty());
    let pending: Vec<&str> = graph
        .records()
        .filter(|record| !record.is_resolved())
        .map(|record| record.binary_name())
        .collect();
    assert_eq!(pending, vec!["E"]);
}

#[test]
fn use_recorded_before_user_joins_api_propagates_on_seed() {
    let mut graph = TypeGraph::new();
    let site = UseSite::new(UseKind::HasType, SiteKind::Field, "A").with_member("b", "LB;");
    assert!(graph.record_use("A", "B", site.clone()));
    assert!(!is_api(&graph, "B"));

    let a = graph.get_or_insert("A");
    graph.mark_api(a);
    assert!(is_api(&graph, "B"));
    assert_eq!(graph.unresolved(), vec!["A".to_string(), "B".to_string()]);
}

#[test]
fn annotation_and_containment_edges_never_move_types_into_api() {
    let mut graph = TypeGraph::new();
    let a = graph.get_or_insert("A");
    graph.mark_api(a);

    graph.record_use("A", "Marker", UseSite::new(UseKind::Annotates, SiteKind::Class, "A"));
    graph.record_use("A", "Outer", UseSite::containment("A"));

    assert!(!is_api(&graph, "Marker"));
    assert!(!is_api(&graph, "Outer"));
}

#[test]
fn duplicate_use_is_not_recorded_twice() {
    let mut graph = TypeGraph::new();
    let site = UseSite::new(UseKind::ReturnType, SiteKind::Method, "A").with_member("get", "()LB;");
    assert!(graph.record_use("A", "B", site.clone()));
    assert!(!graph.record_use("A", "B", site));
    assert_eq!(graph.edge_count(), 1);

    let b = graph.id_of("B").unwrap();
    assert_eq!(graph.use_sites(b).len(), 1);
    let a = graph.id_of("A").unwrap();
    assert_eq!(graph.used_types(a).get(&UseKind::ReturnType), Some(&vec!["B"]));
}

#[test]
fn cyclic_uses_terminate() {
    let mut graph = TypeGraph::new();
    ingest(
        &mut graph,
        &ClassFileBuilder::new("Ping").field(ACC_PUBLIC, "pong", "LPong;"),
        true,
        false,
    );
    ingest(
        &mut graph,
        &ClassFileBuilder::new("Pong").field(ACC_PUBLIC, "ping", "LPing;"),
        true,
        false,
    );
    let ping = graph.id_of("Ping").unwrap();
    graph.mark_api(ping);

    assert!(is_api(&graph, "Ping"));
    assert!(is_api(&graph, "Pong"));
    // Reached a second time through Pong's field.
    assert!(graph.find("Ping").unwrap().is_api_through_use());
}

#[test]
fn recommitting_keeps_first_facts_and_edges() {
    let mut graph = TypeGraph::new();
    let class = ClassFileBuilder::new("A").field(ACC_PUBLIC, "b", "LB;");
    ingest(&mut graph, &class, true, true);
    let edges = graph.edge_count();
    let nodes = graph.len();

    let facts = parse_class(&class.build()).unwrap();
    graph.commit_class(&facts, "other.jar", false, false);
    for reported in facts.reported_uses() {
        if !reported.used_type.starts_with("java.") {
            graph.record_use(&facts.binary_name, &reported.used_type, reported.site);
        }
    }

    assert_eq!(graph.edge_count(), edges);
    assert_eq!(graph.len(), nodes);
    let record = graph.find("A").unwrap();
    assert_eq!(record.committed().unwrap().archive, "test.jar");
    assert!(record.is_primary_api());
    assert!(record.is_api_type());
}

#[test]
fn owner_chain_sets_depth_and_containment() {
    let mut graph = TypeGraph::new();
    // Innermost first: owners start as placeholders.
    ingest(
        &mut graph,
        &ClassFileBuilder::new("A$B$C")
            .inner_class("A$B$C", Some("A$B"), Some("C"), ACC_PUBLIC | ACC_STATIC)
            .inner_class("A$B", Some("A"), Some("B"), ACC_PUBLIC | ACC_STATIC),
        true,
        false,
    );

    let c = graph.find("A$B$C").unwrap();
    assert_eq!(c.nesting_depth(), 2);
    assert_eq!(c.canonical_name(), "A.B.C");
    let b_id = graph.id_of("A$B").unwrap();
    assert_eq!(c.owner(), Some(b_id));
    assert_eq!(graph.record(b_id).nesting_depth(), 1);
    assert_eq!(graph.record(b_id).canonical_name(), "A.B");

    let contains = graph.used_types(graph.id_of("A$B$C").unwrap());
    assert_eq!(contains.get(&UseKind::Contains), Some(&vec!["A$B"]));
    assert_eq!(graph.contained(b_id), vec![graph.id_of("A$B$C").unwrap()]);
}

#[test]
fn accessible_members_of_primary_api_types_join_the_api() {
    let mut graph = TypeGraph::new();
    ingest(
        &mut graph,
        &ClassFileBuilder::new("A$Open")
            .inner_class("A$Open", Some("A"), Some("Open"), ACC_PUBLIC | ACC_STATIC),
        true,
        false,
    );
    ingest(&mut graph, &ClassFileBuilder::new("A"), true, true);
    ingest(
        &mut graph,
        &ClassFileBuilder::new("A$Closed")
            .inner_class("A$Closed", Some("A"), Some("Closed"), ACC_PRIVATE | ACC_STATIC),
        true,
        false,
    );
    ingest(
        &mut graph,
        &ClassFileBuilder::new("A$Late")
            .inner_class("A$Late", Some("A"), Some("Late"), ACC_PROTECTED | ACC_STATIC),
        true,
        false,
    );

    assert!(is_api(&graph, "A$Open"));
    assert!(!graph.find("A$Open").unwrap().is_api_through_use());
    assert!(is_api(&graph, "A$Late"));
    assert!(!is_api(&graph, "A$Closed"));
    // The owner is never dragged in by what it contains.
    assert!(!graph.find("A").unwrap().is_api_through_use());
}

#[test]
fn members_of_supplementary_types_stay_out() {
    let mut graph = TypeGraph::new();
    ingest(
        &mut graph,
        &ClassFileBuilder::new("api/Entry").field(ACC_PUBLIC, "dep", "Llib/Dep;"),
        true,
        true,
    );
    ingest(&mut graph, &ClassFileBuilder::new("lib/Dep"), false, false);
    ingest(
        &mut graph,
        &ClassFileBuilder::new("lib/Dep$Helper")
            .inner_class("lib/Dep$Helper", Some("lib/Dep"), Some("Helper"), ACC_PUBLIC | ACC_STATIC),
        false,
        false,
    );

    assert!(is_api(&graph, "lib.Dep"));
    assert!(!graph.find("lib.Dep").unwrap().is_primary_api());
    assert!(!is_api(&graph, "lib.Dep$Helper"));
}

#[test]
fn anonymous_class_is_owned_by_enclosing_class() {
    let mut graph = TypeGraph::new();
    ingest(
        &mut graph,
        &ClassFileBuilder::new("A$1$1")
            .inner_class("A$1$1", None, None, 0)
            .enclosing_method("A$1"),
        true,
        false,
    );
    ingest(
        &mut graph,
        &ClassFileBuilder::new("A$1")
            .inner_class("A$1", None, None, 0)
            .enclosing_method("A"),
        true,
        false,
    );

    let outer = graph.find("A$1").unwrap();
    assert_eq!(outer.owner(), graph.id_of("A"));
    assert_eq!(outer.nesting_depth(), 1);
    assert_eq!(graph.find("A$1$1").unwrap().nesting_depth(), 2);
}

#[test]
fn api_flags_are_monotonic() {
    let mut graph = TypeGraph::new();
    let a = graph.get_or_insert("A");
    graph.mark_api(a);
    graph.set_inclusion(a, false, true);
    ingest(&mut graph, &ClassFileBuilder::new("A").access(0), true, false);

    let record = graph.find("A").unwrap();
    assert!(record.is_api_type());
    assert!(record.is_explicitly_excluded());
}
