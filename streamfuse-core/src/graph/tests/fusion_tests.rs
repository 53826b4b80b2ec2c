use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::graph::node::StreamNode;
use crate::test_support::{RecordingRuntime, context, tag};
use crate::types::{SerializationMode, StorageLevel};

fn input(runtime: &Arc<RecordingRuntime>) -> Arc<StreamNode<Vec<u32>>> {
    StreamNode::input(&context(runtime), runtime.input_handle(), SerializationMode::Object)
}

fn transformed(node: &StreamNode<Vec<u32>>) -> &crate::graph::TransformedNode<Vec<u32>> {
    match node.kind() {
        NodeKind::Transformed(t) => t,
        _ => panic!("expected transformed node"),
    }
}

#[test]
fn test_first_transform_over_input_is_not_fused() {
    let runtime = RecordingRuntime::new();
    let a = input(&runtime);
    let b = StreamNode::transformed(&a, tag(1));

    let t = transformed(&b);
    assert_eq!(
        t.decision(),
        FusionDecision::Ineligible(IneligibleReason::NotTransformed)
    );
    assert!(Arc::ptr_eq(t.upstream(), &a));
    assert_eq!(t.upstream_mode(), SerializationMode::Object);
    assert_eq!(t.function().depth(), 1);
}

#[test]
fn test_chain_collapses_to_one_function_over_root() {
    // A → f1 → f2 → f3 → f4: one composite, upstream A.
    let runtime = RecordingRuntime::new();
    let a = input(&runtime);
    let mut node = StreamNode::transformed(&a, tag(1));
    for i in 2..=4 {
        node = StreamNode::transformed(&node, tag(i));
    }

    let t = transformed(&node);
    assert!(t.is_fused());
    assert!(Arc::ptr_eq(t.upstream(), &a));
    assert_eq!(t.upstream_mode(), SerializationMode::Object);
    assert_eq!(t.function().depth(), 4);
    assert_eq!(t.function().apply(0, vec![]), vec![1, 2, 3, 4]);
}

#[test]
fn test_cached_predecessor_is_a_boundary() {
    let runtime = RecordingRuntime::new();
    let a = input(&runtime);
    let b = StreamNode::transformed(&a, tag(1));
    b.mark_cached(StorageLevel::MemoryOnly).unwrap();
    let c = StreamNode::transformed(&b, tag(2));

    let t = transformed(&c);
    assert_eq!(t.decision(), FusionDecision::Ineligible(IneligibleReason::Cached));
    assert!(Arc::ptr_eq(t.upstream(), &b));
    assert_eq!(t.upstream_mode(), b.output_mode());
    assert_eq!(t.function().apply(0, vec![]), vec![2]);
}

#[test]
fn test_checkpointed_predecessor_is_a_boundary() {
    let runtime = RecordingRuntime::new();
    let a = input(&runtime);
    let b = StreamNode::transformed(&a, tag(1));
    b.mark_checkpointed(Duration::from_secs(10)).unwrap();
    let c = StreamNode::transformed(&b, tag(2));

    let t = transformed(&c);
    assert_eq!(
        t.decision(),
        FusionDecision::Ineligible(IneligibleReason::Checkpointed)
    );
    assert!(Arc::ptr_eq(t.upstream(), &b));
}

#[test]
fn test_eligibility_only_looks_at_immediate_predecessor() {
    // A → B(cached) → C → D: D fuses with C and depends on B.
    let runtime = RecordingRuntime::new();
    let a = input(&runtime);
    let b = StreamNode::transformed(&a, tag(1));
    b.mark_cached(StorageLevel::MemoryOnly).unwrap();
    let c = StreamNode::transformed(&b, tag(2));
    let d = StreamNode::transformed(&c, tag(3));

    let t = transformed(&d);
    assert!(t.is_fused());
    assert!(Arc::ptr_eq(t.upstream(), &b));
    assert_eq!(t.function().apply(0, vec![]), vec![2, 3]);
}

#[test]
fn test_marking_after_derivation_does_not_split_existing_child() {
    let runtime = RecordingRuntime::new();
    let a = input(&runtime);
    let b = StreamNode::transformed(&a, tag(1));
    let c = StreamNode::transformed(&b, tag(2));
    b.mark_cached(StorageLevel::MemoryOnly).unwrap();
    let c2 = StreamNode::transformed(&b, tag(2));

    assert!(transformed(&c).is_fused());
    assert!(!transformed(&c2).is_fused());
}

#[test]
fn test_other_nodes_are_not_fused() {
    let runtime = RecordingRuntime::new();
    let a = input(&runtime);
    let b = StreamNode::transformed(&a, tag(1));
    let w = StreamNode::window(&b, Duration::from_secs(3), None);
    let c = StreamNode::transformed(&w, tag(2));

    let t = transformed(&c);
    assert_eq!(
        t.decision(),
        FusionDecision::Ineligible(IneligibleReason::NotTransformed)
    );
    assert!(Arc::ptr_eq(t.upstream(), &w));
}

#[test]
fn test_output_mode_is_declared_not_inherited() {
    let runtime = RecordingRuntime::new();
    let a = input(&runtime);
    let b = StreamNode::transformed_with_mode(&a, tag(1), SerializationMode::Object);
    let c = StreamNode::transformed(&b, tag(2));

    // c fused b away but declares its own mode; its upstream is still A.
    assert_eq!(b.output_mode(), SerializationMode::Object);
    assert_eq!(c.output_mode(), SerializationMode::Byte);
    assert_eq!(transformed(&c).upstream_mode(), SerializationMode::Object);
    assert!(Arc::ptr_eq(transformed(&c).upstream(), &a));
}

#[test]
fn test_compose_never_touches_runtime() {
    let runtime = RecordingRuntime::new();
    let a = input(&runtime);
    let b = StreamNode::transformed(&a, tag(1));
    let _c = compose(tag(2), &b);

    assert!(runtime.derived_calls().is_empty());
    assert!(b.materialized_handle().is_none());
}

#[test]
fn test_deep_node_chain_builds_and_drops() {
    let runtime = RecordingRuntime::new();
    let a = input(&runtime);
    let mut node = StreamNode::transformed(&a, tag(0));
    for i in 1..100_000 {
        node = StreamNode::transformed(&node, tag(i));
    }

    assert_eq!(transformed(&node).function().depth(), 100_000);
    assert!(Arc::ptr_eq(transformed(&node).upstream(), &a));
    drop(node);
    assert_eq!(Arc::strong_count(&a), 1);
}
