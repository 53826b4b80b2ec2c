use std::sync::Arc;

use super::*;
use crate::test_support::{Tag, tag};

#[test]
fn test_single_step_applies_once() {
    let f = TransformFn::single(tag(7));
    assert_eq!(f.depth(), 1);
    assert_eq!(f.apply(0, vec![]), vec![7]);
}

#[test]
fn test_fused_applies_inner_first() {
    // h(t, b) = tag(2)(t, tag(1)(t, b))
    let inner = Arc::new(TransformFn::single(tag(1)));
    let h = TransformFn::fuse(inner, tag(2));

    assert_eq!(h.depth(), 2);
    assert_eq!(h.apply(0, vec![0]), vec![0, 1, 2]);
}

#[test]
fn test_long_chain_keeps_request_order() {
    let mut f = Arc::new(TransformFn::single(tag(0)));
    for i in 1..50 {
        f = Arc::new(TransformFn::fuse(f, tag(i)));
    }

    assert_eq!(f.depth(), 50);
    assert_eq!(f.apply(0, Vec::new()), (0..50).collect::<Vec<u32>>());
    assert_eq!(f.udf_ids().len(), 50);
}

#[test]
fn test_steps_see_batch_time() {
    let stamp: Arc<dyn BatchStep<Vec<u32>>> = Arc::new(Udf(crate::test_support::StampTime));
    let f = TransformFn::fuse(Arc::new(TransformFn::single(tag(1))), stamp);
    assert_eq!(f.apply(1234, vec![]), vec![1, 1234]);
}

#[test]
fn test_to_plan_captures_each_step_in_order() {
    let f = TransformFn::fuse(Arc::new(TransformFn::single(tag(3))), tag(4));
    let plan = f.to_plan().unwrap();

    assert_eq!(plan.depth(), 2);
    assert_eq!(
        plan.udf_ids().collect::<Vec<_>>(),
        vec![<Tag as UdfFunction<Vec<u32>>>::UDF_ID; 2]
    );
    let first: Tag = bincode::deserialize(&plan.steps[0].config).unwrap();
    let second: Tag = bincode::deserialize(&plan.steps[1].config).unwrap();
    assert_eq!(first, Tag(3));
    assert_eq!(second, Tag(4));
}

#[test]
fn test_serialize_decodes_to_same_plan() {
    let f = TransformFn::fuse(Arc::new(TransformFn::single(tag(3))), tag(4));
    let bytes = f.serialize().unwrap();
    assert_eq!(FunctionPlan::from_bytes(&bytes).unwrap(), f.to_plan().unwrap());
}

#[test]
fn test_closure_step_is_not_capturable() {
    let local: Arc<dyn BatchStep<Vec<u32>>> =
        Arc::new(ClosureStep::new("double", |_t: BatchTime, b: Vec<u32>| {
            b.into_iter().map(|x| x * 2).collect()
        }));
    let f = TransformFn::fuse(Arc::new(TransformFn::single(tag(1))), local);

    // Still runs in-process.
    assert_eq!(f.apply(0, vec![5]), vec![10, 2]);

    match f.serialize() {
        Err(CaptureError::NotCapturable { udf_id }) => assert_eq!(udf_id, "double"),
        other => panic!("expected NotCapturable, got {other:?}"),
    }
}

#[test]
fn test_debug_lists_udf_ids() {
    let f = TransformFn::single(tag(1));
    assert!(format!("{f:?}").contains("test::tag"));
}

#[test]
fn test_dropping_deep_chain_uses_constant_stack() {
    let depth = 200_000;
    let mut f = Arc::new(TransformFn::single(tag(0)));
    for i in 1..depth {
        f = Arc::new(TransformFn::fuse(f, tag(i)));
    }
    assert_eq!(f.depth(), depth as usize);
    drop(f);
}

#[test]
fn test_dropping_outer_link_keeps_shared_inner() {
    let inner = Arc::new(TransformFn::fuse(Arc::new(TransformFn::single(tag(1))), tag(2)));
    let outer = TransformFn::fuse(Arc::clone(&inner), tag(3));
    drop(outer);

    assert_eq!(Arc::strong_count(&inner), 1);
    assert_eq!(inner.apply(0, vec![]), vec![1, 2]);
}

mod properties {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn test_fused_chain_equals_sequential_application(
            tags in prop::collection::vec(0u32..1000, 1..64),
            time in 0i64..100_000,
        ) {
            let mut f = Arc::new(TransformFn::single(tag(tags[0])));
            for t in &tags[1..] {
                f = Arc::new(TransformFn::fuse(f, tag(*t)));
            }

            prop_assert_eq!(f.depth(), tags.len());
            prop_assert_eq!(f.apply(time, Vec::new()), tags.clone());
            let plan = FunctionPlan::from_bytes(&f.serialize().unwrap()).unwrap();
            prop_assert_eq!(plan.depth(), tags.len());
        }
    }
}
