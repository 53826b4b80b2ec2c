use std::sync::Arc;

use super::*;
use crate::function::{StepDescriptor, TransformFn};
use crate::test_support::{StampTime, Tag, tag};

fn registry() -> UdfRegistry<Vec<u32>> {
    UdfRegistry::new().with_udf::<Tag>().with_udf::<StampTime>()
}

#[test]
fn test_decode_rebuilds_composite_in_order() {
    let mut f = Arc::new(TransformFn::single(tag(1)));
    f = Arc::new(TransformFn::fuse(f, tag(2)));
    f = Arc::new(TransformFn::fuse(f, Arc::new(Udf(StampTime))));
    let bytes = f.serialize().unwrap();

    let rebuilt = registry().decode(&bytes).unwrap();
    assert_eq!(rebuilt.depth(), 3);
    assert_eq!(rebuilt.apply(9, vec![]), f.apply(9, vec![]));
    assert_eq!(rebuilt.apply(9, vec![]), vec![1, 2, 9]);
}

#[test]
fn test_unknown_udf_rejected() {
    let plan = FunctionPlan {
        steps: vec![StepDescriptor {
            udf_id: "not::registered".to_string(),
            config: vec![],
        }],
    };
    match registry().validate(&plan) {
        Err(PlanError::UnknownUdf(id)) => assert_eq!(id, "not::registered"),
        other => panic!("expected UnknownUdf, got {other:?}"),
    }
}

#[test]
fn test_bad_config_reports_udf_id() {
    let plan = FunctionPlan {
        steps: vec![StepDescriptor {
            udf_id: "test::tag".to_string(),
            config: vec![1],
        }],
    };
    match registry().instantiate(&plan) {
        Err(PlanError::Config { udf_id, .. }) => assert_eq!(udf_id, "test::tag"),
        Err(other) => panic!("expected Config error, got {other:?}"),
        Ok(_) => panic!("expected Config error"),
    }
}

#[test]
fn test_contains_and_debug() {
    let registry = registry();
    assert!(registry.contains("test::tag"));
    assert!(!registry.contains("test::other"));
    let debug = format!("{registry:?}");
    assert!(debug.contains("test::stamp_time"));
}
