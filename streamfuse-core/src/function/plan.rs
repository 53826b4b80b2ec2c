use serde::{Deserialize, Serialize};

use crate::error::PlanError;

/// Serializable form of one fused step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepDescriptor {
    pub udf_id: String,
    pub config: Vec<u8>,
}

/// Serializable form of a node's effective function, steps in application order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionPlan {
    pub steps: Vec<StepDescriptor>,
}

impl FunctionPlan {
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, PlanError> {
        let plan: FunctionPlan = bincode::deserialize(data)?;
        if plan.steps.is_empty() {
            return Err(PlanError::Empty);
        }
        Ok(plan)
    }

    /// Number of fused steps.
    pub fn depth(&self) -> usize {
        self.steps.len()
    }

    pub fn udf_ids(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.udf_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_plan_roundtrip() {
        let plan = FunctionPlan {
            steps: vec![
                StepDescriptor {
                    udf_id: "tokenize".to_string(),
                    config: vec![],
                },
                StepDescriptor {
                    udf_id: "scale".to_string(),
                    config: vec![1, 2, 3],
                },
            ],
        };

        let bytes = plan.to_bytes().unwrap();
        let restored = FunctionPlan::from_bytes(&bytes).unwrap();
        assert_eq!(restored, plan);
        assert_eq!(restored.depth(), 2);
        assert_eq!(restored.udf_ids().collect::<Vec<_>>(), vec!["tokenize", "scale"]);
    }

    #[test]
    fn test_empty_plan_rejected() {
        let bytes = FunctionPlan { steps: vec![] }.to_bytes().unwrap();
        assert!(matches!(
            FunctionPlan::from_bytes(&bytes),
            Err(PlanError::Empty)
        ));
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        assert!(matches!(
            FunctionPlan::from_bytes(&[0xff, 0xff, 0xff]),
            Err(PlanError::Malformed(_))
        ));
    }
}
