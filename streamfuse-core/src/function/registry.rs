use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;

use crate::error::PlanError;
use crate::function::{BatchStep, FunctionPlan, TransformFn, Udf, UdfFunction};

type StepDecoder<B> = Box<dyn Fn(&[u8]) -> Result<Arc<dyn BatchStep<B>>, PlanError> + Send + Sync>;

/// Runtime-side table of known UDFs.
///
/// Validates function plans and rebuilds the composite function from the
/// bytes produced by [`TransformFn::serialize`].
pub struct UdfRegistry<B> {
    decoders: AHashMap<String, StepDecoder<B>>,
}

impl<B: 'static> Default for UdfRegistry<B> {
    fn default() -> Self {
        Self {
            decoders: AHashMap::new(),
        }
    }
}

impl<B: 'static> fmt::Debug for UdfRegistry<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.decoders.keys().collect();
        ids.sort();
        f.debug_struct("UdfRegistry").field("udfs", &ids).finish()
    }
}

impl<B: 'static> UdfRegistry<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_udf<F: UdfFunction<B>>(mut self) -> Self {
        self.register::<F>();
        self
    }

    pub fn register<F: UdfFunction<B>>(&mut self) {
        self.decoders.insert(
            F::UDF_ID.to_string(),
            Box::new(|config: &[u8]| {
                let function: F =
                    bincode::deserialize(config).map_err(|source| PlanError::Config {
                        udf_id: F::UDF_ID.to_string(),
                        source,
                    })?;
                Ok(Arc::new(Udf(function)) as Arc<dyn BatchStep<B>>)
            }),
        );
    }

    pub fn contains(&self, udf_id: &str) -> bool {
        self.decoders.contains_key(udf_id)
    }

    /// Check that every step of the plan refers to a known UDF.
    pub fn validate(&self, plan: &FunctionPlan) -> Result<(), PlanError> {
        if plan.steps.is_empty() {
            return Err(PlanError::Empty);
        }
        for udf_id in plan.udf_ids() {
            if !self.contains(udf_id) {
                return Err(PlanError::UnknownUdf(udf_id.to_string()));
            }
        }
        Ok(())
    }

    /// Rebuild the composite function described by `plan`.
    pub fn instantiate(&self, plan: &FunctionPlan) -> Result<TransformFn<B>, PlanError> {
        self.validate(plan)?;
        let mut function: Option<TransformFn<B>> = None;
        for step in &plan.steps {
            let decoder = self
                .decoders
                .get(&step.udf_id)
                .ok_or_else(|| PlanError::UnknownUdf(step.udf_id.clone()))?;
            let decoded = decoder(&step.config)?;
            function = Some(match function {
                None => TransformFn::single(decoded),
                Some(inner) => TransformFn::fuse(Arc::new(inner), decoded),
            });
        }
        function.ok_or(PlanError::Empty)
    }

    /// Decode the bytes a node handed to the runtime.
    pub fn decode(&self, serialized: &[u8]) -> Result<TransformFn<B>, PlanError> {
        let plan = FunctionPlan::from_bytes(serialized)?;
        tracing::debug!("decoding function plan with {} step(s)", plan.depth());
        self.instantiate(&plan)
    }
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
