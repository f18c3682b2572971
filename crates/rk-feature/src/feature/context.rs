//! Execution context handed to a running feature

use crate::config::EvaluationConfig;
use crate::kernel::{GeometryKernel, PrimitiveSpec, Solid};
use crate::merge::{SolidSet, apply_boolean_operation};
use crate::param::{BooleanOperationSpec, BoundParameters, Transform};

use super::{FeatureError, FeatureResult};

/// Everything a feature may touch during one `run` call
pub struct RunContext<'a> {
    kernel: &'a dyn GeometryKernel,
    feature_id: &'a str,
    params: &'a BoundParameters,
    config: &'a EvaluationConfig,
}

impl<'a> RunContext<'a> {
    /// Create a context for one execution
    pub fn new(
        kernel: &'a dyn GeometryKernel,
        feature_id: &'a str,
        params: &'a BoundParameters,
        config: &'a EvaluationConfig,
    ) -> Self {
        Self {
            kernel,
            feature_id,
            params,
            config,
        }
    }

    /// The geometry kernel for this pass
    pub fn kernel(&self) -> &'a dyn GeometryKernel {
        self.kernel
    }

    /// Stable identifier of the history node being executed
    pub fn feature_id(&self) -> &'a str {
        self.feature_id
    }

    /// Bound input parameters
    pub fn params(&self) -> &'a BoundParameters {
        self.params
    }

    /// Evaluation settings
    pub fn config(&self) -> &'a EvaluationConfig {
        self.config
    }

    /// Read a required numeric parameter
    pub fn number(&self, name: &str) -> FeatureResult<f64> {
        self.params
            .number(name)
            .ok_or_else(|| FeatureError::MissingParameter(name.to_owned()))
    }

    /// Read a required non-negative integral parameter
    pub fn count(&self, name: &str) -> FeatureResult<u32> {
        let value = self.number(name)?;
        if value.fract() != 0.0 || value < 0.0 || value > f64::from(u32::MAX) {
            return Err(FeatureError::InvalidParameter {
                parameter: name.to_owned(),
                reason: format!("expected a whole number, got {value}"),
            });
        }
        Ok(value as u32)
    }

    /// Read a required numeric parameter at kernel (`f32`) precision
    ///
    /// Fails when narrowing would overflow or flush a non-zero value to zero.
    pub fn real(&self, name: &str) -> FeatureResult<f32> {
        let value = self.number(name)?;
        let narrowed = value as f32;
        if !narrowed.is_finite() || (narrowed == 0.0 && value != 0.0) {
            return Err(FeatureError::InvalidParameter {
                parameter: name.to_owned(),
                reason: format!("{value} is outside the representable range"),
            });
        }
        Ok(narrowed)
    }

    /// Read an optional transform parameter
    pub fn transform(&self, name: &str) -> Option<&'a Transform> {
        self.params.transform(name)
    }

    /// Read a boolean merge parameter, treating absence as "no merge"
    pub fn boolean_operation(&self, name: &str) -> BooleanOperationSpec {
        self.params.boolean_operation(name).cloned().unwrap_or_default()
    }

    /// Construct a primitive named after this node
    pub async fn construct(&self, spec: &PrimitiveSpec) -> FeatureResult<Solid> {
        Ok(self.kernel.construct_primitive(spec, self.feature_id).await?)
    }

    /// Bake a transform into a solid; failures are reported, never dropped
    pub async fn apply_transform(&self, solid: &Solid, transform: &Transform) -> FeatureResult<()> {
        Ok(self.kernel.apply_transform(solid, transform).await?)
    }

    /// Forward a visualization hint if enabled
    pub fn visualize(&self, solid: &Solid) {
        if self.config.visualize {
            self.kernel.visualize(solid);
        }
    }

    /// Fold a new solid into the accumulated set under this node's id
    pub async fn merge(
        &self,
        solids: &SolidSet,
        new_solid: Solid,
        spec: &BooleanOperationSpec,
    ) -> FeatureResult<SolidSet> {
        Ok(apply_boolean_operation(self.kernel, solids, new_solid, spec, self.feature_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::MemoryKernel;
    use crate::param::{ParameterDefinition, ParameterSchema, bind_defaults};

    fn params(resolution: f64) -> BoundParameters {
        let schema = ParameterSchema::new(vec![
            ParameterDefinition::number("resolution", resolution, ""),
            ParameterDefinition::string("label", "", ""),
        ])
        .unwrap();
        bind_defaults(&schema)
    }

    #[test]
    fn test_count_accepts_whole_numbers() {
        let kernel = MemoryKernel::new();
        let config = EvaluationConfig::default();
        let params = params(32.0);
        let ctx = RunContext::new(&kernel, "P.S1", &params, &config);
        assert_eq!(ctx.count("resolution").unwrap(), 32);
    }

    #[test]
    fn test_count_rejects_fractions() {
        let kernel = MemoryKernel::new();
        let config = EvaluationConfig::default();
        let params = params(12.5);
        let ctx = RunContext::new(&kernel, "P.S1", &params, &config);
        assert!(matches!(
            ctx.count("resolution"),
            Err(FeatureError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_real_rejects_lossy_narrowing() {
        let kernel = MemoryKernel::new();
        let config = EvaluationConfig::default();
        let read = |value: f64| {
            let bound = params(value);
            RunContext::new(&kernel, "P.S1", &bound, &config).real("resolution")
        };

        for value in [1e-50, -1e-50, 1e39, -1e39] {
            assert!(
                matches!(read(value), Err(FeatureError::InvalidParameter { .. })),
                "{value} should be rejected"
            );
        }
        assert_eq!(read(0.0).unwrap(), 0.0);
        assert_eq!(read(2.5).unwrap(), 2.5);
    }

    #[test]
    fn test_wrong_typed_parameter_is_missing() {
        let kernel = MemoryKernel::new();
        let config = EvaluationConfig::default();
        let params = params(8.0);
        let ctx = RunContext::new(&kernel, "P.S1", &params, &config);
        assert_eq!(
            ctx.number("label"),
            Err(FeatureError::MissingParameter("label".into()))
        );
        assert!(!ctx.boolean_operation("boolean").is_merge());
    }

    #[test]
    fn test_visualize_respects_config() {
        let kernel = MemoryKernel::new();
        let config = EvaluationConfig {
            visualize: false,
            ..EvaluationConfig::default()
        };
        let params = params(8.0);
        let ctx = RunContext::new(&kernel, "P.S1", &params, &config);
        ctx.visualize(&Solid::new(uuid::Uuid::from_u128(7)));
        assert!(kernel.visualized().is_empty());
    }
}
