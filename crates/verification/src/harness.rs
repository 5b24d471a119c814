//! Verification harness
//!
//! Drives one verification run: generates the deterministic source image,
//! computes the expected output on the host, asks a compute backend for the
//! actual output over the same input and offset, and compares the two.
//!
//! A disagreement between the reference and the backend is the subject under
//! test and is reported through [`VerificationReport`], not as an error. Only
//! an invalid configuration or a failing backend aborts the run.

use crate::compare::{CompareResult, compare_images};
use crate::report::DumpPolicy;
use mirror_sampler::{ComputeBackend, ImageError, Offset, ScalarImage, reference_mirrored_repeat};
use thiserror::Error;

/// Fatal errors that abort a verification run
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The run parameters are unusable
    #[error("invalid verification config: {0}")]
    InvalidConfig(String),
    /// The host-side images could not be built
    #[error(transparent)]
    Image(#[from] ImageError),
    /// The compute backend failed to produce a result
    #[error("backend '{backend}' failed: {source}")]
    Backend {
        backend: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Largest offset a kernel can apply; kernels shift coordinates in 32-bit signed arithmetic
pub const MAX_OFFSET: u32 = i32::MAX as u32;

/// Parameters of a verification run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarnessConfig {
    /// `(width, height)` of the generated source image
    pub source_dims: (u32, u32),
    /// `(width, height)` of the destination grid
    pub destination_dims: (u32, u32),
    /// Shift applied to every destination coordinate before mirroring
    pub offset: Offset,
    /// When to print the full buffers
    pub dump: DumpPolicy,
}

impl Default for HarnessConfig {
    /// The canonical run: a 4x5 source sampled into 12x12 with offset (5, 2),
    /// which reflects on every edge of the destination
    fn default() -> Self {
        Self {
            source_dims: (4, 5),
            destination_dims: (12, 12),
            offset: Offset::new(5, 2),
            dump: DumpPolicy::Always,
        }
    }
}

impl HarnessConfig {
    /// Checks that every extent is non-zero and the offset fits the kernels' `i32` coordinates
    pub fn validate(&self) -> Result<(), HarnessError> {
        let (sw, sh) = self.source_dims;
        let (dw, dh) = self.destination_dims;
        if sw == 0 || sh == 0 {
            return Err(HarnessError::InvalidConfig(format!("source dimensions must be non-zero, got {sw}x{sh}")));
        }
        if dw == 0 || dh == 0 {
            return Err(HarnessError::InvalidConfig(format!("destination dimensions must be non-zero, got {dw}x{dh}")));
        }
        if self.offset.x > MAX_OFFSET || self.offset.y > MAX_OFFSET {
            return Err(HarnessError::InvalidConfig(format!(
                "offset ({}, {}) exceeds the maximum of {MAX_OFFSET} per axis",
                self.offset.x, self.offset.y
            )));
        }
        Ok(())
    }

    /// Returns whether mirrored wrap-around happens on all four destination edges
    ///
    /// The near edges reflect only when the offset is non-zero. The far edges
    /// reflect only when the destination reaches past one full source extent
    /// beyond the offset.
    pub fn exercises_all_edges(&self) -> bool {
        let (sw, sh) = self.source_dims;
        let (dw, dh) = self.destination_dims;
        let far_edge_reached = |offset: u32, source: u32, destination: u32| u64::from(destination) > u64::from(offset) + u64::from(source);

        self.offset.x > 0 && self.offset.y > 0 && far_edge_reached(self.offset.x, sw, dw) && far_edge_reached(self.offset.y, sh, dh)
    }
}

/// Outcome of one verification run
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationReport {
    /// Name of the backend under test
    pub backend: String,
    pub source_dims: (u32, u32),
    pub offset: Offset,
    /// Output of the host reference evaluator
    pub expected: ScalarImage,
    /// Output of the backend
    pub actual: ScalarImage,
    pub result: CompareResult,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.result.is_match()
    }
}

/// A configured verification run
#[derive(Debug, Clone)]
pub struct Verification {
    config: HarnessConfig,
}

impl Verification {
    /// Creates a run, rejecting configurations with empty images
    pub fn new(config: HarnessConfig) -> Result<Self, HarnessError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Runs the reference and the backend on the same input and compares them
    ///
    /// # Arguments
    /// * `backend` - The compute backend under test
    ///
    /// # Returns
    /// The report, whether or not the outputs matched; an error only if the
    /// backend itself failed
    pub fn run<B: ComputeBackend>(&self, backend: &mut B) -> Result<VerificationReport, HarnessError> {
        let HarnessConfig {
            source_dims,
            destination_dims,
            offset,
            ..
        } = self.config;

        if !self.config.exercises_all_edges() {
            tracing::warn!(
                "Offset ({}, {}) with source {}x{} and destination {}x{} does not reflect on every edge",
                offset.x,
                offset.y,
                source_dims.0,
                source_dims.1,
                destination_dims.0,
                destination_dims.1
            );
        }

        let source = ScalarImage::index_ramp(source_dims.0, source_dims.1)?;
        let expected = reference_mirrored_repeat(&source, destination_dims.0, destination_dims.1, offset)?;
        tracing::debug!("Reference evaluator produced {} values", expected.as_slice().len());

        tracing::info!("Dispatching to {}", backend.name());
        let actual = backend.run_mapping(&source, destination_dims, offset).map_err(|e| HarnessError::Backend {
            backend: backend.name().to_string(),
            source: Box::new(e),
        })?;

        let result = compare_images(&expected, &actual);
        tracing::info!("Comparison finished: {}", if result.is_match() { "match" } else { "mismatch" });

        Ok(VerificationReport {
            backend: backend.name().to_string(),
            source_dims,
            offset,
            expected,
            actual,
            result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_sampler::CpuBackend;

    /// Backend that returns a fixed image regardless of its input
    struct FixedBackend(ScalarImage);

    impl ComputeBackend for FixedBackend {
        type Error = ImageError;

        fn name(&self) -> &str {
            "Fixed"
        }

        fn run_mapping(&mut self, _source: &ScalarImage, _dst_dims: (u32, u32), _offset: Offset) -> Result<ScalarImage, Self::Error> {
            Ok(self.0.clone())
        }
    }

    /// Backend that always fails
    struct BrokenBackend;

    impl ComputeBackend for BrokenBackend {
        type Error = std::io::Error;

        fn name(&self) -> &str {
            "Broken"
        }

        fn run_mapping(&mut self, _source: &ScalarImage, _dst_dims: (u32, u32), _offset: Offset) -> Result<ScalarImage, Self::Error> {
            Err(std::io::Error::other("device lost"))
        }
    }

    #[test]
    fn test_canonical_run_passes_on_cpu_backend() {
        let verification = Verification::new(HarnessConfig::default()).unwrap();
        let report = verification.run(&mut CpuBackend::new()).unwrap();

        assert!(report.passed());
        assert_eq!(report.backend, "CPU Software Backend");
        assert_eq!(report.expected.as_slice().len(), 144);
        assert_eq!(report.expected.get(0, 0), Some(7.0));
        assert_eq!(report.actual, report.expected);
    }

    #[test]
    fn test_mismatch_is_reported_not_raised() {
        let config = HarnessConfig::default();
        let source = ScalarImage::index_ramp(4, 5).unwrap();
        let mut data = reference_mirrored_repeat(&source, 12, 12, config.offset).unwrap().into_vec();
        data[30] += 1.0;
        data[100] += 1.0;
        let mut backend = FixedBackend(ScalarImage::new(12, 12, data).unwrap());

        let report = Verification::new(config).unwrap().run(&mut backend).unwrap();

        assert!(!report.passed());
        assert!(matches!(report.result, CompareResult::ValueMismatch { index: 30, x: 6, y: 2, .. }));
    }

    #[test]
    fn test_wrong_dimensions_are_a_mismatch() {
        let mut backend = FixedBackend(ScalarImage::filled(8, 8, 0.0).unwrap());
        let report = Verification::new(HarnessConfig::default()).unwrap().run(&mut backend).unwrap();

        assert_eq!(
            report.result,
            CompareResult::DimensionMismatch {
                expected_dimensions: (12, 12),
                actual_dimensions: (8, 8),
            }
        );
    }

    #[test]
    fn test_backend_failure_is_fatal() {
        let error = Verification::new(HarnessConfig::default()).unwrap().run(&mut BrokenBackend).unwrap_err();
        assert!(matches!(error, HarnessError::Backend { ref backend, .. } if backend == "Broken"));
        assert_eq!(error.to_string(), "backend 'Broken' failed: device lost");
    }

    #[test]
    fn test_identity_run() {
        let config = HarnessConfig {
            source_dims: (4, 5),
            destination_dims: (4, 5),
            offset: Offset::ZERO,
            dump: DumpPolicy::Never,
        };
        let report = Verification::new(config).unwrap().run(&mut CpuBackend::new()).unwrap();

        assert!(report.passed());
        assert_eq!(report.expected, ScalarImage::index_ramp(4, 5).unwrap());
    }

    #[test]
    fn test_zero_extent_config_is_rejected() {
        let config = HarnessConfig {
            destination_dims: (0, 12),
            ..HarnessConfig::default()
        };
        assert!(matches!(Verification::new(config), Err(HarnessError::InvalidConfig(_))));
    }

    #[test]
    fn test_offset_beyond_i32_is_rejected() {
        let config = HarnessConfig {
            source_dims: (5, 5),
            offset: Offset::new(3_000_000_000, 2),
            ..HarnessConfig::default()
        };
        let error = Verification::new(config).unwrap_err();
        assert!(matches!(error, HarnessError::InvalidConfig(_)));
        assert_eq!(
            error.to_string(),
            "invalid verification config: offset (3000000000, 2) exceeds the maximum of 2147483647 per axis"
        );

        let largest = HarnessConfig {
            offset: Offset::new(MAX_OFFSET, MAX_OFFSET),
            ..HarnessConfig::default()
        };
        assert!(Verification::new(largest).is_ok());
    }

    #[test]
    fn test_edge_coverage() {
        assert!(HarnessConfig::default().exercises_all_edges());

        let zero_offset = HarnessConfig {
            offset: Offset::ZERO,
            ..HarnessConfig::default()
        };
        assert!(!zero_offset.exercises_all_edges());

        // 12 columns with offset 8 over a 4-wide source never pass the far edge
        let short_destination = HarnessConfig {
            offset: Offset::new(8, 2),
            ..HarnessConfig::default()
        };
        assert!(!short_destination.exercises_all_edges());
    }
}
