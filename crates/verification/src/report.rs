//! Console rendering of verification results

use crate::compare::CompareResult;
use crate::harness::VerificationReport;
use mirror_sampler::ScalarImage;
use std::str::FromStr;

/// When the full expected and actual buffers are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DumpPolicy {
    /// Print both buffers on every run
    #[default]
    Always,
    /// Print both buffers only when the comparison fails
    OnFailure,
    /// Never print the buffers
    Never,
}

impl DumpPolicy {
    /// Returns whether the buffers should be printed for a run with this outcome
    pub fn should_dump(&self, passed: bool) -> bool {
        match self {
            DumpPolicy::Always => true,
            DumpPolicy::OnFailure => !passed,
            DumpPolicy::Never => false,
        }
    }
}

impl FromStr for DumpPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "always" => Ok(DumpPolicy::Always),
            "on-failure" | "on_failure" => Ok(DumpPolicy::OnFailure),
            "never" => Ok(DumpPolicy::Never),
            _ => Err(format!("Invalid dump policy '{s}'. Valid policies: always, on-failure, never")),
        }
    }
}

/// Significant digits of a default-formatted C++ stream
const STREAM_PRECISION: i32 = 6;

/// Renders a value the way a default-formatted C++ `std::ostream` does
///
/// Six significant digits with trailing zeros removed; values whose decimal
/// exponent is below -4 or at least 6 switch to scientific notation with a
/// two-digit exponent (`7`, `2.5`, `1e+06`, `1.5e-05`).
pub fn format_value(value: f32) -> String {
    let value = f64::from(value);
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-inf" } else { "inf" }.to_string();
    }

    // Round to the stream precision first; the exponent of the rounded value picks the notation
    let scientific = format!("{:.*e}", (STREAM_PRECISION - 1) as usize, value);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((&scientific, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if (-4..STREAM_PRECISION).contains(&exponent) {
        let decimals = (STREAM_PRECISION - 1 - exponent) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_fraction(mantissa), exponent.abs())
    }
}

/// Strips trailing zeros and a dangling decimal point
fn trim_fraction(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

/// Renders an image as a bracket-delimited grid with right-aligned columns
///
/// Every value is padded to the width of the widest rendered value, e.g.
///
/// ```text
/// [
///  [ 0  1],
///  [10 11]
/// ]
/// ```
pub fn format_grid(image: &ScalarImage) -> String {
    let cells: Vec<String> = image.as_slice().iter().copied().map(format_value).collect();
    let max_width = cells.iter().map(String::len).max().unwrap_or(0);
    let width = image.width() as usize;
    let height = image.height() as usize;

    let mut out = String::from("[\n");
    for (y, row) in cells.chunks(width).enumerate() {
        let line = row.iter().map(|cell| format!("{cell:>max_width$}")).collect::<Vec<_>>().join(" ");
        out.push_str(" [");
        out.push_str(&line);
        out.push(']');
        if y + 1 < height {
            out.push(',');
        }
        out.push('\n');
    }
    out.push_str("]\n");
    out
}

/// Describes a failed comparison for the diagnostic stream
///
/// # Returns
/// `None` when the images match
pub fn describe_mismatch(result: &CompareResult) -> Option<String> {
    match result {
        CompareResult::Match => None,
        CompareResult::DimensionMismatch {
            expected_dimensions,
            actual_dimensions,
        } => Some(format!(
            "Dimension mismatch: CPU={}x{}, Kernel={}x{}",
            expected_dimensions.0, expected_dimensions.1, actual_dimensions.0, actual_dimensions.1
        )),
        CompareResult::ValueMismatch { index, x, y, expected, actual } => {
            Some(format!(
                "Mismatch found at index {index} (x={x}, y={y}): CPU={}, Kernel={}",
                format_value(*expected),
                format_value(*actual)
            ))
        }
    }
}

/// Renders the standard-output part of a verification report
///
/// # Arguments
/// * `report` - The finished verification run
/// * `policy` - Whether to include the full buffers
pub fn render_report(report: &VerificationReport, policy: DumpPolicy) -> String {
    let verdict = if report.passed() { "PASS" } else { "FAIL" };
    let mut out = format!("\n--- Results Comparison ---\nCPU vs. {}: {verdict}\n", report.backend);

    if policy.should_dump(report.passed()) {
        out.push_str("CPU Result:\n");
        out.push_str(&format_grid(&report.expected));
        out.push_str("\nKernel Result:\n");
        out.push_str(&format_grid(&report.actual));
    }

    out
}
