//! Results of a harness run and their console table.

use std::fmt;

use crate::device::DeviceId;
use crate::harness::{BenchmarkResult, Outcome};

/// Breakeven point of one accelerated variant.  `size` is `None` when
/// the variant never beat the serial baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakeven {
    pub device: DeviceId,
    pub device_name: String,
    pub variant: String,
    pub size: Option<usize>,
}

/// Everything one [`crate::Harness::run`] produced.
#[derive(Debug, Clone, Default)]
pub struct BenchmarkReport {
    pub workload: String,
    pub results: Vec<BenchmarkResult>,
    pub breakeven: Vec<Breakeven>,
    /// Devices left out of the run, with the reason.
    pub skipped: Vec<(String, String)>,
}

impl BenchmarkReport {
    pub fn for_size(&self, size: usize) -> impl Iterator<Item = &BenchmarkResult> {
        self.results.iter().filter(move |r| r.size == size)
    }

    /// Whether every result that ran matched the serial output.
    pub fn all_verified(&self) -> bool {
        self.results
            .iter()
            .all(|r| !matches!(r.outcome, Outcome::Mismatch { .. }))
    }
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.precision$}"))
}

impl fmt::Display for BenchmarkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== {} ==", self.workload)?;
        writeln!(
            f,
            "{:>10}  {:<40} {:>12} {:>10} {:>9}  status",
            "size", "implementation", "time (ms)", "GFLOP/s", "speedup"
        )?;
        for r in &self.results {
            let status = match &r.outcome {
                Outcome::Verified => "ok".to_string(),
                Outcome::Mismatch { index, max_error } => {
                    format!("MISMATCH at {index} (max error {max_error})")
                }
                Outcome::Failed(e) => format!("FAILED: {}", e.lines().next().unwrap_or("")),
            };
            writeln!(
                f,
                "{:>10}  {:<40} {:>12} {:>10} {:>9}  {status}",
                r.size,
                r.implementation.to_string(),
                fmt_opt(r.elapsed.map(|e| e.as_secs_f64() * 1e3), 3),
                fmt_opt(r.gflops, 2),
                fmt_opt(r.speedup, 2).to_string() + if r.speedup.is_some() { "x" } else { "" },
            )?;
        }
        for b in &self.breakeven {
            match b.size {
                Some(size) => writeln!(f, "breakeven {} [{}]: size {size}", b.device_name, b.variant)?,
                None => writeln!(
                    f,
                    "breakeven {} [{}]: not reached (slower at every size)",
                    b.device_name, b.variant
                )?,
            }
        }
        for (name, reason) in &self.skipped {
            writeln!(f, "skipped {name}: {reason}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::harness::Implementation;

    fn result(size: usize, outcome: Outcome, speedup: Option<f64>) -> BenchmarkResult {
        BenchmarkResult {
            size,
            implementation: Implementation::Serial,
            outcome,
            elapsed: Some(Duration::from_millis(2)),
            gflops: speedup,
            speedup,
        }
    }

    #[test]
    fn table_lists_every_result() {
        let report = BenchmarkReport {
            workload: "vector_add".into(),
            results: vec![
                result(1024, Outcome::Verified, Some(1.0)),
                result(
                    2048,
                    Outcome::Mismatch {
                        index: 3,
                        max_error: 0.5,
                    },
                    None,
                ),
                result(4096, Outcome::Failed("enqueue kernel failed: lost".into()), None),
            ],
            breakeven: vec![
                Breakeven {
                    device: DeviceId::new(0),
                    device_name: "gpu".into(),
                    variant: "vector_add".into(),
                    size: Some(2048),
                },
                Breakeven {
                    device: DeviceId::new(1),
                    device_name: "llvmpipe".into(),
                    variant: "vector_add".into(),
                    size: None,
                },
            ],
            skipped: vec![("broken".into(), "failed to open broken: lost".into())],
        };
        let text = report.to_string();
        assert!(text.contains("== vector_add =="));
        assert!(text.contains("1.00x"));
        assert!(text.contains("MISMATCH at 3"));
        assert!(text.contains("FAILED: enqueue kernel failed"));
        assert!(text.contains("breakeven gpu [vector_add]: size 2048"));
        assert!(text.contains("llvmpipe [vector_add]: not reached"));
        assert!(text.contains("skipped broken"));
        assert!(!report.all_verified());
        assert_eq!(report.for_size(2048).count(), 1);
    }
}
