//! Throughput benchmarking across a range of MTUs
// (c) 2024 Ross Younger

mod results;
pub use results::{Bandwidths, MtuBenchmarkRecord, MtuResult, ResultTable, TrialResult};

mod runner;
pub use runner::BenchmarkRunner;

/// The MTUs to benchmark: `min`, then every `step` after it, then `max`.
///
/// `max` is always included, even when it is not on a step boundary.
/// Empty if `max < min`.
#[must_use]
pub fn mtu_sequence(min: u32, max: u32, step: u32) -> Vec<u32> {
    let mut result = Vec::new();
    if max < min {
        return result;
    }
    let step = step.max(1);
    let mut mtu = min;
    while mtu < max {
        result.push(mtu);
        match mtu.checked_add(step) {
            Some(next) => mtu = next,
            None => break,
        }
    }
    result.push(max);
    result
}

#[cfg(test)]
mod test {
    use super::mtu_sequence;

    #[test]
    fn on_boundary() {
        assert_eq!(
            mtu_sequence(1500, 5000, 500),
            vec![1500, 2000, 2500, 3000, 3500, 4000, 4500, 5000]
        );
    }

    #[test]
    fn off_boundary_max_included() {
        assert_eq!(mtu_sequence(1500, 3200, 500), vec![1500, 2000, 2500, 3000, 3200]);
    }

    #[test]
    fn single() {
        assert_eq!(mtu_sequence(1500, 1500, 500), vec![1500]);
        assert_eq!(mtu_sequence(1500, 1600, 500), vec![1500, 1600]);
    }

    #[test]
    fn inverted() {
        assert!(mtu_sequence(9000, 1500, 500).is_empty());
    }

    #[test]
    fn huge_step() {
        assert_eq!(mtu_sequence(1500, 9000, u32::MAX), vec![1500, 9000]);
    }
}
