//! Benchmark result data model
// (c) 2024 Ross Younger

use strum::IntoEnumIterator as _;
use tracing::warn;

use crate::{
    throughput::{Direction, Duplex, Measurement, TrialMeasurements},
    util::round_2dp,
};

/// The tool reports Kbits/sec; we report Mbits/sec
const KBPS_PER_MBPS: f64 = 1024.;

/// One direction of one trial
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialResult {
    /// Which kind of trial produced this
    pub duplex: Duplex,
    /// Which way the data went
    pub direction: Direction,
    /// Length of the measured interval
    pub seconds: f64,
    /// Data moved, in KBytes
    pub transferred_kb: f64,
    /// Achieved rate, in Kbits/sec
    pub bandwidth_kbps: f64,
}

impl TrialResult {
    /// Builds a result from a measurement, or an all-zero result if there wasn't one
    #[must_use]
    pub fn new(duplex: Duplex, direction: Direction, measurement: Option<Measurement>) -> Self {
        let m = measurement.unwrap_or_default();
        Self {
            duplex,
            direction,
            seconds: m.seconds,
            transferred_kb: m.transferred_kb,
            bandwidth_kbps: m.bandwidth_kbps,
        }
    }

    /// Splits a trial's output into one result per direction.
    ///
    /// A direction the tool did not report becomes zeros, and a warning.
    #[must_use]
    pub fn from_trial(duplex: Duplex, trial: &TrialMeasurements) -> [Self; 2] {
        [Direction::Tx, Direction::Rx].map(|direction| {
            let m = trial.get(direction);
            if m.is_none() {
                warn!("no {duplex} {direction} figure in this trial's report; counting it as zero");
            }
            Self::new(duplex, direction, m)
        })
    }
}

/// The four series we measure, as a fixed-size table
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bandwidths {
    values: [[f64; 2]; 2],
}

impl Bandwidths {
    fn index(duplex: Duplex, direction: Direction) -> (usize, usize) {
        let d = match duplex {
            Duplex::Half => 0,
            Duplex::Full => 1,
        };
        let r = match direction {
            Direction::Tx => 0,
            Direction::Rx => 1,
        };
        (d, r)
    }

    /// Accessor
    #[must_use]
    pub fn get(&self, duplex: Duplex, direction: Direction) -> f64 {
        let (d, r) = Self::index(duplex, direction);
        self.values[d][r]
    }

    fn get_mut(&mut self, duplex: Duplex, direction: Direction) -> &mut f64 {
        let (d, r) = Self::index(duplex, direction);
        &mut self.values[d][r]
    }

    /// Iterates over all four series, half-duplex first
    pub fn series(&self) -> impl Iterator<Item = (Duplex, Direction, f64)> + '_ {
        Duplex::iter().flat_map(move |duplex| {
            Direction::iter().map(move |direction| (duplex, direction, self.get(duplex, direction)))
        })
    }

    /// The largest of the four
    #[must_use]
    pub fn max(&self) -> f64 {
        self.series().map(|(_, _, v)| v).fold(0., f64::max)
    }
}

/// Running totals for one MTU while its trials are in progress
#[derive(Debug, Clone)]
pub struct MtuBenchmarkRecord {
    mtu: u32,
    trials_per_mtu: u16,
    sums_kbps: Bandwidths,
}

impl MtuBenchmarkRecord {
    /// Starts a record for an MTU which will receive `trials_per_mtu` results per series
    #[must_use]
    pub fn new(mtu: u32, trials_per_mtu: u16) -> Self {
        Self {
            mtu,
            trials_per_mtu,
            sums_kbps: Bandwidths::default(),
        }
    }

    /// Folds in one result
    pub fn add(&mut self, result: &TrialResult) {
        *self.sums_kbps.get_mut(result.duplex, result.direction) += result.bandwidth_kbps;
    }

    /// Converts the sums to mean Mbits/sec, rounded to two places.
    ///
    /// Divides by the configured number of trials, so a missing result drags the mean down.
    #[must_use]
    pub fn finalize(self) -> MtuResult {
        let mut averages = Bandwidths::default();
        let n = f64::from(self.trials_per_mtu.max(1));
        for (duplex, direction, sum) in self.sums_kbps.series() {
            *averages.get_mut(duplex, direction) = round_2dp(sum / n / KBPS_PER_MBPS);
        }
        MtuResult {
            mtu: self.mtu,
            avg_mbps: averages,
        }
    }
}

/// Final averages for one MTU
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MtuResult {
    /// The MTU tested
    pub mtu: u32,
    /// Mean bandwidth per series, Mbits/sec
    pub avg_mbps: Bandwidths,
}

impl MtuResult {
    /// Accessor
    #[must_use]
    pub fn mbps(&self, duplex: Duplex, direction: Direction) -> f64 {
        self.avg_mbps.get(duplex, direction)
    }
}

/// The results of a whole run, in the order the MTUs were tested
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    records: Vec<MtuResult>,
}

impl ResultTable {
    /// Appends a finished record
    pub fn push(&mut self, record: MtuResult) {
        self.records.push(record);
    }

    /// The records, in test order
    #[must_use]
    pub fn records(&self) -> &[MtuResult] {
        &self.records
    }

    /// Looks up the record for an MTU
    #[must_use]
    pub fn get(&self, mtu: u32) -> Option<&MtuResult> {
        self.records.iter().find(|r| r.mtu == mtu)
    }

    /// The MTUs tested, in order
    #[must_use]
    pub fn mtus(&self) -> Vec<u32> {
        self.records.iter().map(|r| r.mtu).collect()
    }

    /// Is the table empty?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The highest value anywhere in the table. Only used to scale the chart.
    #[must_use]
    pub fn highest_bandwidth_mbps(&self) -> f64 {
        self.records
            .iter()
            .map(|r| r.avg_mbps.max())
            .fold(0., f64::max)
    }
}

#[cfg(test)]
mod test {
    use super::{MtuBenchmarkRecord, ResultTable, TrialResult};
    use crate::throughput::{Direction, Duplex, Measurement, TrialMeasurements};

    fn kbps(v: f64) -> Option<Measurement> {
        Some(Measurement {
            seconds: 10.,
            transferred_kb: v * 10. / 8.,
            bandwidth_kbps: v,
        })
    }

    #[test]
    fn mean_of_three() {
        let mut rec = MtuBenchmarkRecord::new(1500, 3);
        for v in [100., 200., 300.] {
            rec.add(&TrialResult::new(Duplex::Half, Direction::Tx, kbps(v)));
        }
        let r = rec.finalize();
        let expected = ((100. + 200. + 300.) / 3. / 1024. * 100_f64).round() / 100.;
        assert!((r.mbps(Duplex::Half, Direction::Tx) - expected).abs() < f64::EPSILON);
        assert!((r.mbps(Duplex::Half, Direction::Tx) - 0.2).abs() < f64::EPSILON);
        assert!(r.mbps(Duplex::Full, Direction::Rx).abs() < f64::EPSILON);
    }

    #[test]
    fn series_are_independent() {
        let mut rec = MtuBenchmarkRecord::new(9000, 1);
        let trial = TrialMeasurements {
            tx: kbps(1024. * 900.),
            rx: kbps(1024. * 800.),
        };
        for r in TrialResult::from_trial(Duplex::Full, &trial) {
            rec.add(&r);
        }
        let r = rec.finalize();
        assert!((r.mbps(Duplex::Full, Direction::Tx) - 900.).abs() < f64::EPSILON);
        assert!((r.mbps(Duplex::Full, Direction::Rx) - 800.).abs() < f64::EPSILON);
        assert!(r.mbps(Duplex::Half, Direction::Tx).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_direction_counts_as_zero() {
        let mut rec = MtuBenchmarkRecord::new(1500, 2);
        let good = TrialMeasurements {
            tx: kbps(2048.),
            rx: kbps(2048.),
        };
        let partial = TrialMeasurements {
            tx: kbps(2048.),
            rx: None,
        };
        for t in [good, partial] {
            for r in TrialResult::from_trial(Duplex::Half, &t) {
                rec.add(&r);
            }
        }
        let r = rec.finalize();
        assert!((r.mbps(Duplex::Half, Direction::Tx) - 2.).abs() < f64::EPSILON);
        assert!((r.mbps(Duplex::Half, Direction::Rx) - 1.).abs() < f64::EPSILON);
    }

    #[test]
    fn highest_across_table() {
        let mut table = ResultTable::default();
        assert!(table.highest_bandwidth_mbps().abs() < f64::EPSILON);
        for (mtu, v) in [(1500, 512.), (9000, 2048.)] {
            let mut rec = MtuBenchmarkRecord::new(mtu, 1);
            rec.add(&TrialResult::new(Duplex::Full, Direction::Rx, kbps(v * 1024.)));
            table.push(rec.finalize());
        }
        assert_eq!(table.mtus(), vec![1500, 9000]);
        assert!((table.highest_bandwidth_mbps() - 2048.).abs() < f64::EPSILON);
        assert!(table.get(9000).is_some());
        assert!(table.get(4000).is_none());
    }
}
