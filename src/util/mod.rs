//! General utility code that didn't fit anywhere else
// (c) 2024 Ross Younger

pub mod time;

mod tracing;
pub use tracing::setup as setup_tracing;

mod optionalify;
pub use optionalify::{derive_deftly_template_Optionalify, insert_if_some};

/// Rounds an MTU-sized quantity to the nearest multiple of 100 (halves round up).
///
/// Negative inputs saturate to zero.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn round_to_hundred(value: f64) -> u32 {
    if value <= 0. {
        return 0;
    }
    ((value / 100.).round() * 100.) as u32
}

/// Rounds a floating-point quantity to two decimal places
#[must_use]
pub fn round_2dp(value: f64) -> f64 {
    (value * 100.).round() / 100.
}

#[cfg(test)]
pub(crate) fn make_test_tempfile(
    data: &str,
    filename: &str,
) -> (std::path::PathBuf, tempfile::TempDir) {
    let tempdir = tempfile::tempdir().unwrap();
    let path = tempdir.path().join(filename);
    std::fs::write(&path, data).expect("Unable to write tempfile");
    (path, tempdir)
}
