//! Distribution drift detection.
//!
//! Each base column is compared with the same column of the candidate using a
//! two-sample Kolmogorov-Smirnov test. A column drifts when its p-value is
//! strictly below the configured threshold.

mod detector;
mod encoding;
mod ks;

pub use detector::DriftDetector;
pub use encoding::{ColumnSamples, Encoding, encode_pair};
pub use ks::{
    KsMethod, KsOutcome, asymptotic_p_value, exact_p_value, kolmogorov_sf, ks_2samp,
    statistic_numerator,
};
