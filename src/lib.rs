//! Data preparation and evaluation for clustering vowel formant
//! measurements: per-speaker normalization, category subsets,
//! speaker-level means, a common adapter over the k-means, Gaussian
//! mixture and DBSCAN implementations of `linfa-clustering`, and the
//! contingency tables and criterion sweeps used to judge the results.

pub mod aggregate;
pub mod analysis_config;
pub mod cluster;
pub mod config_file;
pub mod contingency;
pub mod ctx;
pub mod data_table;
pub mod error;
pub mod get_terminal_width;
pub mod loader;
pub mod normalize;
pub mod pipeline;
pub mod stats;
pub mod subset;
pub mod sweep;
pub mod tables;
pub mod utillib;
