pub mod chemical;
pub mod error;
pub mod money;
pub mod record;
pub mod report;

// Tabular dataset model
pub mod dataset;
