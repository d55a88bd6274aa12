//! Report export

pub mod json;

pub use json::{read_reports, render_reports, write_reports, ReportDocument};
