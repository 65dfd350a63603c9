pub mod iter_csv;

pub use iter_csv::{load_readings, to_matrix, IterCsv};
