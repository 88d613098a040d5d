pub mod csv_writer;
pub mod export;
