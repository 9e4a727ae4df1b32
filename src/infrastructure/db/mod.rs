pub mod connection;
pub mod reports;

pub use connection::init_reports_db;
pub use reports::ReportRepository;
