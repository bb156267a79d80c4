mod app;
pub mod table;

pub use app::ProcessManagerApp;
