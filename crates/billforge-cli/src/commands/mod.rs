//! Command implementations.

pub mod audit;
pub mod generate;
pub mod list;
pub mod scenarios;
pub mod show;

pub use self::audit::execute_audit;
pub use self::generate::execute_generate;
pub use self::list::execute_list;
pub use self::scenarios::execute_scenarios;
pub use self::show::execute_show;
