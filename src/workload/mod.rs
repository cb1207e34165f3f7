pub mod executor;
pub mod selector;
pub mod template;

pub use executor::{ExecutorConfig, WorkloadExecutor};
pub use selector::{ContentionConfig, KeySelector};
pub use template::WorkloadTemplate;
