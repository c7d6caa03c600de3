//! Lifecycle Controller
//!
//! Service stop/start, schema migration and the bootstrap call, plus the state
//! machine the restore driver walks through. The external systems behind each
//! step are traits so a run can be driven against fakes.

mod bootstrap;
mod errors;
mod process;
mod retry;
mod state;

pub use bootstrap::{BootstrapService, HttpBootstrap};
pub use errors::{LifecycleError, LifecycleErrorCode, LifecycleResult};
pub use process::{
    CommandProcessController, CommandSchemaMigrator, CommandSpec, ProcessController,
    SchemaMigrator,
};
pub use retry::{retry_fixed, RetryOutcome, RetryPolicy};
pub use state::{LifecycleMachine, LifecycleState};
