//! # galaxy-provisioner
//!
//! Declarative provisioning of Galaxy resources.
//!
//! Each resource kind (user, quota, history, job, tool shed repository,
//! stored workflow) has a [`controller::Lifecycle`] that creates, reads,
//! updates and deletes it against a Galaxy server, mirroring the remote
//! entity into a declarative attribute store. Failures are reported as
//! [`declarative::Diagnostics`] rather than returned as errors.
//!
//! ## Example
//!
//! ```no_run
//! use galaxy_provisioner::config::ProviderConfig;
//! use galaxy_provisioner::controller::{Context, HistoryLifecycle, Lifecycle, Operation};
//! use galaxy_provisioner::CancelToken;
//! use declarative::{AttributeStore, MemoryStore, Value};
//!
//! let config = ProviderConfig::load_default()?;
//! let cancel = CancelToken::new();
//! let (galaxy, diags) = config.connect(&cancel)?;
//! assert!(!diags.has_error());
//!
//! let histories = HistoryLifecycle::new(galaxy);
//! let mut store = MemoryStore::with_schema(histories.schema());
//! store.set("name", Value::from("scratch"))?;
//!
//! let ctx = Context::new(cancel, config.poll_interval());
//! let diags = histories.apply(Operation::Create, &ctx, &mut store);
//! println!("history {} ({} diagnostics)", store.id(), diags.len());
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod cancel;
pub mod config;
pub mod controller;
pub mod data_source;
pub mod engine;
pub mod logging;
pub mod paths;
pub mod state;

pub use cancel::CancelToken;
pub use config::ProviderConfig;
pub use controller::{Context, Lifecycle, Operation};
pub use data_source::DataSource;
pub use engine::{ExecuteOptions, ExecuteSummary, Task, execute};
pub use logging::init_logging;
pub use state::StateFile;
