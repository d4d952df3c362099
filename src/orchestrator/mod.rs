//! 编排器：统一的调用入口，组合缓存、限流、排队、重试与指标。
//!
//! The orchestrator: one invocation surface for every capability service.
//!
//! ```text
//! call ──► cache hit? ──yes──► return (free request)
//!              │no
//!              ▼
//!         admit(cost)? ──no──► request queue ──(window frees)──┐
//!              │yes                                            │
//!              ▼                                               ▼
//!         retry executor ──► consume budget ──► cache put ──► metrics
//! ```

mod builder;
mod call;
mod core;
mod global;
mod maintenance;
mod status;

pub use builder::OrchestratorBuilder;
pub use call::CallSpec;
pub use self::core::Orchestrator;
pub use global::{global, init_global};
pub use status::{CacheSummary, OrchestratorStatus};
