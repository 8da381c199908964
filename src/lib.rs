//! Agentry — agent dispatch and generation pipeline.
//!
//! Invoke a named action on a declared agent, run it through configurable
//! before/after/around callback chains, dispatch the resulting prompt to a
//! pluggable generation provider (blocking or streaming), and receive the
//! result now or defer it to a job queue.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use agentry::prelude::*;
//!
//! # async fn example() -> agentry::error::Result<()> {
//! let config = ProviderConfigTable::from_env();
//! let agent = AgentDefinition::builder("support")
//!     .generate_with("openai", &config)?
//!     .action("answer", |instance, _args| {
//!         instance.set_instructions("You are a support agent.");
//!         instance.set_content("How do I reset my password?");
//!         Ok(())
//!     })
//!     .register()?;
//!
//! let runtime = Runtime::new(
//!     Arc::new(InMemoryMessageStore::new()),
//!     Arc::new(TracingNotifier),
//!     Arc::new(InProcessQueue::new()),
//! );
//!
//! let mut generation = Generation::new(agent, runtime, "answer", vec![]);
//! let answer = generation.content().await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod callbacks;
pub mod config;
pub mod error;
pub mod generation;
pub mod operation;
pub mod prelude;
pub mod provider;
pub mod queue;
pub mod storage;
pub mod streaming;
pub mod types;
