//! Scenario testing with mandatory oracles.
//!
//! A [`Scenario`] describes a node configuration, the network around it, and
//! a script of peer actions and control-loop ticks. Running it requires an
//! oracle: a function that inspects the final [`World`] and decides whether
//! the run was correct.
//!
//! ```ignore
//! Scenario::new("forward one frame")
//!     .peer("sensor")
//!     .send("sensor", b"<abc>")
//!     .ticks(2)
//!     .oracle(Box::new(|world| {
//!         if world.frames() == [b"abc".to_vec()] { Ok(()) } else { Err("no frame".into()) }
//!     }))
//!     .run()
//! ```

mod builder;
mod world;

pub use builder::{RunnableScenario, Scenario};
pub use world::{SimManager, World};

/// Oracle verifying the final world state.
pub type OracleFn = Box<dyn Fn(&World) -> Result<(), String>>;
