//! Actors that drive the fleet
//!
//! Each actor runs as an independent tokio task and is controlled through a
//! cloneable handle.
//!
//! ```text
//!             ┌──────────────┐   SweepNow / SetLoadBalancing / ...
//!   API ─────►│ SweeperHandle│──────────────┐
//!             └──────────────┘              ▼
//!                                  ┌─────────────────┐
//!                    interval ────►│  SweeperActor   │──► FleetCoordinator::sweep
//!                                  └────────┬────────┘
//!                                           │ SweepEvent
//!                                  ┌────────▼────────┐
//!                                  │ broadcast (MPMC)│──► subscribers
//!                                  └─────────────────┘
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: mpsc command channel per actor
//! 2. **Events**: broadcast channel for fan-out
//! 3. **Request/Response**: oneshot channels inside commands

pub mod messages;
pub mod sweeper;

pub use messages::{SweepEvent, SweeperCommand, SweeperStats};
pub use sweeper::{SweeperActor, SweeperHandle};
