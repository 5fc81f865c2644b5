//! Channels between the worker and its presentation layer.
//!
//! - status-out: [`EventBus`] broadcast of [`signer_core::StatusEvent`]
//! - command-in: [`command_channel`] carrying [`signer_core::Command`]
//!
//! Both directions use non-blocking sends so the worker never stalls on a slow
//! or absent consumer.

pub mod bus;
pub mod command;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription, publish_best_effort};
pub use command::{CommandError, CommandReceiver, CommandSender, command_channel};
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
