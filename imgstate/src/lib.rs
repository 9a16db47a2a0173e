//! Subresource state tracking for GPU capture and replay.
//!
//! Images are tracked per aspect, mip level and array layer. Transitions issued by the traced
//! application are recorded into per-submission [`TransitionList`]s, folded into the global ledger
//! owned by a [`ResourceManager`], persisted with [`ResourceManager::serialise_image_states`] and
//! reapplied on replay with [`ResourceManager::load_image_states`].

pub use ash::{self, vk};

pub use backend::*;
pub use config::*;
pub use error::*;
pub use ledger::*;
pub use manager::*;
pub use range::*;
pub use record::*;
pub use recorder::*;
pub use region::*;
pub use serial::{read_image_states, write_image_states, DecodeError, SerialisedImage};
pub use vulkan::*;

mod backend;
mod config;
mod error;
mod ledger;
mod manager;
mod range;
mod record;
mod recorder;
mod region;
mod serial;
mod vulkan;
