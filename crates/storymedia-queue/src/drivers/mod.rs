//! Stage drivers
//!
//! Each driver owns the external work of one stage. Drivers receive an item
//! id, never a long-lived item reference: they re-read the item from the
//! store, call their collaborator and hand a transition back to the store.
//! A hard failure cancels only the item being driven.

pub(crate) mod placeholder;
pub(crate) mod prepare;
pub(crate) mod transcode;
pub(crate) mod upload;
