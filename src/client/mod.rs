//! Client core: everything a portal screen needs to read discussions, build
//! reply trees and cast votes without ever computing counts itself.
//!
//! Reads go through [`DiscussionRepository`], which caches per viewer.
//! Writes go through the repository (replies) or [`VoteCoordinator`] (votes);
//! after the server accepts a write the affected cache keys are dropped and
//! the next read refetches.

pub mod api;
pub mod http;
pub mod inflight;
pub mod local;
pub mod repository;
pub mod votes;

pub use api::DiscussionApi;
pub use http::HttpDiscussionApi;
pub use inflight::{InFlight, InFlightGuard};
pub use local::LocalApi;
pub use repository::DiscussionRepository;
pub use votes::{Invalidated, VoteCoordinator};
