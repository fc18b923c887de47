//! User preference memory for the trailfit recommender.
//!
//! [`PreferenceStore`] keeps one durable [`UserProfile`](trailfit_core::UserProfile)
//! per normalized user id in a single JSON document, layers session-only
//! overrides on top, and folds free-text feedback into preferences through the
//! [`FeedbackExtractor`].

pub mod error;
pub mod feedback;
pub mod store;

mod persist;

pub use error::{StoreError, StoreWarning};
pub use feedback::FeedbackExtractor;
pub use store::{
    FeedbackContext, FeedbackPolicy, Identified, PreferenceStore, ProfileRead,
    ProfileUpdate, FEEDBACK_HISTORY_LIMIT,
};
