//! sf-workflow
//!
//! Coordinates supplier, admin, finance and customer actors around the
//! product record. Persistence, object storage and realtime notification
//! are reached only through the traits in [`ports`] and the [`ChangeFeed`].

pub mod caps;
pub mod error;
pub mod feed;
pub mod optimistic;
pub mod ports;
pub mod queue;
pub mod service;
pub mod storage;

pub use caps::CapabilityService;
pub use error::{WorkflowError, WorkflowResult};
pub use feed::{classify, ChangeFeed, ChangeHandler, Reaction, Subscription};
pub use optimistic::OptimisticCommand;
pub use ports::{
    Backend, CommerceStore, IdentityStore, ObjectStore, ProductStore, StoreError, StoreResult,
    TaxonomyStore,
};
pub use queue::QueueView;
pub use service::{
    AdminDecision, CatalogEntry, CatalogQuery, EditReport, MarginPreview, PlaceOrder,
    SaveAddress, SubmissionReport, SubmissionWarning, Workflow, WorkflowSettings,
    RECENT_ORDERS_LIMIT, SIMILAR_LIMIT,
};
pub use storage::LocalDirStore;
