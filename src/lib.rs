pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::bootstrap::{bootstrap_workspace, BootstrapResult};
pub use application::error::ReconcileError;
pub use application::reconciler::{EventReconciler, MergeSummary, UpdateOutcome};
pub use domain::change_set::{build_change_set, ChangeSet};
pub use domain::identity::{identity_matches, IdentityRule};
pub use domain::models::{CalendarEvent, EventDraft, EventForm, EventState, Occurrence};
pub use domain::temporal::{
    combine_date_and_time, format_for_display, DisplayStyle, DisplayText, TemporalError,
    TemporalNormalizer,
};
pub use infrastructure::calendar_store_client::{
    ExternalCalendarProvider, NoExternalProvider, OfflineCalendarStore, RemoteCalendarStore,
    ReqwestCalendarStore,
};
pub use infrastructure::error::InfraError;
pub use infrastructure::event_mapper::RemoteEventRecord;
