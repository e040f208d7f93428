//! The read-mostly object graph: hosts, services, contacts, groups, time
//! periods, commands, dependencies, escalations (spec.md §2 component A, §3).

pub mod arena;
pub mod checkable;
pub mod comment;
pub mod command;
pub mod contact;
pub mod daterange;
pub mod dependency;
pub mod downtime;
pub mod escalation;
pub mod host;
pub mod service;
pub mod time_period;
pub mod timerange;

pub use arena::ObjectGraph;
pub use checkable::{CheckableCommon, CheckType, StateType};
pub use comment::{Comment, CommentEntryType, CommentSource};
pub use command::CommandDef;
pub use contact::{Contact, ContactGroup};
pub use daterange::{DateRange, DateRangeKind};
pub use dependency::{Dependency, DependencyType};
pub use downtime::{AcknowledgementType, Downtime, DowntimeKind};
pub use escalation::Escalation;
pub use host::{Host, HostState};
pub use service::{Service, ServiceState};
pub use time_period::TimePeriod;
pub use timerange::TimeRange;
