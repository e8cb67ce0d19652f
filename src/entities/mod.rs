// Entity Models
//
// Parcel is the aggregate root; log entries and credits hang off it by
// parcel id. Rate records are shared by every arrears computation.

pub mod parcel;
pub mod rate;
pub mod log_entry;
pub mod credit;

pub use parcel::{CureTrack, DeadlineKind, EnforcementStep, Parcel, ParcelStatus};
pub use rate::RateRecord;
pub use log_entry::EnforcementLogEntry;
pub use credit::Credit;
