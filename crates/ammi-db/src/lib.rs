pub mod record_store;
pub mod user_store;

pub use record_store::{
    HealthRecord, Medication, NewHealthRecord, NewMedication, RecordStore, RecordType, SourceType,
};
pub use user_store::{UserRecord, UserStore};
