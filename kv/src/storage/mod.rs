pub mod keyspace;
pub mod log;
pub mod record;

pub use keyspace::Keyspace;
pub use log::DurabilityLog;
pub use record::Record;

/// Status of the keyspace, exposed mostly for diagnostics/logging.
#[derive(Clone, Debug, PartialEq, serde_derive::Serialize, serde_derive::Deserialize)]
pub struct Status {
    /// The number of live keys in the keyspace (expired-but-unpurged keys are not counted).
    pub keys: u64,
    /// The logical size of live key/value pairs, in bytes.
    pub size: u64,
}
