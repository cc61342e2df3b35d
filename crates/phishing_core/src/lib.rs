pub mod domain;
pub mod ids;
pub mod ports;

pub use domain::{Pool, Status, StatusSet, Target, TrackingContext};
pub use ids::generate_id;
pub use ports::{
    MessageSender, OutgoingMessage, PoolStore, PortError, PortResult, TargetStore,
};
