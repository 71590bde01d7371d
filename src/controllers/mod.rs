pub mod acl;
pub mod cluster;
pub mod produce;
pub mod topic;

pub use acl::AclManager;
pub use cluster::{ClusterInfo, ClusterQueryService, ReplicaInfo};
pub use produce::{ProduceController, ProduceRequest};
pub use topic::TopicManager;
