//! One data provider per top-level view.

mod cluster;
mod source;
mod template;
mod workload;

pub use cluster::ClusterDataProvider;
pub use source::SourceDataProvider;
pub use template::TemplateDataProvider;
pub use workload::WorkloadDataProvider;
