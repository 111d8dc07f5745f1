mod builder;
mod expand;
mod node;
mod query;
mod status;

pub use builder::build;
pub use expand::{discover_new, expand};
pub use node::PipelineNode;
pub use query::{
    find_all, find_by_uuid, find_node, get_downstream_serials, job_servers, node_at_path,
    translate_uuid,
};
#[cfg(test)]
pub use query::find_path;
pub use status::calculate_status;
