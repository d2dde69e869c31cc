pub mod cluster_svc;
pub mod controller_svc;
pub mod informer_svc;
pub mod router_svc;
