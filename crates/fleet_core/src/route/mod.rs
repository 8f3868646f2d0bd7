#[allow(clippy::module_inception)]
pub mod route;
pub mod route_stitcher;
