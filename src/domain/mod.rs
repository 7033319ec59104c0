// Domain layer: targets, manifests and the pipeline ports. No I/O here.

pub mod model;
pub mod ports;
