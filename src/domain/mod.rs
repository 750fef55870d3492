// Domain layer: core models and ports (interfaces) for the content-to-calendar pipeline.

pub mod model;
pub mod ports;
