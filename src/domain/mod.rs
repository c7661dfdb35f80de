// Domain layer: models and ports. No HTTP or SDK types leak in here.

pub mod model;
pub mod ports;
