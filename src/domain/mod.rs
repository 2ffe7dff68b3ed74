// Domain layer: the parameter mapping, run reports and the stage ports.

pub mod model;
pub mod ports;
