// Copyright @yucwang 2021

pub mod emitter;
pub mod interaction;
pub mod rng;
pub mod scene;
pub mod sensor;
pub mod shape;
pub mod stats;
pub mod ticket;
pub mod tracer;
