// Copyright @yucwang 2021

pub mod core;
pub mod emitters;
pub mod integrators;
pub mod io;
pub mod math;
pub mod radiosity;
pub mod renderers;
pub mod scenes;
pub mod sensors;
pub mod shapes;
