// Copyright @yucwang 2021

pub mod radiosity;
pub mod renderer;
