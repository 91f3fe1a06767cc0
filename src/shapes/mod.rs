// Copyright @yucwang 2021

pub mod rectangle;
pub mod sphere;
