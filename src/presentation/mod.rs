//! HTML views and their askama templates.

pub mod views;
