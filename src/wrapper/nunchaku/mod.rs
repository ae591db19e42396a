//! nunchaku 包装
pub mod lora;
pub mod model;
pub mod pulid;
