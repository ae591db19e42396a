//! 节点分类

/// Nunchaku
pub const CATEGORY_NUNCHAKU: &str = "Nunchaku";
