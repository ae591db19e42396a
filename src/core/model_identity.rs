//! 模型身份
//!
//! 缓存只保存模型的弱引用句柄, 不延长模型生命周期.
//! 旧模型释放后句柄失效, 新模型即使复用了同一内存地址也不会被误认为同一个模型.

use crate::error::Error;

/// 可被缓存识别的模型
pub trait ModelIdentity {
    /// 缓存持有的句柄
    type Handle;

    /// 创建指向当前模型的句柄
    fn handle(&self) -> Result<Self::Handle, Error>;

    /// 句柄是否仍指向当前模型, 句柄失效时返回 false
    fn is_same_model(&self, handle: &Self::Handle) -> bool;
}
