//! 节点注册

use pyo3::{
    Bound, PyResult,
    types::{PyDict, PyDictMethods, PyType},
};

/// 节点注册
/// (节点class名称, 节点对象, 节点显示名称)
pub struct NodeRegister<'py>(pub &'static str, pub Bound<'py, PyType>, pub &'static str);

impl<'py> NodeRegister<'py> {
    /// 写入 NODE_CLASS_MAPPINGS / NODE_DISPLAY_NAME_MAPPINGS
    pub fn register(
        self,
        node_mapping: &Bound<'py, PyDict>,
        name_mapping: &Bound<'py, PyDict>,
    ) -> PyResult<()> {
        let NodeRegister(class_name, class_type, display_name) = self;
        node_mapping.set_item(class_name, class_type)?;
        name_mapping.set_item(class_name, display_name)?;
        Ok(())
    }
}
