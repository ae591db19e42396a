pub mod core;
pub mod error;
pub mod lora;
pub mod model;
pub mod pulid;
pub mod wrapper;

use pyo3::{
    Bound, PyResult, Python, pymodule,
    types::{PyDict, PyModule, PyModuleMethods},
};

use crate::core::node::NodeRegister;

/// ComfyUI custom nodes implemented in Rust.
#[pymodule]
#[pyo3(name = "comfyui_nunchaku")] // 需要与包名保持一致
fn py_init(py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    // 初始化日志
    // 每个扩展模块都有自己的全局变量, 可以根据自己的需要自行设置记录器.
    let _ = tracing_subscriber::fmt()
        .with_ansi(true)
        .with_max_level(tracing::Level::DEBUG)
        .with_level(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .try_init();

    // 添加子模块
    m.add_submodule(&model::submodule(py)?)?;

    // 注册 ComfyUI NODE_CLASS_MAPPINGS/NODE_DISPLAY_NAME_MAPPINGS
    let node_mapping = PyDict::new(py);
    let name_mapping = PyDict::new(py);
    for node in node_register(py)? {
        node.register(&node_mapping, &name_mapping)?;
    }

    m.add("NODE_CLASS_MAPPINGS", node_mapping)?;
    m.add("NODE_DISPLAY_NAME_MAPPINGS", name_mapping)?;
    Ok(())
}

/// 节点注册
fn node_register(py: Python<'_>) -> PyResult<Vec<NodeRegister<'_>>> {
    let mut nodes: Vec<NodeRegister> = Vec::new();
    nodes.extend(model::node_register(py)?);
    Ok(nodes)
}
