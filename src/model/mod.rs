//! 模型

use pyo3::{
    Bound, PyResult, Python,
    types::{PyModule, PyModuleMethods},
};

use crate::core::node::NodeRegister;

mod nunchaku_flux_lora_loader;
pub use nunchaku_flux_lora_loader::NunchakuFluxLoraLoader;

mod apply_nunchaku_pulid;
pub use apply_nunchaku_pulid::ApplyNunchakuPuLID;

/// 模型模块
pub fn submodule(py: Python<'_>) -> PyResult<Bound<'_, PyModule>> {
    let submodule = PyModule::new(py, "model")?;
    submodule.add_class::<NunchakuFluxLoraLoader>()?;
    submodule.add_class::<ApplyNunchakuPuLID>()?;
    Ok(submodule)
}

/// model node register
pub fn node_register(py: Python<'_>) -> PyResult<Vec<NodeRegister<'_>>> {
    let nodes: Vec<NodeRegister> = vec![
        NodeRegister(
            "NunchakuFluxLoraLoader",
            py.get_type::<NunchakuFluxLoraLoader>(),
            "Nunchaku FLUX.1 LoRA Loader",
        ),
        NodeRegister(
            "ApplyNunchakuPuLID",
            py.get_type::<ApplyNunchakuPuLID>(),
            "Apply Nunchaku PuLID",
        ),
    ];
    Ok(nodes)
}
