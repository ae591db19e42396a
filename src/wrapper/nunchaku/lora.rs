//! nunchaku.lora.flux 包装
//! 依赖:
//! - python: nunchaku

use std::path::Path;

use pyo3::{
    Bound, Py, PyAny, Python,
    types::{PyAnyMethods, PyDict, PyDictMethods, PyModule},
};

use crate::{error::Error, lora::LoraConverter};

/// nunchaku FLUX LoRA 转换器
pub struct PyLoraConverter<'py> {
    module: Bound<'py, PyModule>,
}

impl<'py> PyLoraConverter<'py> {
    pub fn new(py: Python<'py>) -> Result<Self, Error> {
        let module = py.import("nunchaku.lora.flux")?;
        Ok(Self { module })
    }
}

impl LoraConverter for PyLoraConverter<'_> {
    type State = Py<PyAny>;

    fn is_native_format(&self, lora_path: &Path) -> Result<bool, Error> {
        let result = self
            .module
            .getattr("is_nunchaku_format")?
            .call1((lora_path.to_string_lossy().to_string(),))?
            .extract::<bool>()?;
        Ok(result)
    }

    fn convert(
        &self,
        lora_path: &Path,
        base_model_path: &Path,
        output_path: Option<&Path>,
    ) -> Result<Py<PyAny>, Error> {
        let py = self.module.py();

        let kwargs = PyDict::new(py);
        kwargs.set_item(
            "output_path",
            output_path.map(|p| p.to_string_lossy().to_string()),
        )?;

        let state_dict = self.module.getattr("to_nunchaku")?.call(
            (
                lora_path.to_string_lossy().to_string(),
                base_model_path.to_string_lossy().to_string(),
            ),
            Some(&kwargs),
        )?;
        Ok(state_dict.unbind())
    }
}
