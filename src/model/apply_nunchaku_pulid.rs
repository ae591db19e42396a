//! Apply Nunchaku PuLID
//!
//! 从参考图提取人脸身份特征, 注入到 nunchaku FLUX 模型的 forward
//!
//! deep: pytorch/nunchaku/onnxruntime
//!

use candle_core::Device;
use pyo3::{
    Bound, Py, PyAny, PyResult, Python, pyclass, pymethods,
    types::{PyDict, PyType},
};

use crate::{
    core::{
        category::CATEGORY_NUNCHAKU,
        node_base::{InputSpec, InputType},
    },
    error::Error,
    pulid::{IdentityAdapter, PulidConfig},
    wrapper::{
        comfyui::{PromptServer, types::NODE_MODEL},
        nunchaku::{model::NunchakuModel, pulid::PyPulidBackend},
        torch::tensor::TensorWrapper,
    },
};

/// Apply Nunchaku PuLID
#[pyclass(subclass)]
pub struct ApplyNunchakuPuLID {
    adapter: IdentityAdapter<Py<PyAny>, Py<PyAny>>,
}

impl PromptServer for ApplyNunchakuPuLID {}

#[pymethods]
impl ApplyNunchakuPuLID {
    #[new]
    fn new() -> Self {
        Self {
            adapter: IdentityAdapter::new(PulidConfig::default()),
        }
    }

    #[classattr]
    #[pyo3(name = "RETURN_TYPES")]
    fn return_types() -> (&'static str,) {
        (NODE_MODEL,)
    }

    #[classattr]
    #[pyo3(name = "CATEGORY")]
    const CATEGORY: &'static str = CATEGORY_NUNCHAKU;

    #[classattr]
    #[pyo3(name = "TITLE")]
    const TITLE: &'static str = "Apply Nunchaku PuLID";

    #[classattr]
    #[pyo3(name = "FUNCTION")]
    const FUNCTION: &'static str = "apply";

    #[classmethod]
    #[pyo3(name = "INPUT_TYPES")]
    fn input_types(cls: &Bound<'_, PyType>) -> PyResult<Py<PyDict>> {
        Self::input_spec().build(cls.py())
    }

    #[pyo3(name = "apply")]
    fn execute<'py>(
        &mut self,
        py: Python<'py>,
        image: Bound<'py, PyAny>,
        model: Bound<'py, PyAny>,
        ip_weight: f64,
    ) -> PyResult<(Bound<'py, PyAny>,)> {
        let results = self.apply(py, image, model, ip_weight);

        match results {
            Ok(v) => Ok(v),
            Err(e) => Err(self.report_error(py, "ApplyNunchakuPuLID", e.to_string())),
        }
    }
}

impl ApplyNunchakuPuLID {
    fn input_spec() -> InputSpec {
        InputSpec::new()
            .with_required("image", InputType::image().tooltip("The image to encode"))
            .with_required("model", InputType::model().tooltip("The nunchaku model."))
            .with_required(
                "ip_weight",
                InputType::float()
                    .default(0.5)
                    .min(0.0)
                    .max(2.0)
                    .step(0.01)
                    .tooltip("ip_weight"),
            )
    }

    fn apply<'py>(
        &mut self,
        py: Python<'py>,
        image: Bound<'py, PyAny>,
        model: Bound<'py, PyAny>,
        ip_weight: f64,
    ) -> Result<(Bound<'py, PyAny>,), Error> {
        let image = TensorWrapper::<f32>::new(&image, &Device::Cpu)?.into_tensor();
        let target = NunchakuModel::new(&model)?;
        let backend = PyPulidBackend::new(py);

        self.adapter.apply(&backend, &target, &image, ip_weight)?;

        Ok((model,))
    }
}
