//! nunchaku PuLID 包装
//! 依赖:
//! - python: nunchaku, torch, numpy, onnxruntime

use pyo3::{
    Py, PyAny, Python,
    types::{PyAnyMethods, PyDict, PyDictMethods},
};

use crate::{
    core::utils::image::PixelArray,
    error::Error,
    pulid::{ForwardPatch, IdEmbedding, IdentityBackend, PulidConfig},
    wrapper::{nunchaku::model::NunchakuModel, torch::tensor::to_ndarray},
};

const PIPELINE_MODULE: &str = "nunchaku.models.pulid.pipeline_flux";
const FORWARD_MODULE: &str = "nunchaku.models.pulid.pulid_forward";

/// PuLIDPipeline 后端
pub struct PyPulidBackend<'py> {
    py: Python<'py>,
}

impl<'py> PyPulidBackend<'py> {
    pub fn new(py: Python<'py>) -> Self {
        Self { py }
    }
}

impl<'py> IdentityBackend for PyPulidBackend<'py> {
    type Model = NunchakuModel<'py>;
    type Pipeline = Py<PyAny>;
    type Embedding = Py<PyAny>;

    fn build_pipeline(
        &self,
        model: &NunchakuModel<'py>,
        config: &PulidConfig,
    ) -> Result<Py<PyAny>, Error> {
        let py = self.py;
        let weight_dtype = py
            .import("torch")?
            .getattr(config.weight_dtype.to_string().as_str())?;

        let kwargs = PyDict::new(py);
        kwargs.set_item("dit", model.dit())?;
        kwargs.set_item("device", config.device.to_string())?;
        kwargs.set_item("weight_dtype", weight_dtype)?;
        kwargs.set_item("onnx_provider", config.onnx_provider.to_string())?;

        let pipeline = py
            .import(PIPELINE_MODULE)?
            .getattr("PuLIDPipeline")?
            .call((), Some(&kwargs))?;

        let pretrained_model = config
            .pretrained_model
            .as_ref()
            .map(|p| p.to_string_lossy().to_string());
        pipeline.call_method1("load_pretrain", (pretrained_model,))?;

        Ok(pipeline.unbind())
    }

    fn id_embedding(
        &self,
        pipeline: &Py<PyAny>,
        pixels: &PixelArray,
    ) -> Result<IdEmbedding<Py<PyAny>>, Error> {
        let py = self.py;
        let image = to_ndarray(py, &pixels.shape, pixels.data.clone())?;

        let (cond, uncond) = pipeline
            .bind(py)
            .call_method1("get_id_embedding", (image,))?
            .extract::<(Py<PyAny>, Py<PyAny>)>()?;

        Ok(IdEmbedding { cond, uncond })
    }

    /// 等价于
    /// `dit.forward = MethodType(partial(forward, id_embeddings=.., id_weight=..), dit)`
    fn patch_forward(
        &self,
        model: &NunchakuModel<'py>,
        patch: ForwardPatch<Py<PyAny>>,
    ) -> Result<(), Error> {
        let py = self.py;
        let forward = py.import(FORWARD_MODULE)?.getattr("forward")?;

        let kwargs = PyDict::new(py);
        kwargs.set_item("id_embeddings", patch.id_embeddings)?;
        kwargs.set_item("id_weight", patch.id_weight)?;

        let partial = py
            .import("functools")?
            .getattr("partial")?
            .call((forward,), Some(&kwargs))?;
        let bound = py
            .import("types")?
            .getattr("MethodType")?
            .call1((partial, model.dit()))?;

        model.dit().setattr("forward", bound)?;
        Ok(())
    }
}
