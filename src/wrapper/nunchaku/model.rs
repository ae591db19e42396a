//! Nunchaku FLUX 扩散模型句柄
//!
//! ComfyUI MODEL 为 ModelPatcher, nunchaku 的 transformer 位于
//! `model.model.diffusion_model.model`

use log::warn;
use pyo3::{Bound, Py, PyAny, types::PyAnyMethods};

use crate::{
    core::model_identity::ModelIdentity,
    error::Error,
    lora::{LoraParams, LoraTarget},
};

/// nunchaku transformer 句柄
pub struct NunchakuModel<'py> {
    dit: Bound<'py, PyAny>,
}

impl<'py> NunchakuModel<'py> {
    /// 从 ComfyUI MODEL 中取出 nunchaku transformer
    pub fn new(model: &Bound<'py, PyAny>) -> Result<Self, Error> {
        let dit = model
            .getattr("model")?
            .getattr("diffusion_model")?
            .getattr("model")?;
        Ok(Self { dit })
    }

    /// transformer 对象
    pub fn dit(&self) -> &Bound<'py, PyAny> {
        &self.dit
    }
}

impl ModelIdentity for NunchakuModel<'_> {
    /// `weakref.ref(dit)`
    type Handle = Py<PyAny>;

    fn handle(&self) -> Result<Py<PyAny>, Error> {
        let weak = self
            .dit
            .py()
            .import("weakref")?
            .getattr("ref")?
            .call1((&self.dit,))?;
        Ok(weak.unbind())
    }

    fn is_same_model(&self, handle: &Py<PyAny>) -> bool {
        match handle.bind(self.dit.py()).call0() {
            Ok(referent) => referent.is(&self.dit),
            Err(e) => {
                warn!("resolve model weakref failed, {e}");
                false
            }
        }
    }
}

impl LoraTarget for NunchakuModel<'_> {
    type State = Py<PyAny>;

    fn set_lora_strength(&self, strength: f64) -> Result<(), Error> {
        self.dit.call_method1("set_lora_strength", (strength,))?;
        Ok(())
    }

    fn update_lora_params(&self, params: LoraParams<Py<PyAny>>) -> Result<(), Error> {
        match params {
            LoraParams::Path(path) => {
                let path = path.to_string_lossy().to_string();
                self.dit.call_method1("update_lora_params", (path,))?
            }
            LoraParams::Converted(state_dict) => {
                self.dit.call_method1("update_lora_params", (state_dict,))?
            }
        };
        Ok(())
    }
}
