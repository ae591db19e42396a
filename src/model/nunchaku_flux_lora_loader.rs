//! Nunchaku FLUX.1 LoRA Loader
//!
//! GitHub:
//!     - https://github.com/nunchaku-tech/ComfyUI-nunchaku
//! Nunchaku lib:
//!     - https://github.com/nunchaku-tech/nunchaku
//!
//! deep: pytorch/nunchaku
//!

use pyo3::{
    Bound, Py, PyAny, PyResult, Python, pyclass, pymethods,
    types::{PyDict, PyType},
};

use crate::{
    core::{
        category::CATEGORY_NUNCHAKU,
        node_base::{InputSpec, InputType},
        utils::directory::list_subdirectories,
    },
    error::Error,
    lora::{LORA_NONE, LoraLoader, LoraRequest, LoraSelection, SaveMode},
    wrapper::{
        comfy::folder_paths::FolderPaths,
        comfyui::{PromptServer, types::NODE_MODEL},
        nunchaku::{lora::PyLoraConverter, model::NunchakuModel},
    },
};

/// Nunchaku FLUX.1 LoRA Loader
#[pyclass(subclass)]
pub struct NunchakuFluxLoraLoader {
    loader: LoraLoader<Py<PyAny>>,
}

impl PromptServer for NunchakuFluxLoraLoader {}

#[pymethods]
impl NunchakuFluxLoraLoader {
    #[new]
    fn new() -> Self {
        Self {
            loader: LoraLoader::new(),
        }
    }

    // 返回参数类型
    #[classattr]
    #[pyo3(name = "RETURN_TYPES")]
    fn return_types() -> (&'static str,) {
        (NODE_MODEL,)
    }

    // 返回参数提示
    #[classattr]
    #[pyo3(name = "OUTPUT_TOOLTIPS")]
    fn output_tooltips() -> (&'static str,) {
        ("The modified diffusion model.",)
    }

    // 节点分类
    #[classattr]
    #[pyo3(name = "CATEGORY")]
    const CATEGORY: &'static str = CATEGORY_NUNCHAKU;

    #[classattr]
    #[pyo3(name = "TITLE")]
    const TITLE: &'static str = "Nunchaku FLUX.1 LoRA Loader";

    // 节点描述
    #[classattr]
    #[pyo3(name = "DESCRIPTION")]
    fn description() -> &'static str {
        "LoRAs are used to modify the diffusion model, \
        altering the way in which latents are denoised such as applying styles. \
        Currently, only one LoRA nodes can be applied."
    }

    #[classattr]
    #[pyo3(name = "FUNCTION")]
    const FUNCTION: &'static str = "load_lora";

    #[classmethod]
    #[pyo3(name = "INPUT_TYPES")]
    fn input_types(cls: &Bound<'_, PyType>) -> PyResult<Py<PyDict>> {
        let folder_paths = FolderPaths::default();
        let base_models = list_subdirectories(&folder_paths.folder_paths("diffusion_models"));

        Self::input_spec(Self::get_lora_list(&folder_paths), base_models).build(cls.py())
    }

    #[pyo3(name = "load_lora")]
    fn execute<'py>(
        &mut self,
        py: Python<'py>,
        model: Bound<'py, PyAny>,
        lora_name: &str,
        base_model_name: &str,
        lora_strength: f64,
        save_converted_lora: &str,
    ) -> PyResult<(Bound<'py, PyAny>,)> {
        let results = self.load_lora(
            py,
            model,
            lora_name,
            base_model_name,
            lora_strength,
            save_converted_lora,
        );

        match results {
            Ok(v) => Ok(v),
            Err(e) => Err(self.report_error(py, "NunchakuFluxLoraLoader", e.to_string())),
        }
    }
}

impl NunchakuFluxLoraLoader {
    /// LoRA 下拉列表, 首项为 None
    fn get_lora_list(folder_paths: &FolderPaths) -> Vec<String> {
        let mut lora_list = vec![LORA_NONE.to_string()];
        lora_list.extend(folder_paths.get_filename_list("loras"));
        lora_list
    }

    fn input_spec(lora_list: Vec<String>, base_models: Vec<String>) -> InputSpec {
        InputSpec::new()
            .with_required(
                "model",
                InputType::model().tooltip("The diffusion model the LoRA will be applied to."),
            )
            .with_required(
                "lora_name",
                InputType::list(lora_list).tooltip("The name of the LoRA."),
            )
            .with_required(
                "base_model_name",
                InputType::list(base_models).tooltip(
                    "If the lora format is SVDQuant, this field has no use. \
                    Otherwise, the base model's state dictionary is required \
                    for converting the LoRA weights to SVDQuant.",
                ),
            )
            .with_required(
                "lora_strength",
                InputType::float()
                    .default(1.0)
                    .min(-100.0)
                    .max(100.0)
                    .step(0.01)
                    .tooltip(
                        "How strongly to modify the diffusion model. This value can be negative.",
                    ),
            )
            .with_required(
                "save_converted_lora",
                InputType::list(vec![
                    SaveMode::Disable.to_string(),
                    SaveMode::Enable.to_string(),
                ])
                .tooltip(
                    "If enabled, the converted LoRA will be saved as a .safetensors file \
                    in the save directory of your LoRA file.",
                ),
            )
    }

    /// 加载LoRA
    fn load_lora<'py>(
        &mut self,
        py: Python<'py>,
        model: Bound<'py, PyAny>,
        lora_name: &str,
        base_model_name: &str,
        lora_strength: f64,
        save_converted_lora: &str,
    ) -> Result<(Bound<'py, PyAny>,), Error> {
        let request = LoraRequest {
            lora_name: LoraSelection::from(lora_name),
            base_model_name: base_model_name.to_string(),
            lora_strength,
            save_mode: save_converted_lora.parse::<SaveMode>()?,
        };

        let converter = PyLoraConverter::new(py)?;
        let target = NunchakuModel::new(&model)?;
        let folder_paths = FolderPaths::default();

        self.loader
            .load(&converter, &folder_paths, &target, &request)?;

        Ok((model,))
    }
}
