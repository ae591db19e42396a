//! ComfyUI 节点输入构建器
//!
//! 用类型化的构建器生成 ComfyUI 节点的 INPUT_TYPES
//!
//! # 使用示例
//!
//! ```rust,ignore
//! Python::attach(|py| {
//!     InputSpec::new()
//!         .with_required("model", InputType::model().tooltip("The diffusion model."))
//!         .with_required("weight", InputType::float().default(0.5).min(0.0).max(2.0))
//!         .build(py)
//! })
//! ```

use indexmap::IndexMap;
use pyo3::{
    Bound, IntoPyObject, Py, PyAny, PyResult, Python,
    types::{PyDict, PyDictMethods},
};

use crate::wrapper::comfyui::types::{NODE_FLOAT, NODE_IMAGE, NODE_MODEL};

/// 输入规范构建器
///
/// 用于构建 ComfyUI 节点的 INPUT_TYPES 字典结构, 当前节点只有必需输入
#[derive(Default)]
pub struct InputSpec {
    required: Vec<(String, InputType)>,
}

impl InputSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加必需输入
    pub fn with_required(mut self, name: impl Into<String>, input: InputType) -> Self {
        self.required.push((name.into(), input));
        self
    }

    /// 必需输入名称, 按声明顺序
    pub fn required_names(&self) -> Vec<&str> {
        self.required.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// 构建 PyDict
    pub fn build(self, py: Python<'_>) -> PyResult<Py<PyDict>> {
        let dict = PyDict::new(py);

        let required = PyDict::new(py);
        for (name, input_type) in self.required {
            required.set_item(name, input_type.to_py_tuple(py)?)?;
        }
        dict.set_item("required", required)?;

        Ok(dict.into())
    }
}

/// 输入类型（包含类型和参数）
pub struct InputType {
    kind: InputKind,
    params: IndexMap<String, ParamValue>,
    list_options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum InputKind {
    Float,
    List,
    Image,
    Model,
}

/// 参数值
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    String(String),
    Float(f64),
}

impl InputType {
    fn new(kind: InputKind) -> Self {
        Self {
            kind,
            params: IndexMap::new(),
            list_options: Vec::new(),
        }
    }

    /// Float 类型
    pub fn float() -> Self {
        Self::new(InputKind::Float)
    }

    /// Image 类型
    pub fn image() -> Self {
        Self::new(InputKind::Image)
    }

    /// Model 类型
    pub fn model() -> Self {
        Self::new(InputKind::Model)
    }

    /// 下拉选项列表
    pub fn list(options: Vec<String>) -> Self {
        Self {
            list_options: options,
            ..Self::new(InputKind::List)
        }
    }

    /// 设置默认值
    pub fn default<V: Into<ParamValue>>(mut self, value: V) -> Self {
        self.params.insert("default".to_string(), value.into());
        self
    }

    /// 设置提示文本
    pub fn tooltip<V: Into<ParamValue>>(mut self, value: V) -> Self {
        self.params.insert("tooltip".to_string(), value.into());
        self
    }

    /// 设置最小值
    pub fn min<V: Into<ParamValue>>(mut self, value: V) -> Self {
        self.params.insert("min".to_string(), value.into());
        self
    }

    /// 设置最大值
    pub fn max<V: Into<ParamValue>>(mut self, value: V) -> Self {
        self.params.insert("max".to_string(), value.into());
        self
    }

    /// 设置步长
    pub fn step<V: Into<ParamValue>>(mut self, value: V) -> Self {
        self.params.insert("step".to_string(), value.into());
        self
    }

    /// 转换为 Python 元组
    ///
    /// 列表类型：(options_list, params_dict)
    /// 其他类型：(type_name, params_dict)
    fn to_py_tuple<'py>(self, py: Python<'py>) -> PyResult<Bound<'py, PyAny>> {
        let params_dict = self.params.to_py_dict(py)?;

        let type_str = match self.kind {
            InputKind::List => {
                return Ok((self.list_options, params_dict)
                    .into_pyobject(py)?
                    .into_any());
            }
            InputKind::Float => NODE_FLOAT,
            InputKind::Image => NODE_IMAGE,
            InputKind::Model => NODE_MODEL,
        };
        Ok((type_str, params_dict).into_pyobject(py)?.into_any())
    }
}

/// 将 IndexMap<String, ParamValue> 转换为 PyDict
trait ToPyDict {
    fn to_py_dict<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>>;
}

impl ToPyDict for IndexMap<String, ParamValue> {
    fn to_py_dict<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let dict = PyDict::new(py);
        for (key, value) in self {
            match value {
                ParamValue::String(s) => dict.set_item(key, s.as_str())?,
                ParamValue::Float(f) => dict.set_item(key, *f)?,
            }
        }
        Ok(dict)
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::String(s)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::String(s.to_string())
    }
}

impl From<f64> for ParamValue {
    fn from(f: f64) -> Self {
        ParamValue::Float(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_order_is_kept() -> anyhow::Result<()> {
        let spec = InputSpec::new()
            .with_required("model", InputType::model())
            .with_required("lora_name", InputType::list(vec!["None".to_string()]))
            .with_required("lora_strength", InputType::float().default(1.0));

        assert_eq!(
            spec.required_names(),
            vec!["model", "lora_name", "lora_strength"]
        );
        Ok(())
    }

    #[test]
    fn test_list_keeps_options() -> anyhow::Result<()> {
        let options = vec!["disable".to_string(), "enable".to_string()];
        let input = InputType::list(options.clone()).tooltip("save");

        assert_eq!(input.kind, InputKind::List);
        assert_eq!(input.list_options, options);
        assert_eq!(
            input.params.get("tooltip"),
            Some(&ParamValue::String("save".to_string()))
        );
        Ok(())
    }

    #[test]
    fn test_float_params_in_insertion_order() -> anyhow::Result<()> {
        let input = InputType::float()
            .default(0.5)
            .min(0.0)
            .max(2.0)
            .step(0.01);

        let keys: Vec<&str> = input.params.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["default", "min", "max", "step"]);
        assert_eq!(input.params.get("max"), Some(&ParamValue::Float(2.0)));
        Ok(())
    }

    #[test]
    #[ignore]
    fn test_build_py_dict() -> anyhow::Result<()> {
        Python::initialize();
        Python::attach(|py| -> anyhow::Result<()> {
            let dict = InputSpec::new()
                .with_required("image", InputType::image())
                .build(py)?;
            let dict = dict.bind(py);
            assert!(dict.contains("required")?);
            assert!(!dict.contains("optional")?);
            Ok(())
        })
    }
}
