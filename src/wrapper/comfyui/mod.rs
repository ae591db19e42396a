//! ComfyUI 服务端包装

pub mod types;

use log::error;
use pyo3::{
    PyErr, PyResult, PyTypeInfo, Python,
    exceptions::PyRuntimeError,
    types::{PyAnyMethods, PyDict, PyDictMethods, PyModule},
};

/// 前端事件名称
const EVENT_NAME: &str = "nunchaku";

/// comfyui PromptServer wrapper
pub trait PromptServer: PyTypeInfo {
    /// 节点执行出现异常时通知前端
    fn send_error(&self, py: Python, error_type: String, message: String) -> PyResult<()> {
        let server = PyModule::import(py, "server")?
            .getattr("PromptServer")?
            .getattr("instance")?;

        let error_data = PyDict::new(py);
        error_data.set_item("type", &error_type)?;
        error_data.set_item("node", self.get_class_name(py)?)?;
        error_data.set_item("message", message)?;

        server
            .getattr("send_sync")?
            .call1((EVENT_NAME, error_data))?;

        Ok(())
    }

    /// 记录节点错误并通知前端, 返回抛给 ComfyUI 的异常
    ///
    /// 通知失败时异常信息仍保留原始错误
    fn report_error(&self, py: Python, error_type: &str, message: String) -> PyErr {
        error!("{error_type} error, {message}");
        let send_err = self
            .send_error(py, error_type.to_string(), message.clone())
            .err()
            .map(|e| {
                error!("send error failed, {e}");
                e.to_string()
            });

        PyErr::new::<PyRuntimeError, _>(runtime_error_message(&message, send_err.as_deref()))
    }

    /// Class 名称
    fn get_class_name(&self, py: Python) -> PyResult<String> {
        Self::type_object(py)
            .getattr("__name__")?
            .extract::<String>()
    }
}

/// 节点异常信息
fn runtime_error_message(message: &str, send_err: Option<&str>) -> String {
    match send_err {
        Some(send_err) => format!("{message} (send error failed, {send_err})"),
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_keeps_original_error() {
        assert_eq!(
            runtime_error_message("file not found, loraA", None),
            "file not found, loraA"
        );

        let message = runtime_error_message(
            "file not found, loraA",
            Some("ModuleNotFoundError: No module named 'server'"),
        );
        assert!(message.starts_with("file not found, loraA"));
        assert!(message.contains("No module named 'server'"));
    }
}
