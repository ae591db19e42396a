//! 人脸身份适配
//!
//! 从参考图中提取身份特征, 再把特征和权重固定到模型的 forward 上.

use candle_core::Tensor;
use log::{debug, info};

use crate::{
    core::{
        model_identity::ModelIdentity,
        utils::image::{PixelArray, image_to_pixels},
    },
    error::Error,
    pulid::config::PulidConfig,
};

/// 身份特征 (条件, 无条件)
#[derive(Debug, Clone, PartialEq)]
pub struct IdEmbedding<E> {
    pub cond: E,
    pub uncond: E,
}

/// forward 覆盖参数
///
/// 之后每次 forward 调用都会附带这组参数
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardPatch<E> {
    pub id_embeddings: E,
    pub id_weight: f64,
}

/// PuLID 后端
pub trait IdentityBackend {
    type Model: ModelIdentity;
    type Pipeline;
    type Embedding;

    /// 创建绑定到模型的 pipeline 并加载预训练权重
    fn build_pipeline(
        &self,
        model: &Self::Model,
        config: &PulidConfig,
    ) -> Result<Self::Pipeline, Error>;

    /// 提取身份特征
    fn id_embedding(
        &self,
        pipeline: &Self::Pipeline,
        pixels: &PixelArray,
    ) -> Result<IdEmbedding<Self::Embedding>, Error>;

    /// 覆盖模型 forward
    fn patch_forward(
        &self,
        model: &Self::Model,
        patch: ForwardPatch<Self::Embedding>,
    ) -> Result<(), Error>;
}

#[derive(Debug)]
struct CachedPipeline<P, H> {
    model: H,
    pipeline: P,
}

/// 身份适配器, 每个节点实例持有一个
///
/// pipeline 绑定到具体的扩散模型, 模型不变时复用, 身份特征每次重新计算.
/// 缓存只持有模型的弱引用句柄, 模型释放后重新创建 pipeline.
#[derive(Debug)]
pub struct IdentityAdapter<P, H> {
    config: PulidConfig,
    pipeline: Option<CachedPipeline<P, H>>,
}

impl<P, H> IdentityAdapter<P, H> {
    pub fn new(config: PulidConfig) -> Self {
        Self {
            config,
            pipeline: None,
        }
    }

    pub fn config(&self) -> &PulidConfig {
        &self.config
    }

    /// 把参考图的身份特征应用到模型
    pub fn apply<B>(
        &mut self,
        backend: &B,
        model: &B::Model,
        image: &Tensor,
        id_weight: f64,
    ) -> Result<(), Error>
    where
        B: IdentityBackend<Pipeline = P>,
        B::Model: ModelIdentity<Handle = H>,
    {
        let cached = match self.pipeline.take() {
            Some(cached) if model.is_same_model(&cached.model) => {
                debug!("reuse pulid pipeline");
                cached
            }
            _ => {
                info!("build pulid pipeline, {:?}", self.config);
                CachedPipeline {
                    pipeline: backend.build_pipeline(model, &self.config)?,
                    model: model.handle()?,
                }
            }
        };
        let cached = self.pipeline.insert(cached);

        let pixels = image_to_pixels(image)?;
        let embedding = backend.id_embedding(&cached.pipeline, &pixels)?;

        backend.patch_forward(
            model,
            ForwardPatch {
                id_embeddings: embedding.cond,
                id_weight,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::{Cell, RefCell},
        rc::{Rc, Weak},
    };

    use candle_core::Device;

    use super::*;

    struct MockModel {
        token: Rc<()>,
        patches: RefCell<Vec<ForwardPatch<Vec<u8>>>>,
    }

    impl MockModel {
        fn new() -> Self {
            Self {
                token: Rc::new(()),
                patches: RefCell::new(Vec::new()),
            }
        }
    }

    impl ModelIdentity for MockModel {
        type Handle = Weak<()>;

        fn handle(&self) -> Result<Weak<()>, Error> {
            Ok(Rc::downgrade(&self.token))
        }

        fn is_same_model(&self, handle: &Weak<()>) -> bool {
            handle
                .upgrade()
                .is_some_and(|token| Rc::ptr_eq(&token, &self.token))
        }
    }

    #[derive(Default)]
    struct MockBackend {
        builds: Cell<usize>,
        fail_build: bool,
        seen_shapes: RefCell<Vec<Vec<usize>>>,
    }

    impl IdentityBackend for MockBackend {
        type Model = MockModel;
        type Pipeline = usize;
        type Embedding = Vec<u8>;

        fn build_pipeline(
            &self,
            _model: &MockModel,
            _config: &PulidConfig,
        ) -> Result<usize, Error> {
            if self.fail_build {
                return Err(Error::InvalidParameter("no onnx provider".to_string()));
            }
            self.builds.set(self.builds.get() + 1);
            Ok(self.builds.get())
        }

        fn id_embedding(
            &self,
            _pipeline: &usize,
            pixels: &PixelArray,
        ) -> Result<IdEmbedding<Vec<u8>>, Error> {
            self.seen_shapes.borrow_mut().push(pixels.shape.clone());
            Ok(IdEmbedding {
                cond: pixels.data.clone(),
                uncond: vec![0; pixels.data.len()],
            })
        }

        fn patch_forward(
            &self,
            model: &MockModel,
            patch: ForwardPatch<Vec<u8>>,
        ) -> Result<(), Error> {
            model.patches.borrow_mut().push(patch);
            Ok(())
        }
    }

    fn image(values: Vec<f32>) -> anyhow::Result<Tensor> {
        let len = values.len() / 3;
        Ok(Tensor::from_vec(values, (1, 1, len, 3), &Device::Cpu)?)
    }

    #[test]
    fn test_apply_patches_forward() -> anyhow::Result<()> {
        let backend = MockBackend::default();
        let model = MockModel::new();
        let mut adapter: IdentityAdapter<usize, Weak<()>> =
            IdentityAdapter::new(PulidConfig::default());

        adapter.apply(&backend, &model, &image(vec![0.0, 0.5, 1.0])?, 0.8)?;

        let patches = model.patches.borrow();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].id_embeddings, vec![0, 127, 255]);
        assert_eq!(patches[0].id_weight, 0.8);
        assert_eq!(*backend.seen_shapes.borrow(), vec![vec![3]]);
        Ok(())
    }

    #[test]
    fn test_pipeline_reused_for_same_model() -> anyhow::Result<()> {
        let backend = MockBackend::default();
        let model = MockModel::new();
        let mut adapter: IdentityAdapter<usize, Weak<()>> =
            IdentityAdapter::new(PulidConfig::default());

        adapter.apply(&backend, &model, &image(vec![0.1, 0.2, 0.3])?, 0.5)?;
        adapter.apply(&backend, &model, &image(vec![0.4, 0.5, 0.6])?, 1.0)?;

        assert_eq!(backend.builds.get(), 1);
        // 身份特征每次都重新计算
        let patches = model.patches.borrow();
        assert_eq!(patches.len(), 2);
        assert_ne!(patches[0].id_embeddings, patches[1].id_embeddings);
        assert_eq!(patches[1].id_weight, 1.0);
        Ok(())
    }

    #[test]
    fn test_pipeline_rebuilt_for_new_model() -> anyhow::Result<()> {
        let backend = MockBackend::default();
        let mut adapter: IdentityAdapter<usize, Weak<()>> =
            IdentityAdapter::new(PulidConfig::default());

        adapter.apply(&backend, &MockModel::new(), &image(vec![0.1, 0.2, 0.3])?, 0.5)?;
        adapter.apply(&backend, &MockModel::new(), &image(vec![0.1, 0.2, 0.3])?, 0.5)?;

        assert_eq!(backend.builds.get(), 2);
        Ok(())
    }

    #[test]
    fn test_build_failure_propagates() -> anyhow::Result<()> {
        let backend = MockBackend {
            fail_build: true,
            ..Default::default()
        };
        let model = MockModel::new();
        let mut adapter: IdentityAdapter<usize, Weak<()>> =
            IdentityAdapter::new(PulidConfig::default());

        let result = adapter.apply(&backend, &model, &image(vec![0.1, 0.2, 0.3])?, 0.5);

        assert!(matches!(result, Err(Error::InvalidParameter(_))));
        assert!(model.patches.borrow().is_empty());
        Ok(())
    }

    #[test]
    fn test_pipeline_rebuilt_after_model_freed() -> anyhow::Result<()> {
        let backend = MockBackend::default();
        let mut adapter: IdentityAdapter<usize, Weak<()>> =
            IdentityAdapter::new(PulidConfig::default());

        let first = MockModel::new();
        adapter.apply(&backend, &first, &image(vec![0.1, 0.2, 0.3])?, 0.5)?;
        drop(first);

        let second = MockModel::new();
        adapter.apply(&backend, &second, &image(vec![0.1, 0.2, 0.3])?, 0.5)?;

        assert_eq!(backend.builds.get(), 2);
        assert_eq!(second.patches.borrow().len(), 1);
        Ok(())
    }
}
