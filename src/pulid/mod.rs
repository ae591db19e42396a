//! PuLID 身份特征适配

mod adapter;
pub use adapter::{ForwardPatch, IdEmbedding, IdentityAdapter, IdentityBackend};

mod config;
pub use config::{OnnxProvider, PulidConfig, PulidDevice, WeightDType};
