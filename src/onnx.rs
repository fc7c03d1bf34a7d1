use crate::config::Device;
use crate::error::Result;
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::{Session, builder::GraphOptimizationLevel};
use std::path::Path;

#[derive(Debug)]
pub struct OnnxSession {
    pub session: Session,
}

impl OnnxSession {
    pub fn new(path: impl AsRef<Path>, device: Device) -> Result<Self> {
        let threads = num_cpus::get();
        let builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(threads)?;

        let builder = match device {
            Device::Cuda => builder.with_execution_providers([
                CUDAExecutionProvider::default().build(),
                CPUExecutionProvider::default().build(),
            ])?,
            Device::Cpu => builder
                .with_execution_providers([CPUExecutionProvider::default().build()])?,
        };

        let session = builder.commit_from_file(path)?;

        Ok(Self { session })
    }

    /// Helper to check if the model expects a specific input name
    #[must_use]
    pub fn has_input(&self, name: &str) -> bool {
        self.session.inputs.iter().any(|i| i.name == name)
    }

    /// Helper to find the first likely input name for a specific role
    #[must_use]
    pub fn find_input(&self, possibilities: &[&str]) -> Option<String> {
        for &p in possibilities {
            if self.has_input(p) {
                return Some(p.to_string());
            }
        }
        None
    }
}
