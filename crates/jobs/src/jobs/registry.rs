//! JobType -> encoder lookup, populated once at startup.

use std::collections::HashMap;
use std::sync::Arc;

use super::encoder::{DecodeContext, JobEncoder};
use super::tasks::{
    AddComicEncoder, ConvertComicEncoder, DeleteComicEncoder, MoveComicEncoder,
    ProcessComicEncoder, RescanComicEncoder, UndeleteComicEncoder,
};
use super::types::JobType;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("an encoder for {0} is already registered")]
    Duplicate(JobType),
    #[error("no encoder registered for: {}", format_types(.0))]
    Incomplete(Vec<JobType>),
}

fn format_types(types: &[JobType]) -> String {
    types
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Encoders keyed by the job type they handle.
#[derive(Default, Clone)]
pub struct EncoderRegistry {
    encoders: HashMap<JobType, Arc<dyn JobEncoder>>,
}

impl std::fmt::Debug for EncoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.encoders.keys().copied().collect();
        types.sort();
        f.debug_struct("EncoderRegistry")
            .field("job_types", &types)
            .finish()
    }
}

impl EncoderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with one encoder per job type, all sharing `ctx`.
    pub fn standard(ctx: DecodeContext) -> Self {
        let encoders: [Arc<dyn JobEncoder>; 7] = [
            Arc::new(AddComicEncoder::new(ctx.clone())),
            Arc::new(ProcessComicEncoder::new(ctx.clone())),
            Arc::new(ConvertComicEncoder::new(ctx.clone())),
            Arc::new(MoveComicEncoder::new(ctx.clone())),
            Arc::new(DeleteComicEncoder::new(ctx.clone())),
            Arc::new(RescanComicEncoder::new(ctx.clone())),
            Arc::new(UndeleteComicEncoder::new(ctx)),
        ];

        let mut registry = Self::new();
        for encoder in encoders {
            registry.encoders.insert(encoder.job_type(), encoder);
        }
        registry
    }

    pub fn register(&mut self, encoder: Arc<dyn JobEncoder>) -> Result<(), RegistryError> {
        let job_type = encoder.job_type();
        if self.encoders.contains_key(&job_type) {
            return Err(RegistryError::Duplicate(job_type));
        }
        self.encoders.insert(job_type, encoder);
        Ok(())
    }

    pub fn get(&self, job_type: JobType) -> Option<&Arc<dyn JobEncoder>> {
        self.encoders.get(&job_type)
    }

    pub fn len(&self) -> usize {
        self.encoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoders.is_empty()
    }

    /// Fails listing every job type without an encoder.
    pub fn ensure_complete(&self) -> Result<(), RegistryError> {
        let missing: Vec<_> = JobType::ALL
            .iter()
            .copied()
            .filter(|t| !self.encoders.contains_key(t))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(RegistryError::Incomplete(missing))
        }
    }
}
