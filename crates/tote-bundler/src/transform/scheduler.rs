use std::sync::Arc;

use dashmap::DashSet;
use tote_graph::{
    ContentType, Dependency, GraphModelError, ModuleId, ModuleRecord, Runtime,
};
use tracing::debug;

use super::{TransformContext, TransformRegistry};
use crate::pool::{PoolError, WorkerPool};
use crate::scan::{find_module_syntax, scan_dependencies};
use crate::{Error, Result};

/// One module to transform. Without `content`, the source is read through
/// the scheduler's runtime.
#[derive(Debug, Clone)]
pub struct TransformJob {
    pub id: ModuleId,
    pub content: Option<Vec<u8>>,
}

impl TransformJob {
    pub fn new(id: ModuleId) -> Self {
        Self { id, content: None }
    }

    pub fn with_content(id: ModuleId, content: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            content: Some(content.into()),
        }
    }
}

/// A finished job: final content plus the specifiers it imports.
#[derive(Debug, Clone)]
pub struct TransformedModule {
    pub id: ModuleId,
    pub content_type: ContentType,
    pub raw: Arc<[u8]>,
    /// Name of the transform that ran and what it produced.
    pub transformed: Option<(String, Vec<u8>)>,
    /// Import specifiers in source order.
    pub specifiers: Vec<String>,
}

impl TransformedModule {
    pub fn content(&self) -> &[u8] {
        self.transformed
            .as_ref()
            .map_or(&self.raw[..], |(_, content)| content.as_slice())
    }

    pub fn into_record(self, dependencies: Vec<Dependency>) -> ModuleRecord {
        let mut builder = ModuleRecord::builder(self.id, self.raw)
            .content_type(self.content_type)
            .dependencies(dependencies);
        if let Some((name, content)) = self.transformed {
            builder = builder.transformed(name, content);
        }
        builder.build()
    }
}

/// Runs transforms and dependency scans on a bounded worker pool.
///
/// Each module id is accepted once; a second submission of the same id is
/// refused so no module is ever transformed twice.
#[derive(Debug)]
pub struct TransformScheduler {
    runtime: Arc<dyn Runtime>,
    registry: Arc<TransformRegistry>,
    pool: WorkerPool,
    submitted: DashSet<ModuleId>,
}

impl TransformScheduler {
    pub fn new(runtime: Arc<dyn Runtime>, registry: TransformRegistry, pool: WorkerPool) -> Self {
        Self {
            runtime,
            registry: Arc::new(registry),
            pool,
            submitted: DashSet::new(),
        }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Number of distinct modules submitted so far.
    pub fn submitted(&self) -> usize {
        self.submitted.len()
    }

    /// Load, transform and scan one module.
    ///
    /// Reading happens on the calling task; the transform and the scan run
    /// on a pool worker under the pool's timeout.
    pub async fn submit(&self, job: TransformJob) -> Result<TransformedModule> {
        let TransformJob { id, content } = job;
        if !self.submitted.insert(id.clone()) {
            return Err(GraphModelError::AlreadyCompleted(id).into());
        }

        let raw: Arc<[u8]> = match content {
            Some(content) => content.into(),
            None => self
                .runtime
                .read_file(id.as_path())
                .await
                .map_err(|e| Error::Load {
                    module: id.clone(),
                    message: e.to_string(),
                })?
                .into(),
        };

        let content_type = ContentType::from_path(id.as_path());
        let transform = self.registry.find(&id).cloned();
        let transform_name = transform.as_ref().map(|t| t.name().to_string());

        let job_id = id.clone();
        let input = Arc::clone(&raw);
        let outcome = self
            .pool
            .run(move || {
                let cx = TransformContext {
                    id: &job_id,
                    content_type,
                };
                let transformed = match &transform {
                    Some(transform) => {
                        let output = transform.apply(&cx, input.to_vec())?;
                        Some((
                            transform.name().to_string(),
                            output.content,
                            output.content_type.unwrap_or(content_type),
                        ))
                    }
                    None => None,
                };
                let (final_type, final_content) = match &transformed {
                    Some((_, content, content_type)) => (*content_type, &content[..]),
                    None => (content_type, &input[..]),
                };
                let source = String::from_utf8_lossy(final_content);
                let module_syntax = match final_type {
                    ContentType::Script => find_module_syntax(&source)
                        .map(|(line, statement)| (line, statement.to_string())),
                    _ => None,
                };
                let specifiers = scan_dependencies(&source, final_type);
                anyhow::Ok((transformed, final_type, specifiers, module_syntax))
            })
            .await;

        let transform_label = || transform_name.clone().unwrap_or_else(|| "scan".to_string());
        let (transformed, content_type, specifiers, module_syntax) = match outcome {
            Ok(Ok(done)) => done,
            Ok(Err(e)) => {
                return Err(Error::Transform {
                    module: id,
                    transform: transform_label(),
                    message: format!("{e:#}"),
                });
            }
            Err(PoolError::Timeout(timeout)) => {
                return Err(Error::TransformTimeout { module: id, timeout });
            }
            Err(e) => {
                return Err(Error::Transform {
                    module: id,
                    transform: transform_label(),
                    message: e.to_string(),
                });
            }
        };

        if let Some((line, statement)) = module_syntax {
            return Err(Error::ModuleSyntax {
                module: id,
                line,
                statement,
            });
        }

        debug!(
            module = %id,
            transform = transform_name.as_deref().unwrap_or("-"),
            dependencies = specifiers.len(),
            "transformed"
        );

        Ok(TransformedModule {
            id,
            content_type,
            raw,
            transformed: transformed.map(|(name, content, _)| (name, content)),
            specifiers,
        })
    }
}
