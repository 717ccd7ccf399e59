//! Ordered shutdown
//!
//! Collaborators register in the order they are constructed; teardown walks
//! the list backwards so each one stops before the things it depends on.

use async_trait::async_trait;

use crate::error::Result;

/// One step of the shutdown sequence
#[async_trait]
pub trait ShutdownHook: Send + Sync {
    fn name(&self) -> &str;

    async fn shutdown(&self) -> Result<()>;
}

/// Runs registered hooks in reverse registration order
#[derive(Default)]
pub struct Shutdown {
    hooks: Vec<Box<dyn ShutdownHook>>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H: ShutdownHook + 'static>(&mut self, hook: H) {
        self.hooks.push(Box::new(hook));
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run every hook even if one fails; the first failure is returned
    pub async fn run(self) -> Result<()> {
        let mut first_error = None;

        for hook in self.hooks.into_iter().rev() {
            tracing::info!("Shutting down {}", hook.name());
            if let Err(e) = hook.shutdown().await {
                tracing::error!("Shutdown step {} failed: {}", hook.name(), e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
