// src/engine/runtime.rs

use std::fmt;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::watch::Digest;

use super::BuildEngine;

#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// Build once and exit instead of watching for changes.
    pub once: bool,
}

/// Keeps the outputs of a [`BuildEngine`] current.
///
/// Every input notification recomputes the roots and waits for them.
/// A failed rebuild is logged and the loop keeps going; the next change gets
/// another attempt.
pub struct Runtime {
    engine: BuildEngine,
    shutdown: CancellationToken,
    options: RuntimeOptions,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("engine", &self.engine)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(engine: BuildEngine, shutdown: CancellationToken, options: RuntimeOptions) -> Self {
        Self {
            engine,
            shutdown,
            options,
        }
    }

    /// Main loop.
    ///
    /// - Builds every root once.
    /// - Unless running once, rebuilds on each input change until shutdown
    ///   is requested or the notification channel closes.
    /// - Closes every input before returning.
    pub async fn run(mut self) -> Result<()> {
        info!("incrbuild runtime started");

        let served = self.serve().await;
        let closed = self.engine.close().await;

        info!("runtime exiting");
        served.and(closed)
    }

    async fn serve(&mut self) -> Result<()> {
        report(&self.engine.build().await?);
        if self.options.once {
            return Ok(());
        }

        let mut changes = self.engine.notifications().receive();
        loop {
            let message = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("shutdown requested; stopping runtime");
                    break;
                }
                message = changes.next() => match message {
                    Some(message) => message,
                    None => {
                        info!("notification channel closed; exiting");
                        break;
                    }
                },
            };

            debug!(file = ?message.filename, kind = ?message.event.kind, "input changed");
            match self.engine.build().await {
                Ok(digests) => report(&digests),
                Err(err) => warn!("rebuild failed: {err}"),
            }
        }
        Ok(())
    }
}

fn report(digests: &[(String, Digest)]) {
    for (name, digest) in digests {
        info!(target_name = %name, digest = %digest, "target up to date");
    }
}
