//! Actor-based concurrency for the allocation engine
//!
//! The engine is a single writer. Concurrent callers share an
//! [`AllocationHandle`] and talk to one [`AllocationActor`] task over a
//! bounded mailbox, so every submit, drain and cancel is applied in the
//! order the actor receives it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │          Front ends (CLI, HTTP, test harness)        │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │             AllocationHandle (Clone)                 │
//! │         Sends messages to actor mailbox              │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │            AllocationActor (Single Task)             │
//! │   owns AllocationEngine, replies over oneshot        │
//! └──────────────────────────────────────────────────────┘
//! ```

use crate::engine::AllocationEngine;
use crate::types::{
    ClassCounts, DrainReport, HolderId, SalesSummary, SubmitReceipt, TransactionRecord,
};
use crate::{Error, Result};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

/// Mailbox capacity
const MAILBOX_CAPACITY: usize = 1000;

/// Result of a submission through the actor
#[derive(Debug)]
pub struct SubmitOutcome {
    /// Admission result
    pub receipt: SubmitReceipt,

    /// Drain that ran right after admission, when auto-drain is enabled
    pub drain: Option<Result<DrainReport>>,
}

/// Message sent to the allocation actor
#[derive(Debug)]
pub enum AllocationMessage {
    /// Register a holder
    Register {
        holder: HolderId,
        credential: String,
        response: oneshot::Sender<Result<()>>,
    },

    /// Check a credential
    Authenticate {
        holder: HolderId,
        credential: String,
        response: oneshot::Sender<bool>,
    },

    /// Enqueue requested units
    Submit {
        holder: HolderId,
        requested: ClassCounts,
        response: oneshot::Sender<Result<SubmitOutcome>>,
    },

    /// Process queued requests
    Drain {
        triggering: HolderId,
        response: oneshot::Sender<Result<DrainReport>>,
    },

    /// Return held units
    Cancel {
        holder: HolderId,
        requested: ClassCounts,
        response: oneshot::Sender<Result<()>>,
    },

    /// Availability per class
    Availability {
        response: oneshot::Sender<ClassCounts>,
    },

    /// Holdings of one holder
    HoldingsOf {
        holder: HolderId,
        response: oneshot::Sender<Result<ClassCounts>>,
    },

    /// Audit trail
    Transactions {
        response: oneshot::Sender<Result<Vec<TransactionRecord>>>,
    },

    /// Sales summary
    SalesSummary {
        response: oneshot::Sender<SalesSummary>,
    },

    /// Flush storage and stop
    Shutdown {
        response: oneshot::Sender<Result<()>>,
    },
}

/// Actor that owns the engine
pub struct AllocationActor {
    engine: AllocationEngine,
    mailbox: mpsc::Receiver<AllocationMessage>,
}

impl AllocationActor {
    /// Create new actor
    pub fn new(engine: AllocationEngine, mailbox: mpsc::Receiver<AllocationMessage>) -> Self {
        Self { engine, mailbox }
    }

    /// Run actor event loop
    pub async fn run(mut self) {
        info!("Allocation actor started");

        while let Some(msg) = self.mailbox.recv().await {
            if let AllocationMessage::Shutdown { response } = msg {
                let result = self.engine.flush();
                if let Err(e) = &result {
                    error!("Error flushing on shutdown: {}", e);
                }
                let _ = response.send(result);
                break;
            }
            self.handle_message(msg);
        }

        info!("Allocation actor stopped");
    }

    /// Handle a single message
    fn handle_message(&mut self, msg: AllocationMessage) {
        match msg {
            AllocationMessage::Register {
                holder,
                credential,
                response,
            } => {
                let _ = response.send(self.engine.register(&holder, &credential));
            }

            AllocationMessage::Authenticate {
                holder,
                credential,
                response,
            } => {
                let _ = response.send(self.engine.authenticate(&holder, &credential));
            }

            AllocationMessage::Submit {
                holder,
                requested,
                response,
            } => {
                let auto_drain = self.engine.config().policy.auto_drain;
                let result = self.engine.submit(&holder, requested).map(|receipt| {
                    let drain = auto_drain.then(|| self.engine.drain(&holder));
                    SubmitOutcome { receipt, drain }
                });
                let _ = response.send(result);
            }

            AllocationMessage::Drain {
                triggering,
                response,
            } => {
                let _ = response.send(self.engine.drain(&triggering));
            }

            AllocationMessage::Cancel {
                holder,
                requested,
                response,
            } => {
                let _ = response.send(self.engine.cancel(&holder, requested));
            }

            AllocationMessage::Availability { response } => {
                let _ = response.send(self.engine.availability());
            }

            AllocationMessage::HoldingsOf { holder, response } => {
                let _ = response.send(self.engine.holdings_of(&holder));
            }

            AllocationMessage::Transactions { response } => {
                let _ = response.send(self.engine.transactions());
            }

            AllocationMessage::SalesSummary { response } => {
                let _ = response.send(self.engine.sales_summary());
            }

            AllocationMessage::Shutdown { .. } => {
                debug!("Shutdown handled in main loop");
            }
        }
    }
}

impl std::fmt::Debug for AllocationActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllocationActor")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

/// Handle for sending messages to the actor
#[derive(Debug, Clone)]
pub struct AllocationHandle {
    sender: mpsc::Sender<AllocationMessage>,
}

impl AllocationHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<AllocationMessage>) -> Self {
        Self { sender }
    }

    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> AllocationMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Register a holder
    pub async fn register(&self, holder: HolderId, credential: impl Into<String>) -> Result<()> {
        let credential = credential.into();
        self.call(|response| AllocationMessage::Register {
            holder,
            credential,
            response,
        })
        .await?
    }

    /// Check a credential
    pub async fn authenticate(
        &self,
        holder: HolderId,
        credential: impl Into<String>,
    ) -> Result<bool> {
        let credential = credential.into();
        self.call(|response| AllocationMessage::Authenticate {
            holder,
            credential,
            response,
        })
        .await
    }

    /// Enqueue requested units (and drain, if auto-drain is on)
    pub async fn submit(&self, holder: HolderId, requested: ClassCounts) -> Result<SubmitOutcome> {
        self.call(|response| AllocationMessage::Submit {
            holder,
            requested,
            response,
        })
        .await?
    }

    /// Process queued requests
    pub async fn drain(&self, triggering: HolderId) -> Result<DrainReport> {
        self.call(|response| AllocationMessage::Drain {
            triggering,
            response,
        })
        .await?
    }

    /// Return held units
    pub async fn cancel(&self, holder: HolderId, requested: ClassCounts) -> Result<()> {
        self.call(|response| AllocationMessage::Cancel {
            holder,
            requested,
            response,
        })
        .await?
    }

    /// Availability per class
    pub async fn availability(&self) -> Result<ClassCounts> {
        self.call(|response| AllocationMessage::Availability { response })
            .await
    }

    /// Holdings of one holder
    pub async fn holdings_of(&self, holder: HolderId) -> Result<ClassCounts> {
        self.call(|response| AllocationMessage::HoldingsOf { holder, response })
            .await?
    }

    /// Audit trail
    pub async fn transactions(&self) -> Result<Vec<TransactionRecord>> {
        self.call(|response| AllocationMessage::Transactions { response })
            .await?
    }

    /// Sales summary
    pub async fn sales_summary(&self) -> Result<SalesSummary> {
        self.call(|response| AllocationMessage::SalesSummary { response })
            .await
    }

    /// Flush storage and stop the actor
    pub async fn shutdown(&self) -> Result<()> {
        self.call(|response| AllocationMessage::Shutdown { response })
            .await?
    }
}

/// Spawn the allocation actor
pub fn spawn_allocation_actor(engine: AllocationEngine) -> AllocationHandle {
    let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY); // Bounded channel for backpressure
    let actor = AllocationActor::new(engine, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    AllocationHandle::new(tx)
}
