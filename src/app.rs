//! Application wrapper
//!
//! Wires an engine with the usual handler chain:
//!
//! ```text
//!   LoggingHandler ──► ConnectionRegistry ──► MonitorHandler ──► [custom]
//! ```

use std::sync::Arc;

use crate::config::Config;
use crate::connection::{Connection, ConnectionHandler, ConnectionRegistry, IncomingPolicy, Triple};
use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::handler::{HandlerChain, LoggingHandler, Monitor, MonitorHandler, ReceiveHandler};

/// An engine with logging, connection tracking and monitoring in place
pub struct Application {
    engine: Engine,
    logging: Arc<LoggingHandler>,
    registry: Arc<ConnectionRegistry>,
    monitor: Arc<MonitorHandler>,
}

impl Application {
    pub fn new(config: Config) -> Result<Self> {
        Self::with_handler(config, None)
    }

    /// Build the chain, with `custom` last if given
    pub fn with_handler(config: Config, custom: Option<Arc<dyn ReceiveHandler>>) -> Result<Self> {
        let engine = Engine::new(config)?;
        let logging = Arc::new(LoggingHandler::new());
        let registry = engine.connection_registry();
        let monitor = Arc::new(MonitorHandler::new());

        let mut chain = HandlerChain::new()
            .add(logging.clone())
            .add(registry.clone())
            .add(monitor.clone());
        if let Some(custom) = custom {
            chain.push(custom);
        }
        engine.set_handlers(chain)?;

        Ok(Self {
            engine,
            logging,
            registry,
            monitor,
        })
    }

    /// Connect and wait for readiness, up to the configured ready timeout
    pub fn start(&self) -> Result<()> {
        self.engine.connect_to_server()?;
        if let Err(e) = self.engine.wait_ready(self.engine.config().ready_timeout()) {
            tracing::warn!("Server did not become ready in time");
            self.engine.disconnect_from_server();
            return Err(e);
        }
        Ok(())
    }

    pub fn stop(&self) {
        self.engine.disconnect_from_server();
    }

    /// Open a tracked connection from a registered callsign
    pub fn open_connection(
        &self,
        triple: Triple,
        via: &[&str],
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<Arc<Connection>> {
        if !self.engine.is_registered(&triple.call_from) {
            return Err(EngineError::CallsignNotRegistered(triple.call_from));
        }
        self.registry.open_via(triple, via, handler)
    }

    pub fn set_monitor(&self, monitor: Option<Arc<dyn Monitor>>) {
        self.monitor.set_monitor(monitor);
    }

    pub fn set_incoming_policy(&self, policy: Option<Arc<dyn IncomingPolicy>>) {
        self.registry.set_incoming_policy(policy);
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn logging(&self) -> &LoggingHandler {
        &self.logging
    }
}
