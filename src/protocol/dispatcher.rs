use crate::core::message::MessageInstance;
use crate::error::{constants, ProtocolError, Result};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::warn;

type HandlerFn = dyn Fn(&MessageInstance) -> Result<()> + Send + Sync + 'static;

/// Routes decoded messages to handlers by type name (`HEARTBEAT`,
/// `UNKNOWN_9999`, `BAD_DATA`, ...).
///
/// Names registered from string literals are stored borrowed. Messages with no
/// matching handler go to the fallback if one is set. Handlers run with no
/// lock held, so a handler may register or replace handlers.
pub struct Dispatcher {
    handlers: Arc<RwLock<HashMap<Cow<'static, str>, Arc<HandlerFn>>>>,
    fallback: Arc<RwLock<Option<Arc<HandlerFn>>>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
            fallback: Arc::new(RwLock::new(None)),
        }
    }

    pub fn register<N, F>(&self, name: N, handler: F) -> Result<()>
    where
        N: Into<Cow<'static, str>>,
        F: Fn(&MessageInstance) -> Result<()> + Send + Sync + 'static,
    {
        let mut handlers = self
            .handlers
            .write()
            .map_err(|_| ProtocolError::Custom(constants::ERR_DISPATCHER_WRITE_LOCK.to_string()))?;

        handlers.insert(name.into(), Arc::new(handler));
        Ok(())
    }

    /// Handler for every message type without a registered handler.
    pub fn set_fallback<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(&MessageInstance) -> Result<()> + Send + Sync + 'static,
    {
        let mut fallback = self
            .fallback
            .write()
            .map_err(|_| ProtocolError::Custom(constants::ERR_DISPATCHER_WRITE_LOCK.to_string()))?;
        *fallback = Some(Arc::new(handler));
        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.handlers
            .read()
            .map(|handlers| handlers.contains_key(name))
            .unwrap_or(false)
    }

    /// Run the handler for `msg`. Without a handler or fallback this is
    /// `UnexpectedMessage`.
    pub fn dispatch(&self, msg: &MessageInstance) -> Result<()> {
        let name = msg.name();

        let handler = self
            .handlers
            .read()
            .map_err(|_| ProtocolError::Custom(constants::ERR_DISPATCHER_READ_LOCK.to_string()))?
            .get(name.as_str())
            .cloned();

        let handler = match handler {
            Some(handler) => handler,
            None => self
                .fallback
                .read()
                .map_err(|_| {
                    ProtocolError::Custom(constants::ERR_DISPATCHER_READ_LOCK.to_string())
                })?
                .clone()
                .ok_or(ProtocolError::UnexpectedMessage)?,
        };
        handler(msg)
    }

    /// Adapter for [`Session::set_callback`](crate::protocol::session::Session::set_callback).
    /// Handler errors are logged, not propagated.
    pub fn into_callback(self: Arc<Self>) -> impl FnMut(&MessageInstance) + Send + 'static {
        move |msg| {
            if let Err(e) = self.dispatch(msg) {
                warn!(message = %msg.name(), error = %e, "Dispatch failed");
            }
        }
    }
}
