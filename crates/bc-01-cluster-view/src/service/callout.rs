//! Deferred calls into the engine and the forwarding layer
//!
//! Entry points decide under the registry borrow and collect `Callout`s.
//! The borrow is released before dispatch, so a callback may re-enter the
//! view keeper on the same thread. Engine handles are resolved at dispatch
//! time because `create` may have assigned one earlier in the same batch.

use super::core::ViewKeeper;
use super::state::ViewKeeperState;
use crate::domain::{EngineHandle, FilterKind, ForwardingEndpoint, ServerRef};
use crate::error::ClusterError;
use crate::ports::outbound::{CallbackError, CallbackResult};
use std::cell::RefCell;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub(crate) enum Callout {
    EngineCreate(ServerRef),
    EngineCreateLocal(ServerRef),
    EngineConnected(ServerRef),
    EngineDisconnected(ServerRef),
    EngineRemove {
        server: ServerRef,
        engine: EngineHandle,
    },
    EngineRouteAll {
        server: ServerRef,
        enabled: bool,
    },
    EngineReplaceFilter {
        server: ServerRef,
        kind: FilterKind,
        sqn: u64,
        payload: Vec<u8>,
    },
    EngineApplyFilterUpdate {
        server: ServerRef,
        kind: FilterKind,
        sqn: u64,
        payload: Vec<u8>,
    },
    EngineAddSubscriptions {
        server: ServerRef,
        patterns: Vec<String>,
    },
    EngineRemoveSubscriptions {
        server: ServerRef,
        patterns: Vec<String>,
    },
    /// `server == None` writes the self-record
    EngineUpdate {
        server: Option<ServerRef>,
        data: Vec<u8>,
        commit: bool,
    },
    EngineTerm,
    ForwardingAdd {
        server: ServerRef,
        endpoint: Option<ForwardingEndpoint>,
    },
    ForwardingConnect {
        server: ServerRef,
        endpoint: ForwardingEndpoint,
    },
    ForwardingDisconnect(ServerRef),
    ForwardingRemove(ServerRef),
    ForwardingTerm,
}

impl Callout {
    pub fn name(&self) -> &'static str {
        match self {
            Self::EngineCreate(_) => "engine.create",
            Self::EngineCreateLocal(_) => "engine.create_local",
            Self::EngineConnected(_) => "engine.connected",
            Self::EngineDisconnected(_) => "engine.disconnected",
            Self::EngineRemove { .. } => "engine.remove",
            Self::EngineRouteAll { .. } => "engine.route_all",
            Self::EngineReplaceFilter { .. } => "engine.replace_filter",
            Self::EngineApplyFilterUpdate { .. } => "engine.apply_filter_update",
            Self::EngineAddSubscriptions { .. } => "engine.add_subscriptions",
            Self::EngineRemoveSubscriptions { .. } => "engine.remove_subscriptions",
            Self::EngineUpdate { .. } => "engine.update",
            Self::EngineTerm => "engine.term",
            Self::ForwardingAdd { .. } => "forwarding.add",
            Self::ForwardingConnect { .. } => "forwarding.connect",
            Self::ForwardingDisconnect(_) => "forwarding.disconnect",
            Self::ForwardingRemove(_) => "forwarding.remove",
            Self::ForwardingTerm => "forwarding.term",
        }
    }

    fn is_engine(&self) -> bool {
        !matches!(
            self,
            Self::ForwardingAdd { .. }
                | Self::ForwardingConnect { .. }
                | Self::ForwardingDisconnect(_)
                | Self::ForwardingRemove(_)
                | Self::ForwardingTerm
        )
    }
}

fn engine_handle_for(state: &ViewKeeperState, server: &ServerRef) -> Option<EngineHandle> {
    if server.handle.is_local() {
        state.local.engine_handle
    } else {
        state
            .record(server.handle)
            .and_then(|record| record.engine_handle)
    }
}

impl ViewKeeper {
    /// Deliver callouts in order. Returns the first non-`Closed` failure;
    /// every failure is logged.
    pub(super) fn dispatch(
        &self,
        cell: &RefCell<ViewKeeperState>,
        callouts: Vec<Callout>,
    ) -> Option<ClusterError> {
        let mut failure = None;
        for callout in callouts {
            let name = callout.name();
            match self.dispatch_one(cell, callout) {
                Ok(()) => {}
                Err(CallbackError::Closed) => {
                    debug!(callout = name, "collaborator closed, callout ignored");
                }
                Err(CallbackError::Failed { reason }) => {
                    warn!(callout = name, %reason, "callout failed");
                    failure.get_or_insert(ClusterError::Callback {
                        callback: name,
                        reason,
                    });
                }
            }
        }
        failure
    }

    fn dispatch_one(&self, cell: &RefCell<ViewKeeperState>, callout: Callout) -> CallbackResult<()> {
        let (engine, forwarding) = {
            let state = cell.borrow();
            (state.engine.clone(), state.forwarding.clone())
        };

        if callout.is_engine() {
            let Some(engine) = engine else {
                if let Callout::EngineCreate(server) = &callout {
                    if let Some(record) = cell.borrow_mut().record_mut(server.handle) {
                        record.engine.clear();
                    }
                }
                debug!(callout = callout.name(), "no engine registered, callout skipped");
                return Ok(());
            };

            // Everything except create/term/remove needs the engine handle.
            let engine_handle = match &callout {
                Callout::EngineConnected(server)
                | Callout::EngineDisconnected(server)
                | Callout::EngineRouteAll { server, .. }
                | Callout::EngineReplaceFilter { server, .. }
                | Callout::EngineApplyFilterUpdate { server, .. }
                | Callout::EngineAddSubscriptions { server, .. }
                | Callout::EngineRemoveSubscriptions { server, .. } => {
                    let resolved = engine_handle_for(&cell.borrow(), server);
                    match resolved {
                        Some(handle) => Some(handle),
                        None => {
                            debug!(
                                callout = callout.name(),
                                uid = %server.uid,
                                "server has no engine handle, callout skipped"
                            );
                            return Ok(());
                        }
                    }
                }
                _ => None,
            };

            return match (callout, engine_handle) {
                (Callout::EngineCreate(server), _) => match engine.create(&server) {
                    Ok(handle) => {
                        if let Some(record) = cell.borrow_mut().record_mut(server.handle) {
                            record.engine_handle = Some(handle);
                        }
                        Ok(())
                    }
                    Err(err) => {
                        if let Some(record) = cell.borrow_mut().record_mut(server.handle) {
                            record.engine.clear();
                        }
                        Err(err)
                    }
                },
                (Callout::EngineCreateLocal(server), _) => {
                    let handle = engine.create_local(&server)?;
                    cell.borrow_mut().local.engine_handle = Some(handle);
                    Ok(())
                }
                (Callout::EngineConnected(server), Some(handle)) => {
                    engine.connected(handle, &server)
                }
                (Callout::EngineDisconnected(server), Some(handle)) => {
                    engine.disconnected(handle, &server)
                }
                (Callout::EngineRemove { server, engine: handle }, _) => {
                    engine.remove(handle, &server)
                }
                (Callout::EngineRouteAll { server, enabled }, Some(handle)) => {
                    engine.route_all(handle, &server, enabled)
                }
                (
                    Callout::EngineReplaceFilter {
                        server,
                        kind,
                        sqn,
                        payload,
                    },
                    Some(handle),
                ) => engine.replace_filter(handle, &server, kind, sqn, &payload),
                (
                    Callout::EngineApplyFilterUpdate {
                        server,
                        kind,
                        sqn,
                        payload,
                    },
                    Some(handle),
                ) => engine.apply_filter_update(handle, &server, kind, sqn, &payload),
                (Callout::EngineAddSubscriptions { server, patterns }, Some(handle)) => {
                    engine.add_subscriptions(handle, &server, &patterns)
                }
                (Callout::EngineRemoveSubscriptions { server, patterns }, Some(handle)) => {
                    engine.remove_subscriptions(handle, &server, &patterns)
                }
                (
                    Callout::EngineUpdate {
                        server,
                        data,
                        commit,
                    },
                    _,
                ) => {
                    let resolved = {
                        let state = cell.borrow();
                        match &server {
                            Some(server) => engine_handle_for(&state, server),
                            None => state.local.engine_handle,
                        }
                    };
                    match resolved {
                        Some(handle) => engine.update(handle, &data, commit).map(|_| ()),
                        None => {
                            debug!("no engine handle for store update, skipped");
                            Ok(())
                        }
                    }
                }
                (Callout::EngineTerm, _) => engine.term(),
                (other, _) => {
                    debug!(callout = other.name(), "callout not applicable");
                    Ok(())
                }
            };
        }

        let Some(forwarding) = forwarding else {
            debug!(callout = callout.name(), "no forwarding registered, callout skipped");
            return Ok(());
        };
        match callout {
            Callout::ForwardingAdd { server, endpoint } => {
                forwarding.add(&server, endpoint.as_ref())
            }
            Callout::ForwardingConnect { server, endpoint } => {
                forwarding.connect(&server, &endpoint)
            }
            Callout::ForwardingDisconnect(server) => forwarding.disconnect(&server),
            Callout::ForwardingRemove(server) => forwarding.remove(&server),
            Callout::ForwardingTerm => forwarding.term(),
            other => {
                debug!(callout = other.name(), "callout not applicable");
                Ok(())
            }
        }
    }
}
