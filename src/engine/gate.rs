//! Capability gate: checks local and remote capabilities before a method
//! is emitted or handled

use std::sync::RwLock;
use crate::error::{Error, ErrorCode};
use crate::types::{
    elicitation, sampling, task,
    ClientCapabilities, ServerCapabilities, TasksCapability
};

/// The role this engine plays in the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The connecting peer: initiates the handshake, may handle
    /// sampling and elicitation requests
    Client,

    /// The receiving peer: answers the handshake, may emit
    /// task status notifications
    Server,
}

/// The capability set one peer declared during the handshake
#[derive(Debug, Clone)]
pub(crate) enum PeerCapabilities {
    Client(ClientCapabilities),
    Server(ServerCapabilities),
}

/// Checks methods against the local declaration and the set the remote
/// peer declared during the handshake.
///
/// Local checks always fail loudly: registering a handler or emitting a
/// notification the local declaration does not cover is a programming
/// error. Remote checks fire only in strict mode; a lax engine defers to
/// the remote's own error response.
pub(crate) struct CapabilityGate {
    side: Side,
    strict: bool,
    local: PeerCapabilities,
    remote: RwLock<Option<PeerCapabilities>>,
}

impl PeerCapabilities {
    fn tasks(&self) -> Option<&TasksCapability> {
        match self {
            PeerCapabilities::Client(caps) => caps.tasks.as_ref(),
            PeerCapabilities::Server(caps) => caps.tasks.as_ref(),
        }
    }
}

impl CapabilityGate {
    /// Creates a gate for the given side and local declaration
    pub(crate) fn new(side: Side, strict: bool, local: PeerCapabilities) -> Self {
        Self {
            side,
            strict,
            local,
            remote: RwLock::new(None),
        }
    }

    /// Records the capability set the remote peer declared in the handshake
    pub(crate) fn set_remote(&self, remote: PeerCapabilities) {
        *self.remote.write().unwrap() = Some(remote);
    }

    /// Checks that the remote peer supports the outbound `method`.
    ///
    /// Enforced only in strict mode and only once the handshake has
    /// supplied the remote declaration.
    pub(crate) fn assert_capability_for_method(&self, method: &str) -> Result<(), Error> {
        if !self.strict {
            return Ok(());
        }
        let remote = self.remote.read().unwrap();
        let Some(remote) = remote.as_ref() else {
            return Ok(());
        };

        let supported = match (method, remote) {
            (sampling::commands::CREATE, PeerCapabilities::Client(caps)) =>
                caps.sampling.is_some(),
            (elicitation::commands::CREATE, PeerCapabilities::Client(caps)) =>
                caps.elicitation.is_some(),
            (task::commands::GET
                | task::commands::RESULT
                | task::commands::LIST
                | task::commands::CANCEL, remote) => remote.tasks().is_some(),
            // methods the gate has no mapping for pass through to the
            // remote's own dispatch
            _ => true,
        };

        if supported {
            Ok(())
        } else {
            Err(Error::new(
                ErrorCode::InvalidRequest,
                format!("Remote peer does not support {method}")))
        }
    }

    /// Checks that the local declaration allows emitting `method`
    pub(crate) fn assert_notification_capability(&self, method: &str) -> Result<(), Error> {
        let allowed = match method {
            task::commands::STATUS => self.local.tasks().is_some(),
            _ => true,
        };

        if allowed {
            Ok(())
        } else {
            Err(Error::new(
                ErrorCode::InvalidRequest,
                format!("Local capabilities do not cover the {method} notification")))
        }
    }

    /// Checks that the local declaration allows handling inbound `method` requests
    pub(crate) fn assert_request_handler_capability(&self, method: &str) -> Result<(), Error> {
        let allowed = match method {
            sampling::commands::CREATE | elicitation::commands::CREATE => match &self.local {
                PeerCapabilities::Client(caps) => {
                    if method == sampling::commands::CREATE {
                        caps.sampling.is_some()
                    } else {
                        caps.elicitation.is_some()
                    }
                }
                // those requests flow server -> client only
                PeerCapabilities::Server(_) => false,
            },
            task::commands::GET
                | task::commands::RESULT
                | task::commands::LIST
                | task::commands::CANCEL => self.local.tasks().is_some(),
            _ => true,
        };

        if allowed {
            Ok(())
        } else {
            Err(Error::new(
                ErrorCode::InvalidRequest,
                format!("Local capabilities do not cover handling {method}")))
        }
    }

    /// Checks that the remote peer accepts task augmentation of `method`
    pub(crate) fn assert_task_capability(&self, method: &str) -> Result<(), Error> {
        if !self.strict {
            return Ok(());
        }
        let remote = self.remote.read().unwrap();
        let Some(remote) = remote.as_ref() else {
            return Ok(());
        };

        let supported = remote
            .tasks()
            .is_some_and(|tasks| tasks.supports(method));

        if supported {
            Ok(())
        } else {
            Err(Error::new(
                ErrorCode::InvalidRequest,
                format!("Remote peer does not support task-augmented {method} requests")))
        }
    }

    /// Checks that the local declaration accepts task augmentation of inbound
    /// `method` requests
    pub(crate) fn assert_task_handler_capability(&self, method: &str) -> Result<(), Error> {
        let supported = self
            .local
            .tasks()
            .is_some_and(|tasks| tasks.supports(method));

        if supported {
            Ok(())
        } else {
            Err(Error::new(
                ErrorCode::InvalidRequest,
                format!("Task augmentation is not supported for {method} requests")))
        }
    }

    /// The side this engine plays
    #[inline]
    pub(crate) fn side(&self) -> Side {
        self.side
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_gate(strict: bool, local: ClientCapabilities) -> CapabilityGate {
        CapabilityGate::new(Side::Client, strict, PeerCapabilities::Client(local))
    }

    fn server_gate(strict: bool, local: ServerCapabilities) -> CapabilityGate {
        CapabilityGate::new(Side::Server, strict, PeerCapabilities::Server(local))
    }

    #[test]
    fn it_allows_everything_before_handshake_in_strict_mode() {
        let gate = client_gate(true, ClientCapabilities::default());

        assert!(gate.assert_capability_for_method("tasks/get").is_ok());
        assert!(gate.assert_task_capability("tools/call").is_ok());
    }

    #[test]
    fn it_rejects_undeclared_remote_method_in_strict_mode() {
        let gate = client_gate(true, ClientCapabilities::default());
        gate.set_remote(PeerCapabilities::Server(ServerCapabilities::default()));

        let result = gate.assert_capability_for_method("tasks/get");
        assert!(result.is_err());
    }

    #[test]
    fn it_defers_to_remote_in_lax_mode() {
        let gate = client_gate(false, ClientCapabilities::default());
        gate.set_remote(PeerCapabilities::Server(ServerCapabilities::default()));

        assert!(gate.assert_capability_for_method("tasks/get").is_ok());
        assert!(gate.assert_task_capability("tools/call").is_ok());
    }

    #[test]
    fn it_accepts_declared_remote_capability_in_strict_mode() {
        let gate = client_gate(true, ClientCapabilities::default());
        gate.set_remote(PeerCapabilities::Server(ServerCapabilities {
            tasks: Some(TasksCapability::default()),
            ..Default::default()
        }));

        assert!(gate.assert_capability_for_method("tasks/get").is_ok());
        assert!(gate.assert_task_capability("tools/call").is_ok());
    }

    #[test]
    fn it_checks_remote_task_augmentable_methods() {
        let gate = server_gate(true, ServerCapabilities::default());
        gate.set_remote(PeerCapabilities::Client(ClientCapabilities {
            tasks: Some(TasksCapability::default().with_requests(["sampling/createMessage"])),
            ..Default::default()
        }));

        assert!(gate.assert_task_capability("sampling/createMessage").is_ok());
        assert!(gate.assert_task_capability("elicitation/create").is_err());
    }

    #[test]
    fn it_rejects_sampling_handler_without_local_declaration() {
        let gate = client_gate(false, ClientCapabilities::default());

        let result = gate.assert_request_handler_capability("sampling/createMessage");
        assert!(result.is_err());
    }

    #[test]
    fn it_accepts_sampling_handler_with_local_declaration() {
        let gate = client_gate(false, ClientCapabilities {
            sampling: Some(Default::default()),
            ..Default::default()
        });

        assert!(gate.assert_request_handler_capability("sampling/createMessage").is_ok());
    }

    #[test]
    fn it_rejects_sampling_handler_on_server_side() {
        let gate = server_gate(false, ServerCapabilities::default());

        assert!(gate.assert_request_handler_capability("sampling/createMessage").is_err());
    }

    #[test]
    fn it_gates_task_handlers_on_local_tasks_capability() {
        let gate = server_gate(false, ServerCapabilities::default());
        assert!(gate.assert_request_handler_capability("tasks/get").is_err());

        let gate = server_gate(false, ServerCapabilities {
            tasks: Some(TasksCapability::default()),
            ..Default::default()
        });
        assert!(gate.assert_request_handler_capability("tasks/get").is_ok());
        assert!(gate.assert_task_handler_capability("tools/call").is_ok());
    }

    #[test]
    fn it_gates_status_notifications_on_local_tasks_capability() {
        let gate = server_gate(false, ServerCapabilities::default());
        assert!(gate.assert_notification_capability("notifications/tasks/status").is_err());
        assert!(gate.assert_notification_capability("notifications/progress").is_ok());
    }

    #[test]
    fn it_always_allows_unmapped_methods() {
        let gate = client_gate(true, ClientCapabilities::default());
        gate.set_remote(PeerCapabilities::Server(ServerCapabilities::default()));

        assert!(gate.assert_capability_for_method("custom/anything").is_ok());
        assert!(gate.assert_request_handler_capability("custom/anything").is_ok());
        assert!(gate.assert_notification_capability("notifications/custom").is_ok());
    }
}
