//! Transport where every call succeeds without doing anything.
//!
//! A transport built with [`NoopTransport::recording`] keeps a log of its
//! calls so tests can assert which steps ran and in what order. The plain
//! [`NoopTransport::new`] keeps nothing.

use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::{DialTarget, Transport, TransportError};

/// One recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Dial { host: String, username: String },
    OpenSession,
    Run(String),
    CombinedOutput(String),
    CloseSession,
    CloseConnection,
}

#[derive(Debug, Default)]
pub struct NoopTransport {
    calls: Option<Mutex<Vec<TransportCall>>>,
}

impl NoopTransport {
    /// Dry-run transport for long-lived processes: nothing is retained.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport that logs every call for later inspection.
    pub fn recording() -> Self {
        Self {
            calls: Some(Mutex::new(Vec::new())),
        }
    }

    /// Snapshot of the calls made so far, oldest first. Always empty unless
    /// built with [`NoopTransport::recording`].
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.as_ref().map_or_else(Vec::new, |calls| {
            calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        })
    }

    fn record(&self, call: TransportCall) {
        debug!(?call, "noop transport");
        if let Some(calls) = &self.calls {
            calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(call);
        }
    }
}

impl Transport for NoopTransport {
    type Connection = ();
    type Session = ();

    fn dial(&self, target: &DialTarget) -> Result<(), TransportError> {
        self.record(TransportCall::Dial {
            host: target.host.clone(),
            username: target.username.clone(),
        });
        Ok(())
    }

    fn open_session(&self, _connection: &()) -> Result<(), TransportError> {
        self.record(TransportCall::OpenSession);
        Ok(())
    }

    fn run(&self, _session: &mut (), command: &str) -> Result<(), TransportError> {
        self.record(TransportCall::Run(command.to_string()));
        Ok(())
    }

    fn combined_output(&self, _session: &mut (), command: &str) -> Result<Vec<u8>, TransportError> {
        self.record(TransportCall::CombinedOutput(command.to_string()));
        Ok(Vec::new())
    }

    fn close_session(&self, _session: ()) -> Result<(), TransportError> {
        self.record(TransportCall::CloseSession);
        Ok(())
    }

    fn close_connection(&self, _connection: ()) {
        self.record(TransportCall::CloseConnection);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Auth;

    #[test]
    fn every_call_succeeds_and_is_recorded_in_order() {
        let transport = NoopTransport::recording();
        let target = DialTarget {
            host: "relaynode.dccn.nl".into(),
            port: 22,
            username: "dccnuser".into(),
            auth: Auth::Password("somepassword".into()),
        };

        let conn = transport.dial(&target).unwrap();
        let mut session = transport.open_session(&conn).unwrap();
        transport.run(&mut session, "ls -1").unwrap();
        let out = transport.combined_output(&mut session, "hostname").unwrap();
        transport.close_session(session).unwrap();
        transport.close_connection(conn);

        assert!(out.is_empty());
        assert_eq!(
            transport.calls(),
            vec![
                TransportCall::Dial {
                    host: "relaynode.dccn.nl".into(),
                    username: "dccnuser".into()
                },
                TransportCall::OpenSession,
                TransportCall::Run("ls -1".into()),
                TransportCall::CombinedOutput("hostname".into()),
                TransportCall::CloseSession,
                TransportCall::CloseConnection,
            ]
        );
    }

    #[test]
    fn plain_transport_retains_nothing() {
        let transport = NoopTransport::new();
        let target = DialTarget {
            host: "relaynode.dccn.nl".into(),
            port: 22,
            username: "dccnuser".into(),
            auth: Auth::Password("somepassword".into()),
        };

        for _ in 0..100 {
            let conn = transport.dial(&target).unwrap();
            let mut session = transport.open_session(&conn).unwrap();
            transport.combined_output(&mut session, "qsub").unwrap();
            transport.close_session(session).unwrap();
            transport.close_connection(conn);
        }

        assert!(transport.calls().is_empty());
        assert!(transport.calls.is_none());
    }
}
