// Outbound UDP transport
//
// Command packets are fire-and-forget: a failed send is logged by the
// caller and never retried. The next state change or heartbeat carries
// the current intent anyway.

use std::net::{ToSocketAddrs, UdpSocket};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot resolve remote address {0}")]
    BadAddress(String),

    #[error("short send: {sent} of {len} bytes")]
    ShortSend { sent: usize, len: usize },
}

/// Anything the packet link can push bytes through.
pub trait Transport {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;
}

/// Datagram transport to the robot receiver.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind an ephemeral local port and connect to the receiver.
    pub fn connect(remote: &str) -> Result<Self, TransportError> {
        let addr = remote
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| TransportError::BadAddress(remote.to_string()))?;
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect(addr)?;
        Ok(Self { socket })
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let sent = self.socket.send(payload)?;
        if sent != payload.len() {
            return Err(TransportError::ShortSend {
                sent,
                len: payload.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// Records every payload instead of touching the network.
    #[derive(Default)]
    pub struct RecordingTransport {
        pub sent: Vec<Vec<u8>>,
        pub fail_next: bool,
    }

    impl Transport for RecordingTransport {
        fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
            if self.fail_next {
                self.fail_next = false;
                return Err(TransportError::ShortSend {
                    sent: 0,
                    len: payload.len(),
                });
            }
            self.sent.push(payload.to_vec());
            Ok(())
        }
    }

    /// Recording transport whose log outlives the owner, for checking what
    /// goes out during teardown.
    #[derive(Default, Clone)]
    pub struct SharedRecordingTransport {
        pub sent: std::rc::Rc<std::cell::RefCell<Vec<Vec<u8>>>>,
    }

    impl Transport for SharedRecordingTransport {
        fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
            self.sent.borrow_mut().push(payload.to_vec());
            Ok(())
        }
    }
}
