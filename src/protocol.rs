// Outbound command packet protocol
//
// Fixed 12-byte payload, big-endian 32-bit fields:
// [seq:u32][command:u32][argument:u32]
//
// The sequence number starts at 0 and increments on every send, heartbeats
// included. The receiver uses it to drop reordered datagrams; nothing is
// ever acknowledged or retried.

use std::time::Instant;

use tracing::{debug, warn};

use crate::config::HEARTBEAT_INTERVAL;
use crate::transport::Transport;

pub const PACKET_LEN: usize = 12;

/// Reserved command codes shared with the receiver firmware.
pub const CMD_HEARTBEAT: u32 = 0;
pub const CMD_EMERGENCY_STOP: u32 = 255;

/// Base command code for a motor slot. The per-motor commands are small
/// offsets from this id.
pub fn motor_id(index: usize) -> u32 {
    (index as u32 + 1) * 10
}

pub fn cmd_enable(index: usize) -> u32 {
    motor_id(index)
}

pub fn cmd_disable(index: usize) -> u32 {
    motor_id(index) + 1
}

pub fn cmd_forward(index: usize) -> u32 {
    motor_id(index) + 5
}

pub fn cmd_backward(index: usize) -> u32 {
    motor_id(index) + 6
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("packet is {0} bytes, expected {PACKET_LEN}")]
    BadLength(usize),
}

/// One wire record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboundPacket {
    pub seq: u32,
    pub command: u32,
    pub argument: u32,
}

impl OutboundPacket {
    pub fn encode(&self) -> [u8; PACKET_LEN] {
        let mut buf = [0u8; PACKET_LEN];
        buf[0..4].copy_from_slice(&self.seq.to_be_bytes());
        buf[4..8].copy_from_slice(&self.command.to_be_bytes());
        buf[8..12].copy_from_slice(&self.argument.to_be_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() != PACKET_LEN {
            return Err(ProtocolError::BadLength(buf.len()));
        }
        let word = |i: usize| u32::from_be_bytes(buf[i..i + 4].try_into().unwrap());
        Ok(Self {
            seq: word(0),
            command: word(4),
            argument: word(8),
        })
    }
}

/// Owns the sequence counter and the heartbeat clock for one session.
pub struct PacketLink<T: Transport> {
    transport: T,
    seq: u32,
    last_send: Instant,
}

impl<T: Transport> PacketLink<T> {
    pub fn new(transport: T, now: Instant) -> Self {
        Self {
            transport,
            seq: 0,
            last_send: now,
        }
    }

    /// Build and transmit one packet. A transport failure is logged and
    /// swallowed; the sequence counter never rolls back, so the receiver
    /// sees the gap and the next state change or heartbeat re-establishes
    /// intent.
    pub fn send(&mut self, now: Instant, command: u32, argument: u32) {
        let packet = OutboundPacket {
            seq: self.seq,
            command,
            argument,
        };
        self.seq = self.seq.wrapping_add(1);
        self.last_send = now;
        debug!("tx seq={} cmd={} arg={}", packet.seq, command, argument);
        if let Err(e) = self.transport.send(&packet.encode()) {
            warn!("send failed for seq {}: {}", packet.seq, e);
        }
    }

    /// Keep the receiver's link watchdog fed during operator inactivity.
    /// Sending resets the clock, so at most one heartbeat goes out per
    /// elapsed interval.
    pub fn maybe_heartbeat(&mut self, now: Instant) {
        if now.duration_since(self.last_send) > HEARTBEAT_INTERVAL {
            self.send(now, CMD_HEARTBEAT, 0);
        }
    }

    pub fn seq(&self) -> u32 {
        self.seq
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::RecordingTransport;
    use std::time::Duration;

    fn link() -> (PacketLink<RecordingTransport>, Instant) {
        let now = Instant::now();
        (PacketLink::new(RecordingTransport::default(), now), now)
    }

    fn decoded(link: &PacketLink<RecordingTransport>) -> Vec<OutboundPacket> {
        link.transport()
            .sent
            .iter()
            .map(|p| OutboundPacket::decode(p).unwrap())
            .collect()
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let packet = OutboundPacket {
            seq: 7,
            command: 25,
            argument: 200,
        };
        let buf = packet.encode();
        assert_eq!(buf.len(), PACKET_LEN);
        assert_eq!(OutboundPacket::decode(&buf).unwrap(), packet);
    }

    #[test]
    fn test_encode_is_big_endian() {
        let buf = OutboundPacket {
            seq: 1,
            command: 0x0102_0304,
            argument: 255,
        }
        .encode();
        assert_eq!(&buf[0..4], &[0, 0, 0, 1]);
        assert_eq!(&buf[4..8], &[1, 2, 3, 4]);
        assert_eq!(&buf[8..12], &[0, 0, 0, 255]);
    }

    #[test]
    fn test_decode_rejects_short_packet() {
        assert!(OutboundPacket::decode(&[0u8; 11]).is_err());
    }

    #[test]
    fn test_sequence_increments_per_send() {
        let (mut link, now) = link();
        link.send(now, CMD_HEARTBEAT, 0);
        link.send(now, 15, 128);
        link.send(now, CMD_EMERGENCY_STOP, 0);
        let packets = decoded(&link);
        assert_eq!(
            packets.iter().map(|p| p.seq).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(link.seq(), 3);
    }

    #[test]
    fn test_sequence_advances_even_when_transport_fails() {
        let now = Instant::now();
        let mut transport = RecordingTransport::default();
        transport.fail_next = true;
        let mut link = PacketLink::new(transport, now);
        link.send(now, 15, 1);
        link.send(now, 15, 2);
        let packets = decoded(&link);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].seq, 1);
    }

    #[test]
    fn test_heartbeat_after_quiet_interval() {
        let (mut link, now) = link();
        link.maybe_heartbeat(now + Duration::from_millis(400));
        assert!(decoded(&link).is_empty());
        link.maybe_heartbeat(now + Duration::from_millis(600));
        let packets = decoded(&link);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].command, CMD_HEARTBEAT);
        assert_eq!(packets[0].argument, 0);
    }

    #[test]
    fn test_one_heartbeat_per_interval_no_bursts() {
        let (mut link, now) = link();
        // Poll every 20ms for 2s; the clock resets on each heartbeat,
        // so a quiet link gets exactly one per 500ms interval.
        let mut sent = 0;
        for ms in (0u64..2000).step_by(20) {
            let before = link.transport().sent.len();
            link.maybe_heartbeat(now + Duration::from_millis(ms));
            sent += link.transport().sent.len() - before;
        }
        assert_eq!(sent, 3);
    }

    #[test]
    fn test_other_traffic_suppresses_heartbeat() {
        let (mut link, now) = link();
        link.send(now + Duration::from_millis(450), 15, 10);
        link.maybe_heartbeat(now + Duration::from_millis(600));
        let packets = decoded(&link);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].command, 15);
    }

    #[test]
    fn test_command_codes_match_receiver_convention() {
        assert_eq!(motor_id(0), 10);
        assert_eq!(motor_id(1), 20);
        assert_eq!(cmd_enable(0), 10);
        assert_eq!(cmd_disable(0), 11);
        assert_eq!(cmd_forward(0), 15);
        assert_eq!(cmd_backward(0), 16);
        assert_eq!(cmd_forward(1), 25);
        assert_eq!(CMD_EMERGENCY_STOP, 255);
    }
}
