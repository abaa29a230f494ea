// Debug receiver: prints decoded command packets and models the robot's
// link watchdog, so the controller can be exercised without hardware.

use std::net::UdpSocket;
use std::time::{Duration, Instant};

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rover_teleop::protocol::{OutboundPacket, CMD_EMERGENCY_STOP, CMD_HEARTBEAT};

// Matches the robot firmware: no packet for this long means the link is
// considered dead and the motors stop.
const LINK_TIMEOUT: Duration = Duration::from_millis(3000);

const LISTEN_ADDR: &str = "0.0.0.0:7245";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let socket = UdpSocket::bind(LISTEN_ADDR)?;
    socket.set_read_timeout(Some(Duration::from_millis(100)))?;
    info!("listening on {}", LISTEN_ADDR);

    let mut buf = [0u8; 64];
    let mut last_packet: Option<Instant> = None;
    let mut last_seq: Option<u32> = None;
    let mut link_up = false;

    loop {
        match socket.recv_from(&mut buf) {
            Ok((len, peer)) => {
                let packet = match OutboundPacket::decode(&buf[..len]) {
                    Ok(p) => p,
                    Err(e) => {
                        warn!("bad packet from {} ({} bytes): {}", peer, len, e);
                        continue;
                    }
                };
                if !link_up {
                    info!("link up from {}", peer);
                    link_up = true;
                }
                if let Some(prev) = last_seq {
                    let gap = packet.seq.wrapping_sub(prev);
                    if gap != 1 {
                        warn!("seq jump {} -> {} ({} lost)", prev, packet.seq, gap.wrapping_sub(1));
                    }
                }
                last_seq = Some(packet.seq);
                last_packet = Some(Instant::now());

                match packet.command {
                    CMD_HEARTBEAT => info!("seq {}: heartbeat", packet.seq),
                    CMD_EMERGENCY_STOP => warn!("seq {}: EMERGENCY STOP", packet.seq),
                    cmd => {
                        let motor = cmd / 10;
                        let what = match cmd % 10 {
                            0 => "enable",
                            1 => "disable",
                            5 => "forward",
                            6 => "backward",
                            _ => "unknown",
                        };
                        info!("seq {}: motor {} {} arg={}", packet.seq, motor, what, packet.argument);
                    }
                }
            }
            Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => {
                if link_up && last_packet.is_some_and(|t| t.elapsed() > LINK_TIMEOUT) {
                    warn!("link timeout, stopping motors");
                    link_up = false;
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}
