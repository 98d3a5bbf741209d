//! Packet bit-flags: a 16-bit field where each bit is an independent
//! boolean, bit positions 0 through 9 assigned (§4.6).

const IS_QUEUE: u16 = 1 << 0;
const REDELIVERED: u16 = 1 << 1;
const PERSISTENT: u16 = 1 << 2;
const SELECTORS_PROCESSED: u16 = 1 << 3;
const SEND_ACK: u16 = 1 << 4;
const LAST_MESSAGE: u16 = 1 << 5;
const FLOW_PAUSED: u16 = 1 << 6;
const PART_OF_TRANSACTION: u16 = 1 << 7;
const CONSUMER_FLOW_PAUSED: u16 = 1 << 8;
const SERVER_PACKET: u16 = 1 << 9;

/// The packet header's 10 named bit-flags, packed into one `u16`. Bits
/// beyond position 9 are preserved on read but carry no named meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketFlags(u16);

macro_rules! flag_accessor {
    ($get:ident, $set:ident, $bit:expr) => {
        pub fn $get(&self) -> bool {
            self.0 & $bit != 0
        }

        pub fn $set(&mut self, value: bool) {
            if value {
                self.0 |= $bit;
            } else {
                self.0 &= !$bit;
            }
        }
    };
}

impl PacketFlags {
    pub fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    flag_accessor!(is_queue, set_is_queue, IS_QUEUE);
    flag_accessor!(is_redelivered, set_redelivered, REDELIVERED);
    flag_accessor!(is_persistent, set_persistent, PERSISTENT);
    flag_accessor!(selectors_processed, set_selectors_processed, SELECTORS_PROCESSED);
    flag_accessor!(send_ack, set_send_ack, SEND_ACK);
    flag_accessor!(is_last_message, set_last_message, LAST_MESSAGE);
    flag_accessor!(flow_paused, set_flow_paused, FLOW_PAUSED);
    flag_accessor!(part_of_transaction, set_part_of_transaction, PART_OF_TRANSACTION);
    flag_accessor!(consumer_flow_paused, set_consumer_flow_paused, CONSUMER_FLOW_PAUSED);
    flag_accessor!(is_server_packet, set_server_packet, SERVER_PACKET);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_flag_occupies_a_distinct_bit() {
        let mut f = PacketFlags::default();
        f.set_is_queue(true);
        f.set_persistent(true);
        assert_eq!(f.bits(), IS_QUEUE | PERSISTENT);
        assert!(f.is_queue());
        assert!(f.is_persistent());
        assert!(!f.is_redelivered());
    }

    #[test]
    fn clearing_a_flag_leaves_the_others_untouched() {
        let mut f = PacketFlags::from_bits(IS_QUEUE | REDELIVERED | SERVER_PACKET);
        f.set_redelivered(false);
        assert!(f.is_queue());
        assert!(!f.is_redelivered());
        assert!(f.is_server_packet());
    }
}
