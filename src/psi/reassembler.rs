// psi/reassembler.rs
//! Per-PID PSI/SI section reassembly and table_id keyed dispatch.
//!
//! Payload bytes are accumulated per PID until a complete section is
//! buffered; its CRC-32 is checked and the section is handed to every
//! consumer registered for its table_id. Several sections packed back to back
//! in one buffer are all dispatched. Consumers may ask for new registrations
//! while handling a section (PAT discovering PMT PIDs, PMT discovering AIT
//! PIDs); those are applied as soon as the current dispatch returns.

use std::collections::HashMap;

use bytes::BytesMut;
use log::{debug, warn};

use crate::constants::{MAX_SECTION_SIZE, NULL_PID, SECTION_HEADER_SIZE};
use crate::packet::TsPacket;
use crate::psi::section::{SectionHeader, SectionReader, verify_crc};
use crate::stats::{ReassemblyStats, StreamCounters};
use crate::types::AitEvent;

/// table_id marking the rest of a packet payload as stuffing
const STUFFING_TABLE_ID: u8 = 0xFF;

pub type ConsumerId = u64;

/// Receives complete, CRC-checked sections for the table_ids it is
/// registered under.
pub trait SectionConsumer {
    /// Short label used in logs and for deduplicating registrations.
    fn name(&self) -> &'static str;

    /// PID this consumer is bound to; `None` accepts every PID.
    fn pid(&self) -> Option<u16> {
        None
    }

    fn on_section(
        &mut self,
        pid: u16,
        section: &SectionReader<'_>,
        ctx: &mut SectionContext,
    ) -> anyhow::Result<()>;
}

/// Side effects collected while consumers handle a section.
#[derive(Default)]
pub struct SectionContext {
    registrations: Vec<(u8, Box<dyn SectionConsumer>)>,
    events: Vec<AitEvent>,
}

impl SectionContext {
    /// Queues a registration. Skipped if a consumer with the same name and
    /// PID scope already listens on `table_id`.
    pub fn register(&mut self, table_id: u8, consumer: Box<dyn SectionConsumer>) {
        self.registrations.push((table_id, consumer));
    }

    pub fn emit(&mut self, event: AitEvent) {
        self.events.push(event);
    }

    pub fn into_events(self) -> Vec<AitEvent> {
        self.events
    }
}

struct Registration {
    id: ConsumerId,
    consumer: Box<dyn SectionConsumer>,
}

pub struct Reassembler {
    buffers: HashMap<u16, BytesMut>,
    consumers: HashMap<u8, Vec<Registration>>,
    next_id: ConsumerId,
    max_section_size: usize,
    counters: StreamCounters,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(MAX_SECTION_SIZE)
    }
}

impl Reassembler {
    pub fn new(max_section_size: usize) -> Self {
        Self {
            buffers: HashMap::new(),
            consumers: HashMap::new(),
            next_id: 0,
            max_section_size,
            counters: StreamCounters::default(),
        }
    }

    /// Demultiplexes one 188-byte frame and feeds its payload. Bad framing
    /// is logged and dropped.
    pub fn process_packet(&mut self, chunk: &[u8]) -> Vec<AitEvent> {
        self.counters.packets += 1;
        let packet = match TsPacket::parse(chunk) {
            Ok(p) => p,
            Err(e) => {
                self.counters.framing_drops += 1;
                warn!("dropping TS packet: {e}");
                return Vec::new();
            }
        };

        let header = packet.header;
        if header.is_scrambled() {
            self.counters.scrambled_drops += 1;
            debug!("PID 0x{:04X}: scrambled packet skipped", header.pid);
            return Vec::new();
        }
        if header.pid == NULL_PID || packet.payload.is_empty() {
            return Vec::new();
        }
        self.push_payload(header.pid, header.payload_unit_start, packet.payload)
    }

    /// Feeds the payload of one packet on `pid`. With `unit_start` set the
    /// first byte is the pointer_field.
    pub fn push_payload(&mut self, pid: u16, unit_start: bool, payload: &[u8]) -> Vec<AitEvent> {
        if unit_start {
            let Some((&pointer, rest)) = payload.split_first() else {
                return Vec::new();
            };
            let pointer = pointer as usize;
            if pointer >= rest.len() {
                warn!("PID 0x{pid:04X}: pointer_field {pointer} runs past payload");
                self.buffers.remove(&pid);
                return Vec::new();
            }

            let buf = self.buffers.entry(pid).or_default();
            if !buf.is_empty() {
                debug!(
                    "PID 0x{pid:04X}: discarding {} bytes of unfinished section",
                    buf.len()
                );
            }
            buf.clear();
            buf.extend_from_slice(&rest[pointer..]);
            if buf.len() >= SECTION_HEADER_SIZE {
                debug!("PID 0x{pid:04X}: new section, table_id=0x{:02X}", buf[0]);
            }
        } else {
            // continuation without a section in progress
            let Some(buf) = self.buffers.get_mut(&pid).filter(|b| !b.is_empty()) else {
                return Vec::new();
            };
            buf.extend_from_slice(payload);
        }

        let mut ctx = SectionContext::default();
        self.drain(pid, &mut ctx);
        ctx.into_events()
    }

    /// Cuts every complete section off the front of the PID's buffer.
    fn drain(&mut self, pid: u16, ctx: &mut SectionContext) {
        loop {
            let Some(buf) = self.buffers.get_mut(&pid) else {
                return;
            };
            if buf.len() < SECTION_HEADER_SIZE {
                break;
            }
            if buf[0] == STUFFING_TABLE_ID {
                buf.clear();
                break;
            }

            let header = match SectionHeader::parse(buf) {
                Ok(h) => h,
                Err(_) => break,
            };
            let total = header.total_length();
            if total > self.max_section_size {
                // can never complete within the bound
                if buf.len() > self.max_section_size {
                    warn!(
                        "PID 0x{pid:04X}: section buffer overflow ({} bytes), resetting",
                        buf.len()
                    );
                    self.counters.overflow_resets += 1;
                    buf.clear();
                }
                break;
            }
            if buf.len() < total {
                break;
            }

            let section = buf.split_to(total).freeze();
            if !header.has_crc() {
                warn!(
                    "PID 0x{pid:04X}: section_length {} too short for CRC, buffer reset",
                    header.section_length
                );
                self.counters.crc_errors += 1;
                buf.clear();
                break;
            }
            if let Err(e) = verify_crc(&section) {
                warn!(
                    "PID 0x{pid:04X}: table_id=0x{:02X} dropped: {e}",
                    header.table_id
                );
                self.counters.crc_errors += 1;
                buf.clear();
                break;
            }

            debug!(
                "PID 0x{pid:04X}: complete section, table_id=0x{:02X}, size={total} bytes",
                header.table_id
            );
            self.dispatch(pid, &section, ctx);
            self.apply_registrations(ctx);
        }
    }

    fn dispatch(&mut self, pid: u16, section: &[u8], ctx: &mut SectionContext) {
        let reader = match SectionReader::trusted(section) {
            Ok(r) => r,
            Err(e) => {
                warn!("PID 0x{pid:04X}: unreadable section: {e}");
                return;
            }
        };
        self.counters.sections_dispatched += 1;

        let table_id = reader.table_id();
        let Some(list) = self.consumers.get_mut(&table_id) else {
            return;
        };
        for reg in list.iter_mut() {
            if reg.consumer.pid().is_some_and(|scope| scope != pid) {
                continue;
            }
            if let Err(e) = reg.consumer.on_section(pid, &reader, ctx) {
                self.counters.consumer_errors += 1;
                warn!(
                    "consumer {} failed on table_id 0x{table_id:02X} (PID 0x{pid:04X}): {e:#}",
                    reg.consumer.name()
                );
            }
        }
    }

    fn apply_registrations(&mut self, ctx: &mut SectionContext) {
        for (table_id, consumer) in std::mem::take(&mut ctx.registrations) {
            if self.is_registered(table_id, consumer.name(), consumer.pid()) {
                continue;
            }
            self.register_consumer(table_id, consumer);
        }
    }

    /// Adds a consumer for `table_id`; many consumers may share one table_id.
    pub fn register_consumer(&mut self, table_id: u8, consumer: Box<dyn SectionConsumer>) -> ConsumerId {
        let id = self.next_id;
        self.next_id += 1;
        match consumer.pid() {
            Some(pid) => debug!(
                "registered {} for table_id 0x{table_id:02X} on PID 0x{pid:04X}",
                consumer.name()
            ),
            None => debug!("registered {} for table_id 0x{table_id:02X}", consumer.name()),
        }
        self.consumers
            .entry(table_id)
            .or_default()
            .push(Registration { id, consumer });
        id
    }

    /// Removes one consumer. The table_id entry goes away with its last
    /// consumer.
    pub fn unregister_consumer(&mut self, table_id: u8, id: ConsumerId) -> Option<Box<dyn SectionConsumer>> {
        let list = self.consumers.get_mut(&table_id)?;
        let idx = list.iter().position(|r| r.id == id)?;
        let removed = list.remove(idx);
        if list.is_empty() {
            self.consumers.remove(&table_id);
        }
        debug!("unregistered {} for table_id 0x{table_id:02X}", removed.consumer.name());
        Some(removed.consumer)
    }

    pub fn is_registered(&self, table_id: u8, name: &str, pid: Option<u16>) -> bool {
        self.consumers
            .get(&table_id)
            .is_some_and(|list| list.iter().any(|r| r.consumer.name() == name && r.consumer.pid() == pid))
    }

    /// PIDs that table_id's consumers are bound to, sorted.
    pub fn scoped_pids(&self, table_id: u8) -> Vec<u16> {
        let mut pids: Vec<u16> = self
            .consumers
            .get(&table_id)
            .map(|list| list.iter().filter_map(|r| r.consumer.pid()).collect())
            .unwrap_or_default();
        pids.sort_unstable();
        pids.dedup();
        pids
    }

    pub fn has_consumers(&self, table_id: u8) -> bool {
        self.consumers.contains_key(&table_id)
    }

    /// Drops every per-PID buffer. Must run before the first packet of a new
    /// stream (channel change, seek).
    pub fn clear_buffers(&mut self) {
        self.buffers.clear();
        debug!("cleared all section buffers");
    }

    /// Drops buffers and every registered consumer.
    pub fn clear_consumers(&mut self) {
        self.buffers.clear();
        self.consumers.clear();
    }

    pub fn buffered_len(&self, pid: u16) -> usize {
        self.buffers.get(&pid).map_or(0, |b| b.len())
    }

    pub fn counters(&self) -> &StreamCounters {
        &self.counters
    }

    pub fn counters_mut(&mut self) -> &mut StreamCounters {
        &mut self.counters
    }

    pub fn stats(&self) -> ReassemblyStats {
        let mut active_pids: Vec<u16> = self.buffers.keys().copied().collect();
        active_pids.sort_unstable();
        ReassemblyStats {
            total_buffers: self.buffers.len(),
            total_consumers: self.consumers.values().map(Vec::len).sum(),
            active_pids,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::constants::{TABLE_ID_AIT, TABLE_ID_PAT, TS_PACKET_SIZE};
    use crate::testutil::{long_section, packetize, pat_section};

    /// Records (pid, section bytes) of everything it sees.
    struct Recorder {
        seen: Rc<RefCell<Vec<(u16, Vec<u8>)>>>,
        scope: Option<u16>,
    }

    impl SectionConsumer for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn pid(&self) -> Option<u16> {
            self.scope
        }

        fn on_section(&mut self, pid: u16, section: &SectionReader<'_>, _: &mut SectionContext) -> anyhow::Result<()> {
            self.seen.borrow_mut().push((pid, section.raw.to_vec()));
            Ok(())
        }
    }

    struct Failing;

    impl SectionConsumer for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn on_section(&mut self, _: u16, _: &SectionReader<'_>, _: &mut SectionContext) -> anyhow::Result<()> {
            anyhow::bail!("boom")
        }
    }

    fn recorder(scope: Option<u16>) -> (Box<Recorder>, Rc<RefCell<Vec<(u16, Vec<u8>)>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        (Box::new(Recorder { seen: seen.clone(), scope }), seen)
    }

    fn feed(r: &mut Reassembler, packets: &[[u8; TS_PACKET_SIZE]]) {
        for p in packets {
            r.process_packet(p);
        }
    }

    #[test]
    fn single_packet_section_is_dispatched() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut r = Reassembler::default();
        let (rec, seen) = recorder(None);
        r.register_consumer(TABLE_ID_PAT, rec);

        let pat = pat_section(1, &[(1, 0x1000)]);
        feed(&mut r, &packetize(0, &pat, 0));

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, 0);
        assert_eq!(seen[0].1, pat);
        assert_eq!(seen[0].1.len(), 3 + (((pat[1] & 0x0F) as usize) << 8 | pat[2] as usize));
    }

    #[test]
    fn multi_packet_section_matches_single_delivery() {
        let body: Vec<u8> = (0..388u32).map(|i| (i * 7) as u8).collect();
        let section = long_section(TABLE_ID_AIT, 0x0010, 1, &body);
        assert_eq!(section.len(), 400);

        let mut split = Reassembler::default();
        let (rec, seen_split) = recorder(None);
        split.register_consumer(TABLE_ID_AIT, rec);
        let packets = packetize(0x0100, &section, 0);
        assert_eq!(packets.len(), 3);
        feed(&mut split, &packets);

        let mut whole = Reassembler::default();
        let (rec, seen_whole) = recorder(None);
        whole.register_consumer(TABLE_ID_AIT, rec);
        whole.push_payload(0x0100, true, &[&[0u8][..], &section[..]].concat());

        assert_eq!(seen_split.borrow().len(), 1);
        assert_eq!(seen_split.borrow()[0].1, seen_whole.borrow()[0].1);
        assert_eq!(seen_split.borrow()[0].1, section);
    }

    #[test]
    fn pointer_field_skips_prefix_and_discards_old_buffer() {
        let mut r = Reassembler::default();
        let (rec, seen) = recorder(None);
        r.register_consumer(TABLE_ID_PAT, rec);

        // start of a section that never completes
        r.push_payload(0, true, &[0x00, 0x00, 0xB0, 0x40, 0x01]);
        assert_eq!(r.buffered_len(0), 4);

        let pat = pat_section(7, &[(3, 0x0200)]);
        let mut payload = vec![0x02, 0xAA, 0xBB];
        payload.extend_from_slice(&pat);
        r.push_payload(0, true, &payload);

        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0].1, pat);
        assert_eq!(r.buffered_len(0), 0);
    }

    #[test]
    fn packed_sections_are_all_dispatched() {
        let mut r = Reassembler::default();
        let (rec, seen) = recorder(None);
        r.register_consumer(0x42, rec);

        let a = long_section(0x42, 1, 0, &[1, 2, 3]);
        let b = long_section(0x42, 2, 0, &[4, 5]);
        let mut payload = vec![0x00];
        payload.extend_from_slice(&a);
        payload.extend_from_slice(&b);
        payload.extend_from_slice(&[0xFF; 20]);
        r.push_payload(0x30, true, &payload);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].1, a);
        assert_eq!(seen[1].1, b);
        assert_eq!(r.buffered_len(0x30), 0);
    }

    #[test]
    fn corrupt_crc_drops_section() {
        let mut r = Reassembler::default();
        let (rec, seen) = recorder(None);
        r.register_consumer(TABLE_ID_PAT, rec);

        let mut pat = pat_section(1, &[(1, 0x1000)]);
        let last = pat.len() - 1;
        pat[last] ^= 0x80;
        feed(&mut r, &packetize(0, &pat, 0));

        assert!(seen.borrow().is_empty());
        assert_eq!(r.counters().crc_errors, 1);
        assert_eq!(r.buffered_len(0), 0);
    }

    #[test]
    fn overflow_guard_resets_unterminated_section() {
        let mut r = Reassembler::default();
        let (rec, seen) = recorder(None);
        r.register_consumer(0x80, rec);

        // section_length 0xFFF: total 4098 bytes, more than the bound allows
        let mut first = vec![0x00, 0x80, 0x8F, 0xFF];
        first.extend_from_slice(&[0x11; 180]);
        r.push_payload(0x40, true, &first);

        let mut fed = first.len();
        let mut max_seen = 0;
        while fed < 5000 {
            r.push_payload(0x40, false, &[0x22; 184]);
            fed += 184;
            max_seen = max_seen.max(r.buffered_len(0x40));
        }

        assert!(max_seen <= MAX_SECTION_SIZE);
        assert_eq!(r.counters().overflow_resets, 1);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn continuation_without_start_is_ignored() {
        let mut r = Reassembler::default();
        r.push_payload(0x50, false, &[0x00, 0xB0, 0x05]);
        assert_eq!(r.stats().total_buffers, 0);
    }

    #[test]
    fn failing_consumer_does_not_block_others() {
        let mut r = Reassembler::default();
        r.register_consumer(TABLE_ID_PAT, Box::new(Failing));
        let (rec, seen) = recorder(None);
        r.register_consumer(TABLE_ID_PAT, rec);

        let pat = pat_section(1, &[(1, 0x1000)]);
        feed(&mut r, &packetize(0, &pat, 0));

        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(r.counters().consumer_errors, 1);
    }

    #[test]
    fn pid_scoped_consumer_ignores_other_pids() {
        let mut r = Reassembler::default();
        let (rec, seen) = recorder(Some(0x0101));
        r.register_consumer(TABLE_ID_AIT, rec);

        let ait = long_section(TABLE_ID_AIT, 0x0010, 0, &[0xF0, 0x00, 0xF0, 0x00]);
        feed(&mut r, &packetize(0x0100, &ait, 0));
        assert!(seen.borrow().is_empty());

        feed(&mut r, &packetize(0x0101, &ait, 0));
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0].0, 0x0101);
    }

    #[test]
    fn register_and_unregister_consumer() {
        let mut r = Reassembler::default();
        let (a, _) = recorder(None);
        let (b, _) = recorder(None);
        let id_a = r.register_consumer(TABLE_ID_AIT, a);
        let id_b = r.register_consumer(TABLE_ID_AIT, b);
        assert_eq!(r.stats().total_consumers, 2);

        assert!(r.unregister_consumer(TABLE_ID_AIT, id_a).is_some());
        assert!(r.has_consumers(TABLE_ID_AIT));
        assert!(r.unregister_consumer(TABLE_ID_AIT, id_a).is_none());
        assert!(r.unregister_consumer(TABLE_ID_AIT, id_b).is_some());
        assert!(!r.has_consumers(TABLE_ID_AIT));
        assert_eq!(r.stats().total_consumers, 0);
    }

    #[test]
    fn clear_buffers_drops_partial_sections() {
        let mut r = Reassembler::default();
        let (rec, seen) = recorder(None);
        r.register_consumer(TABLE_ID_AIT, rec);

        let body = vec![0x5A; 300];
        let ait = long_section(TABLE_ID_AIT, 0x0010, 0, &body);
        let packets = packetize(0x0100, &ait, 0);
        r.process_packet(&packets[0]);
        assert_eq!(r.stats().active_pids, vec![0x0100]);

        r.clear_buffers();
        assert_eq!(r.stats().total_buffers, 0);
        // tail of the old stream must not complete anything
        r.process_packet(&packets[1]);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn bad_framing_is_counted_and_dropped() {
        let mut r = Reassembler::default();
        let mut p = packetize(0, &pat_section(1, &[]), 0)[0];
        p[0] = 0x48;
        assert!(r.process_packet(&p).is_empty());
        assert!(r.process_packet(&p[..187]).is_empty());
        assert_eq!(r.counters().framing_drops, 2);
    }

    #[test]
    fn scrambled_packets_are_counted_and_dropped() {
        let mut r = Reassembler::default();
        let (rec, seen) = recorder(None);
        r.register_consumer(TABLE_ID_PAT, rec);

        let mut p = packetize(0, &pat_section(1, &[(1, 0x0100)]), 0)[0];
        p[3] |= 0x80;
        assert!(r.process_packet(&p).is_empty());
        assert_eq!(r.counters().scrambled_drops, 1);
        assert_eq!(r.buffered_len(0), 0);
        assert!(seen.borrow().is_empty());

        p[3] &= 0x3F;
        r.process_packet(&p);
        assert_eq!(seen.borrow().len(), 1);
    }
}
