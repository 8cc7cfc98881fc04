//! Receive-side reassembly of multi-frame addressed messages.
//!
//! Frames of one message are matched by source alias, MTI and destination
//! alias. Both continuation flags are accepted: flag 3 always means more
//! frames follow, flag 2 means "last" for senders that use flag 3 and
//! "middle or last" for senders that do not. The second case is settled by
//! size: a flag-2 frame carrying fewer than six payload bytes ends the
//! message. A flag-2 frame with exactly six bytes leaves the message open
//! until one of:
//! - the payload reaches 72 bytes
//! - the same sender starts another message with the same MTI and destination
//! - no frame for it arrives within the reassembly timeout

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use olcbprims_frame::Alias;

use crate::message::{MessageFrame, Reassembled, Segment, MAX_ADDRESSED_PAYLOAD, SEGMENT_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    source: Alias,
    mti: u16,
    dest: Alias,
}

struct Partial {
    data: BytesMut,
    /// At least one continuation frame arrived.
    continued: bool,
    /// The sender marks middle frames with flag 3.
    flags_middle: bool,
    touched: Instant,
}

/// Result of feeding frames through the [`Reassembler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RxOutcome {
    Completed(Reassembled),
    Dropped(String),
}

pub(crate) struct Reassembler {
    partials: HashMap<Key, Partial>,
    stale_after: Duration,
}

impl Reassembler {
    pub(crate) fn new(stale_after: Duration) -> Self {
        Self {
            partials: HashMap::new(),
            stale_after,
        }
    }

    /// Feed one frame. Finished or abandoned messages land in `out`, oldest first.
    pub(crate) fn accept(&mut self, frame: MessageFrame, now: Instant, out: &mut VecDeque<RxOutcome>) {
        let Some(dest) = frame.dest else {
            out.push_back(RxOutcome::Completed(whole(frame)));
            return;
        };
        let key = Key {
            source: frame.source,
            mti: frame.mti,
            dest,
        };

        match frame.segment {
            Segment::Only => {
                self.close(key, out);
                out.push_back(RxOutcome::Completed(whole(frame)));
            }
            Segment::First => {
                self.close(key, out);
                self.partials.insert(
                    key,
                    Partial {
                        data: BytesMut::from(&frame.data[..]),
                        continued: false,
                        flags_middle: false,
                        touched: now,
                    },
                );
            }
            Segment::Middle | Segment::Last => {
                let Some(partial) = self.partials.get_mut(&key) else {
                    out.push_back(RxOutcome::Dropped(format!(
                        "continuation from {} for mti 0x{:03X} without a first frame",
                        key.source, key.mti
                    )));
                    return;
                };
                partial.data.extend_from_slice(&frame.data);
                partial.continued = true;
                partial.touched = now;
                partial.flags_middle |= frame.segment == Segment::Middle;

                let size = partial.data.len();
                if size > MAX_ADDRESSED_PAYLOAD {
                    self.partials.remove(&key);
                    out.push_back(RxOutcome::Dropped(format!(
                        "message from {} grew past {MAX_ADDRESSED_PAYLOAD} bytes",
                        key.source
                    )));
                    return;
                }
                let ends = frame.segment == Segment::Last
                    && (partial.flags_middle || frame.data.len() < SEGMENT_LEN);
                if ends || size == MAX_ADDRESSED_PAYLOAD {
                    self.finish(key, out);
                }
            }
        }
    }

    /// Close every message idle for longer than the reassembly timeout.
    pub(crate) fn expire(&mut self, now: Instant, out: &mut VecDeque<RxOutcome>) {
        let mut stale: Vec<(Instant, Key)> = self
            .partials
            .iter()
            .filter(|(_, partial)| now.saturating_duration_since(partial.touched) >= self.stale_after)
            .map(|(key, partial)| (partial.touched, *key))
            .collect();
        stale.sort_by_key(|(touched, _)| *touched);
        for (_, key) in stale {
            self.close(key, out);
        }
    }

    /// When the oldest open message goes stale.
    pub(crate) fn next_expiry(&self) -> Option<Instant> {
        self.partials
            .values()
            .map(|partial| partial.touched + self.stale_after)
            .min()
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.partials.len()
    }

    /// End an open message whose last frame may already have arrived.
    fn close(&mut self, key: Key, out: &mut VecDeque<RxOutcome>) {
        match self.partials.get(&key) {
            Some(partial) if partial.continued => self.finish(key, out),
            Some(_) => {
                self.partials.remove(&key);
                out.push_back(RxOutcome::Dropped(format!(
                    "first frame from {} for mti 0x{:03X} never continued",
                    key.source, key.mti
                )));
            }
            None => {}
        }
    }

    fn finish(&mut self, key: Key, out: &mut VecDeque<RxOutcome>) {
        if let Some(partial) = self.partials.remove(&key) {
            out.push_back(RxOutcome::Completed(Reassembled {
                mti: key.mti,
                source: key.source,
                dest: Some(key.dest),
                payload: partial.data.freeze(),
            }));
        }
    }
}

fn whole(frame: MessageFrame) -> Reassembled {
    Reassembled {
        mti: frame.mti,
        source: frame.source,
        dest: frame.dest,
        payload: frame.data,
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use olcbprims_frame::CanFrame;

    use super::*;
    use crate::message::{encode_message, parse_frame};

    const STALE: Duration = Duration::from_millis(200);

    fn alias(value: u16) -> Alias {
        Alias::new(value).unwrap()
    }

    fn frames(len: usize) -> (Vec<u8>, Vec<MessageFrame>) {
        let payload: Vec<u8> = (0..len as u8).collect();
        let frames = encode_message(0x828, alias(0x0A0), Some(alias(0x0B0)), &payload)
            .unwrap()
            .iter()
            .map(|f| parse_frame(f).unwrap())
            .collect();
        (payload, frames)
    }

    fn feed(rx: &mut Reassembler, frames: Vec<MessageFrame>, now: Instant) -> VecDeque<RxOutcome> {
        let mut out = VecDeque::new();
        for frame in frames {
            rx.accept(frame, now, &mut out);
        }
        out
    }

    fn completed(payload: &[u8]) -> RxOutcome {
        RxOutcome::Completed(Reassembled {
            mti: 0x828,
            source: alias(0x0A0),
            dest: Some(alias(0x0B0)),
            payload: Bytes::copy_from_slice(payload),
        })
    }

    #[test]
    fn short_final_frame_completes_fifteen_bytes() {
        let mut rx = Reassembler::new(STALE);
        let (payload, frames) = frames(15);
        let out = feed(&mut rx, frames, Instant::now());
        assert_eq!(out, VecDeque::from([completed(&payload)]));
        assert_eq!(rx.pending(), 0);
    }

    #[test]
    fn every_length_with_a_short_tail_completes_at_once() {
        for len in (0..=MAX_ADDRESSED_PAYLOAD).filter(|len| len % SEGMENT_LEN != 0 || *len == 0) {
            let mut rx = Reassembler::new(STALE);
            let (payload, frames) = frames(len);
            let out = feed(&mut rx, frames, Instant::now());
            assert_eq!(out, VecDeque::from([completed(&payload)]), "length {len}");
        }
    }

    #[test]
    fn full_final_frame_waits_for_timeout() {
        let mut rx = Reassembler::new(STALE);
        let start = Instant::now();
        let (payload, frames) = frames(12);
        assert!(feed(&mut rx, frames, start).is_empty());
        assert_eq!(rx.next_expiry(), Some(start + STALE));

        let mut out = VecDeque::new();
        rx.expire(start + STALE / 2, &mut out);
        assert!(out.is_empty());
        rx.expire(start + STALE, &mut out);
        assert_eq!(out, VecDeque::from([completed(&payload)]));
        assert_eq!(rx.next_expiry(), None);
    }

    #[test]
    fn full_final_frame_closes_on_next_message() {
        let mut rx = Reassembler::new(STALE);
        let now = Instant::now();
        let (first_payload, mut all) = frames(12);
        let (second_payload, second) = frames(3);
        all.extend(second);

        let out = feed(&mut rx, all, now);
        assert_eq!(
            out,
            VecDeque::from([completed(&first_payload), completed(&second_payload)])
        );
    }

    #[test]
    fn seventy_two_bytes_complete_without_waiting() {
        let mut rx = Reassembler::new(STALE);
        let (payload, frames) = frames(MAX_ADDRESSED_PAYLOAD);
        let out = feed(&mut rx, frames, Instant::now());
        assert_eq!(out, VecDeque::from([completed(&payload)]));
    }

    #[test]
    fn flag_three_middles_make_flag_two_final() {
        let mut rx = Reassembler::new(STALE);
        let text = [
            ":X19828777N10B0010203040506;",
            ":X19828777N30B0070809101112;",
            ":X19828777N20B0131415161718;",
        ];
        let frames = text
            .iter()
            .map(|t| parse_frame(&olcbprims_frame::decode_frame(t.as_bytes()).unwrap()).unwrap())
            .collect();
        let out = feed(&mut rx, frames, Instant::now());

        let RxOutcome::Completed(message) = &out[0] else {
            panic!("expected a message, got {out:?}");
        };
        assert_eq!(message.payload.len(), 18);
        assert_eq!(rx.pending(), 0);
    }

    #[test]
    fn interleaved_senders_stay_apart() {
        let mut rx = Reassembler::new(STALE);
        let now = Instant::now();
        let a = encode_message(0x828, alias(0x0A0), Some(alias(0x0B0)), &[0xAA; 10]).unwrap();
        let c = encode_message(0x828, alias(0x0C0), Some(alias(0x0B0)), &[0xCC; 10]).unwrap();
        let order: Vec<&CanFrame> = vec![&a[0], &c[0], &a[1], &c[1]];

        let out = feed(
            &mut rx,
            order.into_iter().map(|f| parse_frame(f).unwrap()).collect(),
            now,
        );
        let sources: Vec<(Alias, usize)> = out
            .iter()
            .map(|o| match o {
                RxOutcome::Completed(m) => (m.source, m.payload.len()),
                RxOutcome::Dropped(reason) => panic!("dropped: {reason}"),
            })
            .collect();
        assert_eq!(sources, vec![(alias(0x0A0), 10), (alias(0x0C0), 10)]);
    }

    #[test]
    fn orphans_and_overflow_are_dropped() {
        let mut rx = Reassembler::new(STALE);
        let now = Instant::now();
        let (_, frames) = frames(15);

        // Continuation with no first frame.
        let out = feed(&mut rx, vec![frames[1].clone()], now);
        assert!(matches!(out[0], RxOutcome::Dropped(_)));

        // First frame that is never continued.
        let out = feed(&mut rx, vec![frames[0].clone()], now);
        assert!(out.is_empty());
        let mut out = VecDeque::new();
        rx.expire(now + STALE, &mut out);
        assert!(matches!(out[0], RxOutcome::Dropped(_)));

        // 4 + 12 * 6 bytes steps over the limit instead of landing on it.
        let first = MessageFrame {
            segment: Segment::First,
            data: Bytes::from_static(&[0; 4]),
            ..frames[0].clone()
        };
        let middle = MessageFrame {
            segment: Segment::Middle,
            ..frames[1].clone()
        };
        let mut overflow = vec![first];
        overflow.extend(std::iter::repeat(middle).take(12));
        let out = feed(&mut rx, overflow, now);
        assert!(matches!(out.back(), Some(RxOutcome::Dropped(_))));
        assert_eq!(rx.pending(), 0);
    }

    #[test]
    fn global_frames_pass_through() {
        let mut rx = Reassembler::new(STALE);
        let frame = encode_message(0x5B4, alias(0x0A0), None, &[1; 8]).unwrap();
        let out = feed(&mut rx, vec![parse_frame(&frame[0]).unwrap()], Instant::now());
        assert!(matches!(&out[0], RxOutcome::Completed(m) if m.dest.is_none() && m.payload.len() == 8));
    }
}
