use std::collections::VecDeque;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::distribution::{
    alpha_string, numeric_string, Distribution, RngGen, UniformDistribution, WeightedDistribution,
};

/// Valid `ai_type` values of the access_info table.
pub const AI_TYPES: [u8; 4] = [1, 2, 3, 4];
/// Valid `sf_type` values of the special_facility table.
pub const SF_TYPES: [u8; 4] = [1, 2, 3, 4];
/// Start hours of the fixed call-forwarding time windows.
pub const CF_START_HOURS: [u8; 3] = [0, 8, 16];
/// Width of each call-forwarding time window, in hours.
pub const CF_WINDOW_HOURS: u8 = 8;

/// Width of the zero-padded decimal subscriber number.
pub const SUB_NBR_LEN: usize = 15;

/// The subscriber-number string uniquely determined by a subscriber id.
pub fn sub_nbr(s_id: u64) -> String {
    format!("{:015}", s_id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberRecord {
    pub s_id: u64,
    pub sub_nbr: String,
    pub bit: [bool; 10],
    pub hex: [u8; 10],
    pub byte2: [u8; 10],
    pub msc_location: u32,
    pub vlr_location: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessInfoRecord {
    pub s_id: u64,
    pub ai_type: u8,
    pub data1: u8,
    pub data2: u8,
    pub data3: String,
    pub data4: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialFacilityRecord {
    pub s_id: u64,
    pub sf_type: u8,
    pub is_active: bool,
    pub error_cntrl: u8,
    pub data_a: u8,
    pub data_b: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallForwardingRecord {
    pub s_id: u64,
    pub sf_type: u8,
    pub start_time: u8,
    pub end_time: u8,
    pub numberx: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Subscriber(SubscriberRecord),
    AccessInfo(AccessInfoRecord),
    SpecialFacility(SpecialFacilityRecord),
    CallForwarding(CallForwardingRecord),
}

/// Lazy generator of the load-time record stream.
///
/// For every subscriber id in `1..=n`, emits the subscriber row, then its
/// access_info rows, then its special_facility rows, then the call_forwarding
/// rows of each special facility. Ends after the last subscriber; a fresh
/// instance with the same subscriber count and generator replays the exact
/// same stream.
pub struct RecordGenerator {
    n_subscriber_records: u64,
    next_s_id: u64,
    gen: RngGen,
    buffered: VecDeque<Record>,

    ai_row_count: WeightedDistribution,
    sf_row_count: UniformDistribution,
    cf_row_count: UniformDistribution,
    location: UniformDistribution,
    byte_value: UniformDistribution,
    hex_value: UniformDistribution,
}

impl RecordGenerator {
    pub fn new(n_subscriber_records: u64, gen: RngGen) -> Self {
        Self {
            n_subscriber_records,
            next_s_id: 1,
            gen,
            buffered: VecDeque::new(),
            // 0..=4 access_info rows, skewed toward fuller subscribers.
            ai_row_count: WeightedDistribution::new(&[5, 10, 15, 30, 40]),
            sf_row_count: UniformDistribution::new_inclusive(1, 4),
            cf_row_count: UniformDistribution::new_inclusive(0, 3),
            location: UniformDistribution::new_inclusive(1, u32::MAX as u64),
            byte_value: UniformDistribution::new_inclusive(0, 255),
            hex_value: UniformDistribution::new_inclusive(0, 15),
        }
    }

    fn buffer_subscriber(&mut self) {
        let s_id = self.next_s_id;
        self.next_s_id += 1;

        let mut bit = [false; 10];
        let mut hex = [0u8; 10];
        let mut byte2 = [0u8; 10];
        for i in 0..10 {
            bit[i] = self.gen.gen();
            hex[i] = self.hex_value.get_u64(&mut self.gen) as u8;
            byte2[i] = self.byte_value.get_u64(&mut self.gen) as u8;
        }
        self.buffered.push_back(Record::Subscriber(SubscriberRecord {
            s_id,
            sub_nbr: sub_nbr(s_id),
            bit,
            hex,
            byte2,
            msc_location: self.location.get_u64(&mut self.gen) as u32,
            vlr_location: self.location.get_u64(&mut self.gen) as u32,
        }));

        let ai_count = self.ai_row_count.get_u64(&mut self.gen) as usize;
        let mut ai_types = AI_TYPES;
        let (chosen_ai, _) = ai_types.partial_shuffle(&mut self.gen, ai_count);
        for i in 0..chosen_ai.len() {
            let ai_type = chosen_ai[i];
            self.buffered.push_back(Record::AccessInfo(AccessInfoRecord {
                s_id,
                ai_type,
                data1: self.byte_value.get_u64(&mut self.gen) as u8,
                data2: self.byte_value.get_u64(&mut self.gen) as u8,
                data3: alpha_string(&mut self.gen, 3),
                data4: alpha_string(&mut self.gen, 5),
            }));
        }

        let sf_count = self.sf_row_count.get_u64(&mut self.gen) as usize;
        let mut sf_types = SF_TYPES;
        let (chosen_sf, _) = sf_types.partial_shuffle(&mut self.gen, sf_count);
        let chosen_sf: Vec<u8> = chosen_sf.to_vec();
        for &sf_type in &chosen_sf {
            self.buffered
                .push_back(Record::SpecialFacility(SpecialFacilityRecord {
                    s_id,
                    sf_type,
                    is_active: self.gen.gen_bool(0.85),
                    error_cntrl: self.byte_value.get_u64(&mut self.gen) as u8,
                    data_a: self.byte_value.get_u64(&mut self.gen) as u8,
                    data_b: alpha_string(&mut self.gen, 5),
                }));
        }

        for &sf_type in &chosen_sf {
            let cf_count = self.cf_row_count.get_u64(&mut self.gen) as usize;
            let mut starts = CF_START_HOURS;
            let (chosen_starts, _) = starts.partial_shuffle(&mut self.gen, cf_count);
            for i in 0..chosen_starts.len() {
                let start_time = chosen_starts[i];
                self.buffered
                    .push_back(Record::CallForwarding(CallForwardingRecord {
                        s_id,
                        sf_type,
                        start_time,
                        end_time: start_time + CF_WINDOW_HOURS,
                        numberx: numeric_string(&mut self.gen, SUB_NBR_LEN),
                    }));
            }
        }
    }
}

impl Iterator for RecordGenerator {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        while self.buffered.is_empty() {
            if self.next_s_id > self.n_subscriber_records {
                return None;
            }
            self.buffer_subscriber();
        }
        self.buffered.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::seeded_gen;
    use std::collections::{HashMap, HashSet};

    fn generate(n: u64, seed: u64) -> Vec<Record> {
        RecordGenerator::new(n, seeded_gen(seed, 0)).collect()
    }

    #[test]
    fn subscribers_come_out_in_order() {
        let records = generate(50, 1);
        let subscribers: Vec<&SubscriberRecord> = records
            .iter()
            .filter_map(|r| match r {
                Record::Subscriber(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(subscribers.len(), 50);
        for (i, s) in subscribers.iter().enumerate() {
            assert_eq!(s.s_id, i as u64 + 1);
            assert_eq!(s.sub_nbr.len(), SUB_NBR_LEN);
            assert_eq!(s.sub_nbr, format!("{:015}", s.s_id));
        }
    }

    #[test]
    fn access_info_types_are_distinct_and_valid() {
        let records = generate(200, 2);
        let mut per_subscriber: HashMap<u64, HashSet<u8>> = HashMap::new();
        for record in &records {
            if let Record::AccessInfo(r) = record {
                assert!(AI_TYPES.contains(&r.ai_type));
                assert!(
                    per_subscriber.entry(r.s_id).or_default().insert(r.ai_type),
                    "duplicate ai_type {} for subscriber {}",
                    r.ai_type,
                    r.s_id
                );
            }
        }
        for types in per_subscriber.values() {
            assert!(types.len() <= 4);
        }
    }

    #[test]
    fn special_facilities_are_distinct_and_one_to_four() {
        let records = generate(200, 3);
        let mut per_subscriber: HashMap<u64, HashSet<u8>> = HashMap::new();
        for record in &records {
            if let Record::SpecialFacility(r) = record {
                assert!(SF_TYPES.contains(&r.sf_type));
                assert!(per_subscriber.entry(r.s_id).or_default().insert(r.sf_type));
            }
        }
        assert_eq!(per_subscriber.len(), 200);
        for types in per_subscriber.values() {
            assert!(!types.is_empty() && types.len() <= 4);
        }
    }

    #[test]
    fn call_forwarding_rows_reference_facilities_and_valid_windows() {
        let records = generate(300, 4);
        let mut facilities: HashSet<(u64, u8)> = HashSet::new();
        let mut windows: HashMap<(u64, u8), HashSet<u8>> = HashMap::new();
        for record in &records {
            match record {
                Record::SpecialFacility(r) => {
                    facilities.insert((r.s_id, r.sf_type));
                }
                Record::CallForwarding(r) => {
                    assert!(r.start_time < r.end_time);
                    assert!(CF_START_HOURS.contains(&r.start_time));
                    assert_eq!(r.end_time, r.start_time + CF_WINDOW_HOURS);
                    assert!(
                        facilities.contains(&(r.s_id, r.sf_type)),
                        "call forwarding for missing facility ({}, {})",
                        r.s_id,
                        r.sf_type
                    );
                    let starts = windows.entry((r.s_id, r.sf_type)).or_default();
                    assert!(starts.insert(r.start_time), "overlapping window");
                    assert!(starts.len() <= 3);
                    assert_eq!(r.numberx.len(), SUB_NBR_LEN);
                }
                _ => {}
            }
        }
    }

    #[test]
    fn identical_construction_replays_the_stream() {
        let a = generate(200, 7);
        let b = generate(200, 7);
        assert_eq!(a, b);
    }

    #[test]
    fn exhausted_generator_keeps_returning_none() {
        let mut gen = RecordGenerator::new(3, seeded_gen(1, 0));
        while gen.next().is_some() {}
        assert!(gen.next().is_none());
        assert!(gen.next().is_none());
    }
}
