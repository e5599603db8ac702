use rand::seq::SliceRandom;
use rand::Rng;

use crate::distribution::{
    numeric_string, Distribution, NonUniformDistribution, RngGen, UniformDistribution,
    WeightedDistribution,
};
use crate::records::{self, CF_START_HOURS, CF_WINDOW_HOURS, SUB_NBR_LEN};

/// One parameterized transaction request, carrying only the primitive
/// parameters a backend needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Procedure {
    GetSubscriberData {
        s_id: u64,
    },
    GetNewDestination {
        s_id: u64,
        sf_type: u8,
        start_time: u8,
        end_time: u8,
    },
    GetAccessData {
        s_id: u64,
        ai_type: u8,
    },
    UpdateSubscriberData {
        s_id: u64,
        bit_1: bool,
        sf_type: u8,
        data_a: u8,
    },
    // The location-update path is keyed by subscriber number, not id.
    UpdateLocation {
        sub_nbr: String,
        vlr_location: u32,
    },
    InsertCallForwarding {
        sub_nbr: String,
        sf_type: u8,
        start_time: u8,
        end_time: u8,
        numberx: String,
    },
    DeleteCallForwarding {
        sub_nbr: String,
        sf_type: u8,
        start_time: u8,
        end_time: u8,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcedureKind {
    GetSubscriberData,
    GetNewDestination,
    GetAccessData,
    UpdateSubscriberData,
    UpdateLocation,
    InsertCallForwarding,
    DeleteCallForwarding,
}

/// The TATP transaction mix, in the order of [`ProcedureKind`]'s variants.
pub const MIX_WEIGHTS: [u64; 7] = [35, 10, 35, 2, 14, 2, 2];

impl Procedure {
    pub fn kind(&self) -> ProcedureKind {
        match self {
            Procedure::GetSubscriberData { .. } => ProcedureKind::GetSubscriberData,
            Procedure::GetNewDestination { .. } => ProcedureKind::GetNewDestination,
            Procedure::GetAccessData { .. } => ProcedureKind::GetAccessData,
            Procedure::UpdateSubscriberData { .. } => ProcedureKind::UpdateSubscriberData,
            Procedure::UpdateLocation { .. } => ProcedureKind::UpdateLocation,
            Procedure::InsertCallForwarding { .. } => ProcedureKind::InsertCallForwarding,
            Procedure::DeleteCallForwarding { .. } => ProcedureKind::DeleteCallForwarding,
        }
    }
}

/// Infinite generator of the benchmark transaction stream.
///
/// Every call draws the transaction kind once through the cumulative mix bins
/// and derives its parameters from the owned random stream; subscriber ids
/// come from the non-uniform key distribution.
pub struct ProcedureGenerator {
    gen: RngGen,
    subscriber_ids: NonUniformDistribution,
    mix: WeightedDistribution,
    type_value: UniformDistribution,
    byte_value: UniformDistribution,
    location: UniformDistribution,
}

impl ProcedureGenerator {
    pub fn new(n_subscriber_records: u64, gen: RngGen) -> Self {
        Self {
            gen,
            subscriber_ids: NonUniformDistribution::subscriber_ids(n_subscriber_records),
            mix: WeightedDistribution::new(&MIX_WEIGHTS),
            type_value: UniformDistribution::new_inclusive(1, 4),
            byte_value: UniformDistribution::new_inclusive(0, 255),
            location: UniformDistribution::new_inclusive(1, u32::MAX as u64),
        }
    }

    fn time_window(&mut self) -> (u8, u8) {
        let start = *CF_START_HOURS
            .choose(&mut self.gen)
            .unwrap_or(&CF_START_HOURS[0]);
        (start, start + CF_WINDOW_HOURS)
    }

    pub fn next_procedure(&mut self) -> Procedure {
        let s_id = self.subscriber_ids.get_u64(&mut self.gen);
        match self.mix.get_u64(&mut self.gen) {
            0 => Procedure::GetSubscriberData { s_id },
            1 => {
                let (start_time, end_time) = self.time_window();
                Procedure::GetNewDestination {
                    s_id,
                    sf_type: self.type_value.get_u64(&mut self.gen) as u8,
                    start_time,
                    end_time,
                }
            }
            2 => Procedure::GetAccessData {
                s_id,
                ai_type: self.type_value.get_u64(&mut self.gen) as u8,
            },
            3 => Procedure::UpdateSubscriberData {
                s_id,
                bit_1: self.gen.gen(),
                sf_type: self.type_value.get_u64(&mut self.gen) as u8,
                data_a: self.byte_value.get_u64(&mut self.gen) as u8,
            },
            4 => Procedure::UpdateLocation {
                sub_nbr: records::sub_nbr(s_id),
                vlr_location: self.location.get_u64(&mut self.gen) as u32,
            },
            5 => {
                let (start_time, end_time) = self.time_window();
                Procedure::InsertCallForwarding {
                    sub_nbr: records::sub_nbr(s_id),
                    sf_type: self.type_value.get_u64(&mut self.gen) as u8,
                    start_time,
                    end_time,
                    numberx: numeric_string(&mut self.gen, SUB_NBR_LEN),
                }
            }
            _ => {
                let (start_time, end_time) = self.time_window();
                Procedure::DeleteCallForwarding {
                    sub_nbr: records::sub_nbr(s_id),
                    sf_type: self.type_value.get_u64(&mut self.gen) as u8,
                    start_time,
                    end_time,
                }
            }
        }
    }
}

impl Iterator for ProcedureGenerator {
    type Item = Procedure;

    fn next(&mut self) -> Option<Procedure> {
        Some(self.next_procedure())
    }
}
