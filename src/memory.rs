use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::backend::{Backend, Outcome};
use crate::procedures::Procedure;
use crate::records::{
    AccessInfoRecord, CallForwardingRecord, Record, SpecialFacilityRecord, SubscriberRecord,
};

#[derive(Default)]
struct Tables {
    subscribers: HashMap<u64, SubscriberRecord>,
    // sub_nbr is a bijective rendering of s_id, but the store keeps a real
    // index so the string-keyed procedures resolve the way a database would.
    subscriber_ids: HashMap<String, u64>,
    access_info: HashMap<(u64, u8), AccessInfoRecord>,
    special_facility: HashMap<(u64, u8), SpecialFacilityRecord>,
    call_forwarding: HashMap<(u64, u8, u8), CallForwardingRecord>,
}

/// Hash-map reference store.
///
/// One `MemoryBackend` value is a session handle; all handles cloned from the
/// same store share the tables behind a mutex, so concurrent workers see one
/// database the way they would with a server-side store.
#[derive(Clone)]
pub struct MemoryBackend {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
        }
    }

    pub fn session(&self) -> Self {
        self.clone()
    }
}

impl Tables {
    fn execute(&mut self, procedure: &Procedure) -> Outcome {
        match procedure {
            Procedure::GetSubscriberData { s_id } => {
                if self.subscribers.contains_key(s_id) {
                    Outcome::Success
                } else {
                    Outcome::NotFound
                }
            }

            Procedure::GetNewDestination {
                s_id,
                sf_type,
                start_time,
                end_time,
            } => {
                let active = self
                    .special_facility
                    .get(&(*s_id, *sf_type))
                    .map_or(false, |sf| sf.is_active);
                let forwarded = self
                    .call_forwarding
                    .values()
                    .any(|cf| {
                        cf.s_id == *s_id
                            && cf.sf_type == *sf_type
                            && cf.start_time <= *start_time
                            && *end_time <= cf.end_time
                    });
                if active && forwarded {
                    Outcome::Success
                } else {
                    Outcome::NotFound
                }
            }

            Procedure::GetAccessData { s_id, ai_type } => {
                if self.access_info.contains_key(&(*s_id, *ai_type)) {
                    Outcome::Success
                } else {
                    Outcome::NotFound
                }
            }

            Procedure::UpdateSubscriberData {
                s_id,
                bit_1,
                sf_type,
                data_a,
            } => {
                if let Some(subscriber) = self.subscribers.get_mut(s_id) {
                    subscriber.bit[0] = *bit_1;
                }
                // The second update touching zero rows is an accepted outcome.
                match self.special_facility.get_mut(&(*s_id, *sf_type)) {
                    Some(facility) => {
                        facility.data_a = *data_a;
                        Outcome::Success
                    }
                    None => Outcome::NotFound,
                }
            }

            Procedure::UpdateLocation {
                sub_nbr,
                vlr_location,
            } => {
                let s_id = match self.subscriber_ids.get(sub_nbr) {
                    Some(s_id) => *s_id,
                    None => return Outcome::NotFound,
                };
                match self.subscribers.get_mut(&s_id) {
                    Some(subscriber) => {
                        subscriber.vlr_location = *vlr_location;
                        Outcome::Success
                    }
                    None => Outcome::NotFound,
                }
            }

            Procedure::InsertCallForwarding {
                sub_nbr,
                sf_type,
                start_time,
                end_time,
                numberx,
            } => {
                let s_id = match self.subscriber_ids.get(sub_nbr) {
                    Some(s_id) => *s_id,
                    None => return Outcome::NotFound,
                };
                let key = (s_id, *sf_type, *start_time);
                if self.call_forwarding.contains_key(&key) {
                    return Outcome::ConstraintConflict;
                }
                self.call_forwarding.insert(
                    key,
                    CallForwardingRecord {
                        s_id,
                        sf_type: *sf_type,
                        start_time: *start_time,
                        end_time: *end_time,
                        numberx: numberx.clone(),
                    },
                );
                Outcome::Success
            }

            Procedure::DeleteCallForwarding {
                sub_nbr,
                sf_type,
                start_time,
                ..
            } => {
                let s_id = match self.subscriber_ids.get(sub_nbr) {
                    Some(s_id) => *s_id,
                    None => return Outcome::NotFound,
                };
                match self.call_forwarding.remove(&(s_id, *sf_type, *start_time)) {
                    Some(_) => Outcome::Success,
                    None => Outcome::NotFound,
                }
            }
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn load(&mut self, record: Record) -> Result<()> {
        let mut tables = self.tables.lock();
        match record {
            Record::Subscriber(r) => {
                tables.subscriber_ids.insert(r.sub_nbr.clone(), r.s_id);
                tables.subscribers.insert(r.s_id, r);
            }
            Record::AccessInfo(r) => {
                tables.access_info.insert((r.s_id, r.ai_type), r);
            }
            Record::SpecialFacility(r) => {
                tables.special_facility.insert((r.s_id, r.sf_type), r);
            }
            Record::CallForwarding(r) => {
                tables
                    .call_forwarding
                    .insert((r.s_id, r.sf_type, r.start_time), r);
            }
        }
        Ok(())
    }

    async fn execute(&mut self, procedure: &Procedure) -> Result<Outcome> {
        Ok(self.tables.lock().execute(procedure))
    }
}
