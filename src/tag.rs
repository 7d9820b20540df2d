// Copyright 2024, The Android Open Source Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! State of the currently discovered or activated tag.
//!
//! [`TagSession`] accumulates the technologies reported by the NFCC for a
//! single discovery or activation cycle and tracks the activation
//! lifecycle of the remote endpoint. It is mutated only by the event
//! dispatcher; upstream consumers read the technology list, the active
//! protocol, and the Type 1 tag message size from it.

use crate::error::Error;
use crate::packets::nci;
use log::{debug, warn};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Maximum number of technology entries a single cycle can record.
pub const MAX_TECH: usize = 11;

/// Window under which a repeated Kovio activation with the same UID is
/// classified as a duplicate of the previous one.
pub const KOVIO_DEDUP_WINDOW: Duration = Duration::from_millis(500);

/// Maximum number of Kovio UID bytes retained for deduplication.
pub const MAX_KOVIO_UID_LEN: usize = 32;

/// HR0 value identifying a Topaz 96 Type 1 tag.
const T1T_HR0_TOPAZ96: u8 = 0x11;
/// HR0 value identifying a Topaz 512 Type 1 tag.
const T1T_HR0_TOPAZ512: u8 = 0x12;

/// Maximum NDEF message size of a Topaz 96 tag.
const T1T_MAX_MESSAGE_SIZE_TOPAZ96: u16 = 90;
/// Maximum NDEF message size of a Topaz 512 tag.
const T1T_MAX_MESSAGE_SIZE_TOPAZ512: u16 = 462;

/// Technology labels exposed to upstream consumers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum TagTechnology {
    Iso14443_3a,
    Iso14443_3b,
    Iso14443_4,
    Felica,
    Iso15693,
    MifareUltralight,
    KovioBarcode,
    Unknown,
}

/// Activation lifecycle of the remote endpoint.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ActivationState {
    Idle,
    Sleep,
    Active,
}

/// One discovered technology. Entries referencing the same physical tag
/// share the controller handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TechEntry {
    /// Public technology label derived from the RF protocol.
    pub technology: TagTechnology,
    /// RF discovery identifier assigned by the controller.
    pub handle: u8,
    /// Low level RF protocol reported by the controller.
    pub protocol: nci::RfProtocolType,
    /// RF technology and mode the endpoint was reached on.
    pub mode: nci::RfTechnologyAndMode,
    /// Verbatim copy of the technology specific parameters.
    pub parameters: Vec<u8>,
}

/// Source of the record being classified. The Type 2 / Mifare Ultralight
/// sub-rule differs between the two (see `register_t2t`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum RecordKind {
    Discovery,
    Activation,
}

/// Completion signal for a pending tag read.
///
/// The reading caller blocks in [`ReadCompletion::wait`]; the dispatcher
/// wakes it from the read-completion event, or [`ReadCompletion::abort`]
/// wakes it during forced teardown with the last known status.
#[derive(Debug)]
pub struct ReadCompletion {
    state: Mutex<(nci::Status, bool)>,
    completed: Condvar,
}

impl ReadCompletion {
    fn new() -> Self {
        ReadCompletion {
            state: Mutex::new((nci::Status::Failed, false)),
            completed: Condvar::new(),
        }
    }

    /// Record the read status and wake one blocked waiter.
    pub fn complete(&self, status: nci::Status) {
        let mut state = self.state.lock().unwrap();
        *state = (status, true);
        self.completed.notify_one();
    }

    /// Wake one blocked waiter without overwriting the last known status.
    pub fn abort(&self) {
        let mut state = self.state.lock().unwrap();
        state.1 = true;
        self.completed.notify_one();
    }

    /// Block until a read completes or the wait is aborted and return the
    /// completion status. The wait itself has no timeout; bounded waits
    /// are layered above with [`ReadCompletion::abort`].
    pub fn wait(&self) -> nci::Status {
        let mut state = self.state.lock().unwrap();
        while !state.1 {
            state = self.completed.wait(state).unwrap();
        }
        state.1 = false;
        state.0
    }
}

/// State of the tag currently presented to the controller.
pub struct TagSession {
    activation_state: ActivationState,
    current_protocol: Option<nci::RfProtocolType>,
    technology_entries: Vec<TechEntry>,
    discovery_in_progress: bool,
    t1t_max_message_size: u16,
    ndef_detection_timed_out: bool,
    // Kovio deduplication state. Survives reset_technologies and
    // deactivation so duplicates are recognized across cycles.
    last_kovio_uid: Vec<u8>,
    last_kovio_timestamp: Option<Instant>,
    read_completion: Arc<ReadCompletion>,
}

impl Default for TagSession {
    fn default() -> Self {
        TagSession::new()
    }
}

impl TagSession {
    /// Create a session with no discovered tag.
    pub fn new() -> TagSession {
        TagSession {
            activation_state: ActivationState::Idle,
            current_protocol: None,
            technology_entries: Vec::with_capacity(MAX_TECH),
            discovery_in_progress: false,
            t1t_max_message_size: 0,
            ndef_detection_timed_out: false,
            last_kovio_uid: vec![],
            last_kovio_timestamp: None,
            read_completion: Arc::new(ReadCompletion::new()),
        }
    }

    /// Current activation state.
    pub fn activation_state(&self) -> ActivationState {
        self.activation_state
    }

    /// RF protocol of the most recently activated tag, if any.
    pub fn current_protocol(&self) -> Option<nci::RfProtocolType> {
        self.current_protocol
    }

    /// Technologies recorded for the current cycle, in discovery order.
    /// The entry at index 0 is the primary technology.
    pub fn technologies(&self) -> &[TechEntry] {
        &self.technology_entries
    }

    /// Return whether the technology list is final for this cycle,
    /// i.e. no further discovery records are expected.
    pub fn discovery_complete(&self) -> bool {
        !self.discovery_in_progress
    }

    /// Maximum NDEF message size of the activated Type 1 tag.
    /// 0 unless the current protocol is T1T.
    pub fn t1t_max_message_size(&self) -> u16 {
        self.t1t_max_message_size
    }

    /// Return whether the last NDEF detection timed out. Distinguishes
    /// "no NDEF found" from "detection never completed".
    pub fn ndef_detection_timed_out(&self) -> bool {
        self.ndef_detection_timed_out
    }

    /// Completion signal shared with callers blocking on a tag read.
    pub fn read_completion(&self) -> Arc<ReadCompletion> {
        Arc::clone(&self.read_completion)
    }

    /// Record the activation of the remote endpoint.
    pub fn activate(&mut self, protocol: nci::RfProtocolType) {
        self.activation_state = ActivationState::Active;
        self.current_protocol = Some(protocol);
        self.ndef_detection_timed_out = false;
    }

    /// Record a deactivation to sleep. The technology list is preserved
    /// so the endpoint can be selected again.
    pub fn deactivate_to_sleep(&mut self) {
        self.activation_state = ActivationState::Sleep;
        self.ndef_detection_timed_out = false;
    }

    /// Record a deactivation to idle and reset the per-cycle state.
    pub fn deactivate_to_idle(&mut self) {
        self.activation_state = ActivationState::Idle;
        self.current_protocol = None;
        self.t1t_max_message_size = 0;
        self.ndef_detection_timed_out = false;
        self.reset_technologies();
    }

    /// Forced teardown: wake any caller blocked on a pending read with
    /// the last known completion status. Does not alter catalog or state.
    pub fn abort(&self) {
        self.read_completion.abort();
    }

    /// Record the outcome of an NDEF detection attempt.
    pub fn set_ndef_detection_status(&mut self, status: nci::Status) {
        self.ndef_detection_timed_out = status == nci::Status::Timeout;
    }

    /// Clear the technology list and close any open discovery burst.
    pub fn reset_technologies(&mut self) {
        self.technology_entries.clear();
        self.discovery_in_progress = false;
    }

    /// Classify one discovery record and append the derived technologies.
    ///
    /// A record arriving after the previous burst completed starts a new
    /// cycle. The list is final once a record without the more-to-follow
    /// flag is consumed.
    pub fn register_discovery(
        &mut self,
        record: &nci::RfDiscoverNotification,
    ) -> Result<(), Error> {
        if !self.discovery_in_progress {
            self.technology_entries.clear();
        }
        self.discovery_in_progress = record.more_to_follow;
        self.register(
            RecordKind::Discovery,
            record.rf_discovery_id,
            record.rf_protocol,
            record.rf_technology_and_mode,
            &record.rf_technology_specific_parameters,
        )
    }

    /// Classify one activation record and rebuild the technology list
    /// from it.
    pub fn register_activation(
        &mut self,
        record: &nci::RfIntfActivatedNotification,
    ) -> Result<(), Error> {
        self.reset_technologies();
        self.register(
            RecordKind::Activation,
            record.rf_discovery_id,
            record.rf_protocol,
            record.activation_rf_technology_and_mode,
            &record.rf_technology_specific_parameters,
        )
    }

    fn register(
        &mut self,
        kind: RecordKind,
        handle: u8,
        protocol: nci::RfProtocolType,
        mode: nci::RfTechnologyAndMode,
        parameters: &[u8],
    ) -> Result<(), Error> {
        use nci::RfProtocolType::*;

        let push = |session: &mut TagSession, technology| {
            session.push_entry(TechEntry {
                technology,
                handle,
                protocol,
                mode,
                parameters: parameters.to_vec(),
            })
        };

        match protocol {
            T1t => push(self, TagTechnology::Iso14443_3a),
            T2t => {
                push(self, TagTechnology::Iso14443_3a)?;
                self.register_t2t(kind, handle, mode, parameters)
            }
            T3t => push(self, TagTechnology::Felica),
            IsoDep => {
                push(self, TagTechnology::Iso14443_4)?;
                match iso_dep_transport_technology(mode) {
                    Some(technology) => push(self, technology),
                    None => {
                        debug!("no transport technology derived for rf mode {:?}", mode);
                        Ok(())
                    }
                }
            }
            T5t => push(self, TagTechnology::Iso15693),
            Kovio if kind == RecordKind::Activation => push(self, TagTechnology::KovioBarcode),
            _ => {
                warn!("unrecognized rf protocol {:?} recorded as unknown technology", protocol);
                push(self, TagTechnology::Unknown)
            }
        }
    }

    /// Type 2 tags additionally present as Mifare Ultralight when the
    /// SEL_RES byte is 0. SEL_RES values 0x18 and 0x08 (Mifare Classic
    /// family) are recognized on the activation path but deliberately do
    /// not emit a second entry; see DESIGN.md.
    fn register_t2t(
        &mut self,
        kind: RecordKind,
        handle: u8,
        mode: nci::RfTechnologyAndMode,
        parameters: &[u8],
    ) -> Result<(), Error> {
        if !matches!(
            mode,
            nci::RfTechnologyAndMode::NfcAPassivePollMode
                | nci::RfTechnologyAndMode::NfcAActivePollMode
        ) {
            return Ok(());
        }
        let sel_res = match nci::NfcAPollParameters::parse(parameters) {
            Ok(parsed) => parsed.sel_res,
            Err(err) => {
                warn!("malformed NFC-A parameters in T2T record: {}", err);
                return Ok(());
            }
        };
        match sel_res {
            Some(0) => self.push_entry(TechEntry {
                technology: TagTechnology::MifareUltralight,
                handle,
                protocol: nci::RfProtocolType::T2t,
                mode,
                parameters: parameters.to_vec(),
            }),
            Some(value @ (0x18 | 0x08)) if kind == RecordKind::Activation => {
                warn!(
                    "T2T activation with Mifare Classic SEL_RES {:#04x}, \
                     no Ultralight entry emitted",
                    value
                );
                Ok(())
            }
            Some(_) | None => Ok(()),
        }
    }

    fn push_entry(&mut self, entry: TechEntry) -> Result<(), Error> {
        if self.technology_entries.len() >= MAX_TECH {
            warn!("technology list full, dropping {:?}", entry.technology);
            return Err(Error::TechListFull);
        }
        debug!(
            "+ technology {:?} (handle {}, protocol {:?})",
            entry.technology, entry.handle, entry.protocol
        );
        self.technology_entries.push(entry);
        Ok(())
    }

    /// Return whether a Kovio activation with this UID duplicates the
    /// previous one. The UID and timestamp are stored regardless of the
    /// outcome: suppression is a sliding window, not a one-shot latch.
    pub fn is_kovio_duplicate(&mut self, uid: &[u8], now: Instant) -> bool {
        let uid = &uid[..uid.len().min(MAX_KOVIO_UID_LEN)];
        let duplicate = match self.last_kovio_timestamp {
            Some(timestamp) => {
                now.saturating_duration_since(timestamp) < KOVIO_DEDUP_WINDOW
                    && self.last_kovio_uid == uid
            }
            None => false,
        };
        self.last_kovio_uid = uid.to_vec();
        self.last_kovio_timestamp = Some(now);
        duplicate
    }

    /// Derive the maximum NDEF message size of an activated Type 1 tag
    /// from the HR0 header byte of the activation record.
    pub fn calculate_t1t_max_message_size(
        &mut self,
        record: &nci::RfIntfActivatedNotification,
    ) {
        if record.rf_protocol != nci::RfProtocolType::T1t {
            self.t1t_max_message_size = 0;
            return;
        }
        self.t1t_max_message_size = match record.activation_parameters.first() {
            Some(&T1T_HR0_TOPAZ96) => T1T_MAX_MESSAGE_SIZE_TOPAZ96,
            Some(&T1T_HR0_TOPAZ512) => T1T_MAX_MESSAGE_SIZE_TOPAZ512,
            header => {
                warn!("unrecognized T1T header byte {:?}", header);
                0
            }
        };
    }
}

fn iso_dep_transport_technology(mode: nci::RfTechnologyAndMode) -> Option<TagTechnology> {
    use nci::RfTechnologyAndMode::*;
    match mode {
        NfcAPassivePollMode | NfcAActivePollMode | NfcAPassiveListenMode | NfcAActiveListenMode => {
            Some(TagTechnology::Iso14443_3a)
        }
        NfcBPassivePollMode | NfcBPrimePollMode | NfcBPassiveListenMode | NfcBPrimeListenMode => {
            Some(TagTechnology::Iso14443_3b)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packets::nci;
    use std::thread;

    fn nfca_parameters(nfcid1: &[u8], sel_res: Option<u8>) -> Vec<u8> {
        let mut parameters = vec![0x04, 0x00, nfcid1.len() as u8];
        parameters.extend_from_slice(nfcid1);
        match sel_res {
            Some(value) => parameters.extend_from_slice(&[0x01, value]),
            None => parameters.push(0x00),
        }
        parameters
    }

    fn activation(
        protocol: nci::RfProtocolType,
        mode: nci::RfTechnologyAndMode,
        parameters: Vec<u8>,
        activation_parameters: Vec<u8>,
    ) -> nci::RfIntfActivatedNotification {
        nci::RfIntfActivatedNotification {
            rf_discovery_id: 1,
            rf_interface: nci::RfInterfaceType::Frame,
            rf_protocol: protocol,
            activation_rf_technology_and_mode: mode,
            max_data_packet_payload_size: 0xff,
            initial_number_of_credits: 1,
            rf_technology_specific_parameters: parameters,
            data_exchange_rf_technology_and_mode: mode,
            data_exchange_transmit_bit_rate: 0,
            data_exchange_receive_bit_rate: 0,
            activation_parameters,
        }
    }

    fn discovery(
        rf_discovery_id: u8,
        protocol: nci::RfProtocolType,
        mode: nci::RfTechnologyAndMode,
        more_to_follow: bool,
    ) -> nci::RfDiscoverNotification {
        nci::RfDiscoverNotification {
            rf_discovery_id,
            rf_protocol: protocol,
            rf_technology_and_mode: mode,
            rf_technology_specific_parameters: vec![],
            more_to_follow,
        }
    }

    fn labels(session: &TagSession) -> Vec<TagTechnology> {
        session.technologies().iter().map(|entry| entry.technology).collect()
    }

    #[test]
    fn t2t_activation_with_ultralight_sel_res() {
        let mut session = TagSession::new();
        session
            .register_activation(&activation(
                nci::RfProtocolType::T2t,
                nci::RfTechnologyAndMode::NfcAPassivePollMode,
                nfca_parameters(&[0x04, 0x61, 0x62, 0x63], Some(0x00)),
                vec![],
            ))
            .unwrap();
        assert_eq!(
            labels(&session),
            vec![TagTechnology::Iso14443_3a, TagTechnology::MifareUltralight]
        );
        assert_eq!(session.technologies()[0].handle, session.technologies()[1].handle);
    }

    #[test]
    fn t2t_activation_with_mifare_classic_sel_res() {
        let mut session = TagSession::new();
        session
            .register_activation(&activation(
                nci::RfProtocolType::T2t,
                nci::RfTechnologyAndMode::NfcAPassivePollMode,
                nfca_parameters(&[0x04, 0x61, 0x62, 0x63], Some(0x18)),
                vec![],
            ))
            .unwrap();
        assert_eq!(labels(&session), vec![TagTechnology::Iso14443_3a]);
    }

    #[test]
    fn iso_dep_activation_derives_transport_technology() {
        let mut session = TagSession::new();
        session
            .register_activation(&activation(
                nci::RfProtocolType::IsoDep,
                nci::RfTechnologyAndMode::NfcBPassivePollMode,
                vec![],
                vec![],
            ))
            .unwrap();
        assert_eq!(labels(&session), vec![TagTechnology::Iso14443_4, TagTechnology::Iso14443_3b]);

        session
            .register_activation(&activation(
                nci::RfProtocolType::IsoDep,
                nci::RfTechnologyAndMode::NfcAPassivePollMode,
                vec![],
                vec![],
            ))
            .unwrap();
        assert_eq!(labels(&session), vec![TagTechnology::Iso14443_4, TagTechnology::Iso14443_3a]);

        session
            .register_activation(&activation(
                nci::RfProtocolType::IsoDep,
                nci::RfTechnologyAndMode::NfcFPassivePollMode,
                vec![],
                vec![],
            ))
            .unwrap();
        assert_eq!(labels(&session), vec![TagTechnology::Iso14443_4]);
    }

    #[test]
    fn t1t_t3t_t5t_activation_labels() {
        let mut session = TagSession::new();
        session
            .register_activation(&activation(
                nci::RfProtocolType::T1t,
                nci::RfTechnologyAndMode::NfcAPassivePollMode,
                vec![],
                vec![],
            ))
            .unwrap();
        assert_eq!(labels(&session), vec![TagTechnology::Iso14443_3a]);

        session
            .register_activation(&activation(
                nci::RfProtocolType::T3t,
                nci::RfTechnologyAndMode::NfcFPassivePollMode,
                vec![],
                vec![],
            ))
            .unwrap();
        assert_eq!(labels(&session), vec![TagTechnology::Felica]);

        session
            .register_activation(&activation(
                nci::RfProtocolType::T5t,
                nci::RfTechnologyAndMode::NfcVPassivePollMode,
                vec![],
                vec![],
            ))
            .unwrap();
        assert_eq!(labels(&session), vec![TagTechnology::Iso15693]);
    }

    #[test]
    fn kovio_activation_label() {
        let mut session = TagSession::new();
        session
            .register_activation(&activation(
                nci::RfProtocolType::Kovio,
                nci::RfTechnologyAndMode::NfcKovioPollMode,
                vec![],
                vec![],
            ))
            .unwrap();
        assert_eq!(labels(&session), vec![TagTechnology::KovioBarcode]);
    }

    #[test]
    fn undetermined_protocol_records_unknown() {
        let mut session = TagSession::new();
        session
            .register_discovery(&discovery(
                1,
                nci::RfProtocolType::Undetermined,
                nci::RfTechnologyAndMode::NfcAPassivePollMode,
                false,
            ))
            .unwrap();
        assert_eq!(labels(&session), vec![TagTechnology::Unknown]);
    }

    #[test]
    fn discovery_burst_finality() {
        let mut session = TagSession::new();
        session
            .register_discovery(&discovery(
                1,
                nci::RfProtocolType::T3t,
                nci::RfTechnologyAndMode::NfcFPassivePollMode,
                true,
            ))
            .unwrap();
        assert!(!session.discovery_complete());

        session
            .register_discovery(&discovery(
                2,
                nci::RfProtocolType::T5t,
                nci::RfTechnologyAndMode::NfcVPassivePollMode,
                false,
            ))
            .unwrap();
        assert!(session.discovery_complete());
        assert_eq!(labels(&session), vec![TagTechnology::Felica, TagTechnology::Iso15693]);
    }

    #[test]
    fn discovery_record_after_final_burst_starts_new_cycle() {
        let mut session = TagSession::new();
        session
            .register_discovery(&discovery(
                1,
                nci::RfProtocolType::T3t,
                nci::RfTechnologyAndMode::NfcFPassivePollMode,
                false,
            ))
            .unwrap();
        session
            .register_discovery(&discovery(
                1,
                nci::RfProtocolType::T5t,
                nci::RfTechnologyAndMode::NfcVPassivePollMode,
                false,
            ))
            .unwrap();
        assert_eq!(labels(&session), vec![TagTechnology::Iso15693]);
    }

    #[test]
    fn overflow_preserves_earlier_entries() {
        let mut session = TagSession::new();
        for id in 0..MAX_TECH as u8 {
            session
                .register_discovery(&discovery(
                    id,
                    nci::RfProtocolType::T3t,
                    nci::RfTechnologyAndMode::NfcFPassivePollMode,
                    true,
                ))
                .unwrap();
        }
        let overflow = session.register_discovery(&discovery(
            0xfe,
            nci::RfProtocolType::T3t,
            nci::RfTechnologyAndMode::NfcFPassivePollMode,
            true,
        ));
        assert_eq!(overflow, Err(Error::TechListFull));
        assert_eq!(session.technologies().len(), MAX_TECH);
        assert_eq!(session.technologies()[0].handle, 0);
    }

    #[test]
    fn kovio_duplicate_window() {
        let mut session = TagSession::new();
        let uid = [0x12, 0x34, 0x56];
        let t0 = Instant::now();

        assert!(!session.is_kovio_duplicate(&uid, t0));
        assert!(session.is_kovio_duplicate(&uid, t0 + Duration::from_millis(400)));
        // The window slides from the previous sighting.
        assert!(!session
            .is_kovio_duplicate(&uid, t0 + Duration::from_millis(400) + KOVIO_DEDUP_WINDOW));
    }

    #[test]
    fn kovio_different_uid_is_not_duplicate() {
        let mut session = TagSession::new();
        let t0 = Instant::now();
        assert!(!session.is_kovio_duplicate(&[0x12, 0x34], t0));
        assert!(!session.is_kovio_duplicate(&[0x12, 0x35], t0 + Duration::from_millis(100)));
    }

    #[test]
    fn kovio_state_survives_idle_reset() {
        let mut session = TagSession::new();
        let t0 = Instant::now();
        assert!(!session.is_kovio_duplicate(&[0x12, 0x34], t0));
        session.deactivate_to_idle();
        assert!(session.is_kovio_duplicate(&[0x12, 0x34], t0 + Duration::from_millis(100)));
    }

    #[test]
    fn t1t_max_message_size() {
        let mut session = TagSession::new();
        let topaz96 = activation(
            nci::RfProtocolType::T1t,
            nci::RfTechnologyAndMode::NfcAPassivePollMode,
            vec![],
            vec![0x11, 0x00],
        );
        session.calculate_t1t_max_message_size(&topaz96);
        assert_eq!(session.t1t_max_message_size(), 90);

        let topaz512 = activation(
            nci::RfProtocolType::T1t,
            nci::RfTechnologyAndMode::NfcAPassivePollMode,
            vec![],
            vec![0x12, 0x00],
        );
        session.calculate_t1t_max_message_size(&topaz512);
        assert_eq!(session.t1t_max_message_size(), 462);

        let unknown = activation(
            nci::RfProtocolType::T1t,
            nci::RfTechnologyAndMode::NfcAPassivePollMode,
            vec![],
            vec![0x77, 0x00],
        );
        session.calculate_t1t_max_message_size(&unknown);
        assert_eq!(session.t1t_max_message_size(), 0);
    }

    #[test]
    fn t1t_size_cleared_for_other_protocols() {
        let mut session = TagSession::new();
        session.calculate_t1t_max_message_size(&activation(
            nci::RfProtocolType::T1t,
            nci::RfTechnologyAndMode::NfcAPassivePollMode,
            vec![],
            vec![0x11, 0x00],
        ));
        session.calculate_t1t_max_message_size(&activation(
            nci::RfProtocolType::T2t,
            nci::RfTechnologyAndMode::NfcAPassivePollMode,
            vec![],
            vec![],
        ));
        assert_eq!(session.t1t_max_message_size(), 0);
    }

    #[test]
    fn deactivate_to_idle_resets_cycle_state() {
        let mut session = TagSession::new();
        session
            .register_activation(&activation(
                nci::RfProtocolType::T2t,
                nci::RfTechnologyAndMode::NfcAPassivePollMode,
                nfca_parameters(&[0x04, 0x61, 0x62, 0x63], Some(0x00)),
                vec![],
            ))
            .unwrap();
        session.activate(nci::RfProtocolType::T2t);
        assert_eq!(session.activation_state(), ActivationState::Active);

        session.deactivate_to_idle();
        assert_eq!(session.activation_state(), ActivationState::Idle);
        assert_eq!(session.current_protocol(), None);
        assert!(session.technologies().is_empty());
        assert_eq!(session.t1t_max_message_size(), 0);
    }

    #[test]
    fn deactivate_to_sleep_preserves_technologies() {
        let mut session = TagSession::new();
        session
            .register_activation(&activation(
                nci::RfProtocolType::IsoDep,
                nci::RfTechnologyAndMode::NfcAPassivePollMode,
                vec![],
                vec![],
            ))
            .unwrap();
        session.activate(nci::RfProtocolType::IsoDep);
        session.deactivate_to_sleep();
        assert_eq!(session.activation_state(), ActivationState::Sleep);
        assert_eq!(session.technologies().len(), 2);
    }

    #[test]
    fn activation_clears_ndef_timeout() {
        let mut session = TagSession::new();
        session.set_ndef_detection_status(nci::Status::Timeout);
        assert!(session.ndef_detection_timed_out());
        session.activate(nci::RfProtocolType::T2t);
        assert!(!session.ndef_detection_timed_out());

        session.set_ndef_detection_status(nci::Status::Ok);
        assert!(!session.ndef_detection_timed_out());
    }

    #[test]
    fn read_completion_wakes_waiter() {
        let session = TagSession::new();
        let completion = session.read_completion();
        let waiter = thread::spawn(move || completion.wait());
        session.read_completion().complete(nci::Status::Ok);
        assert_eq!(waiter.join().unwrap(), nci::Status::Ok);
    }

    #[test]
    fn abort_wakes_waiter_with_last_known_status() {
        let session = TagSession::new();
        session.read_completion().complete(nci::Status::Ok);
        assert_eq!(session.read_completion().wait(), nci::Status::Ok);

        let completion = session.read_completion();
        let waiter = thread::spawn(move || completion.wait());
        session.abort();
        assert_eq!(waiter.join().unwrap(), nci::Status::Ok);
    }
}
