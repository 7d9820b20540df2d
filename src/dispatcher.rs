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

//! Dispatch of controller connection events.
//!
//! [`EventDispatcher`] is the single writer of the [`TagSession`]: every
//! controller event is turned into a [`ConnEvent`] and routed through
//! [`EventDispatcher::on_event`]. The dispatcher also hosts the two
//! selection policies, which are the only operations that talk back to
//! the controller.

use crate::error::Error;
use crate::packets::nci;
use crate::tag::TagSession;
use log::{debug, warn};
use std::time::Instant;

/// Connection events delivered by the controller transport, one at a
/// time, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnEvent {
    /// One endpoint reported while polling (RF_DISCOVER_NTF).
    DiscoveryResult {
        /// Delivery status reported by the transport.
        status: nci::Status,
        /// The discovery record.
        record: nci::RfDiscoverNotification,
    },
    /// An RF interface was bound to an endpoint (RF_INTF_ACTIVATED_NTF).
    InterfaceActivated {
        /// The activation record.
        record: nci::RfIntfActivatedNotification,
    },
    /// The RF link was deactivated (RF_DEACTIVATE_NTF).
    Deactivated {
        /// The deactivation record.
        notification: nci::RfDeactivateNotification,
    },
    /// A pending tag read finished.
    ReadComplete {
        /// Completion status delivered to the blocked caller.
        status: nci::Status,
    },
    /// An NDEF detection attempt finished.
    NdefDetect {
        /// Outcome of the detection. Timeout is remembered as data so
        /// downstream logic can tell "no NDEF" from "detection timed out".
        status: nci::Status,
    },
}

impl ConnEvent {
    /// Decode a received control packet into a connection event.
    ///
    /// Returns `None` for packets that carry no connection event
    /// (responses, or notifications outside the discovery path); those
    /// are logged and ignored by the caller, never fatal.
    pub fn parse(
        header: nci::PacketHeader,
        payload: &[u8],
    ) -> Result<Option<ConnEvent>, nci::DecodeError> {
        if header.mt != nci::MessageType::Notification || header.gid != nci::GID_RF {
            return Ok(None);
        }
        Ok(match header.oid {
            nci::RF_DISCOVER_OID => Some(ConnEvent::DiscoveryResult {
                status: nci::Status::Ok,
                record: nci::RfDiscoverNotification::parse(payload)?,
            }),
            nci::RF_INTF_ACTIVATED_OID => Some(ConnEvent::InterfaceActivated {
                record: nci::RfIntfActivatedNotification::parse(payload)?,
            }),
            nci::RF_DEACTIVATE_OID => Some(ConnEvent::Deactivated {
                notification: nci::RfDeactivateNotification::parse(payload)?,
            }),
            _ => None,
        })
    }
}

/// Outgoing command seam toward the controller transport.
///
/// The dispatcher issues at most one select per selection operation;
/// the transport decides how the command reaches the controller.
pub trait CommandSink {
    /// Issue an RF_DISCOVER_SELECT command for a discovered endpoint.
    fn select(
        &mut self,
        rf_discovery_id: u8,
        rf_protocol: nci::RfProtocolType,
        rf_interface: nci::RfInterfaceType,
    ) -> Result<(), Error>;
}

/// Routes connection events into the tag session and issues selection
/// commands.
pub struct EventDispatcher<S> {
    session: TagSession,
    sink: S,
}

impl<S: CommandSink> EventDispatcher<S> {
    /// Create a dispatcher with an empty session.
    pub fn new(sink: S) -> EventDispatcher<S> {
        EventDispatcher { session: TagSession::new(), sink }
    }

    /// Read access to the tag session for upstream consumers.
    pub fn session(&self) -> &TagSession {
        &self.session
    }

    /// Forced teardown: wake any caller blocked on a pending read.
    pub fn abort(&self) {
        self.session.abort();
    }

    /// Process one connection event.
    ///
    /// Errors are recoverable conditions (a full technology list, a
    /// rejected select); the session stays consistent and the next
    /// discovery cycle proceeds normally.
    pub fn on_event(&mut self, event: ConnEvent) -> Result<(), Error> {
        match event {
            ConnEvent::DiscoveryResult { status, record } => {
                debug!("+ discovery_result({:?})", record.rf_protocol);
                if status != nci::Status::Ok {
                    warn!("discovery result with status {:?} ignored", status);
                    return Ok(());
                }
                self.session.register_discovery(&record)
            }
            ConnEvent::InterfaceActivated { record } => {
                debug!("+ interface_activated({:?})", record.rf_protocol);
                self.handle_activation(&record, Instant::now())
            }
            ConnEvent::Deactivated { notification } => {
                debug!("+ deactivated({:?})", notification.deactivation_type);
                match notification.deactivation_type {
                    nci::DeactivationType::SleepMode | nci::DeactivationType::SleepAfMode => {
                        self.session.deactivate_to_sleep()
                    }
                    nci::DeactivationType::IdleMode | nci::DeactivationType::Discover => {
                        self.session.deactivate_to_idle()
                    }
                }
                Ok(())
            }
            ConnEvent::ReadComplete { status } => {
                debug!("+ read_complete({:?})", status);
                self.session.read_completion().complete(status);
                Ok(())
            }
            ConnEvent::NdefDetect { status } => {
                debug!("+ ndef_detect({:?})", status);
                self.session.set_ndef_detection_status(status);
                Ok(())
            }
        }
    }

    fn handle_activation(
        &mut self,
        record: &nci::RfIntfActivatedNotification,
        now: Instant,
    ) -> Result<(), Error> {
        let mode = record.activation_rf_technology_and_mode;
        if mode.is_listen_mode() || record.rf_interface == nci::RfInterfaceType::NfceeDirect {
            debug!("listen mode or NFCEE direct activation ignored for tag discovery");
            return Ok(());
        }

        if record.rf_protocol == nci::RfProtocolType::Kovio
            && mode == nci::RfTechnologyAndMode::NfcKovioPollMode
        {
            match nci::parse_kovio_uid(&record.rf_technology_specific_parameters) {
                Ok(uid) => {
                    if self.session.is_kovio_duplicate(&uid, now) {
                        debug!("duplicate Kovio activation discarded");
                        return Ok(());
                    }
                }
                Err(err) => warn!("malformed Kovio parameters: {}", err),
            }
        }

        self.session.calculate_t1t_max_message_size(record);
        // A full technology list is non-fatal: the endpoint still
        // activates with the entries recorded so far.
        let registered = self.session.register_activation(record);
        self.session.activate(record.rf_protocol);
        registered
    }

    /// Select the best peer-to-peer technology from the discovered
    /// endpoints.
    ///
    /// NFC-F polling is preferred for its higher bit rate; the first
    /// F-mode NFC-DEP entry wins outright, otherwise the first A-mode
    /// entry is used. The technology list is consumed by the selection
    /// even when the command fails, so a retry never runs against a
    /// stale discovery snapshot.
    pub fn select_peer(&mut self) -> Result<(), Error> {
        use nci::RfTechnologyAndMode::*;

        let mut first_a = None;
        let mut chosen = None;
        for entry in self.session.technologies() {
            if entry.protocol != nci::RfProtocolType::NfcDep {
                continue;
            }
            match entry.mode {
                NfcFPassivePollMode | NfcFActivePollMode => {
                    chosen = Some(entry.handle);
                    break;
                }
                NfcAPassivePollMode | NfcAActivePollMode => {
                    first_a.get_or_insert(entry.handle);
                }
                _ => (),
            }
        }

        let handle = chosen.or(first_a).ok_or(Error::NoPeerCandidate)?;
        debug!("+ select_peer(handle {})", handle);
        let result =
            self.sink.select(handle, nci::RfProtocolType::NfcDep, nci::RfInterfaceType::NfcDep);
        self.session.reset_technologies();
        result
    }

    /// Select the primary discovered endpoint with the RF interface
    /// matching its protocol. Failure leaves the technology list and
    /// session state untouched.
    pub fn select_default(&mut self) -> Result<(), Error> {
        let entry = self.session.technologies().first().ok_or(Error::NoTagCandidate)?;
        let rf_interface = match entry.protocol {
            nci::RfProtocolType::IsoDep => nci::RfInterfaceType::IsoDep,
            nci::RfProtocolType::NfcDep => nci::RfInterfaceType::NfcDep,
            _ => nci::RfInterfaceType::Frame,
        };
        debug!("+ select_default(handle {}, {:?})", entry.handle, rf_interface);
        self.sink.select(entry.handle, entry.protocol, rf_interface)
    }
}
