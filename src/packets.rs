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

//! Packet parsers and serializers.

/// NCI packet parser and serializer.
///
/// Covers the subset of control messages exchanged between the DH and the
/// NFCC on the discovery path: the discovery and activation notifications
/// consumed by the host, and the commands the host sends back.
pub mod nci {
    use bytes::Buf;
    use thiserror::Error;

    /// Group identifier of the NCI Core group.
    pub const GID_CORE: u8 = 0x0;
    /// Group identifier of the RF Management group.
    pub const GID_RF: u8 = 0x1;

    /// Opcode identifiers within their group.
    pub const CORE_RESET_OID: u8 = 0x00;
    #[allow(missing_docs)]
    pub const CORE_INIT_OID: u8 = 0x01;
    #[allow(missing_docs)]
    pub const RF_DISCOVER_OID: u8 = 0x03;
    #[allow(missing_docs)]
    pub const RF_DISCOVER_SELECT_OID: u8 = 0x04;
    #[allow(missing_docs)]
    pub const RF_INTF_ACTIVATED_OID: u8 = 0x05;
    #[allow(missing_docs)]
    pub const RF_DEACTIVATE_OID: u8 = 0x06;

    /// Error raised when a received packet cannot be decoded.
    #[derive(Debug, Error, PartialEq, Eq)]
    #[allow(missing_docs)]
    pub enum DecodeError {
        #[error("packet truncated")]
        Truncated,
        #[error("invalid {field} value {value:#04x}")]
        InvalidField { field: &'static str, value: u8 },
    }

    fn read_u8(buf: &mut &[u8]) -> Result<u8, DecodeError> {
        if buf.remaining() < 1 {
            return Err(DecodeError::Truncated);
        }
        Ok(buf.get_u8())
    }

    fn read_vec(buf: &mut &[u8], len: usize) -> Result<Vec<u8>, DecodeError> {
        if buf.remaining() < len {
            return Err(DecodeError::Truncated);
        }
        let mut bytes = vec![0; len];
        buf.copy_to_slice(&mut bytes);
        Ok(bytes)
    }

    /// Message type carried in the common packet header.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    #[repr(u8)]
    #[allow(missing_docs)]
    pub enum MessageType {
        Data = 0,
        Command = 1,
        Response = 2,
        Notification = 3,
    }

    impl TryFrom<u8> for MessageType {
        type Error = DecodeError;
        fn try_from(value: u8) -> Result<Self, DecodeError> {
            match value {
                0 => Ok(MessageType::Data),
                1 => Ok(MessageType::Command),
                2 => Ok(MessageType::Response),
                3 => Ok(MessageType::Notification),
                _ => Err(DecodeError::InvalidField { field: "mt", value }),
            }
        }
    }

    /// Packet boundary flag used for segmentation and reassembly.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    #[allow(missing_docs)]
    pub enum PacketBoundaryFlag {
        CompleteOrFinal,
        Incomplete,
    }

    /// Status codes reported by the NFCC.
    /// Timeout is a proprietary extension used by NDEF detection.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    #[repr(u8)]
    #[allow(missing_docs)]
    pub enum Status {
        Ok = 0x00,
        Rejected = 0x01,
        RfFrameCorrupted = 0x02,
        Failed = 0x03,
        NotInitialized = 0x04,
        SyntaxError = 0x05,
        SemanticError = 0x06,
        Timeout = 0xB1,
    }

    impl TryFrom<u8> for Status {
        type Error = DecodeError;
        fn try_from(value: u8) -> Result<Self, DecodeError> {
            match value {
                0x00 => Ok(Status::Ok),
                0x01 => Ok(Status::Rejected),
                0x02 => Ok(Status::RfFrameCorrupted),
                0x03 => Ok(Status::Failed),
                0x04 => Ok(Status::NotInitialized),
                0x05 => Ok(Status::SyntaxError),
                0x06 => Ok(Status::SemanticError),
                0xB1 => Ok(Status::Timeout),
                _ => Err(DecodeError::InvalidField { field: "status", value }),
            }
        }
    }

    /// RF protocols assigned to discovered endpoints.
    /// Kovio is a proprietary extension for barcode tags.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    #[repr(u8)]
    #[allow(missing_docs)]
    pub enum RfProtocolType {
        Undetermined = 0x00,
        T1t = 0x01,
        T2t = 0x02,
        T3t = 0x03,
        IsoDep = 0x04,
        NfcDep = 0x05,
        T5t = 0x06,
        Kovio = 0x8A,
    }

    impl TryFrom<u8> for RfProtocolType {
        type Error = DecodeError;
        fn try_from(value: u8) -> Result<Self, DecodeError> {
            match value {
                0x00 => Ok(RfProtocolType::Undetermined),
                0x01 => Ok(RfProtocolType::T1t),
                0x02 => Ok(RfProtocolType::T2t),
                0x03 => Ok(RfProtocolType::T3t),
                0x04 => Ok(RfProtocolType::IsoDep),
                0x05 => Ok(RfProtocolType::NfcDep),
                0x06 => Ok(RfProtocolType::T5t),
                0x8A => Ok(RfProtocolType::Kovio),
                _ => Err(DecodeError::InvalidField { field: "rf_protocol", value }),
            }
        }
    }

    /// RF technology and mode of a discovered or activated endpoint.
    /// Poll Kovio is a proprietary extension for barcode tags.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    #[repr(u8)]
    #[allow(missing_docs)]
    pub enum RfTechnologyAndMode {
        NfcAPassivePollMode = 0x00,
        NfcBPassivePollMode = 0x01,
        NfcFPassivePollMode = 0x02,
        NfcAActivePollMode = 0x03,
        NfcFActivePollMode = 0x05,
        NfcVPassivePollMode = 0x06,
        NfcBPrimePollMode = 0x74,
        NfcKovioPollMode = 0x77,
        NfcAPassiveListenMode = 0x80,
        NfcBPassiveListenMode = 0x81,
        NfcFPassiveListenMode = 0x82,
        NfcAActiveListenMode = 0x83,
        NfcFActiveListenMode = 0x85,
        NfcVPassiveListenMode = 0x86,
        NfcBPrimeListenMode = 0xF4,
    }

    impl TryFrom<u8> for RfTechnologyAndMode {
        type Error = DecodeError;
        fn try_from(value: u8) -> Result<Self, DecodeError> {
            use RfTechnologyAndMode::*;
            match value {
                0x00 => Ok(NfcAPassivePollMode),
                0x01 => Ok(NfcBPassivePollMode),
                0x02 => Ok(NfcFPassivePollMode),
                0x03 => Ok(NfcAActivePollMode),
                0x05 => Ok(NfcFActivePollMode),
                0x06 => Ok(NfcVPassivePollMode),
                0x74 => Ok(NfcBPrimePollMode),
                0x77 => Ok(NfcKovioPollMode),
                0x80 => Ok(NfcAPassiveListenMode),
                0x81 => Ok(NfcBPassiveListenMode),
                0x82 => Ok(NfcFPassiveListenMode),
                0x83 => Ok(NfcAActiveListenMode),
                0x85 => Ok(NfcFActiveListenMode),
                0x86 => Ok(NfcVPassiveListenMode),
                0xF4 => Ok(NfcBPrimeListenMode),
                _ => Err(DecodeError::InvalidField { field: "rf_technology_and_mode", value }),
            }
        }
    }

    impl RfTechnologyAndMode {
        /// Return whether the endpoint was reached in poll mode,
        /// i.e. the local device acted as the initiator.
        pub fn is_poll_mode(self) -> bool {
            (self as u8) & 0x80 == 0
        }

        /// Return whether the endpoint was reached in listen mode.
        pub fn is_listen_mode(self) -> bool {
            !self.is_poll_mode()
        }
    }

    /// RF interfaces bound to an activated endpoint.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    #[repr(u8)]
    #[allow(missing_docs)]
    pub enum RfInterfaceType {
        NfceeDirect = 0x00,
        Frame = 0x01,
        IsoDep = 0x02,
        NfcDep = 0x03,
    }

    impl TryFrom<u8> for RfInterfaceType {
        type Error = DecodeError;
        fn try_from(value: u8) -> Result<Self, DecodeError> {
            match value {
                0x00 => Ok(RfInterfaceType::NfceeDirect),
                0x01 => Ok(RfInterfaceType::Frame),
                0x02 => Ok(RfInterfaceType::IsoDep),
                0x03 => Ok(RfInterfaceType::NfcDep),
                _ => Err(DecodeError::InvalidField { field: "rf_interface", value }),
            }
        }
    }

    /// Deactivation types requested by the DH or reported by the NFCC.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    #[repr(u8)]
    #[allow(missing_docs)]
    pub enum DeactivationType {
        IdleMode = 0,
        SleepMode = 1,
        SleepAfMode = 2,
        Discover = 3,
    }

    impl TryFrom<u8> for DeactivationType {
        type Error = DecodeError;
        fn try_from(value: u8) -> Result<Self, DecodeError> {
            match value {
                0 => Ok(DeactivationType::IdleMode),
                1 => Ok(DeactivationType::SleepMode),
                2 => Ok(DeactivationType::SleepAfMode),
                3 => Ok(DeactivationType::Discover),
                _ => Err(DecodeError::InvalidField { field: "deactivation_type", value }),
            }
        }
    }

    /// Common header of NCI control and data packets.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    #[allow(missing_docs)]
    pub struct PacketHeader {
        pub mt: MessageType,
        pub pbf: PacketBoundaryFlag,
        pub gid: u8,
        pub oid: u8,
        pub payload_length: u8,
    }

    impl PacketHeader {
        /// Parse the 3 octet common packet header.
        pub fn parse(bytes: &[u8]) -> Result<PacketHeader, DecodeError> {
            if bytes.len() < 3 {
                return Err(DecodeError::Truncated);
            }
            Ok(PacketHeader {
                mt: MessageType::try_from(bytes[0] >> 5)?,
                pbf: if bytes[0] & 0x10 != 0 {
                    PacketBoundaryFlag::Incomplete
                } else {
                    PacketBoundaryFlag::CompleteOrFinal
                },
                gid: bytes[0] & 0x0F,
                oid: bytes[1] & 0x3F,
                payload_length: bytes[2],
            })
        }
    }

    fn control_packet(mt: MessageType, gid: u8, oid: u8, payload: &[u8]) -> Vec<u8> {
        let mut packet = vec![((mt as u8) << 5) | (gid & 0x0F), oid & 0x3F, payload.len() as u8];
        packet.extend_from_slice(payload);
        packet
    }

    /// RF_DISCOVER_NTF. One notification is sent per endpoint discovered
    /// while polling; the last one carries a terminal notification type.
    #[derive(Clone, Debug, PartialEq, Eq)]
    #[allow(missing_docs)]
    pub struct RfDiscoverNotification {
        pub rf_discovery_id: u8,
        pub rf_protocol: RfProtocolType,
        pub rf_technology_and_mode: RfTechnologyAndMode,
        pub rf_technology_specific_parameters: Vec<u8>,
        pub more_to_follow: bool,
    }

    impl RfDiscoverNotification {
        /// Parse the notification payload.
        pub fn parse(mut payload: &[u8]) -> Result<Self, DecodeError> {
            let rf_discovery_id = read_u8(&mut payload)?;
            let rf_protocol = RfProtocolType::try_from(read_u8(&mut payload)?)?;
            let rf_technology_and_mode = RfTechnologyAndMode::try_from(read_u8(&mut payload)?)?;
            let parameters_length = read_u8(&mut payload)? as usize;
            let rf_technology_specific_parameters = read_vec(&mut payload, parameters_length)?;
            // 0 is the last notification, 1 the last notification due to
            // an NFCC limit, 2 more notifications to follow.
            let more_to_follow = match read_u8(&mut payload)? {
                0 | 1 => false,
                2 => true,
                value => {
                    return Err(DecodeError::InvalidField { field: "notification_type", value })
                }
            };
            Ok(RfDiscoverNotification {
                rf_discovery_id,
                rf_protocol,
                rf_technology_and_mode,
                rf_technology_specific_parameters,
                more_to_follow,
            })
        }
    }

    /// RF_INTF_ACTIVATED_NTF. Sent when the NFCC bound an RF interface to
    /// a discovered endpoint, either automatically or after a select.
    #[derive(Clone, Debug, PartialEq, Eq)]
    #[allow(missing_docs)]
    pub struct RfIntfActivatedNotification {
        pub rf_discovery_id: u8,
        pub rf_interface: RfInterfaceType,
        pub rf_protocol: RfProtocolType,
        pub activation_rf_technology_and_mode: RfTechnologyAndMode,
        pub max_data_packet_payload_size: u8,
        pub initial_number_of_credits: u8,
        pub rf_technology_specific_parameters: Vec<u8>,
        pub data_exchange_rf_technology_and_mode: RfTechnologyAndMode,
        pub data_exchange_transmit_bit_rate: u8,
        pub data_exchange_receive_bit_rate: u8,
        pub activation_parameters: Vec<u8>,
    }

    impl RfIntfActivatedNotification {
        /// Parse the notification payload.
        pub fn parse(mut payload: &[u8]) -> Result<Self, DecodeError> {
            let rf_discovery_id = read_u8(&mut payload)?;
            let rf_interface = RfInterfaceType::try_from(read_u8(&mut payload)?)?;
            let rf_protocol = RfProtocolType::try_from(read_u8(&mut payload)?)?;
            let activation_rf_technology_and_mode =
                RfTechnologyAndMode::try_from(read_u8(&mut payload)?)?;
            let max_data_packet_payload_size = read_u8(&mut payload)?;
            let initial_number_of_credits = read_u8(&mut payload)?;
            let parameters_length = read_u8(&mut payload)? as usize;
            let rf_technology_specific_parameters = read_vec(&mut payload, parameters_length)?;
            let data_exchange_rf_technology_and_mode =
                RfTechnologyAndMode::try_from(read_u8(&mut payload)?)?;
            let data_exchange_transmit_bit_rate = read_u8(&mut payload)?;
            let data_exchange_receive_bit_rate = read_u8(&mut payload)?;
            let activation_parameters_length = read_u8(&mut payload)? as usize;
            let activation_parameters = read_vec(&mut payload, activation_parameters_length)?;
            Ok(RfIntfActivatedNotification {
                rf_discovery_id,
                rf_interface,
                rf_protocol,
                activation_rf_technology_and_mode,
                max_data_packet_payload_size,
                initial_number_of_credits,
                rf_technology_specific_parameters,
                data_exchange_rf_technology_and_mode,
                data_exchange_transmit_bit_rate,
                data_exchange_receive_bit_rate,
                activation_parameters,
            })
        }
    }

    /// RF_DEACTIVATE_NTF.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    #[allow(missing_docs)]
    pub struct RfDeactivateNotification {
        pub deactivation_type: DeactivationType,
        pub deactivation_reason: u8,
    }

    impl RfDeactivateNotification {
        /// Parse the notification payload.
        pub fn parse(mut payload: &[u8]) -> Result<Self, DecodeError> {
            Ok(RfDeactivateNotification {
                deactivation_type: DeactivationType::try_from(read_u8(&mut payload)?)?,
                deactivation_reason: read_u8(&mut payload)?,
            })
        }
    }

    /// CORE_RESET_CMD.
    pub struct CoreResetCommandBuilder {
        /// 0 keeps the NFCC configuration, 1 resets it.
        pub reset_type: u8,
    }

    impl CoreResetCommandBuilder {
        /// Serialize the command to wire format.
        pub fn to_vec(&self) -> Vec<u8> {
            control_packet(MessageType::Command, GID_CORE, CORE_RESET_OID, &[self.reset_type])
        }
    }

    /// CORE_INIT_CMD.
    pub struct CoreInitCommandBuilder {}

    impl CoreInitCommandBuilder {
        /// Serialize the command to wire format.
        pub fn to_vec(&self) -> Vec<u8> {
            control_packet(MessageType::Command, GID_CORE, CORE_INIT_OID, &[])
        }
    }

    /// RF_DISCOVER_CMD.
    pub struct RfDiscoverCommandBuilder {
        /// Technologies to poll for, with their polling frequency.
        pub configurations: Vec<(RfTechnologyAndMode, u8)>,
    }

    impl RfDiscoverCommandBuilder {
        /// Serialize the command to wire format.
        pub fn to_vec(&self) -> Vec<u8> {
            let mut payload = vec![self.configurations.len() as u8];
            for (technology_and_mode, frequency) in self.configurations.iter() {
                payload.push(*technology_and_mode as u8);
                payload.push(*frequency);
            }
            control_packet(MessageType::Command, GID_RF, RF_DISCOVER_OID, &payload)
        }
    }

    /// RF_DISCOVER_SELECT_CMD.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    #[allow(missing_docs)]
    pub struct RfDiscoverSelectCommandBuilder {
        pub rf_discovery_id: u8,
        pub rf_protocol: RfProtocolType,
        pub rf_interface: RfInterfaceType,
    }

    impl RfDiscoverSelectCommandBuilder {
        /// Serialize the command to wire format.
        pub fn to_vec(&self) -> Vec<u8> {
            control_packet(
                MessageType::Command,
                GID_RF,
                RF_DISCOVER_SELECT_OID,
                &[self.rf_discovery_id, self.rf_protocol as u8, self.rf_interface as u8],
            )
        }
    }

    /// RF_DEACTIVATE_CMD.
    pub struct RfDeactivateCommandBuilder {
        #[allow(missing_docs)]
        pub deactivation_type: DeactivationType,
    }

    impl RfDeactivateCommandBuilder {
        /// Serialize the command to wire format.
        pub fn to_vec(&self) -> Vec<u8> {
            control_packet(
                MessageType::Command,
                GID_RF,
                RF_DEACTIVATE_OID,
                &[self.deactivation_type as u8],
            )
        }
    }

    /// Technology specific parameters reported for endpoints discovered
    /// in NFC-A passive poll mode.
    #[derive(Clone, Debug, PartialEq, Eq)]
    #[allow(missing_docs)]
    pub struct NfcAPollParameters {
        pub sens_res: [u8; 2],
        pub nfcid1: Vec<u8>,
        pub sel_res: Option<u8>,
    }

    impl NfcAPollParameters {
        /// Parse an NFC-A poll mode parameter snapshot.
        pub fn parse(mut payload: &[u8]) -> Result<Self, DecodeError> {
            let sens_res = [read_u8(&mut payload)?, read_u8(&mut payload)?];
            let nfcid1_length = read_u8(&mut payload)? as usize;
            if nfcid1_length > 10 {
                return Err(DecodeError::InvalidField {
                    field: "nfcid1_length",
                    value: nfcid1_length as u8,
                });
            }
            let nfcid1 = read_vec(&mut payload, nfcid1_length)?;
            let sel_res = match read_u8(&mut payload)? {
                0 => None,
                1 => Some(read_u8(&mut payload)?),
                value => return Err(DecodeError::InvalidField { field: "sel_res_length", value }),
            };
            Ok(NfcAPollParameters { sens_res, nfcid1, sel_res })
        }
    }

    /// Parse the parameter snapshot of an endpoint discovered in Kovio
    /// poll mode. The snapshot holds the barcode UID, length prefixed.
    pub fn parse_kovio_uid(mut payload: &[u8]) -> Result<Vec<u8>, DecodeError> {
        let uid_length = read_u8(&mut payload)? as usize;
        read_vec(&mut payload, uid_length)
    }
}
