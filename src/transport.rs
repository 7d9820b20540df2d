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

//! NCI transport framing.
//!
//! Reads and writes NCI control and data packets over a byte stream,
//! recombining and segmenting packets as required by the transport.

use crate::packets::nci;
use anyhow::Result;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp;
use tokio::sync::Mutex;

const HEADER_SIZE: usize = 3;
const MAX_PAYLOAD_SIZE: usize = 255;

/// Read NCI Control and Data packets received on the NCI transport.
/// Performs recombination of the segmented packets.
pub struct NciReader {
    socket: Mutex<tcp::OwnedReadHalf>,
}

/// Write NCI Control and Data packets to the NCI transport.
/// Performs segmentation of the packets.
pub struct NciWriter {
    socket: Mutex<tcp::OwnedWriteHalf>,
}

impl NciReader {
    /// Create a new NCI reader from the TCP socket half.
    pub fn new(socket: tcp::OwnedReadHalf) -> Self {
        NciReader { socket: Mutex::new(socket) }
    }

    /// Read a single NCI packet from the reader. The packet is
    /// automatically re-assembled if segmented on the NCI transport.
    ///
    /// Every segment of a message repeats the same MT/GID/OID (control)
    /// or MT/Conn ID (data) header fields, so only the last header needs
    /// to be retained across segments.
    pub async fn read(&self) -> Result<Vec<u8>> {
        let mut socket = self.socket.lock().await;
        let mut complete_packet = vec![0; HEADER_SIZE];

        loop {
            socket.read_exact(&mut complete_packet[0..HEADER_SIZE]).await?;
            let header = nci::PacketHeader::parse(&complete_packet[0..HEADER_SIZE])?;

            let mut payload_bytes = vec![0; header.payload_length as usize];
            socket.read_exact(&mut payload_bytes).await?;
            complete_packet.extend(payload_bytes);

            match header.pbf {
                nci::PacketBoundaryFlag::CompleteOrFinal => return Ok(complete_packet),
                nci::PacketBoundaryFlag::Incomplete => (),
            }
        }
    }
}

impl NciWriter {
    /// Create a new NCI writer from the TCP socket half.
    pub fn new(socket: tcp::OwnedWriteHalf) -> Self {
        NciWriter { socket: Mutex::new(socket) }
    }

    /// Write a single NCI packet to the writer. The packet is
    /// automatically segmented if the payload exceeds the maximum
    /// payload size.
    pub async fn write(&self, mut packet: &[u8]) -> Result<()> {
        let mut socket = self.socket.lock().await;
        let mut header_bytes = [packet[0], packet[1], 0];
        packet = &packet[HEADER_SIZE..];

        loop {
            let chunk_length = std::cmp::min(MAX_PAYLOAD_SIZE, packet.len());
            const PBF_MASK: u8 = 0x10;
            if chunk_length < packet.len() {
                header_bytes[0] |= PBF_MASK;
            } else {
                header_bytes[0] &= !PBF_MASK;
            }
            header_bytes[2] = chunk_length as u8;

            socket.write_all(&header_bytes).await?;
            socket.write_all(&packet[..chunk_length]).await?;
            packet = &packet[chunk_length..];

            if packet.is_empty() {
                return Ok(());
            }
        }
    }
}
