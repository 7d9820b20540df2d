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

//! NFC host monitor.
//!
//! Connects to an NFCC (or an NFCC emulator) over its NCI TCP transport,
//! starts RF discovery, and tracks the technologies of any tag or peer
//! presented to the controller.

use anyhow::Result;
use argh::FromArgs;
use log::{debug, info, warn};
use std::net::{Ipv4Addr, SocketAddrV4};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::Mutex;

use nci_host::packets::nci;
use nci_host::{CommandSink, ConnEvent, Error, EventDispatcher, NciReader, NciWriter};

/// Command seam draining into the NCI writer task.
struct ChannelSink {
    commands: mpsc::UnboundedSender<Vec<u8>>,
}

impl CommandSink for ChannelSink {
    fn select(
        &mut self,
        rf_discovery_id: u8,
        rf_protocol: nci::RfProtocolType,
        rf_interface: nci::RfInterfaceType,
    ) -> Result<(), Error> {
        self.commands
            .send(
                nci::RfDiscoverSelectCommandBuilder { rf_discovery_id, rf_protocol, rf_interface }
                    .to_vec(),
            )
            .map_err(|_| Error::SelectFailed(nci::Status::Failed))
    }
}

#[derive(FromArgs, Debug)]
/// NFC host monitor.
struct Opt {
    #[argh(option, default = "7000")]
    /// configure the TCP port of the controller NCI transport.
    nci_port: u16,
}

/// Select the activation target once a discovery cycle completed:
/// a peer when one was discovered, the primary tag entry otherwise.
fn select_target(dispatcher: &mut EventDispatcher<ChannelSink>) {
    match dispatcher.select_peer() {
        Ok(()) => return,
        Err(Error::NoPeerCandidate) => (),
        Err(err) => {
            warn!("peer selection failed: {}", err);
            return;
        }
    }
    if let Err(err) = dispatcher.select_default() {
        warn!("tag selection failed: {}", err);
    }
}

async fn run() -> Result<()> {
    env_logger::init();

    let opt: Opt = argh::from_env();
    let socket =
        TcpStream::connect(SocketAddrV4::new(Ipv4Addr::LOCALHOST, opt.nci_port)).await?;
    info!("Connected to NCI controller at 127.0.0.1:{}", opt.nci_port);

    let (socket_rx, socket_tx) = socket.into_split();
    let nci_reader = NciReader::new(socket_rx);
    let nci_writer = NciWriter::new(socket_tx);

    let (command_tx, mut command_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let dispatcher = Mutex::new(EventDispatcher::new(ChannelSink { commands: command_tx.clone() }));

    // Controller bring-up, then poll for all passive technologies.
    command_tx.send(nci::CoreResetCommandBuilder { reset_type: 1 }.to_vec())?;
    command_tx.send(nci::CoreInitCommandBuilder {}.to_vec())?;
    command_tx.send(
        nci::RfDiscoverCommandBuilder {
            configurations: vec![
                (nci::RfTechnologyAndMode::NfcAPassivePollMode, 1),
                (nci::RfTechnologyAndMode::NfcBPassivePollMode, 1),
                (nci::RfTechnologyAndMode::NfcFPassivePollMode, 1),
                (nci::RfTechnologyAndMode::NfcVPassivePollMode, 1),
            ],
        }
        .to_vec(),
    )?;

    let result: Result<((), ())> = futures::future::try_join(
        // Notification handler.
        async {
            loop {
                let packet = nci_reader.read().await?;
                let header = nci::PacketHeader::parse(&packet[0..3])?;
                let event = match ConnEvent::parse(header, &packet[3..]) {
                    Ok(Some(event)) => event,
                    Ok(None) => {
                        debug!("ignored packet gid {} oid {}", header.gid, header.oid);
                        continue;
                    }
                    Err(err) => {
                        warn!("malformed packet dropped: {}", err);
                        continue;
                    }
                };

                let was_discovery = matches!(event, ConnEvent::DiscoveryResult { .. });
                let mut dispatcher = dispatcher.lock().await;
                if let Err(err) = dispatcher.on_event(event) {
                    warn!("event dropped: {}", err);
                }

                let session = dispatcher.session();
                if was_discovery
                    && session.discovery_complete()
                    && !session.technologies().is_empty()
                {
                    for entry in session.technologies() {
                        info!(
                            " > discovered {:?} (handle {}, protocol {:?})",
                            entry.technology, entry.handle, entry.protocol
                        );
                    }
                    select_target(&mut dispatcher);
                }
            }
        },
        // Command writer.
        async {
            loop {
                let packet = command_rx
                    .recv()
                    .await
                    .ok_or(anyhow::anyhow!("command channel closed"))?;
                nci_writer.write(&packet).await?
            }
        },
    )
    .await;
    result?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}
