//! Card session management on top of a raw APDU link

use std::fmt;

use tracing::{debug, trace, warn};

use crate::apdu::{commands, ApduCommand, ApduResponse};
use crate::error::{Error, Result};

/// Target used for the APDU diagnostic trace
pub const APDU_TRACE_TARGET: &str = "emv_card::apdu";

/// Upper bound on GET RESPONSE round trips for one command
const MAX_RESPONSE_CHAIN: usize = 32;

/// The device-driver primitive: one request/response exchange with a card.
///
/// Implementations wrap whatever the host provides (a PC/SC card handle, a
/// mobile NFC tag, a test script). They perform no retries.
pub trait CardLink {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Establish the low-level connection to the card
    fn connect(&mut self) -> std::result::Result<(), Self::Error>;

    /// Send raw command bytes and return the raw response bytes
    fn transceive(&mut self, command: &[u8]) -> std::result::Result<Vec<u8>, Self::Error>;

    /// Release the connection
    fn close(&mut self) -> std::result::Result<(), Self::Error>;

    /// ATR (contact) or ATS-derived bytes (contactless), when the driver
    /// exposes them
    fn answer_to_reset(&mut self) -> Option<Vec<u8>> {
        None
    }
}

/// Lifecycle state of a [`Session`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connected => "connected",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// One engagement with a physical card.
///
/// Commands are strictly sequential: each call blocks until the card
/// answers or the link fails.
pub struct Session<L: CardLink> {
    link: L,
    state: SessionState,
}

impl<L: CardLink> Session<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            state: SessionState::Disconnected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Connect the underlying link
    pub fn connect(&mut self) -> Result<()> {
        if self.state != SessionState::Disconnected {
            return Err(Error::SessionState {
                operation: "connect",
                state: self.state,
            });
        }

        self.link.connect().map_err(Error::transport)?;
        self.state = SessionState::Connected;
        debug!("Card session connected");
        Ok(())
    }

    fn ensure_connected(&self, operation: &'static str) -> Result<()> {
        if self.state == SessionState::Connected {
            Ok(())
        } else {
            Err(Error::SessionState {
                operation,
                state: self.state,
            })
        }
    }

    /// Exchange raw bytes with the card.
    ///
    /// A link fault leaves the session connected so that [`Session::close`]
    /// still releases the link.
    pub fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>> {
        self.ensure_connected("transceive")?;

        debug!(target: APDU_TRACE_TARGET, "C-APDU {}", hex::encode_upper(command));
        let response = self.link.transceive(command).map_err(|err| {
            warn!(error = %err, "Card link failed");
            Error::transport(err)
        })?;
        debug!(target: APDU_TRACE_TARGET, "R-APDU {}", hex::encode_upper(&response));

        Ok(response)
    }

    /// Send a command and decode its response.
    ///
    /// Handles the ISO 7816-4 procedure statuses: `6CXX` re-sends the command
    /// with the exact length, `61XX` fetches the remaining bytes with GET
    /// RESPONSE.
    pub fn send(&mut self, command: &ApduCommand) -> Result<ApduResponse> {
        let mut response = ApduResponse::decode(&self.transceive(&command.encode())?)?;

        if response.sw1 == 0x6C {
            let exact = if response.sw2 == 0 { 256 } else { response.sw2 as u16 };
            trace!(le = exact, "Re-sending command with exact length");
            let corrected = command.clone().le(exact);
            response = ApduResponse::decode(&self.transceive(&corrected.encode())?)?;
        }

        let mut data = std::mem::take(&mut response.data);
        let mut rounds = 0;
        while response.sw1 == 0x61 {
            rounds += 1;
            if rounds > MAX_RESPONSE_CHAIN {
                return Err(Error::MalformedResponse(
                    "card kept announcing more response data".to_string(),
                ));
            }
            let next = commands::get_response(response.sw2);
            response = ApduResponse::decode(&self.transceive(&next.encode())?)?;
            data.append(&mut response.data);
        }
        response.data = data;

        Ok(response)
    }

    /// ATR/ATS bytes reported by the link
    pub fn answer_to_reset(&mut self) -> Result<Option<Vec<u8>>> {
        self.ensure_connected("read the answer to reset")?;
        Ok(self.link.answer_to_reset())
    }

    /// Release the link. Closing twice is a no-op; closing a session that
    /// never connected does not touch the link.
    pub fn close(&mut self) -> Result<()> {
        let previous = self.state;
        self.state = SessionState::Closed;

        match previous {
            SessionState::Connected => {
                debug!("Closing card session");
                self.link.close().map_err(Error::transport)
            }
            SessionState::Disconnected | SessionState::Closed => Ok(()),
        }
    }
}
